//! Startup configuration: root folder, service TOML and database bootstrap

use ruach_common::config::{RootFolderInitializer, RootFolderResolver, ROOT_FOLDER_ENV};
use ruach_studio::config::{ProviderKind, StudioConfig, MODULE_NAME};
use ruach_studio::models::{Session, Transcript, TranscriptStatus};
use serial_test::serial;
use std::collections::BTreeMap;

#[test]
#[serial]
fn env_root_folder_holds_service_toml() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var(ROOT_FOLDER_ENV, dir.path());

    let root = RootFolderResolver::new(MODULE_NAME).resolve();
    std::env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(root, dir.path());

    let initializer = RootFolderInitializer::new(root);
    let config_path = initializer.service_config_path(MODULE_NAME);
    assert_eq!(config_path, dir.path().join("ruach-studio.toml"));

    std::fs::write(
        &config_path,
        r#"
        [server]
        port = 6100

        [transcription]
        provider = "http"
        endpoint = "http://127.0.0.1:9/transcribe"

        [edl]
        strategy = "fixed-interval"
        fixed_interval_ms = 4000
        "#,
    )
    .unwrap();

    let config = StudioConfig::load(&config_path).unwrap();
    assert_eq!(config.server.port, 6100);
    assert_eq!(config.server.bind_address, "127.0.0.1");
    assert_eq!(config.transcription.provider, ProviderKind::Http);
    assert_eq!(config.edl.strategy, "fixed-interval");
    assert_eq!(config.edl.fixed_interval_ms, 4000);
}

#[test]
#[serial]
fn cli_root_folder_beats_environment() {
    std::env::set_var(ROOT_FOLDER_ENV, "/tmp/ruach-from-env");
    let root = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(Some("/tmp/ruach-from-cli".into()))
        .resolve();
    std::env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(root, std::path::PathBuf::from("/tmp/ruach-from-cli"));
}

#[tokio::test]
async fn database_file_survives_reopen_and_stale_transcripts_fail() {
    let dir = tempfile::tempdir().unwrap();
    let initializer = RootFolderInitializer::new(dir.path().to_path_buf());
    let db_path = initializer.database_path();

    let session = Session::new("Restarted");
    {
        let pool = ruach_studio::db::init_database_pool(&db_path).await.unwrap();
        ruach_studio::db::save_session(&pool, &session).await.unwrap();
        let transcript = Transcript::processing(session.id, "mock", "A", BTreeMap::new());
        ruach_studio::db::save_transcript(&pool, &transcript).await.unwrap();
        pool.close().await;
    }

    let pool = ruach_studio::db::init_database_pool(&db_path).await.unwrap();
    assert!(ruach_studio::db::load_session(&pool, session.id).await.unwrap().is_some());
    assert_eq!(ruach_studio::db::fail_stale_transcripts(&pool).await.unwrap(), 1);

    let transcript = ruach_studio::db::load_transcript(&pool, session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transcript.status, TranscriptStatus::Failed);
}
