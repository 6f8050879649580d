//! Operator-adjustable sync settings stored in the shared `settings` table
//!
//! Database values override the TOML configuration at runtime.

use ruach_common::db::{get_setting, set_setting};
use ruach_common::Result;
use sqlx::SqlitePool;

use crate::models::SyncThresholds;

const REVIEW_THRESHOLD_KEY: &str = "sync_review_threshold";
const LOOKS_GOOD_THRESHOLD_KEY: &str = "sync_looks_good_threshold";
const AUTO_APPROVE_KEY: &str = "sync_auto_approve";

/// Thresholds and auto-approve flag, with `defaults` filling unset keys
pub async fn load_sync_settings(
    pool: &SqlitePool,
    defaults: SyncThresholds,
    default_auto_approve: bool,
) -> Result<(SyncThresholds, bool)> {
    let review = get_setting::<f64>(pool, REVIEW_THRESHOLD_KEY).await?;
    let looks_good = get_setting::<f64>(pool, LOOKS_GOOD_THRESHOLD_KEY).await?;
    let auto_approve = get_setting::<bool>(pool, AUTO_APPROVE_KEY).await?;

    Ok((
        SyncThresholds {
            review_threshold: review.unwrap_or(defaults.review_threshold),
            looks_good_threshold: looks_good.unwrap_or(defaults.looks_good_threshold),
        },
        auto_approve.unwrap_or(default_auto_approve),
    ))
}

pub async fn save_sync_settings(
    pool: &SqlitePool,
    thresholds: SyncThresholds,
    auto_approve: bool,
) -> Result<()> {
    set_setting(pool, REVIEW_THRESHOLD_KEY, thresholds.review_threshold).await?;
    set_setting(pool, LOOKS_GOOD_THRESHOLD_KEY, thresholds.looks_good_threshold).await?;
    set_setting(pool, AUTO_APPROVE_KEY, auto_approve).await?;
    Ok(())
}
