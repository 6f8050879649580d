//! SQLite pool initialisation and the shared settings table

pub mod init;
pub mod settings;

pub use init::*;
pub use settings::{get_setting, set_setting};
