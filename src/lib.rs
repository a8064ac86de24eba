pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::SyncConfig;
pub use crate::core::{DownloadReport, SyncEngine, SyncReport, UploadReport};
pub use error::{SyncError, SyncResult};
