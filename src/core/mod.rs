pub mod checksum;
pub mod download;
pub mod engine;
pub mod keymap;
pub mod probe;
pub mod scanner;
pub mod upload;

pub use checksum::{checksum, checksum_bytes};
pub use download::{DownloadReport, Downloader};
pub use engine::{SyncDirection, SyncEngine, SyncReport};
pub use keymap::{is_dir_marker, key_to_local, local_to_key};
pub use probe::{probe, DecisionReason, ProbeOutcome, RemoteObject, TransferDecision};
pub use scanner::{FileScanner, LocalEntry};
pub use upload::{UploadReport, Uploader};
