//! 上传：扫描本地目录，按校验和决定是否上传

use crate::config::SyncConfig;
use crate::core::checksum::checksum;
use crate::core::keymap::local_to_key;
use crate::core::probe::{probe, ObjectAttributes, TransferDecision};
use crate::core::scanner::{FileScanner, LocalEntry};
use crate::error::{SyncError, SyncResult};
use crate::storage::Storage;
use futures::TryStreamExt;
use serde::Serialize;
use std::io::SeekFrom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error, info};

/// 上传结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub transferred: u64,
    pub skipped: u64,
}

/// 单个文件的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Transferred,
    Skipped,
}

#[derive(Debug, Default)]
struct UploadStats {
    transferred: AtomicU64,
    skipped: AtomicU64,
}

/// 上传器
///
/// 任意文件的打开、读取或上传失败都会中止整个上传并返回该错误。
pub struct Uploader {
    config: SyncConfig,
    storage: Arc<dyn Storage>,
}

impl Uploader {
    pub fn new(config: SyncConfig, storage: Arc<dyn Storage>) -> Self {
        Self { config, storage }
    }

    pub async fn run(&self) -> SyncResult<UploadReport> {
        let root = self.config.save_directory.clone();
        let entries = tokio::task::spawn_blocking(move || FileScanner::new(root).scan())
            .await
            .map_err(|e| {
                SyncError::io(
                    &self.config.save_directory,
                    std::io::Error::new(std::io::ErrorKind::Other, e),
                )
            })??;

        let stats = UploadStats::default();
        let concurrency = self.config.max_concurrent_transfers.max(1);

        let result = futures::stream::iter(entries.iter().map(Ok))
            .try_for_each_concurrent(concurrency, |entry| {
                let stats = &stats;
                async move {
                    match self.upload_file(entry).await? {
                        FileOutcome::Transferred => stats.transferred.fetch_add(1, Ordering::Relaxed),
                        FileOutcome::Skipped => stats.skipped.fetch_add(1, Ordering::Relaxed),
                    };
                    Ok::<_, SyncError>(())
                }
            })
            .await;

        let report = UploadReport {
            transferred: stats.transferred.load(Ordering::Relaxed),
            skipped: stats.skipped.load(Ordering::Relaxed),
        };

        if let Err(e) = result {
            error!(
                "上传中止 (已上传 {}, 已跳过 {}): {}",
                report.transferred, report.skipped, e
            );
            return Err(e);
        }

        Ok(report)
    }

    async fn upload_file(&self, entry: &LocalEntry) -> SyncResult<FileOutcome> {
        let path = &entry.absolute_path;

        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| SyncError::io(path, e))?;

        let local_checksum = checksum(&mut file)
            .await
            .map_err(|e| SyncError::io(path, e))?;

        // 回到文件开头供上传读取
        file.seek(SeekFrom::Start(0))
            .await
            .map_err(|e| SyncError::io(path, e))?;

        let key = local_to_key(&entry.relative_path, &self.config.prefix);

        let outcome = probe(self.storage.as_ref(), &key).await;
        let decision = TransferDecision::decide(&outcome, &local_checksum);
        if !decision.should_transfer {
            debug!("跳过 {:?}（未变化）", path);
            return Ok(FileOutcome::Skipped);
        }

        let mut data = Vec::with_capacity(entry.size_hint as usize);
        file.read_to_end(&mut data)
            .await
            .map_err(|e| SyncError::io(path, e))?;

        let size = data.len();
        let attributes = ObjectAttributes {
            last_modified: entry.modified,
            checksum: local_checksum,
        };

        self.storage
            .write(&key, data, attributes.into_user_metadata())
            .await
            .map_err(|e| SyncError::transport(&key, e))?;

        info!(
            "已上传 {:?} -> {}/{} ({} 字节, {:?})",
            path,
            self.storage.name(),
            key,
            size,
            decision.reason
        );

        Ok(FileOutcome::Transferred)
    }
}
