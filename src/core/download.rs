//! 下载：列举远程前缀并逐个拉取对象
//!
//! 与上传不同，单个对象失败只记录日志并跳过，只有列举本身失败才会中止。
//! 下载不做校验和比较，每个列出的对象都会重新拉取。

use crate::config::SyncConfig;
use crate::core::keymap::{is_dir_marker, key_to_local, listing_prefix};
use crate::core::probe::RemoteObject;
use crate::error::{SyncError, SyncResult};
use crate::storage::{ListedObject, Storage};
use filetime::FileTime;
use futures::StreamExt;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

/// 下载结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReport {
    pub downloaded: u64,
    /// 被跳过的失败对象数
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    Downloaded,
    /// 目录占位对象
    Ignored,
    Failed,
}

pub struct Downloader {
    config: SyncConfig,
    storage: Arc<dyn Storage>,
}

impl Downloader {
    pub fn new(config: SyncConfig, storage: Arc<dyn Storage>) -> Self {
        Self { config, storage }
    }

    pub async fn run(&self) -> SyncResult<DownloadReport> {
        let prefix = listing_prefix(&self.config.prefix);
        let mut report = DownloadReport::default();

        info!("开始列举远程对象: {} (prefix={:?})", self.storage.name(), prefix);

        let listing = self
            .storage
            .list(&prefix)
            .await
            .map_err(|e| Self::listing_error(&prefix, report.downloaded, e))?;

        // 列举出错时停止产出新对象，已开始的下载照常完成
        let mut listing_failure: Option<anyhow::Error> = None;
        let objects = listing.scan(&mut listing_failure, |failure, item| {
            futures::future::ready(match item {
                Ok(object) => Some(object),
                Err(e) => {
                    **failure = Some(e);
                    None
                }
            })
        });

        let concurrency = self.config.max_concurrent_transfers.max(1);
        let mut results = objects
            .map(|object| self.fetch(object))
            .buffer_unordered(concurrency);

        while let Some(outcome) = results.next().await {
            match outcome {
                FetchOutcome::Downloaded => report.downloaded += 1,
                FetchOutcome::Failed => report.failed += 1,
                FetchOutcome::Ignored => {}
            }
        }
        drop(results);

        if let Some(e) = listing_failure {
            let err = Self::listing_error(&prefix, report.downloaded, e);
            error!("{}", err);
            return Err(err);
        }

        info!(
            "下载完成: {} 个成功, {} 个失败",
            report.downloaded, report.failed
        );

        Ok(report)
    }

    fn listing_error(prefix: &str, downloaded: u64, source: anyhow::Error) -> SyncError {
        SyncError::Listing {
            prefix: prefix.to_string(),
            downloaded,
            source: source.into(),
        }
    }

    async fn fetch(&self, listed: ListedObject) -> FetchOutcome {
        let listed_size = listed.size;
        let object = RemoteObject {
            key: listed.key,
            last_modified: listed.last_modified,
            stored_checksum: None,
        };

        if is_dir_marker(&object.key) {
            debug!("跳过目录占位对象: {}", object.key);
            return FetchOutcome::Ignored;
        }

        let Some(local_path) =
            key_to_local(&object.key, &self.config.prefix, &self.config.save_directory)
        else {
            warn!("对象键无法映射到本地路径，跳过: {}", object.key);
            return FetchOutcome::Failed;
        };

        if let Some(parent) = local_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("创建目录失败 {:?}: {}", parent, e);
                return FetchOutcome::Failed;
            }
        }

        // 先拉取内容，避免传输失败时截断已有的本地文件
        let data = match self.storage.read(&object.key).await {
            Ok(data) => data,
            Err(e) => {
                warn!("下载失败 {}: {}", object.key, e);
                return FetchOutcome::Failed;
            }
        };
        if data.len() as u64 != listed_size {
            // 列举与读取之间对象可能已被覆盖，以实际读取的内容为准
            warn!(
                "对象大小与列举结果不一致 {}: 列举 {} 字节, 实际 {} 字节",
                object.key,
                listed_size,
                data.len()
            );
        }

        if let Err(e) = Self::write_local(&local_path, &data).await {
            warn!("写入本地文件失败 {:?}: {}", local_path, e);
            if let Err(e) = tokio::fs::remove_file(&local_path).await {
                warn!("删除不完整文件失败 {:?}: {}", local_path, e);
            }
            return FetchOutcome::Failed;
        }

        if let Some(modified) = object.last_modified {
            let time = FileTime::from_unix_time(modified.timestamp(), modified.timestamp_subsec_nanos());
            if let Err(e) = filetime::set_file_times(&local_path, time, time) {
                warn!("设置修改时间失败 {:?}: {}", local_path, e);
            }
        }

        info!(
            "已下载 {}/{} -> {:?} ({} 字节)",
            self.storage.name(),
            object.key,
            local_path,
            data.len()
        );

        FetchOutcome::Downloaded
    }

    async fn write_local(path: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await
    }
}
