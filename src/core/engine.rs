use crate::config::SyncConfig;
use crate::core::download::{DownloadReport, Downloader};
use crate::core::keymap::normalize_prefix;
use crate::core::upload::{UploadReport, Uploader};
use crate::error::{SyncError, SyncResult};
use crate::storage::{S3Storage, Storage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// 同步方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Upload,
    Download,
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub transferred: u64,
    /// 仅上传：校验和一致而跳过的文件数
    pub skipped: u64,
    /// 仅下载：失败后跳过的对象数
    pub failed: u64,
}

/// 同步引擎
///
/// 持有同步配置与存储句柄，对外提供上传与下载两个入口。
pub struct SyncEngine {
    config: SyncConfig,
    storage: Arc<dyn Storage>,
}

impl SyncEngine {
    pub fn new(mut config: SyncConfig, storage: Arc<dyn Storage>) -> Self {
        // prefix 是公开字段，构造后仍可能被改写
        config.prefix = normalize_prefix(&config.prefix);
        Self { config, storage }
    }

    /// 校验配置并连接 S3
    pub fn connect(config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        info!(
            "初始化S3存储: bucket={}, region={}, prefix={:?}",
            config.bucket, config.region, config.prefix
        );
        let storage = S3Storage::new(&config).map_err(|e| SyncError::Storage(e.into()))?;
        Ok(Self::new(config, Arc::new(storage)))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// 上传本地目录，返回 (已上传, 已跳过)
    pub async fn upload(&self) -> SyncResult<UploadReport> {
        self.config.validate_local_root()?;
        info!(
            "开始上传: {:?} -> {}",
            self.config.save_directory,
            self.config.remote_name()
        );

        let result = Uploader::new(self.config.clone(), self.storage.clone())
            .run()
            .await;

        match &result {
            Ok(report) => info!(
                "上传完成: 上传 {}, 跳过 {}",
                report.transferred, report.skipped
            ),
            Err(e) => error!("上传失败: {}", e),
        }
        result
    }

    /// 下载远程前缀下的所有对象，返回成功下载的数量
    pub async fn download(&self) -> SyncResult<DownloadReport> {
        self.config.validate_local_root()?;
        info!(
            "开始下载: {} -> {:?}",
            self.config.remote_name(),
            self.config.save_directory
        );

        let result = Downloader::new(self.config.clone(), self.storage.clone())
            .run()
            .await;

        if let Err(e) = &result {
            error!("下载失败: {}", e);
        }
        result
    }

    /// 上传并生成带时间信息的报告
    pub async fn upload_report(&self) -> SyncResult<SyncReport> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let report = self.upload().await?;
        Ok(SyncReport {
            direction: SyncDirection::Upload,
            started_at,
            finished_at: Utc::now(),
            duration_ms: timer.elapsed().as_millis() as u64,
            transferred: report.transferred,
            skipped: report.skipped,
            failed: 0,
        })
    }

    /// 下载并生成带时间信息的报告
    pub async fn download_report(&self) -> SyncResult<SyncReport> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let report = self.download().await?;
        Ok(SyncReport {
            direction: SyncDirection::Download,
            started_at,
            finished_at: Utc::now(),
            duration_ms: timer.elapsed().as_millis() as u64,
            transferred: report.downloaded,
            skipped: 0,
            failed: report.failed,
        })
    }
}
