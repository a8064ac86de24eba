//! 应用配置模块

use crate::core::keymap::normalize_prefix;
use crate::error::{SyncError, SyncResult};
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_max_concurrent_transfers() -> usize {
    4
}

/// 同步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 存储桶名称
    #[serde(default)]
    pub bucket: String,
    /// 对象键前缀，可为空
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// 本地存档目录
    #[serde(default)]
    pub save_directory: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// 自定义 S3 兼容端点
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// 最大并发传输数
    #[serde(default = "default_max_concurrent_transfers")]
    pub max_concurrent_transfers: usize,
    #[serde(default)]
    pub log: LogConfig,
}

impl SyncConfig {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>, save_directory: impl Into<PathBuf>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: normalize_prefix(&prefix.into()),
            region: default_region(),
            save_directory: save_directory.into(),
            access_key: None,
            secret_key: None,
            endpoint: None,
            max_concurrent_transfers: default_max_concurrent_transfers(),
            log: LogConfig::default(),
        }
    }

    /// 从 JSON 配置文件加载并校验
    pub fn load(path: &Path) -> SyncResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::ConfigInvalid(format!("无法读取配置文件 {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> SyncResult<Self> {
        let mut config: SyncConfig = serde_json::from_str(content)
            .map_err(|e| SyncError::ConfigInvalid(format!("无法解析配置文件: {}", e)))?;

        if config.region.trim().is_empty() {
            config.region = default_region();
        }
        config.prefix = normalize_prefix(&config.prefix);

        config.validate()?;
        Ok(config)
    }

    /// 校验配置，本地目录必须存在且为文件夹
    pub fn validate(&self) -> SyncResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(SyncError::ConfigInvalid("缺少存储桶名称 (bucket)".to_string()));
        }
        if self.max_concurrent_transfers == 0 {
            return Err(SyncError::ConfigInvalid(
                "max_concurrent_transfers 必须大于 0".to_string(),
            ));
        }
        self.validate_local_root()
    }

    pub(crate) fn validate_local_root(&self) -> SyncResult<()> {
        if self.save_directory.as_os_str().is_empty() {
            return Err(SyncError::ConfigInvalid(
                "缺少本地存档目录 (save_directory)".to_string(),
            ));
        }
        if !self.save_directory.exists() {
            return Err(SyncError::ConfigInvalid(format!(
                "本地存档目录不存在: {}",
                self.save_directory.display()
            )));
        }
        if !self.save_directory.is_dir() {
            return Err(SyncError::ConfigInvalid(format!(
                "本地存档路径不是文件夹: {}",
                self.save_directory.display()
            )));
        }
        Ok(())
    }

    /// 用于日志的远程位置描述
    pub fn remote_name(&self) -> String {
        if self.prefix.is_empty() {
            format!("s3://{}", self.bucket)
        } else {
            format!("s3://{}/{}", self.bucket, self.prefix)
        }
    }
}
