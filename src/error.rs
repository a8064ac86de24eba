//! 同步错误类型

use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 同步过程中可能出现的错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// 配置缺失或无效，在任何传输开始前返回
    #[error("配置无效: {0}")]
    ConfigInvalid(String),

    /// 本地文件读写失败
    #[error("本地文件操作失败 {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 对象存储数据传输失败
    #[error("传输失败 {key}: {source}")]
    Transport {
        key: String,
        #[source]
        source: BoxError,
    },

    /// 列举远程对象失败（下载中止）
    #[error("列举远程对象失败 (prefix={prefix:?}, 已下载 {downloaded} 个): {source}")]
    Listing {
        prefix: String,
        downloaded: u64,
        #[source]
        source: BoxError,
    },

    /// 创建存储后端失败
    #[error("初始化存储失败: {0}")]
    Storage(#[source] BoxError),
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn transport(key: impl Into<String>, source: anyhow::Error) -> Self {
        SyncError::Transport {
            key: key.into(),
            source: source.into(),
        }
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
