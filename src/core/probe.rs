//! 远程元数据探测与传输决策

use crate::core::checksum::is_valid_checksum;
use crate::storage::{ObjectMeta, Storage};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// 用户元数据：本地文件最后修改时间（RFC 3339）
pub const META_LAST_MODIFIED: &str = "system-last-modified";
/// 用户元数据：内容 SHA-256（小写十六进制）
pub const META_CHECKSUM: &str = "sha256-checksum";
/// 早期版本把完整的 HTTP 头名当作元数据键写入
pub const LEGACY_META_CHECKSUM: &str = "x-amz-meta-sha256-checksum";

/// 远程对象
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    /// 上传时记录的校验和，缺失或格式不对时为 None
    pub stored_checksum: Option<String>,
}

impl RemoteObject {
    pub fn from_meta(meta: &ObjectMeta) -> Self {
        Self {
            key: meta.key.clone(),
            last_modified: meta.last_modified,
            stored_checksum: lookup(&meta.user_metadata, META_CHECKSUM)
                .or_else(|| lookup(&meta.user_metadata, LEGACY_META_CHECKSUM))
                .map(str::trim)
                .filter(|v| is_valid_checksum(v))
                .map(str::to_ascii_lowercase),
        }
    }
}

/// 元数据键大小写不敏感查找（S3 返回的键可能被转为小写）
fn lookup<'a>(metadata: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    metadata
        .get(name)
        .or_else(|| {
            metadata
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

/// 上传时附加到对象上的属性
#[derive(Debug, Clone)]
pub struct ObjectAttributes {
    pub last_modified: DateTime<Utc>,
    pub checksum: String,
}

impl ObjectAttributes {
    pub fn into_user_metadata(self) -> HashMap<String, String> {
        HashMap::from([
            (
                META_LAST_MODIFIED.to_string(),
                self.last_modified.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (META_CHECKSUM.to_string(), self.checksum.to_ascii_lowercase()),
        ])
    }
}

/// 探测结果
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Found(RemoteObject),
    NotFound,
    /// 探测出错，按不存在处理
    Unavailable(String),
}

/// 仅查询元数据，任何错误都不会中止同步
pub async fn probe(storage: &dyn Storage, key: &str) -> ProbeOutcome {
    match storage.stat(key).await {
        Ok(Some(meta)) => ProbeOutcome::Found(RemoteObject::from_meta(&meta)),
        Ok(None) => ProbeOutcome::NotFound,
        Err(e) => {
            warn!("查询远程元数据失败，将重新上传: {} - {}", key, e);
            ProbeOutcome::Unavailable(e.to_string())
        }
    }
}

/// 决策原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    Unchanged,
    NotFound,
    ProbeFailed,
    ChecksumMismatch,
    ChecksumMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDecision {
    pub should_transfer: bool,
    pub reason: DecisionReason,
}

impl TransferDecision {
    fn transfer(reason: DecisionReason) -> Self {
        Self {
            should_transfer: true,
            reason,
        }
    }

    /// 只有远程存在且记录的校验和与本地一致时才跳过
    pub fn decide(outcome: &ProbeOutcome, local_checksum: &str) -> Self {
        let decision = match outcome {
            ProbeOutcome::NotFound => Self::transfer(DecisionReason::NotFound),
            ProbeOutcome::Unavailable(_) => Self::transfer(DecisionReason::ProbeFailed),
            ProbeOutcome::Found(remote) => match remote.stored_checksum.as_deref() {
                None => Self::transfer(DecisionReason::ChecksumMissing),
                Some(stored) if stored.eq_ignore_ascii_case(local_checksum) => Self {
                    should_transfer: false,
                    reason: DecisionReason::Unchanged,
                },
                Some(_) => Self::transfer(DecisionReason::ChecksumMismatch),
            },
        };
        debug!("传输决策: {:?}", decision);
        decision
    }
}
