pub mod memory;
pub mod s3;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;

pub use memory::MemoryStorage;
pub use s3::S3Storage;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, list 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 对象元数据（head / stat 结果）
#[derive(Debug, Clone, Default)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// 用户自定义元数据（S3 上对应 x-amz-meta-*）
    pub user_metadata: HashMap<String, String>,
}

/// 列举结果中的单个对象
#[derive(Debug, Clone)]
pub struct ListedObject {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// 列举结果流，分页由具体实现内部处理
pub type ObjectStream<'a> = Pin<Box<dyn Stream<Item = Result<ListedObject>> + Send + 'a>>;

/// 对象存储抽象接口
#[async_trait]
pub trait Storage: Send + Sync {
    /// 获取对象元数据，对象不存在时返回 None
    async fn stat(&self, key: &str) -> Result<Option<ObjectMeta>>;

    /// 读取整个对象
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// 写入对象并附带用户元数据
    async fn write(
        &self,
        key: &str,
        data: Vec<u8>,
        user_metadata: HashMap<String, String>,
    ) -> Result<()>;

    /// 递归列出前缀下的所有对象
    async fn list(&self, prefix: &str) -> Result<ObjectStream<'_>>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}
