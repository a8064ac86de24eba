use super::{ListedObject, ObjectMeta, ObjectStream, Storage, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::config::SyncConfig;
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use opendal::{layers::TimeoutLayer, Operator};
use std::collections::HashMap;
use std::time::Duration;

pub struct S3Storage {
    operator: Operator,
    name: String,
}

impl S3Storage {
    /// 根据同步配置创建 S3 存储
    ///
    /// 未配置 access_key/secret_key 时由 OpenDAL 从环境变量加载凭证。
    /// 前缀不作为 root 设置，对象键由调用方完整给出。
    pub fn new(config: &SyncConfig) -> Result<Self> {
        use opendal::services::S3;

        let mut builder = S3::default().bucket(&config.bucket).region(&config.region);

        if let Some(ref key) = config.access_key {
            builder = builder.access_key_id(key);
        }
        if let Some(ref secret) = config.secret_key {
            builder = builder.secret_access_key(secret);
        }
        if let Some(ref ep) = config.endpoint {
            builder = builder.endpoint(ep);
        }

        // 添加超时层
        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        Ok(Self {
            operator,
            name: format!("s3://{}", config.bucket),
        })
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn stat(&self, key: &str) -> Result<Option<ObjectMeta>> {
        match self.operator.stat(key).await {
            Ok(meta) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: meta.content_length(),
                last_modified: meta.last_modified(),
                user_metadata: meta.user_metadata().cloned().unwrap_or_default(),
            })),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let data = self.operator.read(key).await?;
        Ok(data.to_vec())
    }

    async fn write(
        &self,
        key: &str,
        data: Vec<u8>,
        user_metadata: HashMap<String, String>,
    ) -> Result<()> {
        self.operator
            .write_with(key, data)
            .user_metadata(user_metadata)
            .await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<ObjectStream<'_>> {
        // lister 内部按页请求 ListObjectsV2
        let lister = self
            .operator
            .lister_with(prefix)
            .recursive(true)
            .await?;

        let stream = lister.map(|entry| -> Result<ListedObject> {
            let entry = entry?;
            let meta = entry.metadata();
            Ok(ListedObject {
                key: entry.path().trim_start_matches('/').to_string(),
                size: meta.content_length(),
                last_modified: meta.last_modified(),
            })
        });

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
