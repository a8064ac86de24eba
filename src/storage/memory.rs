//! 进程内对象存储
//!
//! 以 BTreeMap 模拟存储桶，支持按对象注入读、写、stat 失败以及列举中途失败，
//! 用于在不访问网络的情况下驱动同步引擎。

use super::{ListedObject, ObjectMeta, ObjectStream, Storage};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// 内存中保存的对象
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub last_modified: DateTime<Utc>,
    pub user_metadata: HashMap<String, String>,
}

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<String, StoredObject>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    failing_stats: HashSet<String>,
    /// 列举出 N 个对象后返回错误
    list_fail_after: Option<usize>,
    writes: u64,
}

pub struct MemoryStorage {
    state: Mutex<MemoryState>,
    name: String,
}

impl MemoryStorage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            name: format!("memory://{}", name.into()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // 锁内从不 await，中毒时数据依然一致
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 直接放入一个对象（不计入写入次数）
    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>, last_modified: DateTime<Utc>) {
        self.insert_with_metadata(key, data, last_modified, HashMap::new());
    }

    pub fn insert_with_metadata(
        &self,
        key: &str,
        data: impl Into<Vec<u8>>,
        last_modified: DateTime<Utc>,
        user_metadata: HashMap<String, String>,
    ) {
        self.state().objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified,
                user_metadata,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.state().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state().objects.keys().cloned().collect()
    }

    /// 通过 write 成功写入的次数
    pub fn write_count(&self) -> u64 {
        self.state().writes
    }

    pub fn fail_reads_for(&self, key: &str) {
        self.state().failing_reads.insert(key.to_string());
    }

    pub fn fail_writes_for(&self, key: &str) {
        self.state().failing_writes.insert(key.to_string());
    }

    pub fn fail_stats_for(&self, key: &str) {
        self.state().failing_stats.insert(key.to_string());
    }

    pub fn fail_listing_after(&self, count: usize) {
        self.state().list_fail_after = Some(count);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn stat(&self, key: &str) -> Result<Option<ObjectMeta>> {
        let state = self.state();
        if state.failing_stats.contains(key) {
            return Err(anyhow!("simulated stat failure: {}", key));
        }
        Ok(state.objects.get(key).map(|obj| ObjectMeta {
            key: key.to_string(),
            size: obj.data.len() as u64,
            last_modified: Some(obj.last_modified),
            user_metadata: obj.user_metadata.clone(),
        }))
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let state = self.state();
        if state.failing_reads.contains(key) {
            return Err(anyhow!("simulated read failure: {}", key));
        }
        state
            .objects
            .get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| anyhow!("object not found: {}", key))
    }

    async fn write(
        &self,
        key: &str,
        data: Vec<u8>,
        user_metadata: HashMap<String, String>,
    ) -> Result<()> {
        let mut state = self.state();
        if state.failing_writes.contains(key) {
            return Err(anyhow!("simulated write failure: {}", key));
        }
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
                user_metadata,
            },
        );
        state.writes += 1;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<ObjectStream<'_>> {
        let (objects, fail_after) = {
            let state = self.state();
            let objects: Vec<ListedObject> = state
                .objects
                .range(prefix.to_string()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, obj)| ListedObject {
                    key: key.clone(),
                    size: obj.data.len() as u64,
                    last_modified: Some(obj.last_modified),
                })
                .collect();
            (objects, state.list_fail_after)
        };

        let mut items: Vec<Result<ListedObject>> = Vec::with_capacity(objects.len() + 1);
        for (i, obj) in objects.into_iter().enumerate() {
            if fail_after == Some(i) {
                break;
            }
            items.push(Ok(obj));
        }
        if let Some(n) = fail_after {
            if items.len() == n {
                items.push(Err(anyhow!("simulated listing failure after {} objects", n)));
            }
        }

        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
