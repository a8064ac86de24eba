use crate::core::keymap::relative_key;
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// 隐藏文件标记
pub const HIDDEN_MARKER: char = '.';

/// 本地文件条目
#[derive(Debug, Clone)]
pub struct LocalEntry {
    pub absolute_path: PathBuf,
    /// 相对 root 的路径，始终使用 `/` 分隔
    pub relative_path: String,
    pub modified: DateTime<Utc>,
    pub size_hint: u64,
}

/// 本地文件扫描器
pub struct FileScanner {
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn is_hidden(entry: &DirEntry) -> bool {
        // root 本身即使是隐藏目录也要扫描
        entry.depth() > 0
            && entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(HIDDEN_MARKER))
                .unwrap_or(false)
    }

    /// 扫描 root 下的所有普通文件
    ///
    /// 隐藏文件和隐藏目录（连同其子树）被排除；任何访问错误都会中止扫描。
    pub fn scan(&self) -> SyncResult<Vec<LocalEntry>> {
        info!("开始扫描本地目录: {:?}", self.root);

        let mut entries = Vec::new();
        let mut hidden_count = 0usize;

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                let hidden = Self::is_hidden(e);
                if hidden {
                    debug!("排除隐藏条目: {:?}", e.path());
                    hidden_count += 1;
                }
                !hidden
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone());
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "目录遍历出现循环"));
                SyncError::io(path, source)
            })?;

            if entry.file_type().is_dir() {
                continue;
            }

            // 跟随符号链接判断是否为普通文件
            let metadata = std::fs::metadata(entry.path())
                .map_err(|e| SyncError::io(entry.path(), e))?;
            if !metadata.is_file() {
                continue;
            }

            let Some(relative_path) = relative_key(&self.root, entry.path()) else {
                warn!("文件名无法映射为对象键，跳过: {:?}", entry.path());
                continue;
            };

            let modified = metadata
                .modified()
                .map_err(|e| SyncError::io(entry.path(), e))?;

            entries.push(LocalEntry {
                absolute_path: entry.path().to_path_buf(),
                relative_path,
                modified: DateTime::<Utc>::from(modified),
                size_hint: metadata.len(),
            });
        }

        info!(
            "扫描完成: {} 个文件, {} 个隐藏条目被排除",
            entries.len(),
            hidden_count
        );

        Ok(entries)
    }
}
