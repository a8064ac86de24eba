//! 本地相对路径与远程对象键之间的映射

use std::path::{Component, Path, PathBuf};

/// 对象键分隔符
pub const KEY_SEPARATOR: char = '/';

/// 规范化前缀：去掉首尾分隔符并合并连续分隔符
///
/// 对象存储会以同样方式规范化键，上传、列举和下载必须使用同一形式。
pub fn normalize_prefix(prefix: &str) -> String {
    prefix
        .trim()
        .split(KEY_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// 本地相对路径 -> 对象键
///
/// 前缀与路径之间始终只有一个分隔符；前缀为空时键即为相对路径。
pub fn local_to_key(relative_path: &str, prefix: &str) -> String {
    let relative_path = relative_path.trim_start_matches(KEY_SEPARATOR);
    if prefix.is_empty() {
        return relative_path.to_string();
    }

    let mut key = String::with_capacity(prefix.len() + relative_path.len() + 1);
    key.push_str(prefix);
    if !prefix.ends_with(KEY_SEPARATOR) {
        key.push(KEY_SEPARATOR);
    }
    key.push_str(relative_path);
    key
}

/// 对象键 -> 本地绝对路径
///
/// 去掉键开头的前缀及其后紧跟的一个分隔符，剩余部分拼接到 root 上。
/// 键不以前缀开头时整个键作为相对路径。目录标记、空路径以及会落到
/// root 之外的键返回 None。
pub fn key_to_local(key: &str, prefix: &str, root: &Path) -> Option<PathBuf> {
    if is_dir_marker(key) {
        return None;
    }

    let relative = key_remainder(key, prefix);
    if relative.is_empty() {
        return None;
    }

    let mut path = root.to_path_buf();
    for segment in relative.split(KEY_SEPARATOR) {
        if segment.is_empty() || segment == "." || segment == ".." {
            return None;
        }
        // 拒绝在 Windows 上会被解释为盘符或根路径的片段
        if Path::new(segment)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        path.push(segment);
    }

    Some(path)
}

/// 去掉前缀后的相对部分
fn key_remainder<'a>(key: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return key;
    }
    match key.strip_prefix(prefix) {
        Some(rest) => rest.strip_prefix(KEY_SEPARATOR).unwrap_or(rest),
        None => key,
    }
}

/// 以分隔符结尾的键是零长度的“目录”占位对象
pub fn is_dir_marker(key: &str) -> bool {
    key.ends_with(KEY_SEPARATOR)
}

/// 计算本地文件相对 root 的路径，统一使用 `/` 分隔
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// 列举时使用的前缀（目录形式）
pub fn listing_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with(KEY_SEPARATOR) {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, KEY_SEPARATOR)
    }
}
