// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use bytes::Bytes;
use log::{debug, warn};
use lru::LruCache;

use crate::exception::Exception;

#[derive(Clone)]
struct CacheEntry {
    content: Bytes,
    modified_time: SystemTime,
}

/// 视图文件缓存：按路径和修改时间缓存 Tile 引用的视图文件内容。
///
/// 文件被修改后，修改时间不再匹配，下一次读取会重新加载。
pub struct ViewCache {
    root: PathBuf,
    cache: Mutex<LruCache<String, CacheEntry>>,
}

impl ViewCache {
    // 根据容量构造，容量为0时按1处理
    pub fn from_capacity(root: &Path, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            root: root.to_path_buf(),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        match self.cache.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("视图缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    // 放入
    fn push(&self, filename: &str, bytes: Bytes, modified_time: SystemTime) {
        let entry = CacheEntry {
            content: bytes,
            modified_time,
        };
        self.lock().put(filename.to_string(), entry);
    }

    // 查询有效缓存
    fn find(&self, filename: &str, current_modified_time: SystemTime) -> Option<Bytes> {
        match self.lock().get(filename) {
            Some(entry) if entry.modified_time == current_modified_time => {
                Some(entry.content.clone())
            }
            _ => None,
        }
    }

    /// 把视图路径解析到视图根目录下。拒绝绝对路径和 `..`，防止越出根目录。
    pub fn resolve(&self, view: &str) -> Result<PathBuf, Exception> {
        let relative = Path::new(view.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || view.is_empty() {
            warn!("非法的视图路径：{}", view);
            return Err(Exception::ViewNotFound(view.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// 读取视图文件，命中缓存时不访问文件内容
    pub fn read(&self, view: &str) -> Result<Bytes, Exception> {
        let path = self.resolve(view)?;
        let modified_time = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|_| Exception::ViewNotFound(view.to_string()))?;

        if let Some(bytes) = self.find(view, modified_time) {
            debug!("视图缓存命中：{}", view);
            return Ok(bytes);
        }
        debug!("视图缓存未命中或文件已修改：{}", view);
        let bytes = Bytes::from(
            fs::read(&path).map_err(|_| Exception::ViewNotFound(view.to_string()))?,
        );
        self.push(view, bytes.clone(), modified_time);
        Ok(bytes)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cache_with_files(capacity: usize, files: &[(&str, &str)]) -> (tempfile::TempDir, ViewCache) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let cache = ViewCache::from_capacity(dir.path(), capacity);
        (dir, cache)
    }

    #[test]
    fn test_cache_creation() {
        let (_dir, cache) = cache_with_files(10, &[]);
        assert_eq!(cache.capacity(), 10);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_zero_capacity_becomes_one() {
        let (_dir, cache) = cache_with_files(0, &[]);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_read_and_hit() {
        let (_dir, cache) = cache_with_files(3, &[("a.html", "hello")]);

        assert_eq!(cache.read("a.html").unwrap(), Bytes::from("hello"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.read("/a.html").unwrap(), Bytes::from("hello"));
    }

    #[test]
    fn test_cache_modified_time_invalidation() {
        let (dir, cache) = cache_with_files(3, &[]);
        let time1 = SystemTime::now();
        let time2 = time1 + Duration::from_secs(10);

        cache.push("file1.txt", Bytes::from("old"), time1);
        assert!(cache.find("file1.txt", time2).is_none());
        assert!(cache.find("file1.txt", time1).is_some());
        drop(dir);
    }

    #[test]
    fn test_cache_lru_eviction() {
        let (_dir, cache) = cache_with_files(2, &[]);
        let time = SystemTime::now();

        cache.push("file1.txt", Bytes::from("content1"), time);
        cache.push("file2.txt", Bytes::from("content2"), time);
        cache.find("file1.txt", time);
        cache.push("file3.txt", Bytes::from("content3"), time);

        assert_eq!(cache.len(), 2);
        assert!(cache.find("file2.txt", time).is_none());
        assert!(cache.find("file1.txt", time).is_some());
        assert!(cache.find("file3.txt", time).is_some());
    }

    #[test]
    fn test_missing_view() {
        let (_dir, cache) = cache_with_files(3, &[]);
        assert_eq!(
            cache.read("nope.html"),
            Err(Exception::ViewNotFound("nope.html".to_string()))
        );
    }

    #[test]
    fn test_traversal_rejected() {
        let (_dir, cache) = cache_with_files(3, &[]);
        assert!(cache.resolve("../secret.txt").is_err());
        assert!(cache.resolve("a/../../b").is_err());
        assert!(cache.resolve("").is_err());
        assert!(cache.resolve("layout/main.html").is_ok());
    }
}
