// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 前端控制器
//!
//! `StrutsController` 持有所有模块，并为每个请求选出负责的模块。
//! `ControllerCache` 按配置文件的修改时间缓存已加载的控制器，配置改动后下一次请求重新加载。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use log::{debug, info, warn};

use crate::{
    exception::Exception,
    module::{normalize_prefix, Module},
    param::BASE_CONFIG_FILE,
    registry::Registry,
};

const CONFIG_FILE_PREFIX: &str = "struts-config-";
const CONFIG_FILE_SUFFIX: &str = ".toml";

#[derive(Debug)]
pub struct StrutsController {
    base_uri: String,
    /// 前缀为空串的是默认模块
    modules: HashMap<String, Module>,
}

impl StrutsController {
    /// 由已经构建好的模块组成控制器。必须包含默认模块，前缀不能重复。
    pub fn new(base_uri: &str, modules: Vec<Module>) -> Result<Self, Exception> {
        let mut map = HashMap::new();
        for module in modules {
            let prefix = module.prefix().to_string();
            if map.insert(prefix.clone(), module).is_some() {
                return Err(Exception::DuplicateModulePrefix(prefix));
            }
        }
        if !map.contains_key("") {
            return Err(Exception::ConfigNotFound(BASE_CONFIG_FILE.to_string()));
        }
        Ok(Self {
            base_uri: base_uri.to_string(),
            modules: map,
        })
    }

    /// 扫描配置目录：`struts-config.toml` 是默认模块，
    /// `struts-config-<name>.toml` 是前缀为 `/<name>` 的模块。
    pub fn load(config_dir: &Path, base_uri: &str, registry: &Registry) -> Result<Self, Exception> {
        let base = config_dir.join(BASE_CONFIG_FILE);
        if !base.is_file() {
            return Err(Exception::ConfigNotFound(config_dir.display().to_string()));
        }
        let mut modules = vec![];
        for (path, prefix) in config_files(config_dir)? {
            debug!("载入模块配置：{}", path.display());
            modules.push(Module::load(&path, &prefix, registry)?);
        }
        let controller = Self::new(base_uri, modules)?;
        info!(
            "控制器载入完成，模块：{:?}",
            controller.prefixes()
        );
        Ok(controller)
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn module(&self, prefix: &str) -> Option<&Module> {
        self.modules.get(prefix)
    }

    pub fn prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self.modules.keys().map(|p| p.as_str()).collect();
        prefixes.sort_unstable();
        prefixes
    }

    /// 选出负责该路径的模块，并返回模块内的相对路径。
    ///
    /// 去掉基础 URI 后取第一段路径作为前缀查找；找不到时交给默认模块，相对路径保持不变。
    pub fn select_module(&self, path: &str) -> (&Module, String) {
        let path = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
        let relative = strip_base_uri(path, &self.base_uri);

        let (segment, rest) = match relative[1..].find('/') {
            Some(i) => relative.split_at(i + 1),
            None => (relative.as_str(), ""),
        };
        if segment.len() > 1 {
            if let Some(module) = self.modules.get(segment) {
                let rest = match rest.is_empty() {
                    true => "/".to_string(),
                    false => rest.to_string(),
                };
                return (module, rest);
            }
        }
        (self.default_module(), relative)
    }

    fn default_module(&self) -> &Module {
        // new() 保证默认模块一定存在
        &self.modules[""]
    }
}

/// 去掉基础 URI，结果总是以 `/` 开头
fn strip_base_uri(path: &str, base_uri: &str) -> String {
    let base = base_uri.trim_end_matches('/');
    let stripped = match path.strip_prefix(base) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    };
    match stripped.starts_with('/') {
        true => stripped.to_string(),
        false => format!("/{}", stripped),
    }
}

/// 配置目录下的全部模块配置文件及其默认前缀，按文件名排序
fn config_files(config_dir: &Path) -> Result<Vec<(PathBuf, String)>, Exception> {
    let entries = fs::read_dir(config_dir)
        .map_err(|e| Exception::ConfigIo(format!("{}: {}", config_dir.display(), e)))?;
    let mut files = vec![];
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let prefix = if name == BASE_CONFIG_FILE {
            String::new()
        } else {
            match name
                .strip_prefix(CONFIG_FILE_PREFIX)
                .and_then(|n| n.strip_suffix(CONFIG_FILE_SUFFIX))
            {
                Some(n) if !n.is_empty() => normalize_prefix(n),
                _ => continue,
            }
        };
        files.push((entry.path(), prefix));
    }
    files.sort();
    Ok(files)
}

/// 配置文件名与修改时间的快照
type Fingerprint = Vec<(PathBuf, Option<SystemTime>)>;

fn fingerprint(config_dir: &Path) -> Result<Fingerprint, Exception> {
    Ok(config_files(config_dir)?
        .into_iter()
        .map(|(path, _)| {
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
            (path, modified)
        })
        .collect())
}

/// 缓存已加载的控制器，配置文件有改动时重新加载。
///
/// 多个请求可能同时发现配置过期并各自重新加载，结果相同，最后写入的那份生效。
pub struct ControllerCache {
    config_dir: PathBuf,
    base_uri: String,
    cached: Mutex<Option<(Fingerprint, Arc<StrutsController>)>>,
}

impl ControllerCache {
    pub fn new(config_dir: &Path, base_uri: &str) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            base_uri: base_uri.to_string(),
            cached: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<(Fingerprint, Arc<StrutsController>)>> {
        match self.cached.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("控制器缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    pub fn get(&self, registry: &Registry) -> Result<Arc<StrutsController>, Exception> {
        let current = fingerprint(&self.config_dir)?;
        if let Some((fp, controller)) = self.lock().as_ref() {
            if *fp == current {
                return Ok(controller.clone());
            }
            info!("配置文件已修改，重新载入控制器");
        }
        let controller = Arc::new(StrutsController::load(&self.config_dir, &self.base_uri, registry)?);
        *self.lock() = Some((current, controller.clone()));
        Ok(controller)
    }

    /// 丢弃缓存，下一次请求重新加载
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ActionMapping;

    fn module(prefix: &str) -> Module {
        Module::new(prefix).with_mapping(
            ActionMapping::new("/users")
                .unwrap()
                .with_forward(crate::mapping::ActionForward::to("users")),
        )
    }

    #[test]
    fn test_select_module_with_base_uri() {
        let controller = StrutsController::new("/app/", vec![module(""), module("/admin")]).unwrap();

        let (m, sub) = controller.select_module("/app/admin/users");
        assert_eq!(m.prefix(), "/admin");
        assert_eq!(sub, "/users");

        let (m, sub) = controller.select_module("/app/admin");
        assert_eq!(m.prefix(), "/admin");
        assert_eq!(sub, "/");

        let (m, sub) = controller.select_module("/app/shop/cart?x=1");
        assert_eq!(m.prefix(), "");
        assert_eq!(sub, "/shop/cart");

        let (m, sub) = controller.select_module("/app/");
        assert_eq!(m.prefix(), "");
        assert_eq!(sub, "/");
    }

    #[test]
    fn test_select_module_root_base() {
        let controller = StrutsController::new("/", vec![module(""), module("/admin")]).unwrap();
        let (m, sub) = controller.select_module("/admin/users");
        assert_eq!(m.prefix(), "/admin");
        assert_eq!(sub, "/users");

        // 只是前缀相同的段不算命中
        let (m, sub) = controller.select_module("/administrator");
        assert_eq!(m.prefix(), "");
        assert_eq!(sub, "/administrator");
    }

    #[test]
    fn test_duplicate_prefix() {
        let result = StrutsController::new("/", vec![module(""), module("/a"), module("a/")]);
        assert_eq!(result.unwrap_err(), Exception::DuplicateModulePrefix("/a".to_string()));
    }

    #[test]
    fn test_missing_default_module() {
        assert!(matches!(
            StrutsController::new("/", vec![module("/a")]),
            Err(Exception::ConfigNotFound(_))
        ));
    }

    const BASE: &str = "[[action]]\npath = \"/home\"\nforward = \"home\"\n";

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("struts-config.toml"), BASE).unwrap();
        fs::write(dir.path().join("struts-config-admin.toml"), BASE).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let controller = StrutsController::load(dir.path(), "/", &Registry::new()).unwrap();
        assert_eq!(controller.prefixes(), vec!["", "/admin"]);
    }

    #[test]
    fn test_load_requires_base_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("struts-config-admin.toml"), BASE).unwrap();
        assert!(matches!(
            StrutsController::load(dir.path(), "/", &Registry::new()),
            Err(Exception::ConfigNotFound(_))
        ));
    }

    #[test]
    fn test_load_duplicate_prefix_from_override() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("struts-config.toml"), BASE).unwrap();
        fs::write(dir.path().join("struts-config-admin.toml"), BASE).unwrap();
        fs::write(
            dir.path().join("struts-config-backoffice.toml"),
            format!("prefix = \"/admin\"\n{}", BASE),
        )
        .unwrap();
        assert_eq!(
            StrutsController::load(dir.path(), "/", &Registry::new()).unwrap_err(),
            Exception::DuplicateModulePrefix("/admin".to_string())
        );
    }

    #[test]
    fn test_cache_reloads_on_change() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("struts-config.toml"), BASE).unwrap();
        let cache = ControllerCache::new(dir.path(), "/");
        let registry = Registry::new();

        let first = cache.get(&registry).unwrap();
        let second = cache.get(&registry).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // 新增文件改变了指纹
        fs::write(dir.path().join("struts-config-admin.toml"), BASE).unwrap();
        let third = cache.get(&registry).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert!(third.module("/admin").is_some());

        cache.invalidate();
        assert!(!cache.is_loaded());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_prefixed_path_reaches_module(base in "(/[a-z]{1,5})?", rest in "(/[a-z0-9]{1,6}){0,3}") {
            let controller = StrutsController::new(&base, vec![module(""), module("/admin")]).unwrap();
            let (m, sub) = controller.select_module(&format!("{}/admin{}", base, rest));
            prop_assert_eq!(m.prefix(), "/admin");
            let expected = if rest.is_empty() { "/".to_string() } else { rest.clone() };
            prop_assert_eq!(sub, expected);
        }

        #[test]
        fn prop_unprefixed_path_keeps_relative_path(base in "(/[a-z]{1,5})?", rest in "/(x[a-z0-9]{0,6})(/[a-z0-9]{1,6}){0,3}") {
            let controller = StrutsController::new(&base, vec![module(""), module("/admin")]).unwrap();
            let (m, sub) = controller.select_module(&format!("{}{}", base, rest));
            prop_assert_eq!(m.prefix(), "");
            prop_assert_eq!(sub, rest);
        }
    }
}
