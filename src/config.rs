// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::exception::Exception;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    app_root: String,
    port: u16,
    worker_threads: usize,
    cache_size: usize,
    local: bool,
    #[serde(default = "default_base_uri")]
    base_uri: String,
    #[serde(default = "default_config_dir")]
    config_dir: String,
    #[serde(default = "default_view_root")]
    view_root: String,
    #[serde(default = "default_session_name")]
    session_name: String,
    #[serde(default = "default_session_ttl_secs")]
    session_ttl_secs: u64,
    #[serde(default = "default_max_request_size")]
    max_request_size: usize,
}

fn default_base_uri() -> String {
    "/".to_string()
}

fn default_config_dir() -> String {
    "WEB-INF".to_string()
}

fn default_view_root() -> String {
    "views".to_string()
}

fn default_session_name() -> String {
    "MINISTRUTSID".to_string()
}

fn default_session_ttl_secs() -> u64 {
    1440 // 24分钟，与常见的会话回收周期一致
}

fn default_max_request_size() -> usize {
    1048576 // 1MB
}

impl Config {
    pub fn new() -> Self {
        Self {
            app_root: "webapp".to_string(),
            port: 7878,
            worker_threads: 0,
            cache_size: 5,
            local: true,
            base_uri: default_base_uri(),
            config_dir: default_config_dir(),
            view_root: default_view_root(),
            session_name: default_session_name(),
            session_ttl_secs: default_session_ttl_secs(),
            max_request_size: default_max_request_size(),
        }
    }

    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = File::open(filename)
            .map_err(|e| Exception::ConfigIo(format!("{}: {}", filename, e)))?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|e| Exception::ConfigIo(format!("{}: {}", filename, e)))?;

        let mut raw_config = match toml::from_str::<Config>(&str_val) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        raw_config.normalize();
        Ok(raw_config)
    }

    fn normalize(&mut self) {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.cache_size == 0 {
            warn!("cache_size被设置为0，但目前尚不支持禁用视图缓存，因此该值将被改为5。");
            self.cache_size = 5;
        }
        if !self.base_uri.starts_with('/') {
            self.base_uri.insert(0, '/');
        }
        if !self.base_uri.ends_with('/') {
            self.base_uri.push('/');
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Config::new();
        config.normalize();
        config
    }
}

impl Config {
    pub fn app_root(&self) -> &str {
        &self.app_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn session_ttl_secs(&self) -> u64 {
        self.session_ttl_secs
    }

    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    /// 模块配置文件所在目录（相对路径以 app_root 为基准）
    pub fn config_dir(&self) -> PathBuf {
        Path::new(&self.app_root).join(&self.config_dir)
    }

    /// 视图文件根目录（相对路径以 app_root 为基准）
    pub fn view_root(&self) -> PathBuf {
        Path::new(&self.app_root).join(&self.view_root)
    }
}

impl Config {
    pub fn with_app_root(mut self, app_root: &str) -> Self {
        self.app_root = app_root.to_string();
        self
    }

    pub fn with_base_uri(mut self, base_uri: &str) -> Self {
        self.base_uri = base_uri.to_string();
        self.normalize();
        self
    }
}
