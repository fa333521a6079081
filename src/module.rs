// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模块
//!
//! 一个模块对应一个配置文件：一组 ActionMapping、一组 Tile 和一组全局 forward，
//! 以 URL 前缀区分。模块在加载时构建并冻结，之后只读。
//!
//! 配置文件格式（TOML）：
//!
//! ```toml
//! prefix = "/admin"            # 可选，覆盖由文件名推出的前缀
//!
//! [[forward]]
//! name = "404"
//! path = "notfound"
//!
//! [[action]]
//! path = "/login"
//! methods = ["GET", "POST"]
//! form = "LoginForm"
//! scope = "request"            # 或 "session"
//! action = "LoginAction"
//! validate = false
//! [[action.forwards]]
//! name = "success"
//! path = "/home"
//! redirect = true
//!
//! [[tile]]
//! name = "layout"
//! path = "layout.html"
//! label = "MiniStruts"
//! [tile.properties]
//! header = { file = "header.html" }
//! body = { tile = "home.body" }
//! title = "首页"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use serde_derive::Deserialize;

use crate::{
    exception::Exception,
    mapping::{ActionForward, ActionMapping, FormScope},
    param::HttpRequestMethod,
    registry::Registry,
    tile::{Tile, TileProperty},
};

#[derive(Debug, Deserialize)]
struct ModuleConfig {
    prefix: Option<String>,
    #[serde(default)]
    action: Vec<ActionConfig>,
    #[serde(default)]
    forward: Vec<ForwardConfig>,
    #[serde(default)]
    tile: Vec<TileConfig>,
}

#[derive(Debug, Deserialize)]
struct ActionConfig {
    path: String,
    #[serde(default)]
    methods: Vec<String>,
    #[serde(default)]
    roles: Vec<String>,
    form: Option<String>,
    #[serde(default)]
    scope: FormScope,
    action: Option<String>,
    #[serde(default)]
    validate: bool,
    forward: Option<String>,
    #[serde(default)]
    redirect: bool,
    #[serde(default)]
    default: bool,
    #[serde(default)]
    forwards: Vec<ForwardConfig>,
}

#[derive(Debug, Deserialize)]
struct ForwardConfig {
    name: String,
    path: String,
    #[serde(default)]
    redirect: bool,
    label: Option<String>,
}

impl ForwardConfig {
    fn build(&self) -> ActionForward {
        let forward = ActionForward::new(&self.name, &self.path, self.redirect);
        match &self.label {
            Some(label) => forward.with_label(label),
            None => forward,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TileConfig {
    name: String,
    path: Option<String>,
    extends: Option<String>,
    label: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, PropertyConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PropertyConfig {
    Text(String),
    Tile { tile: String },
    File { file: String },
}

#[derive(Debug)]
pub struct Module {
    prefix: String,
    mappings: Vec<ActionMapping>,
    forwards: HashMap<String, ActionForward>,
    tiles: HashMap<String, Arc<Tile>>,
}

/// 前缀统一为空串或 `/name` 的形式
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    match trimmed.is_empty() {
        true => String::new(),
        false => format!("/{}", trimmed),
    }
}

impl Module {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            mappings: vec![],
            forwards: HashMap::new(),
            tiles: HashMap::new(),
        }
    }

    pub fn with_mapping(mut self, mapping: ActionMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn with_forward(mut self, forward: ActionForward) -> Self {
        self.forwards.insert(forward.name().to_string(), forward);
        self
    }

    /// 读取并解析一个模块配置文件。文件中的 `prefix` 优先于 `default_prefix`。
    pub fn load(path: &Path, default_prefix: &str, registry: &Registry) -> Result<Self, Exception> {
        let text = fs::read_to_string(path)
            .map_err(|e| Exception::ConfigIo(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text, default_prefix, registry)
            .map_err(|e| match e {
                Exception::ConfigParse(msg) => Exception::ConfigParse(format!("{}: {}", path.display(), msg)),
                other => other,
            })
    }

    pub fn from_toml(text: &str, default_prefix: &str, registry: &Registry) -> Result<Self, Exception> {
        let config: ModuleConfig =
            toml::from_str(text).map_err(|e| Exception::ConfigParse(e.to_string()))?;
        let prefix = config.prefix.as_deref().unwrap_or(default_prefix);
        let mut module = Self::new(prefix);

        for forward in &config.forward {
            module.forwards.insert(forward.name.clone(), forward.build());
        }
        for action in &config.action {
            let mapping = build_mapping(action)?;
            registry.check_mapping(&mapping)?;
            module.mappings.push(mapping);
        }
        if module.mappings.iter().filter(|m| m.is_default()).count() > 1 {
            warn!("模块'{}'声明了多个默认 mapping，只有第一个生效", module.prefix);
        }
        module.tiles = build_tiles(&config.tile)?;
        debug!(
            "模块'{}'载入完成：{}个mapping，{}个forward，{}个tile",
            module.prefix,
            module.mappings.len(),
            module.forwards.len(),
            module.tiles.len()
        );
        Ok(module)
    }
}

impl Module {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn mappings(&self) -> &[ActionMapping] {
        &self.mappings
    }

    /// 精确路径优先，其次按声明顺序匹配通配路径，最后是默认 mapping
    pub fn find_mapping(&self, path: &str) -> Option<&ActionMapping> {
        self.mappings
            .iter()
            .find(|m| !m.is_pattern() && m.matches(path))
            .or_else(|| self.mappings.iter().find(|m| m.is_pattern() && m.matches(path)))
            .or_else(|| self.default_mapping())
    }

    pub fn default_mapping(&self) -> Option<&ActionMapping> {
        self.mappings.iter().find(|m| m.is_default())
    }

    /// 全局 forward
    pub fn find_forward(&self, name: &str) -> Option<&ActionForward> {
        self.forwards.get(name)
    }

    pub fn find_tile(&self, name: &str) -> Option<Arc<Tile>> {
        self.tiles.get(name).cloned()
    }
}

fn build_mapping(config: &ActionConfig) -> Result<ActionMapping, Exception> {
    let path = match config.path.starts_with('/') {
        true => config.path.clone(),
        false => format!("/{}", config.path),
    };
    let methods = config
        .methods
        .iter()
        .map(|m| {
            HttpRequestMethod::parse(m)
                .ok_or_else(|| Exception::ConfigParse(format!("mapping {} 使用了未知的方法 {}", path, m)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let roles: Vec<&str> = config.roles.iter().map(|r| r.as_str()).collect();

    let mut mapping = ActionMapping::new(&path)?
        .with_methods(&methods)
        .with_roles(&roles)
        .with_validate(config.validate);
    if let Some(form) = &config.form {
        mapping = mapping.with_form(form, config.scope);
    }
    if let Some(action) = &config.action {
        mapping = mapping.with_action(action);
    }
    if let Some(forward) = &config.forward {
        mapping = mapping.with_forward(ActionForward::new(forward, forward, config.redirect));
    }
    for forward in &config.forwards {
        mapping = mapping.add_forward(forward.build());
    }
    if config.default {
        mapping = mapping.as_default();
    }
    if config.validate && config.form.is_none() {
        warn!("mapping {} 要求校验但没有配置表单", path);
    }
    if !mapping.has_target() {
        return Err(Exception::MappingWithoutTarget(path));
    }
    Ok(mapping)
}

struct TileBuilder<'a> {
    configs: HashMap<&'a str, &'a TileConfig>,
    built: HashMap<String, Arc<Tile>>,
    /// 正在构建中的 Tile，用于发现环
    stack: Vec<String>,
}

fn build_tiles(configs: &[TileConfig]) -> Result<HashMap<String, Arc<Tile>>, Exception> {
    let mut builder = TileBuilder {
        configs: configs.iter().map(|c| (c.name.as_str(), c)).collect(),
        built: HashMap::new(),
        stack: vec![],
    };
    for config in configs {
        builder.build(&config.name)?;
    }
    for tile in builder.built.values() {
        tile.freeze();
    }
    Ok(builder.built)
}

impl TileBuilder<'_> {
    fn build(&mut self, name: &str) -> Result<Arc<Tile>, Exception> {
        if let Some(tile) = self.built.get(name) {
            return Ok(tile.clone());
        }
        if self.stack.iter().any(|n| n == name) {
            let mut chain = self.stack.clone();
            chain.push(name.to_string());
            return Err(Exception::TileCycle(chain.join(" -> ")));
        }
        let config = match self.configs.get(name) {
            Some(c) => *c,
            None => return Err(Exception::UnknownTileParent(name.to_string())),
        };
        self.stack.push(name.to_string());

        let parent = match &config.extends {
            Some(parent) => Some(self.build(parent)?),
            None => None,
        };
        let mut tile = Tile::new(name, config.path.as_deref(), parent);
        if let Some(label) = &config.label {
            tile.set_label(label)?;
        }
        for (key, value) in &config.properties {
            let property = match value {
                PropertyConfig::Text(text) => TileProperty::Text(text.clone()),
                PropertyConfig::Tile { tile } => TileProperty::Tile(self.build(tile)?),
                PropertyConfig::File { file } => TileProperty::Tile(Arc::new(Tile::from_file(file))),
            };
            tile.set_property(key, property)?;
        }

        self.stack.pop();
        let tile = Arc::new(tile);
        self.built.insert(name.to_string(), tile.clone());
        Ok(tile)
    }
}
