// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Tile 视图组合模块
//!
//! Tile 是一个带名字的视图片段：一个视图文件、一个标签和一组属性。
//! 属性可以是文本，也可以是另一个 Tile（渲染时在原处展开）。
//!
//! ## 继承
//! Tile 可以有父 Tile。查找属性时沿父链向上，子 Tile 的同名属性覆盖父 Tile
//! （浅覆盖，不做深合并）。父 Tile 只能在构造时指定，因此继承链不会成环。
//!
//! ## 冻结
//! 配置加载完成后所有 Tile 都会被冻结，之后任何修改都会返回 `TileFrozen`。
//!
//! ## 视图文件
//! 视图文件是 Handlebars 模板，输出默认做 HTML 转义。模板中可以使用：
//! - 合并后的属性：文本属性原样传入；Tile 属性先渲染成 HTML，需要用 `{{{ name }}}` 输出
//! - `param` / `attr` / `session` / `form` / `page`：请求参数、请求属性、会话属性、表单字段、页面属性
//! - `errors` / `messages`：按添加顺序的 `{property, message}` 列表；
//!   `field_errors` / `field_messages`：按字段分组的消息
//! - `label`：forward 上的标签，没有时为 Tile 的标签
//! - `base`：基础 URI，总是以 `/` 结尾
//! - `response.status`：当前状态码
//! - `{{set "key" "value"}}`：写入页面属性，本身不产生输出
//!
//! 嵌套的 Tile 先于外层模板渲染，因此片段中写入的页面属性对外层模板可见。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use handlebars::{Context, Handlebars, Helper, HelperDef, HelperResult, Output};
use log::{debug, warn};
use serde_json::{json, Map, Value};

use crate::{
    cache::ViewCache,
    exception::Exception,
    message::ActionMessages,
    param::{ACTION_ERRORS_KEY, ACTION_MESSAGES_KEY},
    request::Request,
    response::Response,
    session::HttpSession,
};

#[derive(Debug, Clone)]
pub enum TileProperty {
    Text(String),
    Tile(Arc<Tile>),
}

impl PartialEq for TileProperty {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TileProperty::Text(a), TileProperty::Text(b)) => a == b,
            (TileProperty::Tile(a), TileProperty::Tile(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for TileProperty {
    fn from(text: &str) -> Self {
        TileProperty::Text(text.to_string())
    }
}

impl From<Arc<Tile>> for TileProperty {
    fn from(tile: Arc<Tile>) -> Self {
        TileProperty::Tile(tile)
    }
}

#[derive(Debug)]
pub struct Tile {
    name: String,
    path: Option<String>,
    label: Option<String>,
    parent: Option<Arc<Tile>>,
    properties: BTreeMap<String, TileProperty>,
    frozen: AtomicBool,
}

impl Tile {
    pub fn new(name: &str, path: Option<&str>, parent: Option<Arc<Tile>>) -> Self {
        Self {
            name: name.to_string(),
            path: path.map(|p| p.to_string()),
            label: None,
            parent,
            properties: BTreeMap::new(),
            frozen: AtomicBool::new(false),
        }
    }

    /// 没有同名 Tile 时，把 forward 路径当作单文件 Tile
    pub fn from_file(path: &str) -> Self {
        Self::new(path, Some(path), None)
    }

    fn ensure_mutable(&self) -> Result<(), Exception> {
        match self.is_frozen() {
            true => Err(Exception::TileFrozen(self.name.clone())),
            false => Ok(()),
        }
    }

    pub fn set_path(&mut self, path: &str) -> Result<(), Exception> {
        self.ensure_mutable()?;
        self.path = Some(path.to_string());
        Ok(())
    }

    pub fn set_label(&mut self, label: &str) -> Result<(), Exception> {
        self.ensure_mutable()?;
        self.label = Some(label.to_string());
        Ok(())
    }

    pub fn set_property(&mut self, name: &str, value: TileProperty) -> Result<(), Exception> {
        self.ensure_mutable()?;
        self.properties.insert(name.to_string(), value);
        Ok(())
    }

    pub fn remove_property(&mut self, name: &str) -> Result<Option<TileProperty>, Exception> {
        self.ensure_mutable()?;
        Ok(self.properties.remove(name))
    }

    /// 冻结本 Tile 以及作为属性值的 Tile。重复调用没有效果。
    pub fn freeze(&self) {
        if self.frozen.swap(true, Ordering::SeqCst) {
            return;
        }
        for value in self.properties.values() {
            if let TileProperty::Tile(tile) = value {
                tile.freeze();
            }
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }
}

impl Tile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Tile>> {
        self.parent.as_ref()
    }

    /// 视图文件，未设置时沿父链继承
    pub fn path(&self) -> Option<&str> {
        match &self.path {
            Some(p) => Some(p),
            None => self.parent.as_ref().and_then(|p| p.path()),
        }
    }

    /// 标签，未设置时沿父链继承
    pub fn label(&self) -> Option<&str> {
        match &self.label {
            Some(l) => Some(l),
            None => self.parent.as_ref().and_then(|p| p.label()),
        }
    }

    /// 沿父链查找单个属性
    pub fn property(&self, name: &str) -> Option<&TileProperty> {
        match self.properties.get(name) {
            Some(v) => Some(v),
            None => self.parent.as_ref().and_then(|p| p.property(name)),
        }
    }

    /// 父 Tile 的合并结果叠加本 Tile 的属性，同名时本 Tile 优先
    pub fn merged_properties(&self) -> BTreeMap<String, TileProperty> {
        let mut merged = match &self.parent {
            Some(parent) => parent.merged_properties(),
            None => BTreeMap::new(),
        };
        for (k, v) in &self.properties {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    /// 渲染本 Tile。属性在渲染时重新合并，而不是冻结时。
    pub fn render(&self, ctx: &RenderContext<'_>) -> Result<String, Exception> {
        let path = match self.path() {
            Some(p) => p.to_string(),
            None => return Err(Exception::ViewNotFound(self.name.clone())),
        };
        let bytes = ctx.views.read(&path)?;
        let template = String::from_utf8_lossy(&bytes);
        debug!("渲染Tile {}，视图文件 {}", self.name, path);

        let mut properties = Map::new();
        for (name, value) in self.merged_properties() {
            let value = match value {
                TileProperty::Text(text) => text,
                TileProperty::Tile(tile) => tile.render(ctx)?,
            };
            properties.insert(name, Value::String(value));
        }
        // 同名时属性优先
        let mut data = ctx.scopes(self.label());
        data.extend(properties);

        ctx.engine
            .render_template(&template, &Value::Object(data))
            .map_err(|e| Exception::ViewRender(format!("{}: {}", path, e)))
    }
}

type PageScope = Arc<Mutex<BTreeMap<String, String>>>;

fn lock_page(page: &PageScope) -> MutexGuard<'_, BTreeMap<String, String>> {
    match page.lock() {
        Ok(lock) => lock,
        Err(poisoned) => {
            warn!("页面属性锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

/// `{{set "key" "value"}}`
struct SetHelper {
    page: PageScope,
}

impl HelperDef for SetHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut handlebars::RenderContext<'reg, 'rc>,
        _: &mut dyn Output,
    ) -> HelperResult {
        if let (Some(key), Some(value)) = (h.param(0), h.param(1)) {
            let value = match value.value() {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            if let Some(key) = key.value().as_str() {
                lock_page(&self.page).insert(key.to_string(), value);
            }
        }
        Ok(())
    }
}

/// 渲染上下文：包含当前请求、响应、会话（可能没有）、表单取值和页面属性。
///
/// 嵌套的 Tile 共享同一个上下文，片段写入的页面属性对之后渲染的模板可见。
/// Tile 对象本身不会进入模板数据。
pub struct RenderContext<'a> {
    pub request: &'a Request,
    pub response: &'a Response,
    pub session: Option<&'a HttpSession>,
    pub form: Option<&'a Value>,
    base_uri: String,
    label: Option<String>,
    page: PageScope,
    engine: Handlebars<'static>,
    views: &'a ViewCache,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        request: &'a Request,
        response: &'a Response,
        session: Option<&'a HttpSession>,
        form: Option<&'a Value>,
        views: &'a ViewCache,
    ) -> Self {
        let page = PageScope::default();
        let mut engine = Handlebars::new();
        engine.register_helper("set", Box::new(SetHelper { page: page.clone() }));
        Self {
            request,
            response,
            session,
            form,
            base_uri: "/".to_string(),
            label: None,
            page,
            engine,
            views,
        }
    }

    pub fn with_base_uri(mut self, base_uri: &str) -> Self {
        self.base_uri = base_uri.to_string();
        self
    }

    /// forward 上的标签，优先于 Tile 自己的标签
    pub fn with_label(mut self, label: Option<&str>) -> Self {
        self.label = label.map(|l| l.to_string());
        self
    }

    /// 模板中除 Tile 属性之外的数据
    fn scopes(&self, tile_label: Option<&str>) -> Map<String, Value> {
        let label = self.label.as_deref().or(tile_label);
        let errors = self.messages(ACTION_ERRORS_KEY);
        let messages = self.messages(ACTION_MESSAGES_KEY);
        let page: Map<String, Value> = lock_page(&self.page)
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        let param: Map<String, Value> = self
            .request
            .parameters()
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        let attr: Map<String, Value> = self
            .request
            .attributes()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let session = match self.session {
            Some(s) => Value::Object(s.attributes().iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            None => Value::Null,
        };

        let mut data = Map::new();
        data.insert("base".to_string(), Value::from(self.base_uri.as_str()));
        data.insert("label".to_string(), label.map(Value::from).unwrap_or(Value::Null));
        data.insert("param".to_string(), Value::Object(param));
        data.insert("attr".to_string(), Value::Object(attr));
        data.insert("session".to_string(), session);
        data.insert("form".to_string(), self.form.cloned().unwrap_or(Value::Null));
        data.insert("page".to_string(), Value::Object(page));
        data.insert("response".to_string(), json!({ "status": self.response.status_code() }));
        data.insert("errors".to_string(), errors.to_value());
        data.insert("field_errors".to_string(), errors.to_field_map());
        data.insert("messages".to_string(), messages.to_value());
        data.insert("field_messages".to_string(), messages.to_field_map());
        data
    }

    fn messages(&self, attribute: &str) -> ActionMessages {
        self.request
            .attribute(attribute)
            .map(ActionMessages::from_value)
            .unwrap_or_default()
    }
}
