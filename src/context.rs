// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求上下文
//!
//! 一次请求期间需要的全部可变状态：请求、响应、会话（可能没有）和表单。
//! 处理管线的每个阶段以及 Action 都通过它读写状态，不存在任何全局的请求对象。

use std::sync::Arc;

use log::{debug, error};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    exception::Exception,
    form::ActionForm,
    message::{ActionErrors, ActionMessages},
    param::{ACTION_ERRORS_KEY, ACTION_MESSAGES_KEY, FORM_KEY},
    request::Request,
    response::Response,
    session::{HttpSession, SessionStore},
};

pub struct RequestContext {
    id: u128,
    pub request: Request,
    pub response: Response,
    session: Option<HttpSession>,
    form: Option<Box<dyn ActionForm>>,
    /// 会话范围表单在会话中的键
    form_session_key: Option<String>,
    store: Arc<dyn SessionStore>,
    session_name: String,
    base_uri: String,
    wildcards: Vec<String>,
}

impl RequestContext {
    pub fn new(
        id: u128,
        request: Request,
        store: Arc<dyn SessionStore>,
        session_name: &str,
        base_uri: &str,
    ) -> Self {
        Self {
            id,
            request,
            response: Response::new(),
            session: None,
            form: None,
            form_session_key: None,
            store,
            session_name: session_name.to_string(),
            base_uri: base_uri.to_string(),
            wildcards: Vec::new(),
        }
    }

    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// 通配 mapping 中第 `index` 个 `*` 匹配到的片段，从 0 开始
    pub fn wildcard(&self, index: usize) -> Option<&str> {
        self.wildcards.get(index).map(|w| w.as_str())
    }

    pub fn set_wildcards(&mut self, wildcards: Vec<String>) {
        self.wildcards = wildcards;
    }

    /// 客户端通过 Cookie 传来的会话 ID
    pub fn cookie_session_id(&self) -> Option<&str> {
        self.request.cookie(&self.session_name)
    }

    /// 客户端传来的会话 ID，Cookie 优先，其次是同名请求参数
    pub fn requested_session_id(&self) -> Option<&str> {
        self.cookie_session_id()
            .or_else(|| self.request.parameter(&self.session_name))
    }

    /// 按客户端传来的 ID 恢复会话。ID 未知或已过期时不创建会话。
    pub fn resume_session(&mut self) -> Result<(), Exception> {
        if self.session.is_some() {
            return Ok(());
        }
        let id = match self.requested_session_id() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Ok(()),
        };
        self.session = self.store.load(&id)?;
        match &self.session {
            Some(_) => debug!("[ID{}]恢复会话：{}", self.id, id),
            None => debug!("[ID{}]会话{}不存在或已过期，忽略", self.id, id),
        }
        Ok(())
    }

    pub fn session(&self) -> Option<&HttpSession> {
        self.session.as_ref()
    }

    /// 取得当前会话，没有时新建一个
    pub fn session_or_create(&mut self) -> &mut HttpSession {
        let store = &self.store;
        self.session.get_or_insert_with(|| store.create())
    }

    /// 立即从存储中删除当前会话。之后再写会话会分配一个新的。
    pub fn invalidate_session(&mut self) -> Result<(), Exception> {
        if let Some(session) = self.session.take() {
            debug!("[ID{}]注销会话：{}", self.id, session.id());
            self.store.destroy(session.id())?;
        }
        Ok(())
    }

    pub fn take_session(&mut self) -> Option<HttpSession> {
        self.session.take()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }
}

// --- 表单 ---

impl RequestContext {
    pub fn form(&self) -> Option<&dyn ActionForm> {
        self.form.as_deref()
    }

    pub fn form_mut(&mut self) -> Option<&mut (dyn ActionForm + 'static)> {
        self.form.as_deref_mut()
    }

    /// 以具体类型读取表单的当前值
    pub fn form_as<T: DeserializeOwned>(&self) -> Option<T> {
        let value = self.form.as_ref()?.to_value();
        match serde_json::from_value(value) {
            Ok(form) => Some(form),
            Err(e) => {
                error!("[ID{}]表单无法转换为目标类型：{}", self.id, e);
                None
            }
        }
    }

    pub fn set_form(&mut self, form: Box<dyn ActionForm>, session_key: Option<String>) {
        self.form = Some(form);
        self.form_session_key = session_key;
        self.store_form();
    }

    /// 把表单的当前值同步到请求属性，会话范围的表单同时写回会话
    pub fn store_form(&mut self) {
        let value = match &self.form {
            Some(form) => form.to_value(),
            None => return,
        };
        if let Some(key) = self.form_session_key.clone() {
            self.session_or_create().set_attribute(&key, value.clone());
        }
        self.request.set_attribute(FORM_KEY, value);
    }
}

// --- ActionErrors / ActionMessages ---

impl RequestContext {
    pub fn errors(&self) -> ActionErrors {
        self.request
            .attribute(ACTION_ERRORS_KEY)
            .map(ActionErrors::from_value)
            .unwrap_or_default()
    }

    pub fn messages(&self) -> ActionMessages {
        self.request
            .attribute(ACTION_MESSAGES_KEY)
            .map(ActionMessages::from_value)
            .unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    pub fn add_error(&mut self, property: &str, message: &str) {
        let mut errors = ActionErrors::new();
        errors.add(property, message);
        self.save_errors(errors);
    }

    pub fn add_message(&mut self, property: &str, message: &str) {
        let mut messages = ActionMessages::new();
        messages.add(property, message);
        self.save_messages(messages);
    }

    /// 追加到请求中已有的错误之后
    pub fn save_errors(&mut self, errors: ActionErrors) {
        Self::append(&mut self.request, ACTION_ERRORS_KEY, errors);
    }

    pub fn save_messages(&mut self, messages: ActionMessages) {
        Self::append(&mut self.request, ACTION_MESSAGES_KEY, messages);
    }

    fn append(request: &mut Request, key: &str, extra: ActionMessages) {
        if extra.is_empty() {
            return;
        }
        let mut current = request
            .attribute(key)
            .map(ActionMessages::from_value)
            .unwrap_or_default();
        current.merge(extra);
        request.set_attribute(key, current.to_value());
    }

    /// 重定向之前把错误和消息暂存进会话，下一次请求再取回
    pub fn stash_messages(&mut self) {
        for key in [ACTION_ERRORS_KEY, ACTION_MESSAGES_KEY] {
            let value = match self.request.attribute(key) {
                Some(v) if !ActionMessages::from_value(v).is_empty() => v.clone(),
                _ => continue,
            };
            debug!("[ID{}]重定向前暂存{}到会话", self.id, key);
            self.session_or_create().set_attribute(key, value);
        }
    }

    /// 把上一次请求暂存的错误和消息移到请求属性中，并从会话中删除
    pub fn restore_messages(&mut self) {
        let session = match self.session.as_mut() {
            Some(s) => s,
            None => return,
        };
        let mut restored: Vec<(&str, Value)> = vec![];
        for key in [ACTION_ERRORS_KEY, ACTION_MESSAGES_KEY] {
            if let Some(value) = session.remove_attribute(key) {
                restored.push((key, value));
            }
        }
        for (key, value) in restored {
            debug!("[ID{}]从会话中取回{}", self.id, key);
            self.request.set_attribute(key, value);
        }
    }
}
