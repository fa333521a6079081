// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 会话模块
//!
//! `HttpSession` 是跨请求保存的属性表，由会话 ID 标识，ID 通过 Cookie 或同名请求参数传递。
//! 会话的持久化交给实现了 [`SessionStore`] 的存储，默认提供进程内的 [`MemorySessionStore`]。
//!
//! 会话是惰性创建的：只有在请求确实需要写会话时才会分配新 ID，
//! 没有携带会话 ID 的请求不会凭空产生会话。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::exception::Exception;

#[derive(Debug, Clone)]
pub struct HttpSession {
    id: String,
    attributes: HashMap<String, Value>,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    /// 本次请求中新建的会话为 true，从存储中恢复的会话为 false
    is_new: bool,
}

impl HttpSession {
    pub fn new(id: &str, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            attributes: HashMap::new(),
            created_at: now,
            last_accessed_at: now,
            expires_at: now + to_chrono(ttl),
            is_new: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// 刷新最后访问时间并顺延过期时间
    pub fn touch(&mut self, ttl: Duration) {
        let now = Utc::now();
        self.last_accessed_at = now;
        self.expires_at = now + to_chrono(ttl);
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    pub fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    fn resumed(mut self) -> Self {
        self.is_new = false;
        self
    }
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero())
}

/// 会话存储。
///
/// 实现需要线程安全：同一个存储被所有连接共享。
pub trait SessionStore: Send + Sync {
    /// 按 ID 读取会话。ID 未知或会话已过期时返回 `None`。
    fn load(&self, id: &str) -> Result<Option<HttpSession>, Exception>;

    /// 写回会话
    fn save(&self, session: &HttpSession) -> Result<(), Exception>;

    /// 删除会话
    fn destroy(&self, id: &str) -> Result<(), Exception>;

    /// 新会话的存活时间
    fn ttl(&self) -> Duration;

    /// 当前存活的会话数量
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清理已过期的会话，返回清理的数量。不支持主动清理的存储返回 0。
    fn purge_expired(&self) -> usize {
        0
    }

    /// 分配一个新会话（尚未写入存储）
    fn create(&self) -> HttpSession {
        let id = Uuid::new_v4().simple().to_string();
        debug!("新建会话：{}", id);
        HttpSession::new(&id, self.ttl())
    }
}

/// 进程内会话存储
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, HttpSession>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HttpSession>> {
        match self.sessions.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("会话存储锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &str) -> Result<Option<HttpSession>, Exception> {
        let mut sessions = self.lock();
        let expired = match sessions.get(id) {
            Some(session) => session.is_expired(),
            None => return Ok(None),
        };
        if expired {
            debug!("会话{}已过期", id);
            sessions.remove(id);
            return Ok(None);
        }
        Ok(sessions.get(id).cloned().map(|s| {
            let mut s = s.resumed();
            s.touch(self.ttl);
            s
        }))
    }

    fn save(&self, session: &HttpSession) -> Result<(), Exception> {
        self.lock().insert(session.id().to_string(), session.clone());
        Ok(())
    }

    fn destroy(&self, id: &str) -> Result<(), Exception> {
        self.lock().remove(id);
        Ok(())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn purge_expired(&self) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        before - sessions.len()
    }
}
