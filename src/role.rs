// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use log::debug;
use serde_json::Value;

use crate::{context::RequestContext, mapping::ActionForward, mapping::ActionMapping, param::ROLES_KEY};

/// 角色检查的结果
#[derive(Debug, Clone, PartialEq)]
pub enum RoleCheck {
    Granted,
    /// 拒绝访问。带 forward 时交给 forward 处理，否则输出内联的 403 页面。
    Denied(Option<ActionForward>),
}

/// 可替换的角色检查
#[cfg_attr(test, mockall::automock)]
pub trait RoleProcessor: Send + Sync {
    fn check(&self, mapping: &ActionMapping, ctx: &RequestContext) -> RoleCheck;
}

/// 默认实现：从会话的 `roles` 数组中读取当前用户的角色，
/// 拥有 mapping 要求的任意一个角色即可访问。
#[derive(Debug, Clone, Default)]
pub struct SessionRoleProcessor {
    denied: Option<ActionForward>,
}

impl SessionRoleProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 拒绝访问时使用的 forward，通常是重定向到登录页
    pub fn with_denied_forward(mut self, forward: ActionForward) -> Self {
        self.denied = Some(forward);
        self
    }

    fn user_roles(ctx: &RequestContext) -> Vec<String> {
        match ctx.session().and_then(|s| s.attribute(ROLES_KEY)) {
            Some(Value::Array(roles)) => roles
                .iter()
                .filter_map(|r| r.as_str().map(|s| s.to_string()))
                .collect(),
            Some(Value::String(role)) => vec![role.clone()],
            _ => vec![],
        }
    }
}

impl RoleProcessor for SessionRoleProcessor {
    fn check(&self, mapping: &ActionMapping, ctx: &RequestContext) -> RoleCheck {
        if mapping.roles().is_empty() {
            return RoleCheck::Granted;
        }
        let roles = Self::user_roles(ctx);
        if mapping.roles().iter().any(|r| roles.contains(r)) {
            return RoleCheck::Granted;
        }
        debug!(
            "[ID{}]角色检查失败：{} 需要 {:?}，当前为 {:?}",
            ctx.id(),
            mapping.path(),
            mapping.roles(),
            roles
        );
        RoleCheck::Denied(self.denied.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::HttpRequestMethod;
    use crate::request::Request;
    use crate::session::MemorySessionStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn context() -> RequestContext {
        let store = Arc::new(MemorySessionStore::new(Duration::from_secs(60)));
        RequestContext::new(1, Request::new(HttpRequestMethod::Get, "/"), store, "SID", "/")
    }

    #[test]
    fn test_public_mapping_is_granted() {
        let mapping = ActionMapping::new("/home").unwrap();
        assert_eq!(SessionRoleProcessor::new().check(&mapping, &context()), RoleCheck::Granted);
    }

    #[test]
    fn test_role_from_session() {
        let mapping = ActionMapping::new("/users").unwrap().with_roles(&["admin"]);
        let processor = SessionRoleProcessor::new();
        let mut ctx = context();
        assert_eq!(processor.check(&mapping, &ctx), RoleCheck::Denied(None));

        ctx.session_or_create()
            .set_attribute(ROLES_KEY, serde_json::json!(["user", "admin"]));
        assert_eq!(processor.check(&mapping, &ctx), RoleCheck::Granted);
    }

    #[test]
    fn test_denied_forward() {
        let mapping = ActionMapping::new("/users").unwrap().with_roles(&["admin"]);
        let login = ActionForward::redirect_to("/login");
        let processor = SessionRoleProcessor::new().with_denied_forward(login.clone());
        assert_eq!(processor.check(&mapping, &context()), RoleCheck::Denied(Some(login)));
    }
}
