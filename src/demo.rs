// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 示例应用（`webapp/`）用到的 Action 与表单：首页、登录、留言板和需要管理员角色的后台。

use log::info;
use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    action::{Action, ActionOutcome},
    context::RequestContext,
    exception::Exception,
    form::{ActionForm, FormBean},
    mapping::{ActionForward, ActionMapping},
    message::{ActionErrors, GLOBAL_MESSAGE},
    param::ROLES_KEY,
    registry::Registry,
    role::SessionRoleProcessor,
    session::SessionStore,
    validator::{check_field, Rule},
};

/// 示例应用的统一密码
pub const DEMO_PASSWORD: &str = "ministruts";

pub const USER_KEY: &str = "user";
pub const GUESTBOOK_KEY: &str = "guestbook";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl FormBean for LoginForm {
    fn check(&self, errors: &mut ActionErrors) {
        check_field(errors, "username", &self.username, &[Rule::Required, Rule::Length(3, 20)]);
        check_field(errors, "password", &self.password, &[Rule::Required]);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuestbookForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

impl FormBean for GuestbookForm {
    fn check(&self, errors: &mut ActionErrors) {
        check_field(errors, "name", &self.name, &[Rule::Required, Rule::Length(1, 20)]);
        check_field(errors, "email", &self.email, &[Rule::Email]);
        check_field(errors, "message", &self.message, &[Rule::Required, Rule::Length(1, 200)]);
    }
}

pub struct LoginAction;

impl Action for LoginAction {
    fn execute(&mut self, _mapping: &ActionMapping, ctx: &mut RequestContext) -> ActionOutcome {
        if ctx.has_errors() {
            return Ok(Some("input".into()));
        }
        let form: LoginForm = ctx
            .form_as()
            .ok_or_else(|| Exception::ActionFailed("登录表单缺失".to_string()))?;
        if form.password != DEMO_PASSWORD {
            ctx.add_error(GLOBAL_MESSAGE, "用户名或密码错误");
            return Ok(Some("failure".into()));
        }

        let roles = match form.username.as_str() {
            "admin" => json!(["user", "admin"]),
            _ => json!(["user"]),
        };
        let session = ctx.session_or_create();
        session.set_attribute(USER_KEY, Value::from(form.username.clone()));
        session.set_attribute(ROLES_KEY, roles);
        info!("[ID{}]用户{}登录", ctx.id(), form.username);
        ctx.add_message(GLOBAL_MESSAGE, &format!("欢迎回来，{}", form.username));
        Ok(Some("success".into()))
    }
}

pub struct LogoutAction;

impl Action for LogoutAction {
    fn execute(&mut self, _mapping: &ActionMapping, ctx: &mut RequestContext) -> ActionOutcome {
        ctx.invalidate_session()?;
        ctx.add_message(GLOBAL_MESSAGE, "已退出登录");
        Ok(Some("success".into()))
    }
}

/// 留言：校验失败时回到留言页，成功后追加到会话里的留言列表并重定向
pub struct GuestbookAction;

impl Action for GuestbookAction {
    fn execute(&mut self, _mapping: &ActionMapping, ctx: &mut RequestContext) -> ActionOutcome {
        if ctx.has_errors() {
            return Ok(Some("input".into()));
        }
        let form: GuestbookForm = ctx
            .form_as()
            .ok_or_else(|| Exception::ActionFailed("留言表单缺失".to_string()))?;

        let session = ctx.session_or_create();
        let mut entries = session
            .attribute(GUESTBOOK_KEY)
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();
        entries.push(Value::from(format!("{}: {}", form.name, form.message)));
        session.set_attribute(GUESTBOOK_KEY, Value::Array(entries));

        // 保留称呼和邮箱，清空正文
        if let Some(stored) = ctx.form_mut() {
            stored.load_value(&json!({ "name": form.name, "email": form.email, "message": "" }));
        }
        ctx.add_message(GLOBAL_MESSAGE, "留言成功");
        Ok(Some("success".into()))
    }
}

/// 后台首页：展示当前存活的会话数
pub struct AdminUsersAction;

impl Action for AdminUsersAction {
    fn pre_execute(&mut self, mapping: &ActionMapping, ctx: &mut RequestContext) -> ActionOutcome {
        let user = ctx
            .session()
            .and_then(|s| s.attribute(USER_KEY))
            .and_then(|u| u.as_str())
            .unwrap_or("?");
        info!("[ID{}]管理员{}访问{}", ctx.id(), user, mapping.path());
        Ok(None)
    }

    fn execute(&mut self, _mapping: &ActionMapping, ctx: &mut RequestContext) -> ActionOutcome {
        let sessions = ctx.store().len();
        ctx.request.set_attribute("sessions", Value::from(sessions));
        Ok(Some("success".into()))
    }
}

/// 示例应用的注册表
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_action("LoginAction", |_| Box::new(LoginAction))
        .register_action("LogoutAction", |_| Box::new(LogoutAction))
        .register_action("GuestbookAction", |_| Box::new(GuestbookAction))
        .register_action("AdminUsersAction", |_| Box::new(AdminUsersAction))
        .register_default_form::<LoginForm>("LoginForm")
        .register_default_form::<GuestbookForm>("GuestbookForm");
    registry
}

/// 未登录访问后台时重定向到登录页
pub fn role_processor() -> SessionRoleProcessor {
    SessionRoleProcessor::new().with_denied_forward(ActionForward::redirect_to("/login"))
}
