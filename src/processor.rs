// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求处理管线
//!
//! `RequestProcessor` 按固定顺序执行下列阶段，任何一个阶段都可以终止管线：
//!
//! 1. 恢复会话（只恢复客户端带来 ID 的会话，不会凭空创建）
//! 2. 区域设置（扩展点，默认不做任何事）
//! 3. 取回上一次重定向前暂存在会话中的错误与消息
//! 4. 查找 mapping：精确路径、通配路径、默认 mapping；都没有时输出 `404` forward 或内联 404 页面
//! 5. 检查请求方法：不允许时输出 `405` forward 或内联 405 页面
//! 6. 检查角色：交给 [`RoleProcessor`]
//! 7. 创建表单
//! 8. 校验表单：没有 Action 的 mapping 在这里按结果跳转到 `success` 或 `error` 并结束
//! 9. mapping 上的无条件 forward
//! 10. 创建 Action
//! 11. 执行 Action（前置钩子、执行、后置钩子）
//! 12. 处理 forward：重定向，或者渲染 Tile

use std::ops::ControlFlow;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::{
    action::{Action, ActionResult},
    cache::ViewCache,
    context::RequestContext,
    exception::Exception,
    mapping::{ActionForward, ActionMapping, FormScope},
    message::ActionErrors,
    module::Module,
    param::{FORM_KEY, SESSION_FORM_PREFIX},
    registry::Registry,
    response::Response,
    role::{RoleCheck, RoleProcessor},
    tile::{RenderContext, Tile},
    util::{append_query, is_absolute_url, join_path},
};

type Stage = Result<ControlFlow<()>, Exception>;

pub struct RequestProcessor<'a> {
    module: &'a Module,
    registry: &'a Registry,
    roles: &'a dyn RoleProcessor,
    views: &'a ViewCache,
}

impl<'a> RequestProcessor<'a> {
    pub fn new(
        module: &'a Module,
        registry: &'a Registry,
        roles: &'a dyn RoleProcessor,
        views: &'a ViewCache,
    ) -> Self {
        Self {
            module,
            registry,
            roles,
            views,
        }
    }

    /// 处理一个请求。`path` 是模块内的相对路径。
    ///
    /// Action 返回的错误会在后置钩子执行之后原样返回给调用者。
    pub fn process(&self, ctx: &mut RequestContext, path: &str) -> Result<(), Exception> {
        ctx.resume_session()?;
        self.process_locale(ctx);
        ctx.restore_messages();

        let mapping = match self.process_mapping(ctx, path)? {
            ControlFlow::Continue(mapping) => mapping,
            ControlFlow::Break(()) => return Ok(()),
        };
        if self.process_method(ctx, mapping)?.is_break() {
            return Ok(());
        }
        if self.process_roles(ctx, mapping)?.is_break() {
            return Ok(());
        }
        self.process_form(ctx, mapping)?;
        if self.process_validate(ctx, mapping)?.is_break() {
            return Ok(());
        }
        if self.process_mapping_forward(ctx, mapping)?.is_break() {
            return Ok(());
        }

        let mut action = self.process_action_create(mapping)?;
        let forward = self.process_action_perform(ctx, mapping, action.as_mut())?;
        ctx.store_form();

        match forward {
            Some(forward) => self.process_forward(ctx, &forward),
            None => {
                debug!("[ID{}]Action没有返回forward，使用其自行写入的响应", ctx.id());
                Ok(())
            }
        }
    }

    /// 区域设置的扩展点，默认只记录客户端声明的语言
    fn process_locale(&self, ctx: &mut RequestContext) {
        if let Some(language) = ctx.request.header("Accept-Language") {
            debug!("[ID{}]Accept-Language: {}", ctx.id(), language);
        }
    }

    fn process_mapping(
        &self,
        ctx: &mut RequestContext,
        path: &str,
    ) -> Result<ControlFlow<(), &'a ActionMapping>, Exception> {
        if let Some(mapping) = self.module.find_mapping(path) {
            debug!(
                "[ID{}]路径{}匹配到模块'{}'的mapping {}",
                ctx.id(),
                path,
                self.module.prefix(),
                mapping.path()
            );
            ctx.set_wildcards(mapping.wildcards(path));
            return Ok(ControlFlow::Continue(mapping));
        }
        warn!("[ID{}]模块'{}'中没有与{}匹配的mapping", ctx.id(), self.module.prefix(), path);
        self.process_status_forward(ctx, 404, Response::response_404)?;
        Ok(ControlFlow::Break(()))
    }

    fn process_method(&self, ctx: &mut RequestContext, mapping: &ActionMapping) -> Stage {
        let method = ctx.request.method();
        if mapping.allows_method(method) {
            return Ok(ControlFlow::Continue(()));
        }
        warn!("[ID{}]mapping {} 不接受{}方法", ctx.id(), mapping.path(), method);
        self.process_status_forward(ctx, 405, || Response::response_405(mapping.methods()))?;
        Ok(ControlFlow::Break(()))
    }

    fn process_roles(&self, ctx: &mut RequestContext, mapping: &ActionMapping) -> Stage {
        match self.roles.check(mapping, ctx) {
            RoleCheck::Granted => Ok(ControlFlow::Continue(())),
            RoleCheck::Denied(forward) => {
                warn!("[ID{}]拒绝访问mapping {}", ctx.id(), mapping.path());
                match forward {
                    Some(forward) => self.process_forward(ctx, &forward)?,
                    None => self.process_status_forward(ctx, 403, Response::response_403)?,
                }
                Ok(ControlFlow::Break(()))
            }
        }
    }

    /// 会话范围的表单先从会话恢复，再用本次请求的参数覆盖
    fn process_form(&self, ctx: &mut RequestContext, mapping: &ActionMapping) -> Result<(), Exception> {
        let class = match mapping.form_class() {
            Some(class) => class,
            None => return Ok(()),
        };
        let mut form = self.registry.create_form(class)?;
        let session_key = match mapping.form_scope() {
            FormScope::Session => Some(format!("{}{}", SESSION_FORM_PREFIX, class)),
            FormScope::Request => None,
        };
        if let Some(value) = session_key
            .as_ref()
            .and_then(|key| ctx.session().and_then(|s| s.attribute(key)))
        {
            debug!("[ID{}]从会话恢复表单{}", ctx.id(), class);
            form.load_value(value);
        }
        form.populate(&ctx.request);
        ctx.set_form(form, session_key);
        Ok(())
    }

    fn process_validate(&self, ctx: &mut RequestContext, mapping: &ActionMapping) -> Stage {
        if !mapping.validate() {
            return Ok(ControlFlow::Continue(()));
        }
        let mut errors = ActionErrors::new();
        match ctx.form() {
            Some(form) => form.validate(&mut errors),
            None => {
                warn!("[ID{}]mapping {} 要求校验但没有表单", ctx.id(), mapping.path());
                return Ok(ControlFlow::Continue(()));
            }
        }
        let valid = errors.is_empty();
        debug!("[ID{}]表单校验{}，错误{}条", ctx.id(), if valid { "通过" } else { "失败" }, errors.len());
        ctx.save_errors(errors);

        // 有 Action 时由 Action 自己决定如何处理校验结果
        if mapping.action_class().is_some() {
            return Ok(ControlFlow::Continue(()));
        }
        let forward = match (valid, mapping.forward()) {
            (true, Some(forward)) => forward.clone(),
            (true, None) => self.find_forward(mapping, "success")?,
            (false, _) => self.find_forward(mapping, "error")?,
        };
        self.process_forward(ctx, &forward)?;
        Ok(ControlFlow::Break(()))
    }

    fn process_mapping_forward(&self, ctx: &mut RequestContext, mapping: &ActionMapping) -> Stage {
        match mapping.forward() {
            Some(forward) => {
                self.process_forward(ctx, forward)?;
                Ok(ControlFlow::Break(()))
            }
            None => Ok(ControlFlow::Continue(())),
        }
    }

    fn process_action_create(&self, mapping: &ActionMapping) -> Result<Box<dyn Action>, Exception> {
        match mapping.action_class() {
            Some(class) => self.registry.create_action(class, mapping),
            None => Err(Exception::MappingWithoutTarget(mapping.path().to_string())),
        }
    }

    /// 前置钩子返回 forward 时不调用 `execute`；后置钩子无论成败都会执行，
    /// 前面的错误在它之后原样返回。
    fn process_action_perform(
        &self,
        ctx: &mut RequestContext,
        mapping: &ActionMapping,
        action: &mut dyn Action,
    ) -> Result<Option<ActionForward>, Exception> {
        let mut failure = None;
        let forward = match action
            .pre_execute(mapping, ctx)
            .and_then(|r| self.resolve(mapping, r))
        {
            Ok(Some(forward)) => {
                debug!("[ID{}]前置钩子返回了forward，跳过execute", ctx.id());
                Some(forward)
            }
            Ok(None) => match action.execute(mapping, ctx).and_then(|r| self.resolve(mapping, r)) {
                Ok(forward) => forward,
                Err(e) => {
                    failure = Some(e);
                    None
                }
            },
            Err(e) => {
                failure = Some(e);
                None
            }
        };

        let post = action
            .post_execute(mapping, ctx, forward)
            .and_then(|r| self.resolve(mapping, r));
        match failure {
            Some(e) => {
                if let Err(post_error) = post {
                    warn!("[ID{}]后置钩子也发生了异常：{}", ctx.id(), post_error);
                }
                Err(e)
            }
            None => post,
        }
    }

    fn resolve(
        &self,
        mapping: &ActionMapping,
        result: Option<ActionResult>,
    ) -> Result<Option<ActionForward>, Exception> {
        match result {
            None => Ok(None),
            Some(ActionResult::Forward(forward)) => Ok(Some(forward)),
            Some(ActionResult::Named(name)) => self.find_forward(mapping, &name).map(Some),
        }
    }

    /// 先查 mapping 自己的 forward，再查模块的全局 forward
    fn find_forward(&self, mapping: &ActionMapping, name: &str) -> Result<ActionForward, Exception> {
        mapping
            .find_forward(name)
            .or_else(|| self.module.find_forward(name))
            .cloned()
            .ok_or_else(|| Exception::ForwardNotFound(format!("{} (mapping {})", name, mapping.path())))
    }

    /// 输出模块中以状态码命名的 forward，没有配置时使用内联页面
    fn process_status_forward<F>(&self, ctx: &mut RequestContext, code: u16, inline: F) -> Result<(), Exception>
    where
        F: FnOnce() -> Response,
    {
        match self.module.find_forward(&code.to_string()) {
            Some(forward) => {
                self.process_forward(ctx, forward)?;
                if !forward.is_redirect() {
                    ctx.response.set_code(code);
                }
            }
            None => ctx.response = inline(),
        }
        Ok(())
    }

    pub fn process_forward(&self, ctx: &mut RequestContext, forward: &ActionForward) -> Result<(), Exception> {
        if forward.is_redirect() {
            ctx.stash_messages();
            let url = redirect_url(ctx, forward.path());
            info!("[ID{}]重定向到{}", ctx.id(), url);
            ctx.response = Response::redirect(&url);
            return Ok(());
        }

        let tile = match self.module.find_tile(forward.path()) {
            Some(tile) => tile,
            None => Arc::new(Tile::from_file(forward.path())),
        };
        debug!("[ID{}]渲染Tile {}", ctx.id(), tile.name());
        let html = {
            let render = RenderContext::new(
                &ctx.request,
                &ctx.response,
                ctx.session(),
                ctx.request.attribute(FORM_KEY),
                self.views,
            )
            .with_base_uri(ctx.base_uri())
            .with_label(forward.label());
            tile.render(&render)?
        };
        ctx.response.set_html(&html);
        Ok(())
    }
}

/// 绝对 URL 原样使用；以 `/` 开头的路径加上基础 URI；
/// 客户端没有会话 Cookie 时把会话 ID 附加到 URL 上。
fn redirect_url(ctx: &RequestContext, path: &str) -> String {
    if is_absolute_url(path) {
        return path.to_string();
    }
    let url = match path.starts_with('/') {
        true => join_path(ctx.base_uri(), path),
        false => path.to_string(),
    };
    match (ctx.session(), ctx.cookie_session_id()) {
        (Some(session), None) => append_query(&url, ctx.session_name(), session.id()),
        _ => url,
    }
}
