// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 应用
//!
//! `Application` 把一次 HTTP 请求交给框架：选出模块、执行处理管线、保存会话，
//! 并把管线中逃逸出来的异常记录下来，转成 500 页面。

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};

use crate::{
    cache::ViewCache,
    config::Config,
    context::RequestContext,
    controller::{ControllerCache, StrutsController},
    exception::Exception,
    processor::RequestProcessor,
    registry::Registry,
    request::Request,
    response::Response,
    role::{RoleProcessor, SessionRoleProcessor},
    session::{MemorySessionStore, SessionStore},
};

pub struct Application {
    config: Config,
    registry: Registry,
    sessions: Arc<dyn SessionStore>,
    roles: Box<dyn RoleProcessor>,
    views: ViewCache,
    controllers: ControllerCache,
}

impl Application {
    pub fn new(config: Config, registry: Registry) -> Self {
        let ttl = Duration::from_secs(config.session_ttl_secs());
        Self {
            sessions: Arc::new(MemorySessionStore::new(ttl)),
            roles: Box::new(SessionRoleProcessor::new()),
            views: ViewCache::from_capacity(&config.view_root(), config.cache_size()),
            controllers: ControllerCache::new(&config.config_dir(), config.base_uri()),
            config,
            registry,
        }
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = store;
        self
    }

    pub fn with_role_processor<R: RoleProcessor + 'static>(mut self, roles: R) -> Self {
        self.roles = Box::new(roles);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// 清理过期会话，返回清理的数量
    pub fn purge_sessions(&self) -> usize {
        let purged = self.sessions.purge_expired();
        if purged > 0 {
            info!("清理了{}个过期会话", purged);
        }
        purged
    }

    /// 载入全部模块配置。启动时调用，配置错误应当终止进程。
    pub fn start(&self) -> Result<Arc<StrutsController>, Exception> {
        self.controllers.get(&self.registry)
    }

    /// 丢弃已缓存的配置并立即重新载入
    pub fn reload(&self) -> Result<Arc<StrutsController>, Exception> {
        info!("重新载入模块配置");
        self.controllers.invalidate();
        self.controllers.get(&self.registry)
    }

    pub fn handle(&self, request: Request, id: u128) -> Response {
        let controller = match self.controllers.get(&self.registry) {
            Ok(controller) => controller,
            Err(e) => {
                error!("[ID{}]无法载入模块配置：{}", id, e);
                return Response::response_500();
            }
        };
        let (module, path) = controller.select_module(request.path_info());
        debug!(
            "[ID{}]请求{}交给模块'{}'，模块内路径为{}",
            id,
            request.path(),
            module.prefix(),
            path
        );

        let mut ctx = RequestContext::new(
            id,
            request,
            self.sessions.clone(),
            self.config.session_name(),
            self.config.base_uri(),
        );
        let processor = RequestProcessor::new(module, &self.registry, self.roles.as_ref(), &self.views);
        if let Err(e) = processor.process(&mut ctx, &path) {
            error!("[ID{}]处理请求时发生异常：{}", id, e);
            ctx.response = Response::response_500();
        }
        self.commit_session(&mut ctx);
        ctx.response
    }

    /// 写回会话；新建的会话通过 `Set-Cookie` 告知客户端
    fn commit_session(&self, ctx: &mut RequestContext) {
        let session = match ctx.take_session() {
            Some(session) => session,
            None => return,
        };
        if let Err(e) = self.sessions.save(&session) {
            error!("[ID{}]保存会话失败：{}", ctx.id(), e);
            return;
        }
        if session.is_new() {
            let cookie = format!(
                "{}={}; Path={}; HttpOnly",
                self.config.session_name(),
                session.id(),
                self.config.base_uri()
            );
            ctx.response.add_header("Set-Cookie", &cookie);
        }
    }
}
