// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Action
//!
//! Action 是业务逻辑的入口。处理管线按如下顺序调用：
//!
//! 1. `pre_execute`：返回了 forward 时跳过 `execute`
//! 2. `execute`
//! 3. `post_execute`：总会被调用，即使前两步出错；它收到目前为止的 forward，可以替换掉
//!
//! 前两步的错误会在 `post_execute` 之后原样返回，不会被吞掉。
//! 三个方法都可以返回 `None`，表示 Action 已经自己写好了响应。

use crate::{context::RequestContext, exception::Exception, mapping::ActionForward};

use crate::mapping::ActionMapping;

/// Action 的返回值：一个完整的 forward，或者按名字在 mapping 与全局 forward 中查找
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Forward(ActionForward),
    Named(String),
}

impl From<ActionForward> for ActionResult {
    fn from(forward: ActionForward) -> Self {
        ActionResult::Forward(forward)
    }
}

impl From<&str> for ActionResult {
    fn from(name: &str) -> Self {
        ActionResult::Named(name.to_string())
    }
}

pub type ActionOutcome = Result<Option<ActionResult>, Exception>;

pub trait Action {
    fn pre_execute(&mut self, _mapping: &ActionMapping, _ctx: &mut RequestContext) -> ActionOutcome {
        Ok(None)
    }

    fn execute(&mut self, mapping: &ActionMapping, ctx: &mut RequestContext) -> ActionOutcome;

    fn post_execute(
        &mut self,
        _mapping: &ActionMapping,
        _ctx: &mut RequestContext,
        forward: Option<ActionForward>,
    ) -> ActionOutcome {
        Ok(forward.map(ActionResult::Forward))
    }
}

/// 总是返回同一个命名 forward 的 Action，用于只做跳转的 mapping
pub struct ForwardAction {
    name: String,
}

impl ForwardAction {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Action for ForwardAction {
    fn execute(&mut self, _mapping: &ActionMapping, _ctx: &mut RequestContext) -> ActionOutcome {
        Ok(Some(ActionResult::Named(self.name.clone())))
    }
}
