// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了框架在启动（加载配置）和请求处理生命周期中可能抛出的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖了配置错误、协议解析错误、请求分发错误以及用户 Action 执行错误。
//! - **语义映射**：配置类错误在启动时是致命的；请求类错误由上层模块转化为对应的 HTTP 响应。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地记录到日志中。

use std::fmt;

/// 框架处理过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示处理失败的具体原因。
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    /// 读取配置文件或配置目录失败。
    ConfigIo(String),
    /// 配置文件内容无法解析。
    ConfigParse(String),
    /// 配置目录下缺少基础配置文件 `struts-config.toml`。
    ConfigNotFound(String),
    /// 两个配置文件解析出了同一个模块前缀。
    DuplicateModulePrefix(String),
    /// Tile 的 `extends` 指向了一个不存在的 Tile。
    UnknownTileParent(String),
    /// Tile 的继承链出现了环。
    TileCycle(String),
    /// Mapping 引用的 Action 类没有在注册表中登记。
    UnknownActionClass(String),
    /// Mapping 引用的 Form 类没有在注册表中登记。
    UnknownFormClass(String),
    /// Mapping 既没有 Action，也没有 forward，也不做表单校验，无事可做。
    MappingWithoutTarget(String),
    /// Mapping 的路径通配符无法编译。
    InvalidPattern(String),
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行或请求头格式不正确。
    MalformedRequest,
    /// 客户端使用了框架不支持的 HTTP 方法。
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 按名称查找 forward 失败。
    ForwardNotFound(String),
    /// 渲染 Tile 时找不到视图文件。
    ViewNotFound(String),
    /// 视图文件不是合法的模板，或渲染模板失败。
    ViewRender(String),
    /// 试图修改一个已经冻结的 Tile。
    TileFrozen(String),
    /// 用户 Action（或其前后钩子）执行失败。
    ActionFailed(String),
}

use Exception::*;

impl Exception {
    /// 是否属于配置类错误。配置类错误在启动阶段是致命的。
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ConfigIo(_)
                | ConfigParse(_)
                | ConfigNotFound(_)
                | DuplicateModulePrefix(_)
                | UnknownTileParent(_)
                | TileCycle(_)
                | UnknownActionClass(_)
                | UnknownFormClass(_)
                | MappingWithoutTarget(_)
                | InvalidPattern(_)
        )
    }
}

/// 为 `Exception` 实现 `Display` 特性，使其支持字符串格式化输出。
impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigIo(e) => write!(f, "Couldn't read configuration: {}", e),
            ConfigParse(e) => write!(f, "Malformed configuration: {}", e),
            ConfigNotFound(dir) => write!(f, "No struts-config.toml found in {}", dir),
            DuplicateModulePrefix(p) => write!(f, "Module prefix '{}' is declared twice", p),
            UnknownTileParent(t) => write!(f, "Tile extends unknown tile: {}", t),
            TileCycle(t) => write!(f, "Tile inheritance cycle at: {}", t),
            UnknownActionClass(c) => write!(f, "Action class is not registered: {}", c),
            UnknownFormClass(c) => write!(f, "Form class is not registered: {}", c),
            MappingWithoutTarget(p) => write!(f, "Mapping {} has no action, forward or validation", p),
            InvalidPattern(p) => write!(f, "Invalid mapping pattern: {}", p),
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequest => write!(f, "Malformed HTTP request"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            ForwardNotFound(name) => write!(f, "Forward not found: {}", name),
            ViewNotFound(path) => write!(f, "View file not found: {}", path),
            ViewRender(e) => write!(f, "Couldn't render view: {}", e),
            TileFrozen(name) => write!(f, "Tile {} is frozen and can't be modified", name),
            ActionFailed(e) => write!(f, "Action failed: {}", e),
        }
    }
}

impl std::error::Error for Exception {}
