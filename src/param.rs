// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了 `ministruts` 遵循的 HTTP 协议相关常量和数据结构，包括：
//! - 常见的 HTTP 状态码及其原因短语（Reason Phrase）。
//! - 框架在请求属性与会话中使用的保留键名。
//! - HTTP 方法、版本及编码格式的强类型枚举。

use lazy_static::lazy_static;
use std::collections::HashMap;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "ministruts";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 请求属性 / 会话中保存 ActionErrors 的键
pub const ACTION_ERRORS_KEY: &str = "ministruts.action_errors";

/// 请求属性 / 会话中保存 ActionMessages 的键
pub const ACTION_MESSAGES_KEY: &str = "ministruts.action_messages";

/// 请求属性中保存当前 ActionForm 取值的键
pub const FORM_KEY: &str = "ministruts.form";

/// 会话中保存 session 作用域表单的键前缀，后接表单类名
pub const SESSION_FORM_PREFIX: &str = "ministruts.form.";

/// 会话中保存当前用户角色列表的键
pub const ROLES_KEY: &str = "roles";

/// 基础模块配置文件名
pub const BASE_CONFIG_FILE: &str = "struts-config.toml";

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        // 1xx: 信息响应 (Informational)
        map.insert(100, "Continue");
        map.insert(101, "Switching Protocols");

        // 2xx: 成功响应 (Successful)
        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(202, "Accepted");
        map.insert(204, "No Content");

        // 3xx: 重定向 (Redirection)
        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(303, "See Other");
        map.insert(304, "Not Modified");
        map.insert(307, "Temporary Redirect");
        map.insert(308, "Permanent Redirect");

        // 4xx: 客户端错误 (Client Error)
        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(408, "Request Timeout");
        map.insert(409, "Conflict");
        map.insert(410, "Gone");
        map.insert(411, "Length Required");
        map.insert(413, "Content Too Large");
        map.insert(414, "URI Too Long");
        map.insert(415, "Unsupported Media Type");
        map.insert(422, "Unprocessable Content");

        // 5xx: 服务端错误 (Server Error)
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(502, "Bad Gateway");
        map.insert(503, "Service Unavailable");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    /// HTTP/1.0 版本
    V1_0,
    /// HTTP/1.1 版本
    V1_1,
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 获取资源的元数据（不包含响应体）
    Head,
    /// 查询服务器支持的选项
    Options,
    /// 提交数据或执行操作
    Post,
    /// 替换资源
    Put,
    /// 删除资源
    Delete,
    /// 部分修改资源
    Patch,
}

impl HttpRequestMethod {
    /// 从方法名解析（大小写不敏感），未知方法返回 `None`
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "GET" => Some(HttpRequestMethod::Get),
            "HEAD" => Some(HttpRequestMethod::Head),
            "OPTIONS" => Some(HttpRequestMethod::Options),
            "POST" => Some(HttpRequestMethod::Post),
            "PUT" => Some(HttpRequestMethod::Put),
            "DELETE" => Some(HttpRequestMethod::Delete),
            "PATCH" => Some(HttpRequestMethod::Patch),
            _ => None,
        }
    }
}

/// 支持的内容编码（压缩）格式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpEncoding {
    /// GNU zip 压缩
    Gzip,
    /// zlib 压缩
    Deflate,
    /// Brotli 压缩
    Br,
}

use std::fmt;

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 HTTP 报文中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "1.0"),
            HttpVersion::V1_1 => write!(f, "1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
            HttpRequestMethod::Post => write!(f, "POST"),
            HttpRequestMethod::Put => write!(f, "PUT"),
            HttpRequestMethod::Delete => write!(f, "DELETE"),
            HttpRequestMethod::Patch => write!(f, "PATCH"),
        }
    }
}

impl fmt::Display for HttpEncoding {
    /// 将枚举格式化为 `Content-Encoding` 头所使用的标识符
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpEncoding::Gzip => write!(f, "gzip"),
            HttpEncoding::Deflate => write!(f, "deflate"),
            HttpEncoding::Br => write!(f, "br"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_case_insensitive() {
        assert_eq!(HttpRequestMethod::parse("get"), Some(HttpRequestMethod::Get));
        assert_eq!(HttpRequestMethod::parse("Delete"), Some(HttpRequestMethod::Delete));
        assert_eq!(HttpRequestMethod::parse("BREW"), None);
    }

    #[test]
    fn test_method_display_roundtrip() {
        for m in ["GET", "HEAD", "OPTIONS", "POST", "PUT", "DELETE", "PATCH"] {
            assert_eq!(HttpRequestMethod::parse(m).unwrap().to_string(), m);
        }
    }
}
