// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责将 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体。它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、路径、版本）。
//! 2. 报文头的解析（委托给 [`HeaderParser`]，支持续行与重复报文头）。
//! 3. 查询字符串与 `application/x-www-form-urlencoded` 请求体参数的解析。
//! 4. Cookie 的提取。
//!
//! 除协议字段之外，`Request` 还携带一个仅在本次请求期间有效的属性表（attributes），
//! 请求处理管线通过它在各阶段之间传递 ActionErrors、表单等数据。

use std::collections::HashMap;

use bytes::Bytes;
use log::{debug, error};
use serde_json::Value;

use crate::{exception::Exception, header::HeaderParser, header::Headers, param::*};

/// 表示一个完整的 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法（GET, POST 等）
    method: HttpRequestMethod,
    /// 请求的资源路径（包含查询字符串）
    path: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 全部报文头
    headers: Headers,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
    /// 查询字符串与表单请求体合并后的参数，请求体中的同名参数覆盖查询字符串
    parameters: HashMap<String, String>,
    /// 请求携带的 Cookie
    cookies: HashMap<String, String>,
    /// 原始请求体
    body: Bytes,
    /// 本次请求期间有效的属性表
    attributes: HashMap<String, Value>,
}

impl Request {
    /// 以方法和路径构造一个没有报文头和请求体的请求。
    pub fn new(method: HttpRequestMethod, path: &str) -> Self {
        let mut request = Self {
            method,
            path: path.to_string(),
            version: HttpVersion::V1_1,
            headers: Headers::new(),
            accept_encoding: vec![],
            parameters: HashMap::new(),
            cookies: HashMap::new(),
            body: Bytes::new(),
            attributes: HashMap::new(),
        };
        if let Some((_, query)) = path.split_once('?') {
            request.parameters.extend(parse_urlencoded(query));
        }
        request
    }

    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 以空行切分报文头与请求体，验证报文头是合法的 UTF-8 字符串。
    /// 2. 解析请求行：提取方法、路径和协议版本。
    /// 3. 逐行解析报文头，并从中提取 `Accept-Encoding` 与 `Cookie`。
    /// 4. 解析查询字符串，以及表单编码的请求体。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的原始数据。
    /// * `id` - 全局请求 ID，用于在多线程环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        // 1. 切分报文头与请求体
        let (head_bytes, body_bytes) = split_head(buffer);
        let head = match std::str::from_utf8(head_bytes) {
            Ok(s) => s,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };
        let mut lines = head.split(CRLF);

        // 2. 解析请求行 (e.g., "GET /index.html HTTP/1.1")
        let request_line = lines.next().unwrap_or("");
        let first_line_parts: Vec<&str> = request_line.split(' ').collect();
        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest);
        }

        let method = match HttpRequestMethod::parse(first_line_parts[0]) {
            Some(m) => m,
            None => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, first_line_parts[0]);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 路径中可能包含空格，虽然不规范但通过 join 尝试恢复
        let path = if first_line_parts.len() == 3 {
            first_line_parts[1].to_string()
        } else {
            first_line_parts[1..first_line_parts.len() - 1].join(" ")
        };

        // 3. 报文头
        let mut parser = HeaderParser::new();
        for line in lines {
            if !parser.feed(line) {
                break;
            }
        }
        let headers = parser.into_headers();

        let mut accept_encoding = vec![];
        if let Some(encoding) = headers.get("Accept-Encoding") {
            if encoding.contains("gzip") {
                accept_encoding.push(HttpEncoding::Gzip);
            }
            if encoding.contains("deflate") {
                accept_encoding.push(HttpEncoding::Deflate);
            }
            if encoding.contains("br") {
                accept_encoding.push(HttpEncoding::Br);
            }
        }

        let mut cookies = HashMap::new();
        for line in headers.get_all("Cookie") {
            for pair in line.split(';') {
                if let Some((k, v)) = pair.split_once('=') {
                    cookies.insert(k.trim().to_string(), v.trim().to_string());
                }
            }
        }

        // 4. 参数
        let mut parameters = HashMap::new();
        if let Some((_, query)) = path.split_once('?') {
            parameters.extend(parse_urlencoded(query));
        }
        let body = Bytes::copy_from_slice(body_bytes);
        let is_form = headers
            .get("Content-Type")
            .map_or(false, |t| t.starts_with("application/x-www-form-urlencoded"));
        if is_form && !body.is_empty() {
            match std::str::from_utf8(&body) {
                Ok(text) => parameters.extend(parse_urlencoded(text)),
                Err(_) => debug!("[ID{}]表单请求体不是UTF-8，忽略", id),
            }
        }

        Ok(Self {
            method,
            path,
            version,
            headers,
            accept_encoding,
            parameters,
            cookies,
            body,
            attributes: HashMap::new(),
        })
    }
}

/// 在第一个空行处切分报文头和请求体
fn split_head(buffer: &[u8]) -> (&[u8], &[u8]) {
    match buffer.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(i) => (&buffer[..i], &buffer[i + 4..]),
        None => (buffer, &[]),
    }
}

fn parse_urlencoded(text: &str) -> Vec<(String, String)> {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(text) {
        Ok(pairs) => pairs,
        Err(e) => {
            debug!("无法解析参数{}：{}", text, e);
            vec![]
        }
    }
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取 HTTP 协议版本
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 获取请求路径（含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取不含查询字符串的请求路径
    pub fn path_info(&self) -> &str {
        match self.path.split_once('?') {
            Some((p, _)) => p,
            None => &self.path,
        }
    }

    /// 获取请求方法
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 获取用户代理字符串
    pub fn user_agent(&self) -> &str {
        self.headers.get("User-Agent").unwrap_or("")
    }

    /// 获取客户端支持的压缩算法列表
    pub fn accept_encoding(&self) -> &Vec<HttpEncoding> {
        &self.accept_encoding
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(|v| v.as_str())
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|v| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
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

    /// 设置参数，主要供测试与内部转发使用
    pub fn set_parameter(&mut self, name: &str, value: &str) {
        self.parameters.insert(name.to_string(), value.to_string());
    }

    /// 追加报文头，主要供测试使用
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        if name.eq_ignore_ascii_case("Cookie") {
            for pair in value.split(';') {
                if let Some((k, v)) = pair.split_once('=') {
                    self.cookies.insert(k.trim().to_string(), v.trim().to_string());
                }
            }
        }
        self
    }
}
