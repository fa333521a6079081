// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::{param::*, util::HtmlBuilder};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error};

use std::io::{self, Write};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    headers: Vec<(String, String)>,
    content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            headers: vec![],
            content: None,
        }
    }

    /// 内联的极简错误页面，用于找不到 mapping、方法不允许等没有配置对应 forward 的情况
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let mut response = Self::new();
        let content = match (code, note) {
            (_, Some(n)) => HtmlBuilder::from_status_code(code, Some(n)),
            (403, None) => HtmlBuilder::from_status_code(
                403,
                Some(r"<h2>噢！</h2><p>你没有访问该页面的权限。</p>"),
            ),
            (404, None) => HtmlBuilder::from_status_code(
                404,
                Some(r"<h2>噢！</h2><p>你指定的网页无法找到。</p>"),
            ),
            (405, None) => HtmlBuilder::from_status_code(
                405,
                Some(r"<h2>噢！</h2><p>该页面不接受你的浏览器所使用的HTTP方法。</p>"),
            ),
            (500, None) => HtmlBuilder::from_status_code(
                500,
                Some(r"<h2>噢！</h2><p>服务器出现了一个内部错误。</p>"),
            ),
            _ => HtmlBuilder::from_status_code(code, None),
        }
        .build();
        response.set_html(&content);
        response.set_code(code);
        response
    }

    pub fn response_403() -> Self {
        Self::from_status_code(403, None)
    }

    pub fn response_404() -> Self {
        Self::from_status_code(404, None)
    }

    /// 405 页面，附带 `Allow` 报文头
    pub fn response_405(allow: &[HttpRequestMethod]) -> Self {
        let mut response = Self::from_status_code(405, None);
        if !allow.is_empty() {
            let allow_str = allow
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            response.set_header("Allow", &allow_str);
        }
        response
    }

    pub fn response_500() -> Self {
        Self::from_status_code(500, None)
    }

    /// 302 重定向
    pub fn redirect(location: &str) -> Self {
        let mut response = Self::new();
        response.set_code(302);
        response.set_header("Location", location);
        response
    }

    pub fn set_html(&mut self, html: &str) -> &mut Self {
        self.content_type = Some("text/html;charset=utf-8".to_string());
        self.content = Some(Bytes::from(html.to_string()));
        self
    }

    pub fn set_body(&mut self, content_type: &str, body: Bytes) -> &mut Self {
        self.content_type = Some(content_type.to_string());
        self.content = Some(body);
        self
    }

    pub fn set_date(&mut self) -> &mut Self {
        self.date = Utc::now();
        self
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown".to_string()
            }
        };
        self
    }

    /// 设置报文头，覆盖已有的同名报文头
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// 追加报文头，允许重复（如 `Set-Cookie`）
    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// 根据客户端声明的编码压缩响应体。只对尚未压缩的文本内容生效。
    pub fn encode(&mut self, accept_encoding: &[HttpEncoding], id: u128) -> &mut Self {
        if self.content_encoding.is_some() {
            return self;
        }
        let skip = match &self.content_type {
            Some(t) => should_skip_compression(t),
            None => true,
        };
        let encoding = match skip {
            true => None,
            false => decide_encoding(accept_encoding),
        };
        match encoding {
            Some(HttpEncoding::Gzip) => debug!("[ID{}]使用Gzip压缩编码", id),
            Some(HttpEncoding::Br) => debug!("[ID{}]使用Brotli压缩编码", id),
            Some(HttpEncoding::Deflate) => debug!("[ID{}]使用Deflate压缩编码", id),
            None => {
                debug!("[ID{}]不进行压缩", id);
                return self;
            }
        };
        if let Some(content) = &self.content {
            match compress(content.to_vec(), encoding) {
                Ok(c) => {
                    self.content = Some(Bytes::from(c));
                    self.content_encoding = encoding;
                }
                Err(e) => error!("[ID{}]压缩响应体失败: {}，返回未压缩内容", id, e),
            }
        }
        self
    }

    /// HEAD 请求只保留报文头，Content-Length 仍按完整响应体计算
    pub fn as_bytes_head(&self) -> Vec<u8> {
        self.header_bytes()
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let header = self.header_bytes();
        [header.as_slice(), self.body()].concat()
    }

    fn header_bytes(&self) -> Vec<u8> {
        let version: &str = match self.version {
            HttpVersion::V1_0 => "HTTP/1.0",
            HttpVersion::V1_1 => "HTTP/1.1",
        };
        let content_length = self.content.as_ref().map_or(0, |c| c.len());

        let mut header = format!(
            "{} {} {}{}",
            version, self.status_code, self.information, CRLF
        );
        if let Some(t) = &self.content_type {
            header.push_str(&format!("Content-Type: {}{}", t, CRLF));
        }
        if let Some(e) = self.content_encoding {
            header.push_str(&format!("Content-encoding: {}{}", e, CRLF));
        }
        header.push_str(&format!("Content-Length: {}{}", content_length, CRLF));
        header.push_str(&format!("Date: {}{}", format_date(&self.date), CRLF));
        header.push_str(&format!("Server: {}{}", self.server_name, CRLF));
        for (name, value) in &self.headers {
            header.push_str(&format!("{}: {}{}", name, value, CRLF));
        }
        header.push_str(CRLF);
        header.into_bytes()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers_named(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// 响应体（未压缩时即原文）
    pub fn body(&self) -> &[u8] {
        self.content.as_deref().unwrap_or(b"")
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(self.body()).to_string()
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    };

    if let Ok(ref compressed) = result {
        let compressed_size = compressed.len();
        let ratio = if original_size > 0 {
            ((original_size as i64 - compressed_size as i64) as f64 / original_size as f64) * 100.0
        } else {
            0.0
        };
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes, 压缩率: {:.1}%",
            mode, original_size, compressed_size, ratio
        );
    }

    result
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/",
        "video/",
        "audio/",
        "application/zip",
        "application/gzip",
        "application/octet-stream",
        "font/woff",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else {
        None
    }
}
