// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::param::STATUS_CODES;

pub struct HtmlBuilder {
    title: String,
    css: String,
    script: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => n,
            None => STATUS_CODES.get(&code).copied().unwrap_or("Unknown"),
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self {
            title,
            css,
            script: "".to_string(),
            body,
        }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <!-- 本文件由ministruts自动生成 -->
            <html>
                <head>
                    <meta charset="utf-8">
                    <script>{}</script>
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.script, self.title, self.css, self.body
        )
    }
}

/// 是否为带协议头的绝对 URL
pub fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//")
}

/// 拼接两个路径片段，保证中间恰好一个 `/`
pub fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => [base, &path[1..]].concat(),
        (false, false) if !base.is_empty() && !path.is_empty() => [base, "/", path].concat(),
        _ => [base, path].concat(),
    }
}

/// 在 URL 上追加一个查询参数，保留锚点
pub fn append_query(url: &str, name: &str, value: &str) -> String {
    let (main, fragment) = match url.split_once('#') {
        Some((m, f)) => (m, Some(f)),
        None => (url, None),
    };
    let separator = if main.contains('?') { '&' } else { '?' };
    let mut result = format!("{}{}{}={}", main, separator, name, value);
    if let Some(f) = fragment {
        result.push('#');
        result.push_str(f);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_builder_from_status_code() {
        let html = HtmlBuilder::from_status_code(404, Some("测试404")).build();
        assert!(html.contains("404"));
        assert!(html.contains("测试404"));
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_html_builder_from_status_code_no_note() {
        let html = HtmlBuilder::from_status_code(405, None).build();
        assert!(html.contains("405"));
        assert!(html.contains("Method Not Allowed"));
    }

    #[test]
    fn test_html_builder_unknown_code() {
        let html = HtmlBuilder::from_status_code(999, None).build();
        assert!(html.contains("Unknown"));
    }

    #[test]
    fn test_html_builder_structure() {
        let html = HtmlBuilder::from_status_code(404, Some("测试")).build();

        assert!(html.contains("<html>"));
        assert!(html.contains("<head>"));
        assert!(html.contains("<body>"));
        assert!(html.contains("<title>"));
        assert!(html.contains("<style>"));
        assert!(html.contains("charset=\"utf-8\""));
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/app/", "/home"), "/app/home");
        assert_eq!(join_path("/app", "home"), "/app/home");
        assert_eq!(join_path("/app/", "home"), "/app/home");
        assert_eq!(join_path("", "/home"), "/home");
    }

    #[test]
    fn test_append_query() {
        assert_eq!(append_query("/a", "SID", "1"), "/a?SID=1");
        assert_eq!(append_query("/a?x=y", "SID", "1"), "/a?x=y&SID=1");
        assert_eq!(append_query("/a#top", "SID", "1"), "/a?SID=1#top");
    }

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("https://example.com/"));
        assert!(!is_absolute_url("/local"));
    }
}
