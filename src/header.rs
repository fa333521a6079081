// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 报文头解析模块
//!
//! 逐行累积原始 HTTP 头，构建 `名称 -> 值列表` 的映射：
//! 1. 以空格或制表符开头的行是续行（RFC 2616 §2.2 的 line folding），
//!    会以单个空格拼接到最近一个报文头的最后一个值上。
//! 2. 重复出现的报文头名称会按到达顺序保留所有值。
//! 3. 名称查找大小写不敏感，但保留首次出现时的原始写法。
//! 4. 空行表示报文头块结束，之后的行被忽略。

use log::warn;

/// 已解析的报文头集合，保持首次出现的顺序。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// 追加一个值；同名报文头已存在时追加到其值列表末尾
    pub fn append(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(i) => self.entries[i].1.push(value.to_string()),
            None => self
                .entries
                .push((name.to_string(), vec![value.to_string()])),
        }
    }

    /// 第一个值
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|i| self.entries[i].1.first())
            .map(|v| v.as_str())
    }

    /// 全部值（按到达顺序）
    pub fn get_all(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(i) => &self.entries[i].1,
            None => &[],
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }
}

/// 增量式报文头解析器。
///
/// 既可以一次性解析整块文本（[`HeaderParser::parse`]），
/// 也可以从网络读取一行喂一行（[`HeaderParser::feed`]）。
#[derive(Debug, Default)]
pub struct HeaderParser {
    headers: Headers,
    last: Option<usize>,
    finished: bool,
}

impl HeaderParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 喂入一行（不含行尾 CRLF 也可以）。
    ///
    /// 返回 `false` 表示报文头块已经结束，不再接受新行。
    pub fn feed(&mut self, line: &str) -> bool {
        if self.finished {
            return false;
        }
        let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
        if line.is_empty() {
            self.finished = true;
            return false;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            let folded = line.trim();
            match self.last {
                Some(i) => {
                    if let Some(value) = self.headers.entries[i].1.last_mut() {
                        if !folded.is_empty() {
                            if !value.is_empty() {
                                value.push(' ');
                            }
                            value.push_str(folded);
                        }
                    }
                }
                None => warn!("报文头续行出现在任何报文头之前，已忽略：{}", line),
            }
            return true;
        }

        match line.split_once(':') {
            Some((name, value)) => {
                let name = name.trim();
                if name.is_empty() {
                    warn!("报文头名称为空，已忽略：{}", line);
                    return true;
                }
                self.headers.append(name, value.trim());
                self.last = self.headers.position(name);
            }
            None => warn!("无法识别的报文头行，已忽略：{}", line),
        }
        true
    }

    /// 报文头块是否已经由空行结束
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn into_headers(self) -> Headers {
        self.headers
    }

    /// 一次性解析整块报文头文本
    pub fn parse(text: &str) -> Headers {
        let mut parser = Self::new();
        for line in text.split('\n') {
            if !parser.feed(line) {
                break;
            }
        }
        parser.into_headers()
    }
}
