// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 表单字段校验工具。空字段只受 `Required` 约束，其余规则遇到空值直接通过。

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::message::ActionErrors;

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap();
    static ref NUMERIC: Regex = Regex::new(r"^[+\-]?(\d+\.?\d*|\.\d+)$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule<'a> {
    Required,
    Email,
    Numeric,
    /// 按字符计数的长度范围（含两端）
    Length(usize, usize),
    Pattern(&'a str),
}

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn is_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

pub fn is_numeric(value: &str) -> bool {
    NUMERIC.is_match(value)
}

pub fn length_between(value: &str, min: usize, max: usize) -> bool {
    let len = value.chars().count();
    len >= min && len <= max
}

/// 整个值都要匹配。无法编译的正则视为不匹配。
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match Regex::new(&format!("^(?:{})$", pattern)) {
        Ok(re) => re.is_match(value),
        Err(e) => {
            warn!("无法编译校验用的正则表达式 {}：{}", pattern, e);
            false
        }
    }
}

impl Rule<'_> {
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Rule::Required => !is_blank(value),
            _ if value.is_empty() => true,
            Rule::Email => is_email(value),
            Rule::Numeric => is_numeric(value),
            Rule::Length(min, max) => length_between(value, *min, *max),
            Rule::Pattern(p) => matches_pattern(value, p),
        }
    }

    fn message(&self) -> String {
        match self {
            Rule::Required => "不能为空".to_string(),
            Rule::Email => "不是有效的邮箱地址".to_string(),
            Rule::Numeric => "必须是数字".to_string(),
            Rule::Length(min, max) => format!("长度必须在{}到{}之间", min, max),
            Rule::Pattern(_) => "格式不正确".to_string(),
        }
    }
}

/// 依次检查规则，遇到第一条不满足的规则时记录错误并停止。返回字段是否通过。
pub fn check_field(errors: &mut ActionErrors, field: &str, value: &str, rules: &[Rule]) -> bool {
    match rules.iter().find(|r| !r.accepts(value)) {
        Some(rule) => {
            errors.add(field, &rule.message());
            false
        }
        None => true,
    }
}
