// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # ActionMapping 与 ActionForward
//!
//! `ActionMapping` 描述一个请求路径该如何处理：允许的方法、需要的角色、
//! 使用哪个表单类和 Action 类、是否校验表单，以及按名称查找的 forward 表。
//! 这些对象在加载配置时构建，之后只以共享引用的形式被读取。

use std::collections::HashMap;

use regex::Regex;
use serde_derive::Deserialize;

use crate::{exception::Exception, param::HttpRequestMethod};

/// 命名的跳转目标：一个路径（URL、应用内路径或 Tile 名）加上是否重定向
#[derive(Debug, Clone, PartialEq)]
pub struct ActionForward {
    name: String,
    path: String,
    redirect: bool,
    label: Option<String>,
}

impl ActionForward {
    pub fn new(name: &str, path: &str, redirect: bool) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            redirect,
            label: None,
        }
    }

    /// 以路径本身为名称的非重定向 forward
    pub fn to(path: &str) -> Self {
        Self::new(path, path, false)
    }

    pub fn redirect_to(path: &str) -> Self {
        Self::new(path, path, true)
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// 表单实例的保存范围
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormScope {
    #[default]
    Request,
    Session,
}

#[derive(Debug, Clone)]
pub struct ActionMapping {
    path: String,
    pattern: Option<Regex>,
    methods: Vec<HttpRequestMethod>,
    roles: Vec<String>,
    form: Option<String>,
    scope: FormScope,
    action: Option<String>,
    validate: bool,
    forward: Option<ActionForward>,
    forwards: HashMap<String, ActionForward>,
    default: bool,
}

impl ActionMapping {
    /// 路径中的 `*` 匹配一段不含 `/` 的非空字符
    pub fn new(path: &str) -> Result<Self, Exception> {
        let pattern = match path.contains('*') {
            true => {
                let source = format!(
                    "^{}$",
                    path.split('*')
                        .map(regex::escape)
                        .collect::<Vec<_>>()
                        .join("([^/]+)")
                );
                Some(Regex::new(&source).map_err(|e| {
                    Exception::InvalidPattern(format!("{}: {}", path, e))
                })?)
            }
            false => None,
        };
        Ok(Self {
            path: path.to_string(),
            pattern,
            methods: vec![],
            roles: vec![],
            form: None,
            scope: FormScope::Request,
            action: None,
            validate: false,
            forward: None,
            forwards: HashMap::new(),
            default: false,
        })
    }

    pub fn with_methods(mut self, methods: &[HttpRequestMethod]) -> Self {
        self.methods = methods.to_vec();
        self
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_form(mut self, class: &str, scope: FormScope) -> Self {
        self.form = Some(class.to_string());
        self.scope = scope;
        self
    }

    pub fn with_action(mut self, class: &str) -> Self {
        self.action = Some(class.to_string());
        self
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// 无条件 forward：设置后 Action 不会被执行
    pub fn with_forward(mut self, forward: ActionForward) -> Self {
        self.forward = Some(forward);
        self
    }

    pub fn add_forward(mut self, forward: ActionForward) -> Self {
        self.forwards.insert(forward.name().to_string(), forward);
        self
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}

impl ActionMapping {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_pattern(&self) -> bool {
        self.pattern.is_some()
    }

    /// 路径是否命中本 mapping。精确路径直接比较，通配路径用正则匹配。
    pub fn matches(&self, path: &str) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(path),
            None => self.path == path,
        }
    }

    /// 通配符捕获到的片段，按出现顺序排列
    pub fn wildcards(&self, path: &str) -> Vec<String> {
        match &self.pattern {
            Some(re) => re
                .captures(path)
                .map(|c| {
                    c.iter()
                        .skip(1)
                        .flatten()
                        .map(|m| m.as_str().to_string())
                        .collect()
                })
                .unwrap_or_default(),
            None => vec![],
        }
    }

    pub fn methods(&self) -> &[HttpRequestMethod] {
        &self.methods
    }

    /// 未限制方法时允许任何方法；允许 GET 时同时允许 HEAD
    pub fn allows_method(&self, method: HttpRequestMethod) -> bool {
        if self.methods.is_empty() || self.methods.contains(&method) {
            return true;
        }
        method == HttpRequestMethod::Head && self.methods.contains(&HttpRequestMethod::Get)
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn form_class(&self) -> Option<&str> {
        self.form.as_deref()
    }

    pub fn form_scope(&self) -> FormScope {
        self.scope
    }

    pub fn action_class(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    pub fn forward(&self) -> Option<&ActionForward> {
        self.forward.as_ref()
    }

    pub fn find_forward(&self, name: &str) -> Option<&ActionForward> {
        self.forwards.get(name)
    }

    pub fn forwards(&self) -> impl Iterator<Item = &ActionForward> {
        self.forwards.values()
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    /// 是否有事可做：执行 Action、直接 forward 或者只做表单校验
    pub fn has_target(&self) -> bool {
        self.action.is_some() || self.forward.is_some() || (self.form.is_some() && self.validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let mapping = ActionMapping::new("/users").unwrap();
        assert!(mapping.matches("/users"));
        assert!(!mapping.matches("/users/1"));
        assert!(!mapping.is_pattern());
    }

    #[test]
    fn test_wildcard_match() {
        let mapping = ActionMapping::new("/edit*.do").unwrap();
        assert!(mapping.is_pattern());
        assert!(mapping.matches("/editUser.do"));
        assert!(!mapping.matches("/edit.do"));
        assert!(!mapping.matches("/edit/x.do"));
        assert_eq!(mapping.wildcards("/editUser.do"), vec!["User"]);
    }

    #[test]
    fn test_pattern_escapes_regex_characters() {
        let mapping = ActionMapping::new("/a+b/*").unwrap();
        assert!(mapping.matches("/a+b/c"));
        assert!(!mapping.matches("/aab/c"));
    }

    #[test]
    fn test_method_restriction() {
        let open = ActionMapping::new("/x").unwrap();
        assert!(open.allows_method(HttpRequestMethod::Delete));

        let restricted = ActionMapping::new("/x")
            .unwrap()
            .with_methods(&[HttpRequestMethod::Get]);
        assert!(restricted.allows_method(HttpRequestMethod::Get));
        assert!(restricted.allows_method(HttpRequestMethod::Head));
        assert!(!restricted.allows_method(HttpRequestMethod::Post));

        let post_only = ActionMapping::new("/x")
            .unwrap()
            .with_methods(&[HttpRequestMethod::Post]);
        assert!(!post_only.allows_method(HttpRequestMethod::Head));
    }

    #[test]
    fn test_forwards_and_target() {
        let mapping = ActionMapping::new("/login")
            .unwrap()
            .with_form("LoginForm", FormScope::Request)
            .add_forward(ActionForward::new("success", "home", false));

        assert!(!mapping.has_target());
        let mapping = mapping.with_validate(true);
        assert!(mapping.has_target());
        assert_eq!(mapping.find_forward("success").unwrap().path(), "home");
        assert!(mapping.find_forward("error").is_none());
    }

    #[test]
    fn test_forward_constructors() {
        let f = ActionForward::redirect_to("/home").with_label("Home");
        assert!(f.is_redirect());
        assert_eq!(f.name(), "/home");
        assert_eq!(f.label(), Some("Home"));
        assert!(!ActionForward::to("home").is_redirect());
    }
}
