// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 注册表
//!
//! 配置文件中的 Action 类与 Form 类只是名字，注册表把名字映射到构造函数。
//! 加载配置时即检查每个名字都已登记，请求处理时不会再遇到未知的类名。

use std::collections::HashMap;

use crate::{
    action::Action,
    exception::Exception,
    form::ActionForm,
    mapping::ActionMapping,
};

pub type ActionFactory = Box<dyn Fn(&ActionMapping) -> Box<dyn Action> + Send + Sync>;
pub type FormFactory = Box<dyn Fn() -> Box<dyn ActionForm> + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    actions: HashMap<String, ActionFactory>,
    forms: HashMap<String, FormFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_action<F>(&mut self, class: &str, factory: F) -> &mut Self
    where
        F: Fn(&ActionMapping) -> Box<dyn Action> + Send + Sync + 'static,
    {
        self.actions.insert(class.to_string(), Box::new(factory));
        self
    }

    pub fn register_form<F>(&mut self, class: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ActionForm> + Send + Sync + 'static,
    {
        self.forms.insert(class.to_string(), Box::new(factory));
        self
    }

    /// 以 `Default` 构造的表单
    pub fn register_default_form<T>(&mut self, class: &str) -> &mut Self
    where
        T: ActionForm + Default + 'static,
    {
        self.register_form(class, || Box::new(T::default()))
    }

    pub fn has_action(&self, class: &str) -> bool {
        self.actions.contains_key(class)
    }

    pub fn has_form(&self, class: &str) -> bool {
        self.forms.contains_key(class)
    }

    pub fn create_action(&self, class: &str, mapping: &ActionMapping) -> Result<Box<dyn Action>, Exception> {
        match self.actions.get(class) {
            Some(factory) => Ok(factory(mapping)),
            None => Err(Exception::UnknownActionClass(class.to_string())),
        }
    }

    pub fn create_form(&self, class: &str) -> Result<Box<dyn ActionForm>, Exception> {
        match self.forms.get(class) {
            Some(factory) => Ok(factory()),
            None => Err(Exception::UnknownFormClass(class.to_string())),
        }
    }

    /// 检查 mapping 引用的类都已登记
    pub fn check_mapping(&self, mapping: &ActionMapping) -> Result<(), Exception> {
        if let Some(class) = mapping.action_class() {
            if !self.has_action(class) {
                return Err(Exception::UnknownActionClass(format!("{} (mapping {})", class, mapping.path())));
            }
        }
        if let Some(class) = mapping.form_class() {
            if !self.has_form(class) {
                return Err(Exception::UnknownFormClass(format!("{} (mapping {})", class, mapping.path())));
            }
        }
        Ok(())
    }
}
