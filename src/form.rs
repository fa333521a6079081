// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # ActionForm 表单模块
//!
//! 表单对象负责从请求参数中取值并校验。处理管线在执行 Action 之前创建表单，
//! 把它的 JSON 形式放进请求属性（供视图通过 `{{ form.x }}` 读取），
//! 会话范围的表单还会写回会话，下次请求时先恢复再用新参数覆盖。
//!
//! 大多数表单只是一组字符串字段，实现 [`FormBean`] 即可自动获得 [`ActionForm`]。

use log::warn;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{message::ActionErrors, request::Request};

pub trait ActionForm {
    /// 用请求参数填充字段
    fn populate(&mut self, request: &Request);

    /// 校验字段，把错误写进 `errors`。没有写入任何错误即视为通过。
    fn validate(&self, _errors: &mut ActionErrors) {}

    /// 表单的 JSON 形式，用于请求属性和会话
    fn to_value(&self) -> Value;

    /// 从会话中保存的 JSON 形式恢复
    fn load_value(&mut self, value: &Value);
}

/// 基于 serde 的表单：字段名与请求参数名一一对应。
///
/// 请求参数只会覆盖结构体中已有的字段，且以字符串形式写入，
/// 因此字段类型应为 `String`（或能从 JSON 字符串反序列化的类型）。
pub trait FormBean: Serialize + DeserializeOwned {
    fn check(&self, _errors: &mut ActionErrors) {}
}

impl<T: FormBean> ActionForm for T {
    fn populate(&mut self, request: &Request) {
        let mut fields = match serde_json::to_value(&*self) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!("表单无法序列化为对象，跳过参数填充");
                return;
            }
        };
        let mut touched = false;
        for (name, value) in request.parameters() {
            if fields.contains_key(name) {
                fields.insert(name.clone(), Value::String(value.clone()));
                touched = true;
            }
        }
        if !touched {
            return;
        }
        match serde_json::from_value::<T>(Value::Object(fields)) {
            Ok(form) => *self = form,
            Err(e) => warn!("请求参数无法填充表单：{}", e),
        }
    }

    fn validate(&self, errors: &mut ActionErrors) {
        self.check(errors);
    }

    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn load_value(&mut self, value: &Value) {
        match serde_json::from_value::<T>(value.clone()) {
            Ok(form) => *self = form,
            Err(e) => warn!("会话中的表单数据无法恢复：{}", e),
        }
    }
}
