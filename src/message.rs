// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 不属于任何字段的全局消息使用的属性名
pub const GLOBAL_MESSAGE: &str = "";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    property: String,
    message: String,
}

/// 按添加顺序保存的 `字段 -> 消息` 列表。
///
/// 校验失败的信息（ActionErrors）和普通提示（ActionMessages）都用它表示，
/// 以 JSON 形式放在请求属性或会话中，以便在重定向之后取回。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionMessages {
    entries: Vec<Entry>,
}

pub type ActionErrors = ActionMessages;

impl ActionMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, property: &str, message: &str) {
        self.entries.push(Entry {
            property: property.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_global(&mut self, message: &str) {
        self.add(GLOBAL_MESSAGE, message);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 某个字段的全部消息
    pub fn get(&self, property: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.property == property)
            .map(|e| e.message.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.property.as_str(), e.message.as_str()))
    }

    pub fn merge(&mut self, other: ActionMessages) {
        self.entries.extend(other.entries);
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// 按字段分组的消息，供视图中 `field_errors.x` 这样的写法使用。全局消息不在其中。
    pub fn to_field_map(&self) -> Value {
        let mut fields = Map::new();
        for (property, message) in self.iter().filter(|(p, _)| *p != GLOBAL_MESSAGE) {
            let entry = fields
                .entry(property.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = entry {
                items.push(Value::from(message));
            }
        }
        Value::Object(fields)
    }

    /// 从请求属性或会话中的 JSON 值恢复；格式不对时视为没有消息
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let mut errors = ActionErrors::new();
        errors.add("username", "required");
        errors.add_global("login failed");
        errors.add("username", "too short");

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.get("username"), vec!["required", "too short"]);
        assert_eq!(errors.get(GLOBAL_MESSAGE), vec!["login failed"]);
        assert!(errors.get("password").is_empty());
    }

    #[test]
    fn test_value_keeps_order() {
        let mut errors = ActionErrors::new();
        errors.add("b", "2");
        errors.add("a", "1");

        let restored = ActionErrors::from_value(&errors.to_value());
        assert_eq!(restored, errors);
        let order: Vec<_> = restored.iter().map(|(p, _)| p).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_from_bad_value_is_empty() {
        assert!(ActionErrors::from_value(&Value::from(42)).is_empty());
    }

    #[test]
    fn test_merge() {
        let mut a = ActionMessages::new();
        a.add_global("one");
        let mut b = ActionMessages::new();
        b.add_global("two");
        a.merge(b);

        assert_eq!(a.get(GLOBAL_MESSAGE), vec!["one", "two"]);
    }

    #[test]
    fn test_field_map_groups_by_property() {
        let mut errors = ActionErrors::new();
        errors.add("name", "required");
        errors.add_global("failed");
        errors.add("name", "too short");
        errors.add("age", "numeric");

        assert_eq!(
            errors.to_field_map(),
            serde_json::json!({ "name": ["required", "too short"], "age": ["numeric"] })
        );
    }
}
