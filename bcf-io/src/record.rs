//! 校验器输出的中间记录树：已经过 schema 检查，但仍是无类型的映射/列表/标量。
//!
//! 属性以 `@` 前缀命名，与子元素同处一个映射；元素同时带有属性和文本时，
//! 文本存放在 `$` 键下。

use std::slice;

pub const ATTRIBUTE_PREFIX: char = '@';
pub const TEXT_KEY: &str = "$";

static EMPTY_RECORD: Record = Record { fields: Vec::new() };

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    Record(Record),
    List(Vec<Value>),
}

impl Value {
    /// 标量文本；带属性的元素取 `$` 文本，列表取第一个元素。
    pub fn text(&self) -> Option<&str> {
        match self {
            Value::Scalar(text) => Some(text),
            Value::Record(record) => record.get(TEXT_KEY).and_then(Value::text),
            Value::List(items) => items.first().and_then(Value::text),
        }
    }

    /// 作为记录读取。空元素（`Scalar("")`）视为空记录。
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            Value::Scalar(text) if text.is_empty() => Some(&EMPTY_RECORD),
            Value::Scalar(_) => None,
            Value::List(items) => items.first().and_then(Value::as_record),
        }
    }

    /// 以列表形式访问：单次出现的元素视为一个元素的列表。
    pub fn items(&self) -> &[Value] {
        match self {
            Value::List(items) => items,
            other => slice::from_ref(other),
        }
    }
}

/// 有序字段映射，保留文档中的出现顺序。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入字段；同名字段重复出现时合并为列表。
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, Value::List(items))) => items.push(value),
            Some((_, existing)) => {
                let first = std::mem::replace(existing, Value::List(Vec::new()));
                *existing = Value::List(vec![first, value]);
            }
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_fields_collapse_into_list() {
        let mut record = Record::new();
        record.insert("Labels", Value::Scalar("a".into()));
        record.insert("@Guid", Value::Scalar("x".into()));
        record.insert("Labels", Value::Scalar("b".into()));
        record.insert("Labels", Value::Scalar("c".into()));

        assert_eq!(record.len(), 2);
        let labels: Vec<_> = record
            .get("Labels")
            .expect("labels")
            .items()
            .iter()
            .filter_map(Value::text)
            .collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
        let keys: Vec<_> = record.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["Labels", "@Guid"]);
    }

    #[test]
    fn single_value_is_one_item_list() {
        let value = Value::Scalar("only".into());
        assert_eq!(value.items().len(), 1);
    }

    #[test]
    fn empty_scalar_reads_as_empty_record() {
        let value = Value::Scalar(String::new());
        assert!(value.as_record().expect("empty record").is_empty());
        assert!(Value::Scalar("text".into()).as_record().is_none());
    }

    #[test]
    fn record_text_comes_from_text_key() {
        let mut record = Record::new();
        record.insert("@Color", Value::Scalar("FF0000".into()));
        record.insert(TEXT_KEY, Value::Scalar("body".into()));
        assert_eq!(Value::Record(record).text(), Some("body"));
    }
}
