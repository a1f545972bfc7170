//! 从校验后的记录树读取有类型的字段值。

use bcf_core::document::{Timestamp, Uri};
use bcf_core::geometry::{Direction, Point3};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use crate::record::{Record, Value};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("<{element}> is missing required field '{field}'")]
    MissingField {
        element: &'static str,
        field: String,
    },
    #[error("<{element}> field '{field}' has invalid value '{value}': {reason}")]
    InvalidValue {
        element: &'static str,
        field: String,
        value: String,
        reason: String,
    },
    #[error("<{element}> contains both an orthogonal and a perspective camera")]
    ConflictingCameras { element: &'static str },
}

impl DecodeError {
    /// 出错的元素名。
    pub fn element(&self) -> &'static str {
        match self {
            DecodeError::MissingField { element, .. }
            | DecodeError::InvalidValue { element, .. }
            | DecodeError::ConflictingCameras { element } => *element,
        }
    }
}

/// 某个元素记录的字段访问器，错误信息里带上元素名。
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    record: &'a Record,
    element: &'static str,
}

impl<'a> Fields<'a> {
    #[inline]
    pub fn new(record: &'a Record, element: &'static str) -> Self {
        Self { record, element }
    }

    #[inline]
    pub fn record(&self) -> &'a Record {
        self.record
    }

    #[inline]
    pub fn element(&self) -> &'static str {
        self.element
    }

    pub fn text(&self, field: &str) -> Option<&'a str> {
        self.record.get(field).and_then(Value::text)
    }

    pub fn required_text(&self, field: &str) -> Result<&'a str, DecodeError> {
        self.text(field).ok_or_else(|| self.missing(field))
    }

    pub fn text_or(&self, field: &str, default: &str) -> String {
        self.text(field).unwrap_or(default).to_string()
    }

    pub fn required_uuid(&self, field: &str) -> Result<Uuid, DecodeError> {
        let raw = self.required_text(field)?;
        self.parse_uuid(field, raw)
    }

    /// 缺失或为空时返回 `None`。
    pub fn optional_uuid(&self, field: &str) -> Result<Option<Uuid>, DecodeError> {
        match self.text(field) {
            Some(raw) if !raw.trim().is_empty() => self.parse_uuid(field, raw).map(Some),
            _ => Ok(None),
        }
    }

    pub fn required_timestamp(&self, field: &str) -> Result<Timestamp, DecodeError> {
        let raw = self.required_text(field)?;
        parse_timestamp(raw).map_err(|reason| self.invalid(field, raw, reason))
    }

    pub fn optional_timestamp(&self, field: &str) -> Result<Option<Timestamp>, DecodeError> {
        match self.text(field) {
            Some(raw) if !raw.trim().is_empty() => parse_timestamp(raw)
                .map(Some)
                .map_err(|reason| self.invalid(field, raw, reason)),
            _ => Ok(None),
        }
    }

    pub fn bool_or(&self, field: &str, default: bool) -> Result<bool, DecodeError> {
        match self.text(field).map(str::trim) {
            None | Some("") => Ok(default),
            Some("true") | Some("1") => Ok(true),
            Some("false") | Some("0") => Ok(false),
            Some(other) => Err(self.invalid(field, other, "expected a boolean".to_string())),
        }
    }

    pub fn i32_or(&self, field: &str, default: i32) -> Result<i32, DecodeError> {
        match self.text(field).map(str::trim) {
            None | Some("") => Ok(default),
            Some(raw) => raw
                .parse::<i32>()
                .map_err(|err| self.invalid(field, raw, err.to_string())),
        }
    }

    pub fn required_f64(&self, field: &str) -> Result<f64, DecodeError> {
        let raw = self.required_text(field)?.trim();
        raw.parse::<f64>()
            .map_err(|err| self.invalid(field, raw, err.to_string()))
    }

    /// 空文本视为缺失。
    pub fn optional_uri(&self, field: &str) -> Option<Uri> {
        self.text(field)
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(Uri::new)
    }

    pub fn required_uri(&self, field: &str) -> Result<Uri, DecodeError> {
        self.optional_uri(field).ok_or_else(|| self.missing(field))
    }

    pub fn child(&self, field: &str) -> Option<&'a Record> {
        self.record.get(field).and_then(Value::as_record)
    }

    pub fn required_child(&self, field: &str) -> Result<&'a Record, DecodeError> {
        self.child(field).ok_or_else(|| self.missing(field))
    }

    /// 重复出现的子元素，按文档顺序；文本形式的条目被跳过。
    pub fn children(&self, field: &str) -> Vec<&'a Record> {
        match self.record.get(field) {
            Some(value) => value.items().iter().filter_map(Value::as_record).collect(),
            None => Vec::new(),
        }
    }

    pub fn texts(&self, field: &str) -> Vec<&'a str> {
        match self.record.get(field) {
            Some(value) => value.items().iter().filter_map(Value::text).collect(),
            None => Vec::new(),
        }
    }

    pub fn required_point(&self, field: &str) -> Result<Point3, DecodeError> {
        let [x, y, z] = self.triple(field)?;
        Ok(Point3::new(x, y, z))
    }

    pub fn required_direction(&self, field: &str) -> Result<Direction, DecodeError> {
        let [x, y, z] = self.triple(field)?;
        Ok(Direction::new(x, y, z))
    }

    fn triple(&self, field: &str) -> Result<[f64; 3], DecodeError> {
        let coords = Fields::new(self.required_child(field)?, self.element);
        Ok([
            coords.required_f64("X")?,
            coords.required_f64("Y")?,
            coords.required_f64("Z")?,
        ])
    }

    fn parse_uuid(&self, field: &str, raw: &str) -> Result<Uuid, DecodeError> {
        Uuid::parse_str(raw.trim()).map_err(|err| self.invalid(field, raw, err.to_string()))
    }

    fn missing(&self, field: &str) -> DecodeError {
        DecodeError::MissingField {
            element: self.element,
            field: field.to_string(),
        }
    }

    fn invalid(&self, field: &str, value: &str, reason: String) -> DecodeError {
        DecodeError::InvalidValue {
            element: self.element,
            field: field.to_string(),
            value: value.to_string(),
            reason,
        }
    }
}

/// 解析 `xs:dateTime`：带时区的按原偏移保存，不带时区的按 UTC 处理，
/// 只有日期的取当天零点。
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc().fixed_offset());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::default()).and_utc().fixed_offset());
    }
    Err("expected an xs:dateTime value".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::parse_record;
    use chrono::{Datelike, Timelike};

    fn topic_record() -> Record {
        parse_record(
            r#"<Markup><Topic Guid=" 6a1b2c3d-0000-4000-8000-000000000001 ">
                <Title>Clash</Title>
                <Index>4</Index>
                <Labels>A</Labels><Labels>B</Labels>
                <CreationDate>2024-03-01T08:00:00+02:00</CreationDate>
                <DueDate></DueDate>
                <Start><X>1</X><Y>2.5</Y><Z>-3</Z></Start>
            </Topic></Markup>"#,
        )
        .expect("parse")
    }

    #[test]
    fn typed_accessors_read_values() {
        let root = topic_record();
        let outer = Fields::new(&root, "Markup");
        let topic = Fields::new(outer.required_child("Topic").expect("topic"), "Topic");

        assert_eq!(
            topic.required_uuid("@Guid").expect("guid"),
            Uuid::from_u128(0x6a1b2c3d_0000_4000_8000_000000000001)
        );
        assert_eq!(topic.required_text("Title").expect("title"), "Clash");
        assert_eq!(topic.i32_or("Index", -1).expect("index"), 4);
        assert_eq!(topic.i32_or("Missing", -1).expect("default"), -1);
        assert_eq!(topic.texts("Labels"), vec!["A", "B"]);
        assert_eq!(topic.optional_timestamp("DueDate").expect("empty"), None);
        assert_eq!(topic.text_or("Stage", ""), "");

        let created = topic.required_timestamp("CreationDate").expect("date");
        assert_eq!(created.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(created.hour(), 8);

        let start = topic.required_point("Start").expect("point");
        assert_eq!((start.x(), start.y(), start.z()), (1.0, 2.5, -3.0));
    }

    #[test]
    fn missing_and_invalid_values_are_reported() {
        let root = topic_record();
        let topic = Fields::new(
            Fields::new(&root, "Markup").required_child("Topic").expect("topic"),
            "Topic",
        );
        assert_eq!(
            topic.required_text("CreationAuthor"),
            Err(DecodeError::MissingField {
                element: "Topic",
                field: "CreationAuthor".to_string()
            })
        );
        assert!(matches!(
            topic.required_f64("Title"),
            Err(DecodeError::InvalidValue { .. })
        ));
        assert!(matches!(
            topic.bool_or("Title", true),
            Err(DecodeError::InvalidValue { .. })
        ));
    }

    #[test]
    fn booleans_accept_xsd_lexical_forms() {
        let root = parse_record(r#"<V A="true" B="0" C="1" D=""/>"#).expect("parse");
        let fields = Fields::new(&root, "V");
        assert!(fields.bool_or("@A", false).expect("a"));
        assert!(!fields.bool_or("@B", true).expect("b"));
        assert!(fields.bool_or("@C", false).expect("c"));
        assert!(fields.bool_or("@D", true).expect("d"));
        assert!(fields.bool_or("@E", true).expect("e"));
    }

    #[test]
    fn timestamps_without_offset_are_utc() {
        let ts = parse_timestamp("2024-05-06T07:08:09.250").expect("naive");
        assert_eq!(ts.offset().local_minus_utc(), 0);
        assert_eq!(ts.second(), 9);

        let day = parse_timestamp("2024-05-06").expect("date only");
        assert_eq!((day.year(), day.month(), day.day(), day.hour()), (2024, 5, 6, 0));

        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn empty_uri_is_absent() {
        let root = parse_record(r#"<R><A></A><B> snap.png </B></R>"#).expect("parse");
        let fields = Fields::new(&root, "R");
        assert_eq!(fields.optional_uri("A"), None);
        assert_eq!(fields.optional_uri("B"), Some(Uri::new("snap.png")));
        assert!(fields.required_uri("A").is_err());
    }
}
