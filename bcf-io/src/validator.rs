//! Schema 校验边界。
//!
//! 校验器把一个 XML 文件解析为 [`Record`] 并附带诊断信息；诊断只是提示，
//! 是否致命由调用方决定。只有文件不可读或 XML 本身不合法才返回错误。

use std::fmt;
use std::fs;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::trace;

use crate::IoError;
use crate::record::{ATTRIBUTE_PREFIX, Record, TEXT_KEY, Value};

/// 单条校验诊断，`path` 形如 `Topic/@Guid`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// 校验结果：记录树加诊断列表。
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub record: Record,
    pub diagnostics: Vec<Diagnostic>,
}

impl Validated {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

pub trait SchemaValidator {
    fn validate(&self, document: &Path, schema: &Path) -> Result<Validated, IoError>;
}

/// 支持的文档族，按 schema 文件名（不含扩展名）区分。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Version,
    Project,
    Markup,
    Visinfo,
    Unknown,
}

impl SchemaKind {
    pub fn from_schema_path(schema: &Path) -> Self {
        let stem = schema
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        match stem.to_ascii_lowercase().as_str() {
            "version" => SchemaKind::Version,
            "project" => SchemaKind::Project,
            "markup" => SchemaKind::Markup,
            "visinfo" => SchemaKind::Visinfo,
            _ => SchemaKind::Unknown,
        }
    }

    /// 必填字段路径。中间段缺失时该规则不适用（可选父节点）。
    fn required_paths(self) -> &'static [&'static str] {
        match self {
            SchemaKind::Version => &["@VersionId"],
            SchemaKind::Project => &["Project/@ProjectId"],
            SchemaKind::Markup => &[
                "Topic",
                "Topic/@Guid",
                "Topic/Title",
                "Topic/CreationDate",
                "Topic/CreationAuthor",
                "Topic/BimSnippet/@SnippetType",
                "Topic/BimSnippet/Reference",
                "Topic/BimSnippet/ReferenceSchema",
                "Topic/RelatedTopic/@Guid",
                "Comment/@Guid",
                "Comment/Date",
                "Comment/Author",
                "Comment/Comment",
                "Comment/Viewpoint/@Guid",
                "Viewpoints/@Guid",
            ],
            SchemaKind::Visinfo => &[
                "@Guid",
                "Components/Visibility",
                "OrthogonalCamera/CameraViewPoint",
                "OrthogonalCamera/CameraDirection",
                "OrthogonalCamera/CameraUpVector",
                "OrthogonalCamera/ViewToWorldScale",
                "PerspectiveCamera/CameraViewPoint",
                "PerspectiveCamera/CameraDirection",
                "PerspectiveCamera/CameraUpVector",
                "PerspectiveCamera/FieldOfView",
                "Lines/Line/StartPoint",
                "Lines/Line/EndPoint",
                "ClippingPlanes/ClippingPlane/Location",
                "ClippingPlanes/ClippingPlane/Direction",
                "Bitmap/Bitmap",
                "Bitmap/Reference",
                "Bitmap/Location",
                "Bitmap/Normal",
                "Bitmap/Up",
                "Bitmap/Height",
            ],
            SchemaKind::Unknown => &[],
        }
    }

    /// 互斥的元素组（schema 中的 choice）。
    fn exclusive_groups(self) -> &'static [&'static [&'static str]] {
        match self {
            SchemaKind::Visinfo => &[&["OrthogonalCamera", "PerspectiveCamera"]],
            _ => &[],
        }
    }
}

/// 基于 quick-xml 的内建校验器，使用内置的 BCF 2.x 必填规则表。
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlSchemaValidator;

impl XmlSchemaValidator {
    #[inline]
    pub fn new() -> Self {
        Self
    }

    pub fn validate_str(&self, xml: &str, kind: SchemaKind) -> Result<Validated, String> {
        let record = parse_record(xml)?;
        let diagnostics = check_rules(&record, kind);
        Ok(Validated {
            record,
            diagnostics,
        })
    }
}

impl SchemaValidator for XmlSchemaValidator {
    fn validate(&self, document: &Path, schema: &Path) -> Result<Validated, IoError> {
        let xml = fs::read_to_string(document).map_err(|source| IoError::ReadError {
            path: document.to_path_buf(),
            source,
        })?;
        let kind = SchemaKind::from_schema_path(schema);
        trace!(document = %document.display(), schema = %schema.display(), ?kind, "校验文档");
        self.validate_str(&xml, kind)
            .map_err(|message| IoError::InvalidDocument {
                path: document.to_path_buf(),
                message,
            })
    }
}

fn check_rules(record: &Record, kind: SchemaKind) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for path in kind.required_paths() {
        let segments: Vec<&str> = path.split('/').collect();
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => continue,
        };
        for owner in descend(record, parents) {
            if !owner.contains(last) {
                let what = if last.starts_with(ATTRIBUTE_PREFIX) {
                    "attribute"
                } else {
                    "element"
                };
                diagnostics.push(Diagnostic {
                    path: (*path).to_string(),
                    message: format!("missing required {what} '{}'", last.trim_start_matches(ATTRIBUTE_PREFIX)),
                });
            }
        }
    }
    for group in kind.exclusive_groups() {
        let present: Vec<&str> = group
            .iter()
            .copied()
            .filter(|name| record.contains(name))
            .collect();
        if present.len() > 1 {
            diagnostics.push(Diagnostic {
                path: present.join("|"),
                message: "mutually exclusive elements are both present".to_string(),
            });
        }
    }
    diagnostics
}

/// 沿路径展开所有匹配的子记录（列表逐项展开）。
fn descend<'a>(record: &'a Record, path: &[&str]) -> Vec<&'a Record> {
    let mut current = vec![record];
    for segment in path {
        current = current
            .into_iter()
            .filter_map(|owner| owner.get(segment))
            .flat_map(|value| value.items().iter().filter_map(Value::as_record))
            .collect();
    }
    current
}

struct Frame {
    record: Record,
    text: String,
    name: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = local_name(start.local_name().as_ref())?;
        let mut record = Record::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| format!("<{name}> 属性无法解析: {err}"))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|err| format!("<{name}> 属性名不是 UTF-8: {err}"))?;
            if is_infrastructure_attribute(key) {
                continue;
            }
            let key = key.rsplit(':').next().unwrap_or(key);
            let value = attr
                .unescape_value()
                .map_err(|err| format!("<{name}> 属性 {key} 的值无法解析: {err}"))?;
            record.insert(format!("{ATTRIBUTE_PREFIX}{key}"), Value::Scalar(value.into_owned()));
        }
        Ok(Self {
            record,
            text: String::new(),
            name,
        })
    }

    fn close(self) -> (String, Value) {
        let text = self.text.trim();
        let value = if self.record.is_empty() {
            Value::Scalar(text.to_string())
        } else {
            let mut record = self.record;
            if !text.is_empty() {
                record.insert(TEXT_KEY, Value::Scalar(text.to_string()));
            }
            Value::Record(record)
        };
        (self.name, value)
    }
}

fn is_infrastructure_attribute(key: &str) -> bool {
    key == "xmlns" || key.starts_with("xmlns:") || key.starts_with("xsi:") || key.starts_with("xml:")
}

fn local_name(raw: &[u8]) -> Result<String, String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|err| format!("元素名不是 UTF-8: {err}"))
}

/// 把 XML 文档解析为根元素的内容记录；命名空间前缀被去除。
pub fn parse_record(xml: &str) -> Result<Record, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Record> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| format!("XML 解析失败（位置 {}）: {err}", reader.buffer_position()))?;
        match event {
            Event::Start(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err("文档包含多个根元素".to_string());
                }
                stack.push(Frame::open(&start)?);
            }
            Event::Empty(start) => {
                if root.is_some() && stack.is_empty() {
                    return Err("文档包含多个根元素".to_string());
                }
                let frame = Frame::open(&start)?;
                finish_frame(frame, &mut stack, &mut root);
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    let decoded = text
                        .unescape()
                        .map_err(|err| format!("<{}> 文本无法解析: {err}", frame.name))?;
                    frame.text.push_str(&decoded);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| "遇到多余的结束标签".to_string())?;
                finish_frame(frame, &mut stack, &mut root);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("元素 <{}> 未闭合", open.name));
    }
    root.ok_or_else(|| "文档不包含根元素".to_string())
}

fn finish_frame(frame: Frame, stack: &mut [Frame], root: &mut Option<Record>) {
    let (name, value) = frame.close();
    match stack.last_mut() {
        Some(parent) => parent.record.insert(name, value),
        None => {
            *root = Some(match value {
                Value::Record(record) => record,
                _ => Record::new(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKUP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Markup xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <Topic Guid="6a1b2c3d-0000-4000-8000-000000000001" TopicStatus="Open">
    <Title>Wall &amp; door clash</Title>
    <Labels>Architecture</Labels>
    <Labels>Structure</Labels>
    <CreationDate>2024-03-01T08:00:00Z</CreationDate>
    <CreationAuthor>a@example.com</CreationAuthor>
    <Description><![CDATA[<raw> text]]></Description>
  </Topic>
  <Header/>
</Markup>"#;

    #[test]
    fn parses_attributes_elements_and_lists() {
        let record = parse_record(MARKUP).expect("parse markup");
        let topic = record.get("Topic").and_then(Value::as_record).expect("topic");
        assert_eq!(
            topic.get("@Guid").and_then(Value::text),
            Some("6a1b2c3d-0000-4000-8000-000000000001")
        );
        assert_eq!(topic.get("@TopicStatus").and_then(Value::text), Some("Open"));
        assert_eq!(topic.get("Title").and_then(Value::text), Some("Wall & door clash"));
        assert_eq!(topic.get("Labels").map(|v| v.items().len()), Some(2));
        assert_eq!(topic.get("Description").and_then(Value::text), Some("<raw> text"));
        assert!(
            record
                .get("Header")
                .and_then(Value::as_record)
                .expect("header")
                .is_empty()
        );
        assert!(!record.contains("@xsi:noNamespaceSchemaLocation"));
    }

    #[test]
    fn namespace_prefixes_are_stripped() {
        let xml = r#"<b:Version xmlns:b="urn:bcf" VersionId="2.1"><b:DetailedVersion>2.1</b:DetailedVersion></b:Version>"#;
        let record = parse_record(xml).expect("parse version");
        assert_eq!(record.get("@VersionId").and_then(Value::text), Some("2.1"));
        assert_eq!(record.get("DetailedVersion").and_then(Value::text), Some("2.1"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_record("<Markup><Topic></Markup>").is_err());
        assert!(parse_record("").is_err());
    }

    #[test]
    fn missing_required_fields_become_diagnostics() {
        let xml = r#"<Markup><Topic><Title>t</Title></Topic><Comment><Date>2024-01-01T00:00:00Z</Date></Comment></Markup>"#;
        let validated = XmlSchemaValidator::new()
            .validate_str(xml, SchemaKind::Markup)
            .expect("well formed");
        let paths: Vec<&str> = validated.diagnostics.iter().map(|d| d.path.as_str()).collect();
        assert!(paths.contains(&"Topic/@Guid"));
        assert!(paths.contains(&"Topic/CreationDate"));
        assert!(paths.contains(&"Comment/@Guid"));
        assert!(paths.contains(&"Comment/Comment"));
        assert!(!paths.contains(&"Topic/Title"));
        assert!(!paths.contains(&"Viewpoints/@Guid"));
        assert!(!validated.is_valid());
    }

    #[test]
    fn both_cameras_are_flagged() {
        let xml = r#"<VisualizationInfo Guid="x">
            <OrthogonalCamera><CameraViewPoint/><CameraDirection/><CameraUpVector/><ViewToWorldScale>1</ViewToWorldScale></OrthogonalCamera>
            <PerspectiveCamera><CameraViewPoint/><CameraDirection/><CameraUpVector/><FieldOfView>60</FieldOfView></PerspectiveCamera>
        </VisualizationInfo>"#;
        let validated = XmlSchemaValidator::new()
            .validate_str(xml, SchemaKind::Visinfo)
            .expect("well formed");
        assert_eq!(validated.diagnostics.len(), 1);
        assert_eq!(validated.diagnostics[0].path, "OrthogonalCamera|PerspectiveCamera");
    }

    #[test]
    fn schema_kind_follows_file_stem() {
        assert_eq!(
            SchemaKind::from_schema_path(Path::new("/x/markup.xsd")),
            SchemaKind::Markup
        );
        assert_eq!(
            SchemaKind::from_schema_path(Path::new("visinfo.xsd")),
            SchemaKind::Visinfo
        );
        assert_eq!(
            SchemaKind::from_schema_path(Path::new("other.xsd")),
            SchemaKind::Unknown
        );
    }
}
