use std::fmt;
use std::path::PathBuf;

use crate::decode::DecodeError;
use crate::validator::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// schema 不符合，只是提示。
    Validation,
    SkippedTopic,
    SkippedViewpoint,
    SkippedComment,
    /// 议题内的其他可选条目：文件头中的文件、文档引用、相关议题、BIM 片段。
    SkippedEntry,
    /// 项目描述文件缺失或无法使用，改用占位项目。
    DefaultProject,
}

/// 加载过程中的非致命提示，随加载结果一起返回。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadNotice {
    pub kind: NoticeKind,
    /// 相对归档根目录的文件路径。
    pub file: PathBuf,
    pub topic: Option<String>,
    pub message: String,
}

impl LoadNotice {
    pub fn new(
        kind: NoticeKind,
        file: impl Into<PathBuf>,
        topic: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            file: file.into(),
            topic: topic.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn validation(file: impl Into<PathBuf>, topic: Option<&str>, diagnostic: &Diagnostic) -> Self {
        Self::new(NoticeKind::Validation, file, topic, diagnostic.to_string())
    }

    /// 标记内被跳过的条目，按出错元素区分评论、视点引用与其他条目。
    pub fn skipped_entry(file: impl Into<PathBuf>, topic: Option<&str>, error: &DecodeError) -> Self {
        let kind = match error.element() {
            "Comment" | "Viewpoint" => NoticeKind::SkippedComment,
            "Viewpoints" => NoticeKind::SkippedViewpoint,
            _ => NoticeKind::SkippedEntry,
        };
        Self::new(kind, file, topic, error.to_string())
    }
}

impl fmt::Display for LoadNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.file.display())?;
        if let Some(topic) = &self.topic {
            write!(f, " (topic {topic})")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_entries_are_classified_by_element() {
        let comment = DecodeError::MissingField {
            element: "Comment",
            field: "Date".to_string(),
        };
        let reference = DecodeError::MissingField {
            element: "Viewpoints",
            field: "@Guid".to_string(),
        };
        assert_eq!(
            LoadNotice::skipped_entry("t/markup.bcf", Some("t"), &comment).kind,
            NoticeKind::SkippedComment
        );
        assert_eq!(
            LoadNotice::skipped_entry("t/markup.bcf", Some("t"), &reference).kind,
            NoticeKind::SkippedViewpoint
        );
        let file = DecodeError::InvalidValue {
            element: "File",
            field: "Date".to_string(),
            value: "garbage".to_string(),
            reason: "expected an xs:dateTime value".to_string(),
        };
        assert_eq!(
            LoadNotice::skipped_entry("t/markup.bcf", Some("t"), &file).kind,
            NoticeKind::SkippedEntry
        );
    }

    #[test]
    fn display_names_file_and_topic() {
        let notice = LoadNotice::new(NoticeKind::SkippedTopic, "t/markup.bcf", Some("t"), "broken");
        assert_eq!(notice.to_string(), "[SkippedTopic] t/markup.bcf (topic t): broken");
    }
}
