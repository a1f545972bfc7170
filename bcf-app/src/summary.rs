use std::fmt::{self, Write};

use bcf_core::document::{Project, TopicMarkup};
use bcf_io::{LoadNotice, LoadedProject};

/// 写出加载结果的文本摘要：项目、议题、评论与视点数量、加载提示。
pub fn render(out: &mut impl Write, loaded: &LoadedProject) -> fmt::Result {
    write_summary(out, &loaded.project, &loaded.version, &loaded.notices)
}

fn write_summary(
    out: &mut impl Write,
    project: &Project,
    version: &str,
    notices: &[LoadNotice],
) -> fmt::Result {
    let name = if project.name.value.is_empty() {
        "(未命名)"
    } else {
        project.name.value.as_str()
    };
    writeln!(out, "项目: {name} [{}]", project.guid.value)?;
    writeln!(out, "BCF 版本: {version}")?;
    writeln!(out, "议题: {}", project.markups.len())?;
    for markup in &project.markups {
        write_topic(out, markup)?;
    }
    if !notices.is_empty() {
        writeln!(out, "提示: {}", notices.len())?;
        for notice in notices {
            writeln!(out, "  {notice}")?;
        }
    }
    Ok(())
}

fn write_topic(out: &mut impl Write, markup: &TopicMarkup) -> fmt::Result {
    let topic = &markup.topic;
    let comments = markup
        .comments
        .iter()
        .filter(|comment| !comment.meta.is_deleted())
        .count();
    let viewpoints = markup
        .viewpoints
        .iter()
        .filter(|reference| !reference.meta.is_deleted())
        .count();
    let status = if topic.topic_status.value.is_empty() {
        "-"
    } else {
        topic.topic_status.value.as_str()
    };
    writeln!(
        out,
        "  {} {} [{status}] 评论 {comments} 视点 {viewpoints}",
        topic.guid.value, topic.title.value
    )
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use bcf_io::NoticeKind;
    use bcf_io::builders::build_markup;
    use bcf_io::validator::parse_record;

    use super::*;

    fn project_with_topic() -> Project {
        let mut project = Project::placeholder();
        let record = parse_record(
            r#"<Markup>
                <Topic Guid="00000000-0000-4000-8000-00000000000a" TopicStatus="Open"><Title>Clash</Title><CreationDate>2024-01-01T00:00:00Z</CreationDate><CreationAuthor>a</CreationAuthor></Topic>
                <Comment Guid="00000000-0000-4000-8000-0000000000c1"><Date>2024-01-01T00:00:00Z</Date><Author>a</Author><Comment>one</Comment></Comment>
                <Viewpoints Guid="00000000-0000-4000-8000-0000000000f1"/>
            </Markup>"#,
        )
        .expect("parse markup");
        let parent = project.meta.id;
        let markup = build_markup(project.node_ids_mut(), parent, &record, &mut Vec::new())
            .expect("markup");
        project.push_markup(markup);
        project
    }

    fn summary_text(project: &Project, notices: &[LoadNotice]) -> String {
        let mut text = String::new();
        write_summary(&mut text, project, "2.1", notices).expect("write summary");
        text
    }

    /// 只接受有限字节数的输出端，用于验证写入错误会被向上传递。
    struct Truncated {
        remaining: usize,
    }

    impl Write for Truncated {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.remaining = self.remaining.checked_sub(s.len()).ok_or(fmt::Error)?;
            Ok(())
        }
    }

    #[test]
    fn summary_lists_topics_and_counts() {
        let text = summary_text(&project_with_topic(), &[]);
        assert!(text.starts_with("项目: (未命名) [00000000-0000-0000-0000-000000000000]\n"));
        assert!(text.contains("BCF 版本: 2.1\n"));
        assert!(text.contains("议题: 1\n"));
        assert!(text.contains(
            "  00000000-0000-4000-8000-00000000000a Clash [Open] 评论 1 视点 1\n"
        ));
        assert!(!text.contains("提示"));
    }

    #[test]
    fn summary_includes_notices() {
        let notice = LoadNotice::new(
            NoticeKind::DefaultProject,
            PathBuf::from("project.bcfp"),
            None,
            "missing",
        );
        let text = summary_text(&Project::placeholder(), &[notice]);
        assert!(text.contains("议题: 0\n"));
        assert!(text.contains("提示: 1\n  [DefaultProject] project.bcfp: missing\n"));
    }

    #[test]
    fn write_failures_are_reported() {
        let project = project_with_topic();
        let mut sink = Truncated { remaining: 16 };
        assert!(write_summary(&mut sink, &project, "2.1", &[]).is_err());

        let full = summary_text(&project, &[]);
        let mut sink = Truncated {
            remaining: full.len(),
        };
        assert!(write_summary(&mut sink, &project, "2.1", &[]).is_ok());
    }
}
