//! 引用解析：按 GUID 在已构建的集合里查找目标节点编号。
//!
//! 找不到目标时引用进入 `Dangling`，GUID 原样保留，之后可以再次解析。

use std::collections::HashMap;

use bcf_core::document::{Project, Resolution, TopicMarkup};
use bcf_core::node::NodeId;
use uuid::Uuid;

/// 解析标记内每条评论到视点引用的链接，返回悬空的视点 GUID。
pub fn resolve_comment_viewpoints(markup: &mut TopicMarkup) -> Vec<Uuid> {
    let targets: HashMap<Uuid, NodeId> = markup
        .viewpoints
        .iter()
        .filter(|reference| !reference.meta.is_deleted())
        .map(|reference| (reference.guid.value, reference.meta.id))
        .collect();

    let mut dangling = Vec::new();
    for comment in &mut markup.comments {
        let Some(link) = comment.viewpoint.as_mut() else {
            continue;
        };
        link.resolution = match targets.get(&link.guid.value) {
            Some(id) => Resolution::Resolved(*id),
            None => {
                dangling.push(link.guid.value);
                Resolution::Dangling
            }
        };
    }
    dangling
}

/// 项目组装完成后解析议题之间的相关引用，返回 (源议题, 悬空目标) 列表。
pub fn resolve_related_topics(project: &mut Project) -> Vec<(Uuid, Uuid)> {
    let targets: HashMap<Uuid, NodeId> = project
        .markups
        .iter()
        .filter(|markup| !markup.meta.is_deleted() && !markup.topic.meta.is_deleted())
        .map(|markup| (markup.topic.guid.value, markup.topic.meta.id))
        .collect();

    let mut dangling = Vec::new();
    for markup in &mut project.markups {
        let source = markup.topic.guid.value;
        for related in &mut markup.topic.related_topics {
            related.resolution = match targets.get(&related.guid.value) {
                Some(id) => Resolution::Resolved(*id),
                None => {
                    dangling.push((source, related.guid.value));
                    Resolution::Dangling
                }
            };
        }
    }
    dangling
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{build_markup, build_project};
    use crate::validator::parse_record;

    fn topic(guid: &str, related: &[&str]) -> String {
        let related: String = related
            .iter()
            .map(|guid| format!(r#"<RelatedTopic Guid="{guid}"/>"#))
            .collect();
        format!(
            r#"<Markup><Topic Guid="{guid}"><Title>t</Title><CreationDate>2024-01-01T00:00:00Z</CreationDate><CreationAuthor>a</CreationAuthor>{related}</Topic></Markup>"#
        )
    }

    fn project_with(markups: &[String]) -> Project {
        let record = parse_record(
            r#"<ProjectExtension><Project ProjectId="00000000-0000-4000-8000-000000000009"/></ProjectExtension>"#,
        )
        .expect("parse project");
        let mut project = build_project(&record).expect("project");
        let parent = project.meta.id;
        for xml in markups {
            let record = parse_record(xml).expect("parse markup");
            let markup = build_markup(project.node_ids_mut(), parent, &record, &mut Vec::new())
                .expect("markup");
            project.push_markup(markup);
        }
        project
    }

    const A: &str = "00000000-0000-4000-8000-00000000000a";
    const B: &str = "00000000-0000-4000-8000-00000000000b";
    const MISSING: &str = "00000000-0000-4000-8000-0000000000ff";

    #[test]
    fn forward_related_topic_is_resolved_after_assembly() {
        let mut project = project_with(&[topic(A, &[B, MISSING]), topic(B, &[])]);
        assert_eq!(
            project.markups[0].topic.related_topics[0].resolution,
            Resolution::Pending
        );

        let dangling = resolve_related_topics(&mut project);
        let source = Uuid::parse_str(A).expect("uuid");
        assert_eq!(dangling, vec![(source, Uuid::parse_str(MISSING).expect("uuid"))]);

        let related = &project.markups[0].topic.related_topics;
        let target = project.related_topic(&related[0]).expect("resolved");
        assert_eq!(target.guid.value, Uuid::parse_str(B).expect("uuid"));
        assert!(project.related_topic(&related[1]).is_none());
        assert_eq!(related[1].guid.value, Uuid::parse_str(MISSING).expect("uuid"));
    }

    #[test]
    fn deleted_viewpoint_leaves_comment_unresolved() {
        let xml = r#"<Markup>
            <Topic Guid="00000000-0000-4000-8000-00000000000a"><Title>t</Title><CreationDate>2024-01-01T00:00:00Z</CreationDate><CreationAuthor>a</CreationAuthor></Topic>
            <Comment Guid="00000000-0000-4000-8000-0000000000c1"><Date>2024-01-01T00:00:00Z</Date><Author>a</Author><Comment>x</Comment>
              <Viewpoint Guid="00000000-0000-4000-8000-0000000000f1"/></Comment>
            <Viewpoints Guid="00000000-0000-4000-8000-0000000000f1"><Viewpoint>v.bcfv</Viewpoint></Viewpoints>
        </Markup>"#;
        let mut project = project_with(&[xml.to_string()]);
        let markup = &mut project.markups[0];
        assert!(markup.comment_viewpoint(&markup.comments[0]).is_some());

        markup.viewpoints[0].meta.mark_deleted();
        let dangling = resolve_comment_viewpoints(markup);
        assert_eq!(dangling.len(), 1);
        assert!(markup.comment_viewpoint(&markup.comments[0]).is_none());
        assert_eq!(
            markup.comments[0].viewpoint.as_ref().map(|link| link.resolution),
            Some(Resolution::Dangling)
        );
    }
}
