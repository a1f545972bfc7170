pub mod command;

pub mod errors {
    use thiserror::Error;
    use uuid::Uuid;

    #[derive(Debug, Error, PartialEq, Eq)]
    pub enum EngineError {
        #[error("topic {0} not found")]
        TopicNotFound(Uuid),
        #[error("comment {0} not found")]
        CommentNotFound(Uuid),
        #[error("viewpoint reference {0} not found")]
        ViewpointNotFound(Uuid),
        #[error("node {0} has been deleted")]
        Deleted(Uuid),
    }
}

pub mod session {
    use bcf_core::changes::{Change, has_pending_changes, pending_changes};
    use bcf_core::document::{
        Comment, Project, Resolution, Timestamp, TopicMarkup, ViewpointLink, tags,
    };
    use bcf_core::node::{MutationState, NodeId, NodeIds};
    use bcf_io::resolve::{resolve_comment_viewpoints, resolve_related_topics};
    use bcf_io::{ExtractedArchive, LoadedProject};
    use chrono::Utc;
    use tracing::debug;
    use uuid::Uuid;

    use crate::errors::EngineError;

    /// 编辑会话：独占一个已加载的项目，所有修改都经由这里维护节点状态。
    #[derive(Debug)]
    pub struct Session {
        project: Project,
        archive: Option<ExtractedArchive>,
    }

    impl Session {
        pub fn new(project: Project) -> Self {
            Self {
                project,
                archive: None,
            }
        }

        /// 接管加载结果，解压目录随会话一起保留。
        pub fn from_loaded(loaded: LoadedProject) -> Self {
            Self {
                project: loaded.project,
                archive: Some(loaded.archive),
            }
        }

        #[inline]
        pub fn project(&self) -> &Project {
            &self.project
        }

        #[inline]
        pub fn archive(&self) -> Option<&ExtractedArchive> {
            self.archive.as_ref()
        }

        pub fn into_project(self) -> Project {
            self.project
        }

        /// 新增评论，返回新评论的 GUID。
        ///
        /// 指定的视点 GUID 立即在本议题内解析；找不到时链接保持悬空。
        pub fn add_comment(
            &mut self,
            topic: Uuid,
            author: &str,
            text: &str,
            viewpoint: Option<Uuid>,
        ) -> Result<Uuid, EngineError> {
            let (markup, ids) = self.editable_markup(topic)?;
            let guid = Uuid::new_v4();
            let comment = new_comment(ids, markup.meta.id, guid, author, text, viewpoint, now());
            markup.comments.push(comment);
            resolve_comment_viewpoints(markup);
            debug!(%topic, comment = %guid, "新增评论");
            Ok(guid)
        }

        /// 修改评论正文，同时更新修改时间与修改人。
        pub fn edit_comment(
            &mut self,
            topic: Uuid,
            comment: Uuid,
            author: &str,
            text: &str,
        ) -> Result<(), EngineError> {
            let (markup, _) = self.editable_markup(topic)?;
            let target = markup
                .comment_mut(comment)
                .ok_or(EngineError::CommentNotFound(comment))?;
            if target.meta.is_deleted() {
                return Err(EngineError::Deleted(comment));
            }
            target.text.set(text.to_string());
            target.modified_date.set(Some(now()));
            target.modified_author.set(author.to_string());
            debug!(%topic, %comment, "修改评论");
            Ok(())
        }

        /// 删除评论。本会话新增的评论直接移除，原有评论标记为 `Deleted`。
        pub fn delete_comment(&mut self, topic: Uuid, comment: Uuid) -> Result<(), EngineError> {
            let (markup, _) = self.editable_markup(topic)?;
            let position = markup
                .comments
                .iter()
                .position(|candidate| candidate.guid.value == comment)
                .ok_or(EngineError::CommentNotFound(comment))?;
            match markup.comments[position].meta.state {
                MutationState::Added => {
                    markup.comments.remove(position);
                }
                MutationState::Deleted => return Err(EngineError::Deleted(comment)),
                MutationState::Original | MutationState::Modified => {
                    markup.comments[position].meta.mark_deleted()
                }
            }
            debug!(%topic, %comment, "删除评论");
            Ok(())
        }

        pub fn set_topic_status(&mut self, topic: Uuid, status: &str) -> Result<(), EngineError> {
            let (markup, _) = self.editable_markup(topic)?;
            if markup.topic.topic_status.value != status {
                markup.topic.topic_status.set(status.to_string());
            }
            Ok(())
        }

        /// 添加标签；已存在同名标签时不重复添加，返回是否新增。
        pub fn add_label(&mut self, topic: Uuid, label: &str) -> Result<bool, EngineError> {
            let (markup, ids) = self.editable_markup(topic)?;
            if markup.topic.labels().any(|existing| existing == label) {
                return Ok(false);
            }
            let parent = markup.topic.meta.id;
            markup
                .topic
                .labels
                .push(ids.added_field(tags::LABELS, parent, label.to_string()));
            Ok(true)
        }

        /// 删除视点引用，并重新解析本议题的评论链接：指向它的评论变为未解析。
        pub fn delete_viewpoint_reference(
            &mut self,
            topic: Uuid,
            viewpoint: Uuid,
        ) -> Result<(), EngineError> {
            let (markup, _) = self.editable_markup(topic)?;
            let position = markup
                .viewpoints
                .iter()
                .position(|candidate| candidate.guid.value == viewpoint)
                .ok_or(EngineError::ViewpointNotFound(viewpoint))?;
            match markup.viewpoints[position].meta.state {
                MutationState::Added => {
                    markup.viewpoints.remove(position);
                }
                MutationState::Deleted => return Err(EngineError::Deleted(viewpoint)),
                MutationState::Original | MutationState::Modified => {
                    markup.viewpoints[position].meta.mark_deleted()
                }
            }
            let dangling = resolve_comment_viewpoints(markup);
            debug!(%topic, %viewpoint, dangling = dangling.len(), "删除视点引用");
            Ok(())
        }

        /// 重新解析整个项目的引用，返回悬空引用数量。
        pub fn resolve_references(&mut self) -> usize {
            let mut dangling = 0;
            for markup in &mut self.project.markups {
                dangling += resolve_comment_viewpoints(markup).len();
            }
            dangling + resolve_related_topics(&mut self.project).len()
        }

        pub fn pending_changes(&self) -> Vec<Change> {
            pending_changes(&self.project)
        }

        #[inline]
        pub fn has_pending_changes(&self) -> bool {
            has_pending_changes(&self.project)
        }

        fn editable_markup(
            &mut self,
            topic: Uuid,
        ) -> Result<(&mut TopicMarkup, &mut NodeIds), EngineError> {
            let (markup, ids) = self
                .project
                .markup_and_ids_mut(topic)
                .ok_or(EngineError::TopicNotFound(topic))?;
            if markup.meta.is_deleted() || markup.topic.meta.is_deleted() {
                return Err(EngineError::Deleted(topic));
            }
            Ok((markup, ids))
        }
    }

    fn now() -> Timestamp {
        Utc::now().fixed_offset()
    }

    fn new_comment(
        ids: &mut NodeIds,
        parent: NodeId,
        guid: Uuid,
        author: &str,
        text: &str,
        viewpoint: Option<Uuid>,
        date: Timestamp,
    ) -> Comment {
        let meta = ids.added(tags::COMMENT, parent);
        let id = meta.id;
        let viewpoint = viewpoint.map(|target| {
            let link_meta = ids.added(tags::VIEWPOINT, id);
            ViewpointLink {
                guid: ids.added_field(tags::GUID, link_meta.id, target),
                resolution: Resolution::Pending,
                meta: link_meta,
            }
        });
        Comment {
            guid: ids.added_field(tags::GUID, id, guid),
            date: ids.added_field(tags::DATE, id, date),
            author: ids.added_field(tags::AUTHOR, id, author.to_string()),
            text: ids.added_field(tags::COMMENT, id, text.to_string()),
            viewpoint,
            modified_date: ids.added_field(tags::MODIFIED_DATE, id, None),
            modified_author: ids.added_field(tags::MODIFIED_AUTHOR, id, String::new()),
            meta,
        }
    }

}
