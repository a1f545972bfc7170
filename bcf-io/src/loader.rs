//! 容器加载流程：解压 → 版本检查 → 项目 → 各议题 → 跨议题引用解析。
//!
//! 结构性错误（归档不可读、缺少 `bcf.version`、版本不受支持）中止整个加载；
//! 其余问题降级为 [`LoadNotice`]，尽量返回部分填充的项目。

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use bcf_config::LoaderConfig;
use bcf_core::document::{Project, TopicMarkup};
use bcf_core::node::NodeIds;
use tracing::{debug, info, warn};

use crate::archive::ExtractedArchive;
use crate::builders::{build_markup, build_project, build_viewpoint};
use crate::decode::Fields;
use crate::notice::{LoadNotice, NoticeKind};
use crate::resolve::resolve_related_topics;
use crate::validator::{SchemaValidator, Validated, XmlSchemaValidator};
use crate::{DocumentLoader, DocumentSaver, IoError};

pub const VERSION_FILE: &str = "bcf.version";
pub const PROJECT_FILE: &str = "project.bcfp";
pub const MARKUP_FILE: &str = "markup.bcf";

pub const VERSION_SCHEMA: &str = "version.xsd";
pub const PROJECT_SCHEMA: &str = "project.xsd";
pub const MARKUP_SCHEMA: &str = "markup.xsd";
pub const VISINFO_SCHEMA: &str = "visinfo.xsd";

/// 单次加载的状态机。`Aborted` 可从任意阶段进入。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Unopened,
    Extracted,
    VersionChecked,
    ProjectBuilt,
    TopicsBuilt(usize),
    Ready,
    Aborted,
}

/// 加载结果。项目与解压目录一起返回，目录随结果析构而删除。
#[derive(Debug)]
pub struct LoadedProject {
    pub project: Project,
    pub version: String,
    pub notices: Vec<LoadNotice>,
    pub archive: ExtractedArchive,
    pub stages: Vec<LoadStage>,
}

impl LoadedProject {
    pub fn notices_of(&self, kind: NoticeKind) -> impl Iterator<Item = &LoadNotice> + '_ {
        self.notices.iter().filter(move |notice| notice.kind == kind)
    }
}

#[derive(Debug)]
struct StageTracker {
    current: LoadStage,
    history: Vec<LoadStage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: LoadStage::Unopened,
            history: vec![LoadStage::Unopened],
        }
    }

    fn advance(&mut self, next: LoadStage) {
        debug!(from = ?self.current, to = ?next, "加载阶段切换");
        self.current = next;
        self.history.push(next);
    }

    fn abort(&mut self, error: &IoError) {
        warn!(stage = ?self.current, %error, "加载中止");
        self.advance(LoadStage::Aborted);
    }
}

/// BCF 归档的加载入口，配置与校验器都由调用方显式传入。
#[derive(Debug, Clone)]
pub struct BcfFacade<V = XmlSchemaValidator> {
    config: LoaderConfig,
    validator: V,
}

impl BcfFacade<XmlSchemaValidator> {
    pub fn new() -> Self {
        Self::with_config(LoaderConfig::default())
    }

    pub fn with_config(config: LoaderConfig) -> Self {
        Self {
            config,
            validator: XmlSchemaValidator::new(),
        }
    }
}

impl Default for BcfFacade<XmlSchemaValidator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: SchemaValidator> BcfFacade<V> {
    pub fn with_validator(config: LoaderConfig, validator: V) -> Self {
        Self { config, validator }
    }

    #[inline]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn run(&self, path: &Path, tracker: &mut StageTracker) -> Result<LoadedProject, IoError> {
        let archive = ExtractedArchive::extract(path, self.config.extraction_root.as_deref())?;
        tracker.advance(LoadStage::Extracted);

        let version = self.check_version(&archive)?;
        tracker.advance(LoadStage::VersionChecked);

        let mut notices = Vec::new();
        let mut project = self.load_project(&archive, &mut notices);
        tracker.advance(LoadStage::ProjectBuilt);

        let mut seen = HashSet::new();
        for topic in archive.topic_dirs().iter().map(String::as_str) {
            let Some(markup) = self.load_topic(&archive, topic, &mut project, &mut notices) else {
                continue;
            };
            if !seen.insert(markup.guid()) {
                let file = relative(topic, MARKUP_FILE);
                warn!(topic = %topic, guid = %markup.guid(), "议题 GUID 重复，跳过");
                notices.push(LoadNotice::new(
                    NoticeKind::SkippedTopic,
                    file,
                    Some(topic),
                    format!("duplicate topic guid {}", markup.guid()),
                ));
                continue;
            }
            project.push_markup(markup);
        }
        tracker.advance(LoadStage::TopicsBuilt(project.markups.len()));

        let dangling = resolve_related_topics(&mut project);
        for (source, target) in &dangling {
            debug!(%source, %target, "相关议题不存在");
        }
        tracker.advance(LoadStage::Ready);

        info!(
            archive = %path.display(),
            topics = project.markups.len(),
            notices = notices.len(),
            "BCF 加载完成"
        );
        Ok(LoadedProject {
            project,
            version,
            notices,
            archive,
            stages: tracker.history.clone(),
        })
    }

    fn validate(&self, document: &Path, schema: &str) -> Result<Validated, IoError> {
        self.validator
            .validate(document, &self.config.schema_path(schema))
    }

    fn check_version(&self, archive: &ExtractedArchive) -> Result<String, IoError> {
        let path = archive.file(VERSION_FILE).ok_or_else(|| IoError::MissingVersion {
            path: archive.source().to_path_buf(),
        })?;
        let validated = self.validate(&path, VERSION_SCHEMA)?;
        if !validated.is_valid() {
            let message = validated
                .diagnostics
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(IoError::InvalidDocument { path, message });
        }
        let version = Fields::new(&validated.record, "Version")
            .required_text("@VersionId")
            .map_err(|source| IoError::Decode {
                path: path.clone(),
                source,
            })?
            .trim()
            .to_string();
        if !self.config.supports(&version) {
            return Err(IoError::UnsupportedVersion {
                version,
                supported: self.config.supported_versions.clone(),
            });
        }
        debug!(%version, "版本检查通过");
        Ok(version)
    }

    /// 项目描述文件可选：缺失或无法使用时返回占位项目并记录提示。
    fn load_project(&self, archive: &ExtractedArchive, notices: &mut Vec<LoadNotice>) -> Project {
        let Some(path) = archive.file(PROJECT_FILE) else {
            debug!("归档中没有 project.bcfp，使用占位项目");
            notices.push(LoadNotice::new(
                NoticeKind::DefaultProject,
                PROJECT_FILE,
                None,
                "project.bcfp is absent",
            ));
            return Project::placeholder();
        };

        let validated = match self.validate(&path, PROJECT_SCHEMA) {
            Ok(validated) => validated,
            Err(err) => {
                warn!(path = %path.display(), %err, "project.bcfp 无法解析，使用占位项目");
                notices.push(LoadNotice::new(
                    NoticeKind::DefaultProject,
                    PROJECT_FILE,
                    None,
                    err.to_string(),
                ));
                return Project::placeholder();
            }
        };
        report_diagnostics(&validated, PROJECT_FILE.into(), None, notices);

        match build_project(&validated.record) {
            Ok(project) => project,
            Err(err) => {
                warn!(path = %path.display(), %err, "project.bcfp 缺少必填字段，使用占位项目");
                notices.push(LoadNotice::new(
                    NoticeKind::DefaultProject,
                    PROJECT_FILE,
                    None,
                    err.to_string(),
                ));
                Project::placeholder()
            }
        }
    }

    /// 构建一个议题目录；返回 `None` 表示整个议题被跳过。
    fn load_topic(
        &self,
        archive: &ExtractedArchive,
        topic: &str,
        project: &mut Project,
        notices: &mut Vec<LoadNotice>,
    ) -> Option<TopicMarkup> {
        let file = relative(topic, MARKUP_FILE);
        let path = archive.topic_path(topic).join(MARKUP_FILE);
        debug!(topic = %topic, "读取议题");
        if !path.is_file() {
            warn!(topic = %topic, "议题目录缺少 markup.bcf，跳过");
            notices.push(LoadNotice::new(
                NoticeKind::SkippedTopic,
                file,
                Some(topic),
                "markup.bcf is absent",
            ));
            return None;
        }

        let validated = match self.validate(&path, MARKUP_SCHEMA) {
            Ok(validated) => validated,
            Err(err) => {
                warn!(topic = %topic, %err, "markup.bcf 无法解析，跳过议题");
                notices.push(LoadNotice::new(
                    NoticeKind::SkippedTopic,
                    file,
                    Some(topic),
                    err.to_string(),
                ));
                return None;
            }
        };
        report_diagnostics(&validated, file.clone(), Some(topic), notices);

        let parent = project.meta.id;
        let ids = project.node_ids_mut();
        let mut skipped = Vec::new();
        let mut markup = match build_markup(ids, parent, &validated.record, &mut skipped) {
            Ok(markup) => markup,
            Err(err) => {
                warn!(topic = %topic, %err, "议题无法构建，跳过");
                notices.push(LoadNotice::new(
                    NoticeKind::SkippedTopic,
                    file,
                    Some(topic),
                    err.to_string(),
                ));
                return None;
            }
        };
        for err in &skipped {
            warn!(topic = %topic, %err, "跳过标记中的条目");
            notices.push(LoadNotice::skipped_entry(file.clone(), Some(topic), err));
        }

        self.attach_viewpoints(archive, topic, &mut markup, ids, notices);
        Some(markup)
    }

    /// 为每个带文件定位符的视点引用挂载完整视点；失败只跳过该视点。
    /// 定位符只能指向议题目录内部。
    fn attach_viewpoints(
        &self,
        archive: &ExtractedArchive,
        topic: &str,
        markup: &mut TopicMarkup,
        ids: &mut NodeIds,
        notices: &mut Vec<LoadNotice>,
    ) {
        for reference in &mut markup.viewpoints {
            let Some(uri) = reference.file.value.as_ref() else {
                continue;
            };
            let file = relative(topic, uri.as_str());
            let mut skip = |message: String| {
                warn!(topic = %topic, viewpoint = %uri, %message, "跳过视点");
                notices.push(LoadNotice::new(
                    NoticeKind::SkippedViewpoint,
                    file.clone(),
                    Some(topic),
                    message,
                ));
            };

            let Some(path) = archive.topic_file(topic, uri.as_str()) else {
                skip(format!("viewpoint locator {uri} points outside the topic folder"));
                continue;
            };
            if !path.is_file() {
                skip(format!("viewpoint file {uri} is absent"));
                continue;
            }
            let validated = match self.validate(&path, VISINFO_SCHEMA) {
                Ok(validated) => validated,
                Err(err) => {
                    skip(err.to_string());
                    continue;
                }
            };
            match build_viewpoint(ids, reference.meta.id, &validated.record) {
                Ok(viewpoint) => {
                    report_diagnostics(&validated, file.clone(), Some(topic), notices);
                    reference.viewpoint = Some(viewpoint);
                }
                Err(err) => {
                    report_diagnostics(&validated, file.clone(), Some(topic), notices);
                    notices.push(LoadNotice::new(
                        NoticeKind::SkippedViewpoint,
                        file,
                        Some(topic),
                        err.to_string(),
                    ));
                    warn!(topic = %topic, viewpoint = %uri, %err, "视点缺少必填字段，跳过");
                }
            }
        }
    }
}

impl<V: SchemaValidator> DocumentLoader for BcfFacade<V> {
    fn load(&self, path: &Path) -> Result<LoadedProject, IoError> {
        let mut tracker = StageTracker::new();
        self.run(path, &mut tracker).inspect_err(|err| tracker.abort(err))
    }
}

impl<V: SchemaValidator> DocumentSaver for BcfFacade<V> {
    fn save(&self, _project: &Project, path: &Path) -> Result<(), IoError> {
        Err(IoError::UnsupportedFeature(format!(
            "BCF writer for {:?} 尚未实现",
            path
        )))
    }
}

fn relative(topic: &str, name: &str) -> PathBuf {
    Path::new(topic).join(name)
}

fn report_diagnostics(
    validated: &Validated,
    file: PathBuf,
    topic: Option<&str>,
    notices: &mut Vec<LoadNotice>,
) {
    for diagnostic in &validated.diagnostics {
        warn!(file = %file.display(), %diagnostic, "文档不完全符合 schema");
        notices.push(LoadNotice::validation(file.clone(), topic, diagnostic));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_records_abort() {
        let mut tracker = StageTracker::new();
        tracker.advance(LoadStage::Extracted);
        tracker.abort(&IoError::MissingVersion {
            path: PathBuf::from("x.bcfzip"),
        });
        assert_eq!(
            tracker.history,
            vec![LoadStage::Unopened, LoadStage::Extracted, LoadStage::Aborted]
        );
    }

    #[test]
    fn saver_is_not_implemented() {
        let facade = BcfFacade::new();
        let err = facade
            .save(&Project::placeholder(), Path::new("out.bcfzip"))
            .unwrap_err();
        assert!(matches!(err, IoError::UnsupportedFeature(_)));
    }
}
