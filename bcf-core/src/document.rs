use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use uuid::Uuid;

use crate::geometry::{Direction, Point3};
use crate::node::{Field, Node, NodeId, NodeIds, NodeMeta, XmlName, walk};

/// 文档中出现的时间戳，保留原始时区偏移。
pub type Timestamp = DateTime<FixedOffset>;

/// 未指定顺序时的索引哨兵值。
pub const UNSPECIFIED_INDEX: i32 = -1;

/// 相对或绝对的资源定位符（视点文件、快照、外部文档）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Uri(String);

impl Uri {
    #[inline]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 标识符引用的解析状态。
///
/// 引用始终保留原始 GUID；解析只是在同一张表里按 GUID 查找目标节点，
/// 找不到时进入 `Dangling`，而不是报错或丢弃。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resolution {
    Pending,
    Resolved(NodeId),
    Dangling,
}

impl Resolution {
    #[inline]
    pub fn target(self) -> Option<NodeId> {
        match self {
            Resolution::Resolved(id) => Some(id),
            _ => None,
        }
    }
}

pub mod tags {
    use crate::node::XmlName;

    pub const PROJECT: XmlName = XmlName::element("Project");
    pub const PROJECT_ID: XmlName = XmlName::attribute("ProjectId");
    pub const NAME: XmlName = XmlName::element("Name");
    pub const EXTENSION_SCHEMA: XmlName = XmlName::element("ExtensionSchema");

    pub const MARKUP: XmlName = XmlName::element("Markup");
    pub const GUID: XmlName = XmlName::attribute("Guid");
    pub const IS_EXTERNAL: XmlName = XmlName::attribute("isExternal");

    pub const HEADER: XmlName = XmlName::element("Header");
    pub const FILE: XmlName = XmlName::element("File");
    pub const IFC_PROJECT: XmlName = XmlName::attribute("IfcProject");
    pub const IFC_SPATIAL_STRUCTURE_ELEMENT: XmlName =
        XmlName::attribute("IfcSpatialStructureElement");
    pub const FILENAME: XmlName = XmlName::element("Filename");
    pub const DATE: XmlName = XmlName::element("Date");
    pub const REFERENCE: XmlName = XmlName::element("Reference");

    pub const TOPIC: XmlName = XmlName::element("Topic");
    pub const TOPIC_TYPE: XmlName = XmlName::attribute("TopicType");
    pub const TOPIC_STATUS: XmlName = XmlName::attribute("TopicStatus");
    pub const REFERENCE_LINK: XmlName = XmlName::element("ReferenceLink");
    pub const TITLE: XmlName = XmlName::element("Title");
    pub const PRIORITY: XmlName = XmlName::element("Priority");
    pub const INDEX: XmlName = XmlName::element("Index");
    pub const LABELS: XmlName = XmlName::element("Labels");
    pub const CREATION_DATE: XmlName = XmlName::element("CreationDate");
    pub const CREATION_AUTHOR: XmlName = XmlName::element("CreationAuthor");
    pub const MODIFIED_DATE: XmlName = XmlName::element("ModifiedDate");
    pub const MODIFIED_AUTHOR: XmlName = XmlName::element("ModifiedAuthor");
    pub const DUE_DATE: XmlName = XmlName::element("DueDate");
    pub const ASSIGNED_TO: XmlName = XmlName::element("AssignedTo");
    pub const STAGE: XmlName = XmlName::element("Stage");
    pub const DESCRIPTION: XmlName = XmlName::element("Description");
    pub const BIM_SNIPPET: XmlName = XmlName::element("BimSnippet");
    pub const SNIPPET_TYPE: XmlName = XmlName::attribute("SnippetType");
    pub const REFERENCE_SCHEMA: XmlName = XmlName::element("ReferenceSchema");
    pub const DOCUMENT_REFERENCE: XmlName = XmlName::element("DocumentReference");
    pub const REFERENCED_DOCUMENT: XmlName = XmlName::element("ReferencedDocument");
    pub const RELATED_TOPIC: XmlName = XmlName::element("RelatedTopic");

    pub const COMMENT: XmlName = XmlName::element("Comment");
    pub const AUTHOR: XmlName = XmlName::element("Author");
    pub const VIEWPOINT: XmlName = XmlName::element("Viewpoint");

    pub const VIEWPOINTS: XmlName = XmlName::element("Viewpoints");
    pub const SNAPSHOT: XmlName = XmlName::element("Snapshot");

    pub const VISUALIZATION_INFO: XmlName = XmlName::element("VisualizationInfo");
    pub const COMPONENTS: XmlName = XmlName::element("Components");
    pub const VIEW_SETUP_HINTS: XmlName = XmlName::element("ViewSetupHints");
    pub const SPACES_VISIBLE: XmlName = XmlName::attribute("SpacesVisible");
    pub const SPACE_BOUNDARIES_VISIBLE: XmlName = XmlName::attribute("SpaceBoundariesVisible");
    pub const OPENINGS_VISIBLE: XmlName = XmlName::attribute("OpeningsVisible");
    pub const SELECTION: XmlName = XmlName::element("Selection");
    pub const VISIBILITY: XmlName = XmlName::element("Visibility");
    pub const DEFAULT_VISIBILITY: XmlName = XmlName::attribute("DefaultVisibility");
    pub const EXCEPTIONS: XmlName = XmlName::element("Exceptions");
    pub const COLORING: XmlName = XmlName::element("Coloring");
    pub const COLOR_ENTRY: XmlName = XmlName::element("Color");
    pub const COLOR: XmlName = XmlName::attribute("Color");
    pub const COMPONENT: XmlName = XmlName::element("Component");
    pub const IFC_GUID: XmlName = XmlName::attribute("IfcGuid");
    pub const ORIGINATING_SYSTEM: XmlName = XmlName::element("OriginatingSystem");
    pub const AUTHORING_TOOL_ID: XmlName = XmlName::element("AuthoringToolId");

    pub const ORTHOGONAL_CAMERA: XmlName = XmlName::element("OrthogonalCamera");
    pub const PERSPECTIVE_CAMERA: XmlName = XmlName::element("PerspectiveCamera");
    pub const CAMERA_VIEW_POINT: XmlName = XmlName::element("CameraViewPoint");
    pub const CAMERA_DIRECTION: XmlName = XmlName::element("CameraDirection");
    pub const CAMERA_UP_VECTOR: XmlName = XmlName::element("CameraUpVector");
    pub const VIEW_TO_WORLD_SCALE: XmlName = XmlName::element("ViewToWorldScale");
    pub const FIELD_OF_VIEW: XmlName = XmlName::element("FieldOfView");

    pub const LINES: XmlName = XmlName::element("Lines");
    pub const LINE: XmlName = XmlName::element("Line");
    pub const START_POINT: XmlName = XmlName::element("StartPoint");
    pub const END_POINT: XmlName = XmlName::element("EndPoint");
    pub const CLIPPING_PLANES: XmlName = XmlName::element("ClippingPlanes");
    pub const CLIPPING_PLANE: XmlName = XmlName::element("ClippingPlane");
    pub const LOCATION: XmlName = XmlName::element("Location");
    pub const DIRECTION: XmlName = XmlName::element("Direction");

    pub const BITMAP: XmlName = XmlName::element("Bitmap");
    pub const BITMAP_FORMAT: XmlName = XmlName::element("Bitmap");
    pub const NORMAL: XmlName = XmlName::element("Normal");
    pub const UP: XmlName = XmlName::element("Up");
    pub const HEIGHT: XmlName = XmlName::element("Height");
}

fn visit_all<'a, T: Node>(items: &'a [T], visit: &mut dyn FnMut(&'a dyn Node)) {
    for item in items {
        visit(item);
    }
}

/// 节点表条目：父节点编号与标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEntry {
    pub parent: Option<NodeId>,
    pub name: XmlName,
}

/// 文档根节点：项目及其按文档顺序排列的议题集合。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub meta: NodeMeta,
    pub guid: Field<Uuid>,
    pub name: Field<String>,
    pub extension_schema: Field<Option<Uri>>,
    pub markups: Vec<TopicMarkup>,
    #[serde(skip)]
    ids: NodeIds,
}

impl Project {
    pub fn new(guid: Uuid, name: impl Into<String>, extension_schema: Option<Uri>) -> Self {
        let mut ids = NodeIds::new();
        let meta = ids.root(tags::PROJECT);
        let parent = meta.id;
        Self {
            guid: ids.field(tags::PROJECT_ID, parent, guid),
            name: ids.field(tags::NAME, parent, name.into()),
            extension_schema: ids.field(tags::EXTENSION_SCHEMA, parent, extension_schema),
            meta,
            markups: Vec::new(),
            ids,
        }
    }

    /// 缺少项目描述文件时使用的占位项目：全零 GUID、空名称。
    pub fn placeholder() -> Self {
        Self::new(Uuid::nil(), "", None)
    }

    #[inline]
    pub fn node_ids_mut(&mut self) -> &mut NodeIds {
        &mut self.ids
    }

    /// 追加一个已构建的议题，保持插入顺序。
    pub fn push_markup(&mut self, markup: TopicMarkup) {
        debug_assert_eq!(markup.meta.parent, Some(self.meta.id));
        self.markups.push(markup);
    }

    pub fn markup(&self, topic_guid: Uuid) -> Option<&TopicMarkup> {
        self.markups
            .iter()
            .find(|markup| markup.topic.guid.value == topic_guid)
    }

    pub fn markup_mut(&mut self, topic_guid: Uuid) -> Option<&mut TopicMarkup> {
        self.markups
            .iter_mut()
            .find(|markup| markup.topic.guid.value == topic_guid)
    }

    /// 同时借出议题标记与编号分配器，供编辑层插入新节点。
    pub fn markup_and_ids_mut(
        &mut self,
        topic_guid: Uuid,
    ) -> Option<(&mut TopicMarkup, &mut NodeIds)> {
        let markup = self
            .markups
            .iter_mut()
            .find(|markup| markup.topic.guid.value == topic_guid)?;
        Some((markup, &mut self.ids))
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> + '_ {
        self.markups.iter().map(|markup| &markup.topic)
    }

    /// 遍历整棵树生成节点表（编号 → 父节点、标签）。
    pub fn node_index(&self) -> HashMap<NodeId, NodeEntry> {
        let mut index = HashMap::new();
        walk(self, &mut |node| {
            let meta = node.meta();
            index.insert(
                meta.id,
                NodeEntry {
                    parent: meta.parent,
                    name: meta.name,
                },
            );
        });
        index
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_index().get(&id).and_then(|entry| entry.parent)
    }

    /// 通过相关议题 GUID 找到目标议题。
    pub fn related_topic(&self, related: &RelatedTopic) -> Option<&Topic> {
        let target = related.resolution.target()?;
        self.topics()
            .find(|topic| topic.meta.id == target && !topic.meta.is_deleted())
    }
}

impl Node for Project {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.guid);
        visit(&self.name);
        visit(&self.extension_schema);
        visit_all(&self.markups, visit);
    }
}

/// 单个议题的容器：议题本身、可选文件头、评论与视点引用。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicMarkup {
    pub meta: NodeMeta,
    pub header: Option<Header>,
    pub topic: Topic,
    pub comments: Vec<Comment>,
    pub viewpoints: Vec<ViewpointReference>,
}

impl TopicMarkup {
    #[inline]
    pub fn guid(&self) -> Uuid {
        self.topic.guid.value
    }

    pub fn viewpoint_ref(&self, guid: Uuid) -> Option<&ViewpointReference> {
        self.viewpoints.iter().find(|vp| vp.guid.value == guid)
    }

    pub fn viewpoint_ref_mut(&mut self, guid: Uuid) -> Option<&mut ViewpointReference> {
        self.viewpoints.iter_mut().find(|vp| vp.guid.value == guid)
    }

    pub fn comment(&self, guid: Uuid) -> Option<&Comment> {
        self.comments.iter().find(|comment| comment.guid.value == guid)
    }

    pub fn comment_mut(&mut self, guid: Uuid) -> Option<&mut Comment> {
        self.comments
            .iter_mut()
            .find(|comment| comment.guid.value == guid)
    }

    /// 返回评论所引用的视点引用对象本身（非拷贝）。
    ///
    /// 未解析、悬空或目标已被删除时返回 `None`。
    pub fn comment_viewpoint(&self, comment: &Comment) -> Option<&ViewpointReference> {
        let target = comment.viewpoint.as_ref()?.resolution.target()?;
        self.viewpoints
            .iter()
            .find(|vp| vp.meta.id == target && !vp.meta.is_deleted())
    }

    /// 视点引用按索引排序：显式索引在前按升序，`-1` 的排在后面并保持文档顺序。
    pub fn viewpoints_in_order(&self) -> Vec<&ViewpointReference> {
        let mut ordered: Vec<&ViewpointReference> = self.viewpoints.iter().collect();
        ordered.sort_by_key(|vp| match vp.index() {
            Some(index) => (0, index),
            None => (1, 0),
        });
        ordered
    }
}

impl Node for TopicMarkup {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        if let Some(header) = &self.header {
            visit(header);
        }
        visit(&self.topic);
        visit_all(&self.comments, visit);
        visit_all(&self.viewpoints, visit);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    pub meta: NodeMeta,
    pub files: Vec<HeaderFile>,
}

impl Node for Header {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit_all(&self.files, visit);
    }
}

/// 议题引用的源模型文件。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderFile {
    pub meta: NodeMeta,
    pub ifc_project: Field<String>,
    pub ifc_spatial_structure_element: Field<String>,
    pub is_external: Field<bool>,
    pub filename: Field<String>,
    pub date: Field<Option<Timestamp>>,
    pub reference: Field<Option<Uri>>,
}

impl Node for HeaderFile {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.ifc_project);
        visit(&self.ifc_spatial_structure_element);
        visit(&self.is_external);
        visit(&self.filename);
        visit(&self.date);
        visit(&self.reference);
    }
}

/// 议题元数据。状态、类型、优先级是自由字符串，约定值由使用方决定。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topic {
    pub meta: NodeMeta,
    pub guid: Field<Uuid>,
    pub topic_type: Field<String>,
    pub topic_status: Field<String>,
    pub reference_links: Vec<Field<String>>,
    pub title: Field<String>,
    pub priority: Field<String>,
    pub index: Field<i32>,
    pub labels: Vec<Field<String>>,
    pub creation_date: Field<Timestamp>,
    pub creation_author: Field<String>,
    pub modified_date: Field<Option<Timestamp>>,
    pub modified_author: Field<String>,
    pub due_date: Field<Option<Timestamp>>,
    pub assigned_to: Field<String>,
    pub stage: Field<String>,
    pub description: Field<String>,
    pub bim_snippet: Option<BimSnippet>,
    pub document_references: Vec<DocumentReference>,
    pub related_topics: Vec<RelatedTopic>,
}

impl Topic {
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.labels
            .iter()
            .filter(|label| !label.meta.is_deleted())
            .map(|label| label.value.as_str())
    }
}

impl Node for Topic {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.guid);
        visit(&self.topic_type);
        visit(&self.topic_status);
        visit_all(&self.reference_links, visit);
        visit(&self.title);
        visit(&self.priority);
        visit(&self.index);
        visit_all(&self.labels, visit);
        visit(&self.creation_date);
        visit(&self.creation_author);
        visit(&self.modified_date);
        visit(&self.modified_author);
        visit(&self.due_date);
        visit(&self.assigned_to);
        visit(&self.stage);
        visit(&self.description);
        if let Some(snippet) = &self.bim_snippet {
            visit(snippet);
        }
        visit_all(&self.document_references, visit);
        visit_all(&self.related_topics, visit);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BimSnippet {
    pub meta: NodeMeta,
    pub snippet_type: Field<String>,
    pub is_external: Field<bool>,
    pub reference: Field<Uri>,
    pub reference_schema: Field<Uri>,
}

impl Node for BimSnippet {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.snippet_type);
        visit(&self.is_external);
        visit(&self.reference);
        visit(&self.reference_schema);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReference {
    pub meta: NodeMeta,
    pub guid: Field<Option<Uuid>>,
    pub is_external: Field<bool>,
    pub referenced_document: Field<Option<Uri>>,
    pub description: Field<String>,
}

impl Node for DocumentReference {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.guid);
        visit(&self.is_external);
        visit(&self.referenced_document);
        visit(&self.description);
    }
}

/// 指向另一个议题的引用，加载阶段只保留 GUID，整个项目组装后再解析。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedTopic {
    pub meta: NodeMeta,
    pub guid: Field<Uuid>,
    pub resolution: Resolution,
}

impl Node for RelatedTopic {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.guid);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub meta: NodeMeta,
    pub guid: Field<Uuid>,
    pub date: Field<Timestamp>,
    pub author: Field<String>,
    pub text: Field<String>,
    pub viewpoint: Option<ViewpointLink>,
    pub modified_date: Field<Option<Timestamp>>,
    pub modified_author: Field<String>,
}

impl Node for Comment {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.guid);
        visit(&self.date);
        visit(&self.author);
        visit(&self.text);
        if let Some(link) = &self.viewpoint {
            visit(link);
        }
        visit(&self.modified_date);
        visit(&self.modified_author);
    }
}

/// 评论中的 `<Viewpoint Guid="..."/>`。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewpointLink {
    pub meta: NodeMeta,
    pub guid: Field<Uuid>,
    pub resolution: Resolution,
}

impl Node for ViewpointLink {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.guid);
    }
}

/// 标记文件中的视点引用；完整视点在对应文件解析成功后才挂载。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewpointReference {
    pub meta: NodeMeta,
    pub guid: Field<Uuid>,
    pub file: Field<Option<Uri>>,
    pub snapshot: Field<Option<Uri>>,
    pub index: Field<i32>,
    pub viewpoint: Option<Viewpoint>,
}

impl ViewpointReference {
    /// 显式索引；`-1`（未指定）返回 `None`。
    #[inline]
    pub fn index(&self) -> Option<i32> {
        match self.index.value {
            UNSPECIFIED_INDEX => None,
            index => Some(index),
        }
    }
}

impl Node for ViewpointReference {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.guid);
        visit(&self.file);
        visit(&self.snapshot);
        visit(&self.index);
        if let Some(viewpoint) = &self.viewpoint {
            visit(viewpoint);
        }
    }
}

/// 保存的三维视图状态。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewpoint {
    pub meta: NodeMeta,
    pub guid: Field<Uuid>,
    pub components: Option<Components>,
    pub camera: Option<Camera>,
    pub lines: Vec<Line>,
    pub clipping_planes: Vec<ClippingPlane>,
    pub bitmaps: Vec<Bitmap>,
}

impl Node for Viewpoint {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.guid);
        if let Some(components) = &self.components {
            visit(components);
        }
        if let Some(camera) = &self.camera {
            visit(camera);
        }
        visit_all(&self.lines, visit);
        visit_all(&self.clipping_planes, visit);
        visit_all(&self.bitmaps, visit);
    }
}

/// 正交相机与透视相机互斥，由枚举保证至多存在一个。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Camera {
    Orthogonal(OrthogonalCamera),
    Perspective(PerspectiveCamera),
}

impl Camera {
    pub fn view_point(&self) -> Point3 {
        match self {
            Camera::Orthogonal(camera) => camera.view_point.value,
            Camera::Perspective(camera) => camera.view_point.value,
        }
    }
}

impl Node for Camera {
    fn meta(&self) -> &NodeMeta {
        match self {
            Camera::Orthogonal(camera) => &camera.meta,
            Camera::Perspective(camera) => &camera.meta,
        }
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        match self {
            Camera::Orthogonal(camera) => {
                visit(&camera.view_point);
                visit(&camera.direction);
                visit(&camera.up_vector);
                visit(&camera.view_to_world_scale);
            }
            Camera::Perspective(camera) => {
                visit(&camera.view_point);
                visit(&camera.direction);
                visit(&camera.up_vector);
                visit(&camera.field_of_view);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrthogonalCamera {
    pub meta: NodeMeta,
    pub view_point: Field<Point3>,
    pub direction: Field<Direction>,
    pub up_vector: Field<Direction>,
    pub view_to_world_scale: Field<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerspectiveCamera {
    pub meta: NodeMeta,
    pub view_point: Field<Point3>,
    pub direction: Field<Direction>,
    pub up_vector: Field<Direction>,
    pub field_of_view: Field<f64>,
}

/// 构件的可见性、选中与着色集合。
///
/// `coloring` 为 `None` 表示文档里没有 `Coloring` 段；`Some(vec![])`
/// 表示段存在但没有任何带颜色的条目。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Components {
    pub meta: NodeMeta,
    pub view_setup_hints: Option<ViewSetupHints>,
    pub selection: Vec<Component>,
    pub visibility: Visibility,
    pub coloring: Option<Vec<ComponentColoring>>,
}

impl Node for Components {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        if let Some(hints) = &self.view_setup_hints {
            visit(hints);
        }
        visit_all(&self.selection, visit);
        visit(&self.visibility);
        if let Some(coloring) = &self.coloring {
            visit_all(coloring, visit);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSetupHints {
    pub meta: NodeMeta,
    pub spaces_visible: Field<bool>,
    pub space_boundaries_visible: Field<bool>,
    pub openings_visible: Field<bool>,
}

impl Node for ViewSetupHints {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.spaces_visible);
        visit(&self.space_boundaries_visible);
        visit(&self.openings_visible);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visibility {
    pub meta: NodeMeta,
    pub default_visibility: Field<bool>,
    pub exceptions: Vec<Component>,
}

impl Node for Visibility {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.default_visibility);
        visit_all(&self.exceptions, visit);
    }
}

/// IFC 构件引用。`IfcGuid` 是 IFC 压缩 GUID，不按 UUID 解析。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub meta: NodeMeta,
    pub ifc_guid: Field<Option<String>>,
    pub originating_system: Field<String>,
    pub authoring_tool_id: Field<String>,
}

impl Node for Component {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.ifc_guid);
        visit(&self.originating_system);
        visit(&self.authoring_tool_id);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentColoring {
    pub meta: NodeMeta,
    pub color: Field<String>,
    pub components: Vec<Component>,
}

impl Node for ComponentColoring {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.color);
        visit_all(&self.components, visit);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub meta: NodeMeta,
    pub start: Field<Point3>,
    pub end: Field<Point3>,
}

impl Node for Line {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.start);
        visit(&self.end);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClippingPlane {
    pub meta: NodeMeta,
    pub location: Field<Point3>,
    pub direction: Field<Direction>,
}

impl Node for ClippingPlane {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.location);
        visit(&self.direction);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BitmapFormat {
    Png,
    Jpg,
}

impl BitmapFormat {
    /// 只有 `PNG` 识别为 PNG，其余一律按 JPG 处理。
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("PNG") {
            BitmapFormat::Png
        } else {
            BitmapFormat::Jpg
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BitmapFormat::Png => "PNG",
            BitmapFormat::Jpg => "JPG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bitmap {
    pub meta: NodeMeta,
    pub format: Field<BitmapFormat>,
    pub reference: Field<String>,
    pub location: Field<Point3>,
    pub normal: Field<Direction>,
    pub up: Field<Direction>,
    pub height: Field<f64>,
}

impl Node for Bitmap {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn for_each_child<'a>(&'a self, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(&self.format);
        visit(&self.reference);
        visit(&self.location);
        visit(&self.normal);
        visit(&self.up);
        visit(&self.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_markup(project: &mut Project, indices: &[i32]) -> TopicMarkup {
        let parent = project.meta.id;
        let ids = project.node_ids_mut();
        let meta = ids.child(tags::MARKUP, parent);
        let markup_id = meta.id;
        let topic_meta = ids.child(tags::TOPIC, markup_id);
        let topic_id = topic_meta.id;
        let created = chrono::Utc
            .with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
            .single()
            .expect("valid date")
            .fixed_offset();
        let topic = Topic {
            guid: ids.field(tags::GUID, topic_id, Uuid::from_u128(1)),
            topic_type: ids.field(tags::TOPIC_TYPE, topic_id, String::new()),
            topic_status: ids.field(tags::TOPIC_STATUS, topic_id, String::new()),
            reference_links: Vec::new(),
            title: ids.field(tags::TITLE, topic_id, "Clash".to_string()),
            priority: ids.field(tags::PRIORITY, topic_id, String::new()),
            index: ids.field(tags::INDEX, topic_id, UNSPECIFIED_INDEX),
            labels: Vec::new(),
            creation_date: ids.field(tags::CREATION_DATE, topic_id, created),
            creation_author: ids.field(tags::CREATION_AUTHOR, topic_id, "a@b.c".to_string()),
            modified_date: ids.field(tags::MODIFIED_DATE, topic_id, None),
            modified_author: ids.field(tags::MODIFIED_AUTHOR, topic_id, String::new()),
            due_date: ids.field(tags::DUE_DATE, topic_id, None),
            assigned_to: ids.field(tags::ASSIGNED_TO, topic_id, String::new()),
            stage: ids.field(tags::STAGE, topic_id, String::new()),
            description: ids.field(tags::DESCRIPTION, topic_id, String::new()),
            bim_snippet: None,
            document_references: Vec::new(),
            related_topics: Vec::new(),
            meta: topic_meta,
        };
        let viewpoints = indices
            .iter()
            .enumerate()
            .map(|(n, index)| {
                let meta = ids.child(tags::VIEWPOINTS, markup_id);
                let id = meta.id;
                ViewpointReference {
                    guid: ids.field(tags::GUID, id, Uuid::from_u128(100 + n as u128)),
                    file: ids.field(tags::VIEWPOINT, id, None),
                    snapshot: ids.field(tags::SNAPSHOT, id, None),
                    index: ids.field(tags::INDEX, id, *index),
                    viewpoint: None,
                    meta,
                }
            })
            .collect();
        TopicMarkup {
            meta,
            header: None,
            topic,
            comments: Vec::new(),
            viewpoints,
        }
    }

    #[test]
    fn placeholder_project_has_nil_guid() {
        let project = Project::placeholder();
        assert!(project.guid.value.is_nil());
        assert_eq!(project.name.value, "");
        assert!(project.extension_schema.value.is_none());
        assert!(project.meta.parent.is_none());
        assert!(project.markups.is_empty());
    }

    #[test]
    fn node_index_links_every_child_to_parent() {
        let mut project = Project::new(Uuid::from_u128(9), "Demo", None);
        let markup = sample_markup(&mut project, &[]);
        project.push_markup(markup);

        let index = project.node_index();
        let markup = &project.markups[0];
        assert_eq!(project.parent_of(markup.meta.id), Some(project.meta.id));
        assert_eq!(project.parent_of(markup.topic.meta.id), Some(markup.meta.id));
        assert_eq!(
            project.parent_of(markup.topic.title.meta.id),
            Some(markup.topic.meta.id)
        );
        let orphans = index
            .iter()
            .filter(|(id, entry)| **id != project.meta.id && entry.parent.is_none())
            .count();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn viewpoints_in_order_puts_unspecified_last() {
        let mut project = Project::new(Uuid::from_u128(9), "Demo", None);
        let markup = sample_markup(&mut project, &[-1, 2, 0, -1]);
        let ordered: Vec<u128> = markup
            .viewpoints_in_order()
            .iter()
            .map(|vp| vp.guid.value.as_u128())
            .collect();
        assert_eq!(ordered, vec![102, 101, 100, 103]);
        assert_eq!(markup.viewpoints[0].index(), None);
        assert_eq!(markup.viewpoints[2].index(), Some(0));
    }

    #[test]
    fn bitmap_format_defaults_to_jpg() {
        assert_eq!(BitmapFormat::from_label("PNG"), BitmapFormat::Png);
        assert_eq!(BitmapFormat::from_label("JPG"), BitmapFormat::Jpg);
        assert_eq!(BitmapFormat::from_label("bmp"), BitmapFormat::Jpg);
    }

    #[test]
    fn project_serializes_to_json() {
        let project = Project::new(Uuid::from_u128(9), "Demo", Some(Uri::new("ext.xsd")));
        let value = serde_json::to_value(&project).expect("serialize project");
        assert_eq!(value["name"]["value"], "Demo");
        assert_eq!(value["extension_schema"]["value"], "ext.xsd");
        assert_eq!(value["name"]["meta"]["name"]["tag"], "Name");
    }
}
