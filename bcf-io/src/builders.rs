//! 实体构建器：每种实体一个函数，输入记录节点与父节点编号，输出挂好父链接的实体。
//!
//! 缺省字段按 BCF 2.1 的约定补默认值：可选文本为空字符串，未指定的索引为 `-1`，
//! 布尔值按字段各自的 schema 默认值，可选子对象为 `None`。

use bcf_core::document::{
    Bitmap, BitmapFormat, BimSnippet, Camera, ClippingPlane, Comment, Component,
    ComponentColoring, Components, DocumentReference, Header, HeaderFile, Line,
    OrthogonalCamera, PerspectiveCamera, Project, RelatedTopic, Resolution, Topic, TopicMarkup,
    UNSPECIFIED_INDEX, ViewSetupHints, Viewpoint, ViewpointLink, ViewpointReference, Visibility,
    tags,
};
use bcf_core::node::{NodeId, NodeIds};
use tracing::trace;

use crate::decode::{DecodeError, Fields};
use crate::record::Record;
use crate::resolve::resolve_comment_viewpoints;

/// 项目描述文件（`ProjectExtension` 根元素）。
///
/// `ExtensionSchema` 是根元素的直接子元素，与 `Project` 并列。
pub fn build_project(record: &Record) -> Result<Project, DecodeError> {
    let root = Fields::new(record, "ProjectExtension");
    let project = Fields::new(root.required_child(tags::PROJECT.tag)?, tags::PROJECT.tag);
    let guid = project.required_uuid("@ProjectId")?;
    let name = project.text_or(tags::NAME.tag, "");
    Ok(Project::new(
        guid,
        name,
        root.optional_uri(tags::EXTENSION_SCHEMA.tag),
    ))
}

/// 组装一个议题标记。
///
/// 构建顺序为评论、议题、文件头、视点引用，最后在本标记内解析评论到视点引用的链接。
/// 可选条目（评论、视点引用、文件头中的文件、文档引用、相关议题、BIM 片段）解码失败
/// 只跳过该条，错误追加到 `skipped`；`Topic` 缺失或其必填字段解码失败则整个标记失败。
pub fn build_markup(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
    skipped: &mut Vec<DecodeError>,
) -> Result<TopicMarkup, DecodeError> {
    let fields = Fields::new(record, tags::MARKUP.tag);
    let meta = ids.child(tags::MARKUP, parent);
    let id = meta.id;

    let comments = fields
        .children(tags::COMMENT.tag)
        .into_iter()
        .filter_map(|comment| keep_or_skip(build_comment(ids, id, comment), skipped))
        .collect();

    let topic = build_topic(ids, id, fields.required_child(tags::TOPIC.tag)?, skipped)?;

    let header = match fields.child(tags::HEADER.tag) {
        Some(header) if !header.is_empty() => Some(build_header(ids, id, header, skipped)),
        _ => None,
    };

    let viewpoints = fields
        .children(tags::VIEWPOINTS.tag)
        .into_iter()
        .filter_map(|reference| {
            keep_or_skip(build_viewpoint_reference(ids, id, reference), skipped)
        })
        .collect();

    let mut markup = TopicMarkup {
        meta,
        header,
        topic,
        comments,
        viewpoints,
    };
    let dangling = resolve_comment_viewpoints(&mut markup);
    if !dangling.is_empty() {
        trace!(topic = %markup.guid(), ?dangling, "评论引用了不存在的视点");
    }
    Ok(markup)
}

/// 议题本身的必填字段失败时返回错误；BIM 片段、文档引用、相关议题各自独立，
/// 失败的条目追加到 `skipped` 后丢弃。
fn keep_or_skip<T>(built: Result<T, DecodeError>, skipped: &mut Vec<DecodeError>) -> Option<T> {
    match built {
        Ok(entity) => Some(entity),
        Err(err) => {
            skipped.push(err);
            None
        }
    }
}

pub fn build_topic(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
    skipped: &mut Vec<DecodeError>,
) -> Result<Topic, DecodeError> {
    let fields = Fields::new(record, tags::TOPIC.tag);
    let meta = ids.child(tags::TOPIC, parent);
    let id = meta.id;

    let guid = fields.required_uuid("@Guid")?;
    let title = fields.required_text(tags::TITLE.tag)?.to_string();
    let creation_date = fields.required_timestamp(tags::CREATION_DATE.tag)?;
    let creation_author = fields.required_text(tags::CREATION_AUTHOR.tag)?.to_string();
    let modified_date = fields.optional_timestamp(tags::MODIFIED_DATE.tag)?;
    let due_date = fields.optional_timestamp(tags::DUE_DATE.tag)?;
    let index = fields.i32_or(tags::INDEX.tag, UNSPECIFIED_INDEX)?;

    let bim_snippet = fields
        .child(tags::BIM_SNIPPET.tag)
        .and_then(|snippet| keep_or_skip(build_bim_snippet(ids, id, snippet), skipped));
    let document_references = fields
        .children(tags::DOCUMENT_REFERENCE.tag)
        .into_iter()
        .filter_map(|reference| {
            keep_or_skip(build_document_reference(ids, id, reference), skipped)
        })
        .collect();
    let related_topics = fields
        .children(tags::RELATED_TOPIC.tag)
        .into_iter()
        .filter_map(|related| keep_or_skip(build_related_topic(ids, id, related), skipped))
        .collect();

    Ok(Topic {
        guid: ids.field(tags::GUID, id, guid),
        topic_type: ids.field(tags::TOPIC_TYPE, id, fields.text_or("@TopicType", "")),
        topic_status: ids.field(tags::TOPIC_STATUS, id, fields.text_or("@TopicStatus", "")),
        reference_links: fields
            .texts(tags::REFERENCE_LINK.tag)
            .into_iter()
            .map(|link| ids.field(tags::REFERENCE_LINK, id, link.to_string()))
            .collect(),
        title: ids.field(tags::TITLE, id, title),
        priority: ids.field(tags::PRIORITY, id, fields.text_or(tags::PRIORITY.tag, "")),
        index: ids.field(tags::INDEX, id, index),
        labels: fields
            .texts(tags::LABELS.tag)
            .into_iter()
            .map(|label| ids.field(tags::LABELS, id, label.to_string()))
            .collect(),
        creation_date: ids.field(tags::CREATION_DATE, id, creation_date),
        creation_author: ids.field(tags::CREATION_AUTHOR, id, creation_author),
        modified_date: ids.field(tags::MODIFIED_DATE, id, modified_date),
        modified_author: ids.field(
            tags::MODIFIED_AUTHOR,
            id,
            fields.text_or(tags::MODIFIED_AUTHOR.tag, ""),
        ),
        due_date: ids.field(tags::DUE_DATE, id, due_date),
        assigned_to: ids.field(tags::ASSIGNED_TO, id, fields.text_or(tags::ASSIGNED_TO.tag, "")),
        stage: ids.field(tags::STAGE, id, fields.text_or(tags::STAGE.tag, "")),
        description: ids.field(tags::DESCRIPTION, id, fields.text_or(tags::DESCRIPTION.tag, "")),
        bim_snippet,
        document_references,
        related_topics,
        meta,
    })
}

pub fn build_bim_snippet(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<BimSnippet, DecodeError> {
    let fields = Fields::new(record, tags::BIM_SNIPPET.tag);
    let meta = ids.child(tags::BIM_SNIPPET, parent);
    let id = meta.id;
    let snippet_type = fields.required_text("@SnippetType")?.to_string();
    let is_external = fields.bool_or("@isExternal", false)?;
    let reference = fields.required_uri(tags::REFERENCE.tag)?;
    let reference_schema = fields.required_uri(tags::REFERENCE_SCHEMA.tag)?;
    Ok(BimSnippet {
        snippet_type: ids.field(tags::SNIPPET_TYPE, id, snippet_type),
        is_external: ids.field(tags::IS_EXTERNAL, id, is_external),
        reference: ids.field(tags::REFERENCE, id, reference),
        reference_schema: ids.field(tags::REFERENCE_SCHEMA, id, reference_schema),
        meta,
    })
}

pub fn build_document_reference(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<DocumentReference, DecodeError> {
    let fields = Fields::new(record, tags::DOCUMENT_REFERENCE.tag);
    let meta = ids.child(tags::DOCUMENT_REFERENCE, parent);
    let id = meta.id;
    let guid = fields.optional_uuid("@Guid")?;
    let is_external = fields.bool_or("@isExternal", false)?;
    Ok(DocumentReference {
        guid: ids.field(tags::GUID, id, guid),
        is_external: ids.field(tags::IS_EXTERNAL, id, is_external),
        referenced_document: ids.field(
            tags::REFERENCED_DOCUMENT,
            id,
            fields.optional_uri(tags::REFERENCED_DOCUMENT.tag),
        ),
        description: ids.field(tags::DESCRIPTION, id, fields.text_or(tags::DESCRIPTION.tag, "")),
        meta,
    })
}

/// 相关议题在这里只保留 GUID，整个项目组装完后再解析。
pub fn build_related_topic(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<RelatedTopic, DecodeError> {
    let fields = Fields::new(record, tags::RELATED_TOPIC.tag);
    let meta = ids.child(tags::RELATED_TOPIC, parent);
    let guid = fields.required_uuid("@Guid")?;
    Ok(RelatedTopic {
        guid: ids.field(tags::GUID, meta.id, guid),
        resolution: Resolution::Pending,
        meta,
    })
}

pub fn build_comment(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<Comment, DecodeError> {
    let fields = Fields::new(record, tags::COMMENT.tag);
    let meta = ids.child(tags::COMMENT, parent);
    let id = meta.id;

    let guid = fields.required_uuid("@Guid")?;
    let date = fields.required_timestamp(tags::DATE.tag)?;
    let author = fields.required_text(tags::AUTHOR.tag)?.to_string();
    let text = fields.required_text(tags::COMMENT.tag)?.to_string();
    let modified_date = fields.optional_timestamp(tags::MODIFIED_DATE.tag)?;

    let viewpoint = match fields.child(tags::VIEWPOINT.tag) {
        Some(link) => {
            let link_fields = Fields::new(link, tags::VIEWPOINT.tag);
            let link_meta = ids.child(tags::VIEWPOINT, id);
            let target = link_fields.required_uuid("@Guid")?;
            Some(ViewpointLink {
                guid: ids.field(tags::GUID, link_meta.id, target),
                resolution: Resolution::Pending,
                meta: link_meta,
            })
        }
        None => None,
    };

    Ok(Comment {
        guid: ids.field(tags::GUID, id, guid),
        date: ids.field(tags::DATE, id, date),
        author: ids.field(tags::AUTHOR, id, author),
        text: ids.field(tags::COMMENT, id, text),
        viewpoint,
        modified_date: ids.field(tags::MODIFIED_DATE, id, modified_date),
        modified_author: ids.field(
            tags::MODIFIED_AUTHOR,
            id,
            fields.text_or(tags::MODIFIED_AUTHOR.tag, ""),
        ),
        meta,
    })
}

/// 文件头本身没有必填字段；单个 `File` 解码失败只跳过该文件。
pub fn build_header(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
    skipped: &mut Vec<DecodeError>,
) -> Header {
    let fields = Fields::new(record, tags::HEADER.tag);
    let meta = ids.child(tags::HEADER, parent);
    let id = meta.id;
    let files = fields
        .children(tags::FILE.tag)
        .into_iter()
        .filter_map(|file| keep_or_skip(build_header_file(ids, id, file), skipped))
        .collect();
    Header { meta, files }
}

pub fn build_header_file(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<HeaderFile, DecodeError> {
    let fields = Fields::new(record, tags::FILE.tag);
    let meta = ids.child(tags::FILE, parent);
    let id = meta.id;
    let is_external = fields.bool_or("@isExternal", true)?;
    let date = fields.optional_timestamp(tags::DATE.tag)?;
    Ok(HeaderFile {
        ifc_project: ids.field(tags::IFC_PROJECT, id, fields.text_or("@IfcProject", "")),
        ifc_spatial_structure_element: ids.field(
            tags::IFC_SPATIAL_STRUCTURE_ELEMENT,
            id,
            fields.text_or("@IfcSpatialStructureElement", ""),
        ),
        is_external: ids.field(tags::IS_EXTERNAL, id, is_external),
        filename: ids.field(tags::FILENAME, id, fields.text_or(tags::FILENAME.tag, "")),
        date: ids.field(tags::DATE, id, date),
        reference: ids.field(tags::REFERENCE, id, fields.optional_uri(tags::REFERENCE.tag)),
        meta,
    })
}

/// 视点引用。索引缺省为 `-1`，与显式的 `0` 区分。
pub fn build_viewpoint_reference(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<ViewpointReference, DecodeError> {
    let fields = Fields::new(record, tags::VIEWPOINTS.tag);
    let meta = ids.child(tags::VIEWPOINTS, parent);
    let id = meta.id;
    let guid = fields.required_uuid("@Guid")?;
    let index = fields.i32_or(tags::INDEX.tag, UNSPECIFIED_INDEX)?;
    Ok(ViewpointReference {
        guid: ids.field(tags::GUID, id, guid),
        file: ids.field(tags::VIEWPOINT, id, fields.optional_uri(tags::VIEWPOINT.tag)),
        snapshot: ids.field(tags::SNAPSHOT, id, fields.optional_uri(tags::SNAPSHOT.tag)),
        index: ids.field(tags::INDEX, id, index),
        viewpoint: None,
        meta,
    })
}

/// 视点文件（`VisualizationInfo` 根元素），挂到 `parent` 指定的视点引用下。
///
/// 两种相机同时出现时返回 [`DecodeError::ConflictingCameras`]，整个视点被拒绝。
pub fn build_viewpoint(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<Viewpoint, DecodeError> {
    let fields = Fields::new(record, tags::VISUALIZATION_INFO.tag);
    let meta = ids.child(tags::VISUALIZATION_INFO, parent);
    let id = meta.id;
    let guid = fields.required_uuid("@Guid")?;

    let components = match fields.child(tags::COMPONENTS.tag) {
        Some(components) => Some(build_components(ids, id, components)?),
        None => None,
    };

    let camera = match (
        fields.child(tags::ORTHOGONAL_CAMERA.tag),
        fields.child(tags::PERSPECTIVE_CAMERA.tag),
    ) {
        (Some(_), Some(_)) => {
            return Err(DecodeError::ConflictingCameras {
                element: tags::VISUALIZATION_INFO.tag,
            });
        }
        (Some(camera), None) => Some(Camera::Orthogonal(build_orthogonal_camera(ids, id, camera)?)),
        (None, Some(camera)) => Some(Camera::Perspective(build_perspective_camera(ids, id, camera)?)),
        (None, None) => None,
    };

    let lines = match fields.child(tags::LINES.tag) {
        Some(lines) => Fields::new(lines, tags::LINES.tag)
            .children(tags::LINE.tag)
            .into_iter()
            .map(|line| build_line(ids, id, line))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    let clipping_planes = match fields.child(tags::CLIPPING_PLANES.tag) {
        Some(planes) => Fields::new(planes, tags::CLIPPING_PLANES.tag)
            .children(tags::CLIPPING_PLANE.tag)
            .into_iter()
            .map(|plane| build_clipping_plane(ids, id, plane))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    let bitmaps = fields
        .children(tags::BITMAP.tag)
        .into_iter()
        .map(|bitmap| build_bitmap(ids, id, bitmap))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Viewpoint {
        guid: ids.field(tags::GUID, id, guid),
        components,
        camera,
        lines,
        clipping_planes,
        bitmaps,
        meta,
    })
}

fn build_orthogonal_camera(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<OrthogonalCamera, DecodeError> {
    let fields = Fields::new(record, tags::ORTHOGONAL_CAMERA.tag);
    let meta = ids.child(tags::ORTHOGONAL_CAMERA, parent);
    let id = meta.id;
    let view_point = fields.required_point(tags::CAMERA_VIEW_POINT.tag)?;
    let direction = fields.required_direction(tags::CAMERA_DIRECTION.tag)?;
    let up_vector = fields.required_direction(tags::CAMERA_UP_VECTOR.tag)?;
    let scale = fields.required_f64(tags::VIEW_TO_WORLD_SCALE.tag)?;
    Ok(OrthogonalCamera {
        view_point: ids.field(tags::CAMERA_VIEW_POINT, id, view_point),
        direction: ids.field(tags::CAMERA_DIRECTION, id, direction),
        up_vector: ids.field(tags::CAMERA_UP_VECTOR, id, up_vector),
        view_to_world_scale: ids.field(tags::VIEW_TO_WORLD_SCALE, id, scale),
        meta,
    })
}

fn build_perspective_camera(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<PerspectiveCamera, DecodeError> {
    let fields = Fields::new(record, tags::PERSPECTIVE_CAMERA.tag);
    let meta = ids.child(tags::PERSPECTIVE_CAMERA, parent);
    let id = meta.id;
    let view_point = fields.required_point(tags::CAMERA_VIEW_POINT.tag)?;
    let direction = fields.required_direction(tags::CAMERA_DIRECTION.tag)?;
    let up_vector = fields.required_direction(tags::CAMERA_UP_VECTOR.tag)?;
    let field_of_view = fields.required_f64(tags::FIELD_OF_VIEW.tag)?;
    Ok(PerspectiveCamera {
        view_point: ids.field(tags::CAMERA_VIEW_POINT, id, view_point),
        direction: ids.field(tags::CAMERA_DIRECTION, id, direction),
        up_vector: ids.field(tags::CAMERA_UP_VECTOR, id, up_vector),
        field_of_view: ids.field(tags::FIELD_OF_VIEW, id, field_of_view),
        meta,
    })
}

/// 构件集合。`Coloring` 段内没有 `Color` 属性或颜色为空的条目不会生成着色对象，
/// 段本身存在时结果为 `Some`，哪怕列表为空。
pub fn build_components(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<Components, DecodeError> {
    let fields = Fields::new(record, tags::COMPONENTS.tag);
    let meta = ids.child(tags::COMPONENTS, parent);
    let id = meta.id;

    let view_setup_hints = match fields.child(tags::VIEW_SETUP_HINTS.tag) {
        Some(hints) => Some(build_view_setup_hints(ids, id, hints)?),
        None => None,
    };
    let selection = match fields.child(tags::SELECTION.tag) {
        Some(selection) => build_component_list(ids, id, selection, tags::SELECTION.tag),
        None => Vec::new(),
    };
    let visibility = build_visibility(ids, id, fields.required_child(tags::VISIBILITY.tag)?)?;
    let coloring = match fields.child(tags::COLORING.tag) {
        Some(coloring) => {
            let mut entries = Vec::new();
            for entry in Fields::new(coloring, tags::COLORING.tag).children(tags::COLOR_ENTRY.tag) {
                let entry_fields = Fields::new(entry, tags::COLOR_ENTRY.tag);
                let Some(color) = entry_fields
                    .text("@Color")
                    .map(str::trim)
                    .filter(|color| !color.is_empty())
                else {
                    continue;
                };
                let entry_meta = ids.child(tags::COLOR_ENTRY, id);
                let entry_id = entry_meta.id;
                let color = ids.field(tags::COLOR, entry_id, color.to_string());
                let components = entry_fields
                    .children(tags::COMPONENT.tag)
                    .into_iter()
                    .map(|component| build_component(ids, entry_id, component))
                    .collect();
                entries.push(ComponentColoring {
                    meta: entry_meta,
                    color,
                    components,
                });
            }
            Some(entries)
        }
        None => None,
    };

    Ok(Components {
        meta,
        view_setup_hints,
        selection,
        visibility,
        coloring,
    })
}

fn build_view_setup_hints(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<ViewSetupHints, DecodeError> {
    let fields = Fields::new(record, tags::VIEW_SETUP_HINTS.tag);
    let meta = ids.child(tags::VIEW_SETUP_HINTS, parent);
    let id = meta.id;
    let spaces = fields.bool_or("@SpacesVisible", false)?;
    let boundaries = fields.bool_or("@SpaceBoundariesVisible", false)?;
    let openings = fields.bool_or("@OpeningsVisible", false)?;
    Ok(ViewSetupHints {
        spaces_visible: ids.field(tags::SPACES_VISIBLE, id, spaces),
        space_boundaries_visible: ids.field(tags::SPACE_BOUNDARIES_VISIBLE, id, boundaries),
        openings_visible: ids.field(tags::OPENINGS_VISIBLE, id, openings),
        meta,
    })
}

fn build_visibility(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<Visibility, DecodeError> {
    let fields = Fields::new(record, tags::VISIBILITY.tag);
    let meta = ids.child(tags::VISIBILITY, parent);
    let id = meta.id;
    let default_visibility = fields.bool_or("@DefaultVisibility", true)?;
    let exceptions = match fields.child(tags::EXCEPTIONS.tag) {
        Some(exceptions) => build_component_list(ids, id, exceptions, tags::EXCEPTIONS.tag),
        None => Vec::new(),
    };
    Ok(Visibility {
        default_visibility: ids.field(tags::DEFAULT_VISIBILITY, id, default_visibility),
        exceptions,
        meta,
    })
}

fn build_component_list(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
    element: &'static str,
) -> Vec<Component> {
    Fields::new(record, element)
        .children(tags::COMPONENT.tag)
        .into_iter()
        .map(|component| build_component(ids, parent, component))
        .collect()
}

/// 构件引用没有必填字段，因此不会失败。
pub fn build_component(ids: &mut NodeIds, parent: NodeId, record: &Record) -> Component {
    let fields = Fields::new(record, tags::COMPONENT.tag);
    let meta = ids.child(tags::COMPONENT, parent);
    let id = meta.id;
    Component {
        ifc_guid: ids.field(
            tags::IFC_GUID,
            id,
            fields.text("@IfcGuid").map(str::to_string),
        ),
        originating_system: ids.field(
            tags::ORIGINATING_SYSTEM,
            id,
            fields.text_or(tags::ORIGINATING_SYSTEM.tag, ""),
        ),
        authoring_tool_id: ids.field(
            tags::AUTHORING_TOOL_ID,
            id,
            fields.text_or(tags::AUTHORING_TOOL_ID.tag, ""),
        ),
        meta,
    }
}

fn build_line(ids: &mut NodeIds, parent: NodeId, record: &Record) -> Result<Line, DecodeError> {
    let fields = Fields::new(record, tags::LINE.tag);
    let meta = ids.child(tags::LINE, parent);
    let id = meta.id;
    let start = fields.required_point(tags::START_POINT.tag)?;
    let end = fields.required_point(tags::END_POINT.tag)?;
    Ok(Line {
        start: ids.field(tags::START_POINT, id, start),
        end: ids.field(tags::END_POINT, id, end),
        meta,
    })
}

fn build_clipping_plane(
    ids: &mut NodeIds,
    parent: NodeId,
    record: &Record,
) -> Result<ClippingPlane, DecodeError> {
    let fields = Fields::new(record, tags::CLIPPING_PLANE.tag);
    let meta = ids.child(tags::CLIPPING_PLANE, parent);
    let id = meta.id;
    let location = fields.required_point(tags::LOCATION.tag)?;
    let direction = fields.required_direction(tags::DIRECTION.tag)?;
    Ok(ClippingPlane {
        location: ids.field(tags::LOCATION, id, location),
        direction: ids.field(tags::DIRECTION, id, direction),
        meta,
    })
}

fn build_bitmap(ids: &mut NodeIds, parent: NodeId, record: &Record) -> Result<Bitmap, DecodeError> {
    let fields = Fields::new(record, tags::BITMAP.tag);
    let meta = ids.child(tags::BITMAP, parent);
    let id = meta.id;
    let format = BitmapFormat::from_label(fields.required_text(tags::BITMAP_FORMAT.tag)?);
    let reference = fields.required_text(tags::REFERENCE.tag)?.trim().to_string();
    let location = fields.required_point(tags::LOCATION.tag)?;
    let normal = fields.required_direction(tags::NORMAL.tag)?;
    let up = fields.required_direction(tags::UP.tag)?;
    let height = fields.required_f64(tags::HEIGHT.tag)?;
    Ok(Bitmap {
        format: ids.field(tags::BITMAP_FORMAT, id, format),
        reference: ids.field(tags::REFERENCE, id, reference),
        location: ids.field(tags::LOCATION, id, location),
        normal: ids.field(tags::NORMAL, id, normal),
        up: ids.field(tags::UP, id, up),
        height: ids.field(tags::HEIGHT, id, height),
        meta,
    })
}
