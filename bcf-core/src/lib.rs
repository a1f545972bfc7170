pub mod changes;
pub mod document;

pub mod geometry {
    use glam::DVec3;
    use serde::Serialize;

    /// 三维点，内部以 `glam::DVec3` 表示，对应视点文件中的 X/Y/Z 三元组。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维方向向量（相机朝向、法向等），不强制单位化。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
    pub struct Direction(pub DVec3);

    impl Direction {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Direction {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }
}

pub mod node {
    use serde::Serialize;

    /// 文档树内的节点编号，由 [`NodeIds`] 顺序分配，仅在一次加载内唯一。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
    pub struct NodeId(u64);

    impl NodeId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 节点的变更状态，驱动写出端的增量序列化。
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
    pub enum MutationState {
        #[default]
        Original,
        Added,
        Modified,
        Deleted,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub enum XmlKind {
        Element,
        Attribute,
    }

    /// 节点在输出文档中的身份：标签名加上它是元素还是属性。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct XmlName {
        pub tag: &'static str,
        pub kind: XmlKind,
    }

    impl XmlName {
        #[inline]
        pub const fn element(tag: &'static str) -> Self {
            Self {
                tag,
                kind: XmlKind::Element,
            }
        }

        #[inline]
        pub const fn attribute(tag: &'static str) -> Self {
            Self {
                tag,
                kind: XmlKind::Attribute,
            }
        }
    }

    /// 每个节点（复合实体或叶子值）都携带的能力记录。
    ///
    /// `parent` 只保存父节点编号，不持有父节点本身；根节点（项目）为 `None`，
    /// 其余节点在构建完成后必须为 `Some`。`state` 只描述节点自身，
    /// 子节点的状态需要通过 [`walk`] 单独汇总。
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct NodeMeta {
        pub id: NodeId,
        pub name: XmlName,
        pub parent: Option<NodeId>,
        pub state: MutationState,
    }

    impl NodeMeta {
        #[inline]
        pub fn root(id: NodeId, name: XmlName) -> Self {
            Self {
                id,
                name,
                parent: None,
                state: MutationState::Original,
            }
        }

        #[inline]
        pub fn child(id: NodeId, name: XmlName, parent: NodeId) -> Self {
            Self {
                id,
                name,
                parent: Some(parent),
                state: MutationState::Original,
            }
        }

        #[inline]
        pub fn with_state(mut self, state: MutationState) -> Self {
            self.state = state;
            self
        }

        #[inline]
        pub fn is_original(&self) -> bool {
            self.state == MutationState::Original
        }

        #[inline]
        pub fn is_deleted(&self) -> bool {
            self.state == MutationState::Deleted
        }

        /// 记录一次修改。新增节点保持 `Added`，已删除节点不再变化。
        pub fn mark_modified(&mut self) {
            if self.state == MutationState::Original {
                self.state = MutationState::Modified;
            }
        }

        #[inline]
        pub fn mark_deleted(&mut self) {
            self.state = MutationState::Deleted;
        }
    }

    /// 节点编号分配器。
    #[derive(Debug, Clone, Default, PartialEq, Serialize)]
    pub struct NodeIds {
        next: u64,
    }

    impl NodeIds {
        #[inline]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn next_id(&mut self) -> NodeId {
            let id = NodeId::new(self.next);
            self.next += 1;
            id
        }

        pub fn root(&mut self, name: XmlName) -> NodeMeta {
            NodeMeta::root(self.next_id(), name)
        }

        pub fn child(&mut self, name: XmlName, parent: NodeId) -> NodeMeta {
            NodeMeta::child(self.next_id(), name, parent)
        }

        /// 以 `Added` 状态创建子节点元数据，供编辑层插入新节点使用。
        pub fn added(&mut self, name: XmlName, parent: NodeId) -> NodeMeta {
            self.child(name, parent).with_state(MutationState::Added)
        }

        pub fn field<T>(&mut self, name: XmlName, parent: NodeId, value: T) -> Field<T> {
            Field::new(self.child(name, parent), value)
        }

        pub fn added_field<T>(&mut self, name: XmlName, parent: NodeId, value: T) -> Field<T> {
            Field::new(self.added(name, parent), value)
        }
    }

    /// 叶子值包装：简单元素或属性，自带标签名、父节点与变更状态。
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct Field<T> {
        pub meta: NodeMeta,
        pub value: T,
    }

    impl<T> Field<T> {
        #[inline]
        pub fn new(meta: NodeMeta, value: T) -> Self {
            Self { meta, value }
        }

        #[inline]
        pub fn get(&self) -> &T {
            &self.value
        }

        #[inline]
        pub fn state(&self) -> MutationState {
            self.meta.state
        }

        /// 替换值并把状态推进到 `Modified`。
        pub fn set(&mut self, value: T) {
            self.value = value;
            self.meta.mark_modified();
        }
    }

    /// 文档树节点。只需暴露元数据与直接子节点，其余行为由自由函数完成。
    pub trait Node {
        fn meta(&self) -> &NodeMeta;

        fn for_each_child<'a>(&'a self, _visit: &mut dyn FnMut(&'a dyn Node)) {}
    }

    impl<T> Node for Field<T> {
        fn meta(&self) -> &NodeMeta {
            &self.meta
        }
    }

    /// 先序遍历 `node` 及其全部后代。
    pub fn walk<'a>(node: &'a dyn Node, visit: &mut dyn FnMut(&'a dyn Node)) {
        visit(node);
        node.for_each_child(&mut |child| walk(child, &mut *visit));
    }

}
