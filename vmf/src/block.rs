use std::fmt;

use crate::value::Value;

/// Block categories the format defines. Anything else is carried through as
/// `Unknown` with its original keyword so it round-trips untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    VersionInfo,
    VisGroups,
    Visgroup,
    ViewSettings,
    World,
    Solid,
    Side,
    Editor,
    Entity,
    Connections,
    Group,
    Cameras,
    Camera,
    Cordon,
    DispInfo,
    Hidden,
    Normals,
    Distances,
    Offsets,
    OffsetNormals,
    Alphas,
    TriangleTags,
    AllowedVerts,
    Unknown(String),
}

impl BlockKind {
    pub fn from_keyword(keyword: &str) -> BlockKind {
        match keyword {
            "versioninfo" => BlockKind::VersionInfo,
            "visgroups" => BlockKind::VisGroups,
            "visgroup" => BlockKind::Visgroup,
            "viewsettings" => BlockKind::ViewSettings,
            "world" => BlockKind::World,
            "solid" => BlockKind::Solid,
            "side" => BlockKind::Side,
            "editor" => BlockKind::Editor,
            "entity" => BlockKind::Entity,
            "connections" => BlockKind::Connections,
            "group" => BlockKind::Group,
            "cameras" => BlockKind::Cameras,
            "camera" => BlockKind::Camera,
            "cordon" => BlockKind::Cordon,
            "dispinfo" => BlockKind::DispInfo,
            "hidden" => BlockKind::Hidden,
            "normals" => BlockKind::Normals,
            "distances" => BlockKind::Distances,
            "offsets" => BlockKind::Offsets,
            "offset_normals" => BlockKind::OffsetNormals,
            "alphas" => BlockKind::Alphas,
            "triangle_tags" => BlockKind::TriangleTags,
            "allowed_verts" => BlockKind::AllowedVerts,
            other => BlockKind::Unknown(other.to_string()),
        }
    }

    pub fn keyword(&self) -> &str {
        match self {
            BlockKind::VersionInfo => "versioninfo",
            BlockKind::VisGroups => "visgroups",
            BlockKind::Visgroup => "visgroup",
            BlockKind::ViewSettings => "viewsettings",
            BlockKind::World => "world",
            BlockKind::Solid => "solid",
            BlockKind::Side => "side",
            BlockKind::Editor => "editor",
            BlockKind::Entity => "entity",
            BlockKind::Connections => "connections",
            BlockKind::Group => "group",
            BlockKind::Cameras => "cameras",
            BlockKind::Camera => "camera",
            BlockKind::Cordon => "cordon",
            BlockKind::DispInfo => "dispinfo",
            BlockKind::Hidden => "hidden",
            BlockKind::Normals => "normals",
            BlockKind::Distances => "distances",
            BlockKind::Offsets => "offsets",
            BlockKind::OffsetNormals => "offset_normals",
            BlockKind::Alphas => "alphas",
            BlockKind::TriangleTags => "triangle_tags",
            BlockKind::AllowedVerts => "allowed_verts",
            BlockKind::Unknown(keyword) => keyword,
        }
    }

    /// Displacement sub-blocks whose properties are bare vector rows.
    pub fn has_vector_rows(&self) -> bool {
        matches!(
            self,
            BlockKind::Normals | BlockKind::Offsets | BlockKind::OffsetNormals
        )
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// One (name, value) pair. Properties are an ordered sequence, not a map:
/// duplicate keys are legal and order is preserved on write.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Value,
}

/// One nested block: ordered properties plus exclusively-owned child blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub properties: Vec<Property>,
    pub children: Vec<Block>,
    /// Index of the numeric `id` property, when present.
    id_index: Option<usize>,
}

impl Block {
    pub fn new(kind: BlockKind) -> Block {
        Block {
            kind,
            properties: Vec::new(),
            children: Vec::new(),
            id_index: None,
        }
    }

    /// Append a property, tracking the `id` index for O(1) access.
    pub fn push_property(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if key == "id" && matches!(value, Value::Number(_)) {
            self.id_index = Some(self.properties.len());
        }
        self.properties.push(Property { key, value });
    }

    /// This block's numeric id, or 0 when it has none.
    pub fn id(&self) -> i64 {
        self.id_index
            .and_then(|i| self.properties[i].value.as_number())
            .map(|n| n as i64)
            .unwrap_or(0)
    }

    /// Shift this block's own id. Blocks without an id are left alone.
    pub fn offset_id(&mut self, offset: i64) {
        if let Some(i) = self.id_index {
            if let Value::Number(n) = &mut self.properties[i].value {
                *n += offset as f64;
            }
        }
    }

    /// First value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| &p.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.properties.iter().any(|p| p.key == key)
    }

    /// The entity class name, rendered to text.
    pub fn class_name(&self) -> Option<String> {
        self.get("classname").map(|v| v.to_string())
    }

    pub fn find_child(&self, kind: &BlockKind) -> Option<&Block> {
        self.children.iter().find(|c| &c.kind == kind)
    }

    pub fn find_child_mut(&mut self, kind: &BlockKind) -> Option<&mut Block> {
        self.children.iter_mut().find(|c| &c.kind == kind)
    }

    /// Largest `id` in this subtree.
    pub fn max_id(&self) -> i64 {
        let mut max = self.id();
        for child in &self.children {
            max = max.max(child.max_id());
        }
        max
    }

    /// Largest `nodeid` in this subtree. Tracked separately from `id`:
    /// navigation nodes number themselves from their own sequence.
    pub fn max_node_id(&self) -> i64 {
        let mut max = self
            .get("nodeid")
            .and_then(Value::as_number)
            .map(|n| n as i64)
            .unwrap_or(0);
        for child in &self.children {
            max = max.max(child.max_node_id());
        }
        max
    }

    /// Depth-first traversal of this block and every descendant.
    pub fn walk(&self, visit: &mut dyn FnMut(&Block)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}
