use indexmap::IndexMap;

use crate::select::{bare_name, split_alias, Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Leaf,
    Relation,
}

/// Children are keyed by kind plus raw segment, so a column `x` and an
/// expansion `x(...)` are distinct siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub kind: NodeKind,
    pub declaration: String,
}

#[derive(Debug, Clone)]
pub struct SelectNode {
    pub kind: NodeKind,
    /// raw segment, `alias:name!hint`
    pub declaration: String,
    /// segment without alias, `name!hint`
    pub path: String,
    pub alias: Option<String>,
    /// referenced name without alias or hints
    pub name: String,
    pub hinted: bool,
    pub children: IndexMap<NodeKey, usize>,
}

impl SelectNode {
    fn new(kind: NodeKind, segment: &str) -> Self {
        let (alias, path) = split_alias(segment);
        Self {
            kind,
            declaration: segment.to_string(),
            path: path.to_string(),
            alias: alias.map(str::to_string),
            name: bare_name(path).to_string(),
            hinted: path.contains('!'),
            children: IndexMap::new(),
        }
    }

    pub fn is_relation(&self) -> bool {
        self.kind == NodeKind::Relation
    }
}

/// Arena of select nodes. Index `ROOT` is the unnamed top level and every
/// node refers to its children by arena index, in first-insertion order.
#[derive(Debug, Clone)]
pub struct SelectTree {
    nodes: Vec<SelectNode>,
}

impl Default for SelectTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectTree {
    pub const ROOT: usize = 0;

    pub fn new() -> Self {
        Self { nodes: vec![SelectNode::new(NodeKind::Relation, "")] }
    }

    pub fn from_paths(paths: &[Path]) -> Self {
        let mut tree = Self::new();
        for path in paths {
            tree.insert(path);
        }
        tree
    }

    /// Walks the declaration segment by segment, reusing nodes that were
    /// already created. Adding the same declaration twice is a no-op.
    pub fn insert(&mut self, path: &Path) {
        if path.declaration.is_empty() {
            return;
        }

        let segments: Vec<&str> = path.declaration.split('.').collect();
        let last = segments.len() - 1;
        let mut parent = Self::ROOT;
        for (idx, segment) in segments.iter().enumerate() {
            let kind = if idx == last { NodeKind::Leaf } else { NodeKind::Relation };
            parent = self.child(parent, kind, segment);
        }
    }

    fn child(&mut self, parent: usize, kind: NodeKind, segment: &str) -> usize {
        let key = NodeKey { kind, declaration: segment.to_string() };
        if let Some(idx) = self.nodes[parent].children.get(&key) {
            return *idx;
        }

        let idx = self.nodes.len();
        self.nodes.push(SelectNode::new(kind, segment));
        self.nodes[parent].children.insert(key, idx);
        idx
    }

    pub fn node(&self, idx: usize) -> &SelectNode {
        &self.nodes[idx]
    }

    pub fn children(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes[idx].children.values().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[Self::ROOT].children.is_empty()
    }

    /// Unaliased aggregate leaves are never emitted, and neither is a
    /// relation left without any emitted child.
    pub fn is_suppressed(&self, idx: usize) -> bool {
        let node = &self.nodes[idx];
        match node.kind {
            NodeKind::Leaf => node.alias.is_none() && crate::select::is_aggregate_name(&node.path),
            NodeKind::Relation => self.children(idx).all(|child| self.is_suppressed(child)),
        }
    }
}
