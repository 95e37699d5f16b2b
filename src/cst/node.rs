//! The CST node model (spec §3).
//!
//! Nodes live in a flat arena (`Cst`); `children` and the (former)
//! `parent` link are indices into it rather than pointers, so rewrites can
//! append new nodes and splice child lists without fighting the borrow
//! checker (Design Notes §9).

use std::fmt;

/// Index into a [`Cst`] arena. Never recycled: rewrites only append.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl NodeId {
    fn new(idx: usize) -> Self {
        Self(idx as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The tag of a [`Node`]. Grammar rule names are kept as the raw
/// tree-sitter kind string rather than one Rust variant per C grammar
/// production: the lowering pass only ever matches a couple dozen of the
/// ~140 rules by name (the rest fall through the default visitor arm
/// unchanged), so a closed enum of all of them would be mostly dead
/// weight. This mirrors how the teacher's own visitors dispatch on
/// `tree_sitter::Node::kind()` string literals directly
/// (`src/lang/applesoft/renumber.rs`, `minifier.rs`) rather than through a
/// hand-rolled tagged union.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// A named grammar rule, e.g. "declaration", "preproc_ifdef".
    Named(Box<str>),
    /// An anonymous token the grammar doesn't name, e.g. punctuation.
    Unnamed(Box<str>),
    /// A synthetic whitespace run inserted by the tree builder.
    Whitespace,
    /// Raw text injected by the lowering pass (prelude, synthesized
    /// assertions, `#define` lines) that has no grammar counterpart.
    Custom,
    /// Stands in for a hoisted variable declaration until it settles in a
    /// non-conditional scope (spec §4.2.3). Payload lives in
    /// `Cst::var_markers`, keyed by this node's id.
    VariableDeclarationMarker,
    /// Stands in for a hoisted `#define` (spec §4.2.4). Payload lives in
    /// `Cst::define_markers`.
    PreprocDefinitionMarker,
}

impl NodeKind {
    pub fn is_marker(&self) -> bool {
        matches!(
            self,
            NodeKind::VariableDeclarationMarker | NodeKind::PreprocDefinitionMarker
        )
    }

    /// The grammar-rule name, if this is a named node from the parser.
    pub fn named(&self) -> Option<&str> {
        match self {
            NodeKind::Named(s) => Some(s),
            _ => None,
        }
    }
}

/// One CST node. See spec §3 for the invariants this type upholds.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    /// Parallel to `children`: `Some(i)` if the child is the `i`-th named
    /// child among its siblings, `None` if it is anonymous/whitespace.
    pub named_child_indices: Vec<Option<u32>>,
    /// Parallel to `children`: the grammar's field name for this child
    /// (e.g. `condition`, `body`, `alternative`), if the grammar names
    /// one. Lets the lowering pass resolve fields the way spec §5 requires
    /// ("named children via grammatical field access ... never by
    /// positional scan" except in well-defined cases).
    pub field_names: Vec<Option<Box<str>>>,
    /// Present iff `children` is empty.
    pub text: Option<String>,
    /// Stable identity of the originating tree-sitter node, for nodes that
    /// came from the parser. `None` on synthesized nodes.
    pub ts_id: Option<usize>,
}

impl Node {
    pub fn leaf(kind: NodeKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            children: Vec::new(),
            named_child_indices: Vec::new(),
            field_names: Vec::new(),
            text: Some(text.into()),
            ts_id: None,
        }
    }

    pub fn whitespace(text: impl Into<String>) -> Self {
        Self::leaf(NodeKind::Whitespace, text)
    }

    pub fn custom(text: impl Into<String>) -> Self {
        Self::leaf(NodeKind::Custom, text)
    }

    pub fn interior(kind: NodeKind, children: Vec<NodeId>, named_child_indices: Vec<Option<u32>>) -> Self {
        debug_assert_eq!(children.len(), named_child_indices.len());
        let field_names = vec![None; children.len()];
        Self {
            kind,
            children,
            named_child_indices,
            field_names,
            text: None,
            ts_id: None,
        }
    }

    pub fn interior_with_fields(
        kind: NodeKind,
        children: Vec<NodeId>,
        named_child_indices: Vec<Option<u32>>,
        field_names: Vec<Option<Box<str>>>,
    ) -> Self {
        debug_assert_eq!(children.len(), named_child_indices.len());
        debug_assert_eq!(children.len(), field_names.len());
        Self {
            kind,
            children,
            named_child_indices,
            field_names,
            text: None,
            ts_id: None,
        }
    }

    pub fn named_child_count(&self) -> usize {
        self.named_child_indices
            .iter()
            .filter(|i| i.is_some())
            .count()
    }

    pub fn is_whitespace_only(&self) -> bool {
        matches!(self.kind, NodeKind::Whitespace)
    }
}

/// Flat arena owning every node produced while rewriting one translation
/// unit. Created fresh per invocation (spec §5); nothing is ever freed.
#[derive(Default)]
pub struct Cst {
    nodes: Vec<Node>,
}

impl Cst {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId::new(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Get the `named_index`-th named child of `id`, if present.
    pub fn named_child(&self, id: NodeId, named_index: u32) -> Option<NodeId> {
        let node = self.get(id);
        node.named_child_indices
            .iter()
            .position(|i| *i == Some(named_index))
            .map(|pos| node.children[pos])
    }

    /// Resolve a grammatical field name (e.g. `condition`, `body`,
    /// `alternative`) to the child node that fills it, if any.
    pub fn child_by_field_name(&self, id: NodeId, field: &str) -> Option<NodeId> {
        let node = self.get(id);
        node.field_names
            .iter()
            .position(|f| f.as_deref() == Some(field))
            .map(|pos| node.children[pos])
    }

    pub fn set_named_child(&mut self, id: NodeId, named_index: u32, new_child: NodeId) {
        let node = self.get_mut(id);
        if let Some(pos) = node
            .named_child_indices
            .iter()
            .position(|i| *i == Some(named_index))
        {
            node.children[pos] = new_child;
        }
    }

    /// Text of a leaf node; empty string for interior nodes (callers
    /// should not ask interior nodes for text, but returning empty keeps
    /// pretty-printing total rather than panicking on malformed input).
    pub fn leaf_text(&self, id: NodeId) -> &str {
        self.get(id).text.as_deref().unwrap_or("")
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.get(id).kind
    }

    /// Is this node (or anything under it) non-whitespace?
    pub fn is_empty_or_whitespace(&self, ids: &[NodeId]) -> bool {
        ids.iter().all(|id| self.get(*id).is_whitespace_only())
    }
}
