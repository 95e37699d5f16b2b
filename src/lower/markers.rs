//! Marker nodes and their materialization (spec §4.2.3, §4.2.4; "Markers
//! → real-nodes" in spec §2 item 6).
//!
//! Grounded on `ast_ext.py`'s `Marker` hierarchy and `patch.py`'s
//! `update_if_marker`. A marker's kind lives on the `Node` itself
//! (`NodeKind::VariableDeclarationMarker` / `PreprocDefinitionMarker`);
//! its payload (the descriptor it carries) lives in a side table here,
//! since the arena's `Node` has no room for a typed payload and giving it
//! one would force every other node kind to carry the same enum.

use std::collections::HashMap;

use crate::cst::{Cst, Node, NodeId, NodeKind};
use crate::lower::symbols::{DefDecl, VarDecl};

pub enum MarkerPayload {
    Variable(VarDecl),
    Define(DefDecl),
}

/// Side table from marker `NodeId` to its payload.
#[derive(Default)]
pub struct MarkerTable {
    payloads: HashMap<NodeId, MarkerPayload>,
}

impl MarkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_variable_marker(&mut self, cst: &mut Cst, decl: VarDecl) -> NodeId {
        let id = cst.alloc(Node::interior(NodeKind::VariableDeclarationMarker, vec![], vec![]));
        self.payloads.insert(id, MarkerPayload::Variable(decl));
        id
    }

    pub fn make_define_marker(&mut self, cst: &mut Cst, decl: DefDecl) -> NodeId {
        let id = cst.alloc(Node::interior(NodeKind::PreprocDefinitionMarker, vec![], vec![]));
        self.payloads.insert(id, MarkerPayload::Define(decl));
        id
    }

    /// If `id` is a marker, materialize it into a real declaration or
    /// `#define` line node and return that; otherwise return `id`
    /// unchanged (spec §4.2.3/4.2.4: "at scope boundary ... becomes ...").
    pub fn materialize(&self, cst: &mut Cst, id: NodeId) -> NodeId {
        if !cst.kind(id).is_marker() {
            return id;
        }
        match self.payloads.get(&id) {
            Some(MarkerPayload::Variable(decl)) => materialize_var_decl(cst, decl),
            Some(MarkerPayload::Define(decl)) => cst.alloc(Node::custom(decl.to_define_line())),
            None => id,
        }
    }
}

fn materialize_var_decl(cst: &mut Cst, decl: &VarDecl) -> NodeId {
    let name = if decl.ordinal > 1 {
        format!("{}_{}", decl.name, decl.ordinal)
    } else {
        decl.name.clone()
    };
    let text = format!("{} {} = {};\n", decl.c_type, name, decl.sentinel);
    cst.alloc(Node::custom(text))
}
