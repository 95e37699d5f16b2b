//! Converts a `tree-sitter` parse tree into this crate's [`Cst`] (spec
//! §4.1), grounded on `AstNode.reify` in
//! `original_source/src/rt_preproc/parser/ast.py`: depth-first, inserting
//! `Whitespace` tokens between siblings whose source ranges leave a gap,
//! and after the last child up to the parent's own end point.

use crate::cst::node::{Cst, Node, NodeId, NodeKind};

/// Build a [`Cst`] from a tree-sitter parse tree over `source`.
pub fn build(tree: &tree_sitter::Tree, source: &str) -> (Cst, NodeId) {
    let mut cst = Cst::new();
    let root = reify(&mut cst, tree.root_node(), source);
    (cst, root)
}

fn reify(cst: &mut Cst, ts_node: tree_sitter::Node, source: &str) -> NodeId {
    let kind = if ts_node.is_named() {
        NodeKind::Named(ts_node.kind().into())
    } else {
        NodeKind::Unnamed(ts_node.kind().into())
    };

    let child_count = ts_node.child_count();
    if child_count == 0 {
        let text = ts_node
            .utf8_text(source.as_bytes())
            .unwrap_or_default()
            .to_string();
        let mut node = Node::leaf(kind, text);
        node.ts_id = Some(ts_node.id());
        return cst.alloc(node);
    }

    let mut children = Vec::new();
    let mut field_names: Vec<Option<Box<str>>> = Vec::new();
    let mut cursor = ts_node.walk();
    let ts_children: Vec<tree_sitter::Node> = ts_node.children(&mut cursor).collect();
    let mut prev_end = ts_node.start_position();
    for (i, child) in ts_children.iter().enumerate() {
        if i > 0 {
            let gap_count = push_gap(cst, &mut children, prev_end, child.start_position());
            field_names.extend(std::iter::repeat(None).take(gap_count));
        }
        children.push(reify(cst, *child, source));
        field_names.push(ts_node.field_name_for_child(i as u32).map(Box::from));
        prev_end = child.end_position();
    }
    // trailing whitespace up to the parent's own end
    let gap_count = push_gap(cst, &mut children, prev_end, ts_node.end_position());
    field_names.extend(std::iter::repeat(None).take(gap_count));

    let named_child_indices = assign_named_indices(cst, &children, &ts_children);

    let mut node = Node::interior_with_fields(kind, children, named_child_indices, field_names);
    node.ts_id = Some(ts_node.id());
    cst.alloc(node)
}

/// Emit row-gap newlines, then column-gap spaces, between `prev_end` and
/// `next_start` — same order as the original's `reify`.
/// Returns the number of whitespace nodes pushed (0, 1, or 2).
fn push_gap(
    cst: &mut Cst,
    children: &mut Vec<NodeId>,
    prev_end: tree_sitter::Point,
    next_start: tree_sitter::Point,
) -> usize {
    if prev_end.row < next_start.row {
        children.push(cst.alloc(Node::whitespace("\n".repeat(next_start.row - prev_end.row))));
        if next_start.column > 0 {
            children.push(cst.alloc(Node::whitespace(" ".repeat(next_start.column))));
            return 2;
        }
        1
    } else if prev_end.column < next_start.column {
        children.push(cst.alloc(Node::whitespace(" ".repeat(next_start.column - prev_end.column))));
        1
    } else {
        0
    }
}

/// For each emitted child (original children plus inserted whitespace),
/// compute its position among `ts_node`'s *named* children, matching each
/// by tree-sitter node id.
fn assign_named_indices(
    cst: &Cst,
    children: &[NodeId],
    ts_children: &[tree_sitter::Node],
) -> Vec<Option<u32>> {
    // Build id -> named-index lookup once.
    let named_ids: Vec<usize> = ts_children.iter().filter(|n| n.is_named()).map(|n| n.id()).collect();
    children
        .iter()
        .map(|id| {
            cst.get(*id)
                .ts_id
                .and_then(|ts_id| named_ids.iter().position(|n| *n == ts_id))
                .map(|pos| pos as u32)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> tree_sitter::Tree {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .expect("error loading C grammar");
        parser.parse(src, None).expect("parse failed")
    }

    #[test]
    fn whitespace_is_inserted_between_gapped_siblings() {
        let src = "int x ;\n";
        let tree = parse(src);
        let (cst, root) = build(&tree, src);
        // depth-first search for at least one Whitespace node
        let mut stack = vec![root];
        let mut found = false;
        while let Some(id) = stack.pop() {
            if matches!(cst.kind(id), crate::cst::node::NodeKind::Whitespace) {
                found = true;
                break;
            }
            stack.extend(cst.get(id).children.iter().copied());
        }
        assert!(found, "expected at least one whitespace node for the gaps in `{src}`");
    }

    #[test]
    fn named_child_count_matches_invariant() {
        let src = "int x = 1;\n";
        let tree = parse(src);
        let (cst, root) = build(&tree, src);
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = cst.get(id);
            let declared = node.named_child_count();
            let ts_named = node
                .ts_id
                .and_then(|_| None::<usize>); // not reachable from here without tree; spot check below
            let _ = ts_named;
            assert_eq!(declared, node.named_child_indices.iter().filter(|i| i.is_some()).count());
            stack.extend(node.children.iter().copied());
        }
        // spot check against the real tree for the root
        assert_eq!(cst.get(root).named_child_count(), tree.root_node().named_child_count());
    }
}
