//! DOT graph emission for the `graphviz` subcommand (spec.md §6),
//! grounded on `GraphVizVisitor` in
//! `original_source/src/rt_preproc/visitors/graphviz.py`: one node per
//! CST node, colored by grammar kind, edges from parent to named child.

use crate::cst::{Cst, NodeId, NodeKind};

/// Grammar-kind to colorscheme index, lifted from the original's
/// `type_name_to_color` table (colorscheme `pastel19`, 9 colors).
fn color_for_kind(kind: &str) -> Option<u8> {
    match kind {
        "preproc_call" => Some(4),
        "preproc_def" => Some(2),
        "preproc_defined" => Some(2),
        "preproc_elif" => Some(2),
        "preproc_else" => Some(2),
        "preproc_function_def" => Some(3),
        "preproc_if" => Some(2),
        "preproc_ifdef" => Some(2),
        "preproc_include" => Some(3),
        "preproc_params" => Some(1),
        "return_statement" => Some(1),
        "identifier" => Some(4),
        "null" => Some(1),
        "number_literal" => Some(5),
        "preproc_arg" => Some(2),
        "preproc_directive" => Some(2),
        "primitive_type" => Some(6),
        "system_lib_string" => Some(7),
        "string_content" => Some(5),
        "true" => Some(8),
        "type_identifier" => Some(9),
        _ => None,
    }
}

fn node_label(cst: &Cst, id: NodeId) -> String {
    match cst.kind(id) {
        NodeKind::Named(k) => k.to_string(),
        NodeKind::Unnamed(k) => format!("\"{k}\""),
        NodeKind::Whitespace => "Whitespace".to_string(),
        NodeKind::Custom => "Custom".to_string(),
        NodeKind::VariableDeclarationMarker => "VariableDeclarationMarker".to_string(),
        NodeKind::PreprocDefinitionMarker => "PreprocDefinitionMarker".to_string(),
    }
}

fn escape_label(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Render the whole CST rooted at `root` as a DOT `digraph`.
pub fn render(cst: &Cst, root: NodeId) -> String {
    let mut buf = String::new();
    buf.push_str("digraph Program {\n");
    buf.push_str("node [shape=box, colorscheme=pastel19];\n");
    emit_node(cst, root, None, &mut buf);
    buf.push_str("}\n");
    buf
}

fn emit_node(cst: &Cst, id: NodeId, parent: Option<NodeId>, buf: &mut String) {
    let label = node_label(cst, id);
    let styler = color_for_kind(&label)
        .map(|c| format!("style=filled color={c}"))
        .unwrap_or_default();
    let text_label = match cst.get(id).text.as_deref() {
        Some(t) if cst.get(id).children.is_empty() => {
            format!("<<TABLE><TR><TD>{label}</TD></TR><TR><TD>{}</TD></TR></TABLE>>", escape_label(t))
        }
        _ => format!("\"{label}\""),
    };
    buf.push_str(&format!("\"{}\" [{styler} label={text_label}];\n", node_key(id)));
    if let Some(p) = parent {
        buf.push_str(&format!("\t\"{}\" -> \"{}\";\n", node_key(p), node_key(id)));
    }
    buf.push_str(&format!("subgraph \"cluster_{}\" {{\n", node_key(id)));
    for &child in &cst.get(id).children {
        if !cst.get(child).is_whitespace_only() {
            emit_node(cst, child, Some(id), buf);
        }
    }
    buf.push_str("}\n");
}

fn node_key(id: NodeId) -> String {
    format!("{id:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_digraph_wrapper() {
        let src = "int x = 1;\n";
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&tree_sitter_c::LANGUAGE.into()).unwrap();
        let tree = parser.parse(src, None).unwrap();
        let (cst, root) = crate::cst::build(&tree, src);
        let dot = render(&cst, root);
        assert!(dot.starts_with("digraph Program {\n"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
