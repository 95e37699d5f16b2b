//! # `runtime-preproc`
//!
//! Rewrites a C translation unit so that compile-time `#ifdef`/`#define`
//! variability is re-expressed as runtime variability driven by
//! environment variables read at process startup.
//!
//! ## Architecture
//!
//! * `cst` builds this crate's own concrete syntax tree (an arena of
//!   [`cst::Node`]s) from a `tree-sitter` parse of the input file.
//! * `lower` runs the single lowering pass over that tree
//!   ([`lower::Lowering`]), threading a [`lower::context::LowerContext`]
//!   down and a [`lower::pass::VisitResult`] back up at every node.
//! * `print` renders a (possibly rewritten) tree back to C source.
//! * `graphviz` emits a DOT graph of a tree, for debugging.
//! * `commands` wires the three CLI subcommands to the above.

pub mod commands;
pub mod cst;
pub mod error;
pub mod graphviz;
pub mod lower;
pub mod print;

use error::{RtppError, RtppResult};

/// Parse `source` as a C translation unit into this crate's own CST.
/// Returns a [`RtppError::Parse`] if the parser reports a syntax error
/// anywhere in the tree (spec.md §7 "parse error").
pub fn parse_source(source: &str) -> RtppResult<(cst::Cst, cst::NodeId)> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_c::LANGUAGE.into())
        .expect("tree-sitter-c grammar failed to load");
    let tree = parser.parse(source, None).ok_or_else(|| RtppError::Parse { line: 0, column: 0 })?;
    if tree.root_node().has_error() {
        let (line, column) = first_error_position(&tree);
        return Err(RtppError::Parse { line, column });
    }
    Ok(cst::build(&tree, source))
}

fn first_error_position(tree: &tree_sitter::Tree) -> (usize, usize) {
    let mut cursor = tree.root_node().walk();
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let p = node.start_position();
            return (p.row + 1, p.column + 1);
        }
        stack.extend(node.children(&mut cursor));
    }
    (1, 1)
}

/// Lower `source` and return the rewritten C source text (spec.md §4).
pub fn patch_source(source: &str) -> RtppResult<String> {
    let (mut cst, root) = parse_source(source)?;
    let mut pass = lower::Lowering::new();
    let new_root = pass.run(&mut cst, root)?;
    Ok(print::print_to_string(&cst, new_root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_input_with_a_parse_error() {
        let err = parse_source("int x = ;\n").unwrap_err();
        assert!(matches!(err, RtppError::Parse { .. }));
    }
}
