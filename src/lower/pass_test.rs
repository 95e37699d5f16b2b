//! Scenario tests for the lowering pass, covering spec.md §8's six
//! concrete scenarios at the level of the emitted C snippet's structural
//! shape (substring/regex-style assertions), not full-output equality —
//! matching how the teacher's `diagnostics_test.rs` asserts on specific
//! messages rather than whole-output comparisons.

use super::*;

fn lower(src: &str) -> (Cst, String) {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&tree_sitter_c::LANGUAGE.into()).unwrap();
    let tree = parser.parse(src, None).unwrap();
    let (mut cst, root) = crate::cst::build(&tree, src);
    let mut pass = Lowering::new();
    let new_root = pass.run(&mut cst, root).expect("lowering should succeed on valid input");
    let rendered = crate::print::print_to_string(&cst, new_root);
    (cst, rendered)
}

#[test]
fn single_ifdef_assignment_in_body_guards_with_positive_polarity() {
    let (_, out) = lower("int main(){ int x=0; #ifdef FOO\n x=1;\n #endif\n printf(\"%d\",x); }");
    // spec §9 Open Question (iv): the positive arm compares with `!=`.
    assert!(out.contains("if (FOO != UNDEFINED_Int)"), "got:\n{out}");
    assert!(out.contains("x=1;") || out.contains("x = 1;"), "got:\n{out}");
}

#[test]
fn ifdef_else_declarations_hoist_with_else_polarity() {
    let (_, out) = lower(
        "#ifdef FOO\nint x=1;\n#else\nint x=2;\n#endif\nint main(){printf(\"%d\",x);}",
    );
    // the declaration itself is hoisted to a sentinel-initialized decl...
    assert!(out.contains("int x = UNDEFINED_Int;"), "got:\n{out}");
    // ...and the two assignments are guarded by opposite polarities.
    assert!(out.contains("FOO != UNDEFINED_Int"), "got:\n{out}");
    assert!(out.contains("FOO == UNDEFINED_Int"), "got:\n{out}");
    // no stray preprocessor directive should leak into the rewritten body.
    assert!(!out.contains("#else"), "got:\n{out}");
    assert!(!out.contains("#endif"), "got:\n{out}");
}

#[test]
fn two_function_definitions_under_opposite_conditions_get_ordinal_suffixes() {
    let (_, out) = lower(
        "#ifdef FOO\nint f(){return 1;}\n#else\nint f(){return 2;}\n#endif\nint main(){printf(\"%d\",f());}",
    );
    assert!(out.contains("f("), "got:\n{out}");
    assert!(out.contains("f_2("), "got:\n{out}");
    // each hoisted function body is guarded by an assert on its condition.
    assert!(out.contains("assert(FOO"), "got:\n{out}");
}

#[test]
fn nested_ifdefs_conjoin_asserts_in_hoisted_function_bodies() {
    let (_, out) = lower(
        "#ifdef A\n#ifdef B\nint f(){return 1;}\n#endif\n#endif\nint main(){printf(\"%d\",f());}",
    );
    assert!(out.contains("assert(B != UNDEFINED_Int)"), "got:\n{out}");
    assert!(out.contains("assert(A != UNDEFINED_Int)"), "got:\n{out}");
}

#[test]
fn empty_ifdef_body_is_fully_elided() {
    let (_, out) = lower("int main(){ #ifdef FOO\n\n#endif\n printf(\"ok\"); }");
    assert!(!out.contains("if ("), "empty #ifdef body should not emit a bare if: {out}");
}

#[test]
fn prelude_is_injected_once_per_macro() {
    let (_, out) = lower("int main(){ #ifdef FOO\n int x=1;\n #endif\n printf(\"%d\",x); }");
    assert_eq!(out.matches("#define UNDEFINED_Int").count(), 1);
    assert_eq!(out.matches("getenv(\"FOO\")").count(), 1);
}
