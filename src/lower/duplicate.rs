//! Multiversal duplication (spec §4.2.6, glossary "Multiversal
//! duplication"): cloning a statement across every combination of the
//! variants of the identifiers it references, wrapped in an `if`/`else
//! if`/`else { assert(0); }` chain that selects the right clone at
//! runtime.
//!
//! Ported from `build_rename_dict` and `multiversal_duplication` in
//! `original_source/src/rt_preproc/visitors/patch/patch.py`.

use std::collections::HashSet;

use crate::cst::{Cst, Node, NodeId, NodeKind};
use crate::lower::context::{ConditionSet, LowerContext};
use crate::lower::symbols::SymbolTracker;

/// One candidate rename of an identifier: the name to substitute plus the
/// subset of the ambient macro conditions not already implied by the
/// current context (the "remainder" condition set).
#[derive(Clone, Debug)]
pub struct RenameCandidate {
    pub name: String,
    pub orig_name: String,
    pub remainder: ConditionSet,
}

/// An insertion-ordered map from identifier to its candidate list. A plain
/// `HashMap` would let `multiversal_duplication`'s if-chain arm order vary
/// from run to run (spec §5 "completes deterministically"), since
/// `HashMap` iteration order is randomized per-map; a `Vec` of pairs keeps
/// the order `build_rename_dict` inserted entries in, and callers feed it
/// identifiers pre-sorted so that order is itself deterministic.
pub type RenameDict = Vec<(String, Vec<RenameCandidate>)>;

/// Build the rename dictionary for a set of referenced identifiers: each
/// identifier with macro-conditional variants (variable, function, or
/// `#define`) maps to its list of candidates, restricted to the macro
/// conditions not already on the ambient context stack (spec §4.2.6).
///
/// `idents` is a `HashSet`, so it is sorted before use here — otherwise
/// the dict's key order (and so the emitted if-chain's arm order, for a
/// statement referencing more than one ambiguous identifier) would vary
/// with that set's randomized iteration order between runs.
pub fn build_rename_dict(ctx: &LowerContext, symbols: &SymbolTracker, idents: &HashSet<String>) -> RenameDict {
    let ambient: ConditionSet = ctx.condition_set();
    let mut dict: RenameDict = RenameDict::new();

    let mut sorted_idents: Vec<&String> = idents.iter().collect();
    sorted_idents.sort();

    for ident in &sorted_idents {
        let ident = ident.as_str();
        if let Some(decls) = symbols.var_decls.get(ident) {
            for (i, decl) in decls.iter().enumerate() {
                push_candidate(&mut dict, ident, i, &decl.condition_set, &ambient);
            }
        }
    }
    for ident in &sorted_idents {
        let ident = ident.as_str();
        if let Some(decls) = symbols.functions.get(ident) {
            for (i, decl) in decls.iter().enumerate() {
                push_candidate(&mut dict, ident, i, &decl.condition_set, &ambient);
            }
        }
    }
    // `#define`s aren't restricted to the referenced-identifier set in the
    // original (it scans every known define unconditionally); we mirror
    // that rather than narrowing it, since a `#define`d name can appear
    // free of any `Identifier` node (e.g. only inside another macro body).
    // `symbols.defines` is a `HashMap` too, so its keys are sorted for the
    // same reason `idents` is above.
    let mut define_names: Vec<&String> = symbols.defines.keys().collect();
    define_names.sort();
    for orig_name in define_names {
        let orig_name = orig_name.as_str();
        let decls = &symbols.defines[orig_name];
        for (i, decl) in decls.iter().enumerate() {
            push_candidate(&mut dict, orig_name, i, &decl.condition_set, &ambient);
        }
    }

    dict
}

fn push_candidate(
    dict: &mut RenameDict,
    ident: &str,
    ordinal_index: usize,
    condition_set: &ConditionSet,
    ambient: &ConditionSet,
) {
    let remainder: ConditionSet = condition_set.difference(ambient).cloned().collect();
    let name = if ordinal_index > 0 {
        format!("{}_{}", ident, ordinal_index + 1)
    } else {
        ident.to_string()
    };
    let candidate = RenameCandidate { name, orig_name: ident.to_string(), remainder };
    match dict.iter_mut().find(|(k, _)| k.as_str() == ident) {
        Some((_, candidates)) => candidates.push(candidate),
        None => dict.push((ident.to_string(), vec![candidate])),
    }
}

/// True iff every candidate in `dict` has an empty remainder — i.e. no
/// runtime branch is needed at all.
pub fn is_unambiguous(dict: &RenameDict) -> bool {
    dict.iter().all(|(_, candidates)| candidates.iter().all(|c| c.remainder.is_empty()))
}

/// Clone `node` once per element of the Cartesian product of `dict`'s
/// candidate lists, substituting identifiers per the chosen combination
/// and wrapping each clone in a guarded `if`/`else if` arm, closed by
/// `else { assert(0); }` (spec §4.2.6). Returns `None` if `dict` implies
/// no variability (caller should use `node` unchanged in that case).
pub fn multiversal_duplication(cst: &mut Cst, node: NodeId, dict: &RenameDict) -> Option<NodeId> {
    if dict.is_empty() || is_unambiguous(dict) {
        return None;
    }

    let lists: Vec<&Vec<RenameCandidate>> = dict.iter().map(|(_, candidates)| candidates).collect();

    let mut arms = Vec::new();
    for combination in cartesian_product(&lists) {
        let cloned = deep_clone(cst, node);
        for candidate in &combination {
            if candidate.name != candidate.orig_name {
                replace_identifier(cst, cloned, &candidate.orig_name, &candidate.name);
            }
        }
        let guard = render_guard(&combination);
        arms.push((guard, cloned));
    }

    Some(render_if_else_chain(cst, arms))
}

fn cartesian_product<'a>(lists: &[&'a Vec<RenameCandidate>]) -> Vec<Vec<&'a RenameCandidate>> {
    let mut result: Vec<Vec<&RenameCandidate>> = vec![Vec::new()];
    for list in lists {
        let mut next = Vec::new();
        for partial in &result {
            for candidate in list.iter() {
                let mut combo = partial.clone();
                combo.push(candidate);
                next.push(combo);
            }
        }
        result = next;
    }
    result
}

fn render_guard(combination: &[&RenameCandidate]) -> String {
    let mut conds: Vec<String> = Vec::new();
    for candidate in combination {
        for cond in &candidate.remainder {
            conds.push(format!(
                "{} {} {}",
                cond.name,
                cond.polarity.comparator(),
                cond.ty.sentinel_name()
            ));
        }
    }
    if conds.is_empty() {
        "1".to_string()
    } else {
        conds.join(" && ")
    }
}

fn render_if_else_chain(cst: &mut Cst, arms: Vec<(String, NodeId)>) -> NodeId {
    let mut text = String::new();
    for (i, (guard, _)) in arms.iter().enumerate() {
        if i == 0 {
            text.push_str(&format!("if ({}) {{\n", guard));
        } else {
            text.push_str(&format!("else if ({}) {{\n", guard));
        }
        // body placeholder filled below by splicing the clone node in
        text.push_str("__RTPP_BODY__\n}\n");
    }
    text.push_str("else { assert(0); }\n");

    // Build as an interior node: alternating Custom-text fragments and
    // cloned body nodes, split on the placeholder.
    let mut children = Vec::new();
    let mut named = Vec::new();
    let mut rest = text.as_str();
    for (_, body) in &arms {
        let (before, after) = rest.split_once("__RTPP_BODY__\n").expect("placeholder present");
        children.push(cst.alloc(Node::custom(before)));
        named.push(None);
        children.push(*body);
        named.push(None);
        rest = after;
    }
    children.push(cst.alloc(Node::custom(rest)));
    named.push(None);

    cst.alloc(Node::interior(NodeKind::Custom, children, named))
}

/// Deep-copy a subtree, preserving structure but not tree-sitter identity
/// (the clone is a fresh synthetic subtree, per spec §4.2.6 "cloning").
pub fn deep_clone(cst: &mut Cst, id: NodeId) -> NodeId {
    let node = cst.get(id).clone();
    if node.children.is_empty() {
        let mut new_node = node;
        new_node.ts_id = None;
        return cst.alloc(new_node);
    }
    let cloned_children: Vec<NodeId> = node.children.iter().map(|c| deep_clone(cst, *c)).collect();
    let mut new_node = Node::interior_with_fields(
        node.kind.clone(),
        cloned_children,
        node.named_child_indices.clone(),
        node.field_names.clone(),
    );
    new_node.text = node.text.clone();
    cst.alloc(new_node)
}

/// Replace every `Identifier`-like leaf equal to `ident` with `replacement`
/// throughout the subtree (spec §4.2.6 "identifiers are substituted per
/// the chosen variant").
pub fn replace_identifier(cst: &mut Cst, id: NodeId, ident: &str, replacement: &str) {
    let is_identifier_leaf = {
        let node = cst.get(id);
        node.children.is_empty()
            && node.kind.named() == Some("identifier")
            && node.text.as_deref() == Some(ident)
    };
    if is_identifier_leaf {
        cst.get_mut(id).text = Some(replacement.to_string());
        return;
    }
    let children = cst.get(id).children.clone();
    for child in children {
        replace_identifier(cst, child, ident, replacement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::context::{MacroCondition, MacroType, Polarity};
    use crate::lower::symbols::{FuncDecl, SymbolTracker};

    fn ident_node(cst: &mut Cst, text: &str) -> NodeId {
        cst.alloc(Node::leaf(NodeKind::Named("identifier".into()), text))
    }

    #[test]
    fn unambiguous_dict_skips_duplication() {
        let mut cst = Cst::new();
        let mut symbols = SymbolTracker::new();
        let cs: ConditionSet = [MacroCondition::new("FOO", MacroType::Int, Polarity::Undefined)]
            .into_iter()
            .collect();
        symbols.functions.entry("f".to_string()).or_default().push(FuncDecl {
            declarator: ident_node(&mut cst, "f"),
            condition_set: cs.clone(),
        });
        let ctx = LowerContext::root().enter_ifdef(MacroCondition::new("FOO", MacroType::Int, Polarity::Undefined));
        let mut idents = HashSet::new();
        idents.insert("f".to_string());
        let dict = build_rename_dict(&ctx, &symbols, &idents);
        assert!(is_unambiguous(&dict));
        let call = ident_node(&mut cst, "f");
        assert!(multiversal_duplication(&mut cst, call, &dict).is_none());
    }

    #[test]
    fn ambiguous_call_site_renames_second_variant_and_builds_else_if_chain() {
        let mut cst = Cst::new();
        let mut symbols = SymbolTracker::new();
        let foo_true: ConditionSet = [MacroCondition::new("FOO", MacroType::Int, Polarity::Undefined)]
            .into_iter()
            .collect();
        let foo_false: ConditionSet = [MacroCondition::new("FOO", MacroType::Int, Polarity::Defined)]
            .into_iter()
            .collect();
        symbols.functions.entry("f".to_string()).or_default().push(FuncDecl {
            declarator: ident_node(&mut cst, "f"),
            condition_set: foo_true,
        });
        symbols.functions.entry("f".to_string()).or_default().push(FuncDecl {
            declarator: ident_node(&mut cst, "f_2"),
            condition_set: foo_false,
        });

        let ctx = LowerContext::root();
        let mut idents = HashSet::new();
        idents.insert("f".to_string());
        let dict = build_rename_dict(&ctx, &symbols, &idents);
        assert!(!is_unambiguous(&dict));

        let call = ident_node(&mut cst, "f");
        let chain = multiversal_duplication(&mut cst, call, &dict).expect("should duplicate");
        let mut rendered = String::new();
        crate::print::print_node(&cst, chain, &mut rendered);

        assert!(rendered.contains("if (FOO != UNDEFINED_Int) {"));
        assert!(rendered.contains("else if (FOO == UNDEFINED_Int) {"));
        assert!(rendered.contains("else { assert(0); }"));
        assert!(rendered.contains("f_2"), "second variant's call should be renamed: {rendered}");
    }

    #[test]
    fn rename_dict_key_order_is_deterministic_across_runs() {
        // Two ambiguous identifiers referenced by the same statement; the
        // dict's key order must match `idents`' sorted order every time,
        // not whatever a `HashSet`'s randomized iteration happens to give.
        let mut cst = Cst::new();
        let mut symbols = SymbolTracker::new();
        let foo: ConditionSet = [MacroCondition::new("FOO", MacroType::Int, Polarity::Undefined)]
            .into_iter()
            .collect();
        let bar: ConditionSet = [MacroCondition::new("BAR", MacroType::Int, Polarity::Undefined)]
            .into_iter()
            .collect();
        symbols.functions.entry("f".to_string()).or_default().push(FuncDecl {
            declarator: ident_node(&mut cst, "f"),
            condition_set: foo.clone(),
        });
        symbols.functions.entry("f".to_string()).or_default().push(FuncDecl {
            declarator: ident_node(&mut cst, "f_2"),
            condition_set: ConditionSet::new(),
        });
        symbols.functions.entry("g".to_string()).or_default().push(FuncDecl {
            declarator: ident_node(&mut cst, "g"),
            condition_set: bar.clone(),
        });
        symbols.functions.entry("g".to_string()).or_default().push(FuncDecl {
            declarator: ident_node(&mut cst, "g_2"),
            condition_set: ConditionSet::new(),
        });

        let ctx = LowerContext::root();
        let mut idents = HashSet::new();
        idents.insert("g".to_string());
        idents.insert("f".to_string());

        for _ in 0..5 {
            let dict = build_rename_dict(&ctx, &symbols, &idents);
            let keys: Vec<&String> = dict.iter().map(|(k, _)| k).collect();
            assert_eq!(keys, vec!["f", "g"], "dict key order must be sorted/stable across calls");
        }
    }

    #[test]
    fn deep_clone_produces_an_independent_subtree() {
        let mut cst = Cst::new();
        let leaf = ident_node(&mut cst, "x");
        let parent = cst.alloc(Node::interior(NodeKind::Named("identifier_list".into()), vec![leaf], vec![Some(0)]));
        let clone = deep_clone(&mut cst, parent);
        assert_ne!(clone, parent);
        replace_identifier(&mut cst, clone, "x", "x_2");
        // original subtree is untouched by renaming the clone
        assert_eq!(cst.leaf_text(leaf), "x");
        let cloned_leaf = cst.get(clone).children[0];
        assert_eq!(cst.leaf_text(cloned_leaf), "x_2");
    }
}
