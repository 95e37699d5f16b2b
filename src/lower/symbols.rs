//! The symbol tracker (spec §3 "Symbol tracker", §3 descriptors).
//!
//! Grounded on `original_source/src/rt_preproc/visitors/patch/data.py`
//! (`Macro`, `FuncDecl`, `VarDecl`, `DefDecl`, `DefFnDecl`) and on the
//! teacher's own scope-wide symbol maps in
//! `src/lang/applesoft/mod.rs` (`Line`, `Variable`, `Symbols`).

use std::collections::HashMap;

use crate::cst::NodeId;
use crate::lower::context::ConditionSet;

/// `(name, type, optional initializer, condition-set)` (spec §3). Every
/// call site that hoists a declaration out of a conditional scope fixes
/// the initializer to the macro's sentinel (spec §4.2.3), so this is a
/// plain string rather than an expression node — the real initializer, if
/// any, is left behind as a separate assignment by the caller.
#[derive(Clone, Debug)]
pub struct VarDecl {
    pub name: String,
    pub c_type: String,
    pub sentinel: String,
    pub condition_set: ConditionSet,
    /// This declaration's 1-based position among all declarations sharing
    /// `name`, fixed at the moment it is recorded (spec §4.2.3's
    /// ordinal-suffix rule). Captured eagerly rather than recomputed from
    /// the symbol table's final size at materialization time, since by
    /// then every sibling declaration of the same name may already be
    /// recorded and a recompute would give every one of them the same
    /// (final) ordinal instead of each its own.
    pub ordinal: usize,
}

/// `(declarator, condition-set)` (spec §3).
#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub declarator: NodeId,
    pub condition_set: ConditionSet,
}

/// An object-like or function-like `#define`, `(name, value, condition-set,
/// original-name)` (spec §3).
#[derive(Clone, Debug)]
pub enum DefKind {
    Object { value: String },
    Function { params: String, value: String },
}

#[derive(Clone, Debug)]
pub struct DefDecl {
    pub name: String,
    pub orig_name: String,
    pub kind: DefKind,
    pub condition_set: ConditionSet,
}

impl DefDecl {
    /// Materialize into the raw `#define` line text (spec §4.2.4).
    pub fn to_define_line(&self) -> String {
        match &self.kind {
            DefKind::Object { value } => format!("#define {} {}\n", self.name, value),
            DefKind::Function { params, value } => {
                format!("#define {}{} {}\n", self.name, params, value)
            }
        }
    }
}

/// The process-scoped registry populated during the lowering pass (spec
/// §2 item 3): encountered macros and their inferred type, function
/// definitions grouped by original name, `#define`s grouped by original
/// name, and per-scope variable declarations.
#[derive(Default)]
pub struct SymbolTracker {
    pub macros: HashMap<String, crate::lower::context::MacroType>,
    pub functions: HashMap<String, Vec<FuncDecl>>,
    pub defines: HashMap<String, Vec<DefDecl>>,
    /// Per-scope map of variable declarations to the condition sets under
    /// which they apply. Unlike the original's per-`PatchCtx` deep-copied
    /// dict, this is a single table scoped to the whole pass: since
    /// `Declaration` hoisting always lifts out to the nearest
    /// non-conditional enclosing scope, and this engine only ever has one
    /// such scope active at a time per branch of the walk, a flat table
    /// keyed by name is equivalent and avoids the clone-on-every-context
    /// cost the original pays.
    pub var_decls: HashMap<String, Vec<VarDecl>>,
}

impl SymbolTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_macro(&mut self, name: &str, ty: crate::lower::context::MacroType) {
        self.macros.entry(name.to_string()).or_insert(ty);
    }

    /// Register a function definition, returning the ordinal it should be
    /// suffixed with (`None` for the first, `Some(2)` for the second, …).
    pub fn record_function(&mut self, name: &str, decl: FuncDecl) -> Option<usize> {
        let entry = self.functions.entry(name.to_string()).or_default();
        entry.push(decl);
        let ordinal = entry.len();
        if ordinal > 1 {
            Some(ordinal)
        } else {
            None
        }
    }

    /// Register a hoisted variable declaration. `decl.ordinal` is
    /// overwritten with its 1-based position among same-named
    /// declarations before it is stored; returns that resolved ordinal.
    pub fn record_var_decl(&mut self, mut decl: VarDecl) -> usize {
        let entry = self.var_decls.entry(decl.name.clone()).or_default();
        let ordinal = entry.len() + 1;
        decl.ordinal = ordinal;
        entry.push(decl);
        ordinal
    }

    /// Register a `#define`, returning the ordinal suffix for collisions.
    pub fn record_define(&mut self, orig_name: &str) -> usize {
        self.defines.get(orig_name).map(|v| v.len() + 1).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::context::{MacroCondition, MacroType, Polarity};

    #[test]
    fn second_function_definition_gets_an_ordinal() {
        let mut tracker = SymbolTracker::new();
        let cs: ConditionSet = [MacroCondition::new("FOO", MacroType::Int, Polarity::Undefined)]
            .into_iter()
            .collect();
        assert_eq!(
            tracker.record_function("f", FuncDecl { declarator: dummy_id(), condition_set: cs.clone() }),
            None
        );
        assert_eq!(
            tracker.record_function("f", FuncDecl { declarator: dummy_id(), condition_set: cs }),
            Some(2)
        );
    }

    fn dummy_id() -> NodeId {
        let mut cst = crate::cst::Cst::new();
        cst.alloc(crate::cst::Node::custom(""))
    }
}
