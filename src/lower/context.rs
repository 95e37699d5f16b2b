//! Macro conditions and the lowering context stack (spec §3, §4.2.1).
//!
//! Grounded on `PatchCtx` in
//! `original_source/src/rt_preproc/visitors/patch/patch.py`: a linked
//! chain of frames, each optionally carrying the `#ifdef` condition that
//! opened it, with `get_ifdef_cond_stack()` walking to the root.

use std::collections::BTreeSet;
use std::rc::Rc;

/// The only macro type the prelude synthesizer currently infers (Open
/// Question (i) in spec §9 / SPEC_FULL.md §9): every macro referenced by
/// an `#ifdef` is treated as `int`. The enum exists so call sites aren't
/// hardcoded to a string, even though only one variant is ever produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MacroType {
    Int,
}

impl MacroType {
    pub fn c_name(self) -> &'static str {
        match self {
            MacroType::Int => "int",
        }
    }

    /// Name of the sentinel macro, e.g. `UNDEFINED_Int`.
    pub fn sentinel_name(self) -> String {
        match self {
            MacroType::Int => "UNDEFINED_Int".to_string(),
        }
    }
}

/// `defined` if this condition came from a `#else` arm, else `undefined`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Polarity {
    Defined,
    Undefined,
}

impl Polarity {
    /// `==` selects the `#else` (defined) arm, `!=` the positive arm.
    pub fn comparator(self) -> &'static str {
        match self {
            Polarity::Defined => "==",
            Polarity::Undefined => "!=",
        }
    }
}

/// A single macro condition: `(name, type, polarity)` (spec §3).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacroCondition {
    pub name: String,
    pub ty: MacroType,
    pub polarity: Polarity,
}

impl MacroCondition {
    pub fn new(name: impl Into<String>, ty: MacroType, polarity: Polarity) -> Self {
        Self { name: name.into(), ty, polarity }
    }

    /// This condition with polarity flipped (used to build the `#else` arm's frame).
    pub fn negated(&self) -> Self {
        let polarity = match self.polarity {
            Polarity::Defined => Polarity::Undefined,
            Polarity::Undefined => Polarity::Defined,
        };
        Self { name: self.name.clone(), ty: self.ty, polarity }
    }
}

/// The conjunction of macro conditions under which a node is live. An
/// ordered set (`BTreeSet`) so emitted `if`-chains and prelude lines come
/// out in a deterministic order across runs.
pub type ConditionSet = BTreeSet<MacroCondition>;

/// One frame of the context stack. Frames form a persistent chain via
/// `Rc` so cloning a context for a sibling subtree is O(1) sharing rather
/// than a deep copy (the Python original deep-copies `var_decls` on every
/// clone; we share immutably instead and only grow a frame's own table).
pub struct ContextFrame {
    pub parent: Option<Rc<ContextFrame>>,
    pub in_ifdef: bool,
    pub ifdef_cond: Option<MacroCondition>,
    /// True only for the direct children of the translation unit. Used to
    /// decide whether a rewritten `#ifdef` can be emitted in place (inside
    /// a statement context) or must be deferred into `main` (spec §4.2.2
    /// step 5): C disallows bare statements at file scope.
    pub at_top_level: bool,
}

/// The context threaded through the lowering pass. Roughly `PatchCtx` in
/// the original, minus `var_decls` (kept as a separate scoped table owned
/// by the `Lowering` pass itself, since Rust makes a mutable table cleaner
/// to maintain as a stack of scopes than a deep-cloned map per context).
#[derive(Clone)]
pub struct LowerContext {
    frame: Rc<ContextFrame>,
}

impl LowerContext {
    pub fn root() -> Self {
        Self {
            frame: Rc::new(ContextFrame { parent: None, in_ifdef: false, ifdef_cond: None, at_top_level: false }),
        }
    }

    pub fn in_ifdef(&self) -> bool {
        self.frame.in_ifdef
    }

    pub fn at_top_level(&self) -> bool {
        self.frame.at_top_level
    }

    pub fn ifdef_cond(&self) -> Option<&MacroCondition> {
        self.frame.ifdef_cond.as_ref()
    }

    /// Enter an `#ifdef`'s positive-arm frame.
    pub fn enter_ifdef(&self, cond: MacroCondition) -> Self {
        Self {
            frame: Rc::new(ContextFrame {
                parent: Some(self.frame.clone()),
                in_ifdef: true,
                ifdef_cond: Some(cond),
                at_top_level: false,
            }),
        }
    }

    /// Enter a `#else` frame. Per spec §4.2.2 step 2, the `#else` arm's
    /// parent context *skips* the `#ifdef`'s own frame so its depth
    /// matches the `#ifdef`'s — it links to `self`'s parent, not `self`.
    pub fn enter_else(&self, negated_cond: MacroCondition) -> Self {
        let parent = self.frame.parent.clone();
        Self {
            frame: Rc::new(ContextFrame {
                parent,
                in_ifdef: true,
                ifdef_cond: Some(negated_cond),
                at_top_level: false,
            }),
        }
    }

    /// A plain nested scope that doesn't itself add a condition (e.g.
    /// descending into an ordinary compound statement).
    pub fn nested(&self) -> Self {
        Self {
            frame: Rc::new(ContextFrame {
                parent: Some(self.frame.clone()),
                in_ifdef: self.frame.in_ifdef,
                ifdef_cond: None,
                at_top_level: false,
            }),
        }
    }

    /// Like `nested`, but marks the result as sitting directly at file
    /// scope (only meaningful for the translation unit's own children).
    pub fn nested_top_level(&self) -> Self {
        Self {
            frame: Rc::new(ContextFrame {
                parent: Some(self.frame.clone()),
                in_ifdef: self.frame.in_ifdef,
                ifdef_cond: None,
                at_top_level: true,
            }),
        }
    }

    /// Walk to the root collecting every frame's condition, inner-to-outer.
    pub fn get_ifdef_cond_stack(&self) -> Vec<MacroCondition> {
        let mut stack = Vec::new();
        let mut frame = Some(self.frame.clone());
        while let Some(f) = frame {
            if let Some(cond) = &f.ifdef_cond {
                stack.push(cond.clone());
            }
            frame = f.parent.clone();
        }
        stack
    }

    pub fn condition_set(&self) -> ConditionSet {
        self.get_ifdef_cond_stack().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ifdef_stack_accumulates_inner_to_outer() {
        let root = LowerContext::root();
        let outer = root.enter_ifdef(MacroCondition::new("A", MacroType::Int, Polarity::Undefined));
        let inner = outer.enter_ifdef(MacroCondition::new("B", MacroType::Int, Polarity::Undefined));
        let names: Vec<_> = inner.get_ifdef_cond_stack().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["B".to_string(), "A".to_string()]);
    }

    #[test]
    fn else_frame_skips_the_ifdef_frame() {
        let root = LowerContext::root();
        let ifdef = root.enter_ifdef(MacroCondition::new("A", MacroType::Int, Polarity::Undefined));
        let else_ctx = ifdef.enter_else(MacroCondition::new("A", MacroType::Int, Polarity::Defined));
        // depth (stack length) equal to the ifdef's own, not one deeper
        assert_eq!(ifdef.get_ifdef_cond_stack().len(), else_ctx.get_ifdef_cond_stack().len());
        assert_eq!(else_ctx.get_ifdef_cond_stack()[0].polarity, Polarity::Defined);
    }
}
