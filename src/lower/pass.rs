//! The lowering pass (spec §2 item 4, §4.2). A single top-down tree walk
//! dispatching on node kind, grounded on `PatchVisitor` in
//! `original_source/src/rt_preproc/visitors/patch/patch.py`, structured as
//! the "tagged-variant match with one arm per handled kind, plus a
//! default arm that recurses unchanged" called for in Design Notes §9.

use std::collections::HashSet;

use crate::cst::{Cst, Node, NodeId, NodeKind};
use crate::error::{RtppError, RtppResult};
use crate::lower::context::{LowerContext, MacroCondition, MacroType, Polarity};
use crate::lower::duplicate::{build_rename_dict, multiversal_duplication, RenameDict};
use crate::lower::markers::MarkerTable;
use crate::lower::prelude::{build_setup_prelude, SETUP_ENV_VARS_CALL};
use crate::lower::symbols::{DefDecl, DefKind, FuncDecl, SymbolTracker, VarDecl};

/// Per-node result of the traversal contract (spec §4.2.1): the
/// replacement for this child's slot (`None` leaves it as-is), the
/// move-up nodes to be lifted into the nearest enclosing non-conditional
/// scope, and the identifiers read inside the subtree.
#[derive(Default)]
pub struct VisitResult {
    pub replacement: Option<NodeId>,
    pub move_ups: Vec<NodeId>,
    pub ident_uses: HashSet<String>,
}

impl VisitResult {
    fn new(replacement: Option<NodeId>, move_ups: Vec<NodeId>, ident_uses: HashSet<String>) -> Self {
        Self { replacement, move_ups, ident_uses }
    }

    fn passthrough(move_ups: Vec<NodeId>) -> Self {
        Self { replacement: None, move_ups, ident_uses: HashSet::new() }
    }
}

/// Owns the symbol tables and marker payloads for one rewrite; created
/// fresh per invocation (spec §5, Design Notes "Global mutable tables").
pub struct Lowering {
    pub symbols: SymbolTracker,
    markers: MarkerTable,
    /// Statements deferred from a translation-unit-level `#ifdef` (spec
    /// §4.2.2 step 5), injected into `main` in source order (Open
    /// Question (iii)).
    move_to_mains: Vec<NodeId>,
}

impl Lowering {
    pub fn new() -> Self {
        Self { symbols: SymbolTracker::new(), markers: MarkerTable::new(), move_to_mains: Vec::new() }
    }

    /// Run the pass over a whole translation unit, returning the rewritten
    /// root node.
    pub fn run(&mut self, cst: &mut Cst, root: NodeId) -> RtppResult<NodeId> {
        let ctx = LowerContext::root();
        let result = self.visit(cst, root, &ctx)?;
        if !result.move_ups.is_empty() {
            return Err(RtppError::Invariant(
                "translation unit produced un-absorbed move-ups".to_string(),
            ));
        }
        let new_root = result.replacement.unwrap_or(root);
        let prelude = cst.alloc(Node::custom(build_setup_prelude(&self.symbols)));
        let node = cst.get_mut(new_root);
        node.children.insert(0, prelude);
        node.named_child_indices.insert(0, None);
        node.field_names.insert(0, None);
        Ok(new_root)
    }

    /// Visit every child of `node`, handling move-up propagation and
    /// materialization exactly as spec §4.2.1 "Parent-side handling"
    /// describes, then return the accumulated move-ups (callers that
    /// replace `node` wholesale, like `translation_unit`, use this
    /// directly; callers that only need the children mutated in place
    /// also use this before doing their own node-specific work).
    fn visit_children(&mut self, cst: &mut Cst, node: NodeId, ctx: &LowerContext) -> RtppResult<VisitResult> {
        self.visit_children_impl(cst, node, ctx, false)
    }

    fn visit_children_impl(
        &mut self,
        cst: &mut Cst,
        node: NodeId,
        ctx: &LowerContext,
        children_at_top_level: bool,
    ) -> RtppResult<VisitResult> {
        let mut all_idents = HashSet::new();
        let mut move_up_all = Vec::new();

        let mut i = 0;
        loop {
            let child_count = cst.get(node).children.len();
            if i >= child_count {
                break;
            }
            let child = cst.get(node).children[i];
            let child_ctx = if children_at_top_level { ctx.nested_top_level() } else { ctx.nested() };
            let child_result = self.visit(cst, child, &child_ctx)?;
            all_idents.extend(child_result.ident_uses);

            if ctx.in_ifdef() {
                move_up_all.extend(child_result.move_ups);
            } else if !child_result.move_ups.is_empty() {
                for move_id in &child_result.move_ups {
                    if let NodeKind::VariableDeclarationMarker = cst.kind(*move_id) {
                        // recorded at creation time already; nothing to do here
                    }
                }
                let materialized: Vec<NodeId> = child_result
                    .move_ups
                    .iter()
                    .map(|id| self.markers.materialize(cst, *id))
                    .collect();
                let insert_count = materialized.len();
                let node_mut = cst.get_mut(node);
                for (offset, m) in materialized.into_iter().enumerate() {
                    node_mut.children.insert(i + offset, m);
                    node_mut.named_child_indices.insert(i + offset, None);
                    node_mut.field_names.insert(i + offset, None);
                }
                i += insert_count;
            }

            // a call expression rewritten into a statement-shaped node
            // leaves a dangling `;` sibling; blank it out (spec §4.2.1).
            let replaced_a_call = {
                let child_now = cst.get(node).children[i];
                cst.kind(child_now).named() == Some("call_expression")
                    && child_result.replacement.is_some()
                    && cst.kind(child_result.replacement.unwrap()).named() != Some("call_expression")
            };
            if let Some(new_node) = child_result.replacement {
                cst.get_mut(node).children[i] = new_node;
            }
            if replaced_a_call {
                if let Some(next) = cst.get(node).children.get(i + 1).copied() {
                    if cst.leaf_text(next) == ";" {
                        let ws = cst.alloc(Node::whitespace(" "));
                        cst.get_mut(node).children[i + 1] = ws;
                    }
                }
            }

            i += 1;
        }

        Ok(VisitResult::new(None, move_up_all, all_idents))
    }

    /// The dispatch table: one arm per handled grammar rule, default arm
    /// recurses unchanged (Design Notes §9).
    fn visit(&mut self, cst: &mut Cst, id: NodeId, ctx: &LowerContext) -> RtppResult<VisitResult> {
        if cst.get(id).children.is_empty() {
            return self.visit_leaf(cst, id);
        }
        match cst.kind(id).named().map(|s| s.to_string()) {
            Some(k) if k == "translation_unit" => self.visit_translation_unit(cst, id, ctx),
            Some(k) if k == "preproc_def" => self.visit_preproc_def(cst, id, ctx),
            Some(k) if k == "preproc_function_def" => self.visit_preproc_function_def(cst, id, ctx),
            Some(k) if k == "preproc_ifdef" => self.visit_preproc_ifdef(cst, id, ctx),
            Some(k) if k == "declaration" => self.visit_declaration(cst, id, ctx),
            Some(k) if k == "function_definition" => self.visit_function_definition(cst, id, ctx),
            Some(k) if k == "expression_statement" => self.visit_expression_statement(cst, id, ctx),
            _ => self.visit_default(cst, id, ctx),
        }
    }

    fn visit_leaf(&mut self, cst: &mut Cst, id: NodeId) -> RtppResult<VisitResult> {
        if cst.kind(id).named() == Some("identifier") {
            let mut idents = HashSet::new();
            idents.insert(cst.leaf_text(id).to_string());
            return Ok(VisitResult::new(None, Vec::new(), idents));
        }
        Ok(VisitResult::default())
    }

    fn visit_default(&mut self, cst: &mut Cst, id: NodeId, ctx: &LowerContext) -> RtppResult<VisitResult> {
        let result = self.visit_children(cst, id, ctx)?;
        Ok(VisitResult::new(None, result.move_ups, result.ident_uses))
    }

    fn visit_translation_unit(&mut self, cst: &mut Cst, id: NodeId, ctx: &LowerContext) -> RtppResult<VisitResult> {
        let result = self.visit_children_impl(cst, id, ctx, true)?;
        if !result.move_ups.is_empty() {
            return Err(RtppError::Invariant(
                "move-ups escaped to translation unit scope".to_string(),
            ));
        }
        Ok(VisitResult::new(Some(id), Vec::new(), result.ident_uses))
    }

    fn visit_preproc_def(&mut self, cst: &mut Cst, id: NodeId, ctx: &LowerContext) -> RtppResult<VisitResult> {
        let result = self.visit_children(cst, id, ctx)?;
        if !ctx.in_ifdef() {
            return Ok(VisitResult::passthrough(result.move_ups));
        }
        let name_node = cst
            .named_child(id, 0)
            .ok_or_else(|| RtppError::Invariant("#define missing name".to_string()))?;
        let value_node = cst.named_child(id, 1);
        let orig_name = cst.leaf_text(name_node).to_string();
        let ordinal = self.symbols.record_define(&orig_name);
        let name = if ordinal > 1 { format!("{orig_name}_{ordinal}") } else { orig_name.clone() };
        let value = value_node.map(|v| cst.leaf_text(v).to_string()).unwrap_or_default();
        let decl = DefDecl {
            name,
            orig_name: orig_name.clone(),
            kind: DefKind::Object { value },
            condition_set: ctx.condition_set(),
        };
        self.symbols.defines.entry(orig_name).or_default().push(decl.clone());
        let marker = self.markers.make_define_marker(cst, decl);
        let mut move_ups = result.move_ups;
        move_ups.push(marker);
        let ws = cst.alloc(Node::whitespace("\n"));
        Ok(VisitResult::new(Some(ws), move_ups, result.ident_uses))
    }

    fn visit_preproc_function_def(&mut self, cst: &mut Cst, id: NodeId, ctx: &LowerContext) -> RtppResult<VisitResult> {
        let result = self.visit_children(cst, id, ctx)?;
        if !ctx.in_ifdef() {
            return Ok(VisitResult::passthrough(result.move_ups));
        }
        let name_node = cst
            .named_child(id, 0)
            .ok_or_else(|| RtppError::Invariant("function-like #define missing name".to_string()))?;
        let params_node = cst.named_child(id, 1);
        let value_node = cst.named_child(id, 2);
        let orig_name = cst.leaf_text(name_node).to_string();
        let ordinal = self.symbols.record_define(&orig_name);
        let name = if ordinal > 1 { format!("{orig_name}_{ordinal}") } else { orig_name.clone() };
        let params = params_node.map(|p| cst.leaf_text(p).to_string()).unwrap_or_default();
        let value = value_node.map(|v| cst.leaf_text(v).to_string()).unwrap_or_default();
        let decl = DefDecl {
            name,
            orig_name: orig_name.clone(),
            kind: DefKind::Function { params, value },
            condition_set: ctx.condition_set(),
        };
        self.symbols.defines.entry(orig_name).or_default().push(decl.clone());
        let marker = self.markers.make_define_marker(cst, decl);
        let mut move_ups = result.move_ups;
        move_ups.push(marker);
        let ws = cst.alloc(Node::whitespace("\n"));
        Ok(VisitResult::new(Some(ws), move_ups, result.ident_uses))
    }

    /// `#ifdef M { BODY } [ #else { ALT } ]` (spec §4.2.2).
    fn visit_preproc_ifdef(&mut self, cst: &mut Cst, id: NodeId, ctx: &LowerContext) -> RtppResult<VisitResult> {
        let name_node = cst
            .named_child(id, 0)
            .ok_or_else(|| RtppError::Invariant("#ifdef missing macro name".to_string()))?;
        let macro_name = cst.leaf_text(name_node).to_string();

        let alt_pos = cst.child_by_field_name(id, "alternative");
        if let Some(alt) = alt_pos {
            let alt_kind = cst.kind(alt).named();
            if alt_kind == Some("preproc_elif") || alt_kind == Some("preproc_elifdef") {
                // #elif / #elifdef are recognized by the grammar but not
                // rewritten by this pass (Open Question (ii), spec §7
                // "Unsupported construct"): leave the whole subtree
                // unmodified rather than partially lowering just the
                // `#ifdef` arm and silently dropping the rest of the chain.
                log::warn!("#elif/#elifdef under {macro_name:?} is unsupported; leaving subtree unmodified");
                return Ok(VisitResult::passthrough(Vec::new()));
            }
        }

        self.symbols.record_macro(&macro_name, MacroType::Int);

        let cond = MacroCondition::new(&macro_name, MacroType::Int, Polarity::Undefined);
        let body_ctx = ctx.enter_ifdef(cond.clone());

        // body children: after the name, before `#else`/`#endif`/alternative marker.
        let all_children = cst.get(id).children.clone();
        let name_pos = all_children.iter().position(|c| *c == name_node).unwrap_or(0);
        let end_pos = alt_pos
            .and_then(|alt| all_children.iter().position(|c| *c == alt))
            .unwrap_or_else(|| {
                all_children
                    .iter()
                    .position(|c| cst.leaf_text(*c) == "#endif")
                    .unwrap_or(all_children.len())
            });

        let mut move_ups_total = Vec::new();
        let mut idents_total = HashSet::new();
        let mut body_children = Vec::new();
        for &child in &all_children[name_pos + 1..end_pos] {
            let r = self.visit(cst, child, &body_ctx)?;
            idents_total.extend(r.ident_uses);
            move_ups_total.extend(r.move_ups);
            body_children.push(r.replacement.unwrap_or(child));
        }

        let body_is_empty = cst.is_empty_or_whitespace(&body_children);

        // alternative (`#else`) arm, if present: visited with a frame that
        // skips the ifdef's own frame (spec §4.2.2 step 2).
        let mut alt_children = Vec::new();
        if let Some(alt) = alt_pos {
            // `#elif`/`#elifdef` already bailed out above; this is `#else`.
            let negated = MacroCondition::new(&macro_name, MacroType::Int, Polarity::Defined);
            let else_ctx = ctx.enter_else(negated);
            let alt_all = cst.get(alt).children.clone();
            // `preproc_else = seq('#else', <body>)`: the first child is the
            // anonymous `#else` token itself, not part of the body. Skip it
            // so it isn't spliced verbatim into the emitted `else { ... }`
            // block, which would leave a stray `#else` directive inside a
            // function body (not valid as a statement).
            let else_tok_pos = alt_all.iter().position(|c| cst.leaf_text(*c) == "#else").map_or(0, |p| p + 1);
            for &child in &alt_all[else_tok_pos..] {
                let r = self.visit(cst, child, &else_ctx)?;
                idents_total.extend(r.ident_uses);
                move_ups_total.extend(r.move_ups);
                alt_children.push(r.replacement.unwrap_or(child));
            }
        }

        if body_is_empty {
            let ws = cst.alloc(Node::whitespace("\n"));
            return Ok(VisitResult::new(Some(ws), move_ups_total, idents_total));
        }

        let body_block = cst.alloc(Node::interior(NodeKind::Named("compound_statement".into()), body_children, vec![]));
        let mut pieces = vec![
            cst.alloc(Node::custom("if (")),
            name_node,
            cst.alloc(Node::custom(format!(" {} UNDEFINED_Int) {{\n", cond.polarity.comparator()))),
            body_block,
            cst.alloc(Node::custom("\n}")),
        ];
        if !alt_children.is_empty() {
            let alt_block = cst.alloc(Node::interior(NodeKind::Named("compound_statement".into()), alt_children, vec![]));
            pieces.push(cst.alloc(Node::custom(" else {\n")));
            pieces.push(alt_block);
            pieces.push(cst.alloc(Node::custom("\n}")));
        }
        pieces.push(cst.alloc(Node::whitespace("\n")));
        let named = vec![None; pieces.len()];
        let if_node = cst.alloc(Node::interior(NodeKind::Named("if_statement".into()), pieces, named));

        if ctx.at_top_level() {
            // top-level ifdef: defer injection into main (spec §4.2.2 step 5, Open Question (iii)).
            self.move_to_mains.push(if_node);
            let ws = cst.alloc(Node::whitespace("\n"));
            return Ok(VisitResult::new(Some(ws), move_ups_total, idents_total));
        }

        Ok(VisitResult::new(Some(if_node), move_ups_total, idents_total))
    }

    /// Declaration hoisting (spec §4.2.3).
    fn visit_declaration(&mut self, cst: &mut Cst, id: NodeId, ctx: &LowerContext) -> RtppResult<VisitResult> {
        let result = self.visit_children(cst, id, ctx)?;
        let type_node = cst
            .named_child(id, 0)
            .ok_or_else(|| RtppError::Invariant("declaration missing type".to_string()))?;
        let init_decl = cst
            .named_child(id, 1)
            .ok_or_else(|| RtppError::Invariant("declaration missing declarator".to_string()))?;
        let type_str = cst.leaf_text(type_node).to_string();

        let is_init_declarator = cst.kind(init_decl).named() == Some("init_declarator");
        let name_node = if is_init_declarator {
            cst.named_child(init_decl, 0)
                .ok_or_else(|| RtppError::Invariant("init_declarator missing name".to_string()))?
        } else {
            init_decl
        };
        let name = cst.leaf_text(name_node).to_string();

        // The declarator's own name surfaces as an `identifier` leaf while
        // visiting this node's children, and would otherwise look like a
        // "use" of itself — which falsely triggers multiversal duplication
        // against any unrelated same-named variant recorded elsewhere. It
        // is a binding occurrence, not a use, so it never belongs in the
        // set handed to `build_rename_dict`.
        let mut uses_excluding_self = result.ident_uses.clone();
        uses_excluding_self.remove(&name);

        if ctx.in_ifdef() {
            let macro_set = ctx.condition_set();
            let var_decl = VarDecl {
                name: name.clone(),
                c_type: type_str,
                sentinel: "UNDEFINED_Int".to_string(),
                condition_set: macro_set,
                ordinal: 0,
            };
            let ordinal = self.symbols.record_var_decl(var_decl.clone());
            let marker = self.markers.make_variable_marker(cst, VarDecl { ordinal, ..var_decl });
            let mut move_ups = result.move_ups;
            move_ups.push(marker);

            if is_init_declarator {
                let init_rhs = cst
                    .named_child(init_decl, 1)
                    .ok_or_else(|| RtppError::Invariant("init_declarator missing initializer".to_string()))?;
                // This assignment targets the declaration just hoisted
                // above, under its own resolved (possibly ordinal-suffixed)
                // name, so its LHS always matches that declaration exactly.
                let lhs_name = if ordinal > 1 { format!("{name}_{ordinal}") } else { name.clone() };
                let assign_text_open = cst.alloc(Node::custom(format!("{lhs_name} = ")));
                let assign_text_close = cst.alloc(Node::custom(";\n"));
                let assign_node = cst.alloc(Node::interior(
                    NodeKind::Named("assignment_expression".into()),
                    vec![assign_text_open, init_rhs, assign_text_close],
                    vec![None, None, None],
                ));
                let dict = build_rename_dict(ctx, &self.symbols, &uses_excluding_self);
                let final_node = multiversal_duplication(cst, assign_node, &dict).unwrap_or(assign_node);
                return Ok(VisitResult::new(Some(final_node), move_ups, HashSet::new()));
            }
            return Ok(VisitResult::new(None, move_ups, HashSet::new()));
        }

        if is_init_declarator {
            let init_rhs = cst
                .named_child(init_decl, 1)
                .ok_or_else(|| RtppError::Invariant("init_declarator missing initializer".to_string()))?;
            let dict = build_rename_dict(ctx, &self.symbols, &uses_excluding_self);
            if crate::lower::duplicate::is_unambiguous(&dict) {
                return Ok(VisitResult::new(None, result.move_ups, HashSet::new()));
            }
            let macro_set = ctx.condition_set();
            let undef_decl_text = cst.alloc(Node::custom(format!("{type_str} {name} = UNDEFINED_Int;\n")));
            let assign_open = cst.alloc(Node::custom(format!("{name} = ")));
            let assign_close = cst.alloc(Node::custom(";\n"));
            let assign_node = cst.alloc(Node::interior(
                NodeKind::Named("assignment_expression".into()),
                vec![assign_open, init_rhs, assign_close],
                vec![None, None, None],
            ));
            let dup = multiversal_duplication(cst, assign_node, &dict).unwrap_or(assign_node);
            let _ = macro_set;
            let compound = cst.alloc(Node::interior(
                NodeKind::Named("compound_statement".into()),
                vec![undef_decl_text, dup],
                vec![None, None],
            ));
            return Ok(VisitResult::new(Some(compound), result.move_ups, HashSet::new()));
        }

        Ok(VisitResult::new(None, result.move_ups, result.ident_uses))
    }

    /// Function definitions (spec §4.2.5).
    fn visit_function_definition(&mut self, cst: &mut Cst, id: NodeId, ctx: &LowerContext) -> RtppResult<VisitResult> {
        let result = self.visit_children(cst, id, ctx)?;
        let declarator = cst
            .named_child(id, 1)
            .ok_or_else(|| RtppError::Invariant("function_definition missing declarator".to_string()))?;
        let name_node = cst
            .named_child(declarator, 0)
            .ok_or_else(|| RtppError::Invariant("function_declarator missing name".to_string()))?;
        let func_name = cst.leaf_text(name_node).to_string();

        let ordinal = self.symbols.record_function(
            &func_name,
            FuncDecl { declarator, condition_set: ctx.condition_set() },
        );
        if let Some(n) = ordinal {
            cst.get_mut(name_node).text = Some(format!("{func_name}_{n}"));
        }

        let body = cst
            .named_child(id, 2)
            .ok_or_else(|| RtppError::Invariant("function_definition missing body".to_string()))?;

        if func_name == "main" {
            self.inject_main_prelude(cst, body)?;
            return Ok(VisitResult::new(Some(id), result.move_ups, HashSet::new()));
        }

        if ctx.in_ifdef() {
            self.inject_guard_asserts(cst, body, ctx)?;
            let mut move_ups = result.move_ups;
            move_ups.push(id);
            let ws = cst.alloc(Node::whitespace("\n"));
            return Ok(VisitResult::new(Some(ws), move_ups, HashSet::new()));
        }

        Ok(VisitResult::new(None, result.move_ups, HashSet::new()))
    }

    fn inject_main_prelude(&mut self, cst: &mut Cst, body: NodeId) -> RtppResult<()> {
        let brace_pos = cst
            .get(body)
            .children
            .iter()
            .position(|c| cst.leaf_text(*c) == "{")
            .ok_or_else(|| RtppError::Invariant("no opening brace found in main's body".to_string()))?;
        let setup_call = cst.alloc(Node::custom(SETUP_ENV_VARS_CALL));
        let mut inserted = vec![setup_call];
        inserted.extend(std::mem::take(&mut self.move_to_mains));
        let body_mut = cst.get_mut(body);
        for (offset, node_id) in inserted.into_iter().enumerate() {
            body_mut.children.insert(brace_pos + 1 + offset, node_id);
            body_mut.named_child_indices.insert(brace_pos + 1 + offset, None);
            body_mut.field_names.insert(brace_pos + 1 + offset, None);
        }
        Ok(())
    }

    fn inject_guard_asserts(&mut self, cst: &mut Cst, body: NodeId, ctx: &LowerContext) -> RtppResult<()> {
        let brace_pos = cst
            .get(body)
            .children
            .iter()
            .position(|c| cst.leaf_text(*c) == "{")
            .ok_or_else(|| RtppError::Invariant("no opening brace found for function body".to_string()))?;
        let mut asserts = Vec::new();
        for cond in ctx.get_ifdef_cond_stack() {
            asserts.push(cst.alloc(Node::custom(format!(
                "\nassert({} {} {});\n",
                cond.name,
                cond.polarity.comparator(),
                cond.ty.sentinel_name()
            ))));
        }
        let body_mut = cst.get_mut(body);
        for (offset, node_id) in asserts.into_iter().enumerate() {
            body_mut.children.insert(brace_pos + 1 + offset, node_id);
            body_mut.named_child_indices.insert(brace_pos + 1 + offset, None);
            body_mut.field_names.insert(brace_pos + 1 + offset, None);
        }
        Ok(())
    }

    /// Call sites and multiversal duplication (spec §4.2.6).
    fn visit_expression_statement(&mut self, cst: &mut Cst, id: NodeId, ctx: &LowerContext) -> RtppResult<VisitResult> {
        let result = self.visit_children(cst, id, ctx)?;
        let dict: RenameDict = build_rename_dict(ctx, &self.symbols, &result.ident_uses);
        let replacement = multiversal_duplication(cst, id, &dict);
        // the identifiers are consumed here; they don't propagate further up.
        Ok(VisitResult::new(replacement, result.move_ups, HashSet::new()))
    }
}

impl Default for Lowering {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "pass_test.rs"]
mod pass_test;
