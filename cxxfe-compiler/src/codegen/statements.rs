//! Statement lowering (spec §4.8): block/scope management, control flow as
//! label/branch pairs over the flat instruction stream, and the
//! exception/SEH statements lowered to runtime-helper calls rather than a
//! real unwind model, since `cxxfe_ast::ir` has no landing-pad opcode.

use cxxfe_ast::ast::{CatchClause, Stmt};
use cxxfe_ast::ir::{CompareOp, IrInstruction, ReferenceKind as IrRefKind, ValuePayload};
use cxxfe_ast::{AstArena, BlockId, StmtId, StringHandle};

use super::{IrGenerator, ValueShape};

impl<'a> IrGenerator<'a> {
    pub(crate) fn lower_block_contents(&mut self, arena: &AstArena, id: BlockId) {
        let statements = arena.block(id).statements.clone();
        for stmt_id in statements {
            self.lower_stmt(arena, stmt_id);
        }
    }

    fn lower_nested_block(&mut self, arena: &AstArena, id: BlockId) {
        self.push_scope();
        self.lower_block_contents(arena, id);
        self.pop_scope();
    }

    fn lower_stmt(&mut self, arena: &AstArena, id: StmtId) {
        let stmt = arena.stmt(id).clone();
        match stmt {
            Stmt::Block(block_id) => self.lower_nested_block(arena, block_id),
            Stmt::ExprStmt(expr_id) => {
                self.lower_expr(arena, expr_id);
            }
            Stmt::VarDecl { name, ty, init, is_static, is_constexpr } => {
                self.lower_var_decl(arena, name, ty, init, is_static, is_constexpr);
            }
            Stmt::StructuredBinding { names, init } => self.lower_structured_binding(arena, &names, init),
            Stmt::If { init, cond, then_branch, else_branch } => {
                self.push_scope();
                if let Some(init_stmt) = init {
                    self.lower_stmt(arena, init_stmt);
                }
                let cond_val = self.lower_expr(arena, cond).0;
                let then_label = self.fresh_label("if_then");
                let else_label = self.fresh_label("if_else");
                let end_label = self.fresh_label("if_end");
                self.emit(IrInstruction::ConditionalBranch {
                    cond: cond_val,
                    if_true: then_label,
                    if_false: if else_branch.is_some() { else_label } else { end_label },
                });
                self.emit(IrInstruction::Label(then_label));
                self.lower_stmt(arena, then_branch);
                self.emit(IrInstruction::Branch { target: end_label });
                if let Some(else_branch) = else_branch {
                    self.emit(IrInstruction::Label(else_label));
                    self.lower_stmt(arena, else_branch);
                }
                self.emit(IrInstruction::Label(end_label));
                self.pop_scope();
            }
            Stmt::While { cond, body } => {
                let loop_start = self.fresh_label("while_cond");
                let body_label = self.fresh_label("while_body");
                let loop_end = self.fresh_label("while_end");
                self.emit(IrInstruction::Label(loop_start));
                let cond_val = self.lower_expr(arena, cond).0;
                self.emit(IrInstruction::ConditionalBranch { cond: cond_val, if_true: body_label, if_false: loop_end });
                self.emit(IrInstruction::Label(body_label));
                self.loop_label_stack.push((loop_start, loop_end));
                self.push_scope();
                self.lower_stmt(arena, body);
                self.pop_scope();
                self.loop_label_stack.pop();
                self.emit(IrInstruction::Branch { target: loop_start });
                self.emit(IrInstruction::Label(loop_end));
            }
            Stmt::DoWhile { body, cond } => {
                let body_label = self.fresh_label("do_body");
                let cond_label = self.fresh_label("do_cond");
                let loop_end = self.fresh_label("do_end");
                self.emit(IrInstruction::Label(body_label));
                self.loop_label_stack.push((cond_label, loop_end));
                self.push_scope();
                self.lower_stmt(arena, body);
                self.pop_scope();
                self.loop_label_stack.pop();
                self.emit(IrInstruction::Label(cond_label));
                let cond_val = self.lower_expr(arena, cond).0;
                self.emit(IrInstruction::ConditionalBranch { cond: cond_val, if_true: body_label, if_false: loop_end });
                self.emit(IrInstruction::Label(loop_end));
            }
            Stmt::For { init, cond, post, body } => {
                self.push_scope();
                if let Some(init_stmt) = init {
                    self.lower_stmt(arena, init_stmt);
                }
                let cond_label = self.fresh_label("for_cond");
                let body_label = self.fresh_label("for_body");
                let post_label = self.fresh_label("for_post");
                let loop_end = self.fresh_label("for_end");
                self.emit(IrInstruction::Label(cond_label));
                let cond_val = match cond {
                    Some(c) => self.lower_expr(arena, c).0,
                    None => cxxfe_ast::ir::TypedValue::int_literal(1, 32),
                };
                self.emit(IrInstruction::ConditionalBranch { cond: cond_val, if_true: body_label, if_false: loop_end });
                self.emit(IrInstruction::Label(body_label));
                self.loop_label_stack.push((post_label, loop_end));
                self.push_scope();
                self.lower_stmt(arena, body);
                self.pop_scope();
                self.loop_label_stack.pop();
                self.emit(IrInstruction::Label(post_label));
                if let Some(post_expr) = post {
                    self.lower_expr(arena, post_expr);
                }
                self.emit(IrInstruction::Branch { target: cond_label });
                self.emit(IrInstruction::Label(loop_end));
                self.pop_scope();
            }
            Stmt::RangedFor { binding, range, body } => self.lower_ranged_for(arena, binding, range, body),
            Stmt::Switch { value, cases, default_case } => self.lower_switch(arena, value, &cases, default_case),
            Stmt::Break => {
                if let Some((_, break_label)) = self.loop_label_stack.last().copied() {
                    self.emit(IrInstruction::Branch { target: break_label });
                }
            }
            Stmt::Continue => {
                if let Some((continue_label, _)) = self.loop_label_stack.last().copied() {
                    self.emit(IrInstruction::Branch { target: continue_label });
                }
            }
            Stmt::Goto(label) => self.emit(IrInstruction::Branch { target: label }),
            Stmt::Labeled { label, stmt } => {
                self.emit(IrInstruction::Label(label));
                self.lower_stmt(arena, stmt);
            }
            Stmt::Return(expr) => self.lower_return(arena, expr),
            Stmt::Try { body, catches } => self.lower_try(arena, body, &catches),
            Stmt::Throw(expr) => self.lower_throw(arena, expr),
            Stmt::SehTry { body, except_body, finally_body } => self.lower_seh_try(arena, body, except_body, finally_body),
            Stmt::SehLeave => {
                let helper = self.interner.intern_str("__cxxfe_seh_leave");
                let result = self.fresh_temp();
                self.emit(IrInstruction::FunctionCall {
                    mangled_name: helper,
                    return_type: cxxfe_ast::ir::TypedValue::int_literal(0, 32),
                    is_member_function: false,
                    args: Vec::new(),
                    result,
                });
            }
            Stmt::UsingDirective { .. }
            | Stmt::UsingDeclaration { .. }
            | Stmt::UsingEnum(_)
            | Stmt::NamespaceAlias { .. }
            | Stmt::Typedef { .. }
            | Stmt::StaticAssert { .. } => {}
        }
    }

    fn lower_var_decl(
        &mut self,
        arena: &AstArena,
        name: StringHandle,
        ty: Option<cxxfe_ast::TypeSpecId>,
        init: Option<cxxfe_ast::ExprId>,
        is_static: bool,
        is_constexpr: bool,
    ) {
        let shape = ty
            .map(|t| self.shape_of_type_spec(arena, t))
            .or_else(|| init.map(|e| ValueShape::of(&self.lower_expr(arena, e).0)))
            .unwrap_or(ValueShape::invalid());

        if is_static {
            // Function-local statics are emitted once as ordinary globals;
            // this generator does not model the guard-variable /
            // once-initialization check a real backend would need.
            let mangled_str = format!(
                "{}::{}",
                self.current_function_name.map(|h| self.interner.view_str(h)).unwrap_or_default(),
                self.interner.view_str(name)
            );
            let mangled = self.interner.intern_str(&mangled_str);
            let initializer = if is_constexpr { init.and_then(|id| self.try_const_eval_local(arena, id, shape)) } else { None };
            self.emit(IrInstruction::GlobalVariableDecl { mangled_name: mangled, ty: shape.with_value(ValuePayload::U64(0)), initializer });
            self.globals.insert(name, (mangled, shape));
            let temp = self.fresh_temp();
            self.emit(IrInstruction::GlobalLoad { mangled_name: mangled, result: temp });
            self.bind_local(name, shape.with_value(ValuePayload::Temp(temp)), None);
            return;
        }

        let has_struct = self.registry.struct_info(shape.type_index).is_some();
        if has_struct {
            if let Some(expr_id) = init {
                if let cxxfe_ast::ast::Expr::InitializerList(entries) = arena.expr(expr_id).clone() {
                    self.lower_aggregate_init(arena, name, shape, &entries);
                    return;
                }
            }
        }

        let value = match init {
            Some(expr_id) => self.lower_expr(arena, expr_id).0,
            None => shape.with_value(ValuePayload::U64(0)),
        };

        let dtor = if has_struct {
            Some(self.mangle_special(shape.type_index, cxxfe_ast::ast::FunctionKind::Destructor, &[]))
        } else {
            None
        };
        self.bind_local(name, value, dtor);
    }

    /// Lowers `T x = {a, b, ...}` by storing each positional entry into its
    /// member's own offset, in declaration order (spec §4.8 aggregate
    /// initialization). Designated entries are matched by name instead of
    /// position; unmatched members are left unwritten.
    fn lower_aggregate_init(&mut self, arena: &AstArena, name: StringHandle, shape: ValueShape, entries: &[cxxfe_ast::ast::InitListEntry]) {
        let addr_temp = self.fresh_temp();
        let addr_tv = shape.pointer_to().with_value(ValuePayload::Temp(addr_temp));

        let Some(members) = self.registry.struct_info(shape.type_index).map(|s| s.members.clone()) else {
            self.bind_local(name, addr_tv, None);
            return;
        };

        let mut positional_index = 0usize;
        for entry in entries {
            let (member, value_expr) = match entry {
                cxxfe_ast::ast::InitListEntry::Positional(expr_id) => {
                    let m = members.get(positional_index).cloned();
                    positional_index += 1;
                    (m, *expr_id)
                }
                cxxfe_ast::ast::InitListEntry::Designated(member_name, expr_id) => {
                    (members.iter().find(|m| m.name == *member_name).cloned(), *expr_id)
                }
            };
            let Some(member) = member else { continue };
            let (value, _) = self.lower_expr(arena, value_expr);
            self.emit(IrInstruction::MemberStore {
                base: addr_tv.clone(),
                member_name: member.name,
                offset_bits: member.offset_bits,
                bitfield_width: member.bitfield_width,
                value,
            });
        }

        let dtor = self.mangle_special(shape.type_index, cxxfe_ast::ast::FunctionKind::Destructor, &[]);
        self.bind_local(name, addr_tv, Some(dtor));
    }

    fn try_const_eval_local(&self, arena: &AstArena, id: cxxfe_ast::ExprId, shape: ValueShape) -> Option<cxxfe_ast::ir::TypedValue> {
        let no_vars = |_: StringHandle| None;
        let resolve_inst = |a: &AstArena, name: StringHandle, args: &[cxxfe_ast::ast::TemplateArgSpec]| super::resolve_instantiation_layout(self.registry, a, name, args);
        let mut evaluator = crate::eval::ConstExprEvaluator::new(self.registry, &no_vars).with_instantiation_resolver(&resolve_inst);
        let value = evaluator.evaluate(arena, id).ok()?;
        Some(shape.with_value(ValuePayload::U64(value.as_i64() as u64)))
    }

    /// Binds each name to its positional slot of the initializer, the same
    /// `__element_N` convention aggregate-initializer lowering uses for
    /// unnamed tuple-like decomposition.
    fn lower_structured_binding(&mut self, arena: &AstArena, names: &[StringHandle], init: cxxfe_ast::ExprId) {
        let (base, _) = self.lower_expr(arena, init);
        for (i, name) in names.iter().enumerate() {
            let element_name = self.interner.intern_str(&format!("__element_{i}"));
            let result = self.fresh_temp();
            self.emit(IrInstruction::MemberAccess {
                base: base.clone(),
                member_name: element_name,
                offset_bits: (i as u64) * base.size_in_bits as u64,
                bitfield_width: None,
                result,
            });
            self.bind_local(*name, ValueShape::of(&base).with_value(ValuePayload::Temp(result)), None);
        }
    }

    fn lower_ranged_for(&mut self, arena: &AstArena, binding: StringHandle, range: cxxfe_ast::ExprId, body: StmtId) {
        self.push_scope();
        let (range_value, _) = self.lower_expr(arena, range);
        let size_helper = self.interner.intern_str("__cxxfe_range_size");
        let size_temp = self.fresh_temp();
        self.emit(IrInstruction::FunctionCall {
            mangled_name: size_helper,
            return_type: cxxfe_ast::ir::TypedValue::int_literal(0, 64),
            is_member_function: false,
            args: vec![range_value.clone()],
            result: size_temp,
        });
        let size_value = cxxfe_ast::ir::TypedValue::temp(cxxfe_ast::ir::BaseType::UnsignedLong, 64, cxxfe_ast::TypeIndex::INVALID, size_temp);

        let index_temp = self.fresh_temp();
        let index_name = self.interner.intern_str("__range_index");
        self.bind_local(index_name, cxxfe_ast::ir::TypedValue::int_literal(0, 64), None);
        let _ = index_temp;

        let cond_label = self.fresh_label("rangefor_cond");
        let body_label = self.fresh_label("rangefor_body");
        let post_label = self.fresh_label("rangefor_post");
        let end_label = self.fresh_label("rangefor_end");

        self.emit(IrInstruction::Label(cond_label));
        let Some(index_value) = self.lookup_local(index_name) else { return };
        let cmp = self.fresh_temp();
        self.emit(IrInstruction::Compare { op: CompareOp::LessThan, lhs: index_value.clone(), rhs: size_value, result: cmp });
        let bool_shape = ValueShape { pointer_depth: 0, reference: IrRefKind::None, ..ValueShape::invalid() };
        self.emit(IrInstruction::ConditionalBranch { cond: bool_shape.with_value(ValuePayload::Temp(cmp)), if_true: body_label, if_false: end_label });

        self.emit(IrInstruction::Label(body_label));
        let element_temp = self.fresh_temp();
        self.emit(IrInstruction::ArrayAccess { array: range_value, index: index_value.clone(), result: element_temp });
        self.bind_local(binding, ValueShape::invalid().with_value(ValuePayload::Temp(element_temp)), None);
        self.loop_label_stack.push((post_label, end_label));
        self.lower_stmt(arena, body);
        self.loop_label_stack.pop();

        self.emit(IrInstruction::Label(post_label));
        let next_index = self.fresh_temp();
        self.emit(IrInstruction::BinArith {
            op: cxxfe_ast::ir::BinArithOp::Add,
            lhs: index_value,
            rhs: cxxfe_ast::ir::TypedValue::int_literal(1, 64),
            result: next_index,
        });
        self.bind_local(
            index_name,
            cxxfe_ast::ir::TypedValue::temp(cxxfe_ast::ir::BaseType::UnsignedLong, 64, cxxfe_ast::TypeIndex::INVALID, next_index),
            None,
        );
        self.emit(IrInstruction::Branch { target: cond_label });
        self.emit(IrInstruction::Label(end_label));
        self.pop_scope();
    }

    fn lower_switch(&mut self, arena: &AstArena, value: cxxfe_ast::ExprId, cases: &[(Vec<cxxfe_ast::ExprId>, StmtId)], default_case: Option<StmtId>) {
        let (switch_value, _) = self.lower_expr(arena, value);
        let end_label = self.fresh_label("switch_end");
        let mut case_labels = Vec::with_capacity(cases.len());

        for (labels, _) in cases {
            let _ = labels;
            case_labels.push(self.fresh_label("case"));
        }
        let default_label = if default_case.is_some() { self.fresh_label("default") } else { end_label };

        for (i, (labels, _)) in cases.iter().enumerate() {
            for label_expr in labels {
                let (label_value, _) = self.lower_expr(arena, *label_expr);
                let cmp = self.fresh_temp();
                self.emit(IrInstruction::Compare { op: CompareOp::Eq, lhs: switch_value.clone(), rhs: label_value, result: cmp });
                let next_check = self.fresh_label("case_check");
                let bool_shape = ValueShape { pointer_depth: 0, reference: IrRefKind::None, ..ValueShape::invalid() };
                self.emit(IrInstruction::ConditionalBranch {
                    cond: bool_shape.with_value(ValuePayload::Temp(cmp)),
                    if_true: case_labels[i],
                    if_false: next_check,
                });
                self.emit(IrInstruction::Label(next_check));
            }
        }
        self.emit(IrInstruction::Branch { target: default_label });

        self.loop_label_stack.push((end_label, end_label));
        for (i, (_, body)) in cases.iter().enumerate() {
            self.emit(IrInstruction::Label(case_labels[i]));
            self.lower_stmt(arena, *body);
        }
        if let Some(default_body) = default_case {
            self.emit(IrInstruction::Label(default_label));
            self.lower_stmt(arena, default_body);
        }
        self.loop_label_stack.pop();
        self.emit(IrInstruction::Label(end_label));
    }

    fn lower_return(&mut self, arena: &AstArena, expr: Option<cxxfe_ast::ExprId>) {
        if self.current_has_hidden_return {
            let return_name = self.interner.intern_str("__return_storage");
            if let (Some(expr_id), Some(storage)) = (expr, self.lookup_local(return_name)) {
                let (value, _) = self.lower_expr(arena, expr_id);
                self.emit(IrInstruction::DereferenceStore { pointer: storage, value });
            }
            self.emit(IrInstruction::Return(None));
            return;
        }
        let value = expr.map(|e| self.lower_expr(arena, e).0);
        self.emit(IrInstruction::Return(value));
    }

    fn lower_try(&mut self, arena: &AstArena, body: BlockId, catches: &[CatchClause]) {
        if !self.ctx.exceptions_enabled {
            self.lower_nested_block(arena, body);
            return;
        }
        let begin = self.interner.intern_str("__cxxfe_begin_try");
        let begin_result = self.fresh_temp();
        self.emit(IrInstruction::FunctionCall {
            mangled_name: begin,
            return_type: cxxfe_ast::ir::TypedValue::int_literal(0, 32),
            is_member_function: false,
            args: Vec::new(),
            result: begin_result,
        });
        self.lower_nested_block(arena, body);
        let end = self.interner.intern_str("__cxxfe_end_try");
        let end_result = self.fresh_temp();
        self.emit(IrInstruction::FunctionCall {
            mangled_name: end,
            return_type: cxxfe_ast::ir::TypedValue::int_literal(0, 32),
            is_member_function: false,
            args: Vec::new(),
            result: end_result,
        });
        for catch in catches {
            let matches = self.interner.intern_str("__cxxfe_catch_matches");
            let matched = self.fresh_temp();
            self.emit(IrInstruction::FunctionCall {
                mangled_name: matches,
                return_type: cxxfe_ast::ir::TypedValue::int_literal(0, 32),
                is_member_function: false,
                args: Vec::new(),
                result: matched,
            });
            self.push_scope();
            if let Some(binding) = catch.binding {
                self.bind_local(binding, cxxfe_ast::ir::TypedValue::int_literal(0, 64), None);
            }
            self.lower_block_contents(arena, catch.body);
            self.pop_scope();
        }
    }

    fn lower_throw(&mut self, arena: &AstArena, expr: Option<cxxfe_ast::ExprId>) {
        if !self.ctx.exceptions_enabled {
            let terminate = self.interner.intern_str("__cxxfe_terminate");
            let result = self.fresh_temp();
            self.emit(IrInstruction::FunctionCall {
                mangled_name: terminate,
                return_type: cxxfe_ast::ir::TypedValue::int_literal(0, 32),
                is_member_function: false,
                args: Vec::new(),
                result,
            });
            return;
        }
        let args = match expr {
            Some(e) => vec![self.lower_expr(arena, e).0],
            None => Vec::new(),
        };
        let throw_helper = self.interner.intern_str("__cxxfe_throw");
        let result = self.fresh_temp();
        self.emit(IrInstruction::FunctionCall {
            mangled_name: throw_helper,
            return_type: cxxfe_ast::ir::TypedValue::int_literal(0, 32),
            is_member_function: false,
            args,
            result,
        });
    }

    /// Finally blocks are inlined after the try body on the fall-through
    /// path only; early `return`/`goto` out of the try body will not run
    /// them (spec leaves SEH funclet calls as a hook, not a full model).
    fn lower_seh_try(&mut self, arena: &AstArena, body: BlockId, except_body: Option<BlockId>, finally_body: Option<BlockId>) {
        if let Some(finally) = finally_body {
            let funclet_name = self.fresh_label("seh_finally");
            self.finally_stack.push(vec![funclet_name]);
            self.lower_nested_block(arena, body);
            self.finally_stack.pop();
            self.lower_nested_block(arena, finally);
        } else {
            self.lower_nested_block(arena, body);
        }
        if let Some(except) = except_body {
            let filter = self.interner.intern_str("__cxxfe_seh_filter");
            let matched = self.fresh_temp();
            self.emit(IrInstruction::FunctionCall {
                mangled_name: filter,
                return_type: cxxfe_ast::ir::TypedValue::int_literal(0, 32),
                is_member_function: false,
                args: Vec::new(),
                result: matched,
            });
            self.lower_nested_block(arena, except);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileContext;
    use crate::mangle::DemoMangler;
    use crate::types::registry::TypeRegistry;
    use cxxfe_ast::ast::Expr;
    use cxxfe_diagnostics::DiagnosticEngine;
    use cxxfe_ast::StringInterner;

    fn label_sequence(gen: &IrGenerator, from: usize) -> Vec<&'static str> {
        gen.module().instructions[from..]
            .iter()
            .map(|i| match i {
                IrInstruction::Label(_) => "label",
                IrInstruction::ConditionalBranch { .. } => "cbranch",
                IrInstruction::Branch { .. } => "branch",
                _ => "other",
            })
            .collect()
    }

    #[test]
    fn a_while_loop_checks_its_condition_before_the_body_runs() {
        let mut arena = AstArena::new();
        let cond = arena.alloc_expr(Expr::IntLiteral(1));
        let body_block = arena.alloc_block(cxxfe_ast::ast::Block { statements: Vec::new() });
        let body = arena.alloc_stmt(Stmt::Block(body_block));
        let while_stmt = arena.alloc_stmt(Stmt::While { cond, body });
        let outer = arena.alloc_block(cxxfe_ast::ast::Block { statements: vec![while_stmt] });

        let mut registry = TypeRegistry::new();
        let interner = StringInterner::new();
        let mangler = DemoMangler;
        let ctx = CompileContext::default();
        let mut diagnostics = DiagnosticEngine::new();
        let mut gen = IrGenerator::new(&mut registry, &interner, &mangler, &ctx, &mut diagnostics);

        gen.push_scope();
        let start = gen.module().len();
        gen.lower_block_contents(&arena, outer);

        // condition label, then the check, precede anything from the body.
        assert_eq!(label_sequence(&gen, start)[..2], ["label", "cbranch"]);
    }

    #[test]
    fn a_do_while_loop_runs_its_body_before_the_first_condition_check() {
        let mut arena = AstArena::new();
        let cond = arena.alloc_expr(Expr::IntLiteral(1));
        let body_block = arena.alloc_block(cxxfe_ast::ast::Block { statements: Vec::new() });
        let body = arena.alloc_stmt(Stmt::Block(body_block));
        let do_while_stmt = arena.alloc_stmt(Stmt::DoWhile { body, cond });
        let outer = arena.alloc_block(cxxfe_ast::ast::Block { statements: vec![do_while_stmt] });

        let mut registry = TypeRegistry::new();
        let interner = StringInterner::new();
        let mangler = DemoMangler;
        let ctx = CompileContext::default();
        let mut diagnostics = DiagnosticEngine::new();
        let mut gen = IrGenerator::new(&mut registry, &interner, &mangler, &ctx, &mut diagnostics);

        gen.push_scope();
        let start = gen.module().len();
        gen.lower_block_contents(&arena, outer);

        let seq = label_sequence(&gen, start);
        let cbranch_pos = seq.iter().position(|s| *s == "cbranch").expect("condition check emitted");
        // the body's entry label comes first; the condition isn't checked until after it.
        assert_eq!(seq[0], "label");
        assert!(cbranch_pos > 0);
    }
}
