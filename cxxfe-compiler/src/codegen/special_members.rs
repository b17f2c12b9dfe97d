//! Implicit/defaulted special member synthesis (spec §4.8, §7): default
//! constructor, destructor, copy-assignment, and the `operator<=>` →
//! comparison-operator fan-out, all grounded on
//! `examples/original_source/src/CodeGen_Visitors.cpp`'s per-struct
//! constructor/destructor emission (base calls in declaration order, vtable
//! pointer store at offset zero, reverse-order destruction).

use cxxfe_ast::ast::{self, FunctionDeclNode, FunctionKind};
use cxxfe_ast::ir::{BinArithOp, CompareOp, IrInstruction, ReferenceKind as IrRefKind, ValuePayload};
use cxxfe_ast::{AstArena, StringHandle, TypeIndex};

use crate::mangle::{mangle_and_intern, ManglingInputs};
use crate::types::registry::{StructTypeInfo, TypeInfo};

use super::{IrGenerator, ValueShape};

impl<'a> IrGenerator<'a> {
    /// Deterministic mangled name for a synthesized special member. Uses
    /// the same (enclosing name, param types, constructor/destructor flag)
    /// inputs `mangle_function` would for a user-declared member of the
    /// same kind, so a base class's implicit default constructor and a
    /// derived class's base-constructor call agree on the name without
    /// either side needing the other's `FunctionDeclNode`. Namespaced
    /// structs are out of scope here: the namespace path is left empty,
    /// matching only the common case of non-namespaced aggregates.
    pub(crate) fn mangle_special(&mut self, owner: TypeIndex, kind: FunctionKind, param_type_indices: &[TypeIndex]) -> StringHandle {
        let owner_name = self.registry.get(owner).map(|t| self.interner.view_str(t.name)).unwrap_or_default();
        let param_infos: Vec<&TypeInfo> = param_type_indices.iter().filter_map(|idx| self.registry.get(*idx)).collect();
        let inputs = ManglingInputs {
            name: &owner_name,
            return_type: None,
            param_types: &param_infos,
            is_variadic: false,
            enclosing_struct: Some(&owner_name),
            namespace_path: &[],
            is_static_linkage: false,
            is_constructor: kind == FunctionKind::Constructor,
            is_destructor: kind == FunctionKind::Destructor,
            non_type_template_args: &[],
        };
        mangle_and_intern(self.mangler, self.ctx.mangling_style, &inputs, self.interner)
    }

    fn this_value(&self) -> Option<cxxfe_ast::ir::TypedValue> {
        let this_name = self.interner.intern_str(cxxfe_ast::interner::reserved::THIS);
        self.lookup_local(this_name)
    }

    /// Computes the address of a base-class or member subobject at
    /// `offset_bits` from `this_ptr`, reusing `this_ptr`'s own `TempVar`
    /// unadjusted when the offset is zero (the common single/first-base
    /// case needs no pointer arithmetic at all).
    fn subobject_address(&mut self, this_ptr: &cxxfe_ast::ir::TypedValue, offset_bits: u64, target: ValueShape) -> cxxfe_ast::ir::TypedValue {
        let pointer_shape = ValueShape { pointer_depth: target.pointer_depth.max(1), reference: IrRefKind::None, ..target };
        if offset_bits == 0 {
            return pointer_shape.with_value(this_ptr.value.clone());
        }
        let offset_bytes = cxxfe_ast::ir::TypedValue::int_literal((offset_bits / 8) as i64, 64);
        let result = self.fresh_temp();
        self.emit(IrInstruction::BinArith {
            op: BinArithOp::Add,
            lhs: this_ptr.clone(),
            rhs: offset_bytes,
            result,
        });
        pointer_shape.with_value(ValuePayload::Temp(result))
    }

    /// Emits base-constructor calls (declaration order, skipping bases with
    /// no registered constructor) and a memberwise initialization for every
    /// field not covered by an explicit initializer, struct members
    /// constructed through their own default constructor rather than
    /// zero-initialized (spec §4.8 "implicit constructor synthesis").
    fn emit_member_init_sequence(&mut self, arena: &AstArena, owner: TypeIndex, this_ptr: &cxxfe_ast::ir::TypedValue) {
        let Some(struct_info) = self.registry.struct_info(owner).cloned() else { return };

        if struct_info.has_vtable {
            if let Some(vtable_symbol) = struct_info.vtable_symbol {
                let vptr_name = self.interner.intern_str(cxxfe_ast::interner::reserved::VPTR);
                self.emit(IrInstruction::MemberStore {
                    base: this_ptr.clone(),
                    member_name: vptr_name,
                    offset_bits: 0,
                    bitfield_width: None,
                    value: cxxfe_ast::ir::TypedValue {
                        base_type: cxxfe_ast::ir::BaseType::FunctionPointer,
                        size_in_bits: 64,
                        pointer_depth: 1,
                        reference: IrRefKind::None,
                        type_index: TypeIndex::INVALID,
                        value: ValuePayload::Str(vtable_symbol),
                    },
                });
            }
        }

        for base in &struct_info.base_classes {
            let base_shape = self.shape_of_index(base.type_index);
            let base_addr = self.subobject_address(this_ptr, base.offset_bits, base_shape);
            if self.registry.struct_info(base.type_index).is_some() {
                let mangled = self.mangle_special(base.type_index, FunctionKind::Constructor, &[]);
                self.emit(IrInstruction::ConstructorCall { mangled_name: mangled, this_ptr: base_addr, args: Vec::new() });
            }
        }

        for member in &struct_info.members {
            if member.bitfield_width.is_some() && member.bit_offset.map_or(false, |b| b != 0) {
                // Combined storage unit already written by the bitfield's
                // first member; later members in the same unit fold into
                // that store rather than emitting their own.
                continue;
            }
            let member_shape = self.shape_of_index(member.type_index);
            if let Some(init) = member.default_initializer {
                if let Some(value) = self.try_const_eval_member(arena, init, member_shape) {
                    self.emit(IrInstruction::MemberStore {
                        base: this_ptr.clone(),
                        member_name: member.name,
                        offset_bits: member.offset_bits,
                        bitfield_width: member.bitfield_width,
                        value,
                    });
                    continue;
                }
            }
            if self.registry.struct_info(member.type_index).is_some() {
                let member_addr = self.subobject_address(this_ptr, member.offset_bits, member_shape);
                let mangled = self.mangle_special(member.type_index, FunctionKind::Constructor, &[]);
                self.emit(IrInstruction::ConstructorCall { mangled_name: mangled, this_ptr: member_addr, args: Vec::new() });
            }
        }
    }

    fn try_const_eval_member(&self, arena: &AstArena, id: cxxfe_ast::ExprId, shape: ValueShape) -> Option<cxxfe_ast::ir::TypedValue> {
        let no_vars = |_: StringHandle| None;
        let resolve_inst = |a: &AstArena, name: StringHandle, args: &[cxxfe_ast::ast::TemplateArgSpec]| super::resolve_instantiation_layout(self.registry, a, name, args);
        let mut evaluator = crate::eval::ConstExprEvaluator::new(self.registry, &no_vars).with_instantiation_resolver(&resolve_inst);
        let value = evaluator.evaluate(arena, id).ok()?;
        Some(shape.with_value(ValuePayload::U64(value.as_i64() as u64)))
    }

    /// Full synthesis path for a struct with no user-declared constructor:
    /// emits its own `FunctionDecl` plus default-constructor body.
    pub(crate) fn emit_implicit_default_constructor(&mut self, arena: &AstArena, owner: TypeIndex, decl: &ast::StructDeclNode) {
        let mangled = self.mangle_special(owner, FunctionKind::Constructor, &[]);
        let this_shape = self.shape_of_index(owner).pointer_to();
        self.emit(IrInstruction::FunctionDecl {
            mangled_name: mangled,
            return_type: ValueShape::invalid().with_value(ValuePayload::U64(0)),
            params: Vec::new(),
            is_variadic: false,
            is_inline: true,
            is_static_linkage: false,
            has_hidden_return_param: false,
            hidden_return_type_index: None,
        });
        self.var_counter = 1;
        self.push_scope();
        let this_name = self.interner.intern_str(cxxfe_ast::interner::reserved::THIS);
        let this_temp = self.fresh_temp();
        let this_value = this_shape.with_value(ValuePayload::Temp(this_temp));
        self.bind_local(this_name, this_value.clone(), None);
        self.emit_member_init_sequence(arena, owner, &this_value);
        self.pop_scope();
        let _ = decl;
    }

    /// Body-only path for a user-declared constructor marked `= default`
    /// (or with no body): the enclosing `compile_function` has already
    /// emitted `FunctionDecl`, pushed the scope, and bound `this`/params.
    pub(crate) fn emit_implicit_constructor_body(&mut self, arena: &AstArena, owner: TypeIndex, decl: &FunctionDeclNode) {
        let Some(this_ptr) = self.this_value() else { return };
        self.emit_member_init_sequence(arena, owner, &this_ptr);
        let _ = decl;
    }

    fn emit_member_destroy_sequence(&mut self, owner: TypeIndex, this_ptr: &cxxfe_ast::ir::TypedValue) {
        let Some(struct_info) = self.registry.struct_info(owner).cloned() else { return };

        for member in struct_info.members.iter().rev() {
            if self.registry.struct_info(member.type_index).is_some() {
                let member_shape = self.shape_of_index(member.type_index);
                let member_addr = self.subobject_address(this_ptr, member.offset_bits, member_shape);
                let mangled = self.mangle_special(member.type_index, FunctionKind::Destructor, &[]);
                self.emit(IrInstruction::DestructorCall { mangled_name: mangled, this_ptr: member_addr });
            }
        }
        for base in struct_info.base_classes.iter().rev() {
            let base_shape = self.shape_of_index(base.type_index);
            let base_addr = self.subobject_address(this_ptr, base.offset_bits, base_shape);
            if self.registry.struct_info(base.type_index).is_some() {
                let mangled = self.mangle_special(base.type_index, FunctionKind::Destructor, &[]);
                self.emit(IrInstruction::DestructorCall { mangled_name: mangled, this_ptr: base_addr });
            }
        }
    }

    pub(crate) fn emit_implicit_destructor(&mut self, _arena: &AstArena, owner: TypeIndex, decl: &ast::StructDeclNode) {
        let mangled = self.mangle_special(owner, FunctionKind::Destructor, &[]);
        let this_shape = self.shape_of_index(owner).pointer_to();
        self.emit(IrInstruction::FunctionDecl {
            mangled_name: mangled,
            return_type: ValueShape::invalid().with_value(ValuePayload::U64(0)),
            params: Vec::new(),
            is_variadic: false,
            is_inline: true,
            is_static_linkage: false,
            has_hidden_return_param: false,
            hidden_return_type_index: None,
        });
        self.var_counter = 1;
        self.push_scope();
        let this_name = self.interner.intern_str(cxxfe_ast::interner::reserved::THIS);
        let this_temp = self.fresh_temp();
        let this_value = this_shape.with_value(ValuePayload::Temp(this_temp));
        self.bind_local(this_name, this_value.clone(), None);
        self.emit_member_destroy_sequence(owner, &this_value);
        self.pop_scope();
        let _ = decl;
    }

    pub(crate) fn emit_destructor_body(&mut self, _arena: &AstArena, owner: TypeIndex, decl: &FunctionDeclNode) {
        let Some(this_ptr) = self.this_value() else { return };
        self.emit_member_destroy_sequence(owner, &this_ptr);
        let _ = decl;
    }

    fn emit_operator_assign_sequence(&mut self, owner: TypeIndex, this_ptr: &cxxfe_ast::ir::TypedValue, other_ptr: &cxxfe_ast::ir::TypedValue) {
        let Some(struct_info) = self.registry.struct_info(owner).cloned() else { return };
        for member in &struct_info.members {
            let member_shape = self.shape_of_index(member.type_index);
            let src = self.fresh_temp();
            self.emit(IrInstruction::MemberAccess {
                base: other_ptr.clone(),
                member_name: member.name,
                offset_bits: member.offset_bits,
                bitfield_width: member.bitfield_width,
                result: src,
            });
            self.emit(IrInstruction::MemberStore {
                base: this_ptr.clone(),
                member_name: member.name,
                offset_bits: member.offset_bits,
                bitfield_width: member.bitfield_width,
                value: member_shape.with_value(ValuePayload::Temp(src)),
            });
        }
    }

    pub(crate) fn emit_implicit_operator_assign(&mut self, _arena: &AstArena, owner: TypeIndex, decl: &ast::StructDeclNode) {
        let mangled = self.mangle_special(owner, FunctionKind::OperatorAssign, &[owner]);
        let this_shape = self.shape_of_index(owner).pointer_to();
        let other_name = self.interner.intern_str(cxxfe_ast::interner::reserved::OTHER);
        self.emit(IrInstruction::FunctionDecl {
            mangled_name: mangled,
            return_type: this_shape.with_value(ValuePayload::U64(0)),
            params: vec![cxxfe_ast::ir::ParamDecl { name: other_name, ty: this_shape.with_value(ValuePayload::U64(0)), is_rvalue_reference: false }],
            is_variadic: false,
            is_inline: true,
            is_static_linkage: false,
            has_hidden_return_param: false,
            hidden_return_type_index: None,
        });
        self.var_counter = 1;
        self.push_scope();
        let this_name = self.interner.intern_str(cxxfe_ast::interner::reserved::THIS);
        let this_temp = self.fresh_temp();
        let this_value = this_shape.with_value(ValuePayload::Temp(this_temp));
        self.bind_local(this_name, this_value.clone(), None);
        let other_temp = self.fresh_temp();
        let other_value = this_shape.with_value(ValuePayload::Temp(other_temp));
        self.bind_local(other_name, other_value.clone(), None);
        self.emit_operator_assign_sequence(owner, &this_value, &other_value);
        self.emit(IrInstruction::Return(Some(this_value)));
        self.pop_scope();
        let _ = decl;
    }

    pub(crate) fn emit_operator_assign_body(&mut self, owner: TypeIndex, decl: &FunctionDeclNode) {
        let Some(this_ptr) = self.this_value() else { return };
        let other_name = decl.params.first().map(|p| p.name).unwrap_or_else(|| self.interner.intern_str(cxxfe_ast::interner::reserved::OTHER));
        let Some(other_ptr) = self.lookup_local(other_name) else { return };
        self.emit_operator_assign_sequence(owner, &this_ptr, &other_ptr);
        self.emit(IrInstruction::Return(Some(this_ptr)));
    }

    /// Defaulted `operator<=>`: memberwise three-way compare in
    /// declaration order, the first non-equal member's comparison becomes
    /// the result, falling through to 0 (equal) when every member compares
    /// equal. Base-class `operator<=>` is not folded in (spec open
    /// question, left for future work).
    pub(crate) fn emit_defaulted_spaceship_body(&mut self, owner: TypeIndex) {
        let Some(this_ptr) = self.this_value() else { return };
        let other_name = self.interner.intern_str(cxxfe_ast::interner::reserved::OTHER);
        let Some(other_ptr) = self.lookup_local(other_name) else { return };
        let Some(struct_info) = self.registry.struct_info(owner).cloned() else { return };

        for member in &struct_info.members {
            let member_shape = self.shape_of_index(member.type_index);
            let bool_shape = ValueShape { pointer_depth: 0, reference: IrRefKind::None, ..member_shape };
            let lhs_temp = self.fresh_temp();
            self.emit(IrInstruction::MemberAccess {
                base: this_ptr.clone(),
                member_name: member.name,
                offset_bits: member.offset_bits,
                bitfield_width: member.bitfield_width,
                result: lhs_temp,
            });
            let rhs_temp = self.fresh_temp();
            self.emit(IrInstruction::MemberAccess {
                base: other_ptr.clone(),
                member_name: member.name,
                offset_bits: member.offset_bits,
                bitfield_width: member.bitfield_width,
                result: rhs_temp,
            });
            let lhs = member_shape.with_value(ValuePayload::Temp(lhs_temp));
            let rhs = member_shape.with_value(ValuePayload::Temp(rhs_temp));

            let not_equal = self.fresh_temp();
            self.emit(IrInstruction::Compare { op: CompareOp::NotEq, lhs: lhs.clone(), rhs: rhs.clone(), result: not_equal });
            let not_equal_label = self.fresh_label("spaceship_differs");
            let continue_label = self.fresh_label("spaceship_next");
            self.emit(IrInstruction::ConditionalBranch {
                cond: bool_shape.with_value(ValuePayload::Temp(not_equal)),
                if_true: not_equal_label,
                if_false: continue_label,
            });

            self.emit(IrInstruction::Label(not_equal_label));
            let less = self.fresh_temp();
            self.emit(IrInstruction::Compare { op: CompareOp::LessThan, lhs, rhs, result: less });
            let less_label = self.fresh_label("spaceship_less");
            let greater_label = self.fresh_label("spaceship_greater");
            self.emit(IrInstruction::ConditionalBranch {
                cond: bool_shape.with_value(ValuePayload::Temp(less)),
                if_true: less_label,
                if_false: greater_label,
            });
            self.emit(IrInstruction::Label(less_label));
            self.emit(IrInstruction::Return(Some(cxxfe_ast::ir::TypedValue::int_literal(-1, 32))));
            self.emit(IrInstruction::Label(greater_label));
            self.emit(IrInstruction::Return(Some(cxxfe_ast::ir::TypedValue::int_literal(1, 32))));

            self.emit(IrInstruction::Label(continue_label));
        }
        self.emit(IrInstruction::Return(Some(cxxfe_ast::ir::TypedValue::int_literal(0, 32))));
    }

    /// Synthesizes `==`, `!=`, `<`, `>`, `<=`, `>=` by calling the struct's
    /// `operator<=>` and comparing the result against zero (spec §4.8
    /// "synthesized comparisons").
    pub(crate) fn emit_synthesized_comparisons(&mut self, owner: TypeIndex, _decl: &ast::StructDeclNode) {
        let spaceship = self.mangle_special(owner, FunctionKind::OperatorSpaceship, &[owner]);
        for (suffix, op) in [
            ("eq", CompareOp::Eq),
            ("ne", CompareOp::NotEq),
            ("lt", CompareOp::LessThan),
            ("gt", CompareOp::GreaterThan),
            ("le", CompareOp::LessEq),
            ("ge", CompareOp::GreaterEq),
        ] {
            let owner_name = self.registry.get(owner).map(|t| self.interner.view_str(t.name)).unwrap_or_default();
            let mangled = self.interner.intern_str(&format!("{owner_name}::operator_{suffix}"));
            let this_shape = self.shape_of_index(owner).pointer_to();
            let other_name = self.interner.intern_str(cxxfe_ast::interner::reserved::OTHER);
            let bool_shape = ValueShape { pointer_depth: 0, reference: IrRefKind::None, ..ValueShape::invalid() };
            self.emit(IrInstruction::FunctionDecl {
                mangled_name: mangled,
                return_type: bool_shape.with_value(ValuePayload::U64(0)),
                params: vec![cxxfe_ast::ir::ParamDecl { name: other_name, ty: this_shape.with_value(ValuePayload::U64(0)), is_rvalue_reference: false }],
                is_variadic: false,
                is_inline: true,
                is_static_linkage: false,
                has_hidden_return_param: false,
                hidden_return_type_index: None,
            });
            self.var_counter = 1;
            self.push_scope();
            let this_name = self.interner.intern_str(cxxfe_ast::interner::reserved::THIS);
            let this_temp = self.fresh_temp();
            let this_value = this_shape.with_value(ValuePayload::Temp(this_temp));
            self.bind_local(this_name, this_value.clone(), None);
            let other_temp = self.fresh_temp();
            let other_value = this_shape.with_value(ValuePayload::Temp(other_temp));
            self.bind_local(other_name, other_value.clone(), None);

            let cmp_result = self.fresh_temp();
            self.emit(IrInstruction::FunctionCall {
                mangled_name: spaceship,
                return_type: cxxfe_ast::ir::TypedValue::int_literal(0, 32),
                is_member_function: true,
                args: vec![this_value, other_value],
                result: cmp_result,
            });
            let result = self.fresh_temp();
            self.emit(IrInstruction::Compare {
                op,
                lhs: cxxfe_ast::ir::TypedValue::temp(cxxfe_ast::ir::BaseType::Int, 32, TypeIndex::INVALID, cmp_result),
                rhs: cxxfe_ast::ir::TypedValue::int_literal(0, 32),
                result,
            });
            self.emit(IrInstruction::Return(Some(bool_shape.with_value(ValuePayload::Temp(result)))));
            self.pop_scope();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileContext;
    use crate::mangle::DemoMangler;
    use crate::types::registry::TypeRegistry;
    use cxxfe_ast::StringInterner;
    use cxxfe_diagnostics::DiagnosticEngine;

    fn empty_struct_decl(name: StringHandle) -> ast::StructDeclNode {
        ast::StructDeclNode {
            loc: cxxfe_ast::SourceLoc::unknown(),
            name,
            namespace_path: Vec::new(),
            template_params: Vec::new(),
            fields: Vec::new(),
            bases: Vec::new(),
            methods: Vec::new(),
            is_union: false,
            is_final: false,
            is_template_pattern: false,
        }
    }

    #[test]
    fn a_defaulted_spaceship_fans_out_into_exactly_six_comparisons() {
        let mut registry = TypeRegistry::new();
        let interner = StringInterner::new();
        registry.seed_builtins(&interner);
        let mangler = DemoMangler;
        let ctx = CompileContext::default();
        let mut diagnostics = DiagnosticEngine::new();
        let mut gen = IrGenerator::new(&mut registry, &interner, &mangler, &ctx, &mut diagnostics);

        let name = gen.interner.intern_str("Pair");
        let owner = gen.registry.add_struct(TypeInfo::scalar(name, cxxfe_ast::ir::BaseType::Struct, 64, 4), StructTypeInfo::default());
        let decl = empty_struct_decl(name);

        let start = gen.module().len();
        gen.emit_synthesized_comparisons(owner, &decl);
        let decls: Vec<StringHandle> = gen.module().instructions[start..]
            .iter()
            .filter_map(|i| match i {
                IrInstruction::FunctionDecl { mangled_name, .. } => Some(*mangled_name),
                _ => None,
            })
            .collect();

        assert_eq!(decls.len(), 6);
        for suffix in ["eq", "ne", "lt", "gt", "le", "ge"] {
            let expected = gen.interner.intern_str(&format!("Pair::operator_{suffix}"));
            assert!(decls.contains(&expected), "missing synthesized operator_{suffix}");
        }
    }

    #[test]
    fn each_synthesized_comparison_dispatches_through_the_spaceship() {
        let mut registry = TypeRegistry::new();
        let interner = StringInterner::new();
        registry.seed_builtins(&interner);
        let mangler = DemoMangler;
        let ctx = CompileContext::default();
        let mut diagnostics = DiagnosticEngine::new();
        let mut gen = IrGenerator::new(&mut registry, &interner, &mangler, &ctx, &mut diagnostics);

        let name = gen.interner.intern_str("Pair");
        let owner = gen.registry.add_struct(TypeInfo::scalar(name, cxxfe_ast::ir::BaseType::Struct, 64, 4), StructTypeInfo::default());
        let decl = empty_struct_decl(name);

        let spaceship = gen.mangle_special(owner, FunctionKind::OperatorSpaceship, &[owner]);
        let start = gen.module().len();
        gen.emit_synthesized_comparisons(owner, &decl);
        let call_count = gen.module().instructions[start..]
            .iter()
            .filter(|i| matches!(i, IrInstruction::FunctionCall { mangled_name, .. } if *mangled_name == spaceship))
            .count();
        assert_eq!(call_count, 6, "each of the six comparisons should call back into the same spaceship");
    }
}
