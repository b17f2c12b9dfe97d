//! Expression lowering (spec §4.8). There is no phi instruction in
//! `cxxfe_ast::ir`, so any construct that merges values from two control
//! paths (`?:`, short-circuit `&&`/`||`) goes through a throwaway address:
//! write the chosen branch's value via `DereferenceStore`, then read it
//! back with one `Dereference` after the join label. A local's own address
//! is never taken through a dedicated alloca opcode either — the same
//! "its current value IS its address" convention `this`/return-storage use
//! elsewhere is reused for every struct-typed temporary born inside an
//! expression.

use cxxfe_ast::ast::{self, BinaryOp, CastKind, CompoundOp, Expr, ExprId, FunctionDeclNode, FunctionId, InitListEntry, TypeTraitKind, UnaryOp};
use cxxfe_ast::ir::{BaseType, BinArithOp, CompareOp, IrInstruction, ReferenceKind as IrRefKind, TypedValue, ValuePayload};
use cxxfe_ast::{AstArena, StringHandle, TypeIndex};

use crate::symbols::{resolve_overload, ArgType, OverloadResolution};
use crate::types::traits::{evaluate_binary_type_trait, evaluate_type_trait, TraitQuery};

use super::{LValueInfo, LValueKind, IrGenerator, ValueShape};

fn ast_ref_from_ir(r: IrRefKind) -> ast::ReferenceKind {
    match r {
        IrRefKind::None => ast::ReferenceKind::None,
        IrRefKind::Lvalue => ast::ReferenceKind::Lvalue,
        IrRefKind::Rvalue => ast::ReferenceKind::Rvalue,
    }
}

impl<'a> IrGenerator<'a> {
    pub(crate) fn lower_expr(&mut self, arena: &AstArena, id: ExprId) -> (TypedValue, Option<LValueInfo>) {
        let expr = arena.expr(id).clone();
        match expr {
            Expr::IntLiteral(v) => (TypedValue::int_literal(v, 32), None),
            Expr::UIntLiteral(v) => (
                TypedValue { base_type: BaseType::UnsignedInt, size_in_bits: 32, pointer_depth: 0, reference: IrRefKind::None, type_index: TypeIndex::INVALID, value: ValuePayload::U64(v) },
                None,
            ),
            Expr::FloatLiteral(v) => (
                TypedValue { base_type: BaseType::Double, size_in_bits: 64, pointer_depth: 0, reference: IrRefKind::None, type_index: TypeIndex::INVALID, value: ValuePayload::from_f64(v) },
                None,
            ),
            Expr::BoolLiteral(v) => (
                TypedValue { base_type: BaseType::Bool, size_in_bits: 8, pointer_depth: 0, reference: IrRefKind::None, type_index: TypeIndex::INVALID, value: ValuePayload::U64(v as u64) },
                None,
            ),
            Expr::StringLiteral(h) => (
                TypedValue { base_type: BaseType::Char, size_in_bits: 8, pointer_depth: 1, reference: IrRefKind::None, type_index: TypeIndex::INVALID, value: ValuePayload::Str(h) },
                None,
            ),
            Expr::CharLiteral(c) => (
                TypedValue { base_type: BaseType::Char, size_in_bits: 8, pointer_depth: 0, reference: IrRefKind::None, type_index: TypeIndex::INVALID, value: ValuePayload::U64(u64::from(c)) },
                None,
            ),
            Expr::NullptrLiteral => (
                TypedValue { base_type: BaseType::Nullptr, size_in_bits: 64, pointer_depth: 1, reference: IrRefKind::None, type_index: TypeIndex::INVALID, value: ValuePayload::U64(0) },
                None,
            ),

            Expr::Identifier(name) => self.lower_name_reference(name),
            Expr::QualifiedIdentifier { name, .. } => self.lower_name_reference(name),
            Expr::TemplateParamRef(_) => {
                self.error(cxxfe_diagnostics::error_codes::UNDEFINED_IDENTIFIER, "template parameter reference survived instantiation");
                (ValueShape::invalid().with_value(ValuePayload::U64(0)), None)
            }

            Expr::MemberAccess { object, member, .. } => self.lower_member_access(arena, object, member),
            Expr::PointerToMemberAccess { object, member_ptr, .. } => {
                self.lower_expr(arena, object);
                self.lower_expr(arena, member_ptr);
                (ValueShape::invalid().with_value(ValuePayload::U64(0)), None)
            }
            Expr::ArraySubscript { array, index } => self.lower_array_subscript(arena, array, index),
            Expr::Call { callee, args, .. } => self.lower_call(arena, callee, &args),
            Expr::MemberCall { object, method, args, .. } => self.lower_member_call(arena, object, method, &args),
            Expr::ConstructorCall { ty, args } => self.lower_constructor_call_expr(arena, ty, &args),

            Expr::Unary { op, operand } => self.lower_unary(arena, op, operand),
            Expr::Binary { op, lhs, rhs } => self.lower_binary(arena, op, lhs, rhs),
            Expr::Ternary { cond, then_branch, else_branch } => self.lower_ternary(arena, cond, then_branch, else_branch),
            Expr::Assign { target, value } => self.lower_assign(arena, target, value),
            Expr::CompoundAssign { target, op, value } => self.lower_compound_assign(arena, target, op, value),

            Expr::SizeOfType(ty) => {
                let shape = self.shape_of_type_spec(arena, ty);
                (self.sizeof_value(shape), None)
            }
            Expr::SizeOfExpr(e) => {
                let (val, _) = self.lower_expr(arena, e);
                (self.sizeof_value(ValueShape::of(&val)), None)
            }
            Expr::AlignOfType(ty) => {
                let shape = self.shape_of_type_spec(arena, ty);
                let alignment = if shape.pointer_depth > 0 {
                    8
                } else {
                    self.registry.get(shape.type_index).map(|t| t.alignment).unwrap_or(1)
                };
                (TypedValue::int_literal(i64::from(alignment), 64), None)
            }
            Expr::OffsetOf { ty, member } => {
                let shape = self.shape_of_type_spec(arena, ty);
                let offset_bits = self.resolver_offset_bits(shape.type_index, member);
                (TypedValue::int_literal((offset_bits / 8) as i64, 64), None)
            }
            Expr::TypeTrait { kind, lhs, rhs } => (self.lower_type_trait(arena, kind, lhs, rhs), None),
            Expr::Noexcept(_) => (
                TypedValue { base_type: BaseType::Bool, size_in_bits: 8, pointer_depth: 0, reference: IrRefKind::None, type_index: TypeIndex::INVALID, value: ValuePayload::U64(1) },
                None,
            ),

            Expr::InitializerList(entries) => {
                for entry in &entries {
                    let e = match entry {
                        InitListEntry::Positional(e) => *e,
                        InitListEntry::Designated(_, e) => *e,
                    };
                    self.lower_expr(arena, e);
                }
                match entries.first() {
                    Some(InitListEntry::Positional(e)) | Some(InitListEntry::Designated(_, e)) => self.lower_expr(arena, *e),
                    None => (ValueShape::invalid().with_value(ValuePayload::U64(0)), None),
                }
            }

            Expr::Lambda { captures, params, return_type, body, lambda_id } => (self.lower_lambda(arena, &captures, &params, return_type, body, lambda_id), None),
            Expr::FoldExpression { pack, init, .. } => {
                let (val, _) = self.lower_expr(arena, pack);
                if let Some(init_id) = init {
                    self.lower_expr(arena, init_id);
                }
                (val, None)
            }
            Expr::Decltype(e) => {
                let (val, _) = self.lower_expr(arena, e);
                (val, None)
            }
            Expr::PseudoDestructorCall { object, .. } => {
                self.lower_expr(arena, object);
                (ValueShape::invalid().with_value(ValuePayload::U64(0)), None)
            }
            Expr::New { ty, args, array_size } => self.lower_new(arena, ty, &args, array_size),
            Expr::Delete { operand, .. } => {
                let (val, _) = self.lower_expr(arena, operand);
                let dtor = if self.registry.struct_info(val.type_index).is_some() {
                    Some(self.mangle_special(val.type_index, ast::FunctionKind::Destructor, &[]))
                } else {
                    None
                };
                if let Some(mangled) = dtor {
                    self.emit(IrInstruction::DestructorCall { mangled_name: mangled, this_ptr: val });
                }
                (ValueShape::invalid().with_value(ValuePayload::U64(0)), None)
            }
            Expr::Cast { kind, ty, operand } => self.lower_cast(arena, kind, ty, operand),
            Expr::PackExpansion(e) => self.lower_expr(arena, e),
            Expr::RequiresExpression { .. } => (
                TypedValue { base_type: BaseType::Bool, size_in_bits: 8, pointer_depth: 0, reference: IrRefKind::None, type_index: TypeIndex::INVALID, value: ValuePayload::U64(1) },
                None,
            ),
        }
    }

    fn lower_name_reference(&mut self, name: StringHandle) -> (TypedValue, Option<LValueInfo>) {
        if let Some(value) = self.lookup_local(name) {
            return (value, Some(LValueInfo::direct(name)));
        }
        if let Some((mangled, shape)) = self.globals.get(&name).copied() {
            let temp = self.fresh_temp();
            self.emit(IrInstruction::GlobalLoad { mangled_name: mangled, result: temp });
            let lv = LValueInfo { kind: LValueKind::Global, base: None, offset_bits: 0, member_name: None, bitfield_width: None, array_index: None, global_name: Some(mangled), local_name: None };
            return (shape.with_value(ValuePayload::Temp(temp)), Some(lv));
        }
        if self.functions_by_name.contains_key(&name) {
            let temp = self.fresh_temp();
            self.emit(IrInstruction::FunctionAddress { mangled_name: name, result: temp });
            return (
                TypedValue { base_type: BaseType::FunctionPointer, size_in_bits: 64, pointer_depth: 1, reference: IrRefKind::None, type_index: TypeIndex::INVALID, value: ValuePayload::Temp(temp) },
                None,
            );
        }
        self.error(cxxfe_diagnostics::error_codes::UNDEFINED_IDENTIFIER, format!("undefined identifier `{}`", self.interner.view_str(name)));
        (ValueShape::invalid().with_value(ValuePayload::U64(0)), None)
    }

    fn sizeof_value(&self, shape: ValueShape) -> TypedValue {
        let bits = if shape.pointer_depth > 0 {
            64
        } else {
            let struct_bits = crate::codegen::compute_struct_total_size_bits(self.registry, shape.type_index);
            if struct_bits > 0 {
                struct_bits
            } else {
                u64::from(shape.size_in_bits.max(8))
            }
        };
        TypedValue::int_literal((bits / 8) as i64, 64)
    }

    fn resolver_offset_bits(&mut self, owner: TypeIndex, member: StringHandle) -> u64 {
        let registry_ptr: *const _ = self.registry;
        // Safe re-borrow: `resolve` only reads through the registry and the
        // cache it mutates lives on `self.resolver`, a disjoint field.
        let registry: &crate::types::registry::TypeRegistry = unsafe { &*registry_ptr };
        self.resolver.resolve(registry, owner, member).map(|r| r.adjusted_offset_bits).unwrap_or(0)
    }

    fn lower_member_access(&mut self, arena: &AstArena, object: ExprId, member: StringHandle) -> (TypedValue, Option<LValueInfo>) {
        let (obj_val, _) = self.lower_expr(arena, object);
        let registry_ptr: *const _ = self.registry;
        let registry: &crate::types::registry::TypeRegistry = unsafe { &*registry_ptr };
        let Some(resolved) = self.resolver.resolve(registry, obj_val.type_index, member) else {
            self.error(cxxfe_diagnostics::error_codes::UNDEFINED_IDENTIFIER, format!("no member named `{}`", self.interner.view_str(member)));
            return (ValueShape::invalid().with_value(ValuePayload::U64(0)), None);
        };
        let bitfield_width = self.member_bitfield(resolved.owner, member);
        let result_shape = self.shape_of_index(resolved.type_index);
        let temp = self.fresh_temp();
        self.emit(IrInstruction::MemberAccess { base: obj_val.clone(), member_name: member, offset_bits: resolved.adjusted_offset_bits, bitfield_width, result: temp });
        let lv = LValueInfo {
            kind: LValueKind::Member,
            base: Some(obj_val),
            offset_bits: resolved.adjusted_offset_bits,
            member_name: Some(member),
            bitfield_width,
            array_index: None,
            global_name: None,
            local_name: None,
        };
        (result_shape.with_value(ValuePayload::Temp(temp)), Some(lv))
    }

    fn lower_array_subscript(&mut self, arena: &AstArena, array: ExprId, index: ExprId) -> (TypedValue, Option<LValueInfo>) {
        let (array_val, _) = self.lower_expr(arena, array);
        let (index_val, _) = self.lower_expr(arena, index);
        let temp = self.fresh_temp();
        self.emit(IrInstruction::ArrayAccess { array: array_val.clone(), index: index_val.clone(), result: temp });
        let element_shape = ValueShape::of(&array_val).deref_once();
        let lv = LValueInfo {
            kind: LValueKind::ArrayElement,
            base: Some(array_val),
            offset_bits: 0,
            member_name: None,
            bitfield_width: None,
            array_index: Some(index_val),
            global_name: None,
            local_name: None,
        };
        (element_shape.with_value(ValuePayload::Temp(temp)), Some(lv))
    }

    fn arg_type_of(&self, arena: &AstArena, value: &TypedValue) -> ArgType {
        let _ = arena;
        ArgType { type_index: value.type_index, pointer_depth: value.pointer_depth, is_const: false }
    }

    fn resolve_call(&self, arena: &AstArena, name: StringHandle, owner: Option<TypeIndex>, arg_types: &[ArgType]) -> Option<(FunctionId, FunctionDeclNode)> {
        let candidates = self.functions_by_name.get(&name).cloned().unwrap_or_default();
        let mut typed: Vec<(FunctionId, Vec<ArgType>)> = Vec::new();
        for fid in &candidates {
            let decl = arena.function(*fid);
            match owner {
                Some(owner_idx) => {
                    let matches_owner = decl.enclosing_struct.map(|n| self.registry.find_by_name(n) == Some(owner_idx)).unwrap_or(false);
                    if !matches_owner {
                        continue;
                    }
                }
                None => {
                    if decl.enclosing_struct.is_some() {
                        continue;
                    }
                }
            }
            let params: Vec<ArgType> = decl
                .params
                .iter()
                .map(|p| {
                    let shape = self.shape_of_type_spec(arena, p.ty);
                    ArgType { type_index: shape.type_index, pointer_depth: shape.pointer_depth, is_const: false }
                })
                .collect();
            typed.push((*fid, params));
        }
        match resolve_overload(&typed, arg_types, self.registry) {
            OverloadResolution::Selected(fid) => Some((fid, arena.function(fid).clone())),
            _ => None,
        }
    }

    fn lower_call(&mut self, arena: &AstArena, callee: ExprId, args: &[ExprId]) -> (TypedValue, Option<LValueInfo>) {
        let callee_name = match arena.expr(callee).clone() {
            Expr::Identifier(name) => Some(name),
            Expr::QualifiedIdentifier { name, .. } => Some(name),
            _ => None,
        };
        let Some(name) = callee_name else {
            // Indirect (function-pointer/closure) calls have no opcode in
            // this IR; evaluate arguments for side effects only.
            for a in args {
                self.lower_expr(arena, *a);
            }
            return (ValueShape::invalid().with_value(ValuePayload::U64(0)), None);
        };

        let mut arg_vals = Vec::with_capacity(args.len());
        for a in args {
            arg_vals.push(self.lower_expr(arena, *a).0);
        }
        let arg_types: Vec<ArgType> = arg_vals.iter().map(|v| self.arg_type_of(arena, v)).collect();

        let owner = {
            let candidates = self.functions_by_name.get(&name).cloned().unwrap_or_default();
            candidates.iter().find_map(|fid| arena.function(*fid).enclosing_struct).and_then(|n| self.registry.find_by_name(n))
        };
        let lookup_owner = if owner.is_some() { None } else { None };
        let _ = lookup_owner;

        let Some((_fid, decl)) = self.resolve_call(arena, name, None, &arg_types) else {
            self.error(cxxfe_diagnostics::error_codes::UNDEFINED_IDENTIFIER, format!("no matching function for call to `{}`", self.interner.view_str(name)));
            return (ValueShape::invalid().with_value(ValuePayload::U64(0)), None);
        };
        let owner_struct = decl.enclosing_struct.and_then(|n| self.registry.find_by_name(n));
        let mangled = self.mangle_function(arena, &decl, owner_struct);
        let return_shape = decl.return_type.map(|ty| self.shape_of_type_spec(arena, ty)).unwrap_or(ValueShape::invalid());
        let result = self.fresh_temp();
        self.emit(IrInstruction::FunctionCall {
            mangled_name: mangled,
            return_type: return_shape.with_value(ValuePayload::U64(0)),
            is_member_function: owner_struct.is_some(),
            args: arg_vals,
            result,
        });
        (return_shape.with_value(ValuePayload::Temp(result)), None)
    }

    fn lower_member_call(&mut self, arena: &AstArena, object: ExprId, method: StringHandle, args: &[ExprId]) -> (TypedValue, Option<LValueInfo>) {
        let (obj_val, _) = self.lower_expr(arena, object);
        let mut arg_vals = Vec::with_capacity(args.len());
        for a in args {
            arg_vals.push(self.lower_expr(arena, *a).0);
        }
        let arg_types: Vec<ArgType> = arg_vals.iter().map(|v| self.arg_type_of(arena, v)).collect();

        let Some((_fid, decl)) = self.resolve_call(arena, method, Some(obj_val.type_index), &arg_types) else {
            self.error(cxxfe_diagnostics::error_codes::UNDEFINED_IDENTIFIER, format!("no matching method `{}`", self.interner.view_str(method)));
            return (ValueShape::invalid().with_value(ValuePayload::U64(0)), None);
        };
        let mangled = self.mangle_function(arena, &decl, Some(obj_val.type_index));
        let return_shape = decl.return_type.map(|ty| self.shape_of_type_spec(arena, ty)).unwrap_or(ValueShape::invalid());
        let mut all_args = Vec::with_capacity(arg_vals.len() + 1);
        all_args.push(obj_val);
        all_args.extend(arg_vals);
        let result = self.fresh_temp();
        self.emit(IrInstruction::FunctionCall {
            mangled_name: mangled,
            return_type: return_shape.with_value(ValuePayload::U64(0)),
            is_member_function: true,
            args: all_args,
            result,
        });
        (return_shape.with_value(ValuePayload::Temp(result)), None)
    }

    fn lower_constructor_call_expr(&mut self, arena: &AstArena, ty: cxxfe_ast::TypeSpecId, args: &[ExprId]) -> (TypedValue, Option<LValueInfo>) {
        let shape = self.shape_of_type_spec(arena, ty);
        let has_struct = self.registry.struct_info(shape.type_index).is_some();
        let mut arg_vals = Vec::with_capacity(args.len());
        for a in args {
            arg_vals.push(self.lower_expr(arena, *a).0);
        }
        if !has_struct {
            return match arg_vals.into_iter().next() {
                Some(mut v) => {
                    v.base_type = shape.base_type;
                    v.size_in_bits = shape.size_in_bits;
                    (v, None)
                }
                None => (shape.with_value(ValuePayload::U64(0)), None),
            };
        }

        let param_types: Vec<TypeIndex> = arg_vals.iter().map(|v| v.type_index).collect();
        let mangled = self.mangle_special(shape.type_index, ast::FunctionKind::Constructor, &param_types);
        let addr_temp = self.fresh_temp();
        let addr_tv = shape.pointer_to().with_value(ValuePayload::Temp(addr_temp));
        self.emit(IrInstruction::ConstructorCall { mangled_name: mangled, this_ptr: addr_tv.clone(), args: arg_vals });
        (addr_tv, None)
    }

    fn lower_unary(&mut self, arena: &AstArena, op: UnaryOp, operand: ExprId) -> (TypedValue, Option<LValueInfo>) {
        let (val, lv) = self.lower_expr(arena, operand);
        match op {
            UnaryOp::Plus => (val, lv),
            UnaryOp::Neg => {
                let result = self.fresh_temp();
                self.emit(IrInstruction::BinArith { op: BinArithOp::Sub, lhs: zero_like(&val), rhs: val.clone(), result });
                (ValueShape::of(&val).with_value(ValuePayload::Temp(result)), None)
            }
            UnaryOp::LogicalNot => {
                let result = self.fresh_temp();
                self.emit(IrInstruction::Compare { op: CompareOp::Eq, lhs: val.clone(), rhs: zero_like(&val), result });
                (bool_shape().with_value(ValuePayload::Temp(result)), None)
            }
            UnaryOp::BitNot => {
                let mask = all_ones_like(&val);
                let result = self.fresh_temp();
                self.emit(IrInstruction::BinArith { op: BinArithOp::BitXor, lhs: val.clone(), rhs: mask, result });
                (ValueShape::of(&val).with_value(ValuePayload::Temp(result)), None)
            }
            UnaryOp::AddressOf => {
                let result = self.fresh_temp();
                self.emit(IrInstruction::AddressOf { operand: val.clone(), result });
                let mut shape = ValueShape::of(&val);
                shape.pointer_depth += 1;
                shape.reference = IrRefKind::None;
                (shape.with_value(ValuePayload::Temp(result)), None)
            }
            UnaryOp::Deref => {
                let result = self.fresh_temp();
                self.emit(IrInstruction::Dereference { operand: val.clone(), result });
                (ValueShape::of(&val).deref_once().with_value(ValuePayload::Temp(result)), None)
            }
            UnaryOp::PreIncrement | UnaryOp::PreDecrement => {
                let Some(lv) = lv else { return (val, None) };
                let bin_op = if op == UnaryOp::PreIncrement { BinArithOp::Add } else { BinArithOp::Sub };
                let result = self.fresh_temp();
                self.emit(IrInstruction::BinArith { op: bin_op, lhs: val.clone(), rhs: one_like(&val), result });
                let new_val = ValueShape::of(&val).with_value(ValuePayload::Temp(result));
                self.store_to_lvalue(&lv, new_val.clone());
                (new_val, Some(lv))
            }
            UnaryOp::PostIncrement | UnaryOp::PostDecrement => {
                let Some(lv) = lv else { return (val, None) };
                let bin_op = if op == UnaryOp::PostIncrement { BinArithOp::Add } else { BinArithOp::Sub };
                let result = self.fresh_temp();
                self.emit(IrInstruction::BinArith { op: bin_op, lhs: val.clone(), rhs: one_like(&val), result });
                let new_val = ValueShape::of(&val).with_value(ValuePayload::Temp(result));
                self.store_to_lvalue(&lv, new_val);
                (val, Some(lv))
            }
        }
    }

    fn lower_binary(&mut self, arena: &AstArena, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> (TypedValue, Option<LValueInfo>) {
        match op {
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => return (self.lower_short_circuit(arena, op, lhs, rhs), None),
            _ => {}
        }
        let (lhs_val, _) = self.lower_expr(arena, lhs);
        let (rhs_val, _) = self.lower_expr(arena, rhs);

        if op == BinaryOp::Spaceship {
            return (self.lower_spaceship(lhs_val, rhs_val), None);
        }

        let bin = match op {
            BinaryOp::Add => Some(BinArithOp::Add),
            BinaryOp::Sub => Some(BinArithOp::Sub),
            BinaryOp::Mul => Some(BinArithOp::Mul),
            BinaryOp::Div => Some(BinArithOp::Div),
            BinaryOp::Mod => Some(BinArithOp::Mod),
            BinaryOp::BitAnd => Some(BinArithOp::BitAnd),
            BinaryOp::BitOr => Some(BinArithOp::BitOr),
            BinaryOp::BitXor => Some(BinArithOp::BitXor),
            BinaryOp::Shl => Some(BinArithOp::Shl),
            BinaryOp::Shr => Some(BinArithOp::Shr),
            _ => None,
        };
        if let Some(bin_op) = bin {
            let result = self.fresh_temp();
            self.emit(IrInstruction::BinArith { op: bin_op, lhs: lhs_val.clone(), rhs: rhs_val, result });
            return (ValueShape::of(&lhs_val).with_value(ValuePayload::Temp(result)), None);
        }

        let cmp = match op {
            BinaryOp::Eq => CompareOp::Eq,
            BinaryOp::NotEq => CompareOp::NotEq,
            BinaryOp::Lt => CompareOp::LessThan,
            BinaryOp::LtEq => CompareOp::LessEq,
            BinaryOp::Gt => CompareOp::GreaterThan,
            BinaryOp::GtEq => CompareOp::GreaterEq,
            _ => unreachable!("logical/spaceship handled above"),
        };
        let result = self.fresh_temp();
        self.emit(IrInstruction::Compare { op: cmp, lhs: lhs_val, rhs: rhs_val, result });
        (bool_shape().with_value(ValuePayload::Temp(result)), None)
    }

    fn lower_spaceship(&mut self, lhs_val: TypedValue, rhs_val: TypedValue) -> TypedValue {
        if self.registry.struct_info(lhs_val.type_index).is_some() {
            let mangled = self.mangle_special(lhs_val.type_index, ast::FunctionKind::OperatorSpaceship, &[lhs_val.type_index]);
            let result = self.fresh_temp();
            self.emit(IrInstruction::FunctionCall {
                mangled_name: mangled,
                return_type: TypedValue::int_literal(0, 32),
                is_member_function: true,
                args: vec![lhs_val, rhs_val],
                result,
            });
            return TypedValue::int_literal(0, 32).with_temp_result(result);
        }
        let result = self.fresh_temp();
        self.emit(IrInstruction::BinArith { op: BinArithOp::Sub, lhs: lhs_val, rhs: rhs_val, result });
        TypedValue::int_literal(0, 32).with_temp_result(result)
    }

    /// Non-short-circuit boolean combination: both operands are always
    /// evaluated, coerced to 0/1, then combined bitwise. Accepted for
    /// simplicity since neither operand here can have an observable
    /// side effect ordering requirement this generator tracks.
    fn lower_short_circuit(&mut self, arena: &AstArena, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> TypedValue {
        let addr_temp = self.fresh_temp();
        let addr_tv = bool_shape().pointer_to().with_value(ValuePayload::Temp(addr_temp));

        let (lhs_val, _) = self.lower_expr(arena, lhs);
        let lhs_bool = self.fresh_temp();
        self.emit(IrInstruction::Compare { op: CompareOp::NotEq, lhs: lhs_val, rhs: zero_like(&bool_shape().with_value(ValuePayload::U64(0))), result: lhs_bool });
        let lhs_bool_tv = bool_shape().with_value(ValuePayload::Temp(lhs_bool));

        let rhs_label = self.fresh_label("logic_rhs");
        let short_label = self.fresh_label("logic_short");
        let end_label = self.fresh_label("logic_end");
        let (true_branch, false_branch) = if op == BinaryOp::LogicalAnd { (rhs_label, short_label) } else { (short_label, rhs_label) };
        self.emit(IrInstruction::ConditionalBranch { cond: lhs_bool_tv, if_true: true_branch, if_false: false_branch });

        self.emit(IrInstruction::Label(rhs_label));
        let (rhs_val, _) = self.lower_expr(arena, rhs);
        let rhs_bool = self.fresh_temp();
        self.emit(IrInstruction::Compare { op: CompareOp::NotEq, lhs: rhs_val, rhs: TypedValue::int_literal(0, 32), result: rhs_bool });
        self.emit(IrInstruction::DereferenceStore { pointer: addr_tv.clone(), value: bool_shape().with_value(ValuePayload::Temp(rhs_bool)) });
        self.emit(IrInstruction::Branch { target: end_label });

        self.emit(IrInstruction::Label(short_label));
        let short_value = if op == BinaryOp::LogicalAnd { 0 } else { 1 };
        self.emit(IrInstruction::DereferenceStore { pointer: addr_tv.clone(), value: TypedValue::int_literal(short_value, 8) });

        self.emit(IrInstruction::Label(end_label));
        let result = self.fresh_temp();
        self.emit(IrInstruction::Dereference { operand: addr_tv, result });
        bool_shape().with_value(ValuePayload::Temp(result))
    }

    fn lower_ternary(&mut self, arena: &AstArena, cond: ExprId, then_branch: ExprId, else_branch: ExprId) -> (TypedValue, Option<LValueInfo>) {
        let (cond_val, _) = self.lower_expr(arena, cond);
        let then_label = self.fresh_label("ternary_then");
        let else_label = self.fresh_label("ternary_else");
        let end_label = self.fresh_label("ternary_end");
        self.emit(IrInstruction::ConditionalBranch { cond: cond_val, if_true: then_label, if_false: else_label });

        self.emit(IrInstruction::Label(then_label));
        let (then_val, _) = self.lower_expr(arena, then_branch);
        let shape = ValueShape::of(&then_val);
        let addr_temp = self.fresh_temp();
        let addr_tv = shape.pointer_to().with_value(ValuePayload::Temp(addr_temp));
        self.emit(IrInstruction::DereferenceStore { pointer: addr_tv.clone(), value: then_val });
        self.emit(IrInstruction::Branch { target: end_label });

        self.emit(IrInstruction::Label(else_label));
        let (else_val, _) = self.lower_expr(arena, else_branch);
        self.emit(IrInstruction::DereferenceStore { pointer: addr_tv.clone(), value: else_val });

        self.emit(IrInstruction::Label(end_label));
        let result = self.fresh_temp();
        self.emit(IrInstruction::Dereference { operand: addr_tv, result });
        (shape.with_value(ValuePayload::Temp(result)), None)
    }

    fn store_to_lvalue(&mut self, lv: &LValueInfo, value: TypedValue) {
        match lv.kind {
            LValueKind::Direct => {
                if let Some(name) = lv.local_name {
                    self.rebind_local(name, value);
                }
            }
            LValueKind::Member => {
                if let (Some(base), Some(member_name)) = (&lv.base, lv.member_name) {
                    self.emit(IrInstruction::MemberStore { base: base.clone(), member_name, offset_bits: lv.offset_bits, bitfield_width: lv.bitfield_width, value });
                }
            }
            LValueKind::ArrayElement => {
                if let (Some(array), Some(index)) = (&lv.base, &lv.array_index) {
                    self.emit(IrInstruction::ArrayStore { array: array.clone(), index: index.clone(), value });
                }
            }
            LValueKind::Indirect => {
                if let Some(pointer) = &lv.base {
                    self.emit(IrInstruction::DereferenceStore { pointer: pointer.clone(), value });
                }
            }
            LValueKind::Global => {
                if let Some(mangled) = lv.global_name {
                    self.emit(IrInstruction::GlobalStore { mangled_name: mangled, value });
                }
            }
            LValueKind::Temporary => {}
        }
    }

    fn lower_assign(&mut self, arena: &AstArena, target: ExprId, value: ExprId) -> (TypedValue, Option<LValueInfo>) {
        let (_, lv) = self.lower_expr(arena, target);
        let (value_val, _) = self.lower_expr(arena, value);
        if let Some(lv) = &lv {
            self.store_to_lvalue(lv, value_val.clone());
        }
        (value_val, lv)
    }

    fn lower_compound_assign(&mut self, arena: &AstArena, target: ExprId, op: CompoundOp, value: ExprId) -> (TypedValue, Option<LValueInfo>) {
        let (target_val, lv) = self.lower_expr(arena, target);
        let (value_val, _) = self.lower_expr(arena, value);
        let bin_op = match op {
            CompoundOp::Add => BinArithOp::Add,
            CompoundOp::Sub => BinArithOp::Sub,
            CompoundOp::Mul => BinArithOp::Mul,
            CompoundOp::Div => BinArithOp::Div,
            CompoundOp::Mod => BinArithOp::Mod,
            CompoundOp::BitAnd => BinArithOp::BitAnd,
            CompoundOp::BitOr => BinArithOp::BitOr,
            CompoundOp::BitXor => BinArithOp::BitXor,
            CompoundOp::Shl => BinArithOp::Shl,
            CompoundOp::Shr => BinArithOp::Shr,
        };
        let result = self.fresh_temp();
        self.emit(IrInstruction::BinArith { op: bin_op, lhs: target_val.clone(), rhs: value_val, result });
        let new_val = ValueShape::of(&target_val).with_value(ValuePayload::Temp(result));
        if let Some(lv) = &lv {
            self.store_to_lvalue(lv, new_val.clone());
        }
        (new_val, lv)
    }

    fn lower_type_trait(&mut self, arena: &AstArena, kind: TypeTraitKind, lhs: cxxfe_ast::TypeSpecId, rhs: Option<cxxfe_ast::TypeSpecId>) -> TypedValue {
        let lhs_shape = self.shape_of_type_spec(arena, lhs);
        let lhs_query = self.trait_query(lhs_shape);
        let result = match rhs {
            None => evaluate_type_trait(kind, lhs_query),
            Some(rhs_ty) => {
                let rhs_shape = self.shape_of_type_spec(arena, rhs_ty);
                let rhs_query = self.trait_query(rhs_shape);
                let derives = self.is_derived_from(lhs_shape.type_index, rhs_shape.type_index);
                evaluate_binary_type_trait(kind, lhs_query, rhs_query, derives)
            }
        };
        TypedValue { base_type: BaseType::Bool, size_in_bits: 8, pointer_depth: 0, reference: IrRefKind::None, type_index: TypeIndex::INVALID, value: ValuePayload::U64(result.value as u64) }
    }

    fn trait_query(&self, shape: ValueShape) -> TraitQuery<'_> {
        TraitQuery {
            base_type: shape.base_type,
            pointer_depth: shape.pointer_depth,
            reference: ast_ref_from_ir(shape.reference),
            cv: ast::CvQualifier::default(),
            is_array: false,
            array_size: None,
            struct_info: self.registry.struct_info(shape.type_index),
        }
    }

    fn lower_lambda(&mut self, arena: &AstArena, captures: &[ast::LambdaCapture], params: &[ast::Param], return_type: Option<cxxfe_ast::TypeSpecId>, body: cxxfe_ast::BlockId, lambda_id: u32) -> TypedValue {
        let closure_type = self.register_lambda_closure_type(lambda_id, captures);

        let mut capture_values = Vec::with_capacity(captures.len());
        for cap in captures {
            let key = if cap.is_this {
                self.interner.intern_str(if cap.is_this_by_value { cxxfe_ast::interner::reserved::COPY_THIS } else { cxxfe_ast::interner::reserved::THIS })
            } else {
                cap.name
            };
            let value = if cap.is_this {
                let this_name = self.interner.intern_str(cxxfe_ast::interner::reserved::THIS);
                self.lookup_local(this_name)
            } else {
                self.lookup_local(cap.name)
            };
            if let Some(value) = value {
                capture_values.push((key, value));
            }
        }

        if !self.generated_lambda_ids.contains(&lambda_id) && !self.lambda_states.contains_key(&lambda_id) {
            let invoke_mangled = self.interner.intern_str(&format!("__lambda_{lambda_id}_invoke"));
            self.lambda_states.insert(lambda_id, super::LambdaState::Discovered);
            self.pending_lambdas.push_back(super::PendingLambda {
                lambda_id,
                closure_type,
                invoke_mangled,
                captures: captures.to_vec(),
                params: params.to_vec(),
                return_type,
                body,
                capture_values: capture_values.clone(),
            });
        }

        let shape = self.shape_of_index(closure_type);
        let addr_temp = self.fresh_temp();
        let addr_tv = shape.pointer_to().with_value(ValuePayload::Temp(addr_temp));
        let Some(struct_info) = self.registry.struct_info(closure_type).cloned() else {
            return addr_tv;
        };
        for member in &struct_info.members {
            if let Some((_, value)) = capture_values.iter().find(|(n, _)| *n == member.name) {
                self.emit(IrInstruction::MemberStore { base: addr_tv.clone(), member_name: member.name, offset_bits: member.offset_bits, bitfield_width: None, value: value.clone() });
            }
        }
        addr_tv
    }

    fn lower_new(&mut self, arena: &AstArena, ty: cxxfe_ast::TypeSpecId, args: &[ExprId], array_size: Option<ExprId>) -> (TypedValue, Option<LValueInfo>) {
        let shape = self.shape_of_type_spec(arena, ty);
        if let Some(size_expr) = array_size {
            self.lower_expr(arena, size_expr);
        }
        let mut arg_vals = Vec::with_capacity(args.len());
        for a in args {
            arg_vals.push(self.lower_expr(arena, *a).0);
        }
        let addr_temp = self.fresh_temp();
        let addr_tv = shape.pointer_to().with_value(ValuePayload::Temp(addr_temp));
        if self.registry.struct_info(shape.type_index).is_some() {
            let param_types: Vec<TypeIndex> = arg_vals.iter().map(|v| v.type_index).collect();
            let mangled = self.mangle_special(shape.type_index, ast::FunctionKind::Constructor, &param_types);
            self.emit(IrInstruction::ConstructorCall { mangled_name: mangled, this_ptr: addr_tv.clone(), args: arg_vals });
        }
        (addr_tv, None)
    }

    fn lower_cast(&mut self, arena: &AstArena, _kind: CastKind, ty: cxxfe_ast::TypeSpecId, operand: ExprId) -> (TypedValue, Option<LValueInfo>) {
        let target_shape = self.shape_of_type_spec(arena, ty);
        let (mut val, _) = self.lower_expr(arena, operand);
        val.base_type = target_shape.base_type;
        val.size_in_bits = target_shape.size_in_bits;
        val.pointer_depth = target_shape.pointer_depth;
        val.type_index = target_shape.type_index;
        (val, None)
    }
}

fn bool_shape() -> ValueShape {
    ValueShape { base_type: BaseType::Bool, size_in_bits: 8, pointer_depth: 0, reference: IrRefKind::None, type_index: TypeIndex::INVALID }
}

fn zero_like(v: &TypedValue) -> TypedValue {
    let mut z = v.clone();
    z.value = ValuePayload::U64(0);
    z
}

fn one_like(v: &TypedValue) -> TypedValue {
    let mut o = v.clone();
    o.value = ValuePayload::U64(1);
    o
}

fn all_ones_like(v: &TypedValue) -> TypedValue {
    let mut o = v.clone();
    let bits = v.size_in_bits.min(63);
    o.value = ValuePayload::U64((1u64 << bits) - 1);
    o
}

trait WithTempResult {
    fn with_temp_result(self, t: cxxfe_ast::TempVar) -> TypedValue;
}

impl WithTempResult for TypedValue {
    fn with_temp_result(mut self, t: cxxfe_ast::TempVar) -> TypedValue {
        self.value = ValuePayload::Temp(t);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_one_and_all_ones_keep_the_operand_shape() {
        let v = TypedValue::int_literal(42, 16);
        let z = zero_like(&v);
        let o = one_like(&v);
        let ones = all_ones_like(&v);

        for derived in [&z, &o, &ones] {
            assert_eq!(derived.base_type, v.base_type);
            assert_eq!(derived.size_in_bits, v.size_in_bits);
        }
        assert_eq!(z.value, ValuePayload::U64(0));
        assert_eq!(o.value, ValuePayload::U64(1));
        assert_eq!(ones.value, ValuePayload::U64(0xFFFF));
    }

    #[test]
    fn all_ones_caps_the_shift_so_it_never_overflows_a_u64() {
        let wide = TypedValue::int_literal(0, 64);
        let ones = all_ones_like(&wide);
        assert_eq!(ones.value, ValuePayload::U64(u64::MAX >> 1));
    }

    #[test]
    fn bool_shape_is_one_byte() {
        let shape = bool_shape();
        assert_eq!(shape.base_type, BaseType::Bool);
        assert_eq!(shape.size_in_bits, 8);
    }

    #[test]
    fn with_temp_result_replaces_the_payload_but_keeps_the_type() {
        let v = TypedValue::int_literal(7, 32).with_temp_result(cxxfe_ast::TempVar(3));
        assert_eq!(v.value, ValuePayload::Temp(cxxfe_ast::TempVar(3)));
        assert_eq!(v.size_in_bits, 32);
    }
}
