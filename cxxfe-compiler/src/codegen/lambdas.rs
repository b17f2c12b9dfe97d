//! Lambda closure synthesis (spec §4.8 P9): each distinct `lambda_id` gets
//! a synthesized capture struct plus an `operator()` body, generated at
//! most once no matter how many times the expression is visited (templates
//! can walk the same lambda node more than once during instantiation).

use cxxfe_ast::ast::{CaptureMode, LambdaCapture};
use cxxfe_ast::ir::{IrInstruction, ParamDecl, ReferenceKind as IrRefKind, ValuePayload};
use cxxfe_ast::{interner::reserved, AstArena, TypeIndex};

use crate::types::registry::{Access, StructTypeInfo, TypeInfo};

use super::{IrGenerator, LambdaState, PendingLambda, ValueShape};

impl<'a> IrGenerator<'a> {
    /// Registers `__lambda_<id>`'s capture struct, one member per capture in
    /// declaration order, packed with no padding between members.
    pub(crate) fn register_lambda_closure_type(&mut self, lambda_id: u32, captures: &[LambdaCapture]) -> TypeIndex {
        let type_name = self.interner.intern_str(&format!("__lambda_{lambda_id}"));

        let mut members = Vec::with_capacity(captures.len());
        let mut running_bits = 0u64;
        for cap in captures {
            let member_name = if cap.is_this {
                self.interner.intern_str(if cap.is_this_by_value { reserved::COPY_THIS } else { reserved::THIS })
            } else {
                cap.name
            };

            let mut shape = if cap.is_this {
                self.current_struct_stack.last().copied().map(|owner| self.shape_of_index(owner).pointer_to()).unwrap_or(ValueShape::invalid())
            } else {
                self.lookup_local(cap.name).map(|tv| ValueShape::of(&tv)).unwrap_or(ValueShape::invalid())
            };
            if cap.mode == CaptureMode::ByReference && shape.pointer_depth == 0 {
                shape = shape.pointer_to();
            }

            let size_in_bits = if shape.pointer_depth > 0 { 64 } else { shape.size_in_bits.max(8) };
            members.push(crate::types::registry::MemberInfo {
                name: member_name,
                type_index: shape.type_index,
                size_in_bits,
                offset_bits: running_bits,
                access: Access::Private,
                bitfield_width: None,
                bit_offset: None,
                default_initializer: None,
                is_reference: cap.mode == CaptureMode::ByReference,
                is_rvalue_reference: false,
            });
            running_bits += u64::from(size_in_bits);
        }

        let info = TypeInfo {
            name: type_name,
            base_type: cxxfe_ast::ir::BaseType::Struct,
            size_in_bits: running_bits,
            alignment: 8,
            template_info: None,
            struct_info: None,
        };
        let struct_info = StructTypeInfo { members, ..Default::default() };
        self.registry.add_struct(info, struct_info)
    }

    /// Drains newly discovered lambdas until the worklist is empty; a
    /// lambda's own body may reference another lambda, so this is a fixed
    /// point rather than a single pass.
    pub(crate) fn flush_lambda_worklist(&mut self, arena: &AstArena) {
        while let Some(pending) = self.pending_lambdas.pop_front() {
            if self.generated_lambda_ids.contains(&pending.lambda_id) {
                continue;
            }
            self.lambda_states.insert(pending.lambda_id, LambdaState::Generating);
            self.emit_lambda_invoke(arena, &pending);
            self.generated_lambda_ids.insert(pending.lambda_id);
            self.lambda_states.insert(pending.lambda_id, LambdaState::Emitted);
        }
    }

    fn emit_lambda_invoke(&mut self, arena: &AstArena, pending: &PendingLambda) {
        let mut params = Vec::with_capacity(pending.params.len());
        for p in &pending.params {
            let mut shape = self.shape_of_type_spec(arena, p.ty);
            let is_rvalue_reference = shape.reference == IrRefKind::Rvalue;
            if shape.reference == IrRefKind::Lvalue {
                shape.pointer_depth += 1;
            }
            params.push(ParamDecl { name: p.name, ty: shape.with_value(ValuePayload::U64(0)), is_rvalue_reference });
        }
        let return_shape = pending.return_type.map(|ty| self.shape_of_type_spec(arena, ty)).unwrap_or(ValueShape::invalid());

        self.emit(IrInstruction::FunctionDecl {
            mangled_name: pending.invoke_mangled,
            return_type: return_shape.with_value(ValuePayload::U64(0)),
            params: params.clone(),
            is_variadic: false,
            is_inline: true,
            is_static_linkage: false,
            has_hidden_return_param: false,
            hidden_return_type_index: None,
        });

        self.var_counter = 1;
        self.push_scope();

        let this_name = self.interner.intern_str(reserved::THIS);
        let this_shape = self.shape_of_index(pending.closure_type).pointer_to();
        let this_temp = self.fresh_temp();
        let this_tv = this_shape.with_value(ValuePayload::Temp(this_temp));
        self.bind_local(this_name, this_tv.clone(), None);

        if let Some(struct_info) = self.registry.struct_info(pending.closure_type).cloned() {
            for member in &struct_info.members {
                let temp = self.fresh_temp();
                self.emit(IrInstruction::MemberAccess {
                    base: this_tv.clone(),
                    member_name: member.name,
                    offset_bits: member.offset_bits,
                    bitfield_width: None,
                    result: temp,
                });
                let member_shape = self.shape_of_index(member.type_index);
                self.bind_local(member.name, member_shape.with_value(ValuePayload::Temp(temp)), None);
            }
        }

        for (p, pd) in pending.params.iter().zip(params.iter()) {
            let temp = self.fresh_temp();
            let mut tv = pd.ty.clone();
            tv.value = ValuePayload::Temp(temp);
            self.bind_local(p.name, tv, None);
        }

        self.current_return_shape = Some(return_shape);
        self.current_has_hidden_return = false;
        self.current_auto_return_type = None;

        self.lower_block_contents(arena, pending.body);

        self.pop_scope();
        self.current_return_shape = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileContext;
    use crate::mangle::DemoMangler;
    use crate::types::registry::TypeRegistry;
    use cxxfe_ast::ir::BaseType;
    use cxxfe_ast::ir::TypedValue;
    use cxxfe_ast::StringInterner;
    use cxxfe_diagnostics::DiagnosticEngine;

    #[test]
    fn captures_pack_sequentially_in_declaration_order_by_value_and_reference() {
        let mut registry = TypeRegistry::new();
        let interner = StringInterner::new();
        registry.seed_builtins(&interner);
        let mangler = DemoMangler;
        let ctx = CompileContext::default();
        let mut diagnostics = DiagnosticEngine::new();
        let mut gen = IrGenerator::new(&mut registry, &interner, &mangler, &ctx, &mut diagnostics);

        let int_idx = gen.registry.builtin(BaseType::Int).expect("int is seeded");
        let x = gen.interner.intern_str("x");
        let y = gen.interner.intern_str("y");

        gen.push_scope();
        gen.bind_local(x, TypedValue::temp(BaseType::Int, 32, int_idx, cxxfe_ast::TempVar(0)), None);
        gen.bind_local(y, TypedValue::temp(BaseType::Int, 32, int_idx, cxxfe_ast::TempVar(1)), None);

        let captures = vec![
            LambdaCapture { name: x, mode: CaptureMode::ByValue, is_this: false, is_this_by_value: false },
            LambdaCapture { name: y, mode: CaptureMode::ByReference, is_this: false, is_this_by_value: false },
        ];
        let closure_idx = gen.register_lambda_closure_type(0, &captures);

        let info = gen.registry.struct_info(closure_idx).expect("closure struct registered");
        assert_eq!(info.members.len(), 2);
        assert_eq!(info.members[0].name, x);
        assert_eq!(info.members[0].offset_bits, 0);
        assert!(!info.members[0].is_reference);
        assert_eq!(info.members[1].name, y);
        assert_eq!(info.members[1].offset_bits, 32);
        assert!(info.members[1].is_reference);
    }
}
