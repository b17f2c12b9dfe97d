//! Template instantiator (spec §4.5.4). Grounded on
//! `examples/original_source/src/TemplateInstantiator.h`'s
//! `instantiate_class`/`instantiate_function` pair and `TemplateRegistry.h`'s
//! `registerTemplate`/`registerInstantiation` bookkeeping, reshaped onto
//! this crate's arena/registry/queue instead of raw `ASTNode` copies.
//!
//! `AstArena` is threaded through every method as an explicit `&mut`
//! parameter rather than stored on `TemplateInstantiator` itself: the type
//! substitutor (spec §4.5.3) can re-enter `instantiate_class` mid-traversal
//! of a type it is substituting (a struct type whose name encodes nested
//! template arguments), and that re-entrant call needs the very arena the
//! substitutor is already holding. Storing two independent `&mut AstArena`
//! handles — one on the instantiator, one borrowed by the substitutor's
//! caller — would alias the same arena from two places at once.

use std::collections::HashMap;

use cxxfe_ast::ast::*;
use cxxfe_ast::{AstArena, FunctionId, StringHandle, StringInterner, StructId, TypeIndex};

use crate::template::queue::{InstantiationKey, InstantiationQueue, InstantiationStatus, PointOfInstantiation};
use crate::template::substitutor::{self, ArgBinding, SubstitutionMap, TypeResolver};
use crate::types::registry::{self, Access, MemberFunctionInfo, MemberInfo, StructTypeInfo, TemplateArgRecord, TemplateInstantiationInfo, TypeInfo, TypeRegistry};

/// Concrete error surfaced by a failed instantiation (spec §4.5.4 step 2/7
/// "mark_in_progress... return Failed" / "mark Complete").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstantiationError {
    Cycle,
    UnknownTemplate,
    ArgumentNotResolvable,
}

impl std::fmt::Display for InstantiationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstantiationError::Cycle => write!(f, "template instantiation cycle"),
            InstantiationError::UnknownTemplate => write!(f, "no template registered under this name"),
            InstantiationError::ArgumentNotResolvable => write!(f, "template argument does not resolve to a concrete type or value"),
        }
    }
}

/// Converts an already-substituted type node into a `TemplateArgRecord::Type`
/// (spec §3.2's ABI-relevant template argument fields). Returns `None` when
/// the node names something the type registry does not track by index yet
/// (function pointers, member pointers) — callers treat that as a failed
/// instantiation rather than fabricate a record.
fn type_spec_to_record(arena: &AstArena, registry: &TypeRegistry, id: TypeSpecId) -> Option<TemplateArgRecord> {
    let node = arena.type_spec(id);
    let type_index = resolve_builtin_or_named(arena, registry, id)?;
    let is_const = node.pointer_cv.last().is_some_and(|cv| cv.is_const);
    let is_volatile = node.pointer_cv.last().is_some_and(|cv| cv.is_volatile);
    Some(TemplateArgRecord::Type {
        type_index,
        pointer_depth: node.pointer_cv.len() as u32,
        is_const,
        is_volatile,
        is_reference: node.reference != ReferenceKind::None,
        array_extent: node.array_extent.flatten(),
    })
}

/// Resolves a type node to a `TypeIndex` without triggering further
/// instantiation: primitives map to their builtin slot, a `Named` node with
/// no template arguments is looked up by name, and an already-substituted
/// node carries its answer in `resolved`.
fn resolve_builtin_or_named(arena: &AstArena, registry: &TypeRegistry, id: TypeSpecId) -> Option<TypeIndex> {
    let node = arena.type_spec(id);
    if let Some(resolved) = node.resolved {
        return Some(resolved);
    }
    use cxxfe_ast::ir::BaseType;
    let builtin = match &node.base {
        TypeSpecBase::Void => Some(BaseType::Void),
        TypeSpecBase::Bool => Some(BaseType::Bool),
        TypeSpecBase::Char => Some(BaseType::Char),
        TypeSpecBase::Short => Some(BaseType::Short),
        TypeSpecBase::Int => Some(BaseType::Int),
        TypeSpecBase::Long => Some(BaseType::Long),
        TypeSpecBase::LongLong => Some(BaseType::LongLong),
        TypeSpecBase::UnsignedChar => Some(BaseType::UnsignedChar),
        TypeSpecBase::UnsignedShort => Some(BaseType::UnsignedShort),
        TypeSpecBase::UnsignedInt => Some(BaseType::UnsignedInt),
        TypeSpecBase::UnsignedLong => Some(BaseType::UnsignedLong),
        TypeSpecBase::UnsignedLongLong => Some(BaseType::UnsignedLongLong),
        TypeSpecBase::Float => Some(BaseType::Float),
        TypeSpecBase::Double => Some(BaseType::Double),
        TypeSpecBase::LongDouble => Some(BaseType::LongDouble),
        TypeSpecBase::Nullptr => Some(BaseType::Nullptr),
        _ => None,
    };
    if let Some(bt) = builtin {
        return registry.builtin(bt);
    }
    if let TypeSpecBase::Named { name, template_args } = &node.base {
        if template_args.is_empty() {
            return registry.find_by_name(*name);
        }
    }
    None
}

/// Evaluates a simple constant expression down to an `i64` for a non-type
/// template argument. Template arguments reaching this point have already
/// been through the expression substitutor, so the common case is a bare
/// literal; full constant folding belongs to the constexpr evaluator
/// (spec §4.6), not the instantiator.
fn eval_simple_const_i64(arena: &AstArena, id: ExprId) -> Option<i64> {
    match arena.expr(id) {
        Expr::IntLiteral(v) => Some(*v),
        Expr::UIntLiteral(v) => i64::try_from(*v).ok(),
        Expr::BoolLiteral(b) => Some(if *b { 1 } else { 0 }),
        Expr::Unary { op: UnaryOp::Neg, operand } => eval_simple_const_i64(arena, *operand).map(|v| -v),
        _ => None,
    }
}

pub(crate) fn template_arg_spec_to_record(arena: &AstArena, registry: &TypeRegistry, arg: &TemplateArgSpec) -> Option<TemplateArgRecord> {
    match arg {
        TemplateArgSpec::Type(ty) => type_spec_to_record(arena, registry, *ty),
        TemplateArgSpec::Value(expr) => eval_simple_const_i64(arena, *expr).map(TemplateArgRecord::Value),
    }
}

fn convert_access(a: Access) -> registry::Access {
    match a {
        Access::Public => registry::Access::Public,
        Access::Protected => registry::Access::Protected,
        Access::Private => registry::Access::Private,
    }
}

/// Rounds a bit offset up to the next multiple of `align_bytes` (in bits).
/// An alignment of zero is treated as byte-aligned (`1`).
fn align_up_bits(offset_bits: u64, align_bytes: u32) -> u64 {
    let align_bits = align_bytes.max(1) as u64 * 8;
    offset_bits.div_ceil(align_bits) * align_bits
}

/// A `#pragma pack(N)` caps a member/base's natural alignment at `N` bytes
/// rather than replacing it (spec §4.4's "unless overridden by `#pragma
/// pack`").
fn effective_alignment(natural: u32, pack_alignment: Option<u32>) -> u32 {
    match pack_alignment {
        Some(pack) => natural.min(pack.max(1)),
        None => natural,
    }
}

/// Lays out base classes before the derived struct's own fields (spec I2/P3,
/// the `struct Base{int b;}; struct Derived:Base{int d;};` regression
/// scenario): each base subobject starts at its own alignment boundary after
/// the previous base, and the derived type's own fields start only once
/// every base has been placed. Shared by `instantiate_class`'s canonical
/// `TypeInfo` construction and ordinary (non-template) struct registration,
/// so the two paths can never disagree on how a field list turns into
/// offsets.
pub(crate) fn compute_struct_layout(
    arena: &AstArena,
    registry: &TypeRegistry,
    decl: &StructDeclNode,
    pack_alignment: Option<u32>,
) -> (u64, Vec<MemberInfo>, Vec<registry::BaseClassInfo>, Vec<MemberFunctionInfo>, bool) {
    let mut offset_bits: u64 = 0;

    let base_classes: Vec<registry::BaseClassInfo> = decl
        .bases
        .iter()
        .map(|b| {
            let type_index = resolve_builtin_or_named(arena, registry, b.ty).unwrap_or(TypeIndex::INVALID);
            let (base_size_bits, base_alignment) = registry.get(type_index).map_or((0u32, 1u32), |t| (t.size_in_bits, t.alignment));
            offset_bits = align_up_bits(offset_bits, effective_alignment(base_alignment, pack_alignment));
            let base_offset = offset_bits;
            offset_bits += base_size_bits as u64;
            registry::BaseClassInfo {
                name: b.name,
                type_index,
                offset_bits: base_offset,
                access: convert_access(b.access),
            }
        })
        .collect();

    let mut members = Vec::with_capacity(decl.fields.len());
    for f in &decl.fields {
        let type_index = resolve_builtin_or_named(arena, registry, f.ty).unwrap_or(TypeIndex::INVALID);
        let size_in_bits = registry.get(type_index).map_or(64, |t| t.size_in_bits.max(1));
        let field_offset = match f.bitfield_width {
            // Bit-fields pack densely into the current storage unit rather
            // than starting a fresh aligned slot per field.
            Some(width) => {
                let offset = offset_bits;
                offset_bits += width as u64;
                offset
            }
            None => {
                let natural_alignment = registry.get(type_index).map_or(1, |t| t.alignment);
                let offset = align_up_bits(offset_bits, effective_alignment(natural_alignment, pack_alignment));
                offset_bits = offset + size_in_bits as u64;
                offset
            }
        };
        members.push(MemberInfo {
            name: f.name,
            type_index,
            size_in_bits,
            offset_bits: field_offset,
            access: convert_access(f.access),
            bitfield_width: f.bitfield_width,
            bit_offset: None,
            default_initializer: f.default_initializer,
            is_reference: f.is_reference,
            is_rvalue_reference: f.is_rvalue_reference,
        });
    }

    let member_functions: Vec<MemberFunctionInfo> = decl
        .methods
        .iter()
        .map(|&fid| {
            let f = arena.function(fid);
            MemberFunctionInfo {
                access: convert_access(f.access),
                is_constructor: f.kind == FunctionKind::Constructor,
                is_destructor: f.kind == FunctionKind::Destructor,
                parent_struct: decl.name,
                function_decl: fid,
            }
        })
        .collect();

    let has_vtable = decl.methods.iter().any(|&m| arena.function(m).is_virtual);

    (offset_bits, members, base_classes, member_functions, has_vtable)
}

pub struct TemplateInstantiator<'a> {
    pub registry: &'a mut TypeRegistry,
    pub interner: &'a StringInterner,
    pub queue: &'a mut InstantiationQueue,
    struct_patterns: HashMap<StringHandle, StructId>,
    function_patterns: HashMap<StringHandle, FunctionId>,
    lazy_members: HashMap<(TypeIndex, StringHandle), FunctionId>,
    /// Active `#pragma pack(N)` ceiling, synced from `CompileContext` by the
    /// parser (spec §4.4). Lives here rather than as a parameter threaded
    /// through every layout call because `InstantiatorResolver` only ever
    /// holds a `&mut TemplateInstantiator`, not the parser's `CompileContext`.
    current_pack_alignment: Option<u32>,
}

impl<'a> TemplateInstantiator<'a> {
    pub fn new(registry: &'a mut TypeRegistry, interner: &'a StringInterner, queue: &'a mut InstantiationQueue) -> Self {
        TemplateInstantiator {
            registry,
            interner,
            queue,
            struct_patterns: HashMap::new(),
            function_patterns: HashMap::new(),
            lazy_members: HashMap::new(),
            current_pack_alignment: None,
        }
    }

    pub fn set_pack_alignment(&mut self, alignment: Option<u32>) {
        self.current_pack_alignment = alignment;
    }

    /// Registers a struct template pattern. The pattern itself also gets a
    /// `TypeInfo`/`StructTypeInfo` record with `is_incomplete_instantiation:
    /// true` (spec I3): it has no concrete layout (its fields are still
    /// unsubstituted template parameters) and must never be emitted as a
    /// real type, only ever referenced by instantiations derived from it.
    pub fn register_struct_template(&mut self, name: StringHandle, pattern: StructId) {
        self.struct_patterns.insert(name, pattern);
        if self.registry.find_by_name(name).is_none() {
            use cxxfe_ast::ir::BaseType;
            let type_info = TypeInfo {
                name,
                base_type: BaseType::Template,
                size_in_bits: 0,
                alignment: 1,
                template_info: None,
                struct_info: None,
            };
            let struct_info = StructTypeInfo {
                is_incomplete_instantiation: true,
                ..Default::default()
            };
            self.registry.add_struct(type_info, struct_info);
        }
    }

    pub fn register_function_template(&mut self, name: StringHandle, pattern: FunctionId) {
        self.function_patterns.insert(name, pattern);
    }

    /// Registers the `TypeIndex` for an ordinary (non-template) struct,
    /// computed with the same layout rule as a template instantiation
    /// (`compute_struct_layout`) but keeping the struct's own name rather
    /// than a `base$<hex>` canonical one. Idempotent: a struct already
    /// present under this name is returned as-is, so a forward declaration
    /// followed by the definition doesn't register twice.
    pub fn register_concrete_struct(&mut self, arena: &AstArena, struct_id: StructId) -> TypeIndex {
        let decl = arena.strukt(struct_id);
        if let Some(existing) = self.registry.find_by_name(decl.name) {
            return existing;
        }

        let (offset_bits, members, base_classes, member_functions, has_vtable) =
            compute_struct_layout(arena, self.registry, decl, self.current_pack_alignment);

        let struct_info = StructTypeInfo {
            members,
            base_classes,
            member_functions,
            static_members: Vec::new(),
            is_union: decl.is_union,
            is_final: decl.is_final,
            is_abstract: false,
            has_vtable,
            needs_default_constructor: false,
            is_incomplete_instantiation: false,
            vtable_symbol: None,
            enclosing_class: None,
            friends: Vec::new(),
        };

        use cxxfe_ast::ir::BaseType;
        let base_type = if decl.is_union { BaseType::Union } else { BaseType::Struct };
        let type_info = TypeInfo {
            name: decl.name,
            base_type,
            size_in_bits: 0,
            alignment: 1,
            template_info: None,
            struct_info: None,
        };
        let methods = decl.methods.clone();
        let index = self.registry.add_struct(type_info, struct_info);
        if let Some(info) = self.registry.get_mut(index) {
            info.size_in_bits = offset_bits as u32;
        }
        for fid in methods {
            let member_name = arena.function(fid).name;
            self.lazy_members.insert((index, member_name), fid);
        }
        index
    }

    /// Looks up the function registered for `(owner, member_name)` by the
    /// lazy member registry, if instantiation has reached that class yet
    /// (spec §4.5.4 step 6 / §4.5.5 handoff).
    pub fn lazy_member(&self, owner: TypeIndex, member_name: StringHandle) -> Option<FunctionId> {
        self.lazy_members.get(&(owner, member_name)).copied()
    }

    fn build_substitution(&self, template_params: &[TemplateParam], args: &[TemplateArgSpec]) -> SubstitutionMap {
        let mut subst = SubstitutionMap::new();
        let mut arg_iter = args.iter();
        for param in template_params {
            if param.is_pack {
                let rest: Vec<ArgBinding> = arg_iter
                    .by_ref()
                    .map(|a| match a {
                        TemplateArgSpec::Type(ty) => ArgBinding::Type(*ty),
                        TemplateArgSpec::Value(e) => ArgBinding::Value(*e),
                    })
                    .collect();
                subst.packs.insert(param.name, rest);
                break;
            }
            let Some(arg) = arg_iter.next() else { break };
            let binding = match arg {
                TemplateArgSpec::Type(ty) => ArgBinding::Type(*ty),
                TemplateArgSpec::Value(e) => ArgBinding::Value(*e),
            };
            subst.params.insert(param.name, binding);
        }
        subst
    }

    /// Spec §4.5.4, the seven-step top-level operation.
    pub fn instantiate_class(&mut self, arena: &mut AstArena, base_name: StringHandle, args: &[TemplateArgSpec]) -> Result<TypeIndex, InstantiationError> {
        let records: Vec<TemplateArgRecord> = args
            .iter()
            .map(|a| template_arg_spec_to_record(arena, self.registry, a))
            .collect::<Option<Vec<_>>>()
            .ok_or(InstantiationError::ArgumentNotResolvable)?;

        let key = InstantiationKey { template_name: base_name, args: records.clone() };

        // Step 1: cache check.
        if let Some(InstantiationStatus::Complete(idx)) = self.queue.status(&key) {
            return Ok(idx);
        }
        if let Some(existing) = self.registry.existing_instantiation(base_name, &records) {
            self.queue.mark_complete(&key, existing);
            return Ok(existing);
        }

        // Step 2: cycle check.
        let poi = PointOfInstantiation { file_index: 0, line: 0, column: 0 };
        self.queue.enqueue(key.clone(), poi);
        if !self.queue.mark_in_progress(key.clone()) {
            return Err(InstantiationError::Cycle);
        }

        let pattern_id = match self.struct_patterns.get(&base_name).copied() {
            Some(id) => id,
            None => {
                self.queue.mark_failed(&key, InstantiationError::UnknownTemplate.to_string());
                return Err(InstantiationError::UnknownTemplate);
            }
        };

        // Step 3/4: clone the pattern while running the substitutors over it.
        let pattern = arena.strukt(pattern_id).clone();
        let subst = self.build_substitution(&pattern.template_params, args);

        let base_name_str = self.interner.view_str(base_name);
        let canonical_name = registry::instantiation_key_string(&base_name_str, base_name, &records);
        let canonical_handle = self.interner.intern_str(&canonical_name);

        let mut new_fields = Vec::with_capacity(pattern.fields.len());
        for f in &pattern.fields {
            let mut resolver = InstantiatorResolver { inst: &mut *self };
            new_fields.push(FieldNode {
                loc: f.loc,
                name: f.name,
                ty: substitutor::substitute_type(arena, &subst, &mut resolver, f.ty),
                access: f.access,
                bitfield_width: f.bitfield_width,
                default_initializer: f.default_initializer.map(|e| substitutor::substitute_expr(arena, &subst, &mut resolver, e)),
                is_reference: f.is_reference,
                is_rvalue_reference: f.is_rvalue_reference,
            });
        }

        let mut new_bases = Vec::with_capacity(pattern.bases.len());
        for b in &pattern.bases {
            let mut resolver = InstantiatorResolver { inst: &mut *self };
            new_bases.push(BaseClassNode {
                name: b.name,
                ty: substitutor::substitute_type(arena, &subst, &mut resolver, b.ty),
                access: b.access,
                is_virtual: b.is_virtual,
            });
        }

        let mut new_methods = Vec::with_capacity(pattern.methods.len());
        for &m in &pattern.methods {
            new_methods.push(self.clone_function_with_substitution(arena, m, &subst));
        }

        let new_struct = StructDeclNode {
            loc: pattern.loc,
            name: canonical_handle,
            namespace_path: pattern.namespace_path.clone(),
            template_params: Vec::new(),
            fields: new_fields,
            bases: new_bases,
            methods: new_methods.clone(),
            is_union: pattern.is_union,
            is_final: pattern.is_final,
            is_template_pattern: false,
        };
        let new_struct_id = arena.alloc_struct(new_struct);

        // Step 5: canonical TypeInfo with base-then-field, alignment-rounded offsets.
        let (offset_bits, members, base_classes, member_functions, has_vtable) =
            compute_struct_layout(arena, self.registry, arena.strukt(new_struct_id), self.current_pack_alignment);

        let struct_info = StructTypeInfo {
            members,
            base_classes,
            member_functions,
            static_members: Vec::new(),
            is_union: pattern.is_union,
            is_final: pattern.is_final,
            is_abstract: false,
            has_vtable,
            needs_default_constructor: false,
            is_incomplete_instantiation: false,
            vtable_symbol: None,
            enclosing_class: None,
            friends: Vec::new(),
        };

        use cxxfe_ast::ir::BaseType;
        let type_info = TypeInfo {
            name: canonical_handle,
            base_type: BaseType::Template,
            size_in_bits: 0,
            alignment: 1,
            template_info: Some(TemplateInstantiationInfo { base_template_name: base_name, args: records.clone() }),
            struct_info: None,
        };
        let new_index = self.registry.add_struct(type_info, struct_info);
        if let Some(info) = self.registry.get_mut(new_index) {
            info.size_in_bits = offset_bits as u32;
        }
        self.registry.find_or_register_instantiation(base_name, &records, new_index);

        // Step 6: register lazy members.
        for &fid in &new_methods {
            let member_name = arena.function(fid).name;
            self.lazy_members.insert((new_index, member_name), fid);
        }

        // Step 7: mark complete.
        self.queue.mark_complete(&key, new_index);
        Ok(new_index)
    }

    /// Spec §4.5.2 function-call path (a): explicit template arguments
    /// substituted and looked up/instantiated against a registered function
    /// template pattern.
    pub fn instantiate_function(&mut self, arena: &mut AstArena, base_name: StringHandle, args: &[TemplateArgSpec]) -> Result<FunctionId, InstantiationError> {
        let pattern_id = self.function_patterns.get(&base_name).copied().ok_or(InstantiationError::UnknownTemplate)?;
        let pattern = arena.function(pattern_id).clone();
        let subst = self.build_substitution(&pattern.template_params, args);
        Ok(self.clone_function_with_substitution(arena, pattern_id, &subst))
    }

    fn clone_function_with_substitution(&mut self, arena: &mut AstArena, pattern_id: FunctionId, subst: &SubstitutionMap) -> FunctionId {
        let pattern = arena.function(pattern_id).clone();

        let mut new_params = Vec::with_capacity(pattern.params.len());
        for p in &pattern.params {
            let mut resolver = InstantiatorResolver { inst: &mut *self };
            new_params.push(Param {
                name: p.name,
                ty: substitutor::substitute_type(arena, subst, &mut resolver, p.ty),
                default_value: p.default_value.map(|e| substitutor::substitute_expr(arena, subst, &mut resolver, e)),
            });
        }

        let new_return_type = pattern.return_type.map(|t| {
            let mut resolver = InstantiatorResolver { inst: &mut *self };
            substitutor::substitute_type(arena, subst, &mut resolver, t)
        });

        let new_body = pattern.body.map(|b| {
            let mut resolver = InstantiatorResolver { inst: &mut *self };
            substitutor::substitute_block(arena, subst, &mut resolver, b)
        });

        arena.alloc_function(FunctionDeclNode {
            loc: pattern.loc,
            name: pattern.name,
            kind: pattern.kind,
            namespace_path: pattern.namespace_path.clone(),
            enclosing_struct: pattern.enclosing_struct,
            template_params: Vec::new(),
            params: new_params,
            return_type: new_return_type,
            body: new_body,
            is_variadic: pattern.is_variadic,
            is_static: pattern.is_static,
            is_virtual: pattern.is_virtual,
            is_const: pattern.is_const,
            is_defaulted: pattern.is_defaulted,
            is_deleted: pattern.is_deleted,
            is_inline: pattern.is_inline,
            access: pattern.access,
            is_template_pattern: false,
        })
    }
}

/// Wires the type substitutor's nested-instantiation hook back into
/// `instantiate_class` (spec §4.5.3's "enqueue instantiation of the base
/// template... return the resulting TypeIndex").
struct InstantiatorResolver<'a, 'b> {
    inst: &'b mut TemplateInstantiator<'a>,
}

impl TypeResolver for InstantiatorResolver<'_, '_> {
    fn instantiate(&mut self, arena: &mut AstArena, base_name: StringHandle, args: &[TemplateArgSpec]) -> Option<TypeIndex> {
        self.inst.instantiate_class(arena, base_name, args).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxxfe_ast::loc::SourceLoc;

    fn setup() -> (AstArena, TypeRegistry, StringInterner, InstantiationQueue) {
        let interner = StringInterner::new();
        let mut registry = TypeRegistry::new();
        registry.seed_builtins(&interner);
        (AstArena::new(), registry, interner, InstantiationQueue::new())
    }

    #[test]
    fn instantiating_a_single_field_struct_template_substitutes_the_field_type() {
        let (mut arena, mut registry, interner, mut queue) = setup();
        let t_name = interner.intern_str("T");
        let field_ty = arena.alloc_type_spec(TypeSpecifierNode {
            loc: SourceLoc::unknown(),
            base: TypeSpecBase::TemplateParam(t_name),
            pointer_cv: vec![],
            reference: ReferenceKind::None,
            array_extent: None,
            resolved: None,
        });
        let field = FieldNode {
            loc: SourceLoc::unknown(),
            name: interner.intern_str("value"),
            ty: field_ty,
            access: Access::Public,
            bitfield_width: None,
            default_initializer: None,
            is_reference: false,
            is_rvalue_reference: false,
        };
        let wrapper_name = interner.intern_str("Wrapper");
        let pattern = StructDeclNode {
            loc: SourceLoc::unknown(),
            name: wrapper_name,
            namespace_path: vec![],
            template_params: vec![TemplateParam { name: t_name, is_non_type: false, non_type_ty: None, is_pack: false, default: None }],
            fields: vec![field],
            bases: vec![],
            methods: vec![],
            is_union: false,
            is_final: false,
            is_template_pattern: true,
        };
        let pattern_id = arena.alloc_struct(pattern);

        let mut instantiator = TemplateInstantiator::new(&mut registry, &interner, &mut queue);
        instantiator.register_struct_template(wrapper_name, pattern_id);

        let int_arg_ty = arena.alloc_type_spec(TypeSpecifierNode {
            loc: SourceLoc::unknown(),
            base: TypeSpecBase::Int,
            pointer_cv: vec![],
            reference: ReferenceKind::None,
            array_extent: None,
            resolved: None,
        });
        let result = instantiator.instantiate_class(&mut arena, wrapper_name, &[TemplateArgSpec::Type(int_arg_ty)]);
        assert!(result.is_ok());
        let idx = result.unwrap();
        let struct_info = registry.struct_info(idx).unwrap();
        assert_eq!(struct_info.members.len(), 1);
        assert_eq!(struct_info.members[0].type_index, registry.builtin(cxxfe_ast::ir::BaseType::Int).unwrap());
    }

    #[test]
    fn instantiating_the_same_arguments_twice_yields_the_same_index() {
        let (mut arena, mut registry, interner, mut queue) = setup();
        let t_name = interner.intern_str("T");
        let pattern = StructDeclNode {
            loc: SourceLoc::unknown(),
            name: interner.intern_str("Box"),
            namespace_path: vec![],
            template_params: vec![TemplateParam { name: t_name, is_non_type: false, non_type_ty: None, is_pack: false, default: None }],
            fields: vec![],
            bases: vec![],
            methods: vec![],
            is_union: false,
            is_final: false,
            is_template_pattern: true,
        };
        let box_name = interner.intern_str("Box");
        let pattern_id = arena.alloc_struct(pattern);
        let mut instantiator = TemplateInstantiator::new(&mut registry, &interner, &mut queue);
        instantiator.register_struct_template(box_name, pattern_id);

        let ty = arena.alloc_type_spec(TypeSpecifierNode {
            loc: SourceLoc::unknown(),
            base: TypeSpecBase::Double,
            pointer_cv: vec![],
            reference: ReferenceKind::None,
            array_extent: None,
            resolved: None,
        });
        let first = instantiator.instantiate_class(&mut arena, box_name, &[TemplateArgSpec::Type(ty)]).unwrap();
        let second = instantiator.instantiate_class(&mut arena, box_name, &[TemplateArgSpec::Type(ty)]).unwrap();
        assert_eq!(first, second);
    }
}
