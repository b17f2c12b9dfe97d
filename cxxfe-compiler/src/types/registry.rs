//! Global type registry (spec §3.2, §4.2). Grounded on
//! `vex-compiler::type_registry`'s builtin-name registry and
//! `vex-compiler::types::interner`'s `DashMap`-backed dedup pattern, but
//! reshaped from a `HashSet<&'static str>` into the append-only
//! `TypeInfo` vector the spec calls for, plus `original_source`'s
//! `TemplateRegistry.h`/`AstNodeTypes.h` for the template-instantiation
//! bookkeeping (`TemplateArgument::Kind`, canonical-key hashing).

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use cxxfe_ast::{FunctionId, StringHandle, StringInterner, TypeIndex};

pub use cxxfe_ast::ir::BaseType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
    Private,
}

/// One template argument, spec §3.2: "type-kind or value-kind with ABI
/// properties: pointer depth, CV qualifiers ... reference kind, array
/// extent, integral value for non-type parameters". Grounded on
/// `original_source/TemplateRegistry.h`'s `TemplateArgument::Kind`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateArgRecord {
    Type {
        type_index: TypeIndex,
        pointer_depth: u32,
        is_const: bool,
        is_volatile: bool,
        is_reference: bool,
        array_extent: Option<u64>,
    },
    Value(i64),
}

#[derive(Debug, Clone)]
pub struct TemplateInstantiationInfo {
    pub base_template_name: StringHandle,
    pub args: Vec<TemplateArgRecord>,
}

#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: StringHandle,
    pub base_type: BaseType,
    pub size_in_bits: u32,
    pub alignment: u32,
    pub template_info: Option<TemplateInstantiationInfo>,
    pub struct_info: Option<usize>,
}

impl TypeInfo {
    pub fn scalar(name: StringHandle, base_type: BaseType, size_in_bits: u32, alignment: u32) -> Self {
        TypeInfo {
            name,
            base_type,
            size_in_bits,
            alignment,
            template_info: None,
            struct_info: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub name: StringHandle,
    pub type_index: TypeIndex,
    pub size_in_bits: u32,
    pub offset_bits: u64,
    pub access: Access,
    pub bitfield_width: Option<u32>,
    pub bit_offset: Option<u64>,
    pub default_initializer: Option<cxxfe_ast::ast::ExprId>,
    pub is_reference: bool,
    pub is_rvalue_reference: bool,
}

#[derive(Debug, Clone)]
pub struct BaseClassInfo {
    pub name: StringHandle,
    pub type_index: TypeIndex,
    pub offset_bits: u64,
    pub access: Access,
}

#[derive(Debug, Clone)]
pub struct MemberFunctionInfo {
    pub access: Access,
    pub is_constructor: bool,
    pub is_destructor: bool,
    pub parent_struct: StringHandle,
    pub function_decl: FunctionId,
}

#[derive(Debug, Clone, Default)]
pub struct StructTypeInfo {
    pub members: Vec<MemberInfo>,
    pub base_classes: Vec<BaseClassInfo>,
    pub member_functions: Vec<MemberFunctionInfo>,
    pub static_members: Vec<MemberInfo>,
    pub is_union: bool,
    pub is_final: bool,
    pub is_abstract: bool,
    pub has_vtable: bool,
    pub needs_default_constructor: bool,
    pub is_incomplete_instantiation: bool,
    pub vtable_symbol: Option<StringHandle>,
    pub enclosing_class: Option<TypeIndex>,
    pub friends: Vec<StringHandle>,
}

impl StructTypeInfo {
    /// Total size of the struct given its members' and bases' already-placed
    /// offsets (spec I2/P3): each base occupies `[offset_bits, offset_bits +
    /// base's own size)`, so the struct's footprint is the high-water mark
    /// across both bases and members, not just the member list.
    pub fn total_size_bits(&self, registry: &TypeRegistry) -> u64 {
        let members_end = self
            .members
            .iter()
            .map(|m| m.offset_bits + m.size_in_bits as u64)
            .max()
            .unwrap_or(0);
        let bases_end = self
            .base_classes
            .iter()
            .map(|b| {
                let base_size = registry.get(b.type_index).map_or(0, |t| t.size_in_bits as u64);
                b.offset_bits + base_size
            })
            .max()
            .unwrap_or(0);
        members_end.max(bases_end)
    }
}

fn fingerprint(base_template_name: StringHandle, args: &[TemplateArgRecord]) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut hasher = DefaultHasher::new();
    base_template_name.hash(&mut hasher);
    args.hash(&mut hasher);
    hasher.finish()
}

/// Builds the `base$<16-hex>` instantiation name (spec §4.2).
pub fn instantiation_key_string(base_name: &str, base_template_name: StringHandle, args: &[TemplateArgRecord]) -> String {
    format!("{}$<{:016x}>", base_name, fingerprint(base_template_name, args))
}

pub struct TypeRegistry {
    types: Vec<TypeInfo>,
    struct_infos: Vec<StructTypeInfo>,
    by_name: HashMap<StringHandle, TypeIndex>,
    /// Dedup for template instantiations (P2): same canonical args -> same index.
    instantiation_keys: HashMap<(StringHandle, Vec<TemplateArgRecord>), TypeIndex>,
    builtins: HashMap<BaseType, TypeIndex>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry {
            types: vec![TypeInfo::scalar(StringHandle::from(0), BaseType::Void, 0, 1)],
            struct_infos: Vec::new(),
            by_name: HashMap::new(),
            instantiation_keys: HashMap::new(),
            builtins: HashMap::new(),
        }
    }

    /// Seeds the fundamental C++ types, spec §9's initialization-order step
    /// "type registry (seed with builtins)".
    pub fn seed_builtins(&mut self, interner: &StringInterner) {
        let entries: &[(&str, BaseType, u32, u32)] = &[
            ("bool", BaseType::Bool, 8, 1),
            ("char", BaseType::Char, 8, 1),
            ("short", BaseType::Short, 16, 2),
            ("int", BaseType::Int, 32, 4),
            ("long", BaseType::Long, 64, 8),
            ("long long", BaseType::LongLong, 64, 8),
            ("unsigned char", BaseType::UnsignedChar, 8, 1),
            ("unsigned short", BaseType::UnsignedShort, 16, 2),
            ("unsigned int", BaseType::UnsignedInt, 32, 4),
            ("unsigned long", BaseType::UnsignedLong, 64, 8),
            ("unsigned long long", BaseType::UnsignedLongLong, 64, 8),
            ("float", BaseType::Float, 32, 4),
            ("double", BaseType::Double, 64, 8),
            ("long double", BaseType::LongDouble, 128, 16),
            ("nullptr_t", BaseType::Nullptr, 64, 8),
        ];
        for (name, base_type, size, align) in entries {
            let handle = interner.intern_str(name);
            let info = TypeInfo::scalar(handle, *base_type, *size, *align);
            let idx = self.add_type(info);
            self.builtins.insert(*base_type, idx);
        }
        // void already occupies index 0; register it under its name too.
        let void_handle = interner.intern_str("void");
        self.types[0].name = void_handle;
        self.by_name.insert(void_handle, TypeIndex::INVALID);
        self.builtins.insert(BaseType::Void, TypeIndex::INVALID);
    }

    pub fn builtin(&self, base_type: BaseType) -> Option<TypeIndex> {
        self.builtins.get(&base_type).copied()
    }

    pub fn add_type(&mut self, info: TypeInfo) -> TypeIndex {
        let name = info.name;
        let idx = TypeIndex::from(self.types.len() as u32);
        self.types.push(info);
        self.by_name.entry(name).or_insert(idx);
        idx
    }

    pub fn add_struct(&mut self, info: TypeInfo, struct_info: StructTypeInfo) -> TypeIndex {
        let struct_slot = self.struct_infos.len();
        self.struct_infos.push(struct_info);
        let mut info = info;
        info.struct_info = Some(struct_slot);
        self.add_type(info)
    }

    pub fn get(&self, index: TypeIndex) -> Option<&TypeInfo> {
        self.types.get(index.index())
    }

    pub fn get_mut(&mut self, index: TypeIndex) -> Option<&mut TypeInfo> {
        self.types.get_mut(index.index())
    }

    pub fn struct_info(&self, index: TypeIndex) -> Option<&StructTypeInfo> {
        let slot = self.get(index)?.struct_info?;
        self.struct_infos.get(slot)
    }

    pub fn struct_info_mut(&mut self, index: TypeIndex) -> Option<&mut StructTypeInfo> {
        let slot = self.get(index)?.struct_info?;
        self.struct_infos.get_mut(slot)
    }

    pub fn find_by_name(&self, name: StringHandle) -> Option<TypeIndex> {
        self.by_name.get(&name).copied()
    }

    pub fn is_template_instantiation(&self, index: TypeIndex) -> bool {
        self.get(index).map_or(false, |t| t.template_info.is_some())
    }

    /// Returns the existing instantiation's `TypeIndex` if one with the same
    /// canonical argument list was already registered (P2), otherwise
    /// reserves the key for `index` to dedup future lookups.
    pub fn find_or_register_instantiation(
        &mut self,
        base_template_name: StringHandle,
        args: &[TemplateArgRecord],
        index: TypeIndex,
    ) -> TypeIndex {
        let key = (base_template_name, args.to_vec());
        *self.instantiation_keys.entry(key).or_insert(index)
    }

    pub fn existing_instantiation(&self, base_template_name: StringHandle, args: &[TemplateArgRecord]) -> Option<TypeIndex> {
        self.instantiation_keys.get(&(base_template_name, args.to_vec())).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_builtins_gives_int_four_bytes() {
        let interner = StringInterner::new();
        let mut registry = TypeRegistry::new();
        registry.seed_builtins(&interner);
        let int_idx = registry.builtin(BaseType::Int).unwrap();
        assert_eq!(registry.get(int_idx).unwrap().size_in_bits, 32);
    }

    #[test]
    fn void_occupies_the_reserved_index_zero() {
        let interner = StringInterner::new();
        let mut registry = TypeRegistry::new();
        registry.seed_builtins(&interner);
        assert_eq!(registry.builtin(BaseType::Void), Some(TypeIndex::INVALID));
        assert!(!TypeIndex::INVALID.is_valid());
    }

    #[test]
    fn same_instantiation_args_yield_the_same_type_index() {
        let interner = StringInterner::new();
        let mut registry = TypeRegistry::new();
        registry.seed_builtins(&interner);
        let int_idx = registry.builtin(BaseType::Int).unwrap();
        let template_name = interner.intern_str("vector");

        let args = vec![TemplateArgRecord::Type {
            type_index: int_idx,
            pointer_depth: 0,
            is_const: false,
            is_volatile: false,
            is_reference: false,
            array_extent: None,
        }];

        let name = interner.intern_str(&instantiation_key_string("vector", template_name, &args));
        let info = TypeInfo::scalar(name, BaseType::Template, 64, 8);
        let first = registry.add_type(info.clone());
        let resolved_first = registry.find_or_register_instantiation(template_name, &args, first);

        let second = registry.add_type(info);
        let resolved_second = registry.find_or_register_instantiation(template_name, &args, second);

        assert_eq!(resolved_first, resolved_second);
    }
}
