//! Lazy member resolver (spec §4.5.5). Near-direct port of
//! `examples/original_source/src/LazyMemberResolver.h`: a cache keyed on
//! `(TypeIndex, StringHandle)`, an in-progress set for cycle detection, and
//! a BFS over base classes so a diamond or deep hierarchy is walked once
//! per level rather than recursively.

use std::collections::{HashMap, HashSet, VecDeque};

use cxxfe_ast::{StringHandle, TypeIndex};

use crate::types::registry::{Access, TypeRegistry};

/// A resolved member together with the offset adjustment needed to reach it
/// through however many base classes it was found in.
#[derive(Debug, Clone)]
pub struct MemberResolutionResult {
    pub member_name: StringHandle,
    pub owner: TypeIndex,
    pub type_index: TypeIndex,
    pub adjusted_offset_bits: u64,
    pub access: Access,
    pub from_cache: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MemberLookupKey {
    type_index: TypeIndex,
    member_name: StringHandle,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ResolverStatistics {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cycles_detected: usize,
}

impl ResolverStatistics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
pub struct LazyMemberResolver {
    cache: HashMap<MemberLookupKey, Option<MemberResolutionResult>>,
    in_progress: HashSet<MemberLookupKey>,
    stats: ResolverStatistics,
}

impl LazyMemberResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `member_name` on `type_index`, searching base classes
    /// breadth-first when not a direct member. Returns `None` both when the
    /// member genuinely does not exist and when a cycle is detected in the
    /// inheritance graph (spec §4.5.5 "treat a cycle the same as a miss").
    pub fn resolve(&mut self, registry: &TypeRegistry, type_index: TypeIndex, member_name: StringHandle) -> Option<MemberResolutionResult> {
        let key = MemberLookupKey { type_index, member_name };

        if let Some(cached) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            return cached.clone().map(|mut r| {
                r.from_cache = true;
                r
            });
        }
        self.stats.cache_misses += 1;

        if self.in_progress.contains(&key) {
            self.stats.cycles_detected += 1;
            return None;
        }
        self.in_progress.insert(key);
        let result = self.resolve_internal(registry, type_index, member_name);
        self.in_progress.remove(&key);

        self.cache.insert(key, result.clone());
        result
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.stats = ResolverStatistics::default();
    }

    pub fn statistics(&self) -> ResolverStatistics {
        self.stats
    }

    fn resolve_internal(&self, registry: &TypeRegistry, type_index: TypeIndex, member_name: StringHandle) -> Option<MemberResolutionResult> {
        let mut to_visit: VecDeque<(TypeIndex, u64)> = VecDeque::new();
        let mut visited: HashSet<TypeIndex> = HashSet::new();
        to_visit.push_back((type_index, 0));

        while let Some((current, current_offset)) = to_visit.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let Some(struct_info) = registry.struct_info(current) else { continue };

            for member in &struct_info.members {
                if member.name == member_name {
                    return Some(MemberResolutionResult {
                        member_name,
                        owner: current,
                        type_index: member.type_index,
                        adjusted_offset_bits: current_offset + member.offset_bits,
                        access: member.access,
                        from_cache: false,
                    });
                }
            }

            for base in &struct_info.base_classes {
                to_visit.push_back((base.type_index, current_offset + base.offset_bits));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::registry::{BaseClassInfo, MemberInfo, StructTypeInfo, TypeInfo};
    use cxxfe_ast::{ir::BaseType, StringInterner};

    fn register_struct(registry: &mut TypeRegistry, name: StringHandle, members: Vec<MemberInfo>, bases: Vec<BaseClassInfo>) -> TypeIndex {
        let info = TypeInfo {
            name,
            base_type: BaseType::Struct,
            size_in_bits: 0,
            alignment: 1,
            template_info: None,
            struct_info: None,
        };
        let struct_info = StructTypeInfo {
            members,
            base_classes: bases,
            ..Default::default()
        };
        registry.add_struct(info, struct_info)
    }

    #[test]
    fn direct_member_resolves_without_walking_bases() {
        let interner = StringInterner::new();
        let mut registry = TypeRegistry::new();
        registry.seed_builtins(&interner);
        let int_idx = registry.builtin(BaseType::Int).unwrap();
        let field = interner.intern_str("x");
        let member = MemberInfo {
            name: field,
            type_index: int_idx,
            size_in_bits: 32,
            offset_bits: 0,
            access: Access::Public,
            bitfield_width: None,
            bit_offset: None,
            default_initializer: None,
            is_reference: false,
            is_rvalue_reference: false,
        };
        let point = register_struct(&mut registry, interner.intern_str("Point"), vec![member], vec![]);

        let mut resolver = LazyMemberResolver::new();
        let found = resolver.resolve(&registry, point, field).expect("member should resolve");
        assert_eq!(found.type_index, int_idx);
        assert!(!found.from_cache);

        let cached = resolver.resolve(&registry, point, field).expect("second lookup hits cache");
        assert!(cached.from_cache);
        assert_eq!(resolver.statistics().cache_hits, 1);
    }

    #[test]
    fn inherited_member_is_found_through_a_base_class_with_offset() {
        let interner = StringInterner::new();
        let mut registry = TypeRegistry::new();
        registry.seed_builtins(&interner);
        let int_idx = registry.builtin(BaseType::Int).unwrap();
        let base_field = interner.intern_str("base_x");
        let base_member = MemberInfo {
            name: base_field,
            type_index: int_idx,
            size_in_bits: 32,
            offset_bits: 0,
            access: Access::Public,
            bitfield_width: None,
            bit_offset: None,
            default_initializer: None,
            is_reference: false,
            is_rvalue_reference: false,
        };
        let base_idx = register_struct(&mut registry, interner.intern_str("Base"), vec![base_member], vec![]);

        let base_class = BaseClassInfo {
            name: interner.intern_str("Base"),
            type_index: base_idx,
            offset_bits: 64,
            access: Access::Public,
        };
        let derived_idx = register_struct(&mut registry, interner.intern_str("Derived"), vec![], vec![base_class]);

        let mut resolver = LazyMemberResolver::new();
        let found = resolver.resolve(&registry, derived_idx, base_field).expect("inherited member should resolve");
        assert_eq!(found.owner, base_idx);
        assert_eq!(found.adjusted_offset_bits, 64);
    }

    #[test]
    fn unknown_member_misses_without_panicking() {
        let interner = StringInterner::new();
        let mut registry = TypeRegistry::new();
        registry.seed_builtins(&interner);
        let empty_idx = register_struct(&mut registry, interner.intern_str("Empty"), vec![], vec![]);
        let mut resolver = LazyMemberResolver::new();
        assert!(resolver.resolve(&registry, empty_idx, interner.intern_str("missing")).is_none());
        assert_eq!(resolver.statistics().cache_misses, 1);
    }
}
