//! Scoped, namespace-aware symbol table (spec §3.4, §4.3).
//!
//! Grounded on `examples/original_source/src/SymbolTable.h`'s scope-stack
//! plus persistent namespace-map dual storage: a namespace reopened in a
//! later block still sees symbols written in an earlier block of the same
//! namespace because `namespace_symbols_` survives scope pop, while
//! `scopes` gives ordinary block/function lexical nesting. Namespace paths
//! are kept as `Vec<StringHandle>` rather than a concatenated string, per
//! spec §3.4.

use std::collections::HashMap;

use cxxfe_ast::{FunctionId, StringHandle, StructId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Function,
    Block,
}

/// One overloadable binding. Non-function kinds never share a name with
/// another entry in the same scope (spec §3.4 invariant); functions may.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolEntry {
    Function(FunctionId),
    Struct(StructId),
    /// Ordinary variable/parameter/using-enum binding; `has_body_or_init`
    /// distinguishes a forward declaration from a definition for the
    /// upgrade rule.
    Variable { is_constexpr: bool },
    TemplateParam,
}

#[derive(Debug, Default)]
pub struct Scope {
    pub kind_namespace_path: Vec<StringHandle>,
    pub symbols: HashMap<StringHandle, Vec<SymbolEntry>>,
    pub using_directives: Vec<Vec<StringHandle>>,
    pub using_declarations: HashMap<StringHandle, (Vec<StringHandle>, StringHandle)>,
    pub namespace_aliases: HashMap<StringHandle, Vec<StringHandle>>,
}

impl Scope {
    fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Inserted fresh, or upgraded a forward declaration to a definition.
    Inserted,
    Upgraded,
    /// A duplicate non-function symbol (or identical-signature function
    /// definition) in the same scope; spec §4.3 "rejected".
    Rejected,
}

/// A single scope frame plus its `ScopeKind`, since `Scope` itself doesn't
/// carry the kind (kept separate so namespace-reopen logic can match on it
/// without threading an extra field through every constructor call site).
struct Frame {
    kind: ScopeKind,
    scope: Scope,
}

pub struct SymbolTable {
    frames: Vec<Frame>,
    /// Persistent map surviving scope pops: full namespace path -> name ->
    /// overload set. Spec §3.4: "lets a namespace reopened in a later
    /// block still see symbols written in earlier blocks of the same
    /// namespace".
    namespace_symbols: HashMap<Vec<StringHandle>, HashMap<StringHandle, Vec<SymbolEntry>>>,
    namespace_stack: Vec<StringHandle>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = SymbolTable {
            frames: Vec::new(),
            namespace_symbols: HashMap::new(),
            namespace_stack: Vec::new(),
        };
        table.frames.push(Frame {
            kind: ScopeKind::Global,
            scope: Scope::new(),
        });
        table.namespace_symbols.insert(Vec::new(), HashMap::new());
        table
    }

    pub fn current_namespace_path(&self) -> &[StringHandle] {
        &self.namespace_stack
    }

    pub fn push_namespace(&mut self, name: StringHandle) {
        self.namespace_stack.push(name);
        self.namespace_symbols
            .entry(self.namespace_stack.clone())
            .or_default();
        self.frames.push(Frame {
            kind: ScopeKind::Namespace,
            scope: Scope::new(),
        });
    }

    pub fn pop_namespace(&mut self) {
        self.frames.pop();
        self.namespace_stack.pop();
    }

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.frames.push(Frame {
            kind,
            scope: Scope::new(),
        });
    }

    pub fn pop_scope(&mut self) {
        self.frames.pop();
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames
            .last_mut()
            .expect("global scope is never popped")
    }

    fn is_function(entry: &SymbolEntry) -> bool {
        matches!(entry, SymbolEntry::Function(_))
    }

    /// Inserts `name -> entry` in the current scope, per spec §4.3: same
    /// full signature upgrades a forward declaration, otherwise a
    /// duplicate non-function symbol is rejected. `signatures_equal`
    /// compares two `SymbolEntry::Function`s and reports whether the one
    /// already present is a bodyless forward declaration (so the new one
    /// may upgrade it).
    pub fn insert(
        &mut self,
        name: StringHandle,
        entry: SymbolEntry,
        upgrade_check: impl Fn(&SymbolEntry, &SymbolEntry) -> Upgrade,
    ) -> InsertOutcome {
        let in_namespace_scope = self.current_frame_mut().kind == ScopeKind::Namespace;
        let ns_path = self.namespace_stack.clone();

        let frame = self.current_frame_mut();
        let existing = frame.scope.symbols.entry(name).or_default();

        let outcome = if existing.is_empty() {
            existing.push(entry.clone());
            InsertOutcome::Inserted
        } else if Self::is_function(&entry) && existing.iter().all(Self::is_function) {
            let mut matched_upgrade = None;
            for (i, slot) in existing.iter().enumerate() {
                match upgrade_check(slot, &entry) {
                    Upgrade::Identical => return InsertOutcome::Rejected,
                    Upgrade::ReplaceExisting => {
                        matched_upgrade = Some(i);
                        break;
                    }
                    Upgrade::DistinctOverload => {}
                }
            }
            match matched_upgrade {
                Some(i) => {
                    existing[i] = entry.clone();
                    InsertOutcome::Upgraded
                }
                None => {
                    existing.push(entry.clone());
                    InsertOutcome::Inserted
                }
            }
        } else {
            InsertOutcome::Rejected
        };

        if !matches!(outcome, InsertOutcome::Rejected) && in_namespace_scope {
            let ns_map = self.namespace_symbols.entry(ns_path).or_default();
            let slot = ns_map.entry(name).or_default();
            match outcome {
                InsertOutcome::Upgraded => {
                    let replace_at = slot.iter().position(|s| upgrade_check(s, &entry) == Upgrade::ReplaceExisting);
                    match replace_at {
                        Some(i) => slot[i] = entry,
                        None => slot.push(entry),
                    }
                }
                _ => slot.push(entry),
            }
        }

        outcome
    }

    /// Unqualified lookup, spec §4.3 order: using-declarations, direct
    /// symbols, using-directives, then (namespace scopes only) the
    /// persistent namespace map, walking outward.
    pub fn lookup(&self, name: StringHandle) -> Vec<SymbolEntry> {
        for (depth, frame) in self.frames.iter().enumerate().rev() {
            if let Some((ns_path, original)) = frame.scope.using_declarations.get(&name) {
                if let Some(found) = self.lookup_in_namespace(ns_path, *original) {
                    if !found.is_empty() {
                        return found;
                    }
                }
            }

            if let Some(entries) = frame.scope.symbols.get(&name) {
                if !entries.is_empty() {
                    return entries.clone();
                }
            }

            for directive in &frame.scope.using_directives {
                if let Some(found) = self.lookup_in_namespace(directive, name) {
                    if !found.is_empty() {
                        return found;
                    }
                }
            }

            if frame.kind == ScopeKind::Namespace {
                let path = &self.namespace_stack[..self.depth_at(depth)];
                if let Some(found) = self.lookup_in_namespace(path, name) {
                    if !found.is_empty() {
                        return found;
                    }
                }
            }
        }
        Vec::new()
    }

    /// How many namespace levels are active at or below frame index `idx`.
    fn depth_at(&self, idx: usize) -> usize {
        self.frames[..=idx]
            .iter()
            .filter(|f| f.kind == ScopeKind::Namespace)
            .count()
    }

    fn lookup_in_namespace(&self, path: &[StringHandle], name: StringHandle) -> Option<Vec<SymbolEntry>> {
        self.namespace_symbols
            .get(path)
            .and_then(|m| m.get(&name))
            .cloned()
    }

    /// Qualified lookup: resolves a namespace alias on the first path
    /// component, then queries the persistent map directly (spec §4.3).
    pub fn lookup_qualified(&self, path: &[StringHandle], name: StringHandle) -> Vec<SymbolEntry> {
        let resolved_path = self.resolve_alias(path);
        self.lookup_in_namespace(&resolved_path, name).unwrap_or_default()
    }

    fn resolve_alias(&self, path: &[StringHandle]) -> Vec<StringHandle> {
        if path.is_empty() {
            return Vec::new();
        }
        for frame in self.frames.iter().rev() {
            if let Some(target) = frame.scope.namespace_aliases.get(&path[0]) {
                let mut resolved = target.clone();
                resolved.extend_from_slice(&path[1..]);
                return resolved;
            }
        }
        path.to_vec()
    }

    pub fn add_using_directive(&mut self, path: Vec<StringHandle>) {
        self.current_frame_mut().scope.using_directives.push(path);
    }

    pub fn add_using_declaration(&mut self, local_name: StringHandle, path: Vec<StringHandle>, original: StringHandle) {
        self.current_frame_mut()
            .scope
            .using_declarations
            .insert(local_name, (path, original));
    }

    pub fn add_namespace_alias(&mut self, alias: StringHandle, target: Vec<StringHandle>) {
        self.current_frame_mut().scope.namespace_aliases.insert(alias, target);
    }

    /// Merges an inline namespace's entries into its parent (spec §4.3).
    pub fn merge_inline_namespace(&mut self, child: &[StringHandle], parent: &[StringHandle]) {
        let child_map = self.namespace_symbols.get(child).cloned().unwrap_or_default();
        let parent_map = self.namespace_symbols.entry(parent.to_vec()).or_default();
        for (name, entries) in child_map {
            parent_map.entry(name).or_default().extend(entries);
        }
    }
}

/// Outcome of comparing a candidate function insertion against an existing
/// overload-set slot, driving the upgrade-vs-reject-vs-distinct decision in
/// `SymbolTable::insert` (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upgrade {
    /// Existing slot is a bodyless forward declaration of the same
    /// signature; replace it with the (presumably defined) new entry.
    ReplaceExisting,
    /// Existing slot is a full duplicate of the same signature.
    Identical,
    /// Different signature: keep both as distinct overloads.
    DistinctOverload,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u32) -> StringHandle {
        StringHandle(n)
    }

    #[test]
    fn reopening_a_namespace_sees_earlier_block_symbols() {
        let mut table = SymbolTable::new();
        table.push_namespace(h(1));
        table.insert(h(2), SymbolEntry::Struct(StructId(0)), |_, _| Upgrade::DistinctOverload);
        table.pop_namespace();

        table.push_namespace(h(1));
        let found = table.lookup(h(2));
        assert_eq!(found, vec![SymbolEntry::Struct(StructId(0))]);
    }

    #[test]
    fn duplicate_non_function_symbol_is_rejected() {
        let mut table = SymbolTable::new();
        let first = table.insert(h(1), SymbolEntry::Struct(StructId(0)), |_, _| Upgrade::DistinctOverload);
        let second = table.insert(h(1), SymbolEntry::Struct(StructId(1)), |_, _| Upgrade::DistinctOverload);
        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::Rejected);
    }

    #[test]
    fn distinct_function_overloads_both_survive() {
        let mut table = SymbolTable::new();
        table.insert(h(1), SymbolEntry::Function(FunctionId(0)), |_, _| Upgrade::DistinctOverload);
        table.insert(h(1), SymbolEntry::Function(FunctionId(1)), |_, _| Upgrade::DistinctOverload);
        assert_eq!(table.lookup(h(1)).len(), 2);
    }

    #[test]
    fn using_directive_forwards_lookup_into_the_named_namespace() {
        let mut table = SymbolTable::new();
        table.push_namespace(h(10));
        table.insert(h(2), SymbolEntry::Struct(StructId(5)), |_, _| Upgrade::DistinctOverload);
        table.pop_namespace();

        table.add_using_directive(vec![h(10)]);
        assert_eq!(table.lookup(h(2)), vec![SymbolEntry::Struct(StructId(5))]);
    }
}
