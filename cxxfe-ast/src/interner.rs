//! String interner (spec §4.1).
//!
//! Grounded on `vex-compiler/src/types/interner.rs`'s `DashMap`-backed
//! cache, retargeted from interning `Type` values to interning raw byte
//! strings: `intern` is pure, and `view` is valid for the interner's full
//! lifetime because the backing store never shrinks or reorders.

use crate::handles::StringHandle;
use dashmap::DashMap;
use std::sync::RwLock;

/// Deduplicates byte strings into small integer handles.
///
/// `intern` is idempotent: two calls with equal bytes return equal handles
/// (P1). Reserved names used by the IR generator (`this`, `__vptr`, ...) are
/// pre-interned at construction so their handles are stable across runs.
pub struct StringInterner {
    by_bytes: DashMap<Vec<u8>, StringHandle>,
    // Append-only; indexed by StringHandle. A RwLock<Vec<_>> keeps `view`
    // O(1) while `intern` only needs exclusive access on a cache miss.
    by_handle: RwLock<Vec<Vec<u8>>>,
}

pub mod reserved {
    pub const THIS: &str = "this";
    pub const VPTR: &str = "__vptr";
    pub const COPY_THIS: &str = "__copy_this";
    pub const EXPLICIT_THIS: &str = "__this";
    pub const OTHER: &str = "other";

    pub fn param_name(n: usize) -> String {
        format!("__param_{n}")
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl StringInterner {
    pub fn new() -> Self {
        let interner = Self {
            by_bytes: DashMap::new(),
            by_handle: RwLock::new(Vec::new()),
        };
        for name in [
            reserved::THIS,
            reserved::VPTR,
            reserved::COPY_THIS,
            reserved::EXPLICIT_THIS,
            reserved::OTHER,
        ] {
            interner.intern(name.as_bytes());
        }
        interner
    }

    /// Interns `bytes`, returning a handle such that equal bytes always
    /// produce equal handles (P1).
    pub fn intern(&self, bytes: &[u8]) -> StringHandle {
        if let Some(existing) = self.by_bytes.get(bytes) {
            return *existing;
        }
        // Double-checked: another thread could have interned this key
        // between the `get` above and taking the write lock below.
        let mut table = self.by_handle.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = self.by_bytes.get(bytes) {
            return *existing;
        }
        let handle = StringHandle(table.len() as u32);
        table.push(bytes.to_vec());
        self.by_bytes.insert(bytes.to_vec(), handle);
        handle
    }

    pub fn intern_str(&self, s: &str) -> StringHandle {
        self.intern(s.as_bytes())
    }

    /// Returns the bytes a handle was interned from. Valid for the full
    /// lifetime of this interner (the backing store is append-only).
    pub fn view(&self, handle: StringHandle) -> Vec<u8> {
        let table = self.by_handle.read().unwrap_or_else(|e| e.into_inner());
        table
            .get(handle.index())
            .cloned()
            .unwrap_or_default()
    }

    pub fn view_str(&self, handle: StringHandle) -> String {
        String::from_utf8_lossy(&self.view(handle)).into_owned()
    }

    pub fn len(&self) -> usize {
        self.by_handle.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_pure_and_deduplicates() {
        let interner = StringInterner::new();
        let a = interner.intern_str("std::vector");
        let b = interner.intern_str("std::vector");
        let c = interner.intern_str("std::map");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.view_str(a), "std::vector");
    }

    #[test]
    fn reserved_names_are_preinterned() {
        let interner = StringInterner::new();
        let this_handle = interner.intern_str(reserved::THIS);
        assert_eq!(interner.view_str(this_handle), reserved::THIS);
    }
}
