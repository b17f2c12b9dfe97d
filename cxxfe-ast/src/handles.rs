//! Small integer handles used throughout the front end instead of pointers.
//!
//! See spec §3.1: equal handles mean equal underlying data, and hashing a
//! handle never touches the bytes/nodes it refers to.

use serde::{Deserialize, Serialize};

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                $name(v)
            }
        }
    };
}

handle_type!(
    /// Interned identifier or mangled-name handle.
    StringHandle
);

handle_type!(
    /// Index into the global type vector. `TypeIndex::INVALID` is the
    /// reserved void/invalid slot (spec §3.1).
    TypeIndex
);

handle_type!(
    /// Index into the namespace registry. `NamespaceHandle::GLOBAL` is the
    /// root namespace.
    NamespaceHandle
);

handle_type!(
    /// Monotonically numbered per-function IR temporary.
    TempVar
);

impl TypeIndex {
    pub const INVALID: TypeIndex = TypeIndex(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl NamespaceHandle {
    pub const GLOBAL: NamespaceHandle = NamespaceHandle(0);
}

impl TempVar {
    pub fn next(self) -> TempVar {
        TempVar(self.0 + 1)
    }
}
