use serde::{Deserialize, Serialize};

/// Where a node came from, for diagnostics. Deliberately independent of any
/// concrete lexer `Token` type: the lexer is an external collaborator
/// (spec §1), so AST nodes only retain the (file, line, column) triple a
/// diagnostics sink needs, not the token itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLoc {
    pub file_index: u32,
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub fn unknown() -> Self {
        SourceLoc {
            file_index: u32::MAX,
            line: 0,
            column: 0,
        }
    }
}

impl Default for SourceLoc {
    fn default() -> Self {
        Self::unknown()
    }
}
