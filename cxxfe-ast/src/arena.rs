//! Append-only AST node storage (spec §3.3, §9 "Arena + indices instead of
//! pointer cycles").
//!
//! Grounded on `vex-ast/src/arena.rs`'s per-kind arena struct, reshaped from
//! `typed_arena::Arena<T>` + borrowed references to `Vec<T>` + integer
//! handles: a newly instantiated class can refer back to its pattern's
//! members through a stable `FunctionId`/`StructId` even after the arena has
//! grown well past the point where the pattern was allocated, which a
//! lifetime-scoped arena cannot give for free.
//!
//! Handles are never invalidated and the arena is never truncated, even
//! when the parser rewinds a failed speculative parse: non-declaration
//! nodes created in a discarded prefix are left in place and their ids are
//! recorded in `discarded` for bookkeeping (spec §4.4, §9).

use crate::ast::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnyNodeId {
    Expr(ExprId),
    Stmt(StmtId),
    Block(BlockId),
    TypeSpec(TypeSpecId),
}

#[derive(Debug, Default)]
pub struct AstArena {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    blocks: Vec<Block>,
    type_specs: Vec<TypeSpecifierNode>,
    functions: Vec<FunctionDeclNode>,
    structs: Vec<StructDeclNode>,

    /// Ids of non-declaration nodes moved out of the live tree by a
    /// speculative-parse rewind. The underlying storage for them is never
    /// freed or reused (append-only invariant); this is purely a record of
    /// which ids are orphaned.
    discarded: Vec<AnyNodeId>,
}

macro_rules! arena_accessors {
    ($alloc:ident, $get:ident, $get_mut:ident, $field:ident, $id:ty, $node:ty) => {
        pub fn $alloc(&mut self, node: $node) -> $id {
            self.$field.push(node);
            <$id>::from_raw((self.$field.len() - 1) as u32)
        }

        pub fn $get(&self, id: $id) -> &$node {
            &self.$field[id.index()]
        }

        pub fn $get_mut(&mut self, id: $id) -> &mut $node {
            &mut self.$field[id.index()]
        }
    };
}

/// Small helper trait so the macro above can build an id from a raw index
/// uniformly across the different node-id newtypes.
trait FromRaw {
    fn from_raw(v: u32) -> Self;
}
macro_rules! impl_from_raw {
    ($t:ty) => {
        impl FromRaw for $t {
            fn from_raw(v: u32) -> Self {
                Self(v)
            }
        }
    };
}
impl_from_raw!(ExprId);
impl_from_raw!(StmtId);
impl_from_raw!(BlockId);
impl_from_raw!(TypeSpecId);
impl_from_raw!(FunctionId);
impl_from_raw!(StructId);

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    arena_accessors!(alloc_expr, expr, expr_mut, exprs, ExprId, Expr);
    arena_accessors!(alloc_stmt, stmt, stmt_mut, stmts, StmtId, Stmt);
    arena_accessors!(alloc_block, block, block_mut, blocks, BlockId, Block);
    arena_accessors!(
        alloc_type_spec,
        type_spec,
        type_spec_mut,
        type_specs,
        TypeSpecId,
        TypeSpecifierNode
    );
    arena_accessors!(
        alloc_function,
        function,
        function_mut,
        functions,
        FunctionId,
        FunctionDeclNode
    );
    arena_accessors!(
        alloc_struct,
        strukt,
        strukt_mut,
        structs,
        StructId,
        StructDeclNode
    );

    /// High-watermark snapshot of every non-declaration pool, taken before
    /// a speculative parse attempt.
    pub fn watermark(&self) -> ArenaWatermark {
        ArenaWatermark {
            exprs: self.exprs.len(),
            stmts: self.stmts.len(),
            blocks: self.blocks.len(),
            type_specs: self.type_specs.len(),
        }
    }

    /// Records every non-declaration node allocated since `mark` as
    /// discarded. Storage is retained (append-only); only the bookkeeping
    /// list grows.
    pub fn discard_since(&mut self, mark: ArenaWatermark) {
        for i in mark.exprs..self.exprs.len() {
            self.discarded.push(AnyNodeId::Expr(ExprId(i as u32)));
        }
        for i in mark.stmts..self.stmts.len() {
            self.discarded.push(AnyNodeId::Stmt(StmtId(i as u32)));
        }
        for i in mark.blocks..self.blocks.len() {
            self.discarded.push(AnyNodeId::Block(BlockId(i as u32)));
        }
        for i in mark.type_specs..self.type_specs.len() {
            self.discarded
                .push(AnyNodeId::TypeSpec(TypeSpecId(i as u32)));
        }
    }

    pub fn discarded(&self) -> &[AnyNodeId] {
        &self.discarded
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn struct_count(&self) -> usize {
        self.structs.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaWatermark {
    exprs: usize,
    stmts: usize,
    blocks: usize,
    type_specs: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_returns_stable_growing_ids() {
        let mut arena = AstArena::new();
        let a = arena.alloc_expr(Expr::IntLiteral(1));
        let b = arena.alloc_expr(Expr::IntLiteral(2));
        assert_eq!(a.0 + 1, b.0);
        assert_eq!(*arena.expr(a), Expr::IntLiteral(1));
        assert_eq!(*arena.expr(b), Expr::IntLiteral(2));
    }

    #[test]
    fn rewind_discards_without_truncating_storage() {
        let mut arena = AstArena::new();
        let mark = arena.watermark();
        let discarded_id = arena.alloc_expr(Expr::IntLiteral(99));
        arena.discard_since(mark);

        // Storage for the discarded node is still valid and readable...
        assert_eq!(*arena.expr(discarded_id), Expr::IntLiteral(99));
        // ...and it is recorded as discarded.
        assert!(arena
            .discarded()
            .contains(&AnyNodeId::Expr(discarded_id)));

        // A later allocation keeps growing past the discarded node rather
        // than reusing its slot.
        let kept = arena.alloc_expr(Expr::IntLiteral(7));
        assert!(kept.0 > discarded_id.0);
    }
}
