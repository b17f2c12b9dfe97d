//! Crate-level regression scenarios exercised through the public surface
//! only (`compile_source`, or the same parser/arena wiring `driver.rs`
//! uses internally), one per named behavior this front end has to keep
//! getting right across refactors.

use cxxfe_ast::ast::{Access, Expr, FunctionDeclNode, FunctionKind, Param, TypeSpecifierNode};
use cxxfe_ast::ir::IrInstruction;
use cxxfe_ast::{AstArena, StringHandle, StringInterner, TypeIndex};
use cxxfe_compiler::template::{InstantiationKey, InstantiationQueue, InstantiationStatus, PointOfInstantiation};
use cxxfe_compiler::types::{Access as RegistryAccess, BaseClassInfo, MemberInfo, StructTypeInfo, TemplateArgRecord, TypeInfo, TypeRegistry};
use cxxfe_compiler::{compile_source, CompileContext, ConstExprEvaluator, ConstValue, Parser, SymbolTable, TemplateInstantiator};

fn no_identifiers(_: StringHandle) -> Option<cxxfe_ast::ExprId> {
    None
}

/// `constexpr int sum_below(int n) { int total = 0; for (int i = 0; i < n; ++i) total += i; return total; }`
/// evaluated at `n = 5`, mirroring what a `static_assert(sum_below(5) == 10)` would require the
/// evaluator to confirm.
#[test]
fn constexpr_for_loop_confirms_the_static_assert_a_caller_would_write() {
    let mut arena = AstArena::new();
    let n = StringHandle(1);
    let total = StringHandle(2);
    let i = StringHandle(3);
    let int_ty = arena.alloc_type_spec(TypeSpecifierNode {
        loc: cxxfe_ast::SourceLoc::unknown(),
        base: cxxfe_ast::ast::TypeSpecBase::Int,
        pointer_cv: Vec::new(),
        reference: cxxfe_ast::ast::ReferenceKind::None,
        array_extent: None,
        resolved: None,
    });

    let zero = arena.alloc_expr(Expr::IntLiteral(0));
    let decl_total = arena.alloc_stmt(cxxfe_ast::ast::Stmt::VarDecl { name: total, ty: None, init: Some(zero), is_static: false, is_constexpr: false });

    let zero_i = arena.alloc_expr(Expr::IntLiteral(0));
    let init_i = arena.alloc_stmt(cxxfe_ast::ast::Stmt::VarDecl { name: i, ty: None, init: Some(zero_i), is_static: false, is_constexpr: false });
    let i_ref = arena.alloc_expr(Expr::Identifier(i));
    let n_ref = arena.alloc_expr(Expr::Identifier(n));
    let cond = arena.alloc_expr(Expr::Binary { op: cxxfe_ast::ast::BinaryOp::Lt, lhs: i_ref, rhs: n_ref });
    let i_post = arena.alloc_expr(Expr::Identifier(i));
    let post = arena.alloc_expr(Expr::Unary { op: cxxfe_ast::ast::UnaryOp::PreIncrement, operand: i_post });

    let total_target = arena.alloc_expr(Expr::Identifier(total));
    let i_in_body = arena.alloc_expr(Expr::Identifier(i));
    let compound = arena.alloc_expr(Expr::CompoundAssign { target: total_target, op: cxxfe_ast::ast::CompoundOp::Add, value: i_in_body });
    let body = arena.alloc_stmt(cxxfe_ast::ast::Stmt::ExprStmt(compound));
    let for_stmt = arena.alloc_stmt(cxxfe_ast::ast::Stmt::For { init: Some(init_i), cond: Some(cond), post: Some(post), body });

    let total_ret = arena.alloc_expr(Expr::Identifier(total));
    let ret = arena.alloc_stmt(cxxfe_ast::ast::Stmt::Return(Some(total_ret)));

    let block = arena.alloc_block(cxxfe_ast::ast::Block { statements: vec![decl_total, for_stmt, ret] });

    let func = FunctionDeclNode {
        loc: cxxfe_ast::SourceLoc::unknown(),
        name: StringHandle(100),
        kind: FunctionKind::Ordinary,
        namespace_path: Vec::new(),
        enclosing_struct: None,
        template_params: Vec::new(),
        params: vec![Param { name: n, ty: int_ty, default_value: None }],
        return_type: Some(int_ty),
        body: Some(block),
        is_variadic: false,
        is_static: false,
        is_virtual: false,
        is_const: false,
        is_defaulted: false,
        is_deleted: false,
        is_inline: false,
        access: Access::Public,
        is_template_pattern: false,
    };

    let registry = TypeRegistry::new();
    let resolver = no_identifiers;
    let mut eval = ConstExprEvaluator::new(&registry, &resolver);
    assert_eq!(eval.call_function(&arena, &func, &[ConstValue::Int(5)]), Ok(ConstValue::Int(10)));
}

/// Two instantiation requests for the same `(template, args)` key collapse
/// into one pending entry (spec P2 "same canonical args -> same index").
#[test]
fn repeated_instantiation_requests_for_the_same_arguments_collapse_to_one_entry() {
    let mut queue = InstantiationQueue::new();
    let interner = StringInterner::new();
    let name = interner.intern_str("max");
    let key = InstantiationKey { template_name: name, args: vec![TemplateArgRecord::Value(4)] };
    let poi = PointOfInstantiation { file_index: 0, line: 1, column: 1 };

    queue.enqueue(key.clone(), poi);
    queue.enqueue(key.clone(), poi);
    assert_eq!(queue.stats().pending_count, 1);

    assert!(queue.mark_in_progress(key.clone()));
    assert!(!queue.mark_in_progress(key.clone()));

    queue.mark_complete(&key, TypeIndex::INVALID);
    assert!(matches!(queue.status(&key), Some(InstantiationStatus::Complete(_))));
    assert_eq!(queue.stats().pending_count, 0);

    // A further request for the same arguments is now satisfied without
    // re-entering the pending queue at all.
    queue.enqueue(key.clone(), poi);
    assert_eq!(queue.stats().pending_count, 0);
}

/// A derived struct's own fields start counting after its base classes
/// (spec I2/P3): `struct Base { int a; }; struct Derived : Base { int b; };`
/// places `Base` at offset 0 and `Derived`'s own field `b` right after it
/// at `sizeof(int)`, so the struct's total size is base-size-plus-field,
/// not just the size of its own members.
#[test]
fn derived_struct_layout_places_own_fields_after_the_base_subobject() {
    let interner = StringInterner::new();
    let mut registry = TypeRegistry::new();
    registry.seed_builtins(&interner);
    let int_ty = registry.builtin(cxxfe_ast::ir::BaseType::Int).expect("int is seeded");

    let base_name = interner.intern_str("Base");
    let base_idx = registry.add_struct(
        TypeInfo::scalar(base_name, cxxfe_ast::ir::BaseType::Struct, 32, 4),
        StructTypeInfo {
            members: vec![member("a", int_ty, 0)],
            ..Default::default()
        },
    );

    let derived_name = interner.intern_str("Derived");
    let derived_info = StructTypeInfo {
        members: vec![member("b", int_ty, 32)],
        base_classes: vec![BaseClassInfo { name: base_name, type_index: base_idx, offset_bits: 0, access: RegistryAccess::Public }],
        ..Default::default()
    };
    let derived_idx = registry.add_struct(TypeInfo::scalar(derived_name, cxxfe_ast::ir::BaseType::Struct, 32, 4), derived_info);

    let layout = registry.struct_info(derived_idx).expect("derived struct registered");
    assert_eq!(layout.total_size_bits(&registry), 64);
    assert_eq!(layout.base_classes[0].offset_bits, 0);
    assert_eq!(layout.members[0].offset_bits, 32);
}

fn member(name: &str, type_index: TypeIndex, offset_bits: u64) -> MemberInfo {
    MemberInfo {
        name: StringInterner::new().intern_str(name),
        type_index,
        size_in_bits: 32,
        offset_bits,
        access: RegistryAccess::Public,
        bitfield_width: None,
        bit_offset: None,
        default_initializer: None,
        is_reference: false,
        is_rvalue_reference: false,
    }
}

/// A user-declared `operator<=>` defaulted with `= default` gets the six
/// synthesized relational operators (spec §4.8 "defaulted spaceship
/// synthesizes `==`, `!=`, `<`, `>`, `<=`, `>=`") in addition to the
/// spaceship itself.
#[test]
fn defaulted_spaceship_synthesizes_the_six_relational_operators() {
    let ctx = CompileContext::default();
    let src = "struct Pair { int a; int b; auto operator<=>(const Pair& other) const = default; };";
    let result = compile_source(src, &ctx).expect("should compile");
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.diagnostics());

    let function_decls = result.module.instructions.iter().filter(|i| matches!(i, IrInstruction::FunctionDecl { .. })).count();
    // The spaceship itself plus six synthesized comparisons, at minimum
    // (implicit default constructor/destructor/assign add more on top).
    assert!(function_decls >= 7, "expected at least 7 FunctionDecl instructions, found {function_decls}");
}

/// `arr[idx] += delta;` reads the element before it writes it: the IR
/// stream must contain an `ArrayAccess` (the read) strictly before the
/// `ArrayStore` (the write) that follows the `BinArith` combining them.
#[test]
fn array_compound_assignment_reads_before_it_writes() {
    let ctx = CompileContext::default();
    let src = "void bump(int* arr, int idx, int delta) { arr[idx] += delta; }";
    let result = compile_source(src, &ctx).expect("should compile");
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.diagnostics());

    let access_pos = result.module.instructions.iter().position(|i| matches!(i, IrInstruction::ArrayAccess { .. }));
    let arith_pos = result.module.instructions.iter().position(|i| matches!(i, IrInstruction::BinArith { .. }));
    let store_pos = result.module.instructions.iter().position(|i| matches!(i, IrInstruction::ArrayStore { .. }));

    let (access_pos, arith_pos, store_pos) = (access_pos.expect("an ArrayAccess was emitted"), arith_pos.expect("a BinArith was emitted"), store_pos.expect("an ArrayStore was emitted"));
    assert!(access_pos < arith_pos, "the element must be read before it is combined with the new value");
    assert!(arith_pos < store_pos, "the combined value must be computed before it is stored back");
}

/// A variadic function template's pack parameter carries `is_pack: true`
/// on its own `TemplateParam`, independent of the (unrelated, C-style)
/// `...` an ordinary variadic parameter list supports.
#[test]
fn variadic_template_parameter_is_recorded_as_a_pack_in_declaration_order() {
    let interner = StringInterner::new();
    let mut registry = TypeRegistry::new();
    registry.seed_builtins(&interner);
    let mut symbols = SymbolTable::new();
    let mut queue = InstantiationQueue::new();
    let mut arena = AstArena::new();

    let mut stream = cxxfe_lexer::fixture::tokenize("template<typename T, typename... Rest> void first(T head, ...) {}", 0).expect("fixture source should tokenize");
    let mut ctx = CompileContext::default();

    let items = {
        let mut instantiator = TemplateInstantiator::new(&mut registry, &interner, &mut queue);
        let mut parser = Parser::new(&mut stream, &mut arena, &interner, &mut symbols, &mut instantiator, &mut ctx, 0);
        let program = parser.parse_program().expect("should parse");
        assert_eq!(program.items.len(), 1);
        parser.items().to_vec()
    };

    let cxxfe_ast::ast::Item::Function(fid) = items[0].clone() else {
        panic!("expected a single function template item");
    };
    let decl = arena.function(fid);
    assert_eq!(decl.template_params.len(), 2);
    assert!(!decl.template_params[0].is_pack, "the leading `T` is not a pack");
    assert!(decl.template_params[1].is_pack, "`Rest` is declared with a trailing `...`");
    assert_eq!(decl.params.len(), 1, "only the named `head` parameter is tracked; `...` sets is_variadic instead");
    assert!(decl.is_variadic);
}
