//! Expression and type substitutors (spec §4.5.2, §4.5.3).
//!
//! Grounded on `examples/original_source/src/ExpressionSubstitutor.h/.cpp`'s
//! visitor shape, rebuilt over `cxxfe_ast`'s arena/handle nodes instead of
//! raw AST pointers. Substitution and pattern-cloning are fused into one
//! pass: every substituted node is freshly allocated in the arena, which is
//! what spec §4.5.4 step 3/4 ("clone the template pattern... run the
//! substitutors over the clone") needs in a handle-based arena where the
//! pattern itself must remain untouched.

use std::collections::HashMap;

use cxxfe_ast::ast::*;
use cxxfe_ast::{AstArena, StringHandle, TypeIndex};

/// What a template parameter name is bound to while substituting a clone of
/// its pattern (spec §4.5.2: "a numeric/bool literal for non-type args, a
/// `TypeSpecifierNode` for type args").
#[derive(Debug, Clone)]
pub enum ArgBinding {
    Type(TypeSpecId),
    Value(ExprId),
}

#[derive(Debug, Clone, Default)]
pub struct SubstitutionMap {
    pub params: HashMap<StringHandle, ArgBinding>,
    pub packs: HashMap<StringHandle, Vec<ArgBinding>>,
}

impl SubstitutionMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn bind_pack_element(&self, pack_name: StringHandle, index: usize) -> Option<SubstitutionMap> {
        let elem = self.packs.get(&pack_name)?.get(index)?.clone();
        let mut local = self.clone();
        local.params.insert(pack_name, elem);
        Some(local)
    }
}

/// Callback the instantiator supplies so the type substitutor can trigger a
/// nested class-template instantiation without this module depending on
/// `TemplateInstantiator` directly (spec §4.5.3: "enqueue instantiation of
/// the base template with the substituted list, return the resulting
/// `TypeIndex`").
pub trait TypeResolver {
    fn instantiate(&mut self, arena: &mut AstArena, base_name: StringHandle, args: &[TemplateArgSpec]) -> Option<TypeIndex>;
}

/// A resolver that never instantiates anything; useful where substitution
/// is purely syntactic (e.g. substituting a function body that has no
/// nested class-template uses).
pub struct NoopResolver;
impl TypeResolver for NoopResolver {
    fn instantiate(&mut self, _arena: &mut AstArena, _base: StringHandle, _args: &[TemplateArgSpec]) -> Option<TypeIndex> {
        None
    }
}

fn pack_name_of(arena: &AstArena, id: ExprId, subst: &SubstitutionMap) -> Option<StringHandle> {
    match arena.expr(id) {
        Expr::Identifier(name) | Expr::TemplateParamRef(name) if subst.packs.contains_key(name) => Some(*name),
        _ => None,
    }
}

fn type_pack_name_of(arena: &AstArena, id: TypeSpecId, subst: &SubstitutionMap) -> Option<StringHandle> {
    match &arena.type_spec(id).base {
        TypeSpecBase::TemplateParam(name) | TypeSpecBase::Named { name, .. } if subst.packs.contains_key(name) => Some(*name),
        TypeSpecBase::PackExpansion(inner) => type_pack_name_of(arena, *inner, subst),
        _ => None,
    }
}

/// Substitutes a single type node, spec §4.5.3.
pub fn substitute_type(arena: &mut AstArena, subst: &SubstitutionMap, resolver: &mut dyn TypeResolver, id: TypeSpecId) -> TypeSpecId {
    let node = arena.type_spec(id).clone();

    let base = match &node.base {
        TypeSpecBase::TemplateParam(name) => {
            if let Some(ArgBinding::Type(bound)) = subst.params.get(name) {
                let bound_node = arena.type_spec(*bound).clone();
                // Union the caller's pointer/CV/reference qualifiers with
                // the argument's own, per spec §4.5.3.
                let mut merged = bound_node;
                let mut pointer_cv = node.pointer_cv.clone();
                pointer_cv.extend(merged.pointer_cv.clone());
                merged.pointer_cv = pointer_cv;
                if node.reference != ReferenceKind::None {
                    merged.reference = node.reference;
                }
                return arena.alloc_type_spec(merged);
            }
            node.base.clone()
        }
        TypeSpecBase::Named { name, template_args } if !template_args.is_empty() => {
            let substituted_args = substitute_template_arg_list(arena, subst, resolver, template_args);
            let resolved = resolver.instantiate(arena, *name, &substituted_args);
            let mut spec = node.clone();
            spec.base = TypeSpecBase::Named { name: *name, template_args: substituted_args };
            spec.resolved = resolved.or(spec.resolved);
            return arena.alloc_type_spec(spec);
        }
        TypeSpecBase::Named { name, .. } => {
            if let Some(ArgBinding::Type(bound)) = subst.params.get(name) {
                let mut merged = arena.type_spec(*bound).clone();
                let mut pointer_cv = node.pointer_cv.clone();
                pointer_cv.extend(merged.pointer_cv.clone());
                merged.pointer_cv = pointer_cv;
                return arena.alloc_type_spec(merged);
            }
            node.base.clone()
        }
        TypeSpecBase::Decltype(inner) => {
            let new_inner = substitute_expr(arena, subst, resolver, *inner);
            TypeSpecBase::Decltype(new_inner)
        }
        TypeSpecBase::FunctionPointer { params, ret } => {
            let new_params = params.iter().map(|p| substitute_type(arena, subst, resolver, *p)).collect();
            let new_ret = substitute_type(arena, subst, resolver, *ret);
            TypeSpecBase::FunctionPointer { params: new_params, ret: new_ret }
        }
        TypeSpecBase::MemberObjectPointer { class_name, inner } => {
            TypeSpecBase::MemberObjectPointer { class_name: *class_name, inner: substitute_type(arena, subst, resolver, *inner) }
        }
        TypeSpecBase::MemberFunctionPointer { class_name, params, ret } => {
            let new_params = params.iter().map(|p| substitute_type(arena, subst, resolver, *p)).collect();
            TypeSpecBase::MemberFunctionPointer {
                class_name: *class_name,
                params: new_params,
                ret: substitute_type(arena, subst, resolver, *ret),
            }
        }
        TypeSpecBase::PackExpansion(inner) => TypeSpecBase::PackExpansion(substitute_type(arena, subst, resolver, *inner)),
        other => other.clone(),
    };

    let mut new_node = node;
    new_node.base = base;
    arena.alloc_type_spec(new_node)
}

/// Expands a `TemplateArgSpec` list, splicing in pack elements where a
/// pack-bound parameter appears (spec §4.5.2 pack detection).
pub fn substitute_template_arg_list(
    arena: &mut AstArena,
    subst: &SubstitutionMap,
    resolver: &mut dyn TypeResolver,
    args: &[TemplateArgSpec],
) -> Vec<TemplateArgSpec> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            TemplateArgSpec::Type(ty) => {
                if let Some(pack_name) = type_pack_name_of(arena, *ty, subst) {
                    if let Some(elems) = subst.packs.get(&pack_name).cloned() {
                        for i in 0..elems.len() {
                            let local = subst.bind_pack_element(pack_name, i).unwrap_or_else(|| subst.clone());
                            out.push(TemplateArgSpec::Type(substitute_type(arena, &local, resolver, *ty)));
                        }
                        continue;
                    }
                }
                out.push(TemplateArgSpec::Type(substitute_type(arena, subst, resolver, *ty)));
            }
            TemplateArgSpec::Value(expr) => {
                if let Some(pack_name) = pack_name_of(arena, *expr, subst) {
                    if let Some(elems) = subst.packs.get(&pack_name).cloned() {
                        for i in 0..elems.len() {
                            let local = subst.bind_pack_element(pack_name, i).unwrap_or_else(|| subst.clone());
                            out.push(TemplateArgSpec::Value(substitute_expr(arena, &local, resolver, *expr)));
                        }
                        continue;
                    }
                }
                out.push(TemplateArgSpec::Value(substitute_expr(arena, subst, resolver, *expr)));
            }
        }
    }
    out
}

/// Substitutes a single expression node, spec §4.5.2.
pub fn substitute_expr(arena: &mut AstArena, subst: &SubstitutionMap, resolver: &mut dyn TypeResolver, id: ExprId) -> ExprId {
    let node = arena.expr(id).clone();

    let new_node = match node {
        Expr::Identifier(name) | Expr::TemplateParamRef(name) => match subst.params.get(&name) {
            Some(ArgBinding::Value(expr)) => return substitute_expr(arena, subst, resolver, *expr),
            Some(ArgBinding::Type(ty)) => {
                // A type parameter referenced where an expression is
                // expected only arises from pseudo-destructor-style uses;
                // leave the node alone and let downstream resolution fault
                // on it rather than fabricate an expression.
                let _ = ty;
                Expr::Identifier(name)
            }
            None => Expr::Identifier(name),
        },
        Expr::QualifiedIdentifier { namespace_path, name } => {
            let new_path = namespace_path
                .iter()
                .map(|seg| match subst.params.get(seg) {
                    Some(ArgBinding::Type(ty)) => {
                        let resolved_ty = substitute_type(arena, subst, resolver, *ty);
                        match &arena.type_spec(resolved_ty).base {
                            TypeSpecBase::Named { name, .. } => *name,
                            _ => *seg,
                        }
                    }
                    _ => *seg,
                })
                .collect();
            Expr::QualifiedIdentifier { namespace_path: new_path, name }
        }
        Expr::MemberAccess { object, member, is_arrow } => Expr::MemberAccess {
            object: substitute_expr(arena, subst, resolver, object),
            member,
            is_arrow,
        },
        Expr::PointerToMemberAccess { object, member_ptr, is_arrow } => Expr::PointerToMemberAccess {
            object: substitute_expr(arena, subst, resolver, object),
            member_ptr: substitute_expr(arena, subst, resolver, member_ptr),
            is_arrow,
        },
        Expr::ArraySubscript { array, index } => Expr::ArraySubscript {
            array: substitute_expr(arena, subst, resolver, array),
            index: substitute_expr(arena, subst, resolver, index),
        },
        Expr::Call { callee, explicit_template_args, args } => Expr::Call {
            callee: substitute_expr(arena, subst, resolver, callee),
            explicit_template_args: substitute_template_arg_list(arena, subst, resolver, &explicit_template_args),
            args: substitute_expr_list(arena, subst, resolver, &args),
        },
        Expr::MemberCall { object, method, explicit_template_args, args, is_arrow } => Expr::MemberCall {
            object: substitute_expr(arena, subst, resolver, object),
            method,
            explicit_template_args: substitute_template_arg_list(arena, subst, resolver, &explicit_template_args),
            args: substitute_expr_list(arena, subst, resolver, &args),
            is_arrow,
        },
        Expr::ConstructorCall { ty, args } => Expr::ConstructorCall {
            ty: substitute_type(arena, subst, resolver, ty),
            args: substitute_expr_list(arena, subst, resolver, &args),
        },
        Expr::Unary { op, operand } => Expr::Unary { op, operand: substitute_expr(arena, subst, resolver, operand) },
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op,
            lhs: substitute_expr(arena, subst, resolver, lhs),
            rhs: substitute_expr(arena, subst, resolver, rhs),
        },
        Expr::Ternary { cond, then_branch, else_branch } => Expr::Ternary {
            cond: substitute_expr(arena, subst, resolver, cond),
            then_branch: substitute_expr(arena, subst, resolver, then_branch),
            else_branch: substitute_expr(arena, subst, resolver, else_branch),
        },
        Expr::Assign { target, value } => Expr::Assign {
            target: substitute_expr(arena, subst, resolver, target),
            value: substitute_expr(arena, subst, resolver, value),
        },
        Expr::CompoundAssign { target, op, value } => Expr::CompoundAssign {
            target: substitute_expr(arena, subst, resolver, target),
            op,
            value: substitute_expr(arena, subst, resolver, value),
        },
        Expr::SizeOfType(ty) => Expr::SizeOfType(substitute_type(arena, subst, resolver, ty)),
        Expr::SizeOfExpr(e) => Expr::SizeOfExpr(substitute_expr(arena, subst, resolver, e)),
        Expr::AlignOfType(ty) => Expr::AlignOfType(substitute_type(arena, subst, resolver, ty)),
        Expr::OffsetOf { ty, member } => Expr::OffsetOf { ty: substitute_type(arena, subst, resolver, ty), member },
        Expr::TypeTrait { kind, lhs, rhs } => Expr::TypeTrait {
            kind,
            lhs: substitute_type(arena, subst, resolver, lhs),
            rhs: rhs.map(|r| substitute_type(arena, subst, resolver, r)),
        },
        Expr::Noexcept(e) => Expr::Noexcept(substitute_expr(arena, subst, resolver, e)),
        Expr::InitializerList(entries) => Expr::InitializerList(
            entries
                .into_iter()
                .map(|entry| match entry {
                    InitListEntry::Positional(e) => InitListEntry::Positional(substitute_expr(arena, subst, resolver, e)),
                    InitListEntry::Designated(name, e) => InitListEntry::Designated(name, substitute_expr(arena, subst, resolver, e)),
                })
                .collect(),
        ),
        Expr::Lambda { captures, params, return_type, body, lambda_id } => {
            let new_params = params
                .iter()
                .map(|p| Param {
                    name: p.name,
                    ty: substitute_type(arena, subst, resolver, p.ty),
                    default_value: p.default_value.map(|e| substitute_expr(arena, subst, resolver, e)),
                })
                .collect();
            Expr::Lambda {
                captures,
                params: new_params,
                return_type: return_type.map(|t| substitute_type(arena, subst, resolver, t)),
                body: substitute_block(arena, subst, resolver, body),
                lambda_id,
            }
        }
        Expr::FoldExpression { op, pack, init, is_left_fold } => Expr::FoldExpression {
            op,
            pack: substitute_expr(arena, subst, resolver, pack),
            init: init.map(|e| substitute_expr(arena, subst, resolver, e)),
            is_left_fold,
        },
        Expr::Decltype(e) => Expr::Decltype(substitute_expr(arena, subst, resolver, e)),
        Expr::PseudoDestructorCall { object, ty } => Expr::PseudoDestructorCall {
            object: substitute_expr(arena, subst, resolver, object),
            ty: substitute_type(arena, subst, resolver, ty),
        },
        Expr::New { ty, args, array_size } => Expr::New {
            ty: substitute_type(arena, subst, resolver, ty),
            args: substitute_expr_list(arena, subst, resolver, &args),
            array_size: array_size.map(|e| substitute_expr(arena, subst, resolver, e)),
        },
        Expr::Delete { operand, is_array } => Expr::Delete { operand: substitute_expr(arena, subst, resolver, operand), is_array },
        Expr::Cast { kind, ty, operand } => Expr::Cast {
            kind,
            ty: substitute_type(arena, subst, resolver, ty),
            operand: substitute_expr(arena, subst, resolver, operand),
        },
        Expr::PackExpansion(inner) => Expr::PackExpansion(substitute_expr(arena, subst, resolver, inner)),
        literal @ (Expr::IntLiteral(_)
        | Expr::UIntLiteral(_)
        | Expr::FloatLiteral(_)
        | Expr::BoolLiteral(_)
        | Expr::StringLiteral(_)
        | Expr::CharLiteral(_)
        | Expr::NullptrLiteral
        | Expr::RequiresExpression { .. }) => literal,
    };

    arena.alloc_expr(new_node)
}

/// Expands a `Vec<ExprId>` argument/initializer list, splicing pack
/// elements in place of a bare pack-expansion entry (spec §4.5.2).
pub fn substitute_expr_list(arena: &mut AstArena, subst: &SubstitutionMap, resolver: &mut dyn TypeResolver, ids: &[ExprId]) -> Vec<ExprId> {
    let mut out = Vec::new();
    for &id in ids {
        if let Expr::PackExpansion(inner) = arena.expr(id).clone() {
            if let Some(pack_name) = pack_name_of(arena, inner, subst) {
                if let Some(elems) = subst.packs.get(&pack_name).cloned() {
                    for i in 0..elems.len() {
                        let local = subst.bind_pack_element(pack_name, i).unwrap_or_else(|| subst.clone());
                        out.push(substitute_expr(arena, &local, resolver, inner));
                    }
                    continue;
                }
            }
            out.push(substitute_expr(arena, subst, resolver, inner));
            continue;
        }
        out.push(substitute_expr(arena, subst, resolver, id));
    }
    out
}

pub fn substitute_block(arena: &mut AstArena, subst: &SubstitutionMap, resolver: &mut dyn TypeResolver, id: BlockId) -> BlockId {
    let stmts: Vec<StmtId> = arena.block(id).statements.clone();
    let new_stmts = stmts.iter().map(|&s| substitute_stmt(arena, subst, resolver, s)).collect();
    arena.alloc_block(Block { statements: new_stmts })
}

pub fn substitute_stmt(arena: &mut AstArena, subst: &SubstitutionMap, resolver: &mut dyn TypeResolver, id: StmtId) -> StmtId {
    let node = arena.stmt(id).clone();
    let new_node = match node {
        Stmt::Block(b) => Stmt::Block(substitute_block(arena, subst, resolver, b)),
        Stmt::ExprStmt(e) => Stmt::ExprStmt(substitute_expr(arena, subst, resolver, e)),
        Stmt::VarDecl { name, ty, init, is_static, is_constexpr } => Stmt::VarDecl {
            name,
            ty: ty.map(|t| substitute_type(arena, subst, resolver, t)),
            init: init.map(|e| substitute_expr(arena, subst, resolver, e)),
            is_static,
            is_constexpr,
        },
        Stmt::StructuredBinding { names, init } => Stmt::StructuredBinding { names, init: substitute_expr(arena, subst, resolver, init) },
        Stmt::If { init, cond, then_branch, else_branch } => Stmt::If {
            init: init.map(|s| substitute_stmt(arena, subst, resolver, s)),
            cond: substitute_expr(arena, subst, resolver, cond),
            then_branch: substitute_stmt(arena, subst, resolver, then_branch),
            else_branch: else_branch.map(|s| substitute_stmt(arena, subst, resolver, s)),
        },
        Stmt::While { cond, body } => Stmt::While {
            cond: substitute_expr(arena, subst, resolver, cond),
            body: substitute_stmt(arena, subst, resolver, body),
        },
        Stmt::DoWhile { body, cond } => Stmt::DoWhile {
            body: substitute_stmt(arena, subst, resolver, body),
            cond: substitute_expr(arena, subst, resolver, cond),
        },
        Stmt::For { init, cond, post, body } => Stmt::For {
            init: init.map(|s| substitute_stmt(arena, subst, resolver, s)),
            cond: cond.map(|e| substitute_expr(arena, subst, resolver, e)),
            post: post.map(|e| substitute_expr(arena, subst, resolver, e)),
            body: substitute_stmt(arena, subst, resolver, body),
        },
        Stmt::RangedFor { binding, range, body } => Stmt::RangedFor {
            binding,
            range: substitute_expr(arena, subst, resolver, range),
            body: substitute_stmt(arena, subst, resolver, body),
        },
        Stmt::Switch { value, cases, default_case } => Stmt::Switch {
            value: substitute_expr(arena, subst, resolver, value),
            cases: cases
                .into_iter()
                .map(|(labels, body)| {
                    (
                        labels.iter().map(|&e| substitute_expr(arena, subst, resolver, e)).collect(),
                        substitute_stmt(arena, subst, resolver, body),
                    )
                })
                .collect(),
            default_case: default_case.map(|s| substitute_stmt(arena, subst, resolver, s)),
        },
        Stmt::Labeled { label, stmt } => Stmt::Labeled { label, stmt: substitute_stmt(arena, subst, resolver, stmt) },
        Stmt::Return(e) => Stmt::Return(e.map(|e| substitute_expr(arena, subst, resolver, e))),
        Stmt::Try { body, catches } => Stmt::Try {
            body: substitute_block(arena, subst, resolver, body),
            catches: catches
                .into_iter()
                .map(|c| CatchClause {
                    exception_ty: c.exception_ty.map(|t| substitute_type(arena, subst, resolver, t)),
                    binding: c.binding,
                    body: substitute_block(arena, subst, resolver, c.body),
                })
                .collect(),
        },
        Stmt::Throw(e) => Stmt::Throw(e.map(|e| substitute_expr(arena, subst, resolver, e))),
        Stmt::SehTry { body, except_body, finally_body } => Stmt::SehTry {
            body: substitute_block(arena, subst, resolver, body),
            except_body: except_body.map(|b| substitute_block(arena, subst, resolver, b)),
            finally_body: finally_body.map(|b| substitute_block(arena, subst, resolver, b)),
        },
        Stmt::Typedef { name, ty } => Stmt::Typedef { name, ty: substitute_type(arena, subst, resolver, ty) },
        Stmt::StaticAssert { cond, message } => Stmt::StaticAssert { cond: substitute_expr(arena, subst, resolver, cond), message },
        passthrough @ (Stmt::Break
        | Stmt::Continue
        | Stmt::Goto(_)
        | Stmt::SehLeave
        | Stmt::UsingDirective { .. }
        | Stmt::UsingDeclaration { .. }
        | Stmt::UsingEnum(_)
        | Stmt::NamespaceAlias { .. }) => passthrough,
    };
    arena.alloc_stmt(new_node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_matching_a_value_parameter_becomes_the_bound_literal() {
        let mut arena = AstArena::new();
        let param_name = StringHandle(1);
        let literal = arena.alloc_expr(Expr::IntLiteral(42));
        let reference = arena.alloc_expr(Expr::Identifier(param_name));

        let mut subst = SubstitutionMap::new();
        subst.params.insert(param_name, ArgBinding::Value(literal));

        let mut resolver = NoopResolver;
        let result = substitute_expr(&mut arena, &subst, &mut resolver, reference);
        assert_eq!(*arena.expr(result), Expr::IntLiteral(42));
    }

    #[test]
    fn pack_expansion_splices_each_bound_element() {
        let mut arena = AstArena::new();
        let pack_name = StringHandle(2);
        let a = arena.alloc_expr(Expr::IntLiteral(1));
        let b = arena.alloc_expr(Expr::IntLiteral(2));

        let mut subst = SubstitutionMap::new();
        subst.packs.insert(pack_name, vec![ArgBinding::Value(a), ArgBinding::Value(b)]);

        let pack_ref = arena.alloc_expr(Expr::Identifier(pack_name));
        let expansion = arena.alloc_expr(Expr::PackExpansion(pack_ref));

        let mut resolver = NoopResolver;
        let expanded = substitute_expr_list(&mut arena, &subst, &mut resolver, &[expansion]);
        assert_eq!(expanded.len(), 2);
        assert_eq!(*arena.expr(expanded[0]), Expr::IntLiteral(1));
        assert_eq!(*arena.expr(expanded[1]), Expr::IntLiteral(2));
    }

    #[test]
    fn unrelated_literal_is_cloned_into_a_new_node_unchanged() {
        let mut arena = AstArena::new();
        let lit = arena.alloc_expr(Expr::IntLiteral(9));
        let subst = SubstitutionMap::new();
        let mut resolver = NoopResolver;
        let result = substitute_expr(&mut arena, &subst, &mut resolver, lit);
        assert_ne!(result, lit);
        assert_eq!(*arena.expr(result), Expr::IntLiteral(9));
    }
}
