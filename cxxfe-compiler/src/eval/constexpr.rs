//! Constant-expression evaluator (spec §4.6). Grounded on
//! `examples/original_source/src/ConstExprEvaluator.h`'s `Evaluator::evaluate`
//! dispatch and its `safe_add`/`safe_sub`/`safe_mul` overflow-checked
//! arithmetic, reshaped onto `checked_*` integer methods and this crate's
//! `Expr` arena instead of a `std::variant<ASTNode>` tree.
//!
//! Identifier lookup is injected as a closure rather than taking a
//! `SymbolTable` directly: nothing in this crate's AST yet threads a
//! variable declaration's `ExprId` through `SymbolEntry::Variable`, so the
//! caller (semantic analysis) is the one that knows how to turn a name into
//! "the initializer of the constexpr variable bound to it, if any".

use std::collections::HashMap;

use cxxfe_ast::ast::{BinaryOp, CastKind, CompoundOp, Expr, FunctionDeclNode, Stmt, TemplateArgSpec, TypeSpecBase, TypeSpecId};
use cxxfe_ast::ast::UnaryOp;
use cxxfe_ast::{AstArena, BlockId, ExprId, FunctionId, StringHandle};

use crate::types::registry::TypeRegistry;

/// What a statement handed back up a constexpr function body's control
/// flow (spec §4.6 "if/while/for with a local mutable binding map, and
/// return"). Loop bodies are re-entered by `exec_stmt`/`exec_block`
/// themselves, never by host-language recursion into the same loop — spec
/// §9 "the evaluator's statement visitor threads a mutable binding map
/// explicitly; loop bodies are re-entered by the visitor, not by
/// language-level coroutines".
#[derive(Debug, Clone, PartialEq)]
enum ControlFlow {
    Normal,
    Break,
    Continue,
    Return(Option<ConstValue>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
}

impl ConstValue {
    pub fn as_bool(self) -> bool {
        match self {
            ConstValue::Bool(b) => b,
            ConstValue::Int(v) => v != 0,
            ConstValue::UInt(v) => v != 0,
            ConstValue::Double(v) => v != 0.0,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            ConstValue::Bool(b) => b as i64,
            ConstValue::Int(v) => v,
            ConstValue::UInt(v) => v as i64,
            ConstValue::Double(v) => v as i64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            ConstValue::Bool(b) => b as i64 as f64,
            ConstValue::Int(v) => v as f64,
            ConstValue::UInt(v) => v as f64,
            ConstValue::Double(v) => v,
        }
    }

    fn is_floating(self) -> bool {
        matches!(self, ConstValue::Double(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    NotConstant(String),
    Overflow(String),
    ComplexityLimitExceeded,
    RecursionLimitExceeded,
    UndefinedIdentifier(StringHandle),
    UnsupportedExpression,
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::NotConstant(msg) => write!(f, "not a constant expression: {msg}"),
            EvalError::Overflow(msg) => write!(f, "constant expression overflow: {msg}"),
            EvalError::ComplexityLimitExceeded => write!(f, "constant expression evaluation exceeded its complexity budget"),
            EvalError::RecursionLimitExceeded => write!(f, "constant expression evaluation exceeded its recursion depth limit"),
            EvalError::UndefinedIdentifier(_) => write!(f, "undefined identifier in constant expression"),
            EvalError::UnsupportedExpression => write!(f, "expression type not supported in constant expressions"),
        }
    }
}

/// Per-evaluation budget and identifier resolver, spec §4.6's
/// `EvaluationContext` analogue.
pub struct ConstExprEvaluator<'a> {
    registry: &'a TypeRegistry,
    resolve_identifier: &'a dyn Fn(StringHandle) -> Option<ExprId>,
    /// Looks up a constexpr function's `FunctionId` by name for `Expr::Call`
    /// (spec §4.6 "constexpr function calls"). `None` means this evaluator
    /// was built for a context with no function calls available (e.g. a
    /// bare `static_assert` over literals), matching the closure-injection
    /// style `resolve_identifier` already uses.
    resolve_function: Option<&'a dyn Fn(StringHandle) -> Option<FunctionId>>,
    /// Resolves `sizeof`/`alignof` on a template-instantiation type name to
    /// the `(size_in_bits, alignment)` of its already-produced instantiation
    /// (spec §4.6). Takes `arena` directly rather than capturing it, since
    /// the caller already has one in scope at every call site; `None` means
    /// either no instantiation context is available or the named
    /// instantiation hasn't been produced.
    resolve_instantiation: Option<&'a dyn Fn(&AstArena, StringHandle, &[TemplateArgSpec]) -> Option<(u32, u32)>>,
    max_steps: usize,
    max_depth: usize,
    steps: usize,
    depth: usize,
    /// Stack of mutable binding maps for the constexpr function call
    /// currently being evaluated (spec §4.6 "a fresh map, evaluated
    /// recursively"; §4.6 "a nested function call gets a fresh binding map;
    /// the caller's map is preserved across the call" — here "fresh" means
    /// a new stack, pushed by `call_function`, not cleared in place).
    locals: Vec<HashMap<StringHandle, ConstValue>>,
}

impl<'a> ConstExprEvaluator<'a> {
    pub fn new(registry: &'a TypeRegistry, resolve_identifier: &'a dyn Fn(StringHandle) -> Option<ExprId>) -> Self {
        ConstExprEvaluator {
            registry,
            resolve_identifier,
            resolve_function: None,
            resolve_instantiation: None,
            max_steps: 1_000_000,
            max_depth: 512,
            steps: 0,
            depth: 0,
            locals: Vec::new(),
        }
    }

    pub fn with_limits(mut self, max_steps: usize, max_depth: usize) -> Self {
        self.max_steps = max_steps;
        self.max_depth = max_depth;
        self
    }

    /// Enables `Expr::Call` to reach constexpr function definitions by
    /// name, for evaluating expressions like `f(5)` where `f` is a
    /// constexpr function (spec §4.6, scenario 1 in spec §8).
    pub fn with_function_resolver(mut self, resolver: &'a dyn Fn(StringHandle) -> Option<FunctionId>) -> Self {
        self.resolve_function = Some(resolver);
        self
    }

    /// Enables `sizeof`/`alignof` on a template-instantiation type name
    /// (e.g. `sizeof(Wrapper<int>)`) to reach the already-instantiated
    /// type's layout instead of always failing with `NotConstant`.
    pub fn with_instantiation_resolver(mut self, resolver: &'a dyn Fn(&AstArena, StringHandle, &[TemplateArgSpec]) -> Option<(u32, u32)>) -> Self {
        self.resolve_instantiation = Some(resolver);
        self
    }

    /// Calls a constexpr function with already-evaluated argument values
    /// (spec §4.6: "parameters bound in a fresh map, evaluated recursively
    /// up to `max_recursion_depth`"). Used both by `Expr::Call` and
    /// directly by callers (e.g. the IR generator evaluating a static
    /// initializer) that already have a resolved `FunctionDeclNode`.
    pub fn call_function(&mut self, arena: &AstArena, func: &FunctionDeclNode, args: &[ConstValue]) -> Result<ConstValue, EvalError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            return Err(EvalError::RecursionLimitExceeded);
        }
        let Some(body) = func.body else {
            self.depth -= 1;
            return Err(EvalError::NotConstant("constexpr function has no body".to_string()));
        };

        self.locals.push(HashMap::new());
        for (param, value) in func.params.iter().zip(args.iter()) {
            if let Some(scope) = self.locals.last_mut() {
                scope.insert(param.name, *value);
            }
        }

        let outcome = self.exec_block(arena, body);
        self.locals.pop();
        self.depth -= 1;

        match outcome? {
            ControlFlow::Return(v) => Ok(v.unwrap_or(ConstValue::Int(0))),
            ControlFlow::Normal => Err(EvalError::NotConstant("constexpr function fell off the end without a return".to_string())),
            ControlFlow::Break | ControlFlow::Continue => Err(EvalError::NotConstant("break/continue escaped the enclosing loop".to_string())),
        }
    }

    fn exec_block(&mut self, arena: &AstArena, id: BlockId) -> Result<ControlFlow, EvalError> {
        self.locals.push(HashMap::new());
        let result = self.exec_statements(arena, id);
        self.locals.pop();
        result
    }

    fn exec_statements(&mut self, arena: &AstArena, id: BlockId) -> Result<ControlFlow, EvalError> {
        for stmt_id in &arena.block(id).statements {
            match self.exec_stmt(arena, *stmt_id)? {
                ControlFlow::Normal => continue,
                other => return Ok(other),
            }
        }
        Ok(ControlFlow::Normal)
    }

    fn bump_steps(&mut self) -> Result<(), EvalError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(EvalError::ComplexityLimitExceeded);
        }
        Ok(())
    }

    fn exec_stmt(&mut self, arena: &AstArena, id: cxxfe_ast::StmtId) -> Result<ControlFlow, EvalError> {
        self.bump_steps()?;

        match arena.stmt(id).clone() {
            Stmt::Block(block_id) => self.exec_block(arena, block_id),
            Stmt::ExprStmt(expr_id) => {
                self.evaluate(arena, expr_id)?;
                Ok(ControlFlow::Normal)
            }
            Stmt::VarDecl { name, init, .. } => {
                let value = match init {
                    Some(e) => self.evaluate(arena, e)?,
                    None => ConstValue::Int(0),
                };
                if let Some(scope) = self.locals.last_mut() {
                    scope.insert(name, value);
                }
                Ok(ControlFlow::Normal)
            }
            Stmt::If { init, cond, then_branch, else_branch } => {
                if let Some(init_id) = init {
                    if !matches!(self.exec_stmt(arena, init_id)?, ControlFlow::Normal) {
                        return Err(EvalError::NotConstant("break/continue/return not supported in an if-init-statement".to_string()));
                    }
                }
                if self.evaluate(arena, cond)?.as_bool() {
                    self.exec_stmt(arena, then_branch)
                } else if let Some(else_id) = else_branch {
                    self.exec_stmt(arena, else_id)
                } else {
                    Ok(ControlFlow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                loop {
                    self.bump_steps()?;
                    if !self.evaluate(arena, cond)?.as_bool() {
                        break;
                    }
                    match self.exec_stmt(arena, body)? {
                        ControlFlow::Normal | ControlFlow::Continue => {}
                        ControlFlow::Break => break,
                        r @ ControlFlow::Return(_) => return Ok(r),
                    }
                }
                Ok(ControlFlow::Normal)
            }
            Stmt::DoWhile { body, cond } => {
                loop {
                    self.bump_steps()?;
                    match self.exec_stmt(arena, body)? {
                        ControlFlow::Normal | ControlFlow::Continue => {}
                        ControlFlow::Break => break,
                        r @ ControlFlow::Return(_) => return Ok(r),
                    }
                    if !self.evaluate(arena, cond)?.as_bool() {
                        break;
                    }
                }
                Ok(ControlFlow::Normal)
            }
            Stmt::For { init, cond, post, body } => {
                self.locals.push(HashMap::new());
                if let Some(init_id) = init {
                    self.exec_stmt(arena, init_id)?;
                }
                let result = (|| {
                    loop {
                        self.bump_steps()?;
                        let keep_going = match cond {
                            Some(c) => self.evaluate(arena, c)?.as_bool(),
                            None => true,
                        };
                        if !keep_going {
                            break;
                        }
                        match self.exec_stmt(arena, body)? {
                            ControlFlow::Normal | ControlFlow::Continue => {}
                            ControlFlow::Break => break,
                            r @ ControlFlow::Return(_) => return Ok(r),
                        }
                        if let Some(post_id) = post {
                            self.evaluate(arena, post_id)?;
                        }
                    }
                    Ok(ControlFlow::Normal)
                })();
                self.locals.pop();
                result
            }
            Stmt::Break => Ok(ControlFlow::Break),
            Stmt::Continue => Ok(ControlFlow::Continue),
            Stmt::Return(expr_id) => {
                let value = match expr_id {
                    Some(e) => Some(self.evaluate(arena, e)?),
                    None => None,
                };
                Ok(ControlFlow::Return(value))
            }
            _ => Err(EvalError::NotConstant("statement form not supported in a constexpr function body".to_string())),
        }
    }

    fn assign_local(&mut self, name: StringHandle, value: ConstValue) -> Result<ConstValue, EvalError> {
        for scope in self.locals.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(&name) {
                *slot = value;
                return Ok(value);
            }
        }
        Err(EvalError::NotConstant("assignment target is not a local variable bound in this constant evaluation".to_string()))
    }

    pub fn evaluate(&mut self, arena: &AstArena, id: ExprId) -> Result<ConstValue, EvalError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(EvalError::ComplexityLimitExceeded);
        }
        if self.depth > self.max_depth {
            return Err(EvalError::RecursionLimitExceeded);
        }

        match arena.expr(id) {
            Expr::IntLiteral(v) => Ok(ConstValue::Int(*v)),
            Expr::UIntLiteral(v) => Ok(ConstValue::UInt(*v)),
            Expr::FloatLiteral(v) => Ok(ConstValue::Double(*v)),
            Expr::BoolLiteral(b) => Ok(ConstValue::Bool(*b)),
            Expr::CharLiteral(c) => Ok(ConstValue::Int(*c as i64)),
            Expr::NullptrLiteral => Ok(ConstValue::Int(0)),

            Expr::Identifier(name) => self.evaluate_identifier(arena, *name),

            Expr::Binary { op, lhs, rhs } => {
                self.depth += 1;
                let l = self.evaluate(arena, *lhs);
                let r = self.evaluate(arena, *rhs);
                self.depth -= 1;
                apply_binary_op(*op, l?, r?)
            }
            Expr::Unary { op, operand } if is_increment_decrement(*op) => {
                let name = match arena.expr(*operand) {
                    Expr::Identifier(n) => *n,
                    _ => return Err(EvalError::NotConstant("increment/decrement target must be a local variable".to_string())),
                };
                let before = self.evaluate_identifier(arena, name)?;
                let delta: i64 = if matches!(op, UnaryOp::PreIncrement | UnaryOp::PostIncrement) { 1 } else { -1 };
                let after = match before {
                    ConstValue::Double(v) => ConstValue::Double(v + delta as f64),
                    other => ConstValue::Int(other.as_i64().checked_add(delta).ok_or_else(|| EvalError::Overflow("increment/decrement".to_string()))?),
                };
                self.assign_local(name, after)?;
                Ok(if matches!(op, UnaryOp::PreIncrement | UnaryOp::PreDecrement) { after } else { before })
            }
            Expr::Unary { op, operand } => {
                self.depth += 1;
                let v = self.evaluate(arena, *operand);
                self.depth -= 1;
                apply_unary_op(*op, v?)
            }
            Expr::Assign { target, value } => {
                let v = self.evaluate(arena, *value)?;
                match arena.expr(*target) {
                    Expr::Identifier(name) => self.assign_local(*name, v),
                    _ => Err(EvalError::NotConstant("only a local variable can be assigned to in a constant expression".to_string())),
                }
            }
            Expr::CompoundAssign { target, op, value } => {
                let name = match arena.expr(*target) {
                    Expr::Identifier(n) => *n,
                    _ => return Err(EvalError::NotConstant("only a local variable can be compound-assigned to in a constant expression".to_string())),
                };
                let current = self.evaluate_identifier(arena, name)?;
                let rhs = self.evaluate(arena, *value)?;
                let result = apply_binary_op(compound_to_binary(*op), current, rhs)?;
                self.assign_local(name, result)
            }
            Expr::Call { callee, args, .. } => {
                let name = match arena.expr(*callee) {
                    Expr::Identifier(n) => *n,
                    _ => return Err(EvalError::NotConstant("only a direct call to a named constexpr function is supported".to_string())),
                };
                let resolver = self
                    .resolve_function
                    .ok_or_else(|| EvalError::NotConstant("no constexpr function is available in this context".to_string()))?;
                let fid = resolver(name).ok_or_else(|| EvalError::NotConstant("call to an unknown or non-constexpr function".to_string()))?;
                let mut arg_values = Vec::with_capacity(args.len());
                for a in args {
                    arg_values.push(self.evaluate(arena, *a)?);
                }
                let func = arena.function(fid);
                self.call_function(arena, func, &arg_values)
            }
            Expr::Ternary { cond, then_branch, else_branch } => {
                self.depth += 1;
                let c = self.evaluate(arena, *cond)?;
                let result = if c.as_bool() {
                    self.evaluate(arena, *then_branch)
                } else {
                    self.evaluate(arena, *else_branch)
                };
                self.depth -= 1;
                result
            }
            Expr::SizeOfType(ty) => {
                let (size_bits, _align) = self.resolve_type_layout(arena, *ty)?;
                Ok(ConstValue::UInt((size_bits as u64) / 8))
            }
            Expr::AlignOfType(ty) => {
                let (_size_bits, align) = self.resolve_type_layout(arena, *ty)?;
                Ok(ConstValue::UInt(align as u64))
            }
            Expr::SizeOfExpr(_) => Err(EvalError::NotConstant("sizeof(expression) requires type deduction, not supported here".to_string())),

            Expr::Cast { kind: CastKind::Static | CastKind::CStyle | CastKind::Functional, ty, operand } => {
                self.depth += 1;
                let v = self.evaluate(arena, *operand);
                self.depth -= 1;
                convert_to_type(arena, *ty, v?)
            }
            Expr::ConstructorCall { ty, args } if args.len() == 1 => {
                self.depth += 1;
                let v = self.evaluate(arena, args[0]);
                self.depth -= 1;
                convert_to_type(arena, *ty, v?)
            }

            _ => Err(EvalError::UnsupportedExpression),
        }
    }

    fn evaluate_identifier(&mut self, arena: &AstArena, name: StringHandle) -> Result<ConstValue, EvalError> {
        for scope in self.locals.iter().rev() {
            if let Some(v) = scope.get(&name) {
                return Ok(*v);
            }
        }
        let init = (self.resolve_identifier)(name).ok_or(EvalError::UndefinedIdentifier(name))?;
        self.depth += 1;
        let result = self.evaluate(arena, init);
        self.depth -= 1;
        result
    }

    /// Returns `(size_in_bits, alignment)` for a `sizeof`/`alignof` target,
    /// spec §4.6's "size_in_bits() returns bits, convert to bytes".
    fn resolve_type_layout(&self, arena: &AstArena, ty: TypeSpecId) -> Result<(u32, u32), EvalError> {
        let node = arena.type_spec(ty);
        if let Some(layout) = builtin_size_bits(&node.base) {
            return Ok(layout);
        }
        if let TypeSpecBase::Named { name, template_args } = &node.base {
            if template_args.is_empty() {
                if let Some(info) = self.registry.find_by_name(*name).and_then(|idx| self.registry.get(idx)) {
                    return Ok((info.size_in_bits, info.alignment));
                }
            } else if let Some(resolver) = self.resolve_instantiation {
                if let Some(layout) = resolver(arena, *name, template_args) {
                    return Ok(layout);
                }
            }
        }
        Err(EvalError::NotConstant("sizeof/alignof target type is not registered".to_string()))
    }
}

fn builtin_size_bits(base: &TypeSpecBase) -> Option<(u32, u32)> {
    Some(match base {
        TypeSpecBase::Bool | TypeSpecBase::Char | TypeSpecBase::UnsignedChar => (8, 1),
        TypeSpecBase::Short | TypeSpecBase::UnsignedShort => (16, 2),
        TypeSpecBase::Int | TypeSpecBase::UnsignedInt | TypeSpecBase::Float => (32, 4),
        TypeSpecBase::Long | TypeSpecBase::UnsignedLong | TypeSpecBase::LongLong | TypeSpecBase::UnsignedLongLong | TypeSpecBase::Double | TypeSpecBase::Nullptr => (64, 8),
        TypeSpecBase::LongDouble => (128, 16),
        TypeSpecBase::Void => (0, 1),
        _ => return None,
    })
}

/// Converts `ty` to one of the builtin scalar kinds it names; used for both
/// `static_cast`/C-style casts and single-argument constructor-call
/// conversions (`int(x)`, `double(x)`), spec §4.6.
fn convert_to_type(arena: &AstArena, ty: TypeSpecId, value: ConstValue) -> Result<ConstValue, EvalError> {
    let base = &arena.type_spec(ty).base;
    match base {
        TypeSpecBase::Bool => Ok(ConstValue::Bool(value.as_bool())),
        TypeSpecBase::Char | TypeSpecBase::Short | TypeSpecBase::Int | TypeSpecBase::Long | TypeSpecBase::LongLong => Ok(ConstValue::Int(value.as_i64())),
        TypeSpecBase::UnsignedChar | TypeSpecBase::UnsignedShort | TypeSpecBase::UnsignedInt | TypeSpecBase::UnsignedLong | TypeSpecBase::UnsignedLongLong => Ok(ConstValue::UInt(value.as_i64() as u64)),
        TypeSpecBase::Float | TypeSpecBase::Double | TypeSpecBase::LongDouble => Ok(ConstValue::Double(value.as_f64())),
        _ => Err(EvalError::NotConstant("unsupported conversion target in constant expression".to_string())),
    }
}

fn is_increment_decrement(op: UnaryOp) -> bool {
    matches!(op, UnaryOp::PreIncrement | UnaryOp::PreDecrement | UnaryOp::PostIncrement | UnaryOp::PostDecrement)
}

fn compound_to_binary(op: CompoundOp) -> BinaryOp {
    match op {
        CompoundOp::Add => BinaryOp::Add,
        CompoundOp::Sub => BinaryOp::Sub,
        CompoundOp::Mul => BinaryOp::Mul,
        CompoundOp::Div => BinaryOp::Div,
        CompoundOp::Mod => BinaryOp::Mod,
        CompoundOp::BitAnd => BinaryOp::BitAnd,
        CompoundOp::BitOr => BinaryOp::BitOr,
        CompoundOp::BitXor => BinaryOp::BitXor,
        CompoundOp::Shl => BinaryOp::Shl,
        CompoundOp::Shr => BinaryOp::Shr,
    }
}

fn apply_unary_op(op: UnaryOp, operand: ConstValue) -> Result<ConstValue, EvalError> {
    match op {
        UnaryOp::Neg => match operand {
            ConstValue::Double(v) => Ok(ConstValue::Double(-v)),
            other => other.as_i64().checked_neg().map(ConstValue::Int).ok_or_else(|| EvalError::Overflow("negation".to_string())),
        },
        UnaryOp::Plus => Ok(operand),
        UnaryOp::LogicalNot => Ok(ConstValue::Bool(!operand.as_bool())),
        UnaryOp::BitNot => Ok(ConstValue::Int(!operand.as_i64())),
        UnaryOp::AddressOf | UnaryOp::Deref | UnaryOp::PreIncrement | UnaryOp::PreDecrement | UnaryOp::PostIncrement | UnaryOp::PostDecrement => {
            Err(EvalError::NotConstant("operator has side effects or requires an addressable object".to_string()))
        }
    }
}

fn apply_binary_op(op: BinaryOp, lhs: ConstValue, rhs: ConstValue) -> Result<ConstValue, EvalError> {
    if lhs.is_floating() || rhs.is_floating() {
        return apply_floating_binary_op(op, lhs.as_f64(), rhs.as_f64());
    }

    match op {
        BinaryOp::Add => lhs.as_i64().checked_add(rhs.as_i64()).map(ConstValue::Int).ok_or_else(|| EvalError::Overflow("addition".to_string())),
        BinaryOp::Sub => lhs.as_i64().checked_sub(rhs.as_i64()).map(ConstValue::Int).ok_or_else(|| EvalError::Overflow("subtraction".to_string())),
        BinaryOp::Mul => lhs.as_i64().checked_mul(rhs.as_i64()).map(ConstValue::Int).ok_or_else(|| EvalError::Overflow("multiplication".to_string())),
        BinaryOp::Div => {
            let (l, r) = (lhs.as_i64(), rhs.as_i64());
            if r == 0 {
                return Err(EvalError::NotConstant("division by zero".to_string()));
            }
            l.checked_div(r).map(ConstValue::Int).ok_or_else(|| EvalError::Overflow("division".to_string()))
        }
        BinaryOp::Mod => {
            let (l, r) = (lhs.as_i64(), rhs.as_i64());
            if r == 0 {
                return Err(EvalError::NotConstant("modulo by zero".to_string()));
            }
            l.checked_rem(r).map(ConstValue::Int).ok_or_else(|| EvalError::Overflow("modulo".to_string()))
        }
        BinaryOp::Eq => Ok(ConstValue::Bool(lhs.as_i64() == rhs.as_i64())),
        BinaryOp::NotEq => Ok(ConstValue::Bool(lhs.as_i64() != rhs.as_i64())),
        BinaryOp::Lt => Ok(ConstValue::Bool(lhs.as_i64() < rhs.as_i64())),
        BinaryOp::LtEq => Ok(ConstValue::Bool(lhs.as_i64() <= rhs.as_i64())),
        BinaryOp::Gt => Ok(ConstValue::Bool(lhs.as_i64() > rhs.as_i64())),
        BinaryOp::GtEq => Ok(ConstValue::Bool(lhs.as_i64() >= rhs.as_i64())),
        BinaryOp::Spaceship => Ok(ConstValue::Int(match lhs.as_i64().cmp(&rhs.as_i64()) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        })),
        BinaryOp::LogicalAnd => Ok(ConstValue::Bool(lhs.as_bool() && rhs.as_bool())),
        BinaryOp::LogicalOr => Ok(ConstValue::Bool(lhs.as_bool() || rhs.as_bool())),
        BinaryOp::BitAnd => Ok(ConstValue::Int(lhs.as_i64() & rhs.as_i64())),
        BinaryOp::BitOr => Ok(ConstValue::Int(lhs.as_i64() | rhs.as_i64())),
        BinaryOp::BitXor => Ok(ConstValue::Int(lhs.as_i64() ^ rhs.as_i64())),
        BinaryOp::Shl => {
            let shift = rhs.as_i64();
            if !(0..64).contains(&shift) {
                return Err(EvalError::NotConstant("shift count out of range".to_string()));
            }
            lhs.as_i64().checked_shl(shift as u32).map(ConstValue::Int).ok_or_else(|| EvalError::Overflow("left shift".to_string()))
        }
        BinaryOp::Shr => {
            let shift = rhs.as_i64();
            if !(0..64).contains(&shift) {
                return Err(EvalError::NotConstant("shift count out of range".to_string()));
            }
            Ok(ConstValue::Int(lhs.as_i64() >> shift))
        }
    }
}

fn apply_floating_binary_op(op: BinaryOp, l: f64, r: f64) -> Result<ConstValue, EvalError> {
    match op {
        BinaryOp::Add => Ok(ConstValue::Double(l + r)),
        BinaryOp::Sub => Ok(ConstValue::Double(l - r)),
        BinaryOp::Mul => Ok(ConstValue::Double(l * r)),
        BinaryOp::Div => Ok(ConstValue::Double(l / r)),
        BinaryOp::Eq => Ok(ConstValue::Bool(l == r)),
        BinaryOp::NotEq => Ok(ConstValue::Bool(l != r)),
        BinaryOp::Lt => Ok(ConstValue::Bool(l < r)),
        BinaryOp::LtEq => Ok(ConstValue::Bool(l <= r)),
        BinaryOp::Gt => Ok(ConstValue::Bool(l > r)),
        BinaryOp::GtEq => Ok(ConstValue::Bool(l >= r)),
        BinaryOp::LogicalAnd => Ok(ConstValue::Bool(l != 0.0 && r != 0.0)),
        BinaryOp::LogicalOr => Ok(ConstValue::Bool(l != 0.0 || r != 0.0)),
        _ => Err(EvalError::NotConstant("operator not defined for floating-point operands".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxxfe_ast::StringInterner;

    fn no_identifiers(_: StringHandle) -> Option<ExprId> {
        None
    }

    #[test]
    fn folds_nested_arithmetic_with_correct_precedence_already_applied_by_the_parser() {
        let mut arena = AstArena::new();
        let two = arena.alloc_expr(Expr::IntLiteral(2));
        let three = arena.alloc_expr(Expr::IntLiteral(3));
        let mul = arena.alloc_expr(Expr::Binary { op: BinaryOp::Mul, lhs: two, rhs: three });
        let four = arena.alloc_expr(Expr::IntLiteral(4));
        let add = arena.alloc_expr(Expr::Binary { op: BinaryOp::Add, lhs: mul, rhs: four });

        let registry = TypeRegistry::new();
        let resolver = no_identifiers;
        let mut eval = ConstExprEvaluator::new(&registry, &resolver);
        assert_eq!(eval.evaluate(&arena, add), Ok(ConstValue::Int(10)));
    }

    #[test]
    fn signed_overflow_in_multiplication_is_rejected() {
        let mut arena = AstArena::new();
        let a = arena.alloc_expr(Expr::IntLiteral(i64::MAX));
        let b = arena.alloc_expr(Expr::IntLiteral(2));
        let mul = arena.alloc_expr(Expr::Binary { op: BinaryOp::Mul, lhs: a, rhs: b });

        let registry = TypeRegistry::new();
        let resolver = no_identifiers;
        let mut eval = ConstExprEvaluator::new(&registry, &resolver);
        assert!(matches!(eval.evaluate(&arena, mul), Err(EvalError::Overflow(_))));
    }

    #[test]
    fn division_by_zero_is_not_a_constant_expression() {
        let mut arena = AstArena::new();
        let a = arena.alloc_expr(Expr::IntLiteral(1));
        let zero = arena.alloc_expr(Expr::IntLiteral(0));
        let div = arena.alloc_expr(Expr::Binary { op: BinaryOp::Div, lhs: a, rhs: zero });

        let registry = TypeRegistry::new();
        let resolver = no_identifiers;
        let mut eval = ConstExprEvaluator::new(&registry, &resolver);
        assert!(matches!(eval.evaluate(&arena, div), Err(EvalError::NotConstant(_))));
    }

    #[test]
    fn ternary_short_circuits_to_the_taken_branch() {
        let mut arena = AstArena::new();
        let cond = arena.alloc_expr(Expr::BoolLiteral(false));
        let then_v = arena.alloc_expr(Expr::IntLiteral(1));
        let else_v = arena.alloc_expr(Expr::IntLiteral(2));
        let ternary = arena.alloc_expr(Expr::Ternary { cond, then_branch: then_v, else_branch: else_v });

        let registry = TypeRegistry::new();
        let resolver = no_identifiers;
        let mut eval = ConstExprEvaluator::new(&registry, &resolver);
        assert_eq!(eval.evaluate(&arena, ternary), Ok(ConstValue::Int(2)));
    }

    #[test]
    fn identifier_resolves_through_the_injected_lookup_closure() {
        let mut arena = AstArena::new();
        let init = arena.alloc_expr(Expr::IntLiteral(42));
        let name_handle = StringHandle(7);
        let ident = arena.alloc_expr(Expr::Identifier(name_handle));

        let registry = TypeRegistry::new();
        let resolver = move |name: StringHandle| if name == name_handle { Some(init) } else { None };
        let mut eval = ConstExprEvaluator::new(&registry, &resolver);
        assert_eq!(eval.evaluate(&arena, ident), Ok(ConstValue::Int(42)));

        let _ = StringInterner::new();
    }

    fn dummy_int_type(arena: &mut AstArena) -> TypeSpecId {
        arena.alloc_type_spec(cxxfe_ast::ast::TypeSpecifierNode {
            loc: cxxfe_ast::SourceLoc::unknown(),
            base: TypeSpecBase::Int,
            pointer_cv: Vec::new(),
            reference: cxxfe_ast::ast::ReferenceKind::None,
            array_extent: None,
            resolved: None,
        })
    }

    fn build_loop_sum_function(arena: &mut AstArena) -> (FunctionDeclNode, StringHandle, StringHandle) {
        // constexpr int f(int x) { int a = 0; for (int i = 0; i < x; ++i) a += i; return a; }
        let x = StringHandle(1);
        let a = StringHandle(2);
        let i = StringHandle(3);
        let int_ty = dummy_int_type(arena);

        let zero = arena.alloc_expr(Expr::IntLiteral(0));
        let decl_a = arena.alloc_stmt(Stmt::VarDecl { name: a, ty: None, init: Some(zero), is_static: false, is_constexpr: false });

        let zero_i = arena.alloc_expr(Expr::IntLiteral(0));
        let init_i = arena.alloc_stmt(Stmt::VarDecl { name: i, ty: None, init: Some(zero_i), is_static: false, is_constexpr: false });

        let i_ident = arena.alloc_expr(Expr::Identifier(i));
        let x_ident = arena.alloc_expr(Expr::Identifier(x));
        let cond = arena.alloc_expr(Expr::Binary { op: BinaryOp::Lt, lhs: i_ident, rhs: x_ident });

        let i_for_post = arena.alloc_expr(Expr::Identifier(i));
        let post = arena.alloc_expr(Expr::Unary { op: UnaryOp::PreIncrement, operand: i_for_post });

        let i_in_body = arena.alloc_expr(Expr::Identifier(i));
        let compound = arena.alloc_expr(Expr::CompoundAssign { target: arena_placeholder(arena, a), op: CompoundOp::Add, value: i_in_body });
        let body_stmt = arena.alloc_stmt(Stmt::ExprStmt(compound));

        let for_stmt = arena.alloc_stmt(Stmt::For { init: Some(init_i), cond: Some(cond), post: Some(post), body: body_stmt });

        let a_ret = arena.alloc_expr(Expr::Identifier(a));
        let return_stmt = arena.alloc_stmt(Stmt::Return(Some(a_ret)));

        let block = arena.alloc_block(cxxfe_ast::ast::Block { statements: vec![decl_a, for_stmt, return_stmt] });

        let func = FunctionDeclNode {
            loc: cxxfe_ast::SourceLoc::unknown(),
            name: StringHandle(100),
            kind: cxxfe_ast::ast::FunctionKind::Ordinary,
            namespace_path: Vec::new(),
            enclosing_struct: None,
            template_params: Vec::new(),
            params: vec![cxxfe_ast::ast::Param { name: x, ty: int_ty, default_value: None }],
            return_type: Some(int_ty),
            body: Some(block),
            is_variadic: false,
            is_static: false,
            is_virtual: false,
            is_const: false,
            is_defaulted: false,
            is_deleted: false,
            is_inline: false,
            access: cxxfe_ast::ast::Access::Public,
            is_template_pattern: false,
        };
        (func, x, a)
    }

    // `Expr::Identifier(a)` is reused both as an assignment target and as a
    // value; building it twice from the same handle keeps the arena ids
    // distinct without needing a second name.
    fn arena_placeholder(arena: &mut AstArena, name: StringHandle) -> ExprId {
        arena.alloc_expr(Expr::Identifier(name))
    }

    #[test]
    fn constexpr_for_loop_sums_zero_to_n_minus_one() {
        // spec §8 scenario 1: f(5) == 10 via `for (i=0;i<x;++i) a += i`.
        let mut arena = AstArena::new();
        let (func, _x, _a) = build_loop_sum_function(&mut arena);

        let registry = TypeRegistry::new();
        let resolver = no_identifiers;
        let mut eval = ConstExprEvaluator::new(&registry, &resolver);
        let result = eval.call_function(&arena, &func, &[ConstValue::Int(5)]);
        assert_eq!(result, Ok(ConstValue::Int(10)));
    }

    #[test]
    fn constexpr_function_call_dispatches_through_the_function_resolver() {
        let mut arena = AstArena::new();
        let (func, _x, _a) = build_loop_sum_function(&mut arena);
        let func_id = arena.alloc_function(func);

        let five = arena.alloc_expr(Expr::IntLiteral(5));
        let callee = arena.alloc_expr(Expr::Identifier(StringHandle(100)));
        let call = arena.alloc_expr(Expr::Call { callee, explicit_template_args: Vec::new(), args: vec![five] });

        let registry = TypeRegistry::new();
        let identifiers = no_identifiers;
        let functions = move |name: StringHandle| if name == StringHandle(100) { Some(func_id) } else { None };
        let mut eval = ConstExprEvaluator::new(&registry, &identifiers).with_function_resolver(&functions);
        assert_eq!(eval.evaluate(&arena, call), Ok(ConstValue::Int(10)));
    }

    #[test]
    fn a_loop_that_never_terminates_is_rejected_within_the_step_budget() {
        // P7: boundedness. `while (true) {}` must error out, never hang.
        let mut arena = AstArena::new();
        let cond = arena.alloc_expr(Expr::BoolLiteral(true));
        let body = arena.alloc_block(cxxfe_ast::ast::Block { statements: Vec::new() });
        let body_stmt = arena.alloc_stmt(Stmt::Block(body));
        let while_stmt = arena.alloc_stmt(Stmt::While { cond, body: body_stmt });
        let block = arena.alloc_block(cxxfe_ast::ast::Block { statements: vec![while_stmt] });

        let func = FunctionDeclNode {
            loc: cxxfe_ast::SourceLoc::unknown(),
            name: StringHandle(101),
            kind: cxxfe_ast::ast::FunctionKind::Ordinary,
            namespace_path: Vec::new(),
            enclosing_struct: None,
            template_params: Vec::new(),
            params: Vec::new(),
            return_type: None,
            body: Some(block),
            is_variadic: false,
            is_static: false,
            is_virtual: false,
            is_const: false,
            is_defaulted: false,
            is_deleted: false,
            is_inline: false,
            access: cxxfe_ast::ast::Access::Public,
            is_template_pattern: false,
        };

        let registry = TypeRegistry::new();
        let resolver = no_identifiers;
        let mut eval = ConstExprEvaluator::new(&registry, &resolver).with_limits(1_000, 512);
        assert_eq!(eval.call_function(&arena, &func, &[]), Err(EvalError::ComplexityLimitExceeded));
    }
}
