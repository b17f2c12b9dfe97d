//! Tagged-union AST (spec §3.3).
//!
//! Every expression/statement kind is a case of one closed enum, mirroring
//! `vex-ast`'s `Expression`/`Statement`/`Type` enums but built over arena
//! handles (`ExprId`, `StmtId`, ...) instead of `Box`, so that a node
//! created during a discarded speculative-parse prefix keeps a stable
//! identity even after the parser rewinds past it (spec §3.3 invariant,
//! §4.4).

use crate::handles::{StringHandle, TypeIndex};
use crate::loc::SourceLoc;
use serde::{Deserialize, Serialize};

macro_rules! node_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);
        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

node_id!(ExprId);
node_id!(StmtId);
node_id!(BlockId);
node_id!(TypeSpecId);
node_id!(FunctionId);
node_id!(StructId);
node_id!(ItemId);

/// A raw, not-yet-resolved type as written in the source. Resolution into a
/// `TypeIndex` happens in the type/template substitutors (spec §4.5.3);
/// until then this is what the parser produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSpecifierNode {
    pub loc: SourceLoc,
    pub base: TypeSpecBase,
    /// Pointer depth, CV-qualified independently at each level.
    pub pointer_cv: Vec<CvQualifier>,
    pub reference: ReferenceKind,
    pub array_extent: Option<Option<u64>>, // Some(None) = unbounded []
    /// Already-resolved type, filled in once the substitutor/registry has
    /// assigned one. `None` while the node is still a pattern.
    pub resolved: Option<TypeIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvQualifier {
    pub is_const: bool,
    pub is_volatile: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    None,
    Lvalue,
    Rvalue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeSpecBase {
    Void,
    Bool,
    Char,
    Short,
    Int,
    Long,
    LongLong,
    UnsignedChar,
    UnsignedShort,
    UnsignedInt,
    UnsignedLong,
    UnsignedLongLong,
    Float,
    Double,
    LongDouble,
    Nullptr,
    Auto,
    /// `name` possibly namespace-qualified (`ns::name`), possibly carrying
    /// template arguments (`Name<Args...>`); template args are themselves
    /// `TypeSpecId`/value-expression pairs via `TemplateArgSpec`.
    Named {
        name: StringHandle,
        template_args: Vec<TemplateArgSpec>,
    },
    /// `decltype(expr)`.
    Decltype(ExprId),
    FunctionPointer {
        params: Vec<TypeSpecId>,
        ret: TypeSpecId,
    },
    MemberObjectPointer {
        class_name: StringHandle,
        inner: TypeSpecId,
    },
    MemberFunctionPointer {
        class_name: StringHandle,
        params: Vec<TypeSpecId>,
        ret: TypeSpecId,
    },
    /// A parameter pack expansion site: `Ts...`.
    PackExpansion(TypeSpecId),
    /// Reference to a template type/NTTP parameter by name, substituted by
    /// the type substitutor (spec §4.5.3).
    TemplateParam(StringHandle),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateArgSpec {
    Type(TypeSpecId),
    Value(ExprId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: StringHandle,
    pub ty: TypeSpecId,
    pub default_value: Option<ExprId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParam {
    pub name: StringHandle,
    pub is_non_type: bool,
    /// For NTTPs, the declared type (`int`, `auto`, ...). `None` for type
    /// parameters.
    pub non_type_ty: Option<TypeSpecId>,
    pub is_pack: bool,
    pub default: Option<TemplateArgSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionKind {
    Ordinary,
    Constructor,
    Destructor,
    ConversionOperator,
    OperatorAssign,
    OperatorSpaceship,
    OperatorOther,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclNode {
    pub loc: SourceLoc,
    pub name: StringHandle,
    pub kind: FunctionKind,
    pub namespace_path: Vec<StringHandle>,
    pub enclosing_struct: Option<StringHandle>,
    pub template_params: Vec<TemplateParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeSpecId>,
    pub body: Option<BlockId>,
    pub is_variadic: bool,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_const: bool,
    pub is_defaulted: bool,
    pub is_deleted: bool,
    pub is_inline: bool,
    pub access: Access,
    /// `true` on the un-substituted pattern of a function template; only
    /// fully substituted descendants are emitted as code (spec I3 analogue
    /// for functions).
    pub is_template_pattern: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldNode {
    pub loc: SourceLoc,
    pub name: StringHandle,
    pub ty: TypeSpecId,
    pub access: Access,
    pub bitfield_width: Option<u32>,
    pub default_initializer: Option<ExprId>,
    pub is_reference: bool,
    pub is_rvalue_reference: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseClassNode {
    pub name: StringHandle,
    pub ty: TypeSpecId,
    pub access: Access,
    pub is_virtual: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDeclNode {
    pub loc: SourceLoc,
    pub name: StringHandle,
    pub namespace_path: Vec<StringHandle>,
    pub template_params: Vec<TemplateParam>,
    pub fields: Vec<FieldNode>,
    pub bases: Vec<BaseClassNode>,
    pub methods: Vec<FunctionId>,
    pub is_union: bool,
    pub is_final: bool,
    pub is_template_pattern: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<StmtId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Spaceship,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Plus,
    LogicalNot,
    BitNot,
    AddressOf,
    Deref,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompoundOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTraitKind {
    IsVoid,
    IsIntegral,
    IsFloatingPoint,
    IsPointer,
    IsLvalueReference,
    IsRvalueReference,
    IsArray,
    IsBoundedArray,
    IsUnboundedArray,
    IsArithmetic,
    IsScalar,
    IsClass,
    IsUnion,
    IsPolymorphic,
    IsFinal,
    IsAbstract,
    IsEmpty,
    IsAggregate,
    IsStandardLayout,
    IsTriviallyCopyable,
    IsTrivial,
    IsPod,
    IsLiteralType,
    IsDestructible,
    IsTriviallyDestructible,
    IsNothrowDestructible,
    HasVirtualDestructor,
    IsSigned,
    IsUnsigned,
    IsConst,
    IsVolatile,
    HasUniqueObjectRepresentations,
    IsConstantEvaluated,
    // Binary traits
    IsBaseOf,
    IsSame,
    IsConvertible,
    IsAssignable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    ByValue,
    ByReference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaCapture {
    pub name: StringHandle,
    pub mode: CaptureMode,
    /// `[this]` vs `[*this]`.
    pub is_this: bool,
    pub is_this_by_value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InitListEntry {
    Positional(ExprId),
    Designated(StringHandle, ExprId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CastKind {
    Static,
    Dynamic,
    Const,
    Reinterpret,
    CStyle,
    Functional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    IntLiteral(i64),
    UIntLiteral(u64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(StringHandle),
    CharLiteral(u32),
    NullptrLiteral,

    Identifier(StringHandle),
    QualifiedIdentifier {
        namespace_path: Vec<StringHandle>,
        name: StringHandle,
    },
    TemplateParamRef(StringHandle),

    MemberAccess {
        object: ExprId,
        member: StringHandle,
        is_arrow: bool,
    },
    PointerToMemberAccess {
        object: ExprId,
        member_ptr: ExprId,
        is_arrow: bool,
    },
    ArraySubscript {
        array: ExprId,
        index: ExprId,
    },
    Call {
        callee: ExprId,
        explicit_template_args: Vec<TemplateArgSpec>,
        args: Vec<ExprId>,
    },
    MemberCall {
        object: ExprId,
        method: StringHandle,
        explicit_template_args: Vec<TemplateArgSpec>,
        args: Vec<ExprId>,
        is_arrow: bool,
    },
    ConstructorCall {
        ty: TypeSpecId,
        args: Vec<ExprId>,
    },

    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Ternary {
        cond: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
    },
    Assign {
        target: ExprId,
        value: ExprId,
    },
    CompoundAssign {
        target: ExprId,
        op: CompoundOp,
        value: ExprId,
    },

    SizeOfType(TypeSpecId),
    SizeOfExpr(ExprId),
    AlignOfType(TypeSpecId),
    OffsetOf {
        ty: TypeSpecId,
        member: StringHandle,
    },
    TypeTrait {
        kind: TypeTraitKind,
        lhs: TypeSpecId,
        rhs: Option<TypeSpecId>,
    },
    Noexcept(ExprId),

    InitializerList(Vec<InitListEntry>),

    Lambda {
        captures: Vec<LambdaCapture>,
        params: Vec<Param>,
        return_type: Option<TypeSpecId>,
        body: BlockId,
        /// Stable identity used to guarantee emit-once semantics (P9, spec
        /// §4.8 lambda state machine).
        lambda_id: u32,
    },
    FoldExpression {
        op: BinaryOp,
        pack: ExprId,
        init: Option<ExprId>,
        /// `true` for `(pack op ... op init)`, `false` for
        /// `(init op ... op pack)`.
        is_left_fold: bool,
    },
    Decltype(ExprId),
    PseudoDestructorCall {
        object: ExprId,
        ty: TypeSpecId,
    },
    New {
        ty: TypeSpecId,
        args: Vec<ExprId>,
        array_size: Option<ExprId>,
    },
    Delete {
        operand: ExprId,
        is_array: bool,
    },
    Cast {
        kind: CastKind,
        ty: TypeSpecId,
        operand: ExprId,
    },
    PackExpansion(ExprId),
    RequiresExpression {
        params: Vec<Param>,
        /// Simplified requirement list; constraint checking is stubbed per
        /// spec §7/§9 ("constraint unsatisfied (stubbed)").
        requirement_count: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    pub exception_ty: Option<TypeSpecId>,
    pub binding: Option<StringHandle>,
    pub body: BlockId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Block(BlockId),
    ExprStmt(ExprId),
    VarDecl {
        name: StringHandle,
        ty: Option<TypeSpecId>,
        init: Option<ExprId>,
        is_static: bool,
        is_constexpr: bool,
    },
    StructuredBinding {
        names: Vec<StringHandle>,
        init: ExprId,
    },
    If {
        init: Option<StmtId>,
        cond: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    While {
        cond: ExprId,
        body: StmtId,
    },
    DoWhile {
        body: StmtId,
        cond: ExprId,
    },
    For {
        init: Option<StmtId>,
        cond: Option<ExprId>,
        post: Option<ExprId>,
        body: StmtId,
    },
    RangedFor {
        binding: StringHandle,
        range: ExprId,
        body: StmtId,
    },
    Switch {
        value: ExprId,
        cases: Vec<(Vec<ExprId>, StmtId)>,
        default_case: Option<StmtId>,
    },
    Break,
    Continue,
    Goto(StringHandle),
    Labeled {
        label: StringHandle,
        stmt: StmtId,
    },
    Return(Option<ExprId>),
    Try {
        body: BlockId,
        catches: Vec<CatchClause>,
    },
    Throw(Option<ExprId>),
    SehTry {
        body: BlockId,
        except_body: Option<BlockId>,
        finally_body: Option<BlockId>,
    },
    SehLeave,
    UsingDirective {
        namespace_path: Vec<StringHandle>,
    },
    UsingDeclaration {
        local_name: StringHandle,
        namespace_path: Vec<StringHandle>,
        original_name: StringHandle,
    },
    UsingEnum(TypeSpecId),
    NamespaceAlias {
        alias: StringHandle,
        target_path: Vec<StringHandle>,
    },
    Typedef {
        name: StringHandle,
        ty: TypeSpecId,
    },
    StaticAssert {
        cond: ExprId,
        message: Option<StringHandle>,
    },
}

/// Top-level translation-unit items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Function(FunctionId),
    Struct(StructId),
    Namespace {
        name: StringHandle,
        items: Vec<ItemId>,
    },
    GlobalVarDecl {
        name: StringHandle,
        ty: TypeSpecId,
        init: Option<ExprId>,
        is_constexpr: bool,
    },
    TemplateVariableDecl {
        name: StringHandle,
        template_params: Vec<TemplateParam>,
        ty: TypeSpecId,
        init: Option<ExprId>,
    },
    TemplateAliasDecl {
        name: StringHandle,
        template_params: Vec<TemplateParam>,
        aliased: TypeSpecId,
    },
    /// `template<...> concept Name = constraint;`. The constraint expression
    /// is parsed and kept, but evaluating it against a candidate argument
    /// list is unsupported.
    Concept {
        name: StringHandle,
        template_params: Vec<TemplateParam>,
        constraint: ExprId,
    },
    StaticAssert {
        cond: ExprId,
        message: Option<StringHandle>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub items: Vec<ItemId>,
}
