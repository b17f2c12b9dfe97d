//! The flat IR instruction stream the generator appends to (spec §3.6,
//! §6.4). The back end is an external collaborator: this crate only
//! defines the wire format it consumes.

use crate::handles::{StringHandle, TempVar, TypeIndex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseType {
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
    Enum,
    Struct,
    Union,
    UserDefined,
    Template,
    Auto,
    FunctionPointer,
    MemberObjectPointer,
    MemberFunctionPointer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    None,
    Lvalue,
    Rvalue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValuePayload {
    U64(u64),
    F64OrderedBits(u64), // f64 bit pattern, kept Eq/Hash-friendly
    Str(StringHandle),
    Temp(TempVar),
}

impl ValuePayload {
    pub fn from_f64(v: f64) -> Self {
        ValuePayload::F64OrderedBits(v.to_bits())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ValuePayload::F64OrderedBits(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }
}

/// A typed operand or result, as described by spec §3.6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    pub base_type: BaseType,
    pub size_in_bits: u32,
    pub pointer_depth: u32,
    pub reference: ReferenceKind,
    pub type_index: TypeIndex,
    pub value: ValuePayload,
}

impl TypedValue {
    pub fn temp(base_type: BaseType, size_in_bits: u32, type_index: TypeIndex, t: TempVar) -> Self {
        TypedValue {
            base_type,
            size_in_bits,
            pointer_depth: 0,
            reference: ReferenceKind::None,
            type_index,
            value: ValuePayload::Temp(t),
        }
    }

    pub fn int_literal(value: i64, size_in_bits: u32) -> Self {
        TypedValue {
            base_type: BaseType::Int,
            size_in_bits,
            pointer_depth: 0,
            reference: ReferenceKind::None,
            type_index: TypeIndex::INVALID,
            value: ValuePayload::U64(value as u64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinArithOp {
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
pub enum CompareOp {
    Eq,
    NotEq,
    LessThan,
    LessEq,
    GreaterThan,
    GreaterEq,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: StringHandle,
    pub ty: TypedValue,
    pub is_rvalue_reference: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrInstruction {
    FunctionDecl {
        mangled_name: StringHandle,
        return_type: TypedValue,
        params: Vec<ParamDecl>,
        is_variadic: bool,
        is_inline: bool,
        is_static_linkage: bool,
        has_hidden_return_param: bool,
        hidden_return_type_index: Option<TypeIndex>,
    },
    GlobalVariableDecl {
        mangled_name: StringHandle,
        ty: TypedValue,
        initializer: Option<TypedValue>,
    },
    Label(StringHandle),
    Branch {
        target: StringHandle,
    },
    ConditionalBranch {
        cond: TypedValue,
        if_true: StringHandle,
        if_false: StringHandle,
    },
    BinArith {
        op: BinArithOp,
        lhs: TypedValue,
        rhs: TypedValue,
        result: TempVar,
    },
    Compare {
        op: CompareOp,
        lhs: TypedValue,
        rhs: TypedValue,
        result: TempVar,
    },
    AddressOf {
        operand: TypedValue,
        result: TempVar,
    },
    Dereference {
        operand: TypedValue,
        result: TempVar,
    },
    DereferenceStore {
        pointer: TypedValue,
        value: TypedValue,
    },
    MemberAccess {
        base: TypedValue,
        member_name: StringHandle,
        offset_bits: u64,
        bitfield_width: Option<u32>,
        result: TempVar,
    },
    MemberStore {
        base: TypedValue,
        member_name: StringHandle,
        offset_bits: u64,
        bitfield_width: Option<u32>,
        value: TypedValue,
    },
    ArrayAccess {
        array: TypedValue,
        index: TypedValue,
        result: TempVar,
    },
    ArrayStore {
        array: TypedValue,
        index: TypedValue,
        value: TypedValue,
    },
    GlobalLoad {
        mangled_name: StringHandle,
        result: TempVar,
    },
    GlobalStore {
        mangled_name: StringHandle,
        value: TypedValue,
    },
    FunctionAddress {
        mangled_name: StringHandle,
        result: TempVar,
    },
    FunctionCall {
        mangled_name: StringHandle,
        return_type: TypedValue,
        is_member_function: bool,
        args: Vec<TypedValue>,
        result: TempVar,
    },
    ConstructorCall {
        mangled_name: StringHandle,
        this_ptr: TypedValue,
        args: Vec<TypedValue>,
    },
    DestructorCall {
        mangled_name: StringHandle,
        this_ptr: TypedValue,
    },
    Return(Option<TypedValue>),
}

/// The ordered stream a translation unit's code generation appends to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrModule {
    pub instructions: Vec<IrInstruction>,
}

impl IrModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, instr: IrInstruction) {
        self.instructions.push(instr);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
