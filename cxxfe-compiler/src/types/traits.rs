//! Type-trait evaluator (spec §4.7). Near-direct port of
//! `examples/original_source/src/TypeTraitEvaluator.h`'s `evaluateTypeTrait`,
//! reshaped from the original's positional-argument free function into a
//! `TraitQuery` struct gathered once by the caller from a resolved
//! `TypeSpecifierNode` + `TypeRegistry` lookup.

use cxxfe_ast::ast::{CvQualifier, ReferenceKind, TypeTraitKind};

use crate::types::registry::{BaseType, StructTypeInfo};

/// Every fact the evaluator needs about the left-hand type, gathered once by
/// the caller (parser/codegen, spec §4.7 "shared between compile-time and
/// codegen-time evaluation").
#[derive(Debug, Clone, Copy)]
pub struct TraitQuery<'a> {
    pub base_type: BaseType,
    pub pointer_depth: u32,
    pub reference: ReferenceKind,
    pub cv: CvQualifier,
    pub is_array: bool,
    pub array_size: Option<u64>,
    pub struct_info: Option<&'a StructTypeInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeTraitResult {
    pub success: bool,
    pub value: bool,
}

impl TypeTraitResult {
    pub fn success_true() -> Self {
        TypeTraitResult { success: true, value: true }
    }
    pub fn success_false() -> Self {
        TypeTraitResult { success: true, value: false }
    }
    pub fn failure() -> Self {
        TypeTraitResult { success: false, value: false }
    }
}

fn is_arithmetic(bt: BaseType) -> bool {
    matches!(
        bt,
        BaseType::Bool
            | BaseType::Char
            | BaseType::Short
            | BaseType::Int
            | BaseType::Long
            | BaseType::LongLong
            | BaseType::UnsignedChar
            | BaseType::UnsignedShort
            | BaseType::UnsignedInt
            | BaseType::UnsignedLong
            | BaseType::UnsignedLongLong
            | BaseType::Float
            | BaseType::Double
            | BaseType::LongDouble
    )
}

fn is_fundamental(bt: BaseType) -> bool {
    bt == BaseType::Void || bt == BaseType::Nullptr || is_arithmetic(bt)
}

fn is_scalar(bt: BaseType, reference: ReferenceKind, pointer_depth: u32) -> bool {
    if reference != ReferenceKind::None {
        return false;
    }
    if pointer_depth > 0 {
        return true;
    }
    is_arithmetic(bt) || bt == BaseType::Enum || bt == BaseType::Nullptr
}

fn is_integral(bt: BaseType) -> bool {
    matches!(
        bt,
        BaseType::Bool
            | BaseType::Char
            | BaseType::UnsignedChar
            | BaseType::Short
            | BaseType::UnsignedShort
            | BaseType::Int
            | BaseType::UnsignedInt
            | BaseType::Long
            | BaseType::UnsignedLong
            | BaseType::LongLong
            | BaseType::UnsignedLongLong
    )
}

fn is_floating_point(bt: BaseType) -> bool {
    matches!(bt, BaseType::Float | BaseType::Double | BaseType::LongDouble)
}

fn is_signed(bt: BaseType) -> bool {
    matches!(bt, BaseType::Char | BaseType::Short | BaseType::Int | BaseType::Long | BaseType::LongLong)
}

fn is_unsigned(bt: BaseType) -> bool {
    matches!(
        bt,
        BaseType::Bool | BaseType::UnsignedChar | BaseType::UnsignedShort | BaseType::UnsignedInt | BaseType::UnsignedLong | BaseType::UnsignedLongLong
    )
}

fn has_user_defined_constructor(info: &StructTypeInfo) -> bool {
    info.member_functions.iter().any(|f| f.is_constructor)
}

fn has_user_defined_destructor(info: &StructTypeInfo) -> bool {
    info.member_functions.iter().any(|f| f.is_destructor)
}

/// Evaluates a unary type trait (spec §4.7). Binary traits (`IsBaseOf`,
/// `IsSame`, `IsConvertible`, `IsAssignable`) are handled separately by
/// `evaluate_binary_type_trait` since they need a second `TraitQuery`.
pub fn evaluate_type_trait(kind: TypeTraitKind, q: TraitQuery<'_>) -> TypeTraitResult {
    let is_ref = q.reference != ReferenceKind::None;
    let is_rvalue_ref = q.reference == ReferenceKind::Rvalue;

    let result = match kind {
        TypeTraitKind::IsConstantEvaluated => return TypeTraitResult::failure(),

        TypeTraitKind::IsVoid => q.base_type == BaseType::Void && !is_ref && q.pointer_depth == 0,
        TypeTraitKind::IsIntegral => is_integral(q.base_type) && !is_ref && q.pointer_depth == 0,
        TypeTraitKind::IsFloatingPoint => is_floating_point(q.base_type) && !is_ref && q.pointer_depth == 0,
        TypeTraitKind::IsArray => q.is_array && !is_ref && q.pointer_depth == 0,
        TypeTraitKind::IsPointer => q.pointer_depth > 0 && !is_ref,
        TypeTraitKind::IsLvalueReference => q.reference == ReferenceKind::Lvalue,
        TypeTraitKind::IsRvalueReference => is_rvalue_ref,
        TypeTraitKind::IsArithmetic => is_arithmetic(q.base_type) && !is_ref && q.pointer_depth == 0,
        TypeTraitKind::IsScalar => is_scalar(q.base_type, q.reference, q.pointer_depth),
        TypeTraitKind::IsConst => q.cv.is_const,
        TypeTraitKind::IsVolatile => q.cv.is_volatile,
        TypeTraitKind::IsSigned => is_signed(q.base_type) && !is_ref && q.pointer_depth == 0,
        TypeTraitKind::IsUnsigned => is_unsigned(q.base_type) && !is_ref && q.pointer_depth == 0,
        TypeTraitKind::IsBoundedArray => q.is_array && q.array_size.is_some_and(|n| n > 0) && !is_ref && q.pointer_depth == 0,
        TypeTraitKind::IsUnboundedArray => q.is_array && q.array_size.map_or(true, |n| n == 0) && !is_ref && q.pointer_depth == 0,

        TypeTraitKind::IsUnion => q.struct_info.is_some_and(|s| s.is_union) && !is_ref && q.pointer_depth == 0,
        TypeTraitKind::IsClass => q.struct_info.is_some_and(|s| !s.is_union) && !is_ref && q.pointer_depth == 0,
        TypeTraitKind::IsPolymorphic => q.struct_info.is_some_and(|s| s.has_vtable) && !is_ref && q.pointer_depth == 0,
        TypeTraitKind::IsFinal => q.struct_info.is_some_and(|s| s.is_final) && !is_ref && q.pointer_depth == 0,
        TypeTraitKind::IsAbstract => false,
        TypeTraitKind::HasVirtualDestructor => q
            .struct_info
            .is_some_and(|s| !s.is_union && s.has_vtable && has_user_defined_destructor(s))
            && !is_ref
            && q.pointer_depth == 0,

        TypeTraitKind::IsEmpty => match q.struct_info {
            Some(s) if !s.is_union && !is_ref && q.pointer_depth == 0 => s.members.is_empty() && !s.has_vtable,
            _ => false,
        },

        TypeTraitKind::IsAggregate => match q.struct_info {
            Some(s) if !is_ref && q.pointer_depth == 0 => {
                let all_public = s.members.iter().all(|m| m.access == crate::types::registry::Access::Public);
                !has_user_defined_constructor(s) && !s.has_vtable && all_public
            }
            None if q.is_array && !is_ref && q.pointer_depth == 0 => true,
            _ => false,
        },

        TypeTraitKind::IsStandardLayout => match q.struct_info {
            Some(s) if !s.is_union && !is_ref && q.pointer_depth == 0 => {
                let uniform_access = s.members.windows(2).all(|w| w[0].access == w[1].access);
                !s.has_vtable && uniform_access
            }
            None => is_scalar(q.base_type, q.reference, q.pointer_depth),
            _ => false,
        },

        TypeTraitKind::HasUniqueObjectRepresentations => is_integral(q.base_type) && q.base_type != BaseType::Bool && !is_ref && q.pointer_depth == 0,

        TypeTraitKind::IsTriviallyCopyable => {
            is_scalar(q.base_type, q.reference, q.pointer_depth)
                || q.struct_info.is_some_and(|s| !is_ref && q.pointer_depth == 0 && !s.has_vtable)
        }

        TypeTraitKind::IsTrivial => {
            is_scalar(q.base_type, q.reference, q.pointer_depth)
                || q.struct_info
                    .is_some_and(|s| !is_ref && q.pointer_depth == 0 && !s.has_vtable && !has_user_defined_constructor(s))
        }

        TypeTraitKind::IsPod => {
            if is_scalar(q.base_type, q.reference, q.pointer_depth) {
                true
            } else if let Some(s) = q.struct_info {
                if s.is_union || is_ref || q.pointer_depth != 0 {
                    false
                } else {
                    let uniform_access = s.members.windows(2).all(|w| w[0].access == w[1].access);
                    !s.has_vtable && !has_user_defined_constructor(s) && uniform_access
                }
            } else {
                false
            }
        }

        TypeTraitKind::IsLiteralType => {
            is_scalar(q.base_type, q.reference, q.pointer_depth)
                || is_ref
                || q.struct_info
                    .is_some_and(|s| q.pointer_depth == 0 && !s.has_vtable && !has_user_defined_constructor(s))
        }

        TypeTraitKind::IsDestructible | TypeTraitKind::IsNothrowDestructible => {
            is_scalar(q.base_type, q.reference, q.pointer_depth) || (q.struct_info.is_some() && !is_ref && q.pointer_depth == 0)
        }

        TypeTraitKind::IsTriviallyDestructible => {
            if is_scalar(q.base_type, q.reference, q.pointer_depth) {
                true
            } else if let Some(s) = q.struct_info {
                if !is_ref && q.pointer_depth == 0 {
                    s.is_union || (!s.has_vtable && !has_user_defined_destructor(s))
                } else {
                    false
                }
            } else {
                false
            }
        }

        TypeTraitKind::IsBaseOf | TypeTraitKind::IsSame | TypeTraitKind::IsConvertible | TypeTraitKind::IsAssignable => {
            return TypeTraitResult::failure();
        }
    };

    TypeTraitResult { success: true, value: result }
}

/// Binary traits need a second operand; spec §4.7 keeps these distinct from
/// the unary dispatch above rather than widening every call site's
/// signature with an unused `Option`.
pub fn evaluate_binary_type_trait(kind: TypeTraitKind, lhs: TraitQuery<'_>, rhs: TraitQuery<'_>, lhs_derives_from_rhs: bool) -> TypeTraitResult {
    match kind {
        TypeTraitKind::IsSame => TypeTraitResult {
            success: true,
            value: lhs.base_type == rhs.base_type
                && lhs.pointer_depth == rhs.pointer_depth
                && lhs.reference == rhs.reference
                && lhs.cv == rhs.cv,
        },
        TypeTraitKind::IsBaseOf => TypeTraitResult { success: true, value: lhs_derives_from_rhs },
        TypeTraitKind::IsConvertible => TypeTraitResult {
            success: true,
            value: lhs.base_type == rhs.base_type || (is_arithmetic(lhs.base_type) && is_arithmetic(rhs.base_type)),
        },
        TypeTraitKind::IsAssignable => TypeTraitResult {
            success: true,
            value: rhs.reference != ReferenceKind::None || is_arithmetic(rhs.base_type),
        },
        _ => TypeTraitResult::failure(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(bt: BaseType) -> TraitQuery<'static> {
        TraitQuery {
            base_type: bt,
            pointer_depth: 0,
            reference: ReferenceKind::None,
            cv: CvQualifier { is_const: false, is_volatile: false },
            is_array: false,
            array_size: None,
            struct_info: None,
        }
    }

    #[test]
    fn int_is_integral_and_arithmetic_but_not_floating_point() {
        let q = scalar(BaseType::Int);
        assert_eq!(evaluate_type_trait(TypeTraitKind::IsIntegral, q), TypeTraitResult::success_true());
        assert_eq!(evaluate_type_trait(TypeTraitKind::IsArithmetic, q), TypeTraitResult::success_true());
        assert_eq!(evaluate_type_trait(TypeTraitKind::IsFloatingPoint, q), TypeTraitResult::success_false());
    }

    #[test]
    fn a_reference_is_never_scalar() {
        let mut q = scalar(BaseType::Int);
        q.reference = ReferenceKind::Lvalue;
        assert_eq!(evaluate_type_trait(TypeTraitKind::IsScalar, q), TypeTraitResult::success_false());
        assert_eq!(evaluate_type_trait(TypeTraitKind::IsLvalueReference, q), TypeTraitResult::success_true());
    }

    #[test]
    fn pointer_depth_makes_a_scalar_but_not_an_integral() {
        let mut q = scalar(BaseType::Int);
        q.pointer_depth = 1;
        assert_eq!(evaluate_type_trait(TypeTraitKind::IsPointer, q), TypeTraitResult::success_true());
        assert_eq!(evaluate_type_trait(TypeTraitKind::IsIntegral, q), TypeTraitResult::success_false());
    }

    #[test]
    fn binary_is_same_compares_the_full_shape() {
        let a = scalar(BaseType::Int);
        let b = scalar(BaseType::Double);
        assert_eq!(evaluate_binary_type_trait(TypeTraitKind::IsSame, a, a, false), TypeTraitResult::success_true());
        assert_eq!(evaluate_binary_type_trait(TypeTraitKind::IsSame, a, b, false), TypeTraitResult::success_false());
    }
}
