//! Overload resolution (spec §4.3, §8 P6). Grounded on
//! `examples/original_source/src/OverloadResolution.h`'s `ConversionRank`
//! enum and pointwise best-candidate selection, retargeted from raw
//! `Type`/`TypeSpecifierNode` comparisons to this crate's `TypeIndex`-based
//! `TypeRegistry`.

use cxxfe_ast::ir::BaseType;
use cxxfe_ast::TypeIndex;

use crate::types::registry::TypeRegistry;

/// Lower is better. `Ord` derivation gives us the pointwise "not worse /
/// strictly better" comparison spec §4.3 calls for directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConversionRank {
    ExactMatch = 0,
    Promotion = 1,
    Conversion = 2,
    UserDefined = 3,
    NoMatch = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgType {
    pub type_index: TypeIndex,
    pub pointer_depth: u32,
    pub is_const: bool,
}

fn is_integral(bt: BaseType) -> bool {
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
            | BaseType::Enum
    )
}

fn is_floating_point(bt: BaseType) -> bool {
    matches!(bt, BaseType::Float | BaseType::Double | BaseType::LongDouble)
}

/// Integer conversion rank used only to decide promotion-vs-conversion;
/// unsigned counterparts share their signed sibling's rank (spec leaves
/// signedness out of the promotion rule, matching the source's
/// `get_integer_rank`).
fn integer_rank(bt: BaseType) -> i32 {
    match bt {
        BaseType::Bool => 0,
        BaseType::Char | BaseType::UnsignedChar => 1,
        BaseType::Short | BaseType::UnsignedShort => 2,
        BaseType::Int | BaseType::UnsignedInt | BaseType::Enum => 3,
        BaseType::Long | BaseType::UnsignedLong => 4,
        BaseType::LongLong | BaseType::UnsignedLongLong => 5,
        _ => 3,
    }
}

/// Ranks converting `from` to `to` (spec §4.3): pointer arguments require
/// matching depth and pointee type; everything else falls back to the
/// scalar promotion/conversion ladder.
pub fn rank_conversion(from: &ArgType, to: &ArgType, registry: &TypeRegistry) -> ConversionRank {
    if from.pointer_depth > 0 || to.pointer_depth > 0 {
        if from.pointer_depth != to.pointer_depth {
            return ConversionRank::NoMatch;
        }
        return if from.type_index == to.type_index {
            ConversionRank::ExactMatch
        } else {
            ConversionRank::NoMatch
        };
    }

    if from.type_index == to.type_index {
        return ConversionRank::ExactMatch;
    }

    let (Some(from_ty), Some(to_ty)) = (registry.get(from.type_index), registry.get(to.type_index)) else {
        return ConversionRank::NoMatch;
    };
    let (fb, tb) = (from_ty.base_type, to_ty.base_type);

    if fb == BaseType::Bool {
        if tb == BaseType::Int {
            return ConversionRank::Promotion;
        }
        if is_integral(tb) || is_floating_point(tb) {
            return ConversionRank::Conversion;
        }
    }

    if is_integral(fb) && is_integral(tb) {
        return if integer_rank(fb) < 3 && integer_rank(tb) >= 3 {
            ConversionRank::Promotion
        } else {
            ConversionRank::Conversion
        };
    }

    if fb == BaseType::Float && tb == BaseType::Double {
        return ConversionRank::Promotion;
    }
    if is_floating_point(fb) && is_floating_point(tb) {
        return ConversionRank::Conversion;
    }
    if is_integral(fb) && is_floating_point(tb) {
        return ConversionRank::Conversion;
    }
    if is_floating_point(fb) && is_integral(tb) {
        return ConversionRank::Conversion;
    }

    ConversionRank::NoMatch
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverloadResolution<Candidate> {
    Selected(Candidate),
    Ambiguous,
    NoMatch,
}

/// Selects the best-matching candidate among `candidates`, each given as
/// its parameter-type list, per spec §4.3: strictly not-worse on every
/// argument and strictly better on at least one wins; an incomparable tie
/// is ambiguous.
pub fn resolve_overload<Candidate: Clone>(
    candidates: &[(Candidate, Vec<ArgType>)],
    args: &[ArgType],
    registry: &TypeRegistry,
) -> OverloadResolution<Candidate> {
    let mut best: Option<(Candidate, Vec<ConversionRank>)> = None;
    let mut tie_count = 0usize;

    for (candidate, params) in candidates {
        if params.len() != args.len() {
            continue;
        }

        let ranks: Vec<ConversionRank> = args
            .iter()
            .zip(params.iter())
            .map(|(arg, param)| rank_conversion(arg, param, registry))
            .collect();
        if ranks.iter().any(|r| *r == ConversionRank::NoMatch) {
            continue;
        }

        match &best {
            None => {
                best = Some((candidate.clone(), ranks));
                tie_count = 1;
            }
            Some((_, best_ranks)) => {
                let mut better = false;
                let mut worse = false;
                for (r, b) in ranks.iter().zip(best_ranks.iter()) {
                    if r < b {
                        better = true;
                    } else if r > b {
                        worse = true;
                    }
                }
                if better && !worse {
                    best = Some((candidate.clone(), ranks));
                    tie_count = 1;
                } else if !better && !worse {
                    tie_count += 1;
                }
            }
        }
    }

    match best {
        None => OverloadResolution::NoMatch,
        Some((candidate, _)) if tie_count > 1 => {
            let _ = candidate;
            OverloadResolution::Ambiguous
        }
        Some((candidate, _)) => OverloadResolution::Selected(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::registry::TypeInfo;
    use cxxfe_ast::StringInterner;

    fn setup() -> (TypeRegistry, TypeIndex, TypeIndex, TypeIndex) {
        let interner = StringInterner::new();
        let mut reg = TypeRegistry::new();
        reg.seed_builtins(&interner);
        let int_ty = reg.builtin(BaseType::Int).unwrap();
        let double_ty = reg.builtin(BaseType::Double).unwrap();
        let short_ty = reg.builtin(BaseType::Short).unwrap();
        (reg, int_ty, double_ty, short_ty)
    }

    #[test]
    fn exact_match_beats_a_widening_conversion() {
        let (reg, int_ty, double_ty, _) = setup();
        let arg = ArgType { type_index: int_ty, pointer_depth: 0, is_const: false };
        let candidates = vec![
            ("exact", vec![ArgType { type_index: int_ty, pointer_depth: 0, is_const: false }]),
            ("widen", vec![ArgType { type_index: double_ty, pointer_depth: 0, is_const: false }]),
        ];
        let result = resolve_overload(&candidates, &[arg], &reg);
        assert_eq!(result, OverloadResolution::Selected("exact"));
    }

    #[test]
    fn small_integer_to_int_is_a_promotion_not_a_conversion() {
        let (reg, int_ty, _, short_ty) = setup();
        let from = ArgType { type_index: short_ty, pointer_depth: 0, is_const: false };
        let to = ArgType { type_index: int_ty, pointer_depth: 0, is_const: false };
        assert_eq!(rank_conversion(&from, &to, &reg), ConversionRank::Promotion);
    }

    #[test]
    fn two_equally_good_overloads_are_ambiguous() {
        let (reg, int_ty, double_ty, _) = setup();
        let arg = ArgType { type_index: int_ty, pointer_depth: 0, is_const: false };
        let candidates = vec![
            ("a", vec![ArgType { type_index: double_ty, pointer_depth: 0, is_const: false }]),
            ("b", vec![ArgType { type_index: double_ty, pointer_depth: 0, is_const: false }]),
        ];
        let result = resolve_overload(&candidates, &[arg], &reg);
        assert_eq!(result, OverloadResolution::Ambiguous);
    }

    #[test]
    fn mismatched_pointer_depth_never_matches() {
        let (reg, int_ty, _, _) = setup();
        let from = ArgType { type_index: int_ty, pointer_depth: 1, is_const: false };
        let to = ArgType { type_index: int_ty, pointer_depth: 0, is_const: false };
        assert_eq!(rank_conversion(&from, &to, &reg), ConversionRank::NoMatch);
    }
}
