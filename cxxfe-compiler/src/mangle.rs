//! Name mangling contract (spec §6.5): a pure function over (function name,
//! return type, parameter types, qualifiers, template args, target ABI).
//! The front end calls through this trait; it does not implement the
//! Itanium or MSVC mangling tables itself.

use cxxfe_ast::StringInterner;
use std::fmt::Write as _;

use crate::config::MangleAbi;
use crate::types::registry::TypeInfo;

#[derive(Debug, Clone)]
pub struct ManglingInputs<'a> {
    pub name: &'a str,
    pub return_type: Option<&'a TypeInfo>,
    pub param_types: &'a [&'a TypeInfo],
    pub is_variadic: bool,
    pub enclosing_struct: Option<&'a str>,
    pub namespace_path: &'a [&'a str],
    pub is_static_linkage: bool,
    pub is_constructor: bool,
    pub is_destructor: bool,
    pub non_type_template_args: &'a [i64],
}

pub trait NameMangler {
    fn mangle(&self, abi: MangleAbi, inputs: &ManglingInputs) -> String;
}

/// A readable, deterministic mangler used by the demo CLI and by tests.
///
/// This is **not** a faithful Itanium/MSVC implementation: it encodes
/// enough of the mangling contract's inputs (qualification, constructor /
/// destructor markers, parameter list) to give every distinct declaration a
/// distinct, legible name, which is what the rest of this crate's tests and
/// the CLI demo actually need from it.
pub struct DemoMangler;

impl NameMangler for DemoMangler {
    fn mangle(&self, abi: MangleAbi, inputs: &ManglingInputs) -> String {
        let mut out = String::new();

        if !inputs.namespace_path.is_empty() || inputs.enclosing_struct.is_some() {
            out.push_str("_ZN");
        } else {
            out.push_str("_Z");
        }

        for ns in inputs.namespace_path {
            let _ = write!(out, "{}{}", ns.len(), ns);
        }
        if let Some(s) = inputs.enclosing_struct {
            let _ = write!(out, "{}{}", s.len(), s);
        }

        let marker = match abi {
            MangleAbi::Itanium if inputs.is_constructor => "C1".to_string(),
            MangleAbi::Itanium if inputs.is_destructor => "D1".to_string(),
            MangleAbi::Msvc if inputs.is_constructor => "??0".to_string(),
            MangleAbi::Msvc if inputs.is_destructor => "??1".to_string(),
            _ => String::new(),
        };

        if !marker.is_empty() {
            out.push_str(&marker);
        } else {
            let _ = write!(out, "{}{}", inputs.name.len(), inputs.name);
        }

        if !inputs.namespace_path.is_empty() || inputs.enclosing_struct.is_some() {
            out.push('E');
        }

        if inputs.param_types.is_empty() {
            out.push_str("v");
        } else {
            for p in inputs.param_types {
                let _ = write!(out, "{}", type_code(p));
            }
        }
        if inputs.is_variadic {
            out.push('z');
        }

        for arg in inputs.non_type_template_args {
            let _ = write!(out, "Li{}E", arg);
        }

        if inputs.is_static_linkage {
            out.push_str(".static");
        }

        out
    }
}

fn type_code(ty: &TypeInfo) -> &'static str {
    use crate::types::registry::BaseType::*;
    match ty.base_type {
        Void => "v",
        Bool => "b",
        Char => "c",
        Short => "s",
        Int => "i",
        Long => "l",
        LongLong => "x",
        UnsignedChar => "h",
        UnsignedShort => "t",
        UnsignedInt => "j",
        UnsignedLong => "m",
        UnsignedLongLong => "y",
        Float => "f",
        Double => "d",
        LongDouble => "e",
        Nullptr => "Dn",
        _ => "P",
    }
}

/// Resolves a `StringHandle`-friendly mangled name and interns it.
pub fn mangle_and_intern(
    mangler: &dyn NameMangler,
    abi: MangleAbi,
    inputs: &ManglingInputs,
    interner: &StringInterner,
) -> cxxfe_ast::StringHandle {
    let mangled = mangler.mangle(abi, inputs);
    interner.intern_str(&mangled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangling_is_a_pure_function_of_its_inputs() {
        let mangler = DemoMangler;
        let inputs = ManglingInputs {
            name: "add",
            return_type: None,
            param_types: &[],
            is_variadic: false,
            enclosing_struct: None,
            namespace_path: &[],
            is_static_linkage: false,
            is_constructor: false,
            is_destructor: false,
            non_type_template_args: &[],
        };
        let a = mangler.mangle(MangleAbi::Itanium, &inputs);
        let b = mangler.mangle(MangleAbi::Itanium, &inputs);
        assert_eq!(a, b);
    }

    #[test]
    fn constructor_gets_the_itanium_c1_marker() {
        let mangler = DemoMangler;
        let inputs = ManglingInputs {
            name: "Point",
            return_type: None,
            param_types: &[],
            is_variadic: false,
            enclosing_struct: Some("Point"),
            namespace_path: &[],
            is_static_linkage: false,
            is_constructor: true,
            is_destructor: false,
            non_type_template_args: &[],
        };
        assert!(mangler.mangle(MangleAbi::Itanium, &inputs).contains("C1"));
    }
}
