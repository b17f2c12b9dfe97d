pub mod registry;
pub mod traits;

pub use registry::{
    Access, BaseClassInfo, BaseType, MemberFunctionInfo, MemberInfo, StructTypeInfo,
    TemplateArgRecord, TemplateInstantiationInfo, TypeInfo, TypeRegistry,
};
pub use traits::{evaluate_binary_type_trait, evaluate_type_trait, TraitQuery, TypeTraitResult};
