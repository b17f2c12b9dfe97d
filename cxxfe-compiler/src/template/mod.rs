//! Template instantiation pipeline (spec §4.5): an instantiation queue
//! feeding a substitutor-driven instantiator, with lazy member resolution
//! handed off once a class instantiation completes.

pub mod instantiator;
pub mod queue;
pub mod substitutor;

pub use instantiator::{template_arg_spec_to_record, InstantiationError, TemplateInstantiator};
pub use queue::{InstantiationKey, InstantiationQueue, InstantiationStatus, PointOfInstantiation, QueueStatistics};
pub use substitutor::{ArgBinding, NoopResolver, SubstitutionMap, TypeResolver};
