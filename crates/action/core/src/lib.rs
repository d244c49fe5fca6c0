//! Core data model and algorithms for multi-target action resolution.
//!
//! `action-core` turns an abstract [`ActionDefinition`] into the pieces the
//! async pipeline needs: a validated [`ResolutionPlan`] over the `contextFrom`
//! dependency graph, a [`TargetManager`] that accumulates resolved targets,
//! and the formatting primitives (template substitution and combination
//! generation) that produce [`FormattedActionInstance`]s.
//!
//! Nothing in this crate performs I/O. Scope evaluation and entity lookup are
//! owned by `action-pipeline`, which drives these types from its stages.
pub mod definition;
pub mod entity;
pub mod error;
pub mod format;
pub mod graph;
pub mod payload;
pub mod targets;

pub use definition::{
    ActionDefinition, LEGACY_PLACEHOLDER, LEGACY_TARGET_ALIAS, SCOPE_NONE, SCOPE_SELF,
    TargetDefinitions, TargetSpec,
};
pub use entity::{Entity, EntityId};
pub use error::{ClassifiedError, DefinitionError, ErrorSeverity, FormatError, TargetError};
pub use format::{
    Combination, CombinationGroup, CombinationMode, CombinationSet, FormattedActionInstance,
    Template, generate_combinations,
};
pub use graph::{PlanNode, ResolutionPlan};
pub use payload::AttemptActionPayload;
pub use targets::{
    ResolutionMetadata, ResolutionMethod, ResolvedTarget, TargetDetail, TargetManager,
    TargetManagerSnapshot, TargetMetadata, TargetValidation,
};
