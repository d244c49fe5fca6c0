//! Async pipeline that turns action definitions into formatted action instances.
//!
//! The pipeline runs stages in a fixed order over an immutable-per-stage
//! [`PipelineContext`]; every stage returns a [`PipelineResult`] that either
//! merges new context fields and continues, or stops the run.
//!
//! Modules are organized by responsibility:
//! - [`pipeline`] hosts the orchestrator and builder
//! - [`stages`] contains the multi-target resolution and formatting stages
//! - [`providers`] defines the scope engine and entity store collaborators
//! - [`memory`] provides in-memory collaborators for fixtures and tests
//! - [`context`], [`result`], [`config`] and [`error`] hold shared types
pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod providers;
pub mod result;
pub mod stages;

pub use config::PipelineConfig;
pub use context::{
    ContextUpdate, ContextualTarget, EvaluationContext, PipelineContext, PipelineWarning,
};
pub use error::{PipelineError, ScopeError};
pub use memory::{InMemoryEntityStore, ScopeEntry, StaticScopeEngine};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineOutcome, PipelineState};
pub use providers::{EntityStore, ScopeEngine};
pub use result::PipelineResult;
pub use stages::{ActionFormattingStage, MultiTargetResolutionStage, Stage, StageId};
