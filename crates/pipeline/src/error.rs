//! Unified error types surfaced by the pipeline.
//!
//! Stages never return `Err` or panic past their boundary in normal operation;
//! these errors travel inside [`PipelineResult::Error`](crate::PipelineResult)
//! and end up in the [`Errored`](crate::PipelineState::Errored) terminal state.
use action_core::{
    ClassifiedError, DefinitionError, ErrorSeverity, FormatError, TargetError,
};
use thiserror::Error;

/// Failure reported by a [`ScopeEngine`](crate::ScopeEngine) implementation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("scope `{expression}` could not be evaluated: {reason}")]
pub struct ScopeError {
    pub expression: String,
    pub reason: String,
}

impl ScopeError {
    pub fn new(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("scope evaluation failed for placeholder `{placeholder}`")]
    ScopeEvaluation {
        placeholder: String,
        #[source]
        source: ScopeError,
    },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("pipeline context is missing `{0}`")]
    MissingContext(&'static str),

    #[error("stage `{0}` is deprecated and cannot be used")]
    DeprecatedStage(String),

    #[error("stage `{stage}` panicked: {message}")]
    StagePanicked { stage: String, message: String },
}

impl ClassifiedError for PipelineError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            PipelineError::Definition(err) => err.severity(),
            PipelineError::Format(err) => err.severity(),
            PipelineError::Target(err) => err.severity(),
            PipelineError::ScopeEvaluation { .. } => ErrorSeverity::Internal,
            PipelineError::MissingContext(_) | PipelineError::StagePanicked { .. } => {
                ErrorSeverity::Internal
            }
            PipelineError::DeprecatedStage(_) => ErrorSeverity::Fatal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            PipelineError::Definition(err) => err.error_code(),
            PipelineError::Format(err) => err.error_code(),
            PipelineError::Target(err) => err.error_code(),
            PipelineError::ScopeEvaluation { .. } => "PIPELINE_SCOPE_EVALUATION",
            PipelineError::MissingContext(_) => "PIPELINE_MISSING_CONTEXT",
            PipelineError::DeprecatedStage(_) => "PIPELINE_DEPRECATED_STAGE",
            PipelineError::StagePanicked { .. } => "PIPELINE_STAGE_PANICKED",
        }
    }
}
