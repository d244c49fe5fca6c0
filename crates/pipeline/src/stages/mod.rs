//! Pipeline stages.
//!
//! Each stage is one asynchronous step over the shared context. Stages never
//! run concurrently with each other within one pipeline invocation.
//!
//! # Canonical Order
//!
//! 1. `component_filtering` (external)
//! 2. `prerequisite_evaluation` (external)
//! 3. `multi_target_resolution` ([`MultiTargetResolutionStage`])
//! 4. `action_formatting` ([`ActionFormattingStage`])
//!
//! `target_resolution`, the single-target predecessor of the multi-target
//! stage, is deprecated and rejected at pipeline construction.

mod formatting;
mod resolution;

pub use formatting::ActionFormattingStage;
pub use resolution::MultiTargetResolutionStage;

use async_trait::async_trait;

use crate::context::PipelineContext;
use crate::result::PipelineResult;

/// Well-known stage identifiers.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum StageId {
    ComponentFiltering,
    PrerequisiteEvaluation,
    TargetResolution,
    MultiTargetResolution,
    ActionFormatting,
}

impl StageId {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn is_deprecated(self) -> bool {
        matches!(self, StageId::TargetResolution)
    }

    /// Position in the canonical order; `None` for deprecated stages.
    pub fn canonical_rank(self) -> Option<usize> {
        match self {
            StageId::ComponentFiltering => Some(0),
            StageId::PrerequisiteEvaluation => Some(1),
            StageId::MultiTargetResolution => Some(2),
            StageId::ActionFormatting => Some(3),
            StageId::TargetResolution => None,
        }
    }
}

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Identifier used for ordering checks, logging and the run trace.
    ///
    /// Known stages use [`StageId::as_str`]; custom stages may use any name.
    fn name(&self) -> &'static str;

    /// Runs the stage against the current context.
    ///
    /// Failures are reported as [`PipelineResult::Error`], never by panicking.
    async fn execute(&self, context: &PipelineContext) -> PipelineResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn stage_ids_use_snake_case_names() {
        assert_eq!(StageId::MultiTargetResolution.as_str(), "multi_target_resolution");
        assert_eq!(
            StageId::from_str("prerequisite_evaluation"),
            Ok(StageId::PrerequisiteEvaluation)
        );
        assert!(StageId::from_str("target_resolution").unwrap().is_deprecated());
        assert!(StageId::from_str("my_custom_stage").is_err());
    }
}
