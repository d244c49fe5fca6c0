//! Tagged return value of every stage.

use crate::context::ContextUpdate;
use crate::error::PipelineError;

/// Outcome of one stage.
///
/// - `Continue`: merge the update into the context and run the next stage
/// - `Skip`: the action is unavailable; a normal outcome, not a failure
/// - `Error`: a defect (bad definition, failing collaborator); stop the run
#[derive(Debug)]
pub enum PipelineResult {
    Continue(ContextUpdate),
    Skip { reason: String },
    Error(PipelineError),
}

impl PipelineResult {
    /// Continue without changing the context.
    pub fn proceed() -> Self {
        Self::Continue(ContextUpdate::default())
    }

    pub fn proceed_with(update: ContextUpdate) -> Self {
        Self::Continue(update)
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip {
            reason: reason.into(),
        }
    }

    pub fn error(err: impl Into<PipelineError>) -> Self {
        Self::Error(err.into())
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }
}
