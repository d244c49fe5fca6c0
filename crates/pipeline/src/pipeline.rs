//! Pipeline orchestrator.
//!
//! Runs an ordered list of [`Stage`]s over a [`PipelineContext`]:
//!
//! - `Continue` merges the stage's update and proceeds to the next stage
//! - `Skip` stops the run in [`PipelineState::Stopped`]
//! - `Error` (or a panicking stage) stops the run in [`PipelineState::Errored`]
//!
//! Running every stage to the end yields [`PipelineState::Completed`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, warn};

use action_core::{ClassifiedError, FormattedActionInstance};

use crate::config::PipelineConfig;
use crate::context::{PipelineContext, PipelineWarning};
use crate::error::PipelineError;
use crate::providers::{EntityStore, ScopeEngine};
use crate::result::PipelineResult;
use crate::stages::{ActionFormattingStage, MultiTargetResolutionStage, Stage, StageId};

// ============================================================================
// Run State
// ============================================================================

/// State of one pipeline run. Every state except `Running` is terminal.
#[derive(Clone, Debug)]
pub enum PipelineState {
    Running,
    /// A stage skipped; the action is unavailable.
    Stopped { reason: String },
    Errored(PipelineError),
    Completed,
}

/// Terminal state, final context, and the stages that ran.
#[derive(Clone, Debug)]
pub struct PipelineOutcome {
    pub state: PipelineState,
    pub context: PipelineContext,
    /// Stage names in execution order, including the one that stopped the run.
    pub executed: Vec<&'static str>,
}

impl PipelineOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.state, PipelineState::Completed)
    }

    pub fn stop_reason(&self) -> Option<&str> {
        match &self.state {
            PipelineState::Stopped { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match &self.state {
            PipelineState::Errored(err) => Some(err),
            _ => None,
        }
    }

    pub fn formatted_actions(&self) -> &[FormattedActionInstance] {
        &self.context.formatted_actions
    }

    pub fn warnings(&self) -> &[PipelineWarning] {
        &self.context.warnings
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Ordered stage list. Cheap to clone and shareable across tasks.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[Arc<dyn Stage>]>,
}

impl Pipeline {
    /// Validates the stage list and builds the pipeline.
    ///
    /// Deprecated stages are rejected. Known stages out of canonical order
    /// are accepted with a warning; custom stage names are not checked.
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Result<Self, PipelineError> {
        let mut last_rank: Option<(usize, &'static str)> = None;

        for stage in &stages {
            let Ok(id) = StageId::from_str(stage.name()) else {
                continue;
            };
            if id.is_deprecated() {
                return Err(PipelineError::DeprecatedStage(stage.name().to_owned()));
            }
            let Some(rank) = id.canonical_rank() else {
                continue;
            };
            if let Some((previous, previous_name)) = last_rank {
                if rank < previous {
                    warn!(
                        target: "pipeline::orchestrator",
                        stage = stage.name(),
                        after = previous_name,
                        "Stage registered out of canonical order"
                    );
                }
            }
            last_rank = Some((rank, stage.name()));
        }

        Ok(Self {
            stages: stages.into(),
        })
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Resolution followed by formatting.
    pub fn standard(
        scope_engine: Arc<dyn ScopeEngine>,
        entity_store: Arc<dyn EntityStore>,
        config: PipelineConfig,
    ) -> Self {
        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(MultiTargetResolutionStage::new(
                scope_engine,
                entity_store,
                config.clone(),
            )),
            Arc::new(ActionFormattingStage::new(config)),
        ];
        Self { stages: stages.into() }
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|stage| stage.name())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every stage in order until one stops the run.
    pub async fn run(&self, mut context: PipelineContext) -> PipelineOutcome {
        let mut executed = Vec::with_capacity(self.stages.len());
        let action_id = context.action.id.clone();

        for stage in self.stages.iter() {
            let name = stage.name();
            executed.push(name);

            let result = AssertUnwindSafe(stage.execute(&context))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    PipelineResult::Error(PipelineError::StagePanicked {
                        stage: name.to_owned(),
                        message: panic_message(payload.as_ref()),
                    })
                });

            let state = match result {
                PipelineResult::Continue(update) => {
                    debug!(
                        target: "pipeline::orchestrator",
                        action = %action_id,
                        stage = name,
                        "Stage completed"
                    );
                    context = context.merged(update);
                    continue;
                }
                PipelineResult::Skip { reason } => {
                    debug!(
                        target: "pipeline::orchestrator",
                        action = %action_id,
                        stage = name,
                        reason = %reason,
                        "Stage skipped action"
                    );
                    PipelineState::Stopped { reason }
                }
                PipelineResult::Error(err) => {
                    let severity = err.severity();
                    if severity.is_defect() {
                        error!(
                            target: "pipeline::orchestrator",
                            action = %action_id,
                            stage = name,
                            code = err.error_code(),
                            severity = severity.as_str(),
                            error = %err,
                            "Stage failed, aborting run"
                        );
                    } else {
                        warn!(
                            target: "pipeline::orchestrator",
                            action = %action_id,
                            stage = name,
                            code = err.error_code(),
                            severity = severity.as_str(),
                            error = %err,
                            "Stage rejected input, aborting run"
                        );
                    }
                    PipelineState::Errored(err)
                }
            };

            return PipelineOutcome {
                state,
                context,
                executed,
            };
        }

        PipelineOutcome {
            state: PipelineState::Completed,
            context,
            executed,
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        Pipeline::new(self.stages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tracing_subscriber::fmt::MakeWriter;

    struct Named(&'static str);

    #[async_trait]
    impl Stage for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn execute(&self, _context: &PipelineContext) -> PipelineResult {
            PipelineResult::proceed()
        }
    }

    #[test]
    fn deprecated_stage_is_rejected() {
        let err = Pipeline::builder()
            .stage(Named("component_filtering"))
            .stage(Named("target_resolution"))
            .build()
            .unwrap_err();

        assert!(matches!(err, PipelineError::DeprecatedStage(ref name) if name == "target_resolution"));
    }

    /// Collects formatted log output so warnings can be asserted.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn build_logged(names: &[&'static str]) -> (Pipeline, String) {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let pipeline = tracing::subscriber::with_default(subscriber, || {
            names
                .iter()
                .fold(Pipeline::builder(), |builder, name| builder.stage(Named(*name)))
                .build()
                .unwrap()
        });
        (pipeline, captured.contents())
    }

    #[test]
    fn non_canonical_order_is_accepted_with_a_warning() {
        let (pipeline, logs) =
            build_logged(&["action_formatting", "my_filter", "multi_target_resolution"]);

        assert_eq!(
            pipeline.stage_names().collect::<Vec<_>>(),
            vec!["action_formatting", "my_filter", "multi_target_resolution"]
        );
        assert!(logs.contains("Stage registered out of canonical order"), "{logs}");
        assert!(logs.contains("multi_target_resolution"), "{logs}");
    }

    #[test]
    fn canonical_order_logs_nothing() {
        let (pipeline, logs) = build_logged(&[
            "component_filtering",
            "my_filter",
            "multi_target_resolution",
            "action_formatting",
        ]);

        assert_eq!(pipeline.len(), 4);
        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
