//! Run scenario actions through the standard pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use console::style;
use serde::Serialize;

use action_core::{ClassifiedError, FormattedActionInstance, TargetManagerSnapshot};
use action_pipeline::{
    Pipeline, PipelineConfig, PipelineContext, PipelineOutcome, PipelineState, PipelineWarning,
};

use crate::scenario::Scenario;

/// Run actions through the pipeline and print the formatted instances
#[derive(Parser)]
pub struct Resolve {
    /// Scenario file (JSON)
    #[arg(value_name = "SCENARIO")]
    scenario: PathBuf,

    /// Only run the action with this id
    #[arg(short, long, value_name = "ID")]
    action: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Combination cap for actions without their own (overrides ACTION_MAX_COMBINATIONS)
    #[arg(long, value_name = "N")]
    max_combinations: Option<usize>,

    /// Resolve independent targets one at a time
    #[arg(long)]
    sequential: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    /// Human-readable report
    Text,
    /// One JSON document with a report per action
    Json,
}

/// Serialized form of one pipeline run.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionReport<'a> {
    action_id: &'a str,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved_targets: Option<TargetManagerSnapshot>,
    formatted_actions: &'a [FormattedActionInstance],
    warnings: &'a [PipelineWarning],
    stages: &'a [&'static str],
}

impl<'a> ActionReport<'a> {
    fn new(outcome: &'a PipelineOutcome) -> Self {
        let (state, reason, error) = match &outcome.state {
            PipelineState::Completed => ("completed", None, None),
            PipelineState::Running => ("running", None, None),
            PipelineState::Stopped { reason } => ("skipped", Some(reason.as_str()), None),
            PipelineState::Errored(err) => ("errored", None, Some(err)),
        };

        Self {
            action_id: &outcome.context.action.id,
            state,
            reason,
            error: error.map(ToString::to_string),
            error_code: error.map(|err| err.error_code()),
            severity: error.map(|err| err.severity().as_str()),
            resolved_targets: outcome
                .context
                .resolved_targets
                .as_deref()
                .map(|manager| manager.snapshot()),
            formatted_actions: outcome.formatted_actions(),
            warnings: outcome.warnings(),
            stages: &outcome.executed,
        }
    }
}

impl Resolve {
    pub async fn execute(self) -> Result<()> {
        let scenario = Scenario::load(&self.scenario)?;

        // CLI flags take precedence over the environment
        let mut config = PipelineConfig::from_env();
        if let Some(max) = self.max_combinations {
            config = config.with_max_combinations(max);
        }
        if self.sequential {
            config = config.with_concurrent_resolution(false);
        }

        let pipeline = Pipeline::standard(
            Arc::new(scenario.scope_engine()),
            Arc::new(scenario.entity_store()),
            config,
        );

        let mut outcomes = Vec::new();
        for action in scenario.select(self.action.as_deref())? {
            let mut context = PipelineContext::new(action.clone(), scenario.actor.clone());
            if let Some(location) = &scenario.location {
                context = context.with_location(location.clone());
            }
            outcomes.push(pipeline.run(context).await);
        }

        match self.format {
            OutputFormat::Text => {
                for outcome in &outcomes {
                    print_text(outcome);
                }
            }
            OutputFormat::Json => {
                let reports: Vec<ActionReport<'_>> = outcomes.iter().map(ActionReport::new).collect();
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
        }

        Ok(())
    }
}

fn print_text(outcome: &PipelineOutcome) {
    let id = &outcome.context.action.id;

    match &outcome.state {
        PipelineState::Completed => {
            println!(
                "{} {} ({} instances)",
                style("ok").green().bold(),
                style(id).bold(),
                outcome.formatted_actions().len()
            );
            for instance in outcome.formatted_actions() {
                let targets: Vec<String> = instance
                    .used_targets
                    .iter()
                    .map(|(placeholder, entity)| format!("{placeholder}={entity}"))
                    .collect();
                println!(
                    "    {} {}",
                    instance.text,
                    style(format!("[{}]", targets.join(", "))).dim()
                );
            }
        }
        PipelineState::Stopped { reason } => {
            println!(
                "{} {} {}",
                style("skipped").yellow().bold(),
                style(id).bold(),
                reason
            );
        }
        PipelineState::Errored(err) => {
            println!(
                "{} {} {} {} {}",
                style("error").red().bold(),
                style(id).bold(),
                style(err.error_code()).yellow(),
                style(format!("({})", err.severity().as_str())).dim(),
                err
            );
        }
        PipelineState::Running => {}
    }

    for warning in outcome.warnings() {
        println!("    {} {}", style("warning:").yellow(), warning);
    }
}
