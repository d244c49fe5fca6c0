//! Static validation of action definitions.
//!
//! Checks target sources, the `contextFrom` graph and template tokens for
//! every action, without touching the scope table.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use console::style;

use action_core::ClassifiedError;

use crate::scenario::Scenario;

/// Validate definitions without evaluating any scope
#[derive(Parser)]
pub struct Check {
    /// Scenario file (JSON)
    #[arg(value_name = "SCENARIO")]
    scenario: PathBuf,
}

impl Check {
    pub fn execute(self) -> Result<()> {
        let scenario = Scenario::load(&self.scenario)?;
        let mut invalid = 0usize;

        for action in &scenario.actions {
            match action.validate() {
                Ok(plan) => {
                    let order: Vec<&str> = plan
                        .nodes()
                        .iter()
                        .map(|node| node.placeholder.as_str())
                        .collect();
                    if order.is_empty() {
                        println!("{} {}", style("ok").green().bold(), action.id);
                    } else {
                        println!(
                            "{} {} {}",
                            style("ok").green().bold(),
                            action.id,
                            style(format!("[{}]", order.join(" -> "))).dim()
                        );
                    }
                }
                Err(err) => {
                    invalid += 1;
                    println!(
                        "{} {} {} {} {}",
                        style("invalid").red().bold(),
                        action.id,
                        style(err.error_code()).yellow(),
                        style(format!("({})", err.severity().as_str())).dim(),
                        err
                    );
                }
            }
        }

        if invalid > 0 {
            anyhow::bail!(
                "{invalid} of {} action definitions are invalid",
                scenario.actions.len()
            );
        }
        Ok(())
    }
}
