//! Action formatting stage.
//!
//! Turns the resolved targets into player-facing [`FormattedActionInstance`]s.

use async_trait::async_trait;
use tracing::{debug, warn};

use action_core::{
    ActionDefinition, CombinationGroup, CombinationMode, DefinitionError, FormattedActionInstance,
    LEGACY_PLACEHOLDER, LEGACY_TARGET_ALIAS, Template, TargetManager, generate_combinations,
};

use super::{Stage, StageId};
use crate::config::PipelineConfig;
use crate::context::{ContextUpdate, PipelineContext, PipelineWarning};
use crate::error::PipelineError;
use crate::result::PipelineResult;

/// Formats one instance per resolved entity (single group), per combination
/// (`generateCombinations`), or per primary entity (paired).
pub struct ActionFormattingStage {
    config: PipelineConfig,
}

impl ActionFormattingStage {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    fn format_legacy(
        &self,
        action: &ActionDefinition,
        template: &Template,
        manager: &TargetManager,
    ) -> Result<Vec<FormattedActionInstance>, PipelineError> {
        if action.is_untargeted() {
            return Ok(vec![FormattedActionInstance {
                action_id: action.id.clone(),
                text: template.render(|_| None)?,
                used_targets: Default::default(),
            }]);
        }

        manager
            .target_info(LEGACY_PLACEHOLDER)
            .iter()
            .map(|target| {
                let text = template.render(|name| {
                    (name == LEGACY_PLACEHOLDER || name == LEGACY_TARGET_ALIAS)
                        .then(|| target.display_name())
                })?;
                Ok(FormattedActionInstance {
                    action_id: action.id.clone(),
                    text,
                    used_targets: [(LEGACY_PLACEHOLDER.to_owned(), target.entity_id.clone())]
                        .into_iter()
                        .collect(),
                })
            })
            .collect()
    }

    fn format_multi(
        &self,
        action: &ActionDefinition,
        template: &Template,
        manager: &TargetManager,
        warnings: &mut Vec<PipelineWarning>,
    ) -> Result<Vec<FormattedActionInstance>, PipelineError> {
        if action.max_combinations == Some(0) {
            return Ok(Vec::new());
        }

        let plan = action.plan()?;
        let mut nodes = plan.closure(template.placeholders());
        if nodes.is_empty() {
            nodes = plan.nodes().iter().collect();
        }

        let mut groups: Vec<CombinationGroup<'_>> = Vec::with_capacity(nodes.len());
        for node in nodes.iter().copied() {
            let parent = node.context_placeholder.as_deref().and_then(|parent| {
                groups
                    .iter()
                    .position(|group| group.placeholder == parent)
            });
            groups.push(CombinationGroup {
                placeholder: node.placeholder.as_str(),
                parent,
                candidates: manager.target_info(&node.placeholder).iter().collect(),
            });
        }

        let mode = if groups.len() > 1 && action.generate_combinations {
            CombinationMode::Cartesian {
                limit: action
                    .max_combinations
                    .unwrap_or(self.config.max_combinations),
            }
        } else {
            CombinationMode::Paired
        };

        let set = generate_combinations(&groups, mode);

        if let (true, CombinationMode::Cartesian { limit }) = (set.truncated, mode) {
            warn!(
                target: "pipeline::formatting",
                action = %action.id,
                limit,
                "Combination limit reached, remaining combinations discarded"
            );
            warnings.push(PipelineWarning::CombinationsTruncated {
                action_id: action.id.clone(),
                limit,
            });
        }

        set.combinations
            .iter()
            .map(|combination| {
                let text = template
                    .render(|name| combination.get(name).map(|target| target.display_name()))?;
                Ok(FormattedActionInstance {
                    action_id: action.id.clone(),
                    text,
                    used_targets: combination.used_targets(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Stage for ActionFormattingStage {
    fn name(&self) -> &'static str {
        StageId::ActionFormatting.as_str()
    }

    async fn execute(&self, context: &PipelineContext) -> PipelineResult {
        let Some(manager) = context.resolved_targets.as_deref() else {
            return PipelineResult::error(PipelineError::MissingContext("resolved_targets"));
        };
        let action = &context.action;

        let template = match Template::parse(&action.template) {
            Ok(template) => template,
            Err(err) => return PipelineResult::error(DefinitionError::from(err)),
        };

        let declared = action.declared_placeholders();
        if let Some(token) = template
            .placeholders()
            .find(|token| !declared.contains(token))
        {
            return PipelineResult::error(DefinitionError::UndeclaredPlaceholder {
                action: action.id.clone(),
                placeholder: token.to_owned(),
            });
        }

        let mut warnings = Vec::new();
        let formatted = if action.is_legacy() {
            self.format_legacy(action, &template, manager)
        } else {
            self.format_multi(action, &template, manager, &mut warnings)
        };

        let formatted = match formatted {
            Ok(formatted) => formatted,
            Err(err) => return PipelineResult::error(err),
        };

        if formatted.is_empty() {
            return PipelineResult::skip("No formatted actions produced");
        }

        debug!(
            target: "pipeline::formatting",
            action = %action.id,
            instances = formatted.len(),
            "Formatted action instances"
        );

        PipelineResult::proceed_with(
            ContextUpdate::new()
                .with_formatted_actions(formatted)
                .with_warnings(warnings),
        )
    }
}
