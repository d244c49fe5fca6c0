//! Context objects passed between stages and to collaborators.

use std::fmt;
use std::sync::Arc;

use action_core::{ActionDefinition, EntityId, FormattedActionInstance, TargetManager};
use serde::{Deserialize, Serialize};

/// Entity of a parent target used while evaluating a dependent scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextualTarget {
    /// Placeholder of the parent target.
    pub placeholder: String,
    pub entity: EntityId,
}

/// Evaluation context handed to the scope engine.
///
/// `target` is populated only when evaluating a dependent placeholder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub actor: EntityId,
    pub location: Option<EntityId>,
    pub target: Option<ContextualTarget>,
}

impl EvaluationContext {
    pub fn new(actor: EntityId, location: Option<EntityId>) -> Self {
        Self {
            actor,
            location,
            target: None,
        }
    }

    /// Copy of this context with `entity` as the contextual target.
    #[must_use]
    pub fn with_target(&self, placeholder: impl Into<String>, entity: EntityId) -> Self {
        Self {
            target: Some(ContextualTarget {
                placeholder: placeholder.into(),
                entity,
            }),
            ..self.clone()
        }
    }
}

/// Non-fatal conditions recorded during a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PipelineWarning {
    /// A scope returned an id the entity store no longer knows.
    EntityVanished {
        placeholder: String,
        entity_id: EntityId,
    },
    /// Combination enumeration stopped at the cap.
    CombinationsTruncated { action_id: String, limit: usize },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::EntityVanished {
                placeholder,
                entity_id,
            } => write!(f, "entity {entity_id} for `{placeholder}` no longer exists"),
            PipelineWarning::CombinationsTruncated { action_id, limit } => write!(
                f,
                "combinations for `{action_id}` truncated at {limit}"
            ),
        }
    }
}

/// Fields a stage adds or replaces in the context.
#[derive(Debug, Default)]
pub struct ContextUpdate {
    pub resolved_targets: Option<TargetManager>,
    pub formatted_actions: Option<Vec<FormattedActionInstance>>,
    pub warnings: Vec<PipelineWarning>,
}

impl ContextUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resolved_targets(mut self, manager: TargetManager) -> Self {
        self.resolved_targets = Some(manager);
        self
    }

    #[must_use]
    pub fn with_formatted_actions(mut self, actions: Vec<FormattedActionInstance>) -> Self {
        self.formatted_actions = Some(actions);
        self
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = PipelineWarning>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

/// Shared state of one pipeline invocation.
///
/// Stages read it by reference and describe their changes as a
/// [`ContextUpdate`]; the orchestrator produces the next context with
/// [`merged`](Self::merged).
#[derive(Clone, Debug)]
pub struct PipelineContext {
    pub action: Arc<ActionDefinition>,
    pub actor: EntityId,
    pub location: Option<EntityId>,
    pub resolved_targets: Option<Arc<TargetManager>>,
    pub formatted_actions: Vec<FormattedActionInstance>,
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(action: impl Into<Arc<ActionDefinition>>, actor: impl Into<EntityId>) -> Self {
        Self {
            action: action.into(),
            actor: actor.into(),
            location: None,
            resolved_targets: None,
            formatted_actions: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<EntityId>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Base scope evaluation context (actor + location).
    pub fn evaluation_context(&self) -> EvaluationContext {
        EvaluationContext::new(self.actor.clone(), self.location.clone())
    }

    /// Returns the next context with `update` applied.
    ///
    /// Present fields replace the current ones; warnings accumulate.
    #[must_use]
    pub fn merged(mut self, update: ContextUpdate) -> Self {
        if let Some(manager) = update.resolved_targets {
            self.resolved_targets = Some(Arc::new(manager));
        }
        if let Some(actions) = update.formatted_actions {
            self.formatted_actions = actions;
        }
        self.warnings.extend(update.warnings);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_core::TargetMetadata;

    #[test]
    fn merge_replaces_fields_and_accumulates_warnings() {
        let action = ActionDefinition::legacy("core:follow", "follow {target}", "actors");
        let context = PipelineContext::new(action, "hero").with_location("tavern");

        let mut manager = TargetManager::new();
        manager
            .add_resolved_target("primary", EntityId::new("bob"), TargetMetadata::direct(None))
            .unwrap();

        let first = context.clone().merged(
            ContextUpdate::new()
                .with_resolved_targets(manager)
                .with_warnings([PipelineWarning::EntityVanished {
                    placeholder: "primary".into(),
                    entity_id: EntityId::new("ghost"),
                }]),
        );
        let second = first.clone().merged(ContextUpdate::new().with_warnings([
            PipelineWarning::CombinationsTruncated {
                action_id: "core:follow".into(),
                limit: 1,
            },
        ]));

        assert!(context.resolved_targets.is_none());
        assert!(first.resolved_targets.is_some());
        assert_eq!(
            second
                .resolved_targets
                .as_deref()
                .and_then(|m| m.primary_target()),
            Some(&EntityId::new("bob"))
        );
        assert_eq!(second.warnings.len(), 2);
    }

    #[test]
    fn contextual_evaluation_keeps_base_fields() {
        let base = EvaluationContext::new(EntityId::new("hero"), Some(EntityId::new("forge")));
        let contextual = base.with_target("primary", EntityId::new("hammer"));

        assert!(base.target.is_none());
        assert_eq!(contextual.actor, base.actor);
        assert_eq!(contextual.location, base.location);
        assert_eq!(
            contextual.target,
            Some(ContextualTarget {
                placeholder: "primary".into(),
                entity: EntityId::new("hammer"),
            })
        );
    }
}
