//! Multi-target resolution stage.
//!
//! Populates a fresh [`TargetManager`] from the action's target graph:
//!
//! 1. Every definition is validated up front (target sources, cycles,
//!    unknown references, template tokens); a bad definition is an error,
//!    never a skip.
//! 2. Legacy actions evaluate their single `scope` once and bind every match
//!    to the `primary` placeholder. Multi-target actions are resolved level
//!    by level in topological order. Targets within one level are
//!    independent and may be resolved concurrently.
//! 3. A dependent target is evaluated once per entity of its parent, with
//!    that entity as the contextual target.
//! 4. Every id is checked against the entity store; vanished entities are
//!    dropped with a warning.
//! 5. Missing required targets end the run with `skip`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use tracing::{debug, warn};

use action_core::{
    Entity, EntityId, LEGACY_PLACEHOLDER, PlanNode, SCOPE_NONE, SCOPE_SELF, TargetManager,
    TargetMetadata,
};

use super::{Stage, StageId};
use crate::config::PipelineConfig;
use crate::context::{ContextUpdate, EvaluationContext, PipelineContext, PipelineWarning};
use crate::error::PipelineError;
use crate::providers::{EntityStore, ScopeEngine};
use crate::result::PipelineResult;

/// Targets found for one placeholder, ready to be stored.
struct NodeResolution {
    placeholder: String,
    targets: Vec<(EntityId, TargetMetadata)>,
    warnings: Vec<PipelineWarning>,
}

pub struct MultiTargetResolutionStage {
    scope_engine: Arc<dyn ScopeEngine>,
    entity_store: Arc<dyn EntityStore>,
    config: PipelineConfig,
}

impl MultiTargetResolutionStage {
    pub fn new(
        scope_engine: Arc<dyn ScopeEngine>,
        entity_store: Arc<dyn EntityStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            scope_engine,
            entity_store,
            config,
        }
    }

    // ------------------------------------------------------------------------
    // Legacy path
    // ------------------------------------------------------------------------

    async fn resolve_legacy(&self, context: &PipelineContext) -> PipelineResult {
        let action = &context.action;

        // Scope presence and template tokens, before anything is evaluated.
        if let Err(err) = action.validate() {
            return PipelineResult::error(err);
        }
        let scope = action.scope.as_deref().map(str::trim).unwrap_or_default();

        let mut manager = TargetManager::new();

        if scope == SCOPE_NONE {
            manager.start_resolution(0);
            manager.complete_resolution();
            debug!(
                target: "pipeline::resolution",
                action = %action.id,
                "Untargeted action, nothing to resolve"
            );
            return PipelineResult::proceed_with(ContextUpdate::new().with_resolved_targets(manager));
        }

        manager.start_resolution(1);

        let base = context.evaluation_context();
        let ids = match self.evaluate(LEGACY_PLACEHOLDER, scope, &base).await {
            Ok(ids) => ids,
            Err(err) => return PipelineResult::error(err),
        };
        let (entities, warnings) = self.enrich(LEGACY_PLACEHOLDER, ids).await;

        for entity in entities {
            let metadata = TargetMetadata::direct(entity.name);
            if let Err(err) = manager.add_resolved_target(LEGACY_PLACEHOLDER, entity.id, metadata) {
                return PipelineResult::error(err);
            }
        }
        manager.complete_resolution();

        if manager.is_empty() {
            debug!(
                target: "pipeline::resolution",
                action = %action.id,
                scope,
                "Legacy scope produced no targets"
            );
            return PipelineResult::skip("No targets found");
        }

        PipelineResult::proceed_with(
            ContextUpdate::new()
                .with_resolved_targets(manager)
                .with_warnings(warnings),
        )
    }

    // ------------------------------------------------------------------------
    // Multi-target path
    // ------------------------------------------------------------------------

    async fn resolve_multi(&self, context: &PipelineContext) -> PipelineResult {
        let action = &context.action;

        // Validate the whole definition before any scope is evaluated.
        let plan = match action.validate() {
            Ok(plan) => plan,
            Err(err) => return PipelineResult::error(err),
        };

        let mut manager = TargetManager::new();
        manager.start_resolution(plan.len());
        let mut warnings = Vec::new();

        for level in plan.levels() {
            let resolutions = if self.config.concurrent_resolution {
                try_join_all(
                    level
                        .iter()
                        .map(|node| self.resolve_node(node, context, &manager)),
                )
                .await
            } else {
                let mut sequential = Vec::with_capacity(level.len());
                let mut failed = None;
                for node in &level {
                    match self.resolve_node(node, context, &manager).await {
                        Ok(resolution) => sequential.push(resolution),
                        Err(err) => {
                            failed = Some(err);
                            break;
                        }
                    }
                }
                match failed {
                    Some(err) => Err(err),
                    None => Ok(sequential),
                }
            };

            let resolutions = match resolutions {
                Ok(resolutions) => resolutions,
                Err(err) => return PipelineResult::error(err),
            };

            for resolution in resolutions {
                for (entity_id, metadata) in resolution.targets {
                    if let Err(err) =
                        manager.add_resolved_target(&resolution.placeholder, entity_id, metadata)
                    {
                        return PipelineResult::error(err);
                    }
                }
                warnings.extend(resolution.warnings);
            }
        }

        manager.complete_resolution();

        let validation = manager
            .validate_required_targets(plan.nodes().iter().map(|node| node.placeholder.as_str()));
        if !validation.valid {
            debug!(
                target: "pipeline::resolution",
                action = %action.id,
                missing = ?validation.missing,
                "Required targets not resolved"
            );
            return PipelineResult::skip(format!(
                "Required targets not resolved: {}",
                validation.missing.join(", ")
            ));
        }

        PipelineResult::proceed_with(
            ContextUpdate::new()
                .with_resolved_targets(manager)
                .with_warnings(warnings),
        )
    }

    /// Resolves one placeholder. Reads the manager, never writes it.
    async fn resolve_node(
        &self,
        node: &PlanNode,
        context: &PipelineContext,
        manager: &TargetManager,
    ) -> Result<NodeResolution, PipelineError> {
        let base = context.evaluation_context();
        let mut resolution = NodeResolution {
            placeholder: node.placeholder.clone(),
            targets: Vec::new(),
            warnings: Vec::new(),
        };

        let Some(parent) = node.context_placeholder.as_deref() else {
            let ids = self.evaluate(&node.placeholder, &node.scope, &base).await?;
            let (entities, warnings) = self.enrich(&node.placeholder, ids).await;
            resolution.targets = entities
                .into_iter()
                .map(|entity| (entity.id, TargetMetadata::direct(entity.name)))
                .collect();
            resolution.warnings = warnings;

            debug!(
                target: "pipeline::resolution",
                placeholder = %node.placeholder,
                resolved = resolution.targets.len(),
                "Resolved independent target"
            );
            return Ok(resolution);
        };

        // One evaluation per distinct parent entity.
        let mut seen = HashSet::new();
        let parents: Vec<EntityId> = manager
            .target_info(parent)
            .iter()
            .map(|target| target.entity_id.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        for parent_entity in parents {
            let scoped = base.with_target(parent, parent_entity.clone());
            let ids = self.evaluate(&node.placeholder, &node.scope, &scoped).await?;
            let (entities, warnings) = self.enrich(&node.placeholder, ids).await;

            resolution
                .targets
                .extend(entities.into_iter().map(|entity| {
                    let metadata =
                        TargetMetadata::from_context(entity.name, parent, parent_entity.clone());
                    (entity.id, metadata)
                }));
            resolution.warnings.extend(warnings);
        }

        debug!(
            target: "pipeline::resolution",
            placeholder = %node.placeholder,
            context_from = parent,
            resolved = resolution.targets.len(),
            "Resolved context-dependent target"
        );
        Ok(resolution)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Evaluates a scope, handling the built-in `none`/`self` scopes and
    /// dropping duplicate ids.
    async fn evaluate(
        &self,
        placeholder: &str,
        scope: &str,
        context: &EvaluationContext,
    ) -> Result<Vec<EntityId>, PipelineError> {
        let ids = match scope.trim() {
            SCOPE_NONE => Vec::new(),
            SCOPE_SELF => vec![context.actor.clone()],
            expression => self
                .scope_engine
                .evaluate(expression, context)
                .await
                .map_err(|source| PipelineError::ScopeEvaluation {
                    placeholder: placeholder.to_owned(),
                    source,
                })?,
        };

        let mut seen = HashSet::new();
        Ok(ids.into_iter().filter(|id| seen.insert(id.clone())).collect())
    }

    /// Looks up display names; ids missing from the store are dropped.
    async fn enrich(
        &self,
        placeholder: &str,
        ids: Vec<EntityId>,
    ) -> (Vec<Entity>, Vec<PipelineWarning>) {
        if ids.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let mut found = self.entity_store.get_entities_batch(&ids).await;
        let mut entities = Vec::with_capacity(ids.len());
        let mut warnings = Vec::new();

        for id in ids {
            match found.iter().position(|entity| entity.id == id) {
                Some(index) => entities.push(found.swap_remove(index)),
                None => {
                    warn!(
                        target: "pipeline::resolution",
                        placeholder,
                        entity = %id,
                        "Entity no longer exists, excluding it"
                    );
                    warnings.push(PipelineWarning::EntityVanished {
                        placeholder: placeholder.to_owned(),
                        entity_id: id,
                    });
                }
            }
        }

        (entities, warnings)
    }
}

#[async_trait]
impl Stage for MultiTargetResolutionStage {
    fn name(&self) -> &'static str {
        StageId::MultiTargetResolution.as_str()
    }

    async fn execute(&self, context: &PipelineContext) -> PipelineResult {
        if context.action.is_legacy() {
            self.resolve_legacy(context).await
        } else {
            self.resolve_multi(context).await
        }
    }
}
