//! In-memory collaborators for fixtures, scenario files and tests.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use action_core::{Entity, EntityId};

use crate::context::EvaluationContext;
use crate::error::ScopeError;
use crate::providers::{EntityStore, ScopeEngine};

// ============================================================================
// Entity Store
// ============================================================================

/// Entity store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    entities: HashMap<EntityId, Entity>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Adds a named entity (builder pattern).
    #[must_use]
    pub fn with_entity(mut self, id: &str, name: &str) -> Self {
        self.insert(Entity::new(id).with_name(name));
        self
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<Entity> {
        self.entities.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl FromIterator<Entity> for InMemoryEntityStore {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut store = Self::new();
        for entity in iter {
            store.insert(entity);
        }
        store
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn get_entity(&self, id: &EntityId) -> Option<Entity> {
        self.entities.get(id).cloned()
    }

    async fn get_entities_batch(&self, ids: &[EntityId]) -> Vec<Entity> {
        ids.iter()
            .filter_map(|id| self.entities.get(id).cloned())
            .collect()
    }
}

// ============================================================================
// Scope Engine
// ============================================================================

/// One row of a [`StaticScopeEngine`] table, as written in scenario files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeEntry {
    pub expression: String,
    /// Contextual target this row applies to; `None` matches any context.
    #[serde(default)]
    pub target: Option<EntityId>,
    #[serde(default)]
    pub results: Vec<EntityId>,
    /// If set, evaluating this row fails with the given reason.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
enum Outcome {
    Entities(Vec<EntityId>),
    Failure(String),
}

/// Scope engine answering from a fixed lookup table.
///
/// Rows keyed by a contextual target take precedence over the row without
/// one. Unknown expressions are treated as defects and fail.
#[derive(Debug, Default)]
pub struct StaticScopeEngine {
    table: HashMap<(String, Option<EntityId>), Outcome>,
    evaluations: AtomicUsize,
}

impl StaticScopeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = ScopeEntry>) -> Self {
        let mut engine = Self::new();
        for entry in entries {
            let outcome = match entry.error {
                Some(reason) => Outcome::Failure(reason),
                None => Outcome::Entities(entry.results),
            };
            engine.table.insert((entry.expression, entry.target), outcome);
        }
        engine
    }

    /// Rows for `expression` regardless of context (builder pattern).
    #[must_use]
    pub fn with_scope(mut self, expression: &str, ids: &[&str]) -> Self {
        self.table
            .insert((expression.to_owned(), None), Outcome::Entities(to_ids(ids)));
        self
    }

    /// Rows for `expression` when `target` is the contextual target.
    #[must_use]
    pub fn with_contextual_scope(mut self, expression: &str, target: &str, ids: &[&str]) -> Self {
        self.table.insert(
            (expression.to_owned(), Some(EntityId::new(target))),
            Outcome::Entities(to_ids(ids)),
        );
        self
    }

    /// Makes `expression` fail to evaluate.
    #[must_use]
    pub fn with_failure(mut self, expression: &str, reason: &str) -> Self {
        self.table.insert(
            (expression.to_owned(), None),
            Outcome::Failure(reason.to_owned()),
        );
        self
    }

    /// Number of `evaluate` calls served so far.
    pub fn evaluation_count(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ScopeEngine for StaticScopeEngine {
    async fn evaluate(
        &self,
        expression: &str,
        context: &EvaluationContext,
    ) -> Result<Vec<EntityId>, ScopeError> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let contextual = context
            .target
            .as_ref()
            .and_then(|target| {
                self.table
                    .get(&(expression.to_owned(), Some(target.entity.clone())))
            });
        let outcome = contextual.or_else(|| self.table.get(&(expression.to_owned(), None)));

        match outcome {
            Some(Outcome::Entities(ids)) => Ok(ids.clone()),
            Some(Outcome::Failure(reason)) => Err(ScopeError::new(expression, reason.clone())),
            None => Err(ScopeError::new(expression, "unknown scope expression")),
        }
    }
}

fn to_ids(ids: &[&str]) -> Vec<EntityId> {
    ids.iter().copied().map(EntityId::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn contextual_rows_take_precedence() {
        let engine = StaticScopeEngine::new()
            .with_scope("location.containers[]", &["barrel"])
            .with_contextual_scope("location.containers[]", "hammer", &["chest"]);

        let base = EvaluationContext::new(EntityId::new("hero"), None);
        let with_hammer = base.with_target("primary", EntityId::new("hammer"));
        let with_saw = base.with_target("primary", EntityId::new("saw"));

        assert_eq!(
            engine.evaluate("location.containers[]", &with_hammer).await,
            Ok(vec![EntityId::new("chest")])
        );
        assert_eq!(
            engine.evaluate("location.containers[]", &with_saw).await,
            Ok(vec![EntityId::new("barrel")])
        );
        assert_eq!(engine.evaluation_count(), 2);
    }

    #[tokio::test]
    async fn unknown_and_failing_scopes_error() {
        let engine = StaticScopeEngine::new().with_failure("broken[", "unexpected end of input");
        let context = EvaluationContext::new(EntityId::new("hero"), None);

        let err = engine.evaluate("broken[", &context).await.unwrap_err();
        assert_eq!(err.reason, "unexpected end of input");
        assert!(engine.evaluate("missing", &context).await.is_err());
    }

    #[tokio::test]
    async fn batch_lookup_drops_missing_entities() {
        let store = InMemoryEntityStore::new()
            .with_entity("hammer", "Hammer")
            .with_entity("saw", "Saw");

        let found = store
            .get_entities_batch(&[EntityId::new("saw"), EntityId::new("ghost")])
            .await;
        assert_eq!(found, vec![Entity::new("saw").with_name("Saw")]);
        assert!(store.get_entity(&EntityId::new("ghost")).await.is_none());
    }

    #[test]
    fn scope_entries_deserialize_with_defaults() {
        let entries: Vec<ScopeEntry> = serde_json::from_str(
            r#"[
                { "expression": "actor.inventory.tools[]", "results": ["hammer", "saw"] },
                { "expression": "location.containers[]", "target": "saw", "results": [] },
                { "expression": "broken[", "error": "parse error" }
            ]"#,
        )
        .unwrap();

        assert_eq!(entries[0].target, None);
        assert_eq!(entries[1].target, Some(EntityId::new("saw")));
        assert_eq!(entries[2].error.as_deref(), Some("parse error"));

        let engine = StaticScopeEngine::from_entries(entries);
        assert_eq!(engine.table.len(), 3);
    }
}
