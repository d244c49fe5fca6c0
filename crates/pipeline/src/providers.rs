//! Asynchronous collaborators consumed by the resolution stage.
//!
//! The scope expression language and the entity/component store live outside
//! this crate. Runtime users plug in implementations of these traits; the
//! [`memory`](crate::memory) module provides fixtures.
use async_trait::async_trait;

use action_core::{Entity, EntityId};

use crate::context::EvaluationContext;
use crate::error::ScopeError;

/// Evaluates scope expressions to ordered lists of entity ids.
#[async_trait]
pub trait ScopeEngine: Send + Sync {
    /// Evaluate `expression` against `context`.
    ///
    /// An `Err` means the expression itself is defective; an empty list is a
    /// normal "nothing matched" result.
    async fn evaluate(
        &self,
        expression: &str,
        context: &EvaluationContext,
    ) -> Result<Vec<EntityId>, ScopeError>;
}

/// Read access to entities for existence checks and display names.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Returns the entity, or `None` if it no longer exists.
    async fn get_entity(&self, id: &EntityId) -> Option<Entity>;

    /// Batch lookup. Missing ids are simply absent from the result.
    ///
    /// The default implementation falls back to [`get_entity`](Self::get_entity).
    async fn get_entities_batch(&self, ids: &[EntityId]) -> Vec<Entity> {
        let mut entities = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.get_entity(id).await {
                entities.push(entity);
            }
        }
        entities
    }
}
