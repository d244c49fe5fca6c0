//! Resolved targets and the per-invocation [`TargetManager`].

mod manager;

pub use manager::{
    ResolutionMetadata, TargetDetail, TargetManager, TargetManagerSnapshot, TargetValidation,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// How a target was found.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResolutionMethod {
    /// Scope evaluated against the base context (actor + location).
    Direct,
    /// Scope evaluated once per entity of a parent target.
    Context,
}

/// Resolution details supplied alongside an entity when it is stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetMetadata {
    /// Display name, if one could be looked up.
    pub description: Option<String>,
    pub resolved_from_context: bool,
    /// Placeholder of the parent target.
    pub context_source: Option<String>,
    /// Parent entity the scope was evaluated against.
    pub context_entity: Option<EntityId>,
}

impl TargetMetadata {
    /// Metadata for a target resolved against the base context.
    pub fn direct(description: Option<String>) -> Self {
        Self {
            description,
            ..Self::default()
        }
    }

    /// Metadata for a target resolved from a parent entity.
    pub fn from_context(
        description: Option<String>,
        source: impl Into<String>,
        entity: EntityId,
    ) -> Self {
        Self {
            description,
            resolved_from_context: true,
            context_source: Some(source.into()),
            context_entity: Some(entity),
        }
    }
}

/// One entity bound to a placeholder. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTarget {
    pub placeholder_name: String,
    pub entity_id: EntityId,
    /// Display name; falls back to the entity id.
    pub description: String,
    pub resolved_from_context: bool,
    pub context_source: Option<String>,
    pub context_entity: Option<EntityId>,
    pub resolution_method: ResolutionMethod,
    pub timestamp: DateTime<Utc>,
}

impl ResolvedTarget {
    pub(crate) fn new(placeholder: String, entity_id: EntityId, metadata: TargetMetadata) -> Self {
        let description = metadata
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| entity_id.to_string());
        let resolution_method = if metadata.resolved_from_context {
            ResolutionMethod::Context
        } else {
            ResolutionMethod::Direct
        };

        Self {
            placeholder_name: placeholder,
            entity_id,
            description,
            resolved_from_context: metadata.resolved_from_context,
            context_source: metadata.context_source,
            context_entity: metadata.context_entity,
            resolution_method,
            timestamp: Utc::now(),
        }
    }

    /// Text substituted for this target's placeholder token.
    pub fn display_name(&self) -> &str {
        &self.description
    }
}
