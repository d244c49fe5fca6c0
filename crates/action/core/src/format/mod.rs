//! Formatting primitives: template substitution and combination generation.

mod combinations;
mod template;

pub use combinations::{
    Combination, CombinationGroup, CombinationMode, CombinationSet, generate_combinations,
};
pub use template::Template;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::definition::LEGACY_PLACEHOLDER;
use crate::entity::EntityId;
use crate::payload::AttemptActionPayload;

/// One player-facing action produced by the formatting stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedActionInstance {
    pub action_id: String,
    /// Template with every placeholder substituted.
    pub text: String,
    /// The combination that produced this instance.
    pub used_targets: BTreeMap<String, EntityId>,
}

impl FormattedActionInstance {
    /// Entity bound to the legacy primary placeholder, if any.
    pub fn primary_target(&self) -> Option<&EntityId> {
        self.used_targets
            .get(LEGACY_PLACEHOLDER)
            .or_else(|| self.used_targets.values().next())
    }

    /// Builds the attempt-action event payload for `actor`.
    pub fn attempt_payload(&self, actor: &EntityId) -> AttemptActionPayload {
        AttemptActionPayload {
            action_id: self.action_id.clone(),
            actor_id: actor.clone(),
            target_id: self.primary_target().cloned(),
            targets: self.used_targets.clone(),
            original_input: self.text.clone(),
        }
    }
}
