//! Event payload emitted when an actor attempts a formatted action.
//!
//! The payload carries both the flat legacy `targetId` and the full
//! placeholder map, so single-target consumers keep working unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptActionPayload {
    pub action_id: String,
    pub actor_id: EntityId,
    /// Primary target for legacy consumers; `null` for untargeted actions.
    pub target_id: Option<EntityId>,
    pub targets: BTreeMap<String, EntityId>,
    pub original_input: String,
}

impl AttemptActionPayload {
    pub fn is_multi_target(&self) -> bool {
        self.targets.len() > 1
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
