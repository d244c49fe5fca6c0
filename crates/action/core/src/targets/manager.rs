//! Per-invocation store of resolved targets.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ResolvedTarget, TargetMetadata};
use crate::definition::LEGACY_PLACEHOLDER;
use crate::entity::EntityId;
use crate::error::TargetError;

/// Bookkeeping for one resolution phase.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionMetadata {
    pub expected_placeholders: usize,
    /// Number of target records added (all placeholders).
    pub resolved_targets: usize,
    /// Number of target records resolved from a parent's context.
    pub context_dependent_targets: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

/// Per-placeholder line of a [`TargetValidation`] report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDetail {
    pub placeholder: String,
    pub resolved_count: usize,
}

/// Outcome of [`TargetManager::validate_required_targets`].
///
/// `valid` is false exactly when `missing` is non-empty. The caller decides
/// whether a missing target is fatal, skippable, or optional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetValidation {
    pub valid: bool,
    pub resolved: Vec<String>,
    pub missing: Vec<String>,
    pub details: Vec<TargetDetail>,
}

/// Accumulates resolved targets keyed by placeholder.
///
/// Created fresh for every pipeline run, populated by the resolution stage
/// and read by the formatting stage. Each placeholder may hold zero, one, or
/// many targets; single-valued accessors return the first one added.
#[derive(Clone, Debug, Default)]
pub struct TargetManager {
    targets: HashMap<String, Vec<ResolvedTarget>>,
    // Placeholders in the order their first target was added.
    order: Vec<String>,
    metadata: ResolutionMetadata,
}

impl TargetManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Resolution lifecycle
    // ------------------------------------------------------------------------

    /// Opens the resolution phase.
    pub fn start_resolution(&mut self, expected_placeholders: usize) {
        self.metadata.expected_placeholders = expected_placeholders;
        self.metadata.started_at = Some(Utc::now());
        self.metadata.completed_at = None;
        self.metadata.duration_ms = None;
        debug!(
            target: "action_core::targets",
            expected = expected_placeholders,
            "Target resolution started"
        );
    }

    /// Closes the resolution phase and records its duration.
    ///
    /// Calling this without [`start_resolution`](Self::start_resolution)
    /// only logs a warning.
    pub fn complete_resolution(&mut self) {
        let completed_at = Utc::now();
        self.metadata.completed_at = Some(completed_at);

        match self.metadata.started_at {
            Some(started_at) => {
                let duration = (completed_at - started_at).num_milliseconds();
                self.metadata.duration_ms = Some(duration);
                debug!(
                    target: "action_core::targets",
                    duration_ms = duration,
                    resolved = self.metadata.resolved_targets,
                    placeholders = self.order.len(),
                    "Target resolution completed"
                );
            }
            None => {
                warn!(
                    target: "action_core::targets",
                    "complete_resolution called without start_resolution"
                );
            }
        }
    }

    pub fn metadata(&self) -> &ResolutionMetadata {
        &self.metadata
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Appends one resolved entity under `placeholder`.
    pub fn add_resolved_target(
        &mut self,
        placeholder: &str,
        entity_id: EntityId,
        metadata: TargetMetadata,
    ) -> Result<(), TargetError> {
        if placeholder.trim().is_empty() {
            return Err(TargetError::BlankPlaceholder);
        }
        if entity_id.is_blank() {
            return Err(TargetError::BlankEntityId {
                placeholder: placeholder.to_owned(),
            });
        }

        let from_context = metadata.resolved_from_context;
        let target = ResolvedTarget::new(placeholder.to_owned(), entity_id, metadata);

        debug!(
            target: "action_core::targets",
            placeholder,
            entity = %target.entity_id,
            method = %target.resolution_method,
            "Resolved target added"
        );

        match self.targets.get_mut(placeholder) {
            Some(list) => list.push(target),
            None => {
                self.order.push(placeholder.to_owned());
                self.targets.insert(placeholder.to_owned(), vec![target]);
            }
        }

        self.metadata.resolved_targets += 1;
        if from_context {
            self.metadata.context_dependent_targets += 1;
        }
        Ok(())
    }

    /// Resets all state so the manager can be reused.
    pub fn clear(&mut self) {
        self.targets.clear();
        self.order.clear();
        self.metadata = ResolutionMetadata::default();
        debug!(target: "action_core::targets", "Target manager cleared");
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// First entity resolved for `placeholder`.
    pub fn entity_id_by_placeholder(&self, placeholder: &str) -> Option<&EntityId> {
        self.targets
            .get(placeholder)
            .and_then(|list| list.first())
            .map(|target| &target.entity_id)
    }

    /// All targets resolved for `placeholder`, in insertion order.
    pub fn target_info(&self, placeholder: &str) -> &[ResolvedTarget] {
        self.targets
            .get(placeholder)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Flat `placeholder -> first entity id` mapping for legacy payloads.
    pub fn target_mappings(&self) -> BTreeMap<String, EntityId> {
        self.order
            .iter()
            .filter_map(|placeholder| {
                self.entity_id_by_placeholder(placeholder)
                    .map(|id| (placeholder.clone(), id.clone()))
            })
            .collect()
    }

    /// Every target across all placeholders, grouped by placeholder in the
    /// order placeholders were first resolved.
    pub fn resolved_targets(&self) -> Vec<&ResolvedTarget> {
        self.order
            .iter()
            .filter_map(|placeholder| self.targets.get(placeholder))
            .flatten()
            .collect()
    }

    /// Sorted placeholder names with at least one resolved target.
    pub fn available_placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .targets
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn has_resolved_target(&self, placeholder: &str) -> bool {
        self.targets
            .get(placeholder)
            .is_some_and(|list| !list.is_empty())
    }

    /// True if any stored target was resolved from a parent's context.
    pub fn has_context_dependencies(&self) -> bool {
        self.targets
            .values()
            .flatten()
            .any(|target| target.resolved_from_context)
    }

    /// The `primary` placeholder's first entity, or the first entity of the
    /// earliest resolved placeholder.
    pub fn primary_target(&self) -> Option<&EntityId> {
        self.entity_id_by_placeholder(LEGACY_PLACEHOLDER).or_else(|| {
            self.order
                .first()
                .and_then(|placeholder| self.entity_id_by_placeholder(placeholder))
        })
    }

    /// True if more than one placeholder holds targets.
    pub fn is_multi_target(&self) -> bool {
        self.order.len() > 1
    }

    /// Total number of stored target records.
    pub fn target_count(&self) -> usize {
        self.targets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.target_count() == 0
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Reports which of `required` have at least one resolved target.
    pub fn validate_required_targets<I, S>(&self, required: I) -> TargetValidation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolved = Vec::new();
        let mut missing = Vec::new();
        let mut details = Vec::new();

        for placeholder in required {
            let placeholder = placeholder.as_ref();
            let count = self.target_info(placeholder).len();
            details.push(TargetDetail {
                placeholder: placeholder.to_owned(),
                resolved_count: count,
            });
            if count > 0 {
                resolved.push(placeholder.to_owned());
            } else {
                missing.push(placeholder.to_owned());
            }
        }

        TargetValidation {
            valid: missing.is_empty(),
            resolved,
            missing,
            details,
        }
    }

    /// Serializable copy of the manager's content.
    pub fn snapshot(&self) -> TargetManagerSnapshot {
        TargetManagerSnapshot {
            targets: self
                .targets
                .iter()
                .map(|(name, list)| (name.clone(), list.clone()))
                .collect(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Serializable view of a [`TargetManager`], attached to event payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetManagerSnapshot {
    pub targets: BTreeMap<String, Vec<ResolvedTarget>>,
    pub metadata: ResolutionMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::ResolutionMethod;

    fn id(value: &str) -> EntityId {
        EntityId::new(value)
    }

    #[test]
    fn first_write_wins_for_flat_mappings() {
        let mut manager = TargetManager::new();
        manager
            .add_resolved_target("primary", id("hammer"), TargetMetadata::direct(None))
            .unwrap();
        manager
            .add_resolved_target("primary", id("saw"), TargetMetadata::direct(None))
            .unwrap();
        manager
            .add_resolved_target("secondary", id("chest"), TargetMetadata::direct(None))
            .unwrap();

        let mappings = manager.target_mappings();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings["primary"], id("hammer"));
        assert_eq!(mappings["secondary"], id("chest"));
        assert_eq!(manager.entity_id_by_placeholder("primary"), Some(&id("hammer")));
        assert_eq!(manager.target_info("primary").len(), 2);
        assert_eq!(manager.target_count(), 3);
    }

    #[test]
    fn rejects_blank_placeholder_and_entity() {
        let mut manager = TargetManager::new();

        assert_eq!(
            manager.add_resolved_target("  ", id("a"), TargetMetadata::default()),
            Err(TargetError::BlankPlaceholder)
        );
        assert!(matches!(
            manager.add_resolved_target("primary", id(""), TargetMetadata::default()),
            Err(TargetError::BlankEntityId { .. })
        ));
        assert!(manager.is_empty());
        assert_eq!(manager.metadata().resolved_targets, 0);
    }

    #[test]
    fn validation_reports_exactly_the_missing_placeholders() {
        let mut manager = TargetManager::new();
        manager
            .add_resolved_target("primary", id("hammer"), TargetMetadata::direct(None))
            .unwrap();

        let report = manager.validate_required_targets(["primary", "secondary", "tertiary"]);
        assert!(!report.valid);
        assert_eq!(report.resolved, vec!["primary"]);
        assert_eq!(report.missing, vec!["secondary", "tertiary"]);
        assert_eq!(report.details[0].resolved_count, 1);
        assert_eq!(report.details[1].resolved_count, 0);

        let report = manager.validate_required_targets(["primary"]);
        assert!(report.valid);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn tracks_context_dependencies() {
        let mut manager = TargetManager::new();
        manager.start_resolution(2);
        manager
            .add_resolved_target("person", id("alice"), TargetMetadata::direct(Some("Alice".into())))
            .unwrap();
        assert!(!manager.has_context_dependencies());

        manager
            .add_resolved_target(
                "garment",
                id("shirt"),
                TargetMetadata::from_context(None, "person", id("alice")),
            )
            .unwrap();
        manager.complete_resolution();

        assert!(manager.has_context_dependencies());
        let garment = &manager.target_info("garment")[0];
        assert_eq!(garment.resolution_method, ResolutionMethod::Context);
        assert_eq!(garment.context_source.as_deref(), Some("person"));
        assert_eq!(garment.context_entity, Some(id("alice")));
        assert_eq!(garment.description, "shirt");

        let metadata = manager.metadata();
        assert_eq!(metadata.expected_placeholders, 2);
        assert_eq!(metadata.resolved_targets, 2);
        assert_eq!(metadata.context_dependent_targets, 1);
        assert!(metadata.duration_ms.is_some());
    }

    #[test]
    fn complete_without_start_does_not_panic() {
        let mut manager = TargetManager::new();
        manager.complete_resolution();
        assert!(manager.metadata().completed_at.is_some());
        assert!(manager.metadata().duration_ms.is_none());
    }

    #[test]
    fn placeholders_are_sorted_and_primary_is_preferred() {
        let mut manager = TargetManager::new();
        manager
            .add_resolved_target("tool", id("saw"), TargetMetadata::direct(None))
            .unwrap();
        manager
            .add_resolved_target("primary", id("bob"), TargetMetadata::direct(None))
            .unwrap();

        assert_eq!(manager.available_placeholders(), vec!["primary", "tool"]);
        assert_eq!(manager.primary_target(), Some(&id("bob")));
        assert!(manager.is_multi_target());

        let flattened: Vec<&str> = manager
            .resolved_targets()
            .iter()
            .map(|target| target.placeholder_name.as_str())
            .collect();
        assert_eq!(flattened, vec!["tool", "primary"]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut manager = TargetManager::new();
        manager.start_resolution(1);
        manager
            .add_resolved_target("primary", id("a"), TargetMetadata::direct(None))
            .unwrap();
        manager.clear();

        assert!(manager.is_empty());
        assert!(!manager.has_resolved_target("primary"));
        assert!(manager.available_placeholders().is_empty());
        assert_eq!(manager.metadata(), &ResolutionMetadata::default());
        assert_eq!(manager.primary_target(), None);
    }

    #[test]
    fn snapshot_serializes_with_camel_case_keys() {
        let mut manager = TargetManager::new();
        manager.start_resolution(2);
        manager
            .add_resolved_target("person", id("alice"), TargetMetadata::direct(Some("Alice".into())))
            .unwrap();
        manager
            .add_resolved_target(
                "garment",
                id("coat"),
                TargetMetadata::from_context(None, "person", id("alice")),
            )
            .unwrap();
        manager.complete_resolution();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.targets.len(), 2);
        assert_eq!(snapshot.targets["person"][0].description, "Alice");

        let json = serde_json::to_value(&snapshot).unwrap();
        let garment = &json["targets"]["garment"][0];
        assert_eq!(garment["placeholderName"], "garment");
        assert_eq!(garment["entityId"], "coat");
        assert_eq!(garment["resolvedFromContext"], true);
        assert_eq!(garment["contextSource"], "person");
        assert_eq!(garment["contextEntity"], "alice");
        assert_eq!(garment["resolutionMethod"], "context");
        assert!(garment["timestamp"].is_string());

        let metadata = &json["metadata"];
        assert_eq!(metadata["expectedPlaceholders"], 2);
        assert_eq!(metadata["resolvedTargets"], 2);
        assert_eq!(metadata["contextDependentTargets"], 1);
        assert!(metadata["durationMs"].is_number());

        let restored: TargetManagerSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(restored, snapshot);
    }
}
