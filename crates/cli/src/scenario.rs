//! Scenario files: a fixed world snapshot plus the actions to run against it.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use action_core::{ActionDefinition, Entity, EntityId};
use action_pipeline::{InMemoryEntityStore, ScopeEntry, StaticScopeEngine};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub actor: EntityId,
    #[serde(default)]
    pub location: Option<EntityId>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Scope table answering every expression the actions use
    #[serde(default)]
    pub scopes: Vec<ScopeEntry>,
    pub actions: Vec<ActionDefinition>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse scenario: {}", path.display()))
    }

    pub fn entity_store(&self) -> InMemoryEntityStore {
        self.entities.iter().cloned().collect()
    }

    pub fn scope_engine(&self) -> StaticScopeEngine {
        StaticScopeEngine::from_entries(self.scopes.iter().cloned())
    }

    /// Actions to run: all of them, or just the one with `id`.
    pub fn select(&self, id: Option<&str>) -> Result<Vec<&ActionDefinition>> {
        match id {
            None => Ok(self.actions.iter().collect()),
            Some(id) => {
                let action = self
                    .actions
                    .iter()
                    .find(|action| action.id == id)
                    .with_context(|| format!("No action `{id}` in scenario"))?;
                Ok(vec![action])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCENARIO: &str = r#"{
        "actor": "hero",
        "location": "workshop",
        "entities": [
            { "id": "hammer", "name": "Hammer" },
            { "id": "chest" }
        ],
        "scopes": [
            { "expression": "actor.inventory.tools[]", "results": ["hammer"] },
            { "expression": "location.containers[]", "target": "hammer", "results": ["chest"] }
        ],
        "actions": [
            {
                "id": "items:use_on",
                "template": "use {tool} on {container}",
                "targets": {
                    "primary": { "scope": "actor.inventory.tools[]", "placeholder": "tool" },
                    "secondary": {
                        "scope": "location.containers[]",
                        "placeholder": "container",
                        "contextFrom": "primary"
                    }
                }
            },
            { "id": "core:wait", "template": "wait", "scope": "none" }
        ]
    }"#;

    fn write_scenario(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_scenario_file() {
        let file = write_scenario(SCENARIO);
        let scenario = Scenario::load(file.path()).unwrap();

        assert_eq!(scenario.actor, EntityId::new("hero"));
        assert_eq!(scenario.entities.len(), 2);
        assert_eq!(scenario.scopes.len(), 2);
        assert_eq!(
            scenario.actions[0].targets.keys().collect::<Vec<_>>(),
            vec!["primary", "secondary"]
        );
        assert_eq!(scenario.entity_store().len(), 2);
    }

    #[test]
    fn selects_actions_by_id() {
        let file = write_scenario(SCENARIO);
        let scenario = Scenario::load(file.path()).unwrap();

        assert_eq!(scenario.select(None).unwrap().len(), 2);
        assert_eq!(scenario.select(Some("core:wait")).unwrap()[0].template, "wait");
        assert!(scenario.select(Some("core:dance")).is_err());
    }

    #[test]
    fn malformed_scenario_reports_path() {
        let file = write_scenario("{ \"actor\": ");
        let err = Scenario::load(file.path()).unwrap_err();

        assert!(err.to_string().contains("Failed to parse scenario"));
    }

    #[tokio::test]
    async fn scenario_runs_through_standard_pipeline() {
        use action_pipeline::{Pipeline, PipelineConfig, PipelineContext};
        use std::sync::Arc;

        let file = write_scenario(SCENARIO);
        let scenario = Scenario::load(file.path()).unwrap();
        let pipeline = Pipeline::standard(
            Arc::new(scenario.scope_engine()),
            Arc::new(scenario.entity_store()),
            PipelineConfig::default(),
        );

        let outcome = pipeline
            .run(PipelineContext::new(
                scenario.actions[0].clone(),
                scenario.actor.clone(),
            ))
            .await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.formatted_actions()[0].text, "use Hammer on chest");
    }
}
