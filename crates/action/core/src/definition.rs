//! Static action definitions.
//!
//! An action either uses the legacy single-`scope` form (one implicit
//! placeholder) or declares a `targets` map whose entries may depend on each
//! other through `contextFrom`. Definitions are immutable for the duration of
//! a pipeline run.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DefinitionError;
use crate::format::Template;
use crate::graph::ResolutionPlan;

/// Placeholder bound by the legacy single-scope path.
pub const LEGACY_PLACEHOLDER: &str = "primary";

/// Legacy template token accepted as an alias of [`LEGACY_PLACEHOLDER`].
pub const LEGACY_TARGET_ALIAS: &str = "target";

/// Scope expression meaning "this action has no target".
pub const SCOPE_NONE: &str = "none";

/// Scope expression resolving to the acting entity itself.
pub const SCOPE_SELF: &str = "self";

// ============================================================================
// Target Specification
// ============================================================================

/// One entry of an action's `targets` map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    /// Scope expression handed to the scope engine.
    pub scope: String,

    /// Template token bound by this target. Defaults to the target key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Key of the target whose resolved entities form this target's context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_from: Option<String>,
}

impl TargetSpec {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            placeholder: None,
            context_from: None,
        }
    }

    /// Overrides the template token (builder pattern).
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Makes this target context-dependent on another target (builder pattern).
    #[must_use]
    pub fn with_context_from(mut self, target: impl Into<String>) -> Self {
        self.context_from = Some(target.into());
        self
    }

    /// Placeholder name, falling back to the target key.
    pub fn placeholder_or<'a>(&'a self, key: &'a str) -> &'a str {
        self.placeholder.as_deref().unwrap_or(key)
    }
}

// ============================================================================
// Ordered Target Map
// ============================================================================

/// Targets keyed by name, in declaration order.
///
/// Declaration order drives combination enumeration, so the map keeps the
/// order in which entries appear in the source document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetDefinitions(Vec<(String, TargetSpec)>);

impl TargetDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a target, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, spec: TargetSpec) {
        let key = key.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = spec,
            None => self.0.push((key, spec)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&TargetSpec> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, spec)| spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TargetSpec)> + '_ {
        self.0.iter().map(|(k, spec)| (k.as_str(), spec))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Placeholder names in declaration order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|(k, spec)| spec.placeholder_or(k))
    }
}

impl<K: Into<String>> FromIterator<(K, TargetSpec)> for TargetDefinitions {
    fn from_iter<I: IntoIterator<Item = (K, TargetSpec)>>(iter: I) -> Self {
        let mut targets = Self::new();
        for (key, spec) in iter {
            targets.insert(key, spec);
        }
        targets
    }
}

impl Serialize for TargetDefinitions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, spec) in &self.0 {
            map.serialize_entry(key, spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TargetDefinitions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = TargetDefinitions;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of target name to target specification")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut targets = TargetDefinitions::new();
                while let Some((key, spec)) = access.next_entry::<String, TargetSpec>()? {
                    if targets.get(&key).is_some() {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate target `{key}`"
                        )));
                    }
                    targets.0.push((key, spec));
                }
                Ok(targets)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

// ============================================================================
// Action Definition
// ============================================================================

/// Static description of an action and how its targets are found.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub id: String,

    /// Text with `{placeholder}` tokens, e.g. `"adjust {primary}'s {secondary}"`.
    pub template: String,

    /// Legacy single-target scope. Ignored when `targets` is non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "TargetDefinitions::is_empty")]
    pub targets: TargetDefinitions,

    /// Expand multiple placeholder groups into their cartesian product.
    #[serde(default)]
    pub generate_combinations: bool,

    /// Per-action cap on produced instances; the pipeline default applies if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_combinations: Option<usize>,
}

impl ActionDefinition {
    /// Creates a legacy single-scope action.
    pub fn legacy(
        id: impl Into<String>,
        template: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
            scope: Some(scope.into()),
            targets: TargetDefinitions::new(),
            generate_combinations: false,
            max_combinations: None,
        }
    }

    /// Creates a multi-target action with no targets yet.
    pub fn multi_target(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
            scope: None,
            targets: TargetDefinitions::new(),
            generate_combinations: false,
            max_combinations: None,
        }
    }

    /// Adds a target entry (builder pattern).
    #[must_use]
    pub fn with_target(mut self, key: impl Into<String>, spec: TargetSpec) -> Self {
        self.targets.insert(key, spec);
        self
    }

    #[must_use]
    pub fn with_combinations(mut self, generate: bool) -> Self {
        self.generate_combinations = generate;
        self
    }

    #[must_use]
    pub fn with_max_combinations(mut self, max: usize) -> Self {
        self.max_combinations = Some(max);
        self
    }

    /// True if the action uses the legacy single-scope form.
    pub fn is_legacy(&self) -> bool {
        self.targets.is_empty()
    }

    /// True for legacy actions whose scope is [`SCOPE_NONE`].
    pub fn is_untargeted(&self) -> bool {
        self.is_legacy() && self.scope.as_deref().map(str::trim) == Some(SCOPE_NONE)
    }

    /// True if any target is resolved from another target's context.
    pub fn has_dependencies(&self) -> bool {
        self.targets
            .iter()
            .any(|(_, spec)| spec.context_from.is_some())
    }

    /// Placeholder names that may appear in the template.
    pub fn declared_placeholders(&self) -> Vec<&str> {
        if self.is_legacy() {
            if self.is_untargeted() {
                Vec::new()
            } else {
                vec![LEGACY_PLACEHOLDER, LEGACY_TARGET_ALIAS]
            }
        } else {
            self.targets.placeholders().collect()
        }
    }

    /// Builds the topological resolution plan for the `targets` map.
    ///
    /// Legacy actions produce an empty plan.
    pub fn plan(&self) -> Result<ResolutionPlan, DefinitionError> {
        ResolutionPlan::build(self)
    }

    /// Checks everything that can be checked without evaluating scopes:
    /// target sources, the dependency graph, and template tokens.
    pub fn validate(&self) -> Result<ResolutionPlan, DefinitionError> {
        if self.is_legacy() {
            let has_scope = self
                .scope
                .as_deref()
                .is_some_and(|scope| !scope.trim().is_empty());
            if !has_scope {
                return Err(DefinitionError::NoTargetSource {
                    action: self.id.clone(),
                });
            }
        }

        let plan = self.plan()?;

        let template = Template::parse(&self.template)?;
        let declared = self.declared_placeholders();
        if let Some(token) = template
            .placeholders()
            .find(|token| !declared.contains(token))
        {
            return Err(DefinitionError::UndeclaredPlaceholder {
                action: self.id.clone(),
                placeholder: token.to_owned(),
            });
        }

        Ok(plan)
    }
}
