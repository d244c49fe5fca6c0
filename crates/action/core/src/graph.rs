//! Dependency graph over an action's targets.
//!
//! `contextFrom` edges form a forest: every target has at most one parent.
//! [`ResolutionPlan::build`] validates the graph up front (unknown references,
//! self-reference, cycles, duplicate placeholders) and produces a stable
//! topological order before any scope is evaluated.

use std::collections::HashSet;

use crate::definition::ActionDefinition;
use crate::error::DefinitionError;

/// One target in resolution order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanNode {
    /// Key of the target in the definition's `targets` map.
    pub key: String,
    /// Placeholder the target binds in the template and the target manager.
    pub placeholder: String,
    pub scope: String,
    /// Key of the parent target, if context-dependent.
    pub context_from: Option<String>,
    /// Placeholder of the parent target, if context-dependent.
    pub context_placeholder: Option<String>,
    /// Number of `contextFrom` hops to a root target.
    pub depth: usize,
    /// Position of the target in the definition.
    pub declaration_index: usize,
}

/// Validated, topologically ordered targets of an action.
///
/// Among targets whose parents are already placed, the earliest declared one
/// comes first, so a declaration order that already respects dependencies is
/// preserved unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolutionPlan {
    nodes: Vec<PlanNode>,
}

impl ResolutionPlan {
    pub fn build(definition: &ActionDefinition) -> Result<Self, DefinitionError> {
        let action = definition.id.as_str();
        let targets: Vec<_> = definition.targets.iter().collect();

        let mut seen_placeholders = HashSet::new();
        for (key, spec) in &targets {
            let placeholder = spec.placeholder_or(key);
            if placeholder.trim().is_empty() {
                return Err(DefinitionError::BlankField {
                    action: action.to_owned(),
                    target: (*key).to_owned(),
                    field: "placeholder",
                });
            }
            if spec.scope.trim().is_empty() {
                return Err(DefinitionError::BlankField {
                    action: action.to_owned(),
                    target: (*key).to_owned(),
                    field: "scope",
                });
            }
            if !seen_placeholders.insert(placeholder) {
                return Err(DefinitionError::DuplicatePlaceholder {
                    action: action.to_owned(),
                    placeholder: placeholder.to_owned(),
                });
            }
            if let Some(parent) = spec.context_from.as_deref() {
                if parent == *key {
                    return Err(DefinitionError::SelfReference {
                        action: action.to_owned(),
                        target: (*key).to_owned(),
                    });
                }
                if definition.targets.get(parent).is_none() {
                    return Err(DefinitionError::UnknownContextSource {
                        action: action.to_owned(),
                        target: (*key).to_owned(),
                        missing: parent.to_owned(),
                    });
                }
            }
        }

        let mut nodes: Vec<PlanNode> = Vec::with_capacity(targets.len());
        let mut placed = vec![false; targets.len()];

        while nodes.len() < targets.len() {
            let next = targets.iter().enumerate().find(|(index, (_, spec))| {
                !placed[*index]
                    && spec
                        .context_from
                        .as_deref()
                        .is_none_or(|parent| nodes.iter().any(|node| node.key == parent))
            });

            let Some((index, (key, spec))) = next else {
                let remaining: Vec<&str> = targets
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| !placed[*index])
                    .map(|(_, (key, _))| *key)
                    .collect();
                return Err(DefinitionError::CyclicDependency {
                    action: action.to_owned(),
                    cycle: find_cycle(definition, &remaining),
                });
            };

            let parent = spec
                .context_from
                .as_deref()
                .and_then(|parent| nodes.iter().find(|node| node.key == parent));

            nodes.push(PlanNode {
                key: (*key).to_owned(),
                placeholder: spec.placeholder_or(key).to_owned(),
                scope: spec.scope.clone(),
                context_from: parent.map(|p| p.key.clone()),
                context_placeholder: parent.map(|p| p.placeholder.clone()),
                depth: parent.map_or(0, |p| p.depth + 1),
                declaration_index: index,
            });
            placed[index] = true;
        }

        Ok(Self { nodes })
    }

    /// Targets in resolution order.
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_by_placeholder(&self, placeholder: &str) -> Option<&PlanNode> {
        self.nodes.iter().find(|node| node.placeholder == placeholder)
    }

    /// Groups targets by depth. Targets within one level never depend on
    /// each other and may be resolved concurrently.
    pub fn levels(&self) -> Vec<Vec<&PlanNode>> {
        let max_depth = self.nodes.iter().map(|node| node.depth).max();
        let Some(max_depth) = max_depth else {
            return Vec::new();
        };
        (0..=max_depth)
            .map(|depth| self.nodes.iter().filter(|node| node.depth == depth).collect())
            .collect()
    }

    /// Returns the given placeholders plus all of their `contextFrom`
    /// ancestors, in plan order.
    pub fn closure<'a, I>(&self, placeholders: I) -> Vec<&PlanNode>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut wanted: HashSet<&str> = HashSet::new();
        for placeholder in placeholders {
            let mut current = self.node_by_placeholder(placeholder);
            while let Some(node) = current {
                if !wanted.insert(node.placeholder.as_str()) {
                    break;
                }
                current = node
                    .context_placeholder
                    .as_deref()
                    .and_then(|parent| self.node_by_placeholder(parent));
            }
        }
        self.nodes
            .iter()
            .filter(|node| wanted.contains(node.placeholder.as_str()))
            .collect()
    }
}

/// Walks parent links from the first unplaced target until a key repeats.
fn find_cycle(definition: &ActionDefinition, remaining: &[&str]) -> Vec<String> {
    let Some(start) = remaining.first() else {
        return Vec::new();
    };

    let mut path: Vec<&str> = Vec::new();
    let mut current = *start;
    loop {
        if let Some(position) = path.iter().position(|key| *key == current) {
            return path[position..].iter().map(|key| (*key).to_owned()).collect();
        }
        path.push(current);
        match definition
            .targets
            .get(current)
            .and_then(|spec| spec.context_from.as_deref())
        {
            Some(parent) => current = parent,
            None => return remaining.iter().map(|key| (*key).to_owned()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::TargetSpec;

    fn keys(plan: &ResolutionPlan) -> Vec<&str> {
        plan.nodes().iter().map(|node| node.key.as_str()).collect()
    }

    #[test]
    fn declaration_order_is_kept_when_consistent() {
        let def = ActionDefinition::multi_target("a", "")
            .with_target("primary", TargetSpec::new("p"))
            .with_target("secondary", TargetSpec::new("s").with_context_from("primary"))
            .with_target("tertiary", TargetSpec::new("t"));

        let plan = def.plan().unwrap();
        assert_eq!(keys(&plan), vec!["primary", "secondary", "tertiary"]);
        assert_eq!(plan.nodes()[1].depth, 1);
        assert_eq!(plan.nodes()[1].context_placeholder.as_deref(), Some("primary"));
    }

    #[test]
    fn dependents_declared_first_are_moved_after_their_parent() {
        let def = ActionDefinition::multi_target("a", "")
            .with_target("garment", TargetSpec::new("g").with_context_from("person"))
            .with_target("person", TargetSpec::new("p"));

        let plan = def.plan().unwrap();
        assert_eq!(keys(&plan), vec!["person", "garment"]);
        assert_eq!(plan.nodes()[1].declaration_index, 0);
    }

    #[test]
    fn levels_group_independent_targets() {
        let def = ActionDefinition::multi_target("a", "")
            .with_target("a", TargetSpec::new("x"))
            .with_target("b", TargetSpec::new("x"))
            .with_target("c", TargetSpec::new("x").with_context_from("a"))
            .with_target("d", TargetSpec::new("x").with_context_from("c"));

        let plan = def.plan().unwrap();
        let levels: Vec<Vec<&str>> = plan
            .levels()
            .iter()
            .map(|level| level.iter().map(|node| node.key.as_str()).collect())
            .collect();
        assert_eq!(levels, vec![vec!["a", "b"], vec!["c"], vec!["d"]]);
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        let def = ActionDefinition::multi_target("loop", "")
            .with_target("a", TargetSpec::new("x").with_context_from("b"))
            .with_target("b", TargetSpec::new("x").with_context_from("a"));

        match def.plan() {
            Err(DefinitionError::CyclicDependency { action, cycle }) => {
                assert_eq!(action, "loop");
                assert_eq!(cycle, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn cycle_behind_a_valid_root_is_rejected() {
        let def = ActionDefinition::multi_target("loop", "")
            .with_target("root", TargetSpec::new("x"))
            .with_target("a", TargetSpec::new("x").with_context_from("c"))
            .with_target("b", TargetSpec::new("x").with_context_from("a"))
            .with_target("c", TargetSpec::new("x").with_context_from("b"));

        assert!(matches!(
            def.plan(),
            Err(DefinitionError::CyclicDependency { cycle, .. }) if cycle.len() == 3
        ));
    }

    #[test]
    fn self_reference_is_rejected() {
        let def = ActionDefinition::multi_target("a", "")
            .with_target("primary", TargetSpec::new("x").with_context_from("primary"));

        assert!(matches!(
            def.plan(),
            Err(DefinitionError::SelfReference { target, .. }) if target == "primary"
        ));
    }

    #[test]
    fn unknown_context_source_is_rejected() {
        let def = ActionDefinition::multi_target("a", "")
            .with_target("secondary", TargetSpec::new("x").with_context_from("primary"));

        assert!(matches!(
            def.plan(),
            Err(DefinitionError::UnknownContextSource { missing, .. }) if missing == "primary"
        ));
    }

    #[test]
    fn duplicate_placeholder_is_rejected() {
        let def = ActionDefinition::multi_target("a", "")
            .with_target("primary", TargetSpec::new("x").with_placeholder("item"))
            .with_target("secondary", TargetSpec::new("y").with_placeholder("item"));

        assert!(matches!(
            def.plan(),
            Err(DefinitionError::DuplicatePlaceholder { placeholder, .. }) if placeholder == "item"
        ));
    }

    #[test]
    fn closure_includes_ancestors() {
        let def = ActionDefinition::multi_target("a", "")
            .with_target("person", TargetSpec::new("p"))
            .with_target("garment", TargetSpec::new("g").with_context_from("person"))
            .with_target("other", TargetSpec::new("o"));

        let plan = def.plan().unwrap();
        let closure: Vec<&str> = plan
            .closure(["garment"])
            .iter()
            .map(|node| node.placeholder.as_str())
            .collect();
        assert_eq!(closure, vec!["person", "garment"]);
    }
}
