//! Expansion of resolved target groups into concrete combinations.

use std::collections::BTreeMap;

use crate::entity::EntityId;
use crate::targets::ResolvedTarget;

/// Candidates for one placeholder.
///
/// A group with a `parent` only pairs targets whose `context_entity` is the
/// entity chosen for the parent group in the same combination.
#[derive(Clone, Debug)]
pub struct CombinationGroup<'a> {
    pub placeholder: &'a str,
    /// Index of the parent group; must precede this group.
    pub parent: Option<usize>,
    pub candidates: Vec<&'a ResolvedTarget>,
}

/// How groups are expanded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombinationMode {
    /// Row-major cartesian product (first group varies slowest), stopping at `limit`.
    Cartesian { limit: usize },
    /// One combination per candidate of the first group, paired with the
    /// first eligible candidate of every other group.
    Paired,
}

/// One entity per group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Combination<'a> {
    targets: Vec<&'a ResolvedTarget>,
}

impl<'a> Combination<'a> {
    pub fn targets(&self) -> &[&'a ResolvedTarget] {
        &self.targets
    }

    pub fn get(&self, placeholder: &str) -> Option<&'a ResolvedTarget> {
        self.targets
            .iter()
            .copied()
            .find(|target| target.placeholder_name == placeholder)
    }

    /// `placeholder -> entity id` for this combination.
    pub fn used_targets(&self) -> BTreeMap<String, EntityId> {
        self.targets
            .iter()
            .map(|target| (target.placeholder_name.clone(), target.entity_id.clone()))
            .collect()
    }
}

/// Result of [`generate_combinations`].
#[derive(Clone, Debug, Default)]
pub struct CombinationSet<'a> {
    pub combinations: Vec<Combination<'a>>,
    /// True if enumeration stopped at the limit with combinations left over.
    pub truncated: bool,
}

/// Expands `groups` according to `mode`.
///
/// An empty group list yields no combinations.
pub fn generate_combinations<'a>(
    groups: &[CombinationGroup<'a>],
    mode: CombinationMode,
) -> CombinationSet<'a> {
    let mut set = CombinationSet::default();
    if groups.is_empty() {
        return set;
    }

    match mode {
        CombinationMode::Cartesian { limit } => {
            let mut chosen = Vec::with_capacity(groups.len());
            expand(groups, &mut chosen, limit, &mut set);
        }
        CombinationMode::Paired => {
            for first in eligible(groups, 0, &[]) {
                let mut chosen = vec![first];
                for level in 1..groups.len() {
                    let next = eligible(groups, level, &chosen).next();
                    match next {
                        Some(target) => chosen.push(target),
                        None => break,
                    }
                }
                if chosen.len() == groups.len() {
                    set.combinations.push(Combination { targets: chosen });
                }
            }
        }
    }

    set
}

/// Depth-first, row-major enumeration. Returns false once the limit stops it.
fn expand<'a>(
    groups: &[CombinationGroup<'a>],
    chosen: &mut Vec<&'a ResolvedTarget>,
    limit: usize,
    set: &mut CombinationSet<'a>,
) -> bool {
    let level = chosen.len();
    if level == groups.len() {
        if set.combinations.len() >= limit {
            set.truncated = true;
            return false;
        }
        set.combinations.push(Combination {
            targets: chosen.clone(),
        });
        return true;
    }

    let candidates: Vec<_> = eligible(groups, level, chosen).collect();
    for target in candidates {
        chosen.push(target);
        let keep_going = expand(groups, chosen, limit, set);
        chosen.pop();
        if !keep_going {
            return false;
        }
    }
    true
}

fn eligible<'a, 'g>(
    groups: &'g [CombinationGroup<'a>],
    level: usize,
    chosen: &'g [&'a ResolvedTarget],
) -> impl Iterator<Item = &'a ResolvedTarget> + 'g {
    let group = &groups[level];
    let parent_entity = group
        .parent
        .and_then(|parent| chosen.get(parent))
        .map(|target| &target.entity_id);

    group.candidates.iter().copied().filter(move |candidate| {
        parent_entity.is_none_or(|parent| candidate.context_entity.as_ref() == Some(parent))
    })
}
