//! Keyword filtering and view projection over the rule collection
//!
//! The collection itself is never touched: [`filter_chains`] returns a new
//! list, and [`RuleView`] is rebuilt from the full collection every time
//! the keyword or view mode changes.

use crate::core::model::{Chain, Rule};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How rules are grouped for display
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Rules grouped under their owning chain
    #[default]
    #[strum(serialize = "chain")]
    Chain,
    /// Rules from every chain regrouped by target
    #[strum(serialize = "target")]
    Target,
}

/// Returns `true` if any searchable field of `rule` contains `needle`.
///
/// `needle` must already be lower-case.
fn rule_matches(rule: &Rule, needle: &str) -> bool {
    let contains = |text: &str| text.to_lowercase().contains(needle);

    [
        &rule.target,
        &rule.protocol,
        &rule.option,
        &rule.source,
        &rule.destination,
        &rule.raw,
    ]
    .into_iter()
    .any(|field| contains(field))
        || rule.details.iter().any(|d| contains(&d.search_text()))
}

/// Keeps the rules matching `keyword` and the chains that still have any.
///
/// Matching is a case-insensitive substring test over target, protocol,
/// option, addresses, raw text and every detail. An empty keyword returns
/// the collection unchanged. Order is preserved throughout.
pub fn filter_chains(chains: &[Chain], keyword: &str) -> Vec<Chain> {
    if keyword.is_empty() {
        return chains.to_vec();
    }
    let needle = keyword.to_lowercase();

    chains
        .iter()
        .filter_map(|chain| {
            let rules: Vec<Rule> = chain
                .rules
                .iter()
                .filter(|r| rule_matches(r, &needle))
                .cloned()
                .collect();
            (!rules.is_empty()).then(|| Chain {
                name: chain.name.clone(),
                policy: chain.policy.clone(),
                references: chain.references,
                rules,
            })
        })
        .collect()
}

/// A rule in the target-pivoted view, with the chain it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetMember<'a> {
    pub chain: &'a Chain,
    pub rule: &'a Rule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroup<'a> {
    pub target: &'a str,
    pub members: Vec<TargetMember<'a>>,
}

/// What the display surface should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection<'a> {
    /// Nothing survived the filter ("no matching rules")
    Empty,
    Chains(&'a [Chain]),
    Targets(Vec<TargetGroup<'a>>),
}

impl Projection<'_> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Projection::Empty)
    }
}

/// Regroups rules by target.
///
/// Rules are scanned chain by chain, then in rule order. Groups appear in
/// the order their target is first met and members keep scan order.
pub fn group_by_target(chains: &[Chain]) -> Vec<TargetGroup<'_>> {
    let mut groups: IndexMap<&str, Vec<TargetMember<'_>>> = IndexMap::new();
    for chain in chains {
        for rule in &chain.rules {
            groups
                .entry(rule.target.as_str())
                .or_default()
                .push(TargetMember { chain, rule });
        }
    }

    groups
        .into_iter()
        .map(|(target, members)| TargetGroup { target, members })
        .collect()
}

/// Filtered snapshot of the collection for one keyword and view mode
#[derive(Debug, Clone, Default)]
pub struct RuleView {
    mode: ViewMode,
    chains: Vec<Chain>,
}

impl RuleView {
    pub fn new(source: &[Chain], keyword: &str, mode: ViewMode) -> Self {
        Self {
            mode,
            chains: filter_chains(source, keyword),
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Filtered chains, in collection order
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn rule_count(&self) -> usize {
        self.chains.iter().map(|c| c.rules.len()).sum()
    }

    pub fn projection(&self) -> Projection<'_> {
        if self.rule_count() == 0 {
            return Projection::Empty;
        }
        match self.mode {
            ViewMode::Chain => Projection::Chains(&self.chains),
            ViewMode::Target => Projection::Targets(group_by_target(&self.chains)),
        }
    }
}
