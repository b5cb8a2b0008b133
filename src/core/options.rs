//! Pick-list reconciliation for the rule form
//!
//! Each selectable field (chain, target, protocol, source, destination) is
//! offered as a merge of ranked value groups: the built-in defaults first,
//! then whatever the current collection uses, then the draft's own value.
//! [`reconcile`] performs that merge; [`PickLists::build`] assembles the
//! groups for every field.

use crate::core::model::{Chain, Rule};
use crate::core::session::EditDraft;
use indexmap::IndexSet;

pub const DEFAULT_CHAINS: &[&str] = &["INPUT", "OUTPUT", "FORWARD", "PREROUTING", "POSTROUTING"];
pub const DEFAULT_TARGETS: &[&str] = &["ACCEPT", "DROP", "REJECT", "LOG", "RETURN"];
pub const DEFAULT_PROTOCOLS: &[&str] = &["tcp", "udp", "icmp", "all"];
pub const DEFAULT_ADDRESSES: &[&str] = &[
    "0.0.0.0/0",
    "127.0.0.1",
    "192.168.0.0/16",
    "10.0.0.0/8",
    "::/0",
];

/// Merges value groups into one deduplicated list.
///
/// Values keep the position of their first occurrence, scanning groups in
/// the order given. Empty strings are skipped. A non-empty `current` value
/// is always present exactly once; it is appended last when no group
/// contains it.
///
/// # Example
///
/// ```
/// use ruledeck::core::options::reconcile;
///
/// let merged = reconcile([vec!["tcp", "udp"], vec!["udp", "gre"]], Some("esp"));
/// assert_eq!(merged, ["tcp", "udp", "gre", "esp"]);
/// ```
pub fn reconcile<G, V>(groups: impl IntoIterator<Item = G>, current: Option<&str>) -> Vec<String>
where
    G: IntoIterator<Item = V>,
    V: AsRef<str>,
{
    let mut seen: IndexSet<String> = IndexSet::new();

    for group in groups {
        for value in group {
            let value = value.as_ref();
            if !value.is_empty() && !seen.contains(value) {
                seen.insert(value.to_string());
            }
        }
    }

    if let Some(current) = current.filter(|v| !v.is_empty()) {
        seen.insert(current.to_string());
    }

    seen.into_iter().collect()
}

/// Options for every select field of the rule form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PickLists {
    pub chains: Vec<String>,
    pub targets: Vec<String>,
    pub protocols: Vec<String>,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
}

impl PickLists {
    /// Builds pick lists from defaults, observed values and the open draft.
    pub fn build(chains: &[Chain], draft: Option<&EditDraft>) -> Self {
        Self {
            chains: reconcile(
                [
                    DEFAULT_CHAINS.to_vec(),
                    chains.iter().map(|c| c.name.as_str()).collect(),
                ],
                draft.map(EditDraft::chain),
            ),
            targets: reconcile(
                [DEFAULT_TARGETS.to_vec(), observed(chains, |r| &r.target)],
                draft.map(|d| d.fields.target.as_str()),
            ),
            protocols: reconcile(
                [DEFAULT_PROTOCOLS.to_vec(), observed(chains, |r| &r.protocol)],
                draft.map(|d| d.fields.protocol.as_str()),
            ),
            sources: reconcile(
                [DEFAULT_ADDRESSES.to_vec(), observed(chains, |r| &r.source)],
                draft.map(|d| d.fields.source.as_str()),
            ),
            destinations: reconcile(
                [DEFAULT_ADDRESSES.to_vec(), observed(chains, |r| &r.destination)],
                draft.map(|d| d.fields.destination.as_str()),
            ),
        }
    }
}

/// Values of one rule column across the collection, in scan order
fn observed<'a>(chains: &'a [Chain], field: impl Fn(&'a Rule) -> &'a String) -> Vec<&'a str> {
    chains
        .iter()
        .flat_map(|c| c.rules.iter())
        .map(|r| field(r).as_str())
        .collect()
}
