//! Text and JSON output for the command line
//!
//! Both chain and target groupings come from the same [`Projection`]; this
//! module only lays them out.

use crate::core::index::{Projection, RuleView};
use crate::core::model::{Chain, Detail, Rule};
use crate::core::options::PickLists;
use crate::utils::truncate_string;
use serde_json::json;
use std::fmt::Write as _;
use tabled::settings::Style;
use tabled::{Table, Tabled};

pub const NO_MATCHING_RULES: &str = "No matching rules.";

/// Widest a details cell gets before it is truncated
const MAX_DETAILS_WIDTH: usize = 72;

/// Row of a chain table, columns as `iptables -L` prints them
#[derive(Tabled)]
struct ChainRow {
    num: u32,
    target: String,
    prot: String,
    opt: String,
    source: String,
    destination: String,
    details: String,
}

/// Row of a target table; the owning chain replaces the target column
#[derive(Tabled)]
struct TargetRow {
    chain: String,
    num: u32,
    prot: String,
    opt: String,
    source: String,
    destination: String,
    details: String,
}

impl ChainRow {
    fn new(rule: &Rule) -> Self {
        Self {
            num: rule.number,
            target: rule.target.clone(),
            prot: rule.protocol.clone(),
            opt: rule.option.clone(),
            source: rule.source.clone(),
            destination: rule.destination.clone(),
            details: details_cell(&rule.details),
        }
    }
}

impl TargetRow {
    fn new(chain: &Chain, rule: &Rule) -> Self {
        Self {
            chain: chain.name.clone(),
            num: rule.number,
            prot: rule.protocol.clone(),
            opt: rule.option.clone(),
            source: rule.source.clone(),
            destination: rule.destination.clone(),
            details: details_cell(&rule.details),
        }
    }
}

fn details_cell(details: &[Detail]) -> String {
    let text = details
        .iter()
        .map(Detail::search_text)
        .collect::<Vec<_>>()
        .join(" ");
    truncate_string(&text, MAX_DETAILS_WIDTH)
}

fn chain_heading(chain: &Chain) -> String {
    let mut meta = Vec::new();
    if let Some(policy) = &chain.policy {
        meta.push(format!("policy {policy}"));
    }
    if let Some(references) = chain.references {
        meta.push(format!("{references} references"));
    }
    if meta.is_empty() {
        format!("Chain {}", chain.name)
    } else {
        format!("Chain {} ({})", chain.name, meta.join(", "))
    }
}

fn push_table<T: Tabled>(out: &mut String, rows: Vec<T>) {
    let mut table = Table::new(rows);
    table.with(Style::blank());
    let _ = writeln!(out, "{table}");
}

/// Renders the view as text tables, one per chain or per target.
pub fn render_text(view: &RuleView) -> String {
    let mut out = String::new();

    match view.projection() {
        Projection::Empty => {
            out.push_str(NO_MATCHING_RULES);
            out.push('\n');
        }
        Projection::Chains(chains) => {
            for (i, chain) in chains.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                let _ = writeln!(out, "{}", chain_heading(chain));
                push_table(&mut out, chain.rules.iter().map(ChainRow::new).collect());
            }
        }
        Projection::Targets(groups) => {
            for (i, group) in groups.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                let _ = writeln!(out, "Target {} ({} rules)", group.target, group.members.len());
                push_table(
                    &mut out,
                    group
                        .members
                        .iter()
                        .map(|m| TargetRow::new(m.chain, m.rule))
                        .collect(),
                );
            }
        }
    }

    out
}

/// JSON form of the view.
///
/// Chain mode yields the filtered chains; target mode yields
/// `[{ "target", "rules": [{ "chain", "rule" }] }]`.
pub fn render_json(view: &RuleView) -> serde_json::Result<String> {
    let value = match view.projection() {
        Projection::Empty => json!([]),
        Projection::Chains(chains) => serde_json::to_value(chains)?,
        Projection::Targets(groups) => serde_json::Value::Array(
            groups
                .iter()
                .map(|group| {
                    json!({
                        "target": group.target,
                        "rules": group
                            .members
                            .iter()
                            .map(|m| json!({ "chain": m.chain.name, "rule": m.rule }))
                            .collect::<Vec<_>>(),
                    })
                })
                .collect(),
        ),
    };
    serde_json::to_string_pretty(&value)
}

/// One line per pick list: `name: a, b, c`
pub fn render_pick_lists(lists: &PickLists) -> String {
    [
        ("chains", &lists.chains),
        ("targets", &lists.targets),
        ("protocols", &lists.protocols),
        ("sources", &lists.sources),
        ("destinations", &lists.destinations),
    ]
    .iter()
    .map(|(name, values)| format!("{name}: {}\n", values.join(", ")))
    .collect()
}
