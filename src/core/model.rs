//! Rule collection data structures
//!
//! Mirrors what the rule store reports: a list of [`Chain`]s, each holding
//! its [`Rule`]s in evaluation order. Every rule carries the match criteria
//! the listing could not map to a column as a list of [`Detail`] tuples.
//!
//! These records are rebuilt wholesale on every fetch. Nothing in the crate
//! edits them in place.

use serde::{Deserialize, Serialize};

/// Protocol column value meaning "any protocol"
pub const PROTOCOL_ANY: &str = "all";

/// Option column value meaning "no option flags"
pub const OPTION_NONE: &str = "--";

/// Detail keys the edit form models as dedicated port fields.
///
/// [`Detail::is_port`] is shared by attribute extraction and by free-text
/// reconstruction, so a detail is either re-emitted as a port flag or
/// passed through verbatim, never both.
pub const PORT_KEYS: [&str; 4] = ["dpt", "dport", "spt", "sport"];

/// Returns `true` if `key` is one of [`PORT_KEYS`] (case-insensitive).
pub fn is_port_key(key: &str) -> bool {
    PORT_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// Returns `true` if `label` names attribute `name`: equal to it, or
/// ending in `" " + name` (`tcp dpt` names `dpt`). Case-insensitive.
pub fn label_names(label: &str, name: &str) -> bool {
    let label = label.to_lowercase();
    let name = name.to_lowercase();
    label == name || label.ends_with(&format!(" {name}"))
}

/// A decomposed `(key, label, value)` attribute of a rule's match criteria
///
/// `tcp dpt:48461` becomes `key = "dpt"`, `label = "tcp dpt"`,
/// `value = "48461"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub label: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl Detail {
    pub fn new(label: impl Into<String>, value: Option<String>, key: Option<String>) -> Self {
        Self {
            key,
            label: label.into(),
            value,
        }
    }

    /// Whether the port lookup can select this detail, by key or, for
    /// details parsed without one, by label.
    pub fn is_port(&self) -> bool {
        self.key.as_deref().is_some_and(is_port_key)
            || PORT_KEYS.iter().any(|k| label_names(&self.label, k))
    }

    /// Label-only detail with no key
    pub fn bare(label: impl Into<String>) -> Self {
        Self::new(label, None, None)
    }

    /// Search form: `label` or `label:value`
    pub fn search_text(&self) -> String {
        match self.value.as_deref() {
            Some(value) if !value.is_empty() => format!("{}:{value}", self.label),
            _ => self.label.clone(),
        }
    }

    /// Free-text form: `label`, `label:value` or `value`, trimmed.
    ///
    /// Returns `None` when both parts are empty.
    pub fn passthrough_text(&self) -> Option<String> {
        let label = self.label.trim();
        let value = self.value.as_deref().unwrap_or_default().trim();
        match (label.is_empty(), value.is_empty()) {
            (true, true) => None,
            (false, false) => Some(format!("{label}:{value}")),
            (false, true) => Some(label.to_string()),
            (true, false) => Some(value.to_string()),
        }
    }
}

/// One filtering directive inside a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// 1-based position in the owning chain
    pub number: u32,
    pub target: String,
    pub protocol: String,
    pub option: String,
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub details: Vec<Detail>,
    #[serde(default)]
    pub raw: String,
}

impl Rule {
    /// Option text, or `None` for the `--` sentinel and empty values
    pub fn option_flags(&self) -> Option<&str> {
        let option = self.option.trim();
        if option.is_empty() || option == OPTION_NONE {
            None
        } else {
            Some(option)
        }
    }
}

/// A named, ordered sequence of rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub name: String,
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub references: Option<u32>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Chain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: None,
            references: None,
            rules: Vec::new(),
        }
    }

    pub fn rule(&self, number: u32) -> Option<&Rule> {
        self.rules.iter().find(|r| r.number == number)
    }
}

/// Looks up a rule by its `(chain, number)` identity.
pub fn find_rule<'a>(chains: &'a [Chain], chain: &str, number: u32) -> Option<&'a Rule> {
    chains
        .iter()
        .find(|c| c.name == chain)
        .and_then(|c| c.rule(number))
}
