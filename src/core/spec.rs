//! Rule specification compiler
//!
//! Converts between the structured fields of the rule form and the
//! single-line specification iptables accepts after `-A CHAIN` / `-R CHAIN N`
//! (`-p tcp -d 10.0.0.0/8 --dport 443 -j ACCEPT`).
//!
//! - [`compose`] turns [`RuleFields`] into specification text.
//! - [`decompose`] turns a listed [`Rule`] back into [`RuleFields`]. Match
//!   criteria the form has no field for are carried in
//!   [`RuleFields::extension`] so saving an edit does not lose them.

use crate::core::error::{Error, Result};
use crate::core::model::{Detail, PROTOCOL_ANY, Rule, label_names};
use serde::{Deserialize, Serialize};

/// Structured, field-level view of one rule
///
/// All values are kept as the operator typed them; [`compose`] trims them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFields {
    pub protocol: String,
    pub in_interface: String,
    pub out_interface: String,
    pub source: String,
    pub destination: String,
    pub source_port: String,
    pub destination_port: String,
    /// Free-text fragment emitted verbatim before the target
    pub extension: String,
    pub target: String,
}

/// Builds the specification text for `fields` in chain `chain`.
///
/// Flags are emitted in a fixed order: `-p`, `-i`, `-o`, `-s`, `-d`,
/// `--sport`, `--dport`, the free-text extension, then `-j`. Empty fields
/// are skipped and protocol `all` is left out since it matches anything.
///
/// # Errors
///
/// Returns [`Error::Validation`] if `chain` or the target is blank, or if
/// no flag was emitted.
///
/// # Example
///
/// ```
/// use ruledeck::core::spec::{RuleFields, compose};
///
/// let fields = RuleFields {
///     protocol: "tcp".into(),
///     destination: "10.0.0.0/8".into(),
///     destination_port: "443".into(),
///     target: "ACCEPT".into(),
///     ..RuleFields::default()
/// };
/// assert_eq!(
///     compose("INPUT", &fields).unwrap(),
///     "-p tcp -d 10.0.0.0/8 --dport 443 -j ACCEPT"
/// );
/// ```
pub fn compose(chain: &str, fields: &RuleFields) -> Result<String> {
    if chain.trim().is_empty() {
        return Err(Error::validation("chain", "Select a chain"));
    }
    let target = fields.target.trim();
    if target.is_empty() {
        return Err(Error::validation("target", "Select a target"));
    }

    let mut parts: Vec<String> = Vec::new();
    let mut flag = |name: &str, value: &str| {
        let value = value.trim();
        if !value.is_empty() {
            parts.push(format!("{name} {value}"));
        }
    };

    if !fields.protocol.trim().eq_ignore_ascii_case(PROTOCOL_ANY) {
        flag("-p", &fields.protocol);
    }
    flag("-i", &fields.in_interface);
    flag("-o", &fields.out_interface);
    flag("-s", &fields.source);
    flag("-d", &fields.destination);
    flag("--sport", &fields.source_port);
    flag("--dport", &fields.destination_port);

    let extension = fields.extension.trim();
    if !extension.is_empty() {
        parts.push(extension.to_string());
    }
    parts.push(format!("-j {target}"));

    let specification = parts.join(" ");
    if specification.trim().is_empty() {
        return Err(Error::validation("specification", "Fill in the rule parameters"));
    }
    Ok(specification)
}

/// Finds the value of attribute `name` among `details`.
///
/// A detail whose key equals `name` (case-insensitive) wins wherever it
/// appears in the list. Failing that, the first detail whose label equals
/// `name` or ends with `" " + name` is used, which covers details parsed
/// without a key. Missing and empty values yield `None`.
pub fn attribute<'a>(details: &'a [Detail], name: &str) -> Option<&'a str> {
    let by_key = details.iter().find(|d| {
        d.key
            .as_deref()
            .is_some_and(|key| key.eq_ignore_ascii_case(name))
    });

    let found = by_key.or_else(|| details.iter().find(|d| label_names(&d.label, name)))?;

    found.value.as_deref().filter(|v| !v.is_empty())
}

/// Rebuilds the match criteria the form cannot represent.
///
/// The rule's option flags (unless `--`) come first, followed by every
/// detail the port fields do not take (see [`Detail::is_port`]), each as
/// `label`, `label:value` or `value`.
pub fn leftover_text(rule: &Rule) -> String {
    let mut segments: Vec<String> = Vec::new();
    if let Some(option) = rule.option_flags() {
        segments.push(option.to_string());
    }

    segments.extend(
        rule.details
            .iter()
            .filter(|d| !d.is_port())
            .filter_map(Detail::passthrough_text),
    );

    segments.join(" ").trim().to_string()
}

/// Seeds form fields from a listed rule.
///
/// Interfaces start blank: the numeric listing does not print them.
pub fn decompose(rule: &Rule) -> RuleFields {
    let port = |primary: &str, alias: &str| {
        attribute(&rule.details, primary)
            .or_else(|| attribute(&rule.details, alias))
            .unwrap_or_default()
            .to_string()
    };

    RuleFields {
        protocol: rule.protocol.clone(),
        in_interface: String::new(),
        out_interface: String::new(),
        source: rule.source.clone(),
        destination: rule.destination.clone(),
        source_port: port("spt", "sport"),
        destination_port: port("dpt", "dport"),
        extension: leftover_text(rule),
        target: rule.target.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Detail;
    use crate::core::test_helpers::sample_rule;

    fn keyed(label: &str, value: &str, key: &str) -> Detail {
        Detail::new(label, Some(value.to_string()), Some(key.to_string()))
    }

    #[test]
    fn test_compose_full_order() {
        let fields = RuleFields {
            protocol: "udp".into(),
            in_interface: "eth0".into(),
            out_interface: "eth1".into(),
            source: "192.168.0.0/16".into(),
            destination: "10.0.0.1".into(),
            source_port: "1024:65535".into(),
            destination_port: "53".into(),
            extension: "-m state --state NEW".into(),
            target: "ACCEPT".into(),
        };
        assert_eq!(
            compose("FORWARD", &fields).unwrap(),
            "-p udp -i eth0 -o eth1 -s 192.168.0.0/16 -d 10.0.0.1 \
             --sport 1024:65535 --dport 53 -m state --state NEW -j ACCEPT"
        );
    }

    #[test]
    fn test_compose_protocol_all_omitted() {
        let fields = RuleFields {
            protocol: "all".into(),
            target: "DROP".into(),
            ..RuleFields::default()
        };
        assert_eq!(compose("INPUT", &fields).unwrap(), "-j DROP");

        let fields = RuleFields {
            protocol: "ALL".into(),
            target: "DROP".into(),
            ..RuleFields::default()
        };
        assert_eq!(compose("INPUT", &fields).unwrap(), "-j DROP");
    }

    #[test]
    fn test_compose_trims_values() {
        let fields = RuleFields {
            source: "  10.1.1.1 ".into(),
            destination_port: "   ".into(),
            target: " LOG ".into(),
            ..RuleFields::default()
        };
        assert_eq!(compose("OUTPUT", &fields).unwrap(), "-s 10.1.1.1 -j LOG");
    }

    #[test]
    fn test_compose_requires_target_and_chain() {
        let fields = RuleFields {
            protocol: "tcp".into(),
            ..RuleFields::default()
        };
        let err = compose("INPUT", &fields).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "target"));

        let fields = RuleFields {
            target: "ACCEPT".into(),
            ..RuleFields::default()
        };
        let err = compose(" ", &fields).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "chain"));
    }

    #[test]
    fn test_attribute_prefers_key_over_label() {
        let details = vec![
            Detail::new("udp spt", Some("9".into()), None),
            keyed("tcp spt", "22", "spt"),
        ];
        assert_eq!(attribute(&details, "spt"), Some("22"));
    }

    #[test]
    fn test_attribute_label_fallback() {
        let details = vec![
            Detail::new("state", Some("NEW".into()), None),
            Detail::new("tcp dpt", Some("80".into()), None),
            Detail::new("udp dpt", Some("81".into()), None),
        ];
        assert_eq!(attribute(&details, "DPT"), Some("80"));
        assert_eq!(attribute(&details, "state"), Some("NEW"));
        assert_eq!(attribute(&details, "sport"), None);
    }

    #[test]
    fn test_attribute_without_value() {
        let details = vec![Detail::new("dpt", None, Some("dpt".into()))];
        assert_eq!(attribute(&details, "dpt"), None);
    }

    #[test]
    fn test_leftover_text_excludes_port_keys() {
        let mut rule = sample_rule(1, "ACCEPT", "tcp", "0.0.0.0/0");
        rule.option = "-f".into();
        rule.details = vec![
            keyed("tcp dpt", "22", "dpt"),
            keyed("state", "RELATED,ESTABLISHED", "state"),
            Detail::bare("multiport"),
            Detail::new("", Some("0x10".into()), None),
            keyed("udp dpts", "1:2", "dpts"),
        ];
        assert_eq!(
            leftover_text(&rule),
            "-f state:RELATED,ESTABLISHED multiport 0x10 udp dpts:1:2"
        );
    }

    #[test]
    fn test_leftover_text_option_sentinel() {
        let rule = sample_rule(1, "ACCEPT", "tcp", "0.0.0.0/0");
        assert_eq!(rule.option, "--");
        assert_eq!(leftover_text(&rule), "");
    }

    #[test]
    fn test_decompose_ports_and_columns() {
        let mut rule = sample_rule(4, "REJECT", "udp", "10.0.0.0/8");
        rule.destination = "192.168.1.1".into();
        rule.details = vec![keyed("udp spt", "5353", "spt"), keyed("udp dport", "53", "dport")];

        let fields = decompose(&rule);
        assert_eq!(fields.protocol, "udp");
        assert_eq!(fields.source, "10.0.0.0/8");
        assert_eq!(fields.destination, "192.168.1.1");
        assert_eq!(fields.source_port, "5353");
        assert_eq!(fields.destination_port, "53");
        assert_eq!(fields.target, "REJECT");
        assert!(fields.extension.is_empty());
        assert!(fields.in_interface.is_empty());
    }

    #[test]
    fn test_compose_decompose_keeps_flags() {
        let mut rule = sample_rule(2, "ACCEPT", "tcp", "127.0.0.1");
        rule.destination = "127.0.0.1".into();
        rule.details = vec![keyed("tcp dpt", "48461", "dpt")];

        let spec = compose("INPUT", &decompose(&rule)).unwrap();
        assert_eq!(spec, "-p tcp -s 127.0.0.1 -d 127.0.0.1 --dport 48461 -j ACCEPT");
    }

    #[test]
    fn test_compose_decompose_passes_unknown_fragments() {
        let mut rule = sample_rule(1, "ACCEPT", "all", "0.0.0.0/0");
        rule.details = vec![keyed("state", "RELATED,ESTABLISHED", "state")];

        let spec = compose("FORWARD", &decompose(&rule)).unwrap();
        assert_eq!(
            spec,
            "-s 0.0.0.0/0 -d 0.0.0.0/0 state:RELATED,ESTABLISHED -j ACCEPT"
        );
    }

    #[test]
    fn test_unkeyed_port_detail_is_emitted_once() {
        let mut rule = sample_rule(1, "ACCEPT", "tcp", "0.0.0.0/0");
        rule.details = vec![
            Detail::new("tcp dpt", Some("80".into()), None),
            Detail::new("state", Some("NEW".into()), None),
        ];

        let fields = decompose(&rule);
        assert_eq!(fields.destination_port, "80");
        assert_eq!(fields.extension, "state:NEW");
        assert_eq!(
            compose("INPUT", &fields).unwrap(),
            "-p tcp -s 0.0.0.0/0 -d 0.0.0.0/0 --dport 80 state:NEW -j ACCEPT"
        );
    }
}
