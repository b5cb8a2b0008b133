//! Parser for `iptables -L -n --line-numbers` output
//!
//! The listing is column-oriented up to the destination column; anything
//! after it is free-form match criteria that iptables prints per extension
//! (`tcp dpt:22`, `state RELATED,ESTABLISHED`, `tcpflags: 0x06/0x02`).
//! Those trailing tokens are grouped into [`Detail`] tuples.
//!
//! # Example
//!
//! ```
//! use ruledeck::core::listing::parse_listing;
//!
//! let chains = parse_listing(
//!     "Chain INPUT (policy ACCEPT)\n\
//!      num  target  prot opt source     destination\n\
//!      1    ACCEPT  tcp  --  0.0.0.0/0  0.0.0.0/0   tcp dpt:22\n",
//! );
//! assert_eq!(chains[0].name, "INPUT");
//! assert_eq!(chains[0].rules[0].details[0].label, "tcp dpt");
//! ```

use crate::core::model::{Chain, Detail, Rule};
use tracing::debug;

/// Tokens that end the value of the preceding detail once it has one.
///
/// `TCPMSS clamp to PMTU` follows `tcpflags: 0x06/0x02` without a colon,
/// so it would otherwise be swallowed into the flags value.
const BREAK_AFTER_VALUE: &[&str] = &["TCPMSS"];

/// Minimum number of columns in a well-formed rule row
const RULE_COLUMNS: usize = 6;

/// Parses the whole listing into chains, in the order they appear.
pub fn parse_listing(output: &str) -> Vec<Chain> {
    let mut chains: Vec<Chain> = Vec::new();

    for line in output.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }

        if let Some(chain) = parse_chain_header(stripped) {
            chains.push(chain);
            continue;
        }

        if stripped.starts_with("num ") || stripped.starts_with("target ") {
            continue;
        }

        let Some(current) = chains.last_mut() else {
            debug!("Skipping listing line before any chain header: {stripped}");
            continue;
        };

        current.rules.push(parse_rule_line(stripped));
    }

    chains
}

/// Parses `Chain NAME (descriptor)`.
fn parse_chain_header(line: &str) -> Option<Chain> {
    let rest = line.strip_prefix("Chain")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let name_end = rest.find(char::is_whitespace)?;
    let (name, rest) = rest.split_at(name_end);
    let descriptor = rest.trim_start().strip_prefix('(')?;
    let descriptor = &descriptor[..descriptor.find(')')?];

    let mut chain = Chain::new(name);
    let words: Vec<&str> = descriptor.split_whitespace().collect();
    for pair in words.windows(2) {
        match pair {
            ["policy", policy] => chain.policy = Some((*policy).to_string()),
            [count, "references"] => {
                if let Ok(count) = count.parse() {
                    chain.references = Some(count);
                }
            }
            _ => {}
        }
    }
    Some(chain)
}

fn parse_rule_line(line: &str) -> Rule {
    let parts: Vec<&str> = line.split_whitespace().collect();

    let number = parts.first().and_then(|n| n.parse::<u32>().ok());
    let (Some(number), true) = (number, parts.len() >= RULE_COLUMNS) else {
        debug!("Unrecognised rule row kept verbatim: {line}");
        return Rule {
            number: 0,
            target: line.to_string(),
            protocol: String::new(),
            option: String::new(),
            source: String::new(),
            destination: String::new(),
            details: vec![Detail::bare(line)],
            raw: line.to_string(),
        };
    };

    Rule {
        number,
        target: parts[1].to_string(),
        protocol: parts[2].to_string(),
        option: parts[3].to_string(),
        source: parts[4].to_string(),
        destination: parts[5].to_string(),
        details: parse_details(&parts[RULE_COLUMNS..]),
        raw: line.to_string(),
    }
}

fn normalise_key(raw: &str) -> Option<String> {
    let key = raw.trim().to_lowercase();
    let key = key.trim_end_matches(':');
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

fn make_detail(label: &str, values: &[&str], key: Option<&str>) -> Detail {
    let value = values.join(" ");
    let value = value.trim();
    Detail {
        key: key.and_then(normalise_key),
        label: label.trim().to_string(),
        value: (!value.is_empty()).then(|| value.to_string()),
    }
}

/// Collects value tokens starting at `*i`, stopping at the next colon
/// token or at a break token once a value has been gathered.
fn collect_values<'a>(extra: &[&'a str], i: &mut usize, values: &mut Vec<&'a str>) {
    while let Some(&lookahead) = extra.get(*i) {
        if lookahead.contains(':') {
            break;
        }
        if BREAK_AFTER_VALUE.contains(&lookahead) && !values.is_empty() {
            break;
        }
        values.push(lookahead);
        *i += 1;
    }
}

/// Groups the trailing match-criteria tokens into details.
pub(crate) fn parse_details(extra: &[&str]) -> Vec<Detail> {
    let mut details = Vec::new();
    let mut prefix: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < extra.len() {
        let token = extra[i];

        if let Some((label_part, value_part)) = token.split_once(':') {
            prefix.push(label_part);
            let label = prefix.join(" ");
            let label = label.trim();
            prefix.clear();

            let mut values = Vec::new();
            if !value_part.is_empty() {
                values.push(value_part);
            }
            i += 1;
            collect_values(extra, &mut i, &mut values);

            let label = if label.is_empty() { label_part } else { label };
            details.push(make_detail(label, &values, Some(label_part)));
            continue;
        }

        if extra.get(i + 1).is_some_and(|next| next.contains(':')) {
            prefix.push(token);
            i += 1;
            continue;
        }

        prefix.push(token);
        let label = prefix.join(" ");
        prefix.clear();
        i += 1;

        let mut values = Vec::new();
        collect_values(extra, &mut i, &mut values);
        details.push(make_detail(&label, &values, Some(token)));
    }

    if let Some(last) = prefix.last() {
        details.push(make_detail(&prefix.join(" "), &[], Some(last)));
    }

    details
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"Chain INPUT (policy ACCEPT)
num  target     prot opt source               destination
1    DROP       tcp  --  127.0.0.1            127.0.0.1            tcp dpt:48461
2    ACCEPT     udp  --  0.0.0.0/0            0.0.0.0/0            udp dpts:25560:25570
3    ACCEPT     udp  --  0.0.0.0/0            0.0.0.0/0            udp dpt:200

Chain FORWARD (policy DROP)
num  target     prot opt source               destination
1    TCPMSS     tcp  --  0.0.0.0/0            0.0.0.0/0            tcpflags: 0x06/0x02 TCPMSS clamp to PMTU
2    ACCEPT     all  --  0.0.0.0/0            0.0.0.0/0            state RELATED,ESTABLISHED

Chain OUTPUT (policy ACCEPT)
num  target     prot opt source               destination
1    OUTPUT_DNS  udp  --  0.0.0.0/0            0.0.0.0/0            udp dpt:53 u32 "0x0>>0x16&0x3c@0x8>>0xf&0x1=0x0"

Chain OUTPUT_DNS (1 references)
num  target     prot opt source               destination
"#;

    #[test]
    fn test_parse_basic_structure() {
        let chains = parse_listing(SAMPLE);
        let names: Vec<_> = chains.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["INPUT", "FORWARD", "OUTPUT", "OUTPUT_DNS"]);

        let input = &chains[0];
        assert_eq!(input.policy.as_deref(), Some("ACCEPT"));
        assert_eq!(input.rules.len(), 3);
        let first = &input.rules[0].details[0];
        assert_eq!(first.label, "tcp dpt");
        assert_eq!(first.value.as_deref(), Some("48461"));
        assert_eq!(first.key.as_deref(), Some("dpt"));

        let forward = &chains[1];
        assert_eq!(forward.policy.as_deref(), Some("DROP"));
        assert_eq!(forward.rules[0].details[0].label, "tcpflags");
        assert_eq!(forward.rules[0].details[0].value.as_deref(), Some("0x06/0x02"));
    }

    #[test]
    fn test_break_token_starts_new_detail() {
        let chains = parse_listing(SAMPLE);
        let rule = &chains[1].rules[0];
        assert_eq!(rule.details.len(), 2);
        assert_eq!(rule.details[1].label, "TCPMSS");
        assert_eq!(rule.details[1].value.as_deref(), Some("clamp to PMTU"));
        assert_eq!(rule.details[1].key.as_deref(), Some("tcpmss"));
    }

    #[test]
    fn test_value_keeps_inner_colons() {
        let chains = parse_listing(SAMPLE);
        let detail = &chains[0].rules[1].details[0];
        assert_eq!(detail.label, "udp dpts");
        assert_eq!(detail.value.as_deref(), Some("25560:25570"));
        assert_eq!(detail.key.as_deref(), Some("dpts"));
    }

    #[test]
    fn test_value_absorbs_following_plain_tokens() {
        let chains = parse_listing(SAMPLE);
        let details = &chains[2].rules[0].details;
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].label, "udp dpt");
        assert_eq!(
            details[0].value.as_deref(),
            Some("53 u32 \"0x0>>0x16&0x3c@0x8>>0xf&0x1=0x0\"")
        );
    }

    #[test]
    fn test_label_without_colon_takes_following_tokens() {
        let chains = parse_listing(SAMPLE);
        let details = &chains[1].rules[1].details;
        assert_eq!(
            details,
            &vec![Detail::new(
                "state",
                Some("RELATED,ESTABLISHED".into()),
                Some("state".into())
            )]
        );
    }

    #[test]
    fn test_references_descriptor() {
        let chains = parse_listing(SAMPLE);
        let chain = &chains[3];
        assert_eq!(chain.references, Some(1));
        assert_eq!(chain.policy, None);
        assert!(chain.rules.is_empty());
    }

    #[test]
    fn test_rule_columns_and_raw() {
        let chains = parse_listing(SAMPLE);
        let rule = &chains[1].rules[1];
        assert_eq!(rule.number, 2);
        assert_eq!(rule.target, "ACCEPT");
        assert_eq!(rule.protocol, "all");
        assert_eq!(rule.option, "--");
        assert!(rule.raw.starts_with("2    ACCEPT"));
    }

    #[test]
    fn test_short_row_kept_as_raw_detail() {
        let chains = parse_listing("Chain INPUT (policy ACCEPT)\nweird line\n");
        let rule = &chains[0].rules[0];
        assert_eq!(rule.number, 0);
        assert_eq!(rule.target, "weird line");
        assert_eq!(rule.details, vec![Detail::bare("weird line")]);
    }

    #[test]
    fn test_lines_before_header_are_skipped() {
        let chains = parse_listing("1 ACCEPT all -- 0.0.0.0/0 0.0.0.0/0\nChain X (0 references)\n");
        assert_eq!(chains.len(), 1);
        assert!(chains[0].rules.is_empty());
    }

    #[test]
    fn test_lone_token_becomes_label_only_detail() {
        let details = parse_details(&["multiport"]);
        assert_eq!(details, vec![Detail::new("multiport", None, Some("multiport".into()))]);
    }

    #[test]
    fn test_trailing_colon_token_has_no_value() {
        let details = parse_details(&["ctstate:"]);
        assert_eq!(details, vec![Detail::new("ctstate", None, Some("ctstate".into()))]);
    }
}
