#[cfg(test)]
mod tests_impl {
    use crate::core::index::{Projection, RuleView, ViewMode};
    use crate::core::listing::parse_listing;
    use crate::core::session::{EditDraft, EditSession, SubmitRequest};
    use crate::core::spec::compose;

    const LISTING: &str = "\
Chain INPUT (policy ACCEPT)
num  target     prot opt source               destination
1    ACCEPT     tcp  --  0.0.0.0/0            0.0.0.0/0            tcp dpt:22
2    DROP       all  --  203.0.113.0/24       0.0.0.0/0
3    ACCEPT     udp  --  10.0.0.0/8           0.0.0.0/0            udp dpt:53
4    ACCEPT     all  --  0.0.0.0/0            0.0.0.0/0            state RELATED,ESTABLISHED

Chain FORWARD (policy DROP)
num  target     prot opt source               destination
1    TCPMSS     tcp  --  0.0.0.0/0            0.0.0.0/0            tcpflags: 0x06/0x02 TCPMSS clamp to PMTU
";

    #[test]
    fn test_listing_to_edit_request() {
        let chains = parse_listing(LISTING);
        let rule = chains[0].rule(3).unwrap();

        let mut session = EditSession::default();
        session.open(EditDraft::edit("INPUT", rule));
        session.draft_mut().unwrap().fields.target = "DROP".into();

        assert_eq!(
            session.begin_submit().unwrap(),
            SubmitRequest::Update {
                chain: "INPUT".into(),
                number: 3,
                specification: "-p udp -s 10.0.0.0/8 -d 0.0.0.0/0 --dport 53 -j DROP".into(),
            }
        );
    }

    #[test]
    fn test_listing_unknown_details_pass_through() {
        let chains = parse_listing(LISTING);

        let state = EditDraft::edit("INPUT", chains[0].rule(4).unwrap());
        assert_eq!(
            state.specification().unwrap(),
            "-s 0.0.0.0/0 -d 0.0.0.0/0 state:RELATED,ESTABLISHED -j ACCEPT"
        );

        let mss = EditDraft::edit("FORWARD", chains[1].rule(1).unwrap());
        assert_eq!(mss.fields.destination_port, "");
        assert!(mss.fields.extension.starts_with("tcpflags:0x06/0x02 TCPMSS"));
        assert!(mss.specification().unwrap().ends_with("-j TCPMSS"));
    }

    #[test]
    fn test_search_then_pivot() {
        let chains = parse_listing(LISTING);
        let view = RuleView::new(&chains, "accept", ViewMode::Target);

        let Projection::Targets(groups) = view.projection() else {
            panic!("expected target projection");
        };
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].target, "ACCEPT");
        let numbers: Vec<u32> = groups[0].members.iter().map(|m| m.rule.number).collect();
        assert_eq!(numbers, [1, 3, 4]);
    }

    #[test]
    fn test_compose_examples() {
        let mut fields = crate::core::spec::RuleFields {
            protocol: "tcp".into(),
            destination: "10.0.0.0/8".into(),
            destination_port: "443".into(),
            target: "ACCEPT".into(),
            ..Default::default()
        };
        assert_eq!(
            compose("INPUT", &fields).unwrap(),
            "-p tcp -d 10.0.0.0/8 --dport 443 -j ACCEPT"
        );

        fields = crate::core::spec::RuleFields {
            protocol: "all".into(),
            target: "DROP".into(),
            ..Default::default()
        };
        assert_eq!(compose("INPUT", &fields).unwrap(), "-j DROP");
    }
}

#[cfg(test)]
mod property_tests {
    use crate::core::index::{Projection, RuleView, ViewMode, filter_chains, group_by_target};
    use crate::core::model::{Chain, Detail, Rule};
    use crate::core::options::reconcile;
    use crate::core::spec::{RuleFields, compose, decompose};
    use proptest::prelude::*;

    prop_compose! {
        fn arb_rule(number: u32)(
            target in prop_oneof![
                Just("ACCEPT".to_string()),
                Just("DROP".to_string()),
                Just("REJECT".to_string()),
                Just("LOG".to_string()),
                "[A-Z][A-Z_-]{0,10}",
            ],
            protocol in prop_oneof![
                Just("tcp".to_string()),
                Just("udp".to_string()),
                Just("all".to_string()),
            ],
            source in "(0\\.0\\.0\\.0/0|10\\.[0-9]{1,3}\\.0\\.0/16|192\\.168\\.[0-9]{1,3}\\.[0-9]{1,3})",
            destination in "(0\\.0\\.0\\.0/0|172\\.16\\.0\\.[0-9]{1,3})",
            dport in proptest::option::of((1u16..=65535, 0usize..3)),
            sport in proptest::option::of((1u16..=65535, 0usize..3)),
            state in proptest::option::of(Just("RELATED,ESTABLISHED".to_string())),
        ) -> Rule {
            // Style 0 and 1 are keyed by the short or long name, 2 is unkeyed
            let port_detail = |names: [&str; 2], (port, style): (u16, usize)| {
                let name = names[style % 2];
                let key = (style < 2).then(|| name.to_string());
                Detail::new(format!("{protocol} {name}"), Some(port.to_string()), key)
            };
            let mut details = Vec::new();
            if let Some(port) = sport {
                details.push(port_detail(["spt", "sport"], port));
            }
            if let Some(value) = state {
                details.push(Detail::new("state", Some(value), Some("state".into())));
            }
            if let Some(port) = dport {
                details.push(port_detail(["dpt", "dport"], port));
            }
            Rule {
                number,
                raw: format!("{number} {target} {protocol} -- {source} {destination}"),
                target,
                protocol,
                option: "--".to_string(),
                source,
                destination,
                details,
            }
        }
    }

    fn arb_chain(name: String) -> impl Strategy<Value = Chain> {
        (0u32..6).prop_flat_map(move |count| {
            let rules: Vec<_> = (1..=count).map(arb_rule).collect();
            let name = name.clone();
            rules.prop_map(move |rules| Chain {
                name: name.clone(),
                policy: None,
                references: None,
                rules,
            })
        })
    }

    fn arb_chains() -> impl Strategy<Value = Vec<Chain>> {
        (
            arb_chain("INPUT".into()),
            arb_chain("FORWARD".into()),
            arb_chain("OUTPUT".into()),
        )
            .prop_map(|(a, b, c)| vec![a, b, c])
    }

    proptest! {
        #[test]
        fn test_reconcile_distinct_first_seen(
            groups in prop::collection::vec(prop::collection::vec("[a-c]{0,2}", 0..6), 0..4),
            current in proptest::option::of("[a-d]{1,2}"),
        ) {
            let merged = reconcile(groups.clone(), current.as_deref());

            let mut expected: Vec<String> = Vec::new();
            for value in groups.iter().flatten() {
                if !value.is_empty() && !expected.contains(value) {
                    expected.push(value.clone());
                }
            }
            if let Some(current) = &current
                && !expected.contains(current)
            {
                expected.push(current.clone());
            }

            prop_assert_eq!(&merged, &expected);
            if let Some(current) = &current {
                prop_assert_eq!(merged.iter().filter(|v| *v == current).count(), 1);
            }
        }

        #[test]
        fn test_compose_deterministic_and_ordered(
            protocol in "(tcp|udp|all|)",
            source in "(10\\.0\\.0\\.0/8|)",
            destination in "(192\\.168\\.1\\.1|)",
            sport in "([0-9]{1,5}|)",
            dport in "([0-9]{1,5}|)",
            target in "[A-Z]{1,8}",
        ) {
            let fields = RuleFields {
                protocol,
                source,
                destination,
                source_port: sport,
                destination_port: dport,
                target,
                ..RuleFields::default()
            };
            let first = compose("INPUT", &fields).unwrap();
            prop_assert_eq!(&first, &compose("INPUT", &fields).unwrap());

            let order = ["-p ", "-s ", "-d ", "--sport ", "--dport ", "-j "];
            let positions: Vec<usize> = order
                .iter()
                .filter_map(|flag| {
                    first
                        .split(' ')
                        .position(|token| format!("{token} ") == *flag)
                })
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
            let target_flag = format!("-j {}", fields.target);
            prop_assert!(first.ends_with(&target_flag));
        }

        #[test]
        fn test_compose_decompose_keeps_flags(rule in arb_rule(1)) {
            let spec = compose("INPUT", &decompose(&rule)).unwrap();
            let tokens: Vec<&str> = spec.split(' ').collect();
            let value_after = |flag: &str| {
                tokens
                    .iter()
                    .position(|t| *t == flag)
                    .and_then(|i| tokens.get(i + 1).copied())
            };

            if rule.protocol == "all" {
                prop_assert_eq!(value_after("-p"), None);
            } else {
                prop_assert_eq!(value_after("-p"), Some(rule.protocol.as_str()));
            }
            prop_assert_eq!(value_after("-s"), Some(rule.source.as_str()));
            prop_assert_eq!(value_after("-d"), Some(rule.destination.as_str()));
            prop_assert_eq!(value_after("-j"), Some(rule.target.as_str()));

            for (flag, names) in [("--sport", ["spt", "sport"]), ("--dport", ["dpt", "dport"])] {
                let expected = rule
                    .details
                    .iter()
                    .find(|d| names.iter().any(|n| d.label.ends_with(&format!(" {n}"))))
                    .and_then(|d| d.value.as_deref());
                prop_assert_eq!(value_after(flag), expected);
                prop_assert!(tokens.iter().filter(|t| **t == flag).count() <= 1);
            }

            // Ports leave the passthrough text; everything else stays
            prop_assert!(!tokens.iter().any(|t| t.contains("pt:") || t.contains("port:")));
            let has_state = rule.details.iter().any(|d| d.label == "state");
            prop_assert_eq!(tokens.contains(&"state:RELATED,ESTABLISHED"), has_state);
        }

        #[test]
        fn test_empty_filter_is_identity(chains in arb_chains()) {
            prop_assert_eq!(filter_chains(&chains, ""), chains);
        }

        #[test]
        fn test_filter_is_idempotent(chains in arb_chains(), keyword in "(tcp|DROP|10\\.|dpt|0/0|x)") {
            let once = filter_chains(&chains, &keyword);
            prop_assert_eq!(filter_chains(&once, &keyword), once.clone());
        }

        #[test]
        fn test_pivot_preserves_rules_in_scan_order(chains in arb_chains()) {
            let total: usize = chains.iter().map(|c| c.rules.len()).sum();
            let groups = group_by_target(&chains);
            prop_assert_eq!(groups.iter().map(|g| g.members.len()).sum::<usize>(), total);

            let scan: Vec<(&str, u32)> = chains
                .iter()
                .flat_map(|c| c.rules.iter().map(move |r| (c.name.as_str(), r.number)))
                .collect();
            for group in &groups {
                let mut cursor = 0;
                for member in &group.members {
                    prop_assert_eq!(member.rule.target.as_str(), group.target);
                    let key = (member.chain.name.as_str(), member.rule.number);
                    let found = scan[cursor..].iter().position(|entry| *entry == key);
                    prop_assert!(found.is_some());
                    cursor += found.unwrap_or(0) + 1;
                }
            }

            let view = RuleView::new(&chains, "", ViewMode::Target);
            prop_assert_eq!(view.projection() == Projection::Empty, total == 0);
        }
    }
}
