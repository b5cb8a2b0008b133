//! Shared test utilities for core module tests
//!
//! Provides common test helpers to avoid duplication across test suites.
//! This module is only compiled in test mode.

use crate::core::model::{Chain, Detail, Rule};
use std::sync::Mutex;

/// Mutex for tests that need exclusive access to environment variables.
///
/// # Example
///
/// ```ignore
/// let _guard = ENV_VAR_MUTEX.lock().unwrap();
/// unsafe {
///     std::env::set_var("RULEDECK_ELEVATION_METHOD", "sudo");
/// }
/// // ... test with custom env state ...
/// unsafe {
///     std::env::remove_var("RULEDECK_ELEVATION_METHOD");
/// }
/// ```
pub static ENV_VAR_MUTEX: Mutex<()> = Mutex::new(());

/// Creates a rule with destination `0.0.0.0/0`, no option flags and no
/// details. `raw` mirrors the columns the way the listing prints them.
pub fn sample_rule(number: u32, target: &str, protocol: &str, source: &str) -> Rule {
    Rule {
        number,
        target: target.to_string(),
        protocol: protocol.to_string(),
        option: "--".to_string(),
        source: source.to_string(),
        destination: "0.0.0.0/0".to_string(),
        details: Vec::new(),
        raw: format!("{number} {target} {protocol} -- {source} 0.0.0.0/0"),
    }
}

/// Three chains covering the common shapes:
///
/// - `INPUT`: ACCEPT tcp/22, DROP from 203.0.113.0/24, ACCEPT udp/53
/// - `FORWARD`: DROP, LOG
/// - `OUTPUT`: ACCEPT all
pub fn sample_chains() -> Vec<Chain> {
    let mut ssh = sample_rule(1, "ACCEPT", "tcp", "0.0.0.0/0");
    ssh.details = vec![Detail::new("tcp dpt", Some("22".into()), Some("dpt".into()))];
    ssh.raw.push_str(" tcp dpt:22");

    let blocked = sample_rule(2, "DROP", "all", "203.0.113.0/24");

    let mut dns = sample_rule(3, "ACCEPT", "udp", "10.0.0.0/8");
    dns.details = vec![Detail::new("udp dpt", Some("53".into()), Some("dpt".into()))];
    dns.raw.push_str(" udp dpt:53");

    let mut input = Chain::new("INPUT");
    input.policy = Some("ACCEPT".to_string());
    input.rules = vec![ssh, blocked, dns];

    let mut log = sample_rule(2, "LOG", "all", "0.0.0.0/0");
    log.details = vec![
        Detail::new("LOG flags", Some("0".into()), Some("flags".into())),
        Detail::new("level", Some("4".into()), Some("level".into())),
    ];

    let mut forward = Chain::new("FORWARD");
    forward.policy = Some("DROP".to_string());
    forward.rules = vec![sample_rule(1, "DROP", "tcp", "198.51.100.7"), log];

    let mut output = Chain::new("OUTPUT");
    output.policy = Some("ACCEPT".to_string());
    output.rules = vec![sample_rule(1, "ACCEPT", "all", "0.0.0.0/0")];

    vec![input, forward, output]
}
