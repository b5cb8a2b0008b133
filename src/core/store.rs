//! The rule store: where chains are read from and mutations are sent
//!
//! [`RuleStore`] is the seam between the console and the host firewall.
//! [`IptablesStore`] drives the `iptables` binary, locally or over ssh, and
//! tests substitute an in-memory store.

use crate::config::AppConfig;
use crate::core::error::{Error, Result};
use crate::core::listing::parse_listing;
use crate::core::model::Chain;
use crate::validators::{split_specification, validate_chain_name};
use tracing::{debug, info, warn};

/// Remote collaborator holding the authoritative rule set
///
/// Rule numbers are 1-based positions inside a chain, as iptables prints
/// them. Every call is independent; nothing is cached between calls.
#[allow(async_fn_in_trait)]
pub trait RuleStore {
    /// Returns every chain with its rules, in listing order.
    async fn fetch_chains(&self) -> Result<Vec<Chain>>;

    /// Appends `specification` to `chain`, or inserts it at `position`.
    async fn create_rule(
        &self,
        chain: &str,
        specification: &str,
        position: Option<u32>,
    ) -> Result<()>;

    /// Replaces rule `number` of `chain` with `specification`.
    async fn replace_rule(&self, chain: &str, number: u32, specification: &str) -> Result<()>;

    /// Deletes rule `number` of `chain`.
    async fn delete_rule(&self, chain: &str, number: u32) -> Result<()>;
}

fn checked_chain(chain: &str) -> Result<String> {
    validate_chain_name(chain)
        .map(ToString::to_string)
        .map_err(|msg| Error::validation("chain", msg))
}

fn checked_number(number: u32) -> Result<String> {
    if number == 0 {
        return Err(Error::validation("number", "Rule numbers start at 1"));
    }
    Ok(number.to_string())
}

fn specification_args(specification: &str) -> Result<Vec<String>> {
    let args =
        split_specification(specification).map_err(|msg| Error::validation("specification", msg))?;
    if args.is_empty() {
        return Err(Error::validation("specification", "Specification is empty"));
    }
    Ok(args)
}

/// `-A chain spec…`, or `-I chain position spec…` when a position is given.
///
/// # Errors
///
/// Returns [`Error::Validation`] for a bad chain name, position 0 or an
/// empty or unbalanced specification.
pub fn create_args(chain: &str, specification: &str, position: Option<u32>) -> Result<Vec<String>> {
    let chain = checked_chain(chain)?;
    let mut args = match position {
        Some(position) => vec!["-I".to_string(), chain, checked_number(position)?],
        None => vec!["-A".to_string(), chain],
    };
    args.extend(specification_args(specification)?);
    Ok(args)
}

/// `-R chain number spec…`
///
/// # Errors
///
/// Same as [`create_args`].
pub fn replace_args(chain: &str, number: u32, specification: &str) -> Result<Vec<String>> {
    let mut args = vec![
        "-R".to_string(),
        checked_chain(chain)?,
        checked_number(number)?,
    ];
    args.extend(specification_args(specification)?);
    Ok(args)
}

/// `-D chain number`
///
/// # Errors
///
/// Returns [`Error::Validation`] for a bad chain name or number 0.
pub fn delete_args(chain: &str, number: u32) -> Result<Vec<String>> {
    Ok(vec![
        "-D".to_string(),
        checked_chain(chain)?,
        checked_number(number)?,
    ])
}

/// Rule store backed by the `iptables` command
#[derive(Debug, Clone)]
pub struct IptablesStore {
    config: AppConfig,
}

impl IptablesStore {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runs iptables with `args` and returns its stdout.
    async fn run(&self, args: &[String]) -> Result<String> {
        let program = crate::elevation::iptables_program(&self.config);
        let command_line = std::iter::once(program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        match &self.config.ssh {
            Some(ssh) => info!("Running '{}' on {}", command_line, ssh.host),
            None => info!("Running '{}'", command_line),
        }

        let output = crate::elevation::create_iptables_command(&self.config, args)
            .map_err(|e| Error::Elevation(e.to_string()))?
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| Error::RuleStore {
                message: format!("Failed to run '{command_line}': {e}"),
                stderr: None,
                exit_code: None,
            })?;

        if output.status.success() {
            debug!("'{}' succeeded ({} bytes)", command_line, output.stdout.len());
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let exit_code = output.status.code();
        let message = match exit_code {
            Some(code) => format!("Command '{command_line}' failed with exit status {code}: {stderr}"),
            None => format!("Command '{command_line}' was terminated by a signal: {stderr}"),
        };
        warn!("{}", message);

        Err(Error::RuleStore {
            message,
            stderr: Some(stderr),
            exit_code,
        })
    }
}

impl RuleStore for IptablesStore {
    async fn fetch_chains(&self) -> Result<Vec<Chain>> {
        let stdout = self.run(&self.config.list_args).await?;
        let chains = parse_listing(&stdout);
        debug!("Parsed {} chains", chains.len());
        Ok(chains)
    }

    async fn create_rule(
        &self,
        chain: &str,
        specification: &str,
        position: Option<u32>,
    ) -> Result<()> {
        self.run(&create_args(chain, specification, position)?)
            .await
            .map(drop)
    }

    async fn replace_rule(&self, chain: &str, number: u32, specification: &str) -> Result<()> {
        self.run(&replace_args(chain, number, specification)?)
            .await
            .map(drop)
    }

    async fn delete_rule(&self, chain: &str, number: u32) -> Result<()> {
        self.run(&delete_args(chain, number)?).await.map(drop)
    }
}
