//! Core rule management functionality
//!
//! Everything here except [`store`] is pure and synchronous:
//!
//! - [`model`]: Chains, rules and their decomposed details
//! - [`listing`]: Parser for `iptables -L -n --line-numbers` output
//! - [`options`]: Deduplicated pick lists for the rule form
//! - [`spec`]: Composing fields into specification text and back
//! - [`index`]: Keyword filtering and chain/target projections
//! - [`session`]: The create/edit draft state machine
//! - [`store`]: The rule store trait and its iptables implementation
//! - [`error`]: Error types

pub mod error;
pub mod index;
pub mod listing;
pub mod model;
pub mod options;
pub mod session;
pub mod spec;
pub mod store;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
