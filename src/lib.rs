//! ruledeck - an operator console for iptables
//!
//! Lists the chains of a host's iptables rule set, filters and regroups
//! them, and creates, edits or deletes individual rules, locally or on a
//! remote host over SSH.
//!
//! # Architecture
//!
//! - [`core`] - Rule model, listing parser, specification compiler, views and edit sessions
//! - [`console`] - The session-state record that drives a [`core::store::RuleStore`]
//! - [`render`] - Text and JSON output
//! - [`audit`] - Audit log of every rule mutation
//! - [`elevation`] - Running iptables locally (elevated) or over ssh
//! - [`validators`] - Input validation and specification tokenizing
//! - [`config`] - Configuration persistence
//! - [`utils`] - Utility functions (XDG directories, etc.)

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod console;
pub mod core;
pub mod elevation;
pub mod render;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use console::Console;
pub use core::error::{Error, Result};
pub use core::model::{Chain, Detail, Rule};
