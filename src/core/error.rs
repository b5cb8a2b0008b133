use thiserror::Error;

/// Core error types for ruledeck
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The rule store rejected a fetch or mutation.
    ///
    /// `message` is shown to the operator unchanged.
    #[error("{message}")]
    RuleStore {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// Input validation failed before anything was sent to the rule store
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// A submit for the open draft is still in flight
    #[error("A save is already in progress")]
    Busy,

    /// No edit session is open
    #[error("No rule is being edited")]
    NoSession,

    /// Privilege escalation failed
    #[error("Elevation error: {0}")]
    Elevation(String),

    /// Internal logic error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Message to show for a failed remote call.
    ///
    /// Uses the rule store's own text when it has any, `fallback` otherwise.
    pub fn remote_message(&self, fallback: &str) -> String {
        match self {
            Self::RuleStore { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::RuleStore { .. } => fallback.to_string(),
            other => {
                let text = other.to_string();
                if text.trim().is_empty() {
                    fallback.to_string()
                } else {
                    text
                }
            }
        }
    }
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// Known iptables error patterns and the hints shown next to them
pub struct IptablesErrorPattern;

impl IptablesErrorPattern {
    /// Matches an iptables error message against known patterns.
    ///
    /// Returns `None` when nothing matches; the raw message is always shown
    /// by the caller regardless.
    pub fn match_error(msg: &str) -> Option<ErrorTranslation> {
        let lower = msg.to_lowercase();

        if lower.contains("permission denied")
            || lower.contains("operation not permitted")
            || lower.contains("you must be root")
        {
            return Some(
                ErrorTranslation::new("Insufficient permissions to modify firewall rules")
                    .with_suggestion("Run as root, or allow sudo/run0/pkexec for iptables")
                    .with_suggestion("Set RULEDECK_ELEVATION_METHOD=sudo for NOPASSWD setups"),
            );
        }

        if lower.contains("couldn't load target") || lower.contains("couldn't load match") {
            return Some(
                ErrorTranslation::new("Unknown target or match extension")
                    .with_suggestion("Targets are case-sensitive: ACCEPT, DROP, REJECT, LOG")
                    .with_suggestion("The kernel module for this extension may be missing"),
            );
        }

        if lower.contains("no such file") || lower.contains("command not found") {
            return Some(
                ErrorTranslation::new("iptables is not installed or not found in PATH")
                    .with_suggestion("Install iptables: sudo apt install iptables  (Debian/Ubuntu)")
                    .with_suggestion("Or point RULEDECK_IPTABLES_COMMAND at the binary"),
            );
        }

        if lower.contains("bad rule") || lower.contains("does a matching rule exist") {
            return Some(
                ErrorTranslation::new("Rule not found in chain")
                    .with_suggestion("The rule list may be stale; refresh and try again"),
            );
        }

        if lower.contains("index of insertion too big")
            || lower.contains("index of replacement too big")
            || lower.contains("index of deletion too big")
        {
            return Some(
                ErrorTranslation::new("Rule position is past the end of the chain")
                    .with_suggestion("Refresh to see current rule numbers"),
            );
        }

        if lower.contains("no chain/target/match by that name") {
            return Some(
                ErrorTranslation::new("Unknown chain, target or match extension")
                    .with_suggestion("Check the chain exists: iptables -L -n")
                    .with_suggestion("Check the target name is spelled in upper case (ACCEPT, DROP)")
                    .with_suggestion("Match options may need '-m <module>' first"),
            );
        }

        if lower.contains("unknown option") || lower.contains("bad argument") {
            return Some(
                ErrorTranslation::new("Invalid rule specification")
                    .with_suggestion("Port options require '-p tcp' or '-p udp'")
                    .with_suggestion("Check the free-text extension for typos"),
            );
        }

        if lower.contains("host/network") && lower.contains("not found") {
            return Some(
                ErrorTranslation::new("Invalid source or destination address")
                    .with_suggestion("Use 192.168.1.1 or 192.168.1.0/24 style addresses"),
            );
        }

        if lower.contains("resource temporarily unavailable") || lower.contains("xtables lock") {
            return Some(
                ErrorTranslation::new("Another process holds the xtables lock")
                    .with_suggestion("Wait a moment and try again"),
            );
        }

        if lower.contains("connection refused")
            || lower.contains("could not resolve hostname")
            || lower.contains("connection timed out")
        {
            return Some(
                ErrorTranslation::new("Cannot reach the remote host over SSH")
                    .with_suggestion("Check the ssh section of the config file")
                    .with_suggestion("Try: ssh <user>@<host> iptables -L -n"),
            );
        }

        None
    }
}

pub type Result<T> = std::result::Result<T, Error>;
