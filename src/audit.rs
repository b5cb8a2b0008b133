//! Audit trail of rule mutations
//!
//! Every create, replace and delete sent to the rule store is appended to a
//! JSON-lines file in the state directory, whether it succeeded or not.
//! `ruledeck history` reads it back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Kinds of rule mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    CreateRule,
    ReplaceRule,
    DeleteRule,
}

/// The rule a mutation addressed and the text that was sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleChange {
    pub chain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    /// Insertion point of a create; absent means appended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification: Option<String>,
}

impl RuleChange {
    pub fn create(chain: &str, specification: &str, position: Option<u32>) -> Self {
        Self {
            chain: chain.to_string(),
            position,
            specification: Some(specification.to_string()),
            ..Self::default()
        }
    }

    pub fn replace(chain: &str, number: u32, specification: &str) -> Self {
        Self {
            chain: chain.to_string(),
            number: Some(number),
            specification: Some(specification.to_string()),
            ..Self::default()
        }
    }

    pub fn delete(chain: &str, number: u32) -> Self {
        Self {
            chain: chain.to_string(),
            number: Some(number),
            ..Self::default()
        }
    }
}

/// `INPUT 3: -p tcp -j DROP`, `INPUT @1: -j ACCEPT` for positioned creates
impl fmt::Display for RuleChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.chain)?;
        if let Some(number) = self.number {
            write!(f, " {number}")?;
        } else if let Some(position) = self.position {
            write!(f, " @{position}")?;
        }
        if let Some(specification) = &self.specification {
            write!(f, ": {specification}")?;
        }
        Ok(())
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,

    pub event_type: EventType,

    /// Whether the rule store accepted the change
    pub success: bool,

    pub change: RuleChange,

    /// Rule store message if the change was rejected
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(
        event_type: EventType,
        change: RuleChange,
        outcome: std::result::Result<(), String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            success: outcome.is_ok(),
            change,
            error: outcome.err(),
        }
    }

    /// One history line: local time, event, status and the change.
    pub fn summary(&self) -> String {
        let status = if self.success { "ok" } else { "failed" };
        format!(
            "{}  {:<12}  {:<6}  {}",
            self.timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S"),
            self.event_type.to_string(),
            status,
            self.change
        )
    }
}

/// Audit log writer
#[derive(Debug, Clone)]
pub struct AuditLog {
    log_path: PathBuf,
}

impl AuditLog {
    /// Opens `audit.log` in the state directory
    ///
    /// # Errors
    ///
    /// Returns `Err` if state directory cannot be determined
    pub fn new() -> std::io::Result<Self> {
        let mut log_path = crate::utils::get_state_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "State directory not found")
        })?;
        log_path.push("audit.log");

        Ok(Self { log_path })
    }

    /// Creates an audit log writing to `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: path.into(),
        }
    }

    /// Appends one JSON line and syncs the file
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be opened or written
    pub async fn log(&self, event: AuditEvent) -> std::io::Result<()> {
        let json = serde_json::to_string(&event)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;

        Ok(())
    }

    /// Records an event, logging (not returning) write failures.
    pub async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log(event).await {
            tracing::warn!("Failed to write audit log: {}", e);
        }
    }

    /// Reads the last `count` entries, newest first. Unparseable lines
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be read
    pub async fn read_recent(&self, count: usize) -> std::io::Result<Vec<AuditEvent>> {
        let content = tokio::fs::read_to_string(&self.log_path).await?;

        let events: Vec<AuditEvent> = content
            .lines()
            .rev()
            .take(count)
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        Ok(events)
    }

    /// Returns the path to the audit log file
    pub fn path(&self) -> &Path {
        &self.log_path
    }
}
