//! Edit session state machine
//!
//! One create/edit transaction at a time:
//!
//! ```text
//! Idle ──open──▶ Composing ──begin_submit──▶ Submitting
//!                  ▲    │                       │
//!                  │    └──cancel──▶ Idle ◀─────┤ settle(Ok)
//!                  └────────settle(Err)─────────┘
//! ```
//!
//! Submitting only blocks a second submit. The draft stays editable while
//! the remote call is outstanding, and a failed call hands it back
//! unchanged together with the rule store's message.

use crate::core::error::{Error, Result};
use crate::core::model::Rule;
use crate::core::spec::{RuleFields, compose, decompose};
use std::fmt;
use tracing::{debug, info};

/// Whether the draft creates a new rule or replaces an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum EditMode {
    #[strum(serialize = "create")]
    Create,
    #[strum(serialize = "edit")]
    Edit,
}

/// Observable phase of an [`EditSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SessionState {
    Idle,
    Composing,
    Submitting,
}

/// Working values of the rule form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    mode: EditMode,
    chain: String,
    seed: Option<Rule>,
    /// 1-based insertion point for new rules; appended when `None`
    pub position: Option<u32>,
    pub fields: RuleFields,
}

impl EditDraft {
    /// Blank draft for a new rule, optionally preselecting a chain.
    pub fn create(chain: Option<&str>) -> Self {
        Self {
            mode: EditMode::Create,
            chain: chain.unwrap_or_default().to_string(),
            seed: None,
            position: None,
            fields: RuleFields::default(),
        }
    }

    /// Draft seeded from an existing rule of `chain`.
    pub fn edit(chain: &str, rule: &Rule) -> Self {
        Self {
            mode: EditMode::Edit,
            chain: chain.to_string(),
            seed: Some(rule.clone()),
            position: None,
            fields: decompose(rule),
        }
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Rule the draft was opened from (edit mode only)
    pub fn seed(&self) -> Option<&Rule> {
        self.seed.as_ref()
    }

    /// Chain selection is fixed while editing: `(chain, number)` identifies
    /// the rule being replaced.
    pub fn chain_locked(&self) -> bool {
        self.mode == EditMode::Edit
    }

    /// # Errors
    ///
    /// Returns [`Error::Validation`] in edit mode.
    pub fn set_chain(&mut self, chain: impl Into<String>) -> Result<()> {
        if self.chain_locked() {
            return Err(Error::validation(
                "chain",
                "The chain of an existing rule cannot be changed",
            ));
        }
        self.chain = chain.into();
        Ok(())
    }

    /// Specification text for the current field values.
    ///
    /// # Errors
    ///
    /// See [`compose`].
    pub fn specification(&self) -> Result<String> {
        compose(&self.chain, &self.fields)
    }

    fn request(&self) -> Result<SubmitRequest> {
        if self.chain.trim().is_empty() {
            return Err(Error::validation("chain", "Select a chain"));
        }
        if self.fields.target.trim().is_empty() {
            return Err(Error::validation("target", "Select a target"));
        }
        let specification = self.specification()?;

        match (&self.seed, self.mode) {
            (Some(seed), EditMode::Edit) if seed.number == 0 => Err(Error::validation(
                "rule",
                "This listing row has no rule number and cannot be edited",
            )),
            (Some(seed), EditMode::Edit) => Ok(SubmitRequest::Update {
                chain: self.chain.clone(),
                number: seed.number,
                specification,
            }),
            (None, EditMode::Edit) => Err(Error::Internal(
                "edit draft has no seed rule".to_string(),
            )),
            (_, EditMode::Create) => {
                if self.position == Some(0) {
                    return Err(Error::validation("position", "Positions start at 1"));
                }
                Ok(SubmitRequest::Create {
                    chain: self.chain.clone(),
                    specification,
                    position: self.position,
                })
            }
        }
    }
}

/// Remote call a submit resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitRequest {
    Create {
        chain: String,
        specification: String,
        position: Option<u32>,
    },
    Update {
        chain: String,
        number: u32,
        specification: String,
    },
}

/// Message attached to a draft after a failed submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// Local check failed; nothing was sent
    Invalid { field: String, message: String },
    /// The rule store rejected the change
    Remote(String),
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::Invalid { field, message } => write!(f, "{field}: {message}"),
            Feedback::Remote(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum EditSession {
    #[default]
    Idle,
    Composing {
        draft: EditDraft,
        feedback: Option<Feedback>,
    },
    Submitting {
        draft: EditDraft,
    },
}

impl EditSession {
    pub fn state(&self) -> SessionState {
        match self {
            EditSession::Idle => SessionState::Idle,
            EditSession::Composing { .. } => SessionState::Composing,
            EditSession::Submitting { .. } => SessionState::Submitting,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, EditSession::Submitting { .. })
    }

    /// Starts a session, discarding any uncommitted one.
    pub fn open(&mut self, draft: EditDraft) {
        if !matches!(self, EditSession::Idle) {
            debug!("Discarding open {} session", self.state());
        }
        debug!("Opening {} session on chain '{}'", draft.mode, draft.chain);
        *self = EditSession::Composing {
            draft,
            feedback: None,
        };
    }

    pub fn draft(&self) -> Option<&EditDraft> {
        match self {
            EditSession::Idle => None,
            EditSession::Composing { draft, .. } | EditSession::Submitting { draft } => Some(draft),
        }
    }

    /// Draft for field edits; available while composing and submitting.
    pub fn draft_mut(&mut self) -> Option<&mut EditDraft> {
        match self {
            EditSession::Idle => None,
            EditSession::Composing { draft, .. } | EditSession::Submitting { draft } => Some(draft),
        }
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        match self {
            EditSession::Composing { feedback, .. } => feedback.as_ref(),
            _ => None,
        }
    }

    /// Validates the draft and moves to Submitting.
    ///
    /// # Errors
    ///
    /// - [`Error::NoSession`] when idle
    /// - [`Error::Busy`] while a submit is outstanding
    /// - [`Error::Validation`] when chain or target is blank or the
    ///   specification cannot be composed; the session stays in Composing
    ///   with the message attached
    pub fn begin_submit(&mut self) -> Result<SubmitRequest> {
        match self {
            EditSession::Idle => Err(Error::NoSession),
            EditSession::Submitting { .. } => Err(Error::Busy),
            EditSession::Composing { draft, feedback } => match draft.request() {
                Ok(request) => {
                    let draft = draft.clone();
                    *self = EditSession::Submitting { draft };
                    Ok(request)
                }
                Err(err) => {
                    *feedback = Some(match &err {
                        Error::Validation { field, message } => Feedback::Invalid {
                            field: field.clone(),
                            message: message.clone(),
                        },
                        other => Feedback::Invalid {
                            field: "specification".to_string(),
                            message: other.to_string(),
                        },
                    });
                    Err(err)
                }
            },
        }
    }

    /// Applies the outcome of the remote call started by
    /// [`begin_submit`](Self::begin_submit).
    ///
    /// Success closes the session. Failure returns to Composing with the
    /// fields as they are now and the rule store's message. Outcomes that
    /// arrive after a cancel are ignored.
    pub fn settle(&mut self, outcome: &Result<()>) {
        if !self.is_busy() {
            debug!("Ignoring submit outcome: session no longer submitting");
            return;
        }
        let EditSession::Submitting { draft } = std::mem::take(self) else {
            return;
        };

        match outcome {
            Ok(()) => {
                info!("Saved {} rule on chain '{}'", draft.mode, draft.chain);
            }
            Err(err) => {
                let fallback = match draft.mode {
                    EditMode::Create => "Failed to add rule",
                    EditMode::Edit => "Failed to update rule",
                };
                let message = err.remote_message(fallback);
                *self = EditSession::Composing {
                    draft,
                    feedback: Some(Feedback::Remote(message)),
                };
            }
        }
    }

    /// Drops the draft unconditionally.
    pub fn cancel(&mut self) {
        if !matches!(self, EditSession::Idle) {
            debug!("Cancelled {} session", self.state());
        }
        *self = EditSession::Idle;
    }
}
