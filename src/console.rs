//! Operator console state
//!
//! [`Console`] is the single record behind every screen or command: the
//! last fetched rule collection, the search keyword, the view mode, the
//! open edit session and the last error. All mutations go through the
//! [`RuleStore`] and are followed by a full refresh.

use crate::audit::{AuditEvent, AuditLog, EventType, RuleChange};
use crate::core::error::{Error, Result};
use crate::core::index::{RuleView, ViewMode};
use crate::core::model::{Chain, find_rule};
use crate::core::options::PickLists;
use crate::core::session::{EditDraft, EditSession, SubmitRequest};
use crate::core::store::RuleStore;
use tracing::{debug, error, info, warn};

const FETCH_FALLBACK: &str = "Failed to fetch rules";
const ADD_FALLBACK: &str = "Failed to add rule";
const UPDATE_FALLBACK: &str = "Failed to update rule";
const DELETE_FALLBACK: &str = "Failed to delete rule";

pub struct Console<S: RuleStore> {
    store: S,
    chains: Vec<Chain>,
    keyword: String,
    view_mode: ViewMode,
    session: EditSession,
    last_error: Option<String>,
    audit: Option<AuditLog>,
}

impl<S: RuleStore> Console<S> {
    /// Console with an empty collection; call [`refresh`](Self::refresh)
    /// to load it.
    pub fn new(store: S, view_mode: ViewMode) -> Self {
        Self {
            store,
            chains: Vec::new(),
            keyword: String::new(),
            view_mode,
            session: EditSession::default(),
            last_error: None,
            audit: None,
        }
    }

    /// Records every mutation in `audit`.
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Replaces the collection with a fresh fetch.
    ///
    /// On failure the previous collection is kept and `last_error` holds
    /// the rule store's message.
    pub async fn refresh(&mut self) -> Result<()> {
        let result = self.store.fetch_chains().await;

        match result {
            Ok(chains) => {
                info!(
                    "Loaded {} chains, {} rules",
                    chains.len(),
                    chains.iter().map(|c| c.rules.len()).sum::<usize>()
                );
                self.chains = chains;
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                let message = err.remote_message(FETCH_FALLBACK);
                error!("{}", message);
                self.last_error = Some(message);
                Err(err)
            }
        }
    }

    pub fn set_keyword(&mut self, keyword: impl Into<String>) {
        self.keyword = keyword.into();
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    /// Current keyword and mode applied to the full collection.
    pub fn view(&self) -> RuleView {
        RuleView::new(&self.chains, &self.keyword, self.view_mode)
    }

    /// Pick lists for the open draft, or for a blank form when idle.
    pub fn pick_lists(&self) -> PickLists {
        PickLists::build(&self.chains, self.session.draft())
    }

    /// Opens a blank create draft, replacing any open session.
    pub fn open_create(&mut self, chain: Option<&str>) {
        self.session.open(EditDraft::create(chain));
    }

    /// Opens an edit draft for rule `number` of `chain`.
    ///
    /// Returns `false` and leaves the session untouched when the rule is
    /// not in the collection (the view it was picked from is stale), or
    /// when it is an unnumbered listing row.
    pub fn open_edit(&mut self, chain: &str, number: u32) -> bool {
        if number == 0 {
            debug!("Unnumbered row in {} cannot be edited", chain);
            return false;
        }
        match find_rule(&self.chains, chain, number) {
            Some(rule) => {
                let draft = EditDraft::edit(chain, rule);
                self.session.open(draft);
                true
            }
            None => {
                debug!("Rule {}#{} not found; ignoring edit", chain, number);
                false
            }
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut EditDraft> {
        self.session.draft_mut()
    }

    pub fn cancel(&mut self) {
        self.session.cancel();
    }

    /// Sends the open draft to the rule store.
    ///
    /// Validation failures return before any remote call and leave the
    /// draft open with feedback attached. A rejected submit also keeps the
    /// draft open, with the rule store's message.
    pub async fn submit(&mut self) -> Result<()> {
        let request = self.session.begin_submit()?;

        let (event_type, change, fallback) = match &request {
            SubmitRequest::Create {
                chain,
                specification,
                position,
            } => (
                EventType::CreateRule,
                RuleChange::create(chain, specification, *position),
                ADD_FALLBACK,
            ),
            SubmitRequest::Update {
                chain,
                number,
                specification,
            } => (
                EventType::ReplaceRule,
                RuleChange::replace(chain, *number, specification),
                UPDATE_FALLBACK,
            ),
        };

        let outcome = match &request {
            SubmitRequest::Create {
                chain,
                specification,
                position,
            } => {
                self.store
                    .create_rule(chain, specification, *position)
                    .await
            }
            SubmitRequest::Update {
                chain,
                number,
                specification,
            } => {
                self.store
                    .replace_rule(chain, *number, specification)
                    .await
            }
        };

        self.session.settle(&outcome);
        self.finish_mutation(event_type, change, outcome, fallback)
            .await
    }

    /// Adds a rule from raw specification text, bypassing the draft.
    pub async fn add_rule(
        &mut self,
        chain: &str,
        specification: &str,
        position: Option<u32>,
    ) -> Result<()> {
        if chain.trim().is_empty() || specification.trim().is_empty() {
            return Err(Error::validation(
                "specification",
                "chain and specification are required",
            ));
        }

        let outcome = self
            .store
            .create_rule(chain, specification, position)
            .await;
        let change = RuleChange::create(chain, specification, position);
        self.finish_mutation(EventType::CreateRule, change, outcome, ADD_FALLBACK)
            .await
    }

    pub async fn delete_rule(&mut self, chain: &str, number: u32) -> Result<()> {
        let outcome = self.store.delete_rule(chain, number).await;
        let change = RuleChange::delete(chain, number);
        self.finish_mutation(EventType::DeleteRule, change, outcome, DELETE_FALLBACK)
            .await
    }

    async fn finish_mutation(
        &mut self,
        event_type: EventType,
        change: RuleChange,
        outcome: Result<()>,
        fallback: &str,
    ) -> Result<()> {
        let message = outcome.as_ref().err().map(|e| e.remote_message(fallback));

        if let Some(audit) = &self.audit {
            audit
                .record(AuditEvent::new(
                    event_type,
                    change,
                    message.clone().map_or(Ok(()), Err),
                ))
                .await;
        }

        match outcome {
            Ok(()) => {
                self.last_error = None;
                if self.refresh().await.is_err() {
                    warn!("Change was applied but the rule list could not be reloaded");
                }
                Ok(())
            }
            Err(err) => {
                if let Some(message) = message {
                    error!("{}", message);
                    self.last_error = Some(message);
                }
                Err(err)
            }
        }
    }
}
