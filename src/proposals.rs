//! New chores, household approval and voting.
//!
//! In a household of more than one member a new chore starts as a
//! proposal: it is hidden from the active lists until someone approves it
//! from the dashboard or it gathers more than [`VOTE_QUORUM`] approving
//! votes. A single-member household skips the proposal step.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chores::ChoreStore;
use crate::directory::GroupDirectory;
use crate::error::{ChoreError, Result};
use crate::models::{fields, Chore, ChoreDraft, GroupKey};
use crate::recurrence::RecurrenceGenerator;
use crate::storage::{chores_collection, DocumentStore};

/// A proposal closes once its approving votes exceed this count, whatever
/// the household size.
pub const VOTE_QUORUM: u32 = 4;

/// Result of casting a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Vote counted. `closed` is set when this vote pushed the proposal past
    /// the quorum.
    Recorded { votes: u32, closed: bool },
    /// This user already voted; nothing changed.
    AlreadyVoted,
    /// The chore is not a proposal (anymore); nothing changed.
    NotProposed,
}

/// Result of a direct approve or reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalOutcome {
    /// Proposal is now active; `generated` occurrences were written for its
    /// series.
    Approved { series_id: String, generated: usize },
    Rejected,
    /// The chore is not a proposal; nothing changed.
    NotProposed,
}

#[derive(Clone)]
pub struct ProposalEngine {
    backend: Arc<dyn DocumentStore>,
    directory: GroupDirectory,
    chores: ChoreStore,
    recurrence: RecurrenceGenerator,
}

impl ProposalEngine {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self {
            directory: GroupDirectory::new(Arc::clone(&backend)),
            chores: ChoreStore::new(Arc::clone(&backend)),
            recurrence: RecurrenceGenerator::new(Arc::clone(&backend)),
            backend,
        }
    }

    /// Creates a chore on behalf of `user_id` in their household.
    ///
    /// Needs approval when the household has more than one member. An
    /// auto-approved repeating chore has its series written immediately.
    pub fn submit(&self, draft: ChoreDraft, user_id: &str) -> Result<Chore> {
        let group = self.directory.group_of(user_id)?;
        let needs_approval = self.directory.member_count(group)? > 1;

        let mut chore = draft.into_chore(user_id)?;
        chore.proposal = needs_approval;
        if chore.repetition.is_repeating() {
            chore.series_id = Uuid::new_v4().to_string();
        }
        let created = self.chores.create(&chore, group)?;

        if !needs_approval && created.repetition.is_repeating() {
            self.recurrence.generate(&created, group, &created.series_id)?;
        }
        info!(
            group = %group,
            id = %created.id,
            proposal = created.proposal,
            "chore submitted"
        );
        Ok(created)
    }

    /// Casts `user_id`'s vote on a proposal.
    ///
    /// The voter check, the count and the quorum close happen in one
    /// transaction on the chore document. A repeating chore closed by votes
    /// gets its occurrences generated, as with [`approve`](Self::approve).
    pub fn vote(&self, group: GroupKey, chore_id: &str, user_id: &str, approve: bool) -> Result<VoteOutcome> {
        let collection = chores_collection(group);
        let mut outcome = VoteOutcome::NotProposed;
        let mut closing: Option<Chore> = None;
        self.backend.update(&collection, chore_id, &mut |doc| {
            closing = None;
            let mut chore = Chore::from_document(chore_id, doc)
                .ok_or_else(|| ChoreError::not_found(&collection, chore_id))?;
            if !chore.proposal {
                outcome = VoteOutcome::NotProposed;
                return Ok(());
            }
            if chore.has_voted(user_id) {
                outcome = VoteOutcome::AlreadyVoted;
                return Ok(());
            }

            chore.voters.push(user_id.to_string());
            if approve {
                chore.votes += 1;
            }
            let closed = chore.votes > VOTE_QUORUM;

            doc.insert(fields::VOTERS.into(), Value::from(chore.voters.clone()));
            doc.insert(fields::VOTES.into(), Value::from(chore.votes));
            outcome = VoteOutcome::Recorded { votes: chore.votes, closed };
            if closed {
                chore.proposal = false;
                doc.insert(fields::PROPOSAL.into(), Value::from(false));
                if chore.repetition.is_repeating() && chore.series_id.is_empty() {
                    chore.series_id = Uuid::new_v4().to_string();
                    doc.insert(fields::SERIES_ID.into(), Value::from(chore.series_id.clone()));
                }
                closing = Some(chore);
            }
            Ok(())
        })?;

        if let Some(chore) = closing {
            let generated = self.recurrence.generate(&chore, group, &chore.series_id)?.len();
            info!(group = %group, chore = chore_id, votes = chore.votes, generated, "proposal closed by votes");
        } else {
            debug!(group = %group, chore = chore_id, user = user_id, ?outcome, "vote handled");
        }
        Ok(outcome)
    }

    /// Approves a proposal without waiting for votes. A repeating chore gets
    /// a fresh series id and its occurrences are generated.
    pub fn approve(&self, group: GroupKey, chore_id: &str) -> Result<ProposalOutcome> {
        let collection = chores_collection(group);
        let mut approved: Option<Chore> = None;
        self.backend.update(&collection, chore_id, &mut |doc| {
            let mut chore = Chore::from_document(chore_id, doc)
                .ok_or_else(|| ChoreError::not_found(&collection, chore_id))?;
            if !chore.proposal {
                approved = None;
                return Ok(());
            }
            chore.proposal = false;
            chore.series_id = if chore.repetition.is_repeating() {
                Uuid::new_v4().to_string()
            } else {
                String::new()
            };
            doc.insert(fields::PROPOSAL.into(), Value::from(false));
            doc.insert(fields::SERIES_ID.into(), Value::from(chore.series_id.clone()));
            approved = Some(chore);
            Ok(())
        })?;

        let Some(chore) = approved else {
            return Ok(ProposalOutcome::NotProposed);
        };
        let generated = self.recurrence.generate(&chore, group, &chore.series_id)?.len();
        info!(group = %group, chore = chore_id, generated, "proposal approved");
        Ok(ProposalOutcome::Approved {
            series_id: chore.series_id,
            generated,
        })
    }

    /// Discards a proposal. The document is deleted outright.
    pub fn reject(&self, group: GroupKey, chore_id: &str) -> Result<ProposalOutcome> {
        let chore = self.chores.require(group, chore_id)?;
        if !chore.proposal {
            return Ok(ProposalOutcome::NotProposed);
        }
        self.chores.delete(chore_id, group)?;
        info!(group = %group, chore = chore_id, "proposal rejected");
        Ok(ProposalOutcome::Rejected)
    }
}
