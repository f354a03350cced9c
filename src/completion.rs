//! Completion toggling, the completion log and equity statistics.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::chores::ChoreStore;
use crate::directory::GroupDirectory;
use crate::error::Result;
use crate::models::{Chore, ChoreLog, GroupKey, Member, MemberColor};
use crate::storage::{logs_collection, DocumentStore};

/// What a toggle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Marked complete; `log_id` is the appended log entry.
    Completed { log_id: String },
    /// Marked incomplete again. Earlier log entries are kept.
    Reopened,
}

/// Share of `completed` in `total`, 0 when there is nothing to complete.
pub fn completion_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64
    }
}

/// Per-member completion figures.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberEquity {
    pub member_id: String,
    pub name: String,
    pub color: MemberColor,
    pub assigned: usize,
    pub completed: usize,
    pub completion_rate: f64,
    /// Completion events in the log credited to this member, including ones
    /// since reopened or deleted.
    pub logged_completions: usize,
}

/// Household-wide completion figures derived from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityReport {
    pub total_chores: usize,
    pub total_completed: usize,
    pub house_completion_rate: f64,
    pub members: Vec<MemberEquity>,
}

impl EquityReport {
    /// Computes the report. Proposals are not active chores and are not
    /// counted.
    pub fn compute(chores: &[Chore], members: &[Member], logs: &[ChoreLog]) -> EquityReport {
        let active: Vec<&Chore> = chores.iter().filter(|c| !c.proposal).collect();
        let total_completed = active.iter().filter(|c| c.completed).count();

        let mut logged: HashMap<&str, usize> = HashMap::new();
        for entry in logs {
            for user in &entry.completed_by {
                *logged.entry(user.as_str()).or_default() += 1;
            }
        }

        let members = members
            .iter()
            .map(|m| {
                let assigned: Vec<&&Chore> = active.iter().filter(|c| c.is_assigned_to(&m.id)).collect();
                let completed = assigned.iter().filter(|c| c.completed).count();
                MemberEquity {
                    member_id: m.id.clone(),
                    name: m.name.clone(),
                    color: m.color,
                    assigned: assigned.len(),
                    completed,
                    completion_rate: completion_rate(completed, assigned.len()),
                    logged_completions: logged.get(m.id.as_str()).copied().unwrap_or(0),
                }
            })
            .collect();

        EquityReport {
            total_chores: active.len(),
            total_completed,
            house_completion_rate: completion_rate(total_completed, active.len()),
            members,
        }
    }
}

#[derive(Clone)]
pub struct CompletionTracker {
    backend: Arc<dyn DocumentStore>,
    chores: ChoreStore,
    directory: GroupDirectory,
}

impl CompletionTracker {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self {
            chores: ChoreStore::new(Arc::clone(&backend)),
            directory: GroupDirectory::new(Arc::clone(&backend)),
            backend,
        }
    }

    /// Flips a chore between complete and incomplete.
    ///
    /// Completing records the member's display name and time on the chore
    /// and appends a log entry. Reopening clears both fields; the log keeps
    /// its history.
    pub fn toggle(&self, group: GroupKey, chore_id: &str, user_id: &str) -> Result<CompletionOutcome> {
        let mut chore = self.chores.require(group, chore_id)?;

        if chore.completed {
            chore.completed = false;
            chore.completed_by = None;
            chore.completed_at = None;
            self.chores.edit(chore_id, &chore, group)?;
            debug!(group = %group, chore = chore_id, "chore reopened");
            return Ok(CompletionOutcome::Reopened);
        }

        let now = Local::now().to_rfc3339();
        chore.completed = true;
        chore.completed_by = Some(self.directory.display_name(user_id));
        chore.completed_at = Some(now.clone());
        self.chores.edit(chore_id, &chore, group)?;

        let entry = ChoreLog {
            id: Uuid::new_v4().to_string(),
            timestamp: now,
            chore_id: chore_id.to_string(),
            completed_by: vec![user_id.to_string()],
        };
        self.backend
            .insert(&logs_collection(group), &entry.id, entry.to_document()?)?;
        debug!(group = %group, chore = chore_id, user = user_id, "chore completed");
        Ok(CompletionOutcome::Completed { log_id: entry.id })
    }

    /// Completion log, newest first.
    pub fn history(&self, group: GroupKey) -> Result<Vec<ChoreLog>> {
        let mut entries: Vec<ChoreLog> = self
            .backend
            .list(&logs_collection(group))?
            .iter()
            .filter_map(|(id, doc)| {
                let entry = ChoreLog::from_document(id, doc);
                if entry.is_none() {
                    warn!(id = %id, "skipping log entry without a chore reference");
                }
                entry
            })
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    /// Equity report for the household's current state.
    pub fn equity(&self, group: GroupKey) -> Result<EquityReport> {
        let chores = self.chores.list(group)?;
        let members = self.directory.members(group)?;
        let logs = self.history(group)?;
        Ok(EquityReport::compute(&chores, &members, &logs))
    }
}
