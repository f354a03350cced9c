use std::sync::Arc;

use crate::chores::ChoreStore;
use crate::completion::CompletionTracker;
use crate::directory::GroupDirectory;
use crate::proposals::ProposalEngine;
use crate::recurrence::RecurrenceGenerator;
use crate::storage::DocumentStore;

/// Every component wired to one backend; what a client device holds.
#[derive(Clone)]
pub struct Household {
    pub directory: GroupDirectory,
    pub chores: ChoreStore,
    pub proposals: ProposalEngine,
    pub recurrence: RecurrenceGenerator,
    pub completion: CompletionTracker,
}

impl Household {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self {
            directory: GroupDirectory::new(Arc::clone(&backend)),
            chores: ChoreStore::new(Arc::clone(&backend)),
            proposals: ProposalEngine::new(Arc::clone(&backend)),
            recurrence: RecurrenceGenerator::new(Arc::clone(&backend)),
            completion: CompletionTracker::new(backend),
        }
    }
}
