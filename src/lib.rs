//! # Choreboard
//!
//! Shared household chore tracking on top of a document database.
//!
//! ## Features
//!
//! *   **Group scope**: every chore and log entry belongs to one household,
//!     identified by a numeric group key.
//! *   **Proposals**: in households with more than one member new chores wait
//!     for approval, either directly or by votes.
//! *   **Recurrence**: repeating chores are expanded into dated occurrences
//!     for one year, sharing a series id, and the future part of a series can
//!     be deleted in one batch.
//! *   **Equity**: per-member and house-wide completion rates, computed from
//!     the current chores.
//! *   **Live snapshots**: subscribers receive the full chore list after every
//!     change.
//!
//! ## Backends
//!
//! The core talks to a [`storage::DocumentStore`]. Two backends ship with
//! the crate: [`storage::MemoryStore`] and [`storage::JsonFileStore`], which
//! keeps one JSON file per collection under the data directory
//! (`CHORES_DB`, default `~/.local/share/choreboard`).

pub mod chores;
pub mod commands;
pub mod completion;
pub mod config;
pub mod directory;
pub mod error;
pub mod feed;
pub mod household;
pub mod models;
pub mod ordering;
pub mod proposals;
pub mod recurrence;
pub mod storage;

pub use chores::ChoreStore;
pub use completion::{CompletionOutcome, CompletionTracker, EquityReport, MemberEquity};
pub use directory::GroupDirectory;
pub use error::{ChoreError, Result};
pub use feed::{ChoreSnapshot, Subscription, SubscriptionHandle};
pub use household::Household;
pub use models::{Chore, ChoreDraft, ChoreLog, GroupKey, Member, MemberColor, PriorityLevel, RepetitionTime};
pub use proposals::{ProposalEngine, ProposalOutcome, VoteOutcome, VOTE_QUORUM};
pub use recurrence::RecurrenceGenerator;
pub use storage::{DocumentStore, JsonFileStore, MemoryStore};
