//! stb-reconcile
//!
//! Roster -> directory role reconciliation.
//!
//! - [`DirectorySnapshot`]: one fresh read of identities and roles per run.
//! - [`plan_entry`]: pure per-user desired state, one [`DimensionChange`]
//!   per set dimension (add target, remove the rest of the dimension).
//! - [`reconcile`]: applies plans through the directory, creates missing
//!   team roles into a new [`Batch`], assigns team roles. Continue-on-error;
//!   no atomicity.
//! - [`BatchLedger`]: persisted record of created team roles for rollback.
//!
//! All run state lives in a caller-owned [`ReconcileContext`]; nothing is
//! process-global.

mod engine;
mod ledger;
mod plan;
mod snapshot;

pub use engine::{
    reconcile, MutationKind, ReconcileContext, RunFailure, RunReport, Skip, SkipReason,
};
pub use ledger::{Batch, BatchLedger, DeleteReport, LedgerError, TeamRecord, NO_FREE_ID};
pub use plan::{plan_entry, DimensionChange};
pub use snapshot::DirectorySnapshot;
