//! Persistence contract for complaints and users.
//!
//! The escalation engine talks to storage exclusively through these
//! traits; [`SqliteStore`] is the bundled implementation. The one
//! non-obvious operation is [`ComplaintStore::try_escalate`]: it applies
//! the whole escalation mutation as a single conditional update so that
//! a sweep and a concurrent manual escalation cannot both claim the same
//! complaint.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Complaint, NewComplaint, NewUser, User};

/// The full escalation mutation, applied atomically by
/// [`ComplaintStore::try_escalate`].
#[derive(Debug, Clone)]
pub struct EscalationGrant {
    /// Senior employee receiving the complaint.
    pub target: i64,
    /// Machine-readable reason recorded on the complaint.
    pub reason: String,
    /// Escalation timestamp.
    pub at: DateTime<Utc>,
}

/// Complaint persistence operations.
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// Insert a new complaint with creation-time defaults applied.
    async fn create(&self, req: NewComplaint) -> Result<Complaint>;

    async fn find(&self, id: i64) -> Result<Option<Complaint>>;

    /// Persist every field of `complaint` (upsert-style full update).
    async fn save(&self, complaint: &Complaint) -> Result<Complaint>;

    /// Complaints satisfying the staleness rule as of `cutoff`, oldest
    /// first. Excludes escalated and resolved complaints.
    async fn find_eligible_for_escalation(&self, cutoff: DateTime<Utc>) -> Result<Vec<Complaint>>;

    async fn find_by_escalated_to(&self, user_id: i64) -> Result<Vec<Complaint>>;

    async fn find_by_assigned_employee(&self, user_id: i64) -> Result<Vec<Complaint>>;

    async fn count_by_escalated_to(&self, user_id: i64) -> Result<i64>;

    /// Every escalated complaint, newest escalation first.
    async fn find_all_escalated(&self) -> Result<Vec<Complaint>>;

    /// Atomically escalate complaint `id` if and only if it is not
    /// already escalated. Returns `false` (not an error) when another
    /// writer escalated it first or the complaint does not exist.
    async fn try_escalate(&self, id: i64, grant: &EscalationGrant) -> Result<bool>;
}

/// User persistence operations.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, req: NewUser) -> Result<User>;

    async fn find_user(&self, id: i64) -> Result<Option<User>>;

    /// All users holding the SENIOR_EMPLOYEE role, ordered by id.
    async fn find_senior_employees(&self) -> Result<Vec<User>>;
}
