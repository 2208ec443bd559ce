//! # Complaint-Core
//!
//! Domain model and persistence for the ResolveIt complaint backend.
//!
//! This crate provides:
//! - The `Complaint` and `User` entities with their lifecycle rules,
//!   including the staleness check that drives escalation
//! - `ComplaintStore` / `UserStore` traits describing the persistence
//!   contract the escalation engine depends on
//! - `SqliteStore`, a sqlx-backed SQLite implementation of both traits
//!
//! ## Architecture
//!
//! Complaint-core owns entity state and how it is derived; the
//! escalation engine (resolveit-escalation-engine) owns the decisions:
//! when to escalate, to whom, and on what schedule.

pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::{ComplaintStore, EscalationGrant, SqliteStore, UserStore};
pub use types::{
    Complaint, ComplaintStatus, NewComplaint, NewUser, Role, Urgency, User,
};
