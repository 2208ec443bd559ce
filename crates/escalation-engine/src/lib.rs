//! # Escalation-Engine
//!
//! The escalation core of the ResolveIt complaint backend.
//!
//! This crate provides:
//! - The staleness policy that decides when a complaint needs a senior
//!   handler, applied as a batch over the store
//! - Least-loaded target selection with deterministic tie-breaking
//! - A periodic sweep scheduler plus a synchronous trigger
//! - Manual escalation and de-escalation with role validation
//! - Per-senior load reporting consistent with the balancer's formula
//!
//! ## Architecture
//!
//! The engine reads and writes complaints exclusively through the
//! `ComplaintStore` / `UserStore` traits from
//! `resolveit-complaint-core`. Each sweep rebuilds its load ledger from
//! authoritative reads, escalates eligible complaints oldest-first via
//! a conditional store update (so a concurrent manual escalation wins
//! cleanly), and swallows per-item failures rather than aborting the
//! batch.
//!
//! ```no_run
//! use std::sync::Arc;
//! use resolveit_complaint_core::SqliteStore;
//! use resolveit_escalation_engine::{scheduler, EscalationConfig, EscalationEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteStore::new("sqlite://resolveit.db?mode=rwc").await?);
//! let engine = Arc::new(EscalationEngine::with_store(store, EscalationConfig::from_env()));
//!
//! // Periodic sweeps in the background...
//! let handle = scheduler::spawn(engine.clone());
//!
//! // ...or one synchronous pass, e.g. from an admin endpoint.
//! let outcome = engine.trigger_auto_escalation().await?;
//! println!("escalated {} complaints", outcome.escalated);
//! # handle.abort();
//! # Ok(())
//! # }
//! ```

pub mod balancer;
pub mod config;
pub mod engine;
pub mod error;
pub mod policy;
pub mod report;
pub mod scheduler;

pub use balancer::LoadLedger;
pub use config::EscalationConfig;
pub use engine::{EscalationEngine, SweepOutcome};
pub use error::{EscalationError, Result};
pub use report::{LoadReport, SeniorLoad};
