//! Escalation policy helpers: cutoff computation and the reason
//! strings recorded on escalated complaints.
//!
//! The eligibility rule itself lives on
//! [`Complaint::escalation_due`](resolveit_complaint_core::Complaint::escalation_due);
//! this module turns configuration into the cutoff instant the rule and
//! the store query both consume.

use chrono::{DateTime, Duration, Utc};
use resolveit_complaint_core::User;

/// The instant before which activity counts as stale.
pub fn cutoff(now: DateTime<Utc>, threshold: Duration) -> DateTime<Utc> {
    now - threshold
}

/// Reason recorded by the auto-escalation sweep.
pub fn auto_escalation_reason(threshold_minutes: i64) -> String {
    format!(
        "Auto-escalated: unresolved for {threshold_minutes} minutes; \
         routed to least-loaded senior"
    )
}

/// Audit string recorded on de-escalation.
pub fn deescalation_reason(actor: &User, note: Option<&str>) -> String {
    match note {
        Some(note) if !note.trim().is_empty() => {
            format!("De-escalated by {}: {}", actor.full_name, note.trim())
        }
        _ => format!("De-escalated by {}", actor.full_name),
    }
}
