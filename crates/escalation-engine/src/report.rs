//! Read-side load reporting.
//!
//! The per-senior load figures use exactly the formula the balancer
//! uses during a sweep, so the numbers an operator sees match the
//! balancing behavior they observe.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Workload snapshot for one senior employee.
#[derive(Debug, Clone, Serialize)]
pub struct SeniorLoad {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    /// Complaints escalated to this senior, any status.
    pub escalated_count: i64,
    /// Directly assigned, unresolved, non-escalated complaints.
    pub assigned_count: i64,
    /// `escalated_count + assigned_count`; the balancer's load key.
    pub total_load: i64,
    /// Escalated complaints ever handled by this senior.
    pub total_handled: i64,
    /// Escalated complaints resolved by this senior.
    pub resolved_count: i64,
    /// Percentage of escalated complaints resolved, rounded to two
    /// decimal places.
    pub resolution_rate: f64,
}

/// Load report across all senior employees, least loaded first.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub senior_employees: Vec<SeniorLoad>,
    pub total_senior_employees: usize,
    pub total_escalated_complaints: i64,
    pub escalation_threshold_minutes: i64,
    pub generated_at: DateTime<Utc>,
}

impl SeniorLoad {
    /// Resolution rate as a percentage, rounded to two decimals.
    pub fn rate(resolved: i64, handled: i64) -> f64 {
        if handled == 0 {
            return 0.0;
        }
        let rate = (resolved as f64 / handled as f64) * 100.0;
        (rate * 100.0).round() / 100.0
    }
}
