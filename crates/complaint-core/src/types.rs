//! Core domain types for the complaint backend.
//!
//! `Complaint` carries its own derived-state rules: the escalation
//! eligibility check and the informational day counters live here so
//! that every layer that persists or reads a complaint applies the same
//! logic the entity applied at creation time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Actor role. Only `SeniorEmployee` is a valid auto-escalation target;
/// `Admin` is accepted for manual escalation as an operational override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Employee,
    SeniorEmployee,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Employee => "EMPLOYEE",
            Role::SeniorEmployee => "SENIOR_EMPLOYEE",
            Role::Admin => "ADMIN",
        }
    }

    /// Roles allowed to view escalated complaints.
    pub fn can_triage(&self) -> bool {
        matches!(self, Role::Employee | Role::SeniorEmployee | Role::Admin)
    }

    /// Roles allowed to request escalation or de-escalation.
    pub fn can_escalate(&self) -> bool {
        matches!(self, Role::SeniorEmployee | Role::Admin)
    }

    /// Roles that may receive a manual escalation.
    pub fn is_valid_escalation_target(&self) -> bool {
        matches!(self, Role::SeniorEmployee | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "EMPLOYEE" => Ok(Role::Employee),
            "SENIOR_EMPLOYEE" => Ok(Role::SeniorEmployee),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Complaint lifecycle state. `Resolved` is terminal for escalation
/// purposes: a resolved complaint is never eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintStatus {
    New,
    UnderReview,
    Resolved,
}

impl ComplaintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::New => "NEW",
            ComplaintStatus::UnderReview => "UNDER_REVIEW",
            ComplaintStatus::Resolved => "RESOLVED",
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(ComplaintStatus::New),
            "UNDER_REVIEW" => Ok(ComplaintStatus::UnderReview),
            "RESOLVED" => Ok(ComplaintStatus::Resolved),
            other => Err(format!("unknown complaint status: {other}")),
        }
    }
}

/// Reporter-supplied urgency. Informational only; the escalation rule
/// keys off staleness, not urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "LOW",
            Urgency::Medium => "MEDIUM",
            Urgency::High => "HIGH",
            Urgency::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Urgency::Low),
            "MEDIUM" => Ok(Urgency::Medium),
            "HIGH" => Ok(Urgency::High),
            "CRITICAL" => Ok(Urgency::Critical),
            other => Err(format!("unknown urgency: {other}")),
        }
    }
}

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Request to create a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

/// A complaint ticket.
///
/// `assigned_employee` and `escalated_to` are independent references.
/// Escalating an unassigned complaint also assigns it to the escalation
/// target; assignment never implies escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub description: String,
    pub status: ComplaintStatus,
    pub urgency: Urgency,
    pub anonymous: bool,
    pub is_public: bool,
    pub reporter: Option<i64>,
    pub assigned_employee: Option<i64>,
    pub escalated_to: Option<i64>,
    pub escalation_date: Option<DateTime<Utc>>,
    pub escalation_reason: Option<String>,
    pub last_status_change: Option<DateTime<Utc>>,
    /// Denormalized copy of [`Complaint::escalation_due`]. Refreshed on
    /// every save and every sweep; stale by at most one scheduler
    /// interval and never treated as authoritative.
    pub requires_escalation: bool,
    pub days_open: i64,
    pub days_since_assignment: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
}

/// Request to file a new complaint.
#[derive(Debug, Clone, Deserialize)]
pub struct NewComplaint {
    pub title: String,
    pub category: String,
    pub description: String,
    pub urgency: Urgency,
    pub anonymous: bool,
    pub reporter: Option<i64>,
}

impl Complaint {
    /// The staleness rule: does this complaint need escalation as of
    /// `cutoff = now - threshold`?
    ///
    /// Already-escalated and resolved complaints are never eligible.
    /// Otherwise a complaint qualifies when it sat unassigned past the
    /// threshold, or when it is assigned but saw no status movement
    /// (and/or was created) before the cutoff.
    pub fn escalation_due(&self, cutoff: DateTime<Utc>) -> bool {
        if self.escalated_to.is_some() || self.status == ComplaintStatus::Resolved {
            return false;
        }

        match self.assigned_employee {
            None => self.created_at < cutoff,
            Some(_) => {
                let stuck = self
                    .last_status_change
                    .map(|changed| changed < cutoff)
                    .unwrap_or(false);
                stuck || self.created_at < cutoff
            }
        }
    }

    /// Recompute the derived fields: day counters and the cached
    /// `requires_escalation` flag. Called on every persist and whenever
    /// a complaint is read for escalation decisions.
    pub fn refresh_derived(&mut self, threshold: Duration, now: DateTime<Utc>) {
        self.days_open = (now - self.created_at).num_days().max(0);
        self.days_since_assignment = self
            .assigned_at
            .map(|at| (now - at).num_days().max(0))
            .unwrap_or(0);
        self.requires_escalation = self.escalation_due(now - threshold);
    }

    /// Transition to a new status, stamping `last_status_change`.
    pub fn set_status(&mut self, status: ComplaintStatus, now: DateTime<Utc>) {
        self.status = status;
        self.last_status_change = Some(now);
        self.updated_at = now;
    }

    /// Assign a handler. `assigned_at` is stamped on first assignment.
    pub fn assign(&mut self, employee_id: i64, now: DateTime<Utc>) {
        self.assigned_employee = Some(employee_id);
        if self.assigned_at.is_none() {
            self.assigned_at = Some(now);
        }
        self.updated_at = now;
    }

    /// Apply an escalation to `target`.
    ///
    /// Escalating an unassigned complaint also assigns it to the target.
    /// A NEW complaint is promoted to UNDER_REVIEW. The cached
    /// `requires_escalation` flag is cleared: escalated implies not
    /// eligible.
    pub fn apply_escalation(&mut self, target: &User, reason: String, now: DateTime<Utc>) {
        self.escalated_to = Some(target.id);
        self.escalation_date = Some(now);
        self.escalation_reason = Some(reason);

        if self.assigned_employee.is_none() {
            self.assigned_employee = Some(target.id);
            self.assigned_at = Some(now);
        }

        if self.status == ComplaintStatus::New {
            self.status = ComplaintStatus::UnderReview;
            self.last_status_change = Some(now);
        }

        self.requires_escalation = false;
        self.updated_at = now;
    }

    /// Revert an escalation, keeping the assignment untouched and
    /// recording `reason` as the audit trail.
    ///
    /// With `reset_status_clock` the status-change timestamp is moved to
    /// now, giving the assignee a fresh threshold window before the
    /// sweep can flag the complaint again. Without it a still-stale
    /// complaint may re-escalate on the next tick.
    pub fn clear_escalation(
        &mut self,
        reason: String,
        now: DateTime<Utc>,
        reset_status_clock: bool,
    ) {
        self.escalated_to = None;
        self.escalation_date = None;
        self.escalation_reason = Some(reason);
        if reset_status_clock {
            self.last_status_change = Some(now);
        }
        self.updated_at = now;
    }
}
