//! The escalation engine: sweep orchestration, manual escalation and
//! de-escalation, and the read-side queries.

use std::sync::Arc;

use chrono::Utc;
use resolveit_complaint_core::{
    Complaint, ComplaintStatus, ComplaintStore, EscalationGrant, SqliteStore, User, UserStore,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::balancer::LoadLedger;
use crate::config::EscalationConfig;
use crate::error::{EscalationError, Result};
use crate::policy;
use crate::report::{LoadReport, SeniorLoad};

/// Outcome of one auto-escalation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Complaints that satisfied the staleness rule when the sweep ran.
    pub eligible: usize,
    /// Complaints actually escalated by this sweep.
    pub escalated: usize,
    /// Complaints skipped: lost races and per-item commit failures.
    pub skipped: usize,
}

/// Coordinates eligibility evaluation, least-loaded target selection,
/// and the escalation mutations against the store.
pub struct EscalationEngine {
    complaints: Arc<dyn ComplaintStore>,
    users: Arc<dyn UserStore>,
    config: EscalationConfig,
    // Run-level single-flight guard: an overlapping sweep trigger is
    // skipped rather than queued.
    sweep_lock: Mutex<()>,
}

impl EscalationEngine {
    pub fn new(
        complaints: Arc<dyn ComplaintStore>,
        users: Arc<dyn UserStore>,
        config: EscalationConfig,
    ) -> Self {
        Self {
            complaints,
            users,
            config,
            sweep_lock: Mutex::new(()),
        }
    }

    /// Convenience constructor wiring both trait objects to one
    /// [`SqliteStore`].
    pub fn with_store(store: Arc<SqliteStore>, config: EscalationConfig) -> Self {
        Self::new(store.clone(), store, config)
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    /// Run one auto-escalation sweep synchronously.
    ///
    /// The whole pipeline: query eligible complaints (oldest first),
    /// build the load ledger from live counts, then escalate each
    /// complaint to the least-loaded senior. Per-item failures are
    /// logged and skipped; only a failed batch query aborts the sweep,
    /// and the scheduler simply retries on the next tick.
    pub async fn trigger_auto_escalation(&self) -> Result<SweepOutcome> {
        let _guard = match self.sweep_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("sweep already in flight; skipping this trigger");
                return Ok(SweepOutcome::default());
            }
        };

        info!(
            "🔄 Starting auto-escalation check (threshold: {} minutes)",
            self.config.threshold_minutes
        );

        let now = Utc::now();
        let cutoff = policy::cutoff(now, self.config.threshold());
        let eligible = self.complaints.find_eligible_for_escalation(cutoff).await?;

        if eligible.is_empty() {
            info!("✅ No complaints need escalation");
            return Ok(SweepOutcome::default());
        }
        info!("📊 Found {} complaints requiring escalation", eligible.len());

        let seniors = self.users.find_senior_employees().await?;
        if seniors.is_empty() {
            warn!("⚠️ No senior employees available for escalation");
            return Ok(SweepOutcome {
                eligible: eligible.len(),
                ..Default::default()
            });
        }

        // Fresh ledger every run; never carried across sweeps.
        let mut ledger = LoadLedger::new();
        for senior in &seniors {
            let load = self.current_load(senior.id).await?;
            debug!("senior {} current load {}", senior.email, load);
            ledger.register(senior.id, load);
        }

        let mut outcome = SweepOutcome {
            eligible: eligible.len(),
            ..Default::default()
        };

        for complaint in &eligible {
            let Some(senior_id) = ledger.least_loaded() else {
                break;
            };

            let grant = EscalationGrant {
                target: senior_id,
                reason: policy::auto_escalation_reason(self.config.threshold_minutes),
                at: Utc::now(),
            };

            match self.complaints.try_escalate(complaint.id, &grant).await {
                Ok(true) => {
                    ledger.record_assignment(senior_id);
                    outcome.escalated += 1;
                    info!(
                        "✅ Escalated complaint {} to senior {} (new load: {})",
                        complaint.id,
                        senior_id,
                        ledger.load_of(senior_id).unwrap_or(0)
                    );
                }
                Ok(false) => {
                    // Another writer escalated it between our read and
                    // this update; not an error.
                    outcome.skipped += 1;
                    debug!("complaint {} already escalated; skipping", complaint.id);
                }
                Err(e) => {
                    outcome.skipped += 1;
                    error!("❌ Error escalating complaint {}: {}", complaint.id, e);
                }
            }
        }

        info!(
            "✅ Auto-escalation completed: {} escalated, {} skipped of {} eligible",
            outcome.escalated, outcome.skipped, outcome.eligible
        );
        Ok(outcome)
    }

    /// Manually escalate a complaint to an explicit target, bypassing
    /// the load balancer.
    pub async fn escalate(
        &self,
        complaint_id: i64,
        target_id: i64,
        reason: String,
        requested_by: &User,
    ) -> Result<Complaint> {
        if !requested_by.role.can_escalate() {
            return Err(EscalationError::Unauthorized(format!(
                "role {} cannot escalate complaints",
                requested_by.role
            )));
        }

        let mut complaint = self
            .complaints
            .find(complaint_id)
            .await?
            .ok_or(EscalationError::ComplaintNotFound(complaint_id))?;

        let target = self
            .users
            .find_user(target_id)
            .await?
            .ok_or(EscalationError::UserNotFound(target_id))?;

        if !target.role.is_valid_escalation_target() {
            return Err(EscalationError::InvalidTarget {
                user_id: target.id,
                role: target.role,
            });
        }

        info!(
            "📤 Manual escalation of complaint {} to {} by {}",
            complaint_id, target.email, requested_by.email
        );

        let now = Utc::now();
        complaint.apply_escalation(&target, reason, now);
        complaint.refresh_derived(self.config.threshold(), now);
        self.complaints.save(&complaint).await?;

        Ok(complaint)
    }

    /// Revert an escalation. Senior employees may only de-escalate
    /// complaints escalated to themselves; admins may de-escalate any.
    pub async fn deescalate(
        &self,
        complaint_id: i64,
        note: Option<String>,
        requested_by: &User,
    ) -> Result<Complaint> {
        if !requested_by.role.can_escalate() {
            return Err(EscalationError::Unauthorized(format!(
                "role {} cannot de-escalate complaints",
                requested_by.role
            )));
        }

        let mut complaint = self
            .complaints
            .find(complaint_id)
            .await?
            .ok_or(EscalationError::ComplaintNotFound(complaint_id))?;

        let holder = complaint
            .escalated_to
            .ok_or(EscalationError::NotEscalated(complaint_id))?;

        if holder != requested_by.id && requested_by.role != resolveit_complaint_core::Role::Admin {
            return Err(EscalationError::Unauthorized(
                "only the escalation holder or an admin may de-escalate".to_string(),
            ));
        }

        let now = Utc::now();
        let reason = policy::deescalation_reason(requested_by, note.as_deref());
        complaint.clear_escalation(
            reason,
            now,
            self.config.reset_status_clock_on_deescalate,
        );
        complaint.refresh_derived(self.config.threshold(), now);
        self.complaints.save(&complaint).await?;

        info!(
            "Complaint {} de-escalated by {}",
            complaint_id, requested_by.email
        );
        Ok(complaint)
    }

    /// Complaints escalated to `user`. Triage roles see their own
    /// escalations; plain users get an empty list.
    pub async fn escalated_complaints_for(&self, user: &User) -> Result<Vec<Complaint>> {
        if !user.role.can_triage() {
            return Ok(Vec::new());
        }
        Ok(self.complaints.find_by_escalated_to(user.id).await?)
    }

    /// Id-based variant of [`escalated_complaints_for`] for callers that
    /// only hold an employee id. Errors when the user does not exist.
    ///
    /// [`escalated_complaints_for`]: EscalationEngine::escalated_complaints_for
    pub async fn escalated_complaints_for_id(&self, user_id: i64) -> Result<Vec<Complaint>> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(EscalationError::UserNotFound(user_id))?;
        self.escalated_complaints_for(&user).await
    }

    /// Every escalated complaint in the system, newest escalation first.
    pub async fn all_escalated_complaints(&self) -> Result<Vec<Complaint>> {
        Ok(self.complaints.find_all_escalated().await?)
    }

    /// Complaints satisfying the staleness rule as of now, derived
    /// fields refreshed so the cached flag can be trusted by the caller.
    pub async fn complaints_requiring_escalation(&self) -> Result<Vec<Complaint>> {
        let now = Utc::now();
        let cutoff = policy::cutoff(now, self.config.threshold());
        let mut complaints = self.complaints.find_eligible_for_escalation(cutoff).await?;
        for complaint in &mut complaints {
            complaint.refresh_derived(self.config.threshold(), now);
        }
        Ok(complaints)
    }

    /// Per-senior workload report, least loaded first. Uses the same
    /// load formula as the sweep's balancer.
    pub async fn senior_employee_load(&self) -> Result<LoadReport> {
        let seniors = self.users.find_senior_employees().await?;
        let mut rows = Vec::with_capacity(seniors.len());
        let mut total_escalated = 0i64;

        for senior in &seniors {
            let escalated = self.complaints.find_by_escalated_to(senior.id).await?;
            let assigned = self.complaints.find_by_assigned_employee(senior.id).await?;

            let assigned_open = assigned
                .iter()
                .filter(|c| c.status != ComplaintStatus::Resolved && c.escalated_to.is_none())
                .count() as i64;
            let escalated_count = escalated.len() as i64;
            let resolved_count = escalated
                .iter()
                .filter(|c| c.status == ComplaintStatus::Resolved)
                .count() as i64;

            total_escalated += escalated_count;
            rows.push(SeniorLoad {
                id: senior.id,
                full_name: senior.full_name.clone(),
                email: senior.email.clone(),
                escalated_count,
                assigned_count: assigned_open,
                total_load: escalated_count + assigned_open,
                total_handled: escalated_count,
                resolved_count,
                resolution_rate: SeniorLoad::rate(resolved_count, escalated_count),
            });
        }

        rows.sort_by_key(|row| (row.total_load, row.id));

        Ok(LoadReport {
            total_senior_employees: rows.len(),
            senior_employees: rows,
            total_escalated_complaints: total_escalated,
            escalation_threshold_minutes: self.config.threshold_minutes,
            generated_at: Utc::now(),
        })
    }

    /// The balancer's load formula for one senior: escalated complaints
    /// (any status) plus directly assigned, unresolved, non-escalated
    /// complaints.
    async fn current_load(&self, senior_id: i64) -> Result<i64> {
        let escalated = self.complaints.count_by_escalated_to(senior_id).await?;
        let assigned = self.complaints.find_by_assigned_employee(senior_id).await?;
        let assigned_open = assigned
            .iter()
            .filter(|c| c.status != ComplaintStatus::Resolved && c.escalated_to.is_none())
            .count() as i64;
        Ok(escalated + assigned_open)
    }
}
