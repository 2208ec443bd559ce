//! End-to-end escalation flows against a real SQLite store: the sweep,
//! manual escalation and de-escalation, and load reporting.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use resolveit_complaint_core::{
    Complaint, ComplaintStatus, ComplaintStore, EscalationGrant, NewComplaint, NewUser, Role,
    SqliteStore, StoreError, Urgency, User, UserStore,
};
use resolveit_complaint_core::Result as StoreResult;
use resolveit_escalation_engine::{EscalationConfig, EscalationEngine, EscalationError};
use tempfile::TempDir;

async fn setup() -> (Arc<SqliteStore>, Arc<EscalationEngine>, TempDir) {
    setup_with(EscalationConfig::default()).await
}

async fn setup_with(
    config: EscalationConfig,
) -> (Arc<SqliteStore>, Arc<EscalationEngine>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let store = Arc::new(
        SqliteStore::new(&db_url)
            .await
            .expect("Failed to create test database"),
    );
    let engine = Arc::new(EscalationEngine::with_store(store.clone(), config));
    (store, engine, temp_dir)
}

async fn seed_user(store: &SqliteStore, name: &str, role: Role) -> User {
    store
        .create_user(NewUser {
            full_name: name.to_string(),
            email: format!("{}@resolveit.test", name.to_lowercase().replace(' ', ".")),
            role,
        })
        .await
        .unwrap()
}

/// Store wrapper that fails `try_escalate` for one complaint id,
/// standing in for a transient write failure mid-batch.
struct FaultyStore {
    inner: Arc<SqliteStore>,
    poison_id: i64,
}

#[async_trait]
impl ComplaintStore for FaultyStore {
    async fn create(&self, req: NewComplaint) -> StoreResult<Complaint> {
        self.inner.create(req).await
    }

    async fn find(&self, id: i64) -> StoreResult<Option<Complaint>> {
        self.inner.find(id).await
    }

    async fn save(&self, complaint: &Complaint) -> StoreResult<Complaint> {
        self.inner.save(complaint).await
    }

    async fn find_eligible_for_escalation(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<Complaint>> {
        self.inner.find_eligible_for_escalation(cutoff).await
    }

    async fn find_by_escalated_to(&self, user_id: i64) -> StoreResult<Vec<Complaint>> {
        self.inner.find_by_escalated_to(user_id).await
    }

    async fn find_by_assigned_employee(&self, user_id: i64) -> StoreResult<Vec<Complaint>> {
        self.inner.find_by_assigned_employee(user_id).await
    }

    async fn count_by_escalated_to(&self, user_id: i64) -> StoreResult<i64> {
        self.inner.count_by_escalated_to(user_id).await
    }

    async fn find_all_escalated(&self) -> StoreResult<Vec<Complaint>> {
        self.inner.find_all_escalated().await
    }

    async fn try_escalate(&self, id: i64, grant: &EscalationGrant) -> StoreResult<bool> {
        if id == self.poison_id {
            return Err(StoreError::CorruptRow(format!(
                "injected write failure for complaint {id}"
            )));
        }
        self.inner.try_escalate(id, grant).await
    }
}

/// Files a complaint that is already `minutes_old` minutes stale.
async fn file_stale_complaint(store: &SqliteStore, title: &str, minutes_old: i64) -> Complaint {
    let c = store
        .create(NewComplaint {
            title: title.to_string(),
            category: "facilities".to_string(),
            description: "needs attention".to_string(),
            urgency: Urgency::Medium,
            anonymous: false,
            reporter: None,
        })
        .await
        .unwrap();

    let mut c = c;
    let past = Utc::now() - Duration::minutes(minutes_old);
    c.created_at = past;
    c.last_status_change = Some(past);
    store.save(&c).await.unwrap()
}

// End-to-end scenario 1: a stale unassigned complaint is escalated to
// the only senior, promoted to UNDER_REVIEW, and the flag cleared.
#[tokio::test]
async fn stale_unassigned_complaint_escalates() {
    let (store, engine, _tmp) = setup().await;
    let senior = seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;

    let c = file_stale_complaint(&store, "Elevator stuck", 8).await;

    let outcome = engine.trigger_auto_escalation().await.unwrap();
    assert_eq!(outcome.eligible, 1);
    assert_eq!(outcome.escalated, 1);

    let after = store.find(c.id).await.unwrap().unwrap();
    assert_eq!(after.escalated_to, Some(senior.id));
    assert_eq!(after.assigned_employee, Some(senior.id));
    assert_eq!(after.status, ComplaintStatus::UnderReview);
    assert!(!after.requires_escalation);
    assert!(after.escalation_date.is_some());
    assert!(after
        .escalation_reason
        .as_deref()
        .unwrap()
        .contains("7 minutes"));
}

// End-to-end scenario 2: two eligible complaints and two idle seniors
// end up with one complaint each.
#[tokio::test]
async fn batch_spreads_across_idle_seniors() {
    let (store, engine, _tmp) = setup().await;
    let s1 = seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;
    let s2 = seed_user(&store, "Sue Senior", Role::SeniorEmployee).await;

    file_stale_complaint(&store, "First", 20).await;
    file_stale_complaint(&store, "Second", 15).await;

    let outcome = engine.trigger_auto_escalation().await.unwrap();
    assert_eq!(outcome.escalated, 2);

    assert_eq!(store.count_by_escalated_to(s1.id).await.unwrap(), 1);
    assert_eq!(store.count_by_escalated_to(s2.id).await.unwrap(), 1);
}

#[tokio::test]
async fn sweep_is_idempotent() {
    let (store, engine, _tmp) = setup().await;
    seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;

    for i in 0..4 {
        file_stale_complaint(&store, &format!("Complaint {i}"), 30 + i).await;
    }

    let first = engine.trigger_auto_escalation().await.unwrap();
    assert_eq!(first.escalated, 4);

    // Nothing changed in between: the second pass finds nothing.
    let second = engine.trigger_auto_escalation().await.unwrap();
    assert_eq!(second.eligible, 0);
    assert_eq!(second.escalated, 0);
}

#[tokio::test]
async fn batch_load_skew_is_at_most_one() {
    let (store, engine, _tmp) = setup().await;
    let mut seniors = Vec::new();
    for name in ["Ann Senior", "Bob Senior", "Cat Senior"] {
        seniors.push(seed_user(&store, name, Role::SeniorEmployee).await);
    }

    for i in 0..7 {
        file_stale_complaint(&store, &format!("Complaint {i}"), 60 - i).await;
    }

    let outcome = engine.trigger_auto_escalation().await.unwrap();
    assert_eq!(outcome.escalated, 7);

    let mut loads = Vec::new();
    for senior in &seniors {
        loads.push(store.count_by_escalated_to(senior.id).await.unwrap());
    }
    let max = *loads.iter().max().unwrap();
    let min = *loads.iter().min().unwrap();
    assert!(max - min <= 1, "unbalanced loads: {loads:?}");
    assert_eq!(loads.iter().sum::<i64>(), 7);
}

#[tokio::test]
async fn sweep_prefers_the_least_loaded_senior() {
    let (store, engine, _tmp) = setup().await;
    let busy = seed_user(&store, "Busy Senior", Role::SeniorEmployee).await;
    let idle = seed_user(&store, "Idle Senior", Role::SeniorEmployee).await;

    // Pre-load the first senior with two escalations.
    file_stale_complaint(&store, "Old A", 40).await;
    file_stale_complaint(&store, "Old B", 39).await;
    let admin = seed_user(&store, "Ada Admin", Role::Admin).await;
    for c in store
        .find_eligible_for_escalation(Utc::now() - Duration::minutes(7))
        .await
        .unwrap()
    {
        engine
            .escalate(c.id, busy.id, "preload".to_string(), &admin)
            .await
            .unwrap();
    }

    let fresh = file_stale_complaint(&store, "New one", 10).await;
    let outcome = engine.trigger_auto_escalation().await.unwrap();
    assert_eq!(outcome.escalated, 1);

    let after = store.find(fresh.id).await.unwrap().unwrap();
    assert_eq!(after.escalated_to, Some(idle.id));
}

// End-to-end scenario 4: resolved before the threshold elapses, never
// escalated.
#[tokio::test]
async fn resolved_complaints_are_left_alone() {
    let (store, engine, _tmp) = setup().await;
    seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;

    let c = file_stale_complaint(&store, "Resolved quickly", 30).await;
    let mut c = c;
    c.set_status(ComplaintStatus::Resolved, Utc::now());
    c.refresh_derived(Duration::minutes(7), Utc::now());
    let c = store.save(&c).await.unwrap();
    assert!(!c.requires_escalation);

    let outcome = engine.trigger_auto_escalation().await.unwrap();
    assert_eq!(outcome.eligible, 0);
    assert_eq!(outcome.escalated, 0);

    let after = store.find(c.id).await.unwrap().unwrap();
    assert!(after.escalated_to.is_none());
    assert!(!after.requires_escalation);
}

#[tokio::test]
async fn sweep_without_seniors_is_a_clean_no_op() {
    let (store, engine, _tmp) = setup().await;
    file_stale_complaint(&store, "Nobody home", 20).await;

    let outcome = engine.trigger_auto_escalation().await.unwrap();
    assert_eq!(outcome.eligible, 1);
    assert_eq!(outcome.escalated, 0);

    // Still eligible next time a senior exists.
    let remaining = engine.complaints_requiring_escalation().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].requires_escalation);
}

// A single complaint's failed write is logged and skipped; the rest of
// the batch still goes through.
#[tokio::test]
async fn one_failed_write_does_not_abort_the_sweep() {
    let (store, _engine, _tmp) = setup().await;
    let senior = seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;

    file_stale_complaint(&store, "First", 30).await;
    let doomed = file_stale_complaint(&store, "Doomed", 20).await;
    file_stale_complaint(&store, "Third", 10).await;

    let faulty = Arc::new(FaultyStore {
        inner: store.clone(),
        poison_id: doomed.id,
    });
    let engine = EscalationEngine::new(faulty, store.clone(), EscalationConfig::default());

    let outcome = engine.trigger_auto_escalation().await.unwrap();
    assert_eq!(outcome.eligible, 3);
    assert_eq!(outcome.escalated, 2);
    assert_eq!(outcome.skipped, 1);

    // The failing complaint is untouched and stays eligible.
    let after = store.find(doomed.id).await.unwrap().unwrap();
    assert!(after.escalated_to.is_none());
    assert_eq!(store.count_by_escalated_to(senior.id).await.unwrap(), 2);
}

#[tokio::test]
async fn manual_escalation_to_invalid_target_changes_nothing() {
    let (store, engine, _tmp) = setup().await;
    let admin = seed_user(&store, "Ada Admin", Role::Admin).await;
    let employee = seed_user(&store, "Eve Employee", Role::Employee).await;

    let c = file_stale_complaint(&store, "Misdirected", 10).await;

    let err = engine
        .escalate(c.id, employee.id, "try employee".to_string(), &admin)
        .await
        .unwrap_err();
    match err {
        EscalationError::InvalidTarget { user_id, role } => {
            assert_eq!(user_id, employee.id);
            assert_eq!(role, Role::Employee);
        }
        other => panic!("expected InvalidTarget, got {other:?}"),
    }

    let after = store.find(c.id).await.unwrap().unwrap();
    assert!(after.escalated_to.is_none());
    assert_eq!(after.status, ComplaintStatus::New);
}

#[tokio::test]
async fn manual_escalation_requires_a_privileged_requester() {
    let (store, engine, _tmp) = setup().await;
    let employee = seed_user(&store, "Eve Employee", Role::Employee).await;
    let senior = seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;

    let c = file_stale_complaint(&store, "Locked down", 10).await;

    let err = engine
        .escalate(c.id, senior.id, "please".to_string(), &employee)
        .await
        .unwrap_err();
    assert!(matches!(err, EscalationError::Unauthorized(_)));
}

#[tokio::test]
async fn manual_escalation_to_admin_is_allowed() {
    let (store, engine, _tmp) = setup().await;
    let admin = seed_user(&store, "Ada Admin", Role::Admin).await;
    let senior = seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;

    let c = file_stale_complaint(&store, "Override", 10).await;
    let escalated = engine
        .escalate(c.id, admin.id, "needs admin eyes".to_string(), &senior)
        .await
        .unwrap();
    assert_eq!(escalated.escalated_to, Some(admin.id));
    assert_eq!(
        escalated.escalation_reason.as_deref(),
        Some("needs admin eyes")
    );
}

// End-to-end scenario 3: escalate, then the receiving senior
// de-escalates with a personal note.
#[tokio::test]
async fn deescalation_records_an_audit_reason() {
    let (store, engine, _tmp) = setup().await;
    let senior = seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;

    let c = file_stale_complaint(&store, "Handled", 10).await;
    engine.trigger_auto_escalation().await.unwrap();

    let escalated = store.find(c.id).await.unwrap().unwrap();
    let status_before = escalated.status;

    let after = engine
        .deescalate(c.id, Some("handled personally".to_string()), &senior)
        .await
        .unwrap();

    assert!(after.escalated_to.is_none());
    assert!(after.escalation_date.is_none());
    assert_eq!(after.status, status_before);
    assert_eq!(after.assigned_employee, Some(senior.id));
    let reason = after.escalation_reason.unwrap();
    assert!(reason.contains("De-escalated by Sam Senior"));
    assert!(reason.contains("handled personally"));
}

#[tokio::test]
async fn only_the_holder_or_an_admin_may_deescalate() {
    let (store, engine, _tmp) = setup().await;
    let holder = seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;
    let other = seed_user(&store, "Sue Senior", Role::SeniorEmployee).await;
    let admin = seed_user(&store, "Ada Admin", Role::Admin).await;

    let c = file_stale_complaint(&store, "Guarded", 10).await;
    engine
        .escalate(c.id, holder.id, "manual".to_string(), &admin)
        .await
        .unwrap();

    let err = engine.deescalate(c.id, None, &other).await.unwrap_err();
    assert!(matches!(err, EscalationError::Unauthorized(_)));

    // An admin can always de-escalate.
    let after = engine.deescalate(c.id, None, &admin).await.unwrap();
    assert!(after.escalated_to.is_none());
}

#[tokio::test]
async fn deescalating_a_non_escalated_complaint_fails() {
    let (store, engine, _tmp) = setup().await;
    let admin = seed_user(&store, "Ada Admin", Role::Admin).await;

    let c = file_stale_complaint(&store, "Plain", 1).await;
    let err = engine.deescalate(c.id, None, &admin).await.unwrap_err();
    assert!(matches!(err, EscalationError::NotEscalated(_)));
}

// A de-escalated-but-still-stale complaint goes right back into the
// eligible set under the default config.
#[tokio::test]
async fn deescalated_complaint_reenters_the_eligible_pool() {
    let (store, engine, _tmp) = setup().await;
    let senior = seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;

    let c = file_stale_complaint(&store, "Flappy", 30).await;
    engine.trigger_auto_escalation().await.unwrap();
    engine.deescalate(c.id, None, &senior).await.unwrap();

    // Default config: still stale (old created_at), so eligible again.
    let outcome = engine.trigger_auto_escalation().await.unwrap();
    assert_eq!(outcome.escalated, 1);
}

#[tokio::test]
async fn escalated_listing_respects_roles() {
    let (store, engine, _tmp) = setup().await;
    let senior = seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;
    let plain = seed_user(&store, "Paul Plain", Role::User).await;

    file_stale_complaint(&store, "Listed", 10).await;
    engine.trigger_auto_escalation().await.unwrap();

    let own = engine.escalated_complaints_for(&senior).await.unwrap();
    assert_eq!(own.len(), 1);

    let none = engine.escalated_complaints_for(&plain).await.unwrap();
    assert!(none.is_empty());

    let all = engine.all_escalated_complaints().await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn id_based_escalated_listing_resolves_the_user() {
    let (store, engine, _tmp) = setup().await;
    let senior = seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;

    file_stale_complaint(&store, "Listed", 10).await;
    engine.trigger_auto_escalation().await.unwrap();

    let own = engine.escalated_complaints_for_id(senior.id).await.unwrap();
    assert_eq!(own.len(), 1);

    let err = engine
        .escalated_complaints_for_id(senior.id + 100)
        .await
        .unwrap_err();
    assert!(matches!(err, EscalationError::UserNotFound(_)));
}

#[tokio::test]
async fn load_report_matches_the_balancer_formula() {
    let (store, engine, _tmp) = setup().await;
    let admin = seed_user(&store, "Ada Admin", Role::Admin).await;
    let s1 = seed_user(&store, "Sam Senior", Role::SeniorEmployee).await;
    let s2 = seed_user(&store, "Sue Senior", Role::SeniorEmployee).await;

    // s1: two escalations, one of them resolved.
    let a = file_stale_complaint(&store, "A", 40).await;
    let b = file_stale_complaint(&store, "B", 39).await;
    engine.escalate(a.id, s1.id, "m".to_string(), &admin).await.unwrap();
    engine.escalate(b.id, s1.id, "m".to_string(), &admin).await.unwrap();
    let mut resolved = store.find(a.id).await.unwrap().unwrap();
    resolved.set_status(ComplaintStatus::Resolved, Utc::now());
    store.save(&resolved).await.unwrap();

    // s2: one direct assignment, still open, not escalated.
    let c = file_stale_complaint(&store, "C", 5).await;
    let mut c = c;
    c.assign(s2.id, Utc::now());
    store.save(&c).await.unwrap();

    let report = engine.senior_employee_load().await.unwrap();
    assert_eq!(report.total_senior_employees, 2);
    assert_eq!(report.total_escalated_complaints, 2);
    assert_eq!(report.escalation_threshold_minutes, 7);

    // Ascending by total load: s2 (1) before s1 (2).
    assert_eq!(report.senior_employees[0].id, s2.id);
    assert_eq!(report.senior_employees[0].total_load, 1);
    assert_eq!(report.senior_employees[0].assigned_count, 1);
    assert_eq!(report.senior_employees[0].escalated_count, 0);
    assert_eq!(report.senior_employees[0].resolution_rate, 0.0);

    assert_eq!(report.senior_employees[1].id, s1.id);
    assert_eq!(report.senior_employees[1].total_load, 2);
    assert_eq!(report.senior_employees[1].escalated_count, 2);
    assert_eq!(report.senior_employees[1].resolved_count, 1);
    assert_eq!(report.senior_employees[1].resolution_rate, 50.0);
}

#[tokio::test]
async fn requiring_escalation_listing_refreshes_the_flag() {
    let (store, engine, _tmp) = setup().await;

    // Persisted with a stale (false) flag; the read path recomputes it.
    file_stale_complaint(&store, "Stale flag", 25).await;

    let pending = engine.complaints_requiring_escalation().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].requires_escalation);
    assert!(pending[0].days_open >= 0);
}
