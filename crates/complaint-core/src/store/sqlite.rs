//! SQLite-backed store built on sqlx.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::{ComplaintStore, EscalationGrant, UserStore};
use crate::error::{Result, StoreError};
use crate::types::{Complaint, ComplaintStatus, NewComplaint, NewUser, Role, Urgency, User};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        full_name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS complaints (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        category TEXT NOT NULL,
        description TEXT NOT NULL,
        status TEXT NOT NULL,
        urgency TEXT NOT NULL,
        anonymous INTEGER NOT NULL DEFAULT 0,
        is_public INTEGER NOT NULL DEFAULT 1,
        reporter INTEGER REFERENCES users(id),
        assigned_employee INTEGER REFERENCES users(id),
        escalated_to INTEGER REFERENCES users(id),
        escalation_date TEXT,
        escalation_reason TEXT,
        last_status_change TEXT,
        requires_escalation INTEGER NOT NULL DEFAULT 0,
        days_open INTEGER NOT NULL DEFAULT 0,
        days_since_assignment INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        assigned_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_complaints_escalated_to ON complaints(escalated_to)",
    "CREATE INDEX IF NOT EXISTS idx_complaints_assigned ON complaints(assigned_employee)",
    "CREATE INDEX IF NOT EXISTS idx_complaints_status ON complaints(status)",
];

const COMPLAINT_COLUMNS: &str = "id, title, category, description, status, urgency, \
     anonymous, is_public, reporter, assigned_employee, escalated_to, \
     escalation_date, escalation_reason, last_status_change, requires_escalation, \
     days_open, days_since_assignment, created_at, updated_at, assigned_at";

/// SQLite implementation of [`ComplaintStore`] and [`UserStore`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `database_url` and
    /// ensure the schema exists.
    ///
    /// In-memory databases are pinned to a single pooled connection:
    /// every connection in a pool would otherwise see its own empty
    /// database.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StoreError::Database)?
            .create_if_missing(true);

        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        debug!("complaint store ready at {}", database_url);

        Ok(Self { pool })
    }

    /// Access to the underlying pool, for callers layering their own
    /// queries on the same database.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ComplaintStore for SqliteStore {
    async fn create(&self, req: NewComplaint) -> Result<Complaint> {
        let now = Utc::now();
        // Creation-time defaults: NEW status, anonymity hides the
        // complaint from the public feed, status clock starts now.
        let is_public = !req.anonymous;

        let result = sqlx::query(
            "INSERT INTO complaints (
                title, category, description, status, urgency, anonymous, is_public,
                reporter, last_status_change, requires_escalation,
                days_open, days_since_assignment, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 0, ?, ?)",
        )
        .bind(&req.title)
        .bind(&req.category)
        .bind(&req.description)
        .bind(ComplaintStatus::New.as_str())
        .bind(req.urgency.as_str())
        .bind(req.anonymous)
        .bind(is_public)
        .bind(req.reporter)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("created complaint {} ({})", id, req.title);

        Ok(Complaint {
            id,
            title: req.title,
            category: req.category,
            description: req.description,
            status: ComplaintStatus::New,
            urgency: req.urgency,
            anonymous: req.anonymous,
            is_public,
            reporter: req.reporter,
            assigned_employee: None,
            escalated_to: None,
            escalation_date: None,
            escalation_reason: None,
            last_status_change: Some(now),
            requires_escalation: false,
            days_open: 0,
            days_since_assignment: 0,
            created_at: now,
            updated_at: now,
            assigned_at: None,
        })
    }

    async fn find(&self, id: i64) -> Result<Option<Complaint>> {
        let row: Option<ComplaintRow> = sqlx::query_as(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Complaint::try_from).transpose()
    }

    async fn save(&self, complaint: &Complaint) -> Result<Complaint> {
        sqlx::query(
            "UPDATE complaints SET
                title = ?, category = ?, description = ?, status = ?, urgency = ?,
                anonymous = ?, is_public = ?, reporter = ?, assigned_employee = ?,
                escalated_to = ?, escalation_date = ?, escalation_reason = ?,
                last_status_change = ?, requires_escalation = ?,
                days_open = ?, days_since_assignment = ?,
                created_at = ?, updated_at = ?, assigned_at = ?
             WHERE id = ?",
        )
        .bind(&complaint.title)
        .bind(&complaint.category)
        .bind(&complaint.description)
        .bind(complaint.status.as_str())
        .bind(complaint.urgency.as_str())
        .bind(complaint.anonymous)
        .bind(complaint.is_public)
        .bind(complaint.reporter)
        .bind(complaint.assigned_employee)
        .bind(complaint.escalated_to)
        .bind(complaint.escalation_date)
        .bind(complaint.escalation_reason.as_deref())
        .bind(complaint.last_status_change)
        .bind(complaint.requires_escalation)
        .bind(complaint.days_open)
        .bind(complaint.days_since_assignment)
        .bind(complaint.created_at)
        .bind(complaint.updated_at)
        .bind(complaint.assigned_at)
        .bind(complaint.id)
        .execute(&self.pool)
        .await?;

        Ok(complaint.clone())
    }

    async fn find_eligible_for_escalation(&self, cutoff: DateTime<Utc>) -> Result<Vec<Complaint>> {
        // SQL form of Complaint::escalation_due. Oldest first so the
        // most starved complaints are served before the rest.
        let rows: Vec<ComplaintRow> = sqlx::query_as(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints
             WHERE escalated_to IS NULL
               AND status != 'RESOLVED'
               AND (
                     (assigned_employee IS NULL AND created_at < ?)
                  OR (assigned_employee IS NOT NULL
                      AND (created_at < ? OR last_status_change < ?))
               )
             ORDER BY created_at ASC"
        ))
        .bind(cutoff)
        .bind(cutoff)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Complaint::try_from).collect()
    }

    async fn find_by_escalated_to(&self, user_id: i64) -> Result<Vec<Complaint>> {
        let rows: Vec<ComplaintRow> = sqlx::query_as(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints
             WHERE escalated_to = ? ORDER BY escalation_date DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Complaint::try_from).collect()
    }

    async fn find_by_assigned_employee(&self, user_id: i64) -> Result<Vec<Complaint>> {
        let rows: Vec<ComplaintRow> = sqlx::query_as(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints
             WHERE assigned_employee = ? ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Complaint::try_from).collect()
    }

    async fn count_by_escalated_to(&self, user_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM complaints WHERE escalated_to = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn find_all_escalated(&self) -> Result<Vec<Complaint>> {
        let rows: Vec<ComplaintRow> = sqlx::query_as(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints
             WHERE escalated_to IS NOT NULL ORDER BY escalation_date DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Complaint::try_from).collect()
    }

    async fn try_escalate(&self, id: i64, grant: &EscalationGrant) -> Result<bool> {
        // One conditional UPDATE guarded by `escalated_to IS NULL`.
        // Column references on the right-hand side see pre-update
        // values, so the assignment/status promotions key off the state
        // the guard observed. A concurrent writer that escalated first
        // makes this a no-op (rows_affected = 0).
        let result = sqlx::query(
            "UPDATE complaints SET
                escalated_to = ?,
                escalation_date = ?,
                escalation_reason = ?,
                assigned_at = CASE
                    WHEN assigned_employee IS NULL AND assigned_at IS NULL THEN ?
                    ELSE assigned_at END,
                assigned_employee = COALESCE(assigned_employee, ?),
                last_status_change = CASE
                    WHEN status = 'NEW' THEN ?
                    ELSE last_status_change END,
                status = CASE WHEN status = 'NEW' THEN 'UNDER_REVIEW' ELSE status END,
                requires_escalation = 0,
                updated_at = ?
             WHERE id = ? AND escalated_to IS NULL",
        )
        .bind(grant.target)
        .bind(grant.at)
        .bind(&grant.reason)
        .bind(grant.at)
        .bind(grant.target)
        .bind(grant.at)
        .bind(grant.at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, req: NewUser) -> Result<User> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (full_name, email, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&req.full_name)
        .bind(&req.email)
        .bind(req.role.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let unique = matches!(
                &e,
                sqlx::Error::Database(db)
                    if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
            );
            if unique {
                StoreError::EmailTaken(req.email.clone())
            } else {
                StoreError::Database(e)
            }
        })?;

        Ok(User {
            id: result.last_insert_rowid(),
            full_name: req.full_name,
            email: req.email,
            role: req.role,
            created_at: now,
        })
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, full_name, email, role, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_senior_employees(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, full_name, email, role, created_at FROM users
             WHERE role = 'SENIOR_EMPLOYEE' ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    full_name: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<User> {
        let role = row.role.parse::<Role>().map_err(StoreError::CorruptRow)?;
        Ok(User {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            role,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ComplaintRow {
    id: i64,
    title: String,
    category: String,
    description: String,
    status: String,
    urgency: String,
    anonymous: bool,
    is_public: bool,
    reporter: Option<i64>,
    assigned_employee: Option<i64>,
    escalated_to: Option<i64>,
    escalation_date: Option<DateTime<Utc>>,
    escalation_reason: Option<String>,
    last_status_change: Option<DateTime<Utc>>,
    requires_escalation: bool,
    days_open: i64,
    days_since_assignment: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    assigned_at: Option<DateTime<Utc>>,
}

impl TryFrom<ComplaintRow> for Complaint {
    type Error = StoreError;

    fn try_from(row: ComplaintRow) -> Result<Complaint> {
        let status = row.status.parse::<ComplaintStatus>().map_err(StoreError::CorruptRow)?;
        let urgency = row.urgency.parse::<Urgency>().map_err(StoreError::CorruptRow)?;
        Ok(Complaint {
            id: row.id,
            title: row.title,
            category: row.category,
            description: row.description,
            status,
            urgency,
            anonymous: row.anonymous,
            is_public: row.is_public,
            reporter: row.reporter,
            assigned_employee: row.assigned_employee,
            escalated_to: row.escalated_to,
            escalation_date: row.escalation_date,
            escalation_reason: row.escalation_reason,
            last_status_change: row.last_status_change,
            requires_escalation: row.requires_escalation,
            days_open: row.days_open,
            days_since_assignment: row.days_since_assignment,
            created_at: row.created_at,
            updated_at: row.updated_at,
            assigned_at: row.assigned_at,
        })
    }
}
