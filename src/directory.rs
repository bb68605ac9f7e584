//! Interfaces to the rest of the platform: class rosters and the person
//! directory. The lending core only ever reads through these traits; the
//! Postgres implementations query the platform's `students`, `staff` and
//! `batches` tables.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Pool, Postgres, Row};

use crate::{
    error::AppResult,
    models::member::MemberType,
};

/// Which directory a person lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonKind {
    Student,
    Staff,
}

impl From<MemberType> for PersonKind {
    fn from(t: MemberType) -> Self {
        if t.uses_staff_directory() {
            PersonKind::Staff
        } else {
            PersonKind::Student
        }
    }
}

/// A resolved person reference, enough to provision a membership
#[derive(Debug, Clone, Serialize)]
pub struct PersonRef {
    pub kind: PersonKind,
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl PersonRef {
    /// Dedup key: a person holds at most one active membership per school.
    pub fn key(&self) -> (PersonKind, i64) {
        (self.kind, self.id)
    }
}

/// Roster source: resolves a group (batch/class) into its active members.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn group_members(&self, school_id: i64, batch_id: i64) -> AppResult<Vec<PersonRef>>;
}

/// Person directory: resolves a contact identifier or a record id to a
/// person reference.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersonDirectory: Send + Sync {
    async fn find_by_email(
        &self,
        school_id: i64,
        kind: PersonKind,
        email: &str,
    ) -> AppResult<Option<PersonRef>>;

    async fn find_by_id(
        &self,
        school_id: i64,
        kind: PersonKind,
        id: i64,
    ) -> AppResult<Option<PersonRef>>;
}

/// Postgres-backed roster source over the platform's batches/students tables
#[derive(Clone)]
pub struct PgRosterSource {
    pool: Pool<Postgres>,
}

impl PgRosterSource {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RosterSource for PgRosterSource {
    async fn group_members(&self, school_id: i64, batch_id: i64) -> AppResult<Vec<PersonRef>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.first_name, s.last_name, s.email
            FROM students s
            WHERE s.school_id = $1 AND s.batch_id = $2 AND s.is_active
            ORDER BY s.last_name, s.first_name, s.id
            "#,
        )
        .bind(school_id)
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PersonRef {
                kind: PersonKind::Student,
                id: row.get("id"),
                first_name: row.get("first_name"),
                last_name: row.get("last_name"),
                email: row.get("email"),
            })
            .collect())
    }
}

/// Postgres-backed person directory over the students/staff tables
#[derive(Clone)]
pub struct PgPersonDirectory {
    pool: Pool<Postgres>,
}

impl PgPersonDirectory {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonDirectory for PgPersonDirectory {
    async fn find_by_email(
        &self,
        school_id: i64,
        kind: PersonKind,
        email: &str,
    ) -> AppResult<Option<PersonRef>> {
        let table = match kind {
            PersonKind::Student => "students",
            PersonKind::Staff => "staff",
        };
        let query = format!(
            r#"
            SELECT id, first_name, last_name, email
            FROM {}
            WHERE school_id = $1 AND LOWER(email) = LOWER($2) AND is_active
            "#,
            table
        );

        let row = sqlx::query(&query)
            .bind(school_id)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| PersonRef {
            kind,
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
        }))
    }

    async fn find_by_id(
        &self,
        school_id: i64,
        kind: PersonKind,
        id: i64,
    ) -> AppResult<Option<PersonRef>> {
        let table = match kind {
            PersonKind::Student => "students",
            PersonKind::Staff => "staff",
        };
        let query = format!(
            r#"
            SELECT id, first_name, last_name, email
            FROM {}
            WHERE school_id = $1 AND id = $2 AND is_active
            "#,
            table
        );

        let row = sqlx::query(&query)
            .bind(school_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| PersonRef {
            kind,
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
        }))
    }
}
