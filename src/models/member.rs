//! Library member model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Member type (string identifier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    Student,
    Teacher,
    Staff,
}

impl MemberType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberType::Student => "student",
            MemberType::Teacher => "teacher",
            MemberType::Staff => "staff",
        }
    }

    /// Member-code prefix, distinct per type ("STU250042")
    pub fn code_prefix(&self) -> &'static str {
        match self {
            MemberType::Student => "STU",
            MemberType::Teacher => "TCH",
            MemberType::Staff => "STF",
        }
    }

    /// Whether members of this type are identified by a staff record
    /// (teachers and staff) rather than a student record.
    pub fn uses_staff_directory(&self) -> bool {
        !matches!(self, MemberType::Student)
    }
}

impl std::fmt::Display for MemberType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemberType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(MemberType::Student),
            "teacher" => Ok(MemberType::Teacher),
            "staff" => Ok(MemberType::Staff),
            _ => Err(format!("Invalid member type: {}", s)),
        }
    }
}

// SQLx conversion for MemberType
impl sqlx::Type<Postgres> for MemberType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for MemberType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for MemberType {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Library member from database.
///
/// Exactly one of `student_id`/`staff_id` is set (DB check); members are
/// deactivated, never hard-deleted, once loans reference them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: i64,
    pub school_id: i64,
    /// Human-facing lookup key, unique per school; not the primary key
    pub member_code: String,
    pub member_type: MemberType,
    pub student_id: Option<i64>,
    pub staff_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub borrowing_limit: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Short member representation for lists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MemberShort {
    pub id: i64,
    pub member_code: String,
    pub member_type: MemberType,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub active_loans: Option<i64>,
    pub overdue_loans: Option<i64>,
}

/// Single-add membership request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    pub school_id: i64,
    pub member_type: MemberType,
    /// Student record id (students) — required for student members
    pub student_id: Option<i64>,
    /// Staff record id (teachers and staff members)
    pub staff_id: Option<i64>,
    /// Concurrent-loan cap; defaults to the school's policy for the type
    #[validate(range(min = 1, message = "Borrowing limit must be positive"))]
    pub borrowing_limit: Option<i32>,
}

/// Member query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct MemberQuery {
    pub school_id: i64,
    pub name: Option<String>,
    pub member_code: Option<String>,
    pub member_type: Option<MemberType>,
    pub active_only: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
