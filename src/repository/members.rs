//! Members repository: the membership registry.
//!
//! The one-active-membership-per-person invariant is carried by partial
//! unique indexes (`uq_members_active_student` / `uq_members_active_staff`);
//! provisioning maps their violations to `AlreadyMember` instead of
//! pre-checking, so concurrent provisioning cannot race past the guarantee.

use chrono::{Datelike, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    directory::{PersonKind, PersonRef},
    error::{AppError, AppResult},
    models::member::{Member, MemberQuery, MemberShort, MemberType},
};

/// Everything needed to persist one membership
#[derive(Debug, Clone)]
pub struct NewMember {
    pub school_id: i64,
    pub member_type: MemberType,
    pub person: PersonRef,
    pub borrowing_limit: i32,
}

#[derive(Clone)]
pub struct MembersRepository {
    pool: Pool<Postgres>,
}

impl MembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get member by ID
    pub async fn get_by_id(&self, school_id: i64, id: i64) -> AppResult<Member> {
        sqlx::query_as::<_, Member>(
            "SELECT * FROM library_members WHERE id = $1 AND school_id = $2",
        )
        .bind(id)
        .bind(school_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    /// Get member by its human-facing code
    pub async fn get_by_code(&self, school_id: i64, code: &str) -> AppResult<Member> {
        sqlx::query_as::<_, Member>(
            "SELECT * FROM library_members WHERE school_id = $1 AND member_code = $2",
        )
        .bind(school_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member with code {} not found", code)))
    }

    /// Active membership held by a person, if any
    pub async fn lookup_active(
        &self,
        school_id: i64,
        kind: PersonKind,
        person_id: i64,
    ) -> AppResult<Option<Member>> {
        let column = match kind {
            PersonKind::Student => "student_id",
            PersonKind::Staff => "staff_id",
        };
        let query = format!(
            "SELECT * FROM library_members WHERE school_id = $1 AND {} = $2 AND is_active",
            column
        );
        let member = sqlx::query_as::<_, Member>(&query)
            .bind(school_id)
            .bind(person_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(member)
    }

    /// Person keys of every active member of the school; used by the bulk
    /// provisioner to filter a work list up front.
    pub async fn active_person_keys(
        &self,
        school_id: i64,
    ) -> AppResult<std::collections::HashSet<(PersonKind, i64)>> {
        let rows: Vec<(Option<i64>, Option<i64>)> = sqlx::query_as(
            "SELECT student_id, staff_id FROM library_members WHERE school_id = $1 AND is_active",
        )
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(student_id, staff_id)| match (student_id, staff_id) {
                (Some(id), _) => Some((PersonKind::Student, id)),
                (_, Some(id)) => Some((PersonKind::Staff, id)),
                _ => None,
            })
            .collect())
    }

    /// Number of live loans held by a member (issued or materialized
    /// overdue); the loan ledger checks this against `borrowing_limit`.
    pub async fn active_loan_count(&self, school_id: i64, member_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM loan_transactions
            WHERE school_id = $1 AND member_id = $2 AND status IN ('issued', 'overdue')
            "#,
        )
        .bind(school_id)
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Create an active membership with a freshly generated member code.
    ///
    /// Fails with `AlreadyMember` when the person already holds an active
    /// membership in the school (unique-index violation). Code collisions
    /// under concurrency are retried with a regenerated code.
    pub async fn provision(&self, new: &NewMember) -> AppResult<Member> {
        let now = Utc::now();
        let (student_id, staff_id) = match new.person.kind {
            PersonKind::Student => (Some(new.person.id), None),
            PersonKind::Staff => (None, Some(new.person.id)),
        };

        for _ in 0..3 {
            let code = self.next_member_code(new.school_id, new.member_type).await?;

            let inserted = sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO library_members (
                    school_id, member_code, member_type, student_id, staff_id,
                    first_name, last_name, email, borrowing_limit, is_active, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE, $10)
                RETURNING id
                "#,
            )
            .bind(new.school_id)
            .bind(&code)
            .bind(new.member_type)
            .bind(student_id)
            .bind(staff_id)
            .bind(&new.person.first_name)
            .bind(&new.person.last_name)
            .bind(&new.person.email)
            .bind(new.borrowing_limit)
            .bind(now)
            .fetch_one(&self.pool)
            .await;

            match inserted {
                Ok(id) => return self.get_by_id(new.school_id, id).await,
                Err(sqlx::Error::Database(db))
                    if db.constraint() == Some("uq_members_code") =>
                {
                    // Another provision won the same code; regenerate
                    continue;
                }
                Err(sqlx::Error::Database(db))
                    if matches!(
                        db.constraint(),
                        Some("uq_members_active_student") | Some("uq_members_active_staff")
                    ) =>
                {
                    return Err(AppError::AlreadyMember(format!(
                        "{} {} already holds an active membership",
                        new.person.first_name, new.person.last_name
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Conflict(
            "Could not allocate a unique member code".to_string(),
        ))
    }

    /// Next member code for the type: prefix + 2-digit year + zero-padded
    /// sequence, e.g. STU250042. Uniqueness is enforced by `uq_members_code`;
    /// this only picks the next candidate.
    async fn next_member_code(&self, school_id: i64, member_type: MemberType) -> AppResult<String> {
        let year = Utc::now().year() % 100;
        let prefix = format!("{}{:02}", member_type.code_prefix(), year);

        let last: Option<String> = sqlx::query_scalar(
            r#"
            SELECT member_code FROM library_members
            WHERE school_id = $1 AND member_code LIKE $2
            ORDER BY member_code DESC
            LIMIT 1
            "#,
        )
        .bind(school_id)
        .bind(format!("{}%", prefix))
        .fetch_optional(&self.pool)
        .await?;

        let next = last
            .and_then(|code| code[prefix.len()..].parse::<u32>().ok())
            .map(|n| n + 1)
            .unwrap_or(1);

        Ok(format!("{}{:04}", prefix, next))
    }

    /// Deactivate a membership. Members are never hard-deleted: loan rows
    /// keep referencing them.
    pub async fn deactivate(&self, school_id: i64, id: i64) -> AppResult<Member> {
        let rows = sqlx::query(
            "UPDATE library_members SET is_active = FALSE WHERE id = $1 AND school_id = $2",
        )
        .bind(id)
        .bind(school_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::NotFound(format!("Member with id {} not found", id)));
        }
        self.get_by_id(school_id, id).await
    }

    /// Search members with pagination and live-loan counts
    pub async fn search(&self, query: &MemberQuery) -> AppResult<(Vec<MemberShort>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let mut conditions = vec!["m.school_id = $1".to_string()];
        let mut params: Vec<String> = Vec::new();

        if let Some(ref name) = query.name {
            params.push(format!("%{}%", name.to_lowercase()));
            conditions.push(format!(
                "(LOWER(m.first_name) LIKE ${} OR LOWER(m.last_name) LIKE ${})",
                params.len() + 1,
                params.len() + 1
            ));
        }
        if let Some(ref code) = query.member_code {
            params.push(code.clone());
            conditions.push(format!("m.member_code = ${}", params.len() + 1));
        }
        if let Some(member_type) = query.member_type {
            params.push(member_type.as_str().to_string());
            conditions.push(format!("m.member_type = ${}", params.len() + 1));
        }
        if query.active_only.unwrap_or(true) {
            conditions.push("m.is_active".to_string());
        }

        let where_clause = conditions.join(" AND ");

        let count_query = format!("SELECT COUNT(*) FROM library_members m WHERE {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query).bind(query.school_id);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            r#"
            SELECT m.id, m.member_code, m.member_type, m.first_name, m.last_name, m.is_active,
                   (SELECT COUNT(*) FROM loan_transactions l
                    WHERE l.member_id = m.id AND l.status IN ('issued', 'overdue')) as active_loans,
                   (SELECT COUNT(*) FROM loan_transactions l
                    WHERE l.member_id = m.id AND l.status IN ('issued', 'overdue')
                      AND l.due_date < NOW()) as overdue_loans
            FROM library_members m
            WHERE {}
            ORDER BY m.last_name, m.first_name, m.id
            LIMIT {} OFFSET {}
            "#,
            where_clause, per_page, offset
        );
        let mut select_builder =
            sqlx::query_as::<_, MemberShort>(&select_query).bind(query.school_id);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let members = select_builder.fetch_all(&self.pool).await?;

        Ok((members, total))
    }
}
