//! Lending-policy repository

use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::loan::LendingPolicy,
    models::member::MemberType,
};

#[derive(Clone)]
pub struct SettingsRepository {
    pool: Pool<Postgres>,
}

impl SettingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Stored policies for a school, one row per member type
    pub async fn get_policies(&self, school_id: i64) -> AppResult<Vec<LendingPolicy>> {
        let policies = sqlx::query_as::<_, LendingPolicy>(
            r#"
            SELECT member_type, max_books, max_renewals, loan_period_days, fine_rate_per_day
            FROM lending_policies
            WHERE school_id = $1
            ORDER BY member_type
            "#,
        )
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(policies)
    }

    /// Stored policy for one member type, if any
    pub async fn get_policy(
        &self,
        school_id: i64,
        member_type: MemberType,
    ) -> AppResult<Option<LendingPolicy>> {
        let policy = sqlx::query_as::<_, LendingPolicy>(
            r#"
            SELECT member_type, max_books, max_renewals, loan_period_days, fine_rate_per_day
            FROM lending_policies
            WHERE school_id = $1 AND member_type = $2
            "#,
        )
        .bind(school_id)
        .bind(member_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(policy)
    }

    /// Upsert one policy row
    pub async fn upsert_policy(&self, school_id: i64, policy: &LendingPolicy) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE lending_policies
            SET max_books = $3, max_renewals = $4, loan_period_days = $5, fine_rate_per_day = $6
            WHERE school_id = $1 AND member_type = $2
            "#,
        )
        .bind(school_id)
        .bind(policy.member_type)
        .bind(policy.max_books)
        .bind(policy.max_renewals)
        .bind(policy.loan_period_days)
        .bind(policy.fine_rate_per_day)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            sqlx::query(
                r#"
                INSERT INTO lending_policies (school_id, member_type, max_books, max_renewals, loan_period_days, fine_rate_per_day)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(school_id)
            .bind(policy.member_type)
            .bind(policy.max_books)
            .bind(policy.max_renewals)
            .bind(policy.loan_period_days)
            .bind(policy.fine_rate_per_day)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }
}
