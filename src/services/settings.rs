//! Lending-policy settings service.
//!
//! Stored per-school policy rows override the configured defaults; any
//! member type without a row falls back to `LendingConfig`. Both the loan
//! ledger and the bulk provisioner resolve their limits, rates and caps
//! through here — nothing is hard-coded at call sites.

use crate::{
    config::LendingConfig,
    error::AppResult,
    models::loan::LendingPolicy,
    models::member::MemberType,
    repository::Repository,
};

#[derive(Clone)]
pub struct SettingsService {
    repository: Repository,
    defaults: LendingConfig,
}

impl SettingsService {
    pub fn new(repository: Repository, defaults: LendingConfig) -> Self {
        Self { repository, defaults }
    }

    /// Configured fallback policy for a member type
    fn default_policy(&self, member_type: MemberType) -> LendingPolicy {
        let max_books = match member_type {
            MemberType::Student => self.defaults.student_borrowing_limit,
            MemberType::Teacher => self.defaults.teacher_borrowing_limit,
            MemberType::Staff => self.defaults.staff_borrowing_limit,
        };
        LendingPolicy {
            member_type,
            max_books,
            max_renewals: self.defaults.max_renewals,
            loan_period_days: self.defaults.loan_period_days,
            fine_rate_per_day: self.defaults.fine_rate_per_day,
        }
    }

    /// Effective policy for one member type: stored row or defaults
    pub async fn policy_for(
        &self,
        school_id: i64,
        member_type: MemberType,
    ) -> AppResult<LendingPolicy> {
        Ok(self
            .repository
            .settings
            .get_policy(school_id, member_type)
            .await?
            .unwrap_or_else(|| self.default_policy(member_type)))
    }

    /// Effective policies for all member types
    pub async fn policies(&self, school_id: i64) -> AppResult<Vec<LendingPolicy>> {
        let stored = self.repository.settings.get_policies(school_id).await?;
        let mut result = Vec::with_capacity(3);
        for member_type in [MemberType::Student, MemberType::Teacher, MemberType::Staff] {
            result.push(
                stored
                    .iter()
                    .find(|p| p.member_type == member_type)
                    .cloned()
                    .unwrap_or_else(|| self.default_policy(member_type)),
            );
        }
        Ok(result)
    }

    /// Store policy rows for a school (upsert per member type)
    pub async fn update_policies(
        &self,
        school_id: i64,
        policies: Vec<LendingPolicy>,
    ) -> AppResult<Vec<LendingPolicy>> {
        for policy in &policies {
            self.repository.settings.upsert_policy(school_id, policy).await?;
        }
        self.policies(school_id).await
    }
}
