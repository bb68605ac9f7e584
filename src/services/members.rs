//! Membership service: single-add flow and registry queries

use std::sync::Arc;

use crate::{
    directory::{PersonDirectory, PersonKind},
    error::{AppError, AppResult},
    models::member::{CreateMember, Member, MemberQuery, MemberShort},
    repository::{members::NewMember, Repository},
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
    directory: Arc<dyn PersonDirectory>,
}

impl MembersService {
    pub fn new(repository: Repository, directory: Arc<dyn PersonDirectory>) -> Self {
        Self { repository, directory }
    }

    pub async fn get(&self, school_id: i64, id: i64) -> AppResult<Member> {
        self.repository.members.get_by_id(school_id, id).await
    }

    pub async fn get_by_code(&self, school_id: i64, code: &str) -> AppResult<Member> {
        self.repository.members.get_by_code(school_id, code).await
    }

    pub async fn search(&self, query: &MemberQuery) -> AppResult<(Vec<MemberShort>, i64)> {
        self.repository.members.search(query).await
    }

    /// Single-add provisioning: resolve the person record, apply the
    /// default borrowing limit, create the membership. The registry's
    /// unique index turns duplicates into `AlreadyMember`.
    pub async fn create(&self, request: CreateMember, default_limit: i32) -> AppResult<Member> {
        let kind = PersonKind::from(request.member_type);
        let person_id = match kind {
            PersonKind::Student => request.student_id,
            PersonKind::Staff => request.staff_id,
        }
        .ok_or_else(|| {
            AppError::Validation(format!(
                "A {} membership needs the matching person reference",
                request.member_type
            ))
        })?;

        let person = self
            .directory
            .find_by_id(request.school_id, kind, person_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No active {:?} record with id {}", kind, person_id))
            })?;

        let new = NewMember {
            school_id: request.school_id,
            member_type: request.member_type,
            person,
            borrowing_limit: request.borrowing_limit.unwrap_or(default_limit),
        };

        let member = self.repository.members.provision(&new).await?;
        tracing::info!(member_id = member.id, code = %member.member_code, "membership created");
        Ok(member)
    }

    /// Deactivate a membership (members are never hard-deleted)
    pub async fn deactivate(&self, school_id: i64, id: i64) -> AppResult<Member> {
        self.repository.members.deactivate(school_id, id).await
    }
}
