//! Bulk membership provisioning.
//!
//! Turns a selection — roster groups or parsed upload rows — into
//! membership registry entries. Rows are processed sequentially so each
//! create sees the effect of the previous ones; persons already holding an
//! active membership are filtered out up front and never counted against
//! the batch. One row's failure is recorded and the batch continues.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    directory::{PersonDirectory, PersonKind, PersonRef, RosterSource},
    error::{AppError, AppResult},
    models::import::{BatchProgress, BatchReport, ImportRow, RowOutcome, RowStatus},
    models::member::{Member, MemberType},
    repository::members::{MembersRepository, NewMember},
};

/// Registry write port used by the provisioner; implemented by the members
/// repository, mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn active_person_keys(&self, school_id: i64) -> AppResult<HashSet<(PersonKind, i64)>>;
    async fn provision(&self, new: &NewMember) -> AppResult<Member>;
}

#[async_trait]
impl MembershipStore for MembersRepository {
    async fn active_person_keys(&self, school_id: i64) -> AppResult<HashSet<(PersonKind, i64)>> {
        MembersRepository::active_person_keys(self, school_id).await
    }

    async fn provision(&self, new: &NewMember) -> AppResult<Member> {
        MembersRepository::provision(self, new).await
    }
}

/// Cooperative cancellation token checked between rows; an in-flight row is
/// never interrupted mid-write.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run knobs: cancellation and a progress channel
#[derive(Default)]
pub struct BatchOptions {
    pub cancel: CancelFlag,
    pub progress: Option<watch::Sender<BatchProgress>>,
}

/// One unit of work after input resolution and validation
struct WorkItem {
    row_number: usize,
    row: Option<ImportRow>,
    person: Option<PersonRef>,
    limit_override: Option<i32>,
}

#[derive(Clone)]
pub struct ProvisioningService {
    store: Arc<dyn MembershipStore>,
    roster: Arc<dyn RosterSource>,
    directory: Arc<dyn PersonDirectory>,
}

impl ProvisioningService {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        roster: Arc<dyn RosterSource>,
        directory: Arc<dyn PersonDirectory>,
    ) -> Self {
        Self { store, roster, directory }
    }

    /// Provision every active roster member of the selected groups as a
    /// student member.
    pub async fn provision_from_groups(
        &self,
        school_id: i64,
        batch_ids: &[i64],
        default_limit: i32,
        options: BatchOptions,
    ) -> AppResult<BatchReport> {
        let mut outcomes = Vec::new();
        let mut seen: HashSet<(PersonKind, i64)> = HashSet::new();
        let mut items = Vec::new();
        let mut position = 0usize;

        for batch_id in batch_ids {
            for person in self.roster.group_members(school_id, *batch_id).await? {
                position += 1;
                if !seen.insert(person.key()) {
                    outcomes.push(RowOutcome {
                        row_number: position,
                        row: None,
                        status: RowStatus::Excluded {
                            reason: "listed more than once in the selection".to_string(),
                        },
                    });
                    continue;
                }
                items.push(WorkItem {
                    row_number: position,
                    row: None,
                    person: Some(person),
                    limit_override: None,
                });
            }
        }

        self.run_batch(
            school_id,
            MemberType::Student,
            items,
            outcomes,
            default_limit,
            options,
        )
        .await
    }

    /// Provision rows parsed from an uploaded member list. `dropped` rows
    /// (missing mandatory fields) are reported as excluded and never
    /// counted.
    pub async fn provision_from_rows(
        &self,
        school_id: i64,
        member_type: MemberType,
        parsed: Vec<(usize, ImportRow)>,
        dropped: Vec<(usize, String)>,
        default_limit: i32,
        options: BatchOptions,
    ) -> AppResult<BatchReport> {
        let mut outcomes: Vec<RowOutcome> = dropped
            .into_iter()
            .map(|(row_number, reason)| RowOutcome {
                row_number,
                row: None,
                status: RowStatus::Excluded { reason },
            })
            .collect();

        // Collapse duplicate emails within the batch to the first occurrence
        let mut seen_emails = HashSet::new();
        let mut items = Vec::new();
        for (row_number, row) in parsed {
            if !seen_emails.insert(row.email.to_lowercase()) {
                outcomes.push(RowOutcome {
                    row_number,
                    row: Some(row),
                    status: RowStatus::Excluded {
                        reason: "duplicate email within the batch".to_string(),
                    },
                });
                continue;
            }
            items.push(WorkItem {
                row_number,
                limit_override: row.borrowing_limit,
                person: None,
                row: Some(row),
            });
        }

        self.run_batch(school_id, member_type, items, outcomes, default_limit, options)
            .await
    }

    /// Shared sequential pipeline. Pre-filters persons who already hold an
    /// active membership, then processes the remaining rows one by one.
    async fn run_batch(
        &self,
        school_id: i64,
        member_type: MemberType,
        items: Vec<WorkItem>,
        mut outcomes: Vec<RowOutcome>,
        default_limit: i32,
        options: BatchOptions,
    ) -> AppResult<BatchReport> {
        let existing = self.store.active_person_keys(school_id).await?;
        let kind = PersonKind::from(member_type);

        let candidates = items.len();
        let mut progress = BatchProgress { total: candidates, ..Default::default() };
        let mut seen: HashSet<(PersonKind, i64)> = HashSet::new();
        let mut success = 0usize;
        let mut failed = 0usize;
        let mut cancelled = false;

        for item in items {
            if options.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let outcome = self
                .process_item(school_id, member_type, kind, &item, &existing, &mut seen, default_limit)
                .await;

            match &outcome {
                RowStatus::Created { .. } => success += 1,
                RowStatus::Failed { .. } => failed += 1,
                RowStatus::Excluded { .. } => {
                    // Filtered after resolution; drop from the candidate count
                    progress.total = progress.total.saturating_sub(1);
                }
            }

            outcomes.push(RowOutcome {
                row_number: item.row_number,
                row: item.row,
                status: outcome,
            });

            progress.processed = success + failed;
            progress.success = success;
            progress.failed = failed;
            if let Some(ref tx) = options.progress {
                let _ = tx.send(progress);
            }
        }

        outcomes.sort_by_key(|o| o.row_number);

        let report = BatchReport {
            job_id: Uuid::new_v4(),
            success,
            failed,
            total: success + failed,
            cancelled,
            rows: outcomes,
        };
        tracing::info!(
            job_id = %report.job_id,
            success = report.success,
            failed = report.failed,
            total = report.total,
            cancelled = report.cancelled,
            "provisioning batch finished"
        );
        Ok(report)
    }

    /// Resolve and provision one entry. Every error becomes a row outcome;
    /// nothing escapes to abort the batch.
    #[allow(clippy::too_many_arguments)]
    async fn process_item(
        &self,
        school_id: i64,
        member_type: MemberType,
        kind: PersonKind,
        item: &WorkItem,
        existing: &HashSet<(PersonKind, i64)>,
        seen: &mut HashSet<(PersonKind, i64)>,
        default_limit: i32,
    ) -> RowStatus {
        let person = match &item.person {
            Some(person) => person.clone(),
            None => {
                let email = item.row.as_ref().map(|r| r.email.as_str()).unwrap_or_default();
                match self.directory.find_by_email(school_id, kind, email).await {
                    Ok(Some(person)) => person,
                    Ok(None) => {
                        return RowStatus::Failed {
                            reason: format!("no active {} record for {}", member_type, email),
                        }
                    }
                    Err(e) => return RowStatus::Failed { reason: e.to_string() },
                }
            }
        };

        if existing.contains(&person.key()) {
            return RowStatus::Excluded {
                reason: "already an active member".to_string(),
            };
        }
        if !seen.insert(person.key()) {
            return RowStatus::Excluded {
                reason: "listed more than once in the selection".to_string(),
            };
        }

        let new = NewMember {
            school_id,
            member_type,
            person,
            borrowing_limit: item.limit_override.unwrap_or(default_limit),
        };

        match self.store.provision(&new).await {
            Ok(member) => RowStatus::Created { member_code: member.member_code },
            // Raced with a concurrent create; same semantics as the up-front filter
            Err(AppError::AlreadyMember(_)) => RowStatus::Excluded {
                reason: "already an active member".to_string(),
            },
            Err(e) => RowStatus::Failed { reason: e.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{MockPersonDirectory, MockRosterSource};
    use chrono::Utc;
    use mockall::predicate::eq;

    fn student(id: i64, name: &str) -> PersonRef {
        PersonRef {
            kind: PersonKind::Student,
            id,
            first_name: name.to_string(),
            last_name: "Test".to_string(),
            email: Some(format!("{}@example.edu", name.to_lowercase())),
        }
    }

    fn member_for(new: &NewMember, id: i64) -> Member {
        Member {
            id,
            school_id: new.school_id,
            member_code: format!("STU25{:04}", id),
            member_type: new.member_type,
            student_id: (new.person.kind == PersonKind::Student).then_some(new.person.id),
            staff_id: (new.person.kind == PersonKind::Staff).then_some(new.person.id),
            first_name: new.person.first_name.clone(),
            last_name: new.person.last_name.clone(),
            email: new.person.email.clone(),
            borrowing_limit: new.borrowing_limit,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn row(first: &str, email: &str) -> ImportRow {
        ImportRow {
            first_name: first.to_string(),
            last_name: "Test".to_string(),
            email: email.to_string(),
            identifier: None,
            borrowing_limit: None,
        }
    }

    fn service(
        store: MockMembershipStore,
        roster: MockRosterSource,
        directory: MockPersonDirectory,
    ) -> ProvisioningService {
        ProvisioningService::new(Arc::new(store), Arc::new(roster), Arc::new(directory))
    }

    #[tokio::test]
    async fn existing_member_filtered_not_failed() {
        // Three in the roster, one already a member: {success: 2, failed: 0, total: 2}
        let mut store = MockMembershipStore::new();
        store
            .expect_active_person_keys()
            .with(eq(1))
            .returning(|_| Ok(HashSet::from([(PersonKind::Student, 2)])));
        store
            .expect_provision()
            .times(2)
            .returning(|new| Ok(member_for(new, new.person.id)));

        let mut roster = MockRosterSource::new();
        roster
            .expect_group_members()
            .with(eq(1), eq(10))
            .returning(|_, _| Ok(vec![student(1, "A"), student(2, "B"), student(3, "C")]));

        let svc = service(store, roster, MockPersonDirectory::new());
        let report = svc
            .provision_from_groups(1, &[10], 3, BatchOptions::default())
            .await
            .unwrap();

        assert_eq!((report.success, report.failed, report.total), (2, 0, 2));
        assert!(!report.cancelled);
        let excluded: Vec<_> = report
            .rows
            .iter()
            .filter(|o| matches!(o.status, RowStatus::Excluded { .. }))
            .collect();
        assert_eq!(excluded.len(), 1);
    }

    #[tokio::test]
    async fn person_listed_twice_provisioned_once() {
        let mut store = MockMembershipStore::new();
        store.expect_active_person_keys().returning(|_| Ok(HashSet::new()));
        store
            .expect_provision()
            .times(1)
            .returning(|new| Ok(member_for(new, 7)));

        let mut roster = MockRosterSource::new();
        // The same student appears in both selected groups
        roster
            .expect_group_members()
            .returning(|_, _| Ok(vec![student(7, "Dup")]));

        let svc = service(store, roster, MockPersonDirectory::new());
        let report = svc
            .provision_from_groups(1, &[10, 11], 3, BatchOptions::default())
            .await
            .unwrap();

        assert_eq!((report.success, report.failed, report.total), (1, 0, 1));
    }

    #[tokio::test]
    async fn row_failure_never_aborts_the_batch() {
        let mut store = MockMembershipStore::new();
        store.expect_active_person_keys().returning(|_| Ok(HashSet::new()));
        store.expect_provision().returning(|new| {
            if new.person.id == 1 {
                Err(AppError::Internal("constraint blew up".to_string()))
            } else {
                Ok(member_for(new, new.person.id))
            }
        });

        let mut directory = MockPersonDirectory::new();
        directory.expect_find_by_email().returning(|_, kind, email| {
            match email {
                "a@example.edu" => Ok(Some(PersonRef {
                    kind,
                    id: 1,
                    first_name: "A".into(),
                    last_name: "Test".into(),
                    email: Some(email.to_string()),
                })),
                "b@example.edu" => Ok(Some(PersonRef {
                    kind,
                    id: 2,
                    first_name: "B".into(),
                    last_name: "Test".into(),
                    email: Some(email.to_string()),
                })),
                _ => Ok(None),
            }
        });

        let svc = service(store, MockRosterSource::new(), directory);
        let rows = vec![
            (1, row("A", "a@example.edu")),
            (2, row("B", "b@example.edu")),
            (3, row("C", "ghost@example.edu")),
        ];
        let report = svc
            .provision_from_rows(1, MemberType::Student, rows, vec![], 3, BatchOptions::default())
            .await
            .unwrap();

        // Row 1 fails at the store, row 3 never resolves, row 2 succeeds
        assert_eq!((report.success, report.failed, report.total), (1, 2, 3));
    }

    #[tokio::test]
    async fn duplicate_email_in_batch_collapsed() {
        let mut store = MockMembershipStore::new();
        store.expect_active_person_keys().returning(|_| Ok(HashSet::new()));
        store
            .expect_provision()
            .times(1)
            .returning(|new| Ok(member_for(new, 1)));

        let mut directory = MockPersonDirectory::new();
        directory.expect_find_by_email().times(1).returning(|_, kind, email| {
            Ok(Some(PersonRef {
                kind,
                id: 1,
                first_name: "A".into(),
                last_name: "Test".into(),
                email: Some(email.to_string()),
            }))
        });

        let svc = service(store, MockRosterSource::new(), directory);
        let rows = vec![
            (1, row("A", "a@example.edu")),
            (2, row("A again", "A@Example.edu")),
        ];
        let report = svc
            .provision_from_rows(1, MemberType::Student, rows, vec![], 3, BatchOptions::default())
            .await
            .unwrap();

        assert_eq!((report.success, report.failed, report.total), (1, 0, 1));
    }

    #[tokio::test]
    async fn cancellation_reports_partial_counts() {
        let cancel = CancelFlag::new();
        let cancel_after_first = cancel.clone();

        let mut store = MockMembershipStore::new();
        store.expect_active_person_keys().returning(|_| Ok(HashSet::new()));
        store.expect_provision().times(1).returning(move |new| {
            // Cancel while the first row is in flight; the second row must
            // not start
            cancel_after_first.cancel();
            Ok(member_for(new, new.person.id))
        });

        let mut roster = MockRosterSource::new();
        roster
            .expect_group_members()
            .returning(|_, _| Ok(vec![student(1, "A"), student(2, "B")]));

        let svc = service(store, roster, MockPersonDirectory::new());
        let report = svc
            .provision_from_groups(
                1,
                &[10],
                3,
                BatchOptions { cancel, progress: None },
            )
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!((report.success, report.failed, report.total), (1, 0, 1));
    }

    #[tokio::test]
    async fn progress_published_between_rows() {
        let (tx, rx) = watch::channel(BatchProgress::default());

        let mut store = MockMembershipStore::new();
        store.expect_active_person_keys().returning(|_| Ok(HashSet::new()));
        store
            .expect_provision()
            .returning(|new| Ok(member_for(new, new.person.id)));

        let mut roster = MockRosterSource::new();
        roster
            .expect_group_members()
            .returning(|_, _| Ok(vec![student(1, "A"), student(2, "B")]));

        let svc = service(store, roster, MockPersonDirectory::new());
        let report = svc
            .provision_from_groups(
                1,
                &[10],
                3,
                BatchOptions { cancel: CancelFlag::new(), progress: Some(tx) },
            )
            .await
            .unwrap();

        assert_eq!(report.success, 2);
        let last = *rx.borrow();
        assert_eq!(last.processed, 2);
        assert_eq!(last.success, 2);
        assert_eq!(last.total, 2);
    }
}
