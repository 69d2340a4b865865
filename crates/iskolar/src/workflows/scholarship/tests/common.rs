use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::workflows::scholarship::disbursement::{Release, ReleaseDraft, ReleaseId};
use crate::workflows::scholarship::domain::{
    AdminContext, AdminRole, ApplicantAttributes, ApplicantIdentity, ApplicationId,
    ApplicationRecord, ApplicationStatus, ApplicationSubmission, SemesterId, UserId,
};
use crate::workflows::scholarship::eligibility::{CriteriaConfig, EligibilityEvaluator};
use crate::workflows::scholarship::repository::{
    ApplicationQuery, ApplicationRepository, Notification, NotificationError,
    NotificationPublisher, ReleaseQuery, ReleaseRepository, RepositoryError,
};
use crate::workflows::scholarship::{scholarship_router, ScholarshipService};

pub(super) fn semester() -> SemesterId {
    SemesterId("2025-1".to_string())
}

pub(super) fn attributes() -> ApplicantAttributes {
    ApplicantAttributes {
        years_of_residency: 5,
        registered_voter: true,
        monthly_family_income: Decimal::from(18_000),
        age: 19,
        gpa: 3.1,
        enrolled: true,
        enrolled_units: 21,
        has_failing_grades: false,
        awaiting_documents: BTreeSet::new(),
    }
}

pub(super) fn applicant(first: &str, last: &str, barangay: &str, school: &str) -> ApplicantIdentity {
    ApplicantIdentity {
        first_name: first.to_string(),
        last_name: last.to_string(),
        barangay: barangay.to_string(),
        school: school.to_string(),
        email_address: format!("{}@example.ph", first.to_lowercase()),
    }
}

pub(super) fn submission() -> ApplicationSubmission {
    ApplicationSubmission {
        semester_id: semester(),
        user_id: UserId("user-1".to_string()),
        applicant: applicant("Maria", "Santos", "Ususan", "Taguig City University"),
        attributes: attributes(),
    }
}

pub(super) fn admin() -> AdminContext {
    AdminContext {
        admin_id: "admin-7".to_string(),
        email: Some("reviewer@example.ph".to_string()),
        role: AdminRole::Admin,
    }
}

pub(super) fn super_admin() -> AdminContext {
    AdminContext {
        admin_id: "root-1".to_string(),
        email: None,
        role: AdminRole::SuperAdmin,
    }
}

pub(super) fn evaluator() -> EligibilityEvaluator {
    EligibilityEvaluator::new(CriteriaConfig::default()).expect("default criteria are valid")
}

pub(super) fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Stored record with fixed timestamps, for ordering and date-range checks.
pub(super) fn stored_record(
    id: &str,
    identity: ApplicantIdentity,
    status: ApplicationStatus,
    submitted_at: DateTime<Utc>,
) -> ApplicationRecord {
    let attributes = attributes();
    ApplicationRecord {
        application_id: ApplicationId(id.to_string()),
        semester_id: semester(),
        user_id: UserId(format!("user-{id}")),
        applicant: identity,
        eligibility: evaluator().evaluate(&attributes),
        attributes,
        status,
        rejection_reason: None,
        created_at: submitted_at,
        submitted_at,
        updated_at: submitted_at,
        reviewed_at: None,
        documents: BTreeMap::new(),
    }
}

pub(super) fn release_draft(amount: i64, recipients: Option<u32>) -> ReleaseDraft {
    ReleaseDraft {
        release_type: "allowance".to_string(),
        release_date: NaiveDate::from_ymd_opt(2025, 9, 15).expect("valid date"),
        release_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
        barangay: "Ususan".to_string(),
        location: "Barangay Hall".to_string(),
        amount_per_student: Decimal::from(amount),
        recipients,
        additional_notes: None,
    }
}

pub(super) fn build_service() -> (
    ScholarshipService<MemoryStore, MemoryNotifier>,
    Arc<MemoryStore>,
    Arc<MemoryNotifier>,
) {
    let store = Arc::new(MemoryStore::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = ScholarshipService::new(store.clone(), notifier.clone(), evaluator());
    (service, store, notifier)
}

#[derive(Default)]
pub(super) struct MemoryStore {
    applications: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
    releases: Mutex<Vec<Release>>,
    next_release: Mutex<u64>,
}

impl ApplicationRepository for MemoryStore {
    fn find(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.applications.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.applications.lock().expect("store mutex poisoned");
        if guard.contains_key(&record.application_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.application_id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut guard = self.applications.lock().expect("store mutex poisoned");
        guard.insert(record.application_id.clone(), record);
        Ok(())
    }

    fn delete(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        let mut guard = self.applications.lock().expect("store mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }

    fn query(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.applications.lock().expect("store mutex poisoned");
        let mut records: Vec<ApplicationRecord> = guard
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.application_id.cmp(&b.application_id));
        Ok(records)
    }
}

impl ReleaseRepository for MemoryStore {
    fn find_release(&self, id: ReleaseId) -> Result<Option<Release>, RepositoryError> {
        let guard = self.releases.lock().expect("store mutex poisoned");
        Ok(guard.iter().find(|release| release.release_id == id).cloned())
    }

    fn insert_release(
        &self,
        semester_id: &SemesterId,
        draft: ReleaseDraft,
    ) -> Result<Release, RepositoryError> {
        let mut next = self.next_release.lock().expect("store mutex poisoned");
        *next += 1;
        let release = Release::from_draft(ReleaseId(*next), semester_id.clone(), draft);
        self.releases
            .lock()
            .expect("store mutex poisoned")
            .push(release.clone());
        Ok(release)
    }

    fn update_release(&self, release: Release) -> Result<(), RepositoryError> {
        let mut guard = self.releases.lock().expect("store mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|existing| existing.release_id == release.release_id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = release;
        Ok(())
    }

    fn delete_release(&self, id: ReleaseId) -> Result<(), RepositoryError> {
        let mut guard = self.releases.lock().expect("store mutex poisoned");
        let before = guard.len();
        guard.retain(|release| release.release_id != id);
        if guard.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn query_releases(&self, query: &ReleaseQuery) -> Result<Vec<Release>, RepositoryError> {
        let guard = self.releases.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .filter(|release| query.matches(release))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    events: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationPublisher for MemoryNotifier {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl NotificationPublisher for FailingNotifier {
    fn publish(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp offline".to_string()))
    }
}

pub(super) struct UnavailableStore;

impl ApplicationRepository for UnavailableStore {
    fn find(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: ApplicationRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &ApplicationId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn query(&self, _query: &ApplicationQuery) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl ReleaseRepository for UnavailableStore {
    fn find_release(&self, _id: ReleaseId) -> Result<Option<Release>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_release(
        &self,
        _semester_id: &SemesterId,
        _draft: ReleaseDraft,
    ) -> Result<Release, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_release(&self, _release: Release) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_release(&self, _id: ReleaseId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn query_releases(&self, _query: &ReleaseQuery) -> Result<Vec<Release>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn router_with_service(
    service: ScholarshipService<MemoryStore, MemoryNotifier>,
) -> axum::Router {
    scholarship_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
