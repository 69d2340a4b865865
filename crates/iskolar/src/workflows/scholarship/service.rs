use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::disbursement::{
    releases_for_view, BudgetSummary, Release, ReleaseDraft, ReleaseId, ReleaseState,
    ReleaseView, SemesterBudget,
};
use super::domain::{
    AdminContext, ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSubmission,
    ApplicationSummary, DocumentRequest, DocumentReview, DocumentStatus, ReviewDecision,
    SemesterId, StatusTransitionError, UserId, ValidationError,
};
use super::eligibility::{
    CriteriaConfig, CriteriaValidationError, CriterionKind, CriterionStatus, EligibilityEvaluator,
    EligibilityReport, OverrideError, StatusOverride,
};
use super::export::applications_csv;
use super::history::ApplicantHistory;
use super::listing::{
    filter_and_sort, paginate, ApplicationFilter, Page, StatusFilter, DEFAULT_PAGE_SIZE,
};
use super::repository::{
    ApplicationQuery, ApplicationRepository, Notification, NotificationPublisher, ReleaseQuery,
    ReleaseRepository, RepositoryError,
};
use super::settings::{settings_changes, MaintenanceStatus, SettingsAuditEntry, SystemSettings};

/// Text a super administrator must type to confirm a semester reset.
pub const RESET_CONFIRMATION: &str = "DELETE";
const DEFAULT_AUDIT_LIMIT: usize = 100;

/// Back-office facade over the data store, the eligibility rules, and the
/// portal settings.
pub struct ScholarshipService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    evaluator: RwLock<EligibilityEvaluator>,
    settings: RwLock<SystemSettings>,
    settings_audit: RwLock<Vec<SettingsAuditEntry>>,
    page_size: usize,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

impl<S, N> ScholarshipService<S, N>
where
    S: ApplicationRepository + ReleaseRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, evaluator: EligibilityEvaluator) -> Self {
        Self {
            store,
            notifier,
            evaluator: RwLock::new(evaluator),
            settings: RwLock::new(SystemSettings::default()),
            settings_audit: RwLock::new(Vec::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_settings(self, settings: SystemSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            ..self
        }
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            ..self
        }
    }

    /// Accept a new application, evaluate it, and store it as pending.
    pub fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<ApplicationRecord, ScholarshipServiceError> {
        if !self
            .current_settings()
            .accepts_applications_for(&submission.semester_id)
        {
            return Err(ScholarshipServiceError::ApplicationsClosed);
        }
        submission.validate()?;

        let eligibility = self.current_evaluator().evaluate(&submission.attributes);
        let now = Utc::now();
        let ApplicationSubmission {
            semester_id,
            user_id,
            applicant,
            attributes,
        } = submission;

        let record = ApplicationRecord {
            application_id: next_application_id(),
            semester_id,
            user_id,
            applicant,
            attributes,
            status: ApplicationStatus::Pending,
            rejection_reason: None,
            created_at: now,
            submitted_at: now,
            updated_at: now,
            reviewed_at: None,
            documents: BTreeMap::new(),
            eligibility,
        };

        let stored = self.store.insert(record)?;
        info!(
            application_id = %stored.application_id,
            semester_id = %stored.semester_id,
            eligibility = stored.eligibility.overall().label(),
            "application submitted"
        );
        Ok(stored)
    }

    pub fn get(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, ScholarshipServiceError> {
        let record = self
            .store
            .find(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// Remove an application. Only possible while the deletion feature is on.
    pub fn delete_application(
        &self,
        ctx: &AdminContext,
        application_id: &ApplicationId,
    ) -> Result<(), ScholarshipServiceError> {
        if !self.current_settings().features.allow_application_deletion {
            return Err(ScholarshipServiceError::DeletionDisabled);
        }
        self.get(application_id)?;
        self.store.delete(application_id)?;
        info!(application_id = %application_id, actor = %ctx.admin_id, "application deleted");
        Ok(())
    }

    /// Approve or reject a pending application in a single store write, then
    /// notify the applicant.
    pub fn review(
        &self,
        ctx: &AdminContext,
        application_id: &ApplicationId,
        decision: ReviewDecision,
    ) -> Result<ApplicationRecord, ScholarshipServiceError> {
        let mut record = self.get(application_id)?;
        let next = record.status.apply(&decision)?;
        let now = Utc::now();

        record.status = next;
        record.rejection_reason = match &decision {
            ReviewDecision::Reject { reason } => reason
                .as_deref()
                .map(str::trim)
                .filter(|reason| !reason.is_empty())
                .map(str::to_string),
            ReviewDecision::Approve => None,
        };
        record.reviewed_at = Some(now);
        record.updated_at = now;

        self.store.update(record.clone())?;
        info!(
            application_id = %record.application_id,
            actor = %ctx.admin_id,
            status = record.status.label(),
            "application reviewed"
        );

        let mut details = BTreeMap::new();
        details.insert("status".to_string(), record.status.label().to_string());
        details.insert("name".to_string(), record.applicant.full_name());
        if let Some(reason) = &record.rejection_reason {
            details.insert("reason".to_string(), reason.clone());
        }
        self.notify(Notification {
            template: format!("application_{}", record.status.label()),
            recipient: Some(record.applicant.email_address.clone())
                .filter(|email| !email.trim().is_empty()),
            details,
        });

        Ok(record)
    }

    /// Recompute eligibility with the current criteria. Existing overrides survive.
    pub fn evaluate(
        &self,
        application_id: &ApplicationId,
    ) -> Result<EligibilityReport, ScholarshipServiceError> {
        let mut record = self.get(application_id)?;
        let report = self
            .current_evaluator()
            .evaluate(&record.attributes)
            .with_overrides_from(&record.eligibility);

        record.eligibility = report.clone();
        record.updated_at = Utc::now();
        self.store.update(record)?;
        debug!(
            application_id = %application_id,
            overall = report.overall().label(),
            "eligibility re-evaluated"
        );
        Ok(report)
    }

    pub fn override_criterion(
        &self,
        ctx: &AdminContext,
        application_id: &ApplicationId,
        criterion: CriterionKind,
        status: CriterionStatus,
        reason: Option<String>,
    ) -> Result<EligibilityReport, ScholarshipServiceError> {
        let mut record = self.get(application_id)?;
        let now = Utc::now();
        record.eligibility.apply_override(
            criterion,
            StatusOverride {
                status,
                set_by: ctx.admin_id.clone(),
                set_at: now,
                reason,
            },
        )?;
        record.updated_at = now;

        let report = record.eligibility.clone();
        self.store.update(record)?;
        info!(
            application_id = %application_id,
            actor = %ctx.admin_id,
            criterion = criterion.label(),
            status = status.label(),
            "criterion overridden"
        );
        Ok(report)
    }

    pub fn clear_override(
        &self,
        ctx: &AdminContext,
        application_id: &ApplicationId,
        criterion: CriterionKind,
    ) -> Result<EligibilityReport, ScholarshipServiceError> {
        let mut record = self.get(application_id)?;
        if record
            .eligibility
            .clear_override(criterion, &ctx.admin_id, Utc::now())?
            .is_none()
        {
            return Ok(record.eligibility);
        }
        record.updated_at = Utc::now();

        let report = record.eligibility.clone();
        self.store.update(record)?;
        info!(
            application_id = %application_id,
            actor = %ctx.admin_id,
            criterion = criterion.label(),
            "criterion override cleared"
        );
        Ok(report)
    }

    /// Mark the document behind `criterion` as verified. The criterion stops
    /// waiting for documents and eligibility is recomputed in the same write.
    pub fn confirm_document(
        &self,
        ctx: &AdminContext,
        application_id: &ApplicationId,
        criterion: CriterionKind,
    ) -> Result<ApplicationRecord, ScholarshipServiceError> {
        let mut record = self.get(application_id)?;
        record.attributes.awaiting_documents.remove(&criterion);
        self.record_document_review(
            ctx,
            &mut record,
            criterion,
            DocumentReview {
                status: DocumentStatus::Verified,
                reviewed_by: ctx.admin_id.clone(),
                reviewed_at: Utc::now(),
                note: None,
                deadline: None,
            },
        )?;
        Ok(record)
    }

    /// Ask the applicant to re-upload the document behind `criterion`, or deny
    /// it. The criterion goes back to waiting for documents.
    pub fn request_document(
        &self,
        ctx: &AdminContext,
        application_id: &ApplicationId,
        criterion: CriterionKind,
        request: DocumentRequest,
    ) -> Result<ApplicationRecord, ScholarshipServiceError> {
        if request.status == DocumentStatus::Verified {
            return Err(ValidationError::DocumentRequestStatus.into());
        }
        let mut record = self.get(application_id)?;
        record.attributes.awaiting_documents.insert(criterion);
        let note = request
            .note
            .as_deref()
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .map(str::to_string);
        self.record_document_review(
            ctx,
            &mut record,
            criterion,
            DocumentReview {
                status: request.status,
                reviewed_by: ctx.admin_id.clone(),
                reviewed_at: Utc::now(),
                note: note.clone(),
                deadline: request.deadline,
            },
        )?;

        let mut details = BTreeMap::new();
        details.insert("name".to_string(), record.applicant.full_name());
        details.insert("document".to_string(), criterion.label().to_string());
        if let Some(note) = note {
            details.insert("note".to_string(), note);
        }
        if let Some(deadline) = request.deadline {
            details.insert("deadline".to_string(), deadline.to_string());
        }
        self.notify(Notification {
            template: format!("document_{}", request.status.label()),
            recipient: Some(record.applicant.email_address.clone())
                .filter(|email| !email.trim().is_empty()),
            details,
        });

        Ok(record)
    }

    fn record_document_review(
        &self,
        ctx: &AdminContext,
        record: &mut ApplicationRecord,
        criterion: CriterionKind,
        review: DocumentReview,
    ) -> Result<(), ScholarshipServiceError> {
        let status = review.status;
        record.updated_at = review.reviewed_at;
        record.documents.insert(criterion, review);
        record.eligibility = self
            .current_evaluator()
            .evaluate(&record.attributes)
            .with_overrides_from(&record.eligibility);

        self.store.update(record.clone())?;
        info!(
            application_id = %record.application_id,
            actor = %ctx.admin_id,
            criterion = criterion.label(),
            document = status.label(),
            eligibility = record.eligibility.overall().label(),
            "document reviewed"
        );
        Ok(())
    }

    /// Applications filed by `user_id`, newest first, and the releases they
    /// received. Unknown users get an empty history.
    pub fn applicant_history(
        &self,
        user_id: &UserId,
    ) -> Result<ApplicantHistory, ScholarshipServiceError> {
        let records = self.store.query(&ApplicationQuery::for_user(user_id.clone()))?;

        let mut semesters: Vec<&SemesterId> = records
            .iter()
            .filter(|record| record.status == ApplicationStatus::Approved)
            .map(|record| &record.semester_id)
            .collect();
        semesters.sort();
        semesters.dedup();

        let mut releases = Vec::new();
        for semester_id in semesters {
            releases.extend(
                self.store
                    .query_releases(&ReleaseQuery::for_semester(semester_id.clone()))?,
            );
        }

        let history = ApplicantHistory::build(user_id.clone(), &records, &releases);
        debug!(
            user_id = %user_id,
            applications = history.applications.len(),
            releases = history.releases.len(),
            "applicant history assembled"
        );
        Ok(history)
    }

    /// Delete every application of a closed semester. `confirmation` must be
    /// exactly [`RESET_CONFIRMATION`].
    pub fn reset_semester(
        &self,
        ctx: &AdminContext,
        semester_id: &SemesterId,
        confirmation: &str,
    ) -> Result<SemesterReset, ScholarshipServiceError> {
        require_super_admin(ctx, "resetting a semester")?;
        if confirmation != RESET_CONFIRMATION {
            return Err(ValidationError::ConfirmationMismatch {
                expected: RESET_CONFIRMATION,
            }
            .into());
        }
        if self.current_settings().accepts_applications_for(semester_id) {
            return Err(ScholarshipServiceError::SemesterAcceptingApplications(
                semester_id.clone(),
            ));
        }

        let records = self
            .store
            .query(&ApplicationQuery::for_semester(semester_id.clone()))?;
        for record in &records {
            self.store.delete(&record.application_id)?;
        }
        warn!(
            semester_id = %semester_id,
            actor = %ctx.admin_id,
            deleted = records.len(),
            "semester applications reset"
        );
        Ok(SemesterReset {
            semester_id: semester_id.clone(),
            deleted_count: records.len(),
        })
    }

    pub fn criteria(&self) -> CriteriaConfig {
        self.current_evaluator().config().clone()
    }

    /// Swap the criteria used for future evaluations. Stored reports are not touched.
    pub fn update_criteria(
        &self,
        ctx: &AdminContext,
        config: CriteriaConfig,
    ) -> Result<CriteriaConfig, ScholarshipServiceError> {
        let evaluator = EligibilityEvaluator::new(config)?;
        let updated = evaluator.config().clone();
        *self
            .evaluator
            .write()
            .unwrap_or_else(PoisonError::into_inner) = evaluator;
        info!(actor = %ctx.admin_id, "eligibility criteria updated");
        Ok(updated)
    }

    /// Filtered, newest-first page of application summaries.
    pub fn list_applications(
        &self,
        semester_id: Option<&SemesterId>,
        filter: &ApplicationFilter,
        page: usize,
    ) -> Result<Page<ApplicationSummary>, ScholarshipServiceError> {
        let query = ApplicationQuery {
            semester_id: semester_id.cloned(),
            status: match filter.status {
                StatusFilter::All => None,
                StatusFilter::Only(status) => Some(status),
            },
            user_id: None,
        };
        let records = self.store.query(&query)?;
        let selected = filter_and_sort(&records, filter);
        let page = paginate(selected, page, self.page_size).map(ApplicationRecord::summary);
        Ok(page)
    }

    pub fn create_release(
        &self,
        ctx: &AdminContext,
        semester_id: &SemesterId,
        draft: ReleaseDraft,
    ) -> Result<Release, ScholarshipServiceError> {
        draft.validate()?;
        let release = self.store.insert_release(semester_id, draft)?;
        info!(
            release_id = %release.release_id,
            semester_id = %semester_id,
            actor = %ctx.admin_id,
            "release scheduled"
        );
        Ok(release)
    }

    /// Replace every editable field of a release. Its archive state is kept.
    pub fn edit_release(
        &self,
        ctx: &AdminContext,
        release_id: ReleaseId,
        draft: ReleaseDraft,
    ) -> Result<Release, ScholarshipServiceError> {
        draft.validate()?;
        let mut release = self.find_release(release_id)?;
        release.apply_draft(draft);
        self.store.update_release(release.clone())?;
        info!(release_id = %release_id, actor = %ctx.admin_id, "release edited");
        Ok(release)
    }

    pub fn delete_release(
        &self,
        ctx: &AdminContext,
        release_id: ReleaseId,
    ) -> Result<(), ScholarshipServiceError> {
        self.find_release(release_id)?;
        self.store.delete_release(release_id)?;
        info!(release_id = %release_id, actor = %ctx.admin_id, "release deleted");
        Ok(())
    }

    /// Move a release between the active and archived tabs. Setting the
    /// current state again is a no-op.
    pub fn set_archived(
        &self,
        ctx: &AdminContext,
        release_id: ReleaseId,
        archived: bool,
    ) -> Result<Release, ScholarshipServiceError> {
        let mut release = self.find_release(release_id)?;
        let target = if archived {
            ReleaseState::Archived
        } else {
            ReleaseState::Active
        };
        if release.state == target {
            return Ok(release);
        }

        release.state = target;
        self.store.update_release(release.clone())?;
        info!(
            release_id = %release_id,
            actor = %ctx.admin_id,
            archived,
            "release archive state changed"
        );
        Ok(release)
    }

    pub fn releases(
        &self,
        semester_id: &SemesterId,
        view: ReleaseView,
    ) -> Result<Vec<Release>, ScholarshipServiceError> {
        let releases = self
            .store
            .query_releases(&ReleaseQuery::for_semester(semester_id.clone()))?;
        Ok(releases_for_view(&releases, view))
    }

    /// Budget card for a semester. The ceiling comes from the caller.
    pub fn budget_summary(
        &self,
        semester_id: &SemesterId,
        budget: Option<Decimal>,
    ) -> Result<BudgetSummary, ScholarshipServiceError> {
        let budget = budget.map(SemesterBudget::new).transpose()?;
        let releases = self
            .store
            .query_releases(&ReleaseQuery::for_semester(semester_id.clone()))?;
        Ok(BudgetSummary::compute(semester_id.clone(), budget, &releases))
    }

    pub fn settings(&self, ctx: &AdminContext) -> Result<SystemSettings, ScholarshipServiceError> {
        require_super_admin(ctx, "reading system settings")?;
        Ok(self.current_settings())
    }

    pub fn update_settings(
        &self,
        ctx: &AdminContext,
        settings: SystemSettings,
    ) -> Result<SystemSettings, ScholarshipServiceError> {
        require_super_admin(ctx, "updating system settings")?;
        settings.validate()?;
        let changes = {
            let mut current = self
                .settings
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let changes = settings_changes(&current, &settings, ctx, Utc::now());
            *current = settings.clone();
            changes
        };
        info!(
            actor = %ctx.admin_id,
            changed = changes.len(),
            open_applications = settings.features.open_applications,
            maintenance = settings.maintenance.enabled,
            "system settings updated"
        );
        self.settings_audit
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(changes);
        Ok(settings)
    }

    /// Recorded settings changes, newest first.
    pub fn settings_audit(
        &self,
        ctx: &AdminContext,
        limit: Option<usize>,
    ) -> Result<Vec<SettingsAuditEntry>, ScholarshipServiceError> {
        require_super_admin(ctx, "reading the settings audit log")?;
        let log = self
            .settings_audit
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(log
            .iter()
            .rev()
            .take(limit.unwrap_or(DEFAULT_AUDIT_LIMIT))
            .cloned()
            .collect())
    }

    pub fn maintenance_status(&self) -> MaintenanceStatus {
        self.current_settings().maintenance_status()
    }

    pub fn export_applications(
        &self,
        ctx: &AdminContext,
        semester_id: Option<&SemesterId>,
    ) -> Result<String, ScholarshipServiceError> {
        require_super_admin(ctx, "exporting applications")?;
        let query = ApplicationQuery {
            semester_id: semester_id.cloned(),
            ..ApplicationQuery::default()
        };
        let records = self.store.query(&query)?;
        let csv = applications_csv(&records)?;
        info!(actor = %ctx.admin_id, rows = records.len(), "applications exported");
        Ok(csv)
    }

    fn find_release(&self, release_id: ReleaseId) -> Result<Release, ScholarshipServiceError> {
        let release = self
            .store
            .find_release(release_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(release)
    }

    fn notify(&self, notification: Notification) {
        let template = notification.template.clone();
        if let Err(err) = self.notifier.publish(notification) {
            warn!(template = %template, error = %err, "notification could not be delivered");
        }
    }

    fn current_evaluator(&self) -> EligibilityEvaluator {
        self.evaluator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn current_settings(&self) -> SystemSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Outcome of a semester reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SemesterReset {
    pub semester_id: SemesterId,
    pub deleted_count: usize,
}

fn require_super_admin(
    ctx: &AdminContext,
    action: &'static str,
) -> Result<(), ScholarshipServiceError> {
    if ctx.is_super_admin() {
        Ok(())
    } else {
        Err(ScholarshipServiceError::Forbidden { action })
    }
}

/// Error raised by the scholarship service.
#[derive(Debug, thiserror::Error)]
pub enum ScholarshipServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Criteria(#[from] CriteriaValidationError),
    #[error(transparent)]
    Transition(#[from] StatusTransitionError),
    #[error(transparent)]
    Override(#[from] OverrideError),
    #[error("applications are currently closed")]
    ApplicationsClosed,
    #[error("application deletion is disabled")]
    DeletionDisabled,
    #[error("semester {0} is still accepting applications")]
    SemesterAcceptingApplications(SemesterId),
    #[error("{action} requires the super administrator role")]
    Forbidden { action: &'static str },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("failed to render export: {0}")]
    Export(#[from] csv::Error),
}
