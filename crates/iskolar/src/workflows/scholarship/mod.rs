//! Scholarship application review, eligibility, and release budgeting.
//!
//! Domain rules (eligibility, disbursement, listing) are plain functions over
//! fetched records. The service wires them to the storage and notification
//! traits in [`repository`], and the router exposes the service over HTTP.

pub mod disbursement;
pub mod domain;
pub mod eligibility;
pub mod export;
pub mod history;
pub mod listing;
pub mod repository;
pub mod router;
pub mod service;
pub mod settings;

#[cfg(test)]
mod tests;

pub use disbursement::{
    format_peso, parse_releases, parse_releases_from_path, releases_for_view, remaining,
    total_active, BudgetSummary, Release, ReleaseDraft, ReleaseId, ReleaseImportError,
    ReleaseState, ReleaseView, SemesterBudget, MAX_AMOUNT_PER_STUDENT,
};
pub use domain::{
    AdminContext, AdminRole, ApplicantAttributes, ApplicantIdentity, ApplicationId,
    ApplicationRecord, ApplicationStatus, ApplicationSubmission, ApplicationSummary,
    DocumentRequest, DocumentReview, DocumentStatus, ReviewDecision, SemesterId,
    StatusTransitionError, UserId, ValidationError,
};
pub use eligibility::{
    CriteriaConfig, CriterionAssessment, CriterionKind, CriterionStatus, EligibilityEvaluator,
    EligibilityReport, OverrideAction, OverrideAuditEntry, StatusOverride,
};
pub use history::{ApplicantHistory, ApplicationHistoryEntry};
pub use listing::{ApplicationFilter, Page, StatusFilter};
pub use repository::{
    ApplicationQuery, ApplicationRepository, Notification, NotificationError,
    NotificationPublisher, ReleaseQuery, ReleaseRepository, RepositoryError,
};
pub use router::{admin_context, scholarship_router};
pub use service::{ScholarshipService, ScholarshipServiceError, SemesterReset, RESET_CONFIRMATION};
pub use settings::{MaintenanceStatus, SettingsAuditEntry, SystemSettings};
