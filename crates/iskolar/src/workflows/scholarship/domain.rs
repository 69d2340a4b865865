use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::eligibility::{CriterionKind, EligibilityReport};

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Semester (academic term) identifier as issued by the data store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SemesterId(pub String);

/// Applicant account identifier issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SemesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role claim carried by the caller's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    Admin,
    SuperAdmin,
}

impl AdminRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "super_admin" | "superadmin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }
}

/// Pre-authorized caller identity supplied by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminContext {
    pub admin_id: String,
    pub email: Option<String>,
    pub role: AdminRole,
}

impl AdminContext {
    pub fn is_super_admin(&self) -> bool {
        self.role == AdminRole::SuperAdmin
    }
}

/// Who the applicant is, as captured on the application form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantIdentity {
    pub first_name: String,
    pub last_name: String,
    pub barangay: String,
    pub school: String,
    pub email_address: String,
}

impl ApplicantIdentity {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Applicant facts the eligibility rules are evaluated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantAttributes {
    pub years_of_residency: u8,
    pub registered_voter: bool,
    pub monthly_family_income: Decimal,
    pub age: u8,
    pub gpa: f32,
    pub enrolled: bool,
    pub enrolled_units: u8,
    pub has_failing_grades: bool,
    /// Criteria whose supporting documents have not been confirmed yet.
    #[serde(default)]
    pub awaiting_documents: BTreeSet<CriterionKind>,
}

impl ApplicantAttributes {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.gpa.is_finite() || !(0.0..=4.0).contains(&self.gpa) {
            return Err(ValidationError::GpaOutOfRange(self.gpa));
        }
        if self.monthly_family_income.is_sign_negative() {
            return Err(ValidationError::NegativeAmount {
                field: "monthly_family_income",
            });
        }
        Ok(())
    }
}

/// Inbound application as submitted by the applicant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub semester_id: SemesterId,
    pub user_id: UserId,
    pub applicant: ApplicantIdentity,
    pub attributes: ApplicantAttributes,
}

impl ApplicationSubmission {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("semester_id", self.semester_id.0.as_str()),
            ("user_id", self.user_id.0.as_str()),
            ("first_name", self.applicant.first_name.as_str()),
            ("last_name", self.applicant.last_name.as_str()),
            ("barangay", self.applicant.barangay.as_str()),
            ("school", self.applicant.school.as_str()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ValidationError::MissingField(*field));
        }
        self.attributes.validate()
    }
}

/// Review status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Applies an administrator decision. Only pending applications move.
    pub fn apply(self, decision: &ReviewDecision) -> Result<Self, StatusTransitionError> {
        let target = decision.target_status();
        match self {
            ApplicationStatus::Pending => Ok(target),
            current => Err(StatusTransitionError {
                from: current,
                to: target,
            }),
        }
    }
}

/// Administrator review action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl ReviewDecision {
    pub fn target_status(&self) -> ApplicationStatus {
        match self {
            ReviewDecision::Approve => ApplicationStatus::Approved,
            ReviewDecision::Reject { .. } => ApplicationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("application cannot move from {} to {}", from.label(), to.label())]
pub struct StatusTransitionError {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
}

/// Review outcome for the document backing one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Verified,
    Reupload,
    Denied,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentStatus::Verified => "verified",
            DocumentStatus::Reupload => "reupload",
            DocumentStatus::Denied => "denied",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReview {
    pub status: DocumentStatus,
    pub reviewed_by: String,
    pub reviewed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
}

/// Administrator request for a replacement document, or a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequest {
    #[serde(default = "reupload")]
    pub status: DocumentStatus,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
}

fn reupload() -> DocumentStatus {
    DocumentStatus::Reupload
}

/// Stored application with its review state and latest eligibility report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub application_id: ApplicationId,
    pub semester_id: SemesterId,
    pub user_id: UserId,
    pub applicant: ApplicantIdentity,
    pub attributes: ApplicantAttributes,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Latest review of each criterion's supporting document.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub documents: BTreeMap<CriterionKind, DocumentReview>,
    pub eligibility: EligibilityReport,
}

impl ApplicationRecord {
    pub fn summary(&self) -> ApplicationSummary {
        ApplicationSummary {
            application_id: self.application_id.clone(),
            name: self.applicant.full_name(),
            barangay: self.applicant.barangay.clone(),
            school: self.applicant.school.clone(),
            status: self.status,
            submitted_at: self.submitted_at,
            eligibility: self.eligibility.overall(),
        }
    }
}

/// Row shown in the administrator's application table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub application_id: ApplicationId,
    pub name: String,
    pub barangay: String,
    pub school: String,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub eligibility: super::eligibility::CriterionStatus,
}

/// Input errors surfaced before any store call is attempted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{field} must not be negative")]
    NegativeAmount { field: &'static str },
    #[error("GPA must be between 0 and 4 (found {0})")]
    GpaOutOfRange(f32),
    #[error("{field} must not exceed {limit}")]
    AmountTooLarge {
        field: &'static str,
        limit: Decimal,
    },
    #[error("a document request must ask for a re-upload or deny the document")]
    DocumentRequestStatus,
    #[error("confirmation text must be exactly \"{expected}\"")]
    ConfirmationMismatch { expected: &'static str },
}
