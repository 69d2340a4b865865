use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::disbursement::Release;
use super::domain::{ApplicationId, ApplicationRecord, ApplicationStatus, SemesterId, UserId};
use super::eligibility::CriterionStatus;

/// Everything an applicant has filed and received across semesters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantHistory {
    pub user_id: UserId,
    pub applications: Vec<ApplicationHistoryEntry>,
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationHistoryEntry {
    pub application_id: ApplicationId,
    pub semester_id: SemesterId,
    pub status: ApplicationStatus,
    pub eligibility: CriterionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl ApplicantHistory {
    /// Builds the history from the user's applications and the candidate
    /// releases of their semesters.
    ///
    /// A release counts as received when the user holds an approved
    /// application for the release's semester and the release is held in the
    /// applicant's barangay (compared case-insensitively). Applications come
    /// back newest first, releases latest scheduled first.
    pub fn build(user_id: UserId, records: &[ApplicationRecord], releases: &[Release]) -> Self {
        let mut owned: Vec<&ApplicationRecord> = records
            .iter()
            .filter(|record| record.user_id == user_id)
            .collect();
        owned.sort_by_key(|record| Reverse(record.created_at));

        let mut received: Vec<Release> = releases
            .iter()
            .filter(|release| {
                owned.iter().any(|record| {
                    record.status == ApplicationStatus::Approved
                        && record.semester_id == release.semester_id
                        && same_barangay(&record.applicant.barangay, &release.barangay)
                })
            })
            .cloned()
            .collect();
        received.sort_by_key(|release| Reverse(release.scheduled_at()));

        Self {
            user_id,
            applications: owned
                .into_iter()
                .map(|record| ApplicationHistoryEntry {
                    application_id: record.application_id.clone(),
                    semester_id: record.semester_id.clone(),
                    status: record.status,
                    eligibility: record.eligibility.overall(),
                    created_at: record.created_at,
                    updated_at: record.updated_at,
                    reviewed_at: record.reviewed_at,
                })
                .collect(),
            releases: received,
        }
    }
}

fn same_barangay(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}
