//! Release scheduling and semester budget reconciliation.
//!
//! Everything here works on releases that were already fetched from the store;
//! no aggregation is pushed down to the data layer.

mod budget;
mod import;

pub use budget::{format_peso, remaining, total_active, BudgetSummary, SemesterBudget};
pub use import::{parse_releases, parse_releases_from_path, ReleaseImportError};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{SemesterId, ValidationError};

/// Largest per-student amount a release may carry.
pub const MAX_AMOUNT_PER_STUDENT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Store-issued release identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReleaseId(pub u64);

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    Active,
    Archived,
}

/// Which release tab an administrator is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseView {
    #[default]
    Active,
    Archived,
}

impl ReleaseView {
    fn matches(self, state: ReleaseState) -> bool {
        matches!(
            (self, state),
            (ReleaseView::Active, ReleaseState::Active)
                | (ReleaseView::Archived, ReleaseState::Archived)
        )
    }
}

/// A scheduled disbursement paying a fixed amount to each recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub release_id: ReleaseId,
    pub semester_id: SemesterId,
    pub release_type: String,
    pub release_date: NaiveDate,
    pub release_time: NaiveTime,
    pub barangay: String,
    pub location: String,
    pub amount_per_student: Decimal,
    #[serde(default)]
    pub recipients: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
    pub state: ReleaseState,
}

impl Release {
    pub fn from_draft(
        release_id: ReleaseId,
        semester_id: SemesterId,
        draft: ReleaseDraft,
    ) -> Self {
        let ReleaseDraft {
            release_type,
            release_date,
            release_time,
            barangay,
            location,
            amount_per_student,
            recipients,
            additional_notes,
        } = draft;

        Self {
            release_id,
            semester_id,
            release_type,
            release_date,
            release_time,
            barangay,
            location,
            amount_per_student,
            recipients,
            additional_notes,
            state: ReleaseState::Active,
        }
    }

    /// Amount times recipients. A missing recipient count contributes nothing.
    /// Saturates instead of overflowing for amounts that bypassed validation.
    pub fn payout(&self) -> Decimal {
        self.amount_per_student
            .saturating_mul(Decimal::from(self.recipients.unwrap_or(0)))
    }

    pub fn is_archived(&self) -> bool {
        self.state == ReleaseState::Archived
    }

    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.release_date.and_time(self.release_time)
    }

    /// Whether the release date and time have already passed.
    pub fn is_done(&self, now: NaiveDateTime) -> bool {
        now > self.scheduled_at()
    }

    /// Replaces every editable field at once; identity and state are kept.
    pub fn apply_draft(&mut self, draft: ReleaseDraft) {
        let state = self.state;
        *self = Release {
            state,
            ..Release::from_draft(self.release_id, self.semester_id.clone(), draft)
        };
    }
}

/// Editable release fields, used for both scheduling and editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDraft {
    pub release_type: String,
    pub release_date: NaiveDate,
    pub release_time: NaiveTime,
    pub barangay: String,
    #[serde(default)]
    pub location: String,
    pub amount_per_student: Decimal,
    #[serde(default)]
    pub recipients: Option<u32>,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

impl ReleaseDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.release_type.trim().is_empty() {
            return Err(ValidationError::MissingField("release_type"));
        }
        if self.barangay.trim().is_empty() {
            return Err(ValidationError::MissingField("barangay"));
        }
        if self.amount_per_student.is_sign_negative() {
            return Err(ValidationError::NegativeAmount {
                field: "amount_per_student",
            });
        }
        if self.amount_per_student > MAX_AMOUNT_PER_STUDENT {
            return Err(ValidationError::AmountTooLarge {
                field: "amount_per_student",
                limit: MAX_AMOUNT_PER_STUDENT,
            });
        }
        Ok(())
    }
}

/// Releases for one tab, most recent schedule first.
pub fn releases_for_view(releases: &[Release], view: ReleaseView) -> Vec<Release> {
    let mut selected: Vec<Release> = releases
        .iter()
        .filter(|release| view.matches(release.state))
        .cloned()
        .collect();
    selected.sort_by(|a, b| b.scheduled_at().cmp(&a.scheduled_at()));
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ReleaseDraft {
        ReleaseDraft {
            release_type: "allowance".to_string(),
            release_date: NaiveDate::from_ymd_opt(2025, 9, 15).expect("valid date"),
            release_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            barangay: "Bagumbayan".to_string(),
            location: "Barangay Hall".to_string(),
            amount_per_student: Decimal::from(1_000),
            recipients: Some(5),
            additional_notes: None,
        }
    }

    #[test]
    fn apply_draft_keeps_identity_and_state() {
        let mut release = Release::from_draft(
            ReleaseId(7),
            SemesterId("sem-1".to_string()),
            draft(),
        );
        release.state = ReleaseState::Archived;

        let mut edited = draft();
        edited.amount_per_student = Decimal::from(1_500);
        edited.recipients = None;
        edited.location = "Covered Court".to_string();
        release.apply_draft(edited);

        assert_eq!(release.release_id, ReleaseId(7));
        assert_eq!(release.semester_id, SemesterId("sem-1".to_string()));
        assert_eq!(release.state, ReleaseState::Archived);
        assert_eq!(release.location, "Covered Court");
        assert_eq!(release.payout(), Decimal::ZERO);
    }

    #[test]
    fn draft_validation_rejects_negative_amounts_and_blank_fields() {
        let mut negative = draft();
        negative.amount_per_student = Decimal::from(-10);
        assert_eq!(
            negative.validate(),
            Err(ValidationError::NegativeAmount {
                field: "amount_per_student"
            })
        );

        let mut blank = draft();
        blank.barangay = "  ".to_string();
        assert_eq!(
            blank.validate(),
            Err(ValidationError::MissingField("barangay"))
        );
    }

    #[test]
    fn draft_validation_caps_amount_per_student() {
        let mut huge = draft();
        huge.amount_per_student = Decimal::MAX;
        assert_eq!(
            huge.validate(),
            Err(ValidationError::AmountTooLarge {
                field: "amount_per_student",
                limit: MAX_AMOUNT_PER_STUDENT,
            })
        );

        let mut at_limit = draft();
        at_limit.amount_per_student = MAX_AMOUNT_PER_STUDENT;
        assert_eq!(at_limit.validate(), Ok(()));
    }

    #[test]
    fn payout_saturates_instead_of_panicking() {
        let mut release = Release::from_draft(ReleaseId(1), SemesterId("s".to_string()), draft());
        release.amount_per_student = Decimal::MAX;
        release.recipients = Some(2);

        assert_eq!(release.payout(), Decimal::MAX);
    }

    #[test]
    fn is_done_compares_against_schedule() {
        let release = Release::from_draft(ReleaseId(1), SemesterId("s".to_string()), draft());
        let before = NaiveDate::from_ymd_opt(2025, 9, 15)
            .and_then(|date| date.and_hms_opt(8, 59, 0))
            .expect("valid timestamp");
        let after = NaiveDate::from_ymd_opt(2025, 9, 15)
            .and_then(|date| date.and_hms_opt(9, 1, 0))
            .expect("valid timestamp");

        assert!(!release.is_done(before));
        assert!(release.is_done(after));
    }

    #[test]
    fn views_split_by_state_and_sort_latest_first() {
        let semester = SemesterId("s".to_string());
        let mut early = Release::from_draft(ReleaseId(1), semester.clone(), draft());
        early.release_date = NaiveDate::from_ymd_opt(2025, 8, 1).expect("valid date");
        let late = Release::from_draft(ReleaseId(2), semester.clone(), draft());
        let mut archived = Release::from_draft(ReleaseId(3), semester, draft());
        archived.state = ReleaseState::Archived;

        let releases = vec![early, late, archived];

        let active: Vec<ReleaseId> = releases_for_view(&releases, ReleaseView::Active)
            .into_iter()
            .map(|release| release.release_id)
            .collect();
        assert_eq!(active, vec![ReleaseId(2), ReleaseId(1)]);

        let archived = releases_for_view(&releases, ReleaseView::Archived);
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].release_id, ReleaseId(3));
    }
}
