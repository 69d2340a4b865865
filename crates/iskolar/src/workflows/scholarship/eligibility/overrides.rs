use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CriterionKind, CriterionStatus, EligibilityReport};

/// Administrator-entered status that takes precedence over the computed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOverride {
    pub status: CriterionStatus,
    pub set_by: String,
    pub set_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    Set,
    Replace,
    Clear,
}

/// One change to a criterion's override. Entries are only ever appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideAuditEntry {
    pub criterion: CriterionKind,
    pub action: OverrideAction,
    /// Computed status at the time of the change.
    pub computed: CriterionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<CriterionStatus>,
    /// New override status; absent when the override was cleared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overridden_to: Option<CriterionStatus>,
    pub set_by: String,
    pub set_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverrideError {
    #[error("criterion {0:?} has not been assessed for this application")]
    NotAssessed(CriterionKind),
}

impl EligibilityReport {
    /// Records an override beside the computed baseline. A replaced override
    /// stays visible in the audit trail.
    pub fn apply_override(
        &mut self,
        criterion: CriterionKind,
        entry: StatusOverride,
    ) -> Result<(), OverrideError> {
        let assessment = self
            .assessments
            .get_mut(&criterion)
            .ok_or(OverrideError::NotAssessed(criterion))?;

        let previous = assessment.manual.as_ref().map(|manual| manual.status);
        self.history.push(OverrideAuditEntry {
            criterion,
            action: if previous.is_some() {
                OverrideAction::Replace
            } else {
                OverrideAction::Set
            },
            computed: assessment.computed,
            previous,
            overridden_to: Some(entry.status),
            set_by: entry.set_by.clone(),
            set_at: entry.set_at,
            reason: entry.reason.clone(),
        });
        assessment.manual = Some(entry);
        Ok(())
    }

    /// Drops the override so the computed status applies again. Returns the
    /// removed override, or `None` when there was nothing to clear.
    pub fn clear_override(
        &mut self,
        criterion: CriterionKind,
        cleared_by: &str,
        cleared_at: DateTime<Utc>,
    ) -> Result<Option<StatusOverride>, OverrideError> {
        let assessment = self
            .assessments
            .get_mut(&criterion)
            .ok_or(OverrideError::NotAssessed(criterion))?;

        let removed = assessment.manual.take();
        if let Some(manual) = &removed {
            self.history.push(OverrideAuditEntry {
                criterion,
                action: OverrideAction::Clear,
                computed: assessment.computed,
                previous: Some(manual.status),
                overridden_to: None,
                set_by: cleared_by.to_string(),
                set_at: cleared_at,
                reason: None,
            });
        }
        Ok(removed)
    }

    /// Every override change in the order it happened.
    pub fn audit_trail(&self) -> &[OverrideAuditEntry] {
        &self.history
    }

    /// Carries overrides and their history from `previous` onto this freshly
    /// computed report.
    pub fn with_overrides_from(mut self, previous: &EligibilityReport) -> Self {
        for (criterion, earlier) in &previous.assessments {
            if let (Some(manual), Some(current)) =
                (&earlier.manual, self.assessments.get_mut(criterion))
            {
                current.manual = Some(manual.clone());
            }
        }
        self.history = previous.history.clone();
        self
    }
}
