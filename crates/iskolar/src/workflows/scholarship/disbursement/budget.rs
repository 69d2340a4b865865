use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::super::domain::{SemesterId, ValidationError};
use super::Release;

/// Sum of payouts over releases that are not archived.
pub fn total_active(releases: &[Release]) -> Decimal {
    releases
        .iter()
        .filter(|release| !release.is_archived())
        .map(Release::payout)
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Budget left after active releases. Negative means over budget.
pub fn remaining(budget: Decimal, releases: &[Release]) -> Decimal {
    budget.saturating_sub(total_active(releases))
}

/// Administrator-entered ceiling for one semester. Supplied per request and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemesterBudget {
    ceiling: Decimal,
}

impl SemesterBudget {
    pub fn new(ceiling: Decimal) -> Result<Self, ValidationError> {
        if ceiling.is_sign_negative() {
            return Err(ValidationError::NegativeAmount { field: "budget" });
        }
        Ok(Self { ceiling })
    }

    pub fn ceiling(&self) -> Decimal {
        self.ceiling
    }
}

/// Budget card figures for a semester's release schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub semester_id: SemesterId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Decimal>,
    pub total_active: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<Decimal>,
    pub over_budget: bool,
    pub active_releases: usize,
    pub archived_releases: usize,
    pub active_recipients: u64,
}

impl BudgetSummary {
    pub fn compute(
        semester_id: SemesterId,
        budget: Option<SemesterBudget>,
        releases: &[Release],
    ) -> Self {
        let total = total_active(releases);
        let remaining = budget.map(|budget| remaining(budget.ceiling(), releases));
        let (active, archived): (Vec<&Release>, Vec<&Release>) =
            releases.iter().partition(|release| !release.is_archived());

        Self {
            semester_id,
            budget: budget.map(|budget| budget.ceiling()),
            total_active: total,
            remaining,
            over_budget: remaining.map_or(false, |left| left.is_sign_negative() && !left.is_zero()),
            active_releases: active.len(),
            archived_releases: archived.len(),
            active_recipients: active
                .iter()
                .map(|release| u64::from(release.recipients.unwrap_or(0)))
                .sum(),
        }
    }
}

/// Philippine peso rendering, e.g. `₱15,000.00` or `-₱1,000.00`.
pub fn format_peso(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let digits = format!("{:.2}", rounded.abs());
    let (whole, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}₱{grouped}.{cents}")
}
