use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Administrator-tunable thresholds for each eligibility rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaConfig {
    pub residency: ResidencyRule,
    pub voter: VoterRule,
    pub income: IncomeRule,
    pub age: AgeRule,
    pub gpa: GpaRule,
    pub units: UnitRule,
    pub grades: GradePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidencyRule {
    pub minimum_years: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRule {
    pub required: bool,
}

/// Monthly family income ceiling. Incomes within `borderline_band` below the
/// ceiling are flagged for attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeRule {
    pub monthly_threshold: Decimal,
    #[serde(default)]
    pub borderline_band: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRule {
    pub min: u8,
    pub max: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpaRule {
    pub minimum: f32,
    #[serde(default)]
    pub borderline_band: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRule {
    pub minimum: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradePolicy {
    pub allow_failing: bool,
}

impl Default for CriteriaConfig {
    fn default() -> Self {
        Self {
            residency: ResidencyRule { minimum_years: 3 },
            voter: VoterRule { required: true },
            income: IncomeRule {
                monthly_threshold: Decimal::from(25_000),
                borderline_band: Decimal::from(1_000),
            },
            age: AgeRule { min: 16, max: 25 },
            gpa: GpaRule {
                minimum: 2.5,
                borderline_band: 0.1,
            },
            units: UnitRule { minimum: 12 },
            grades: GradePolicy {
                allow_failing: false,
            },
        }
    }
}

impl CriteriaConfig {
    pub fn validate(&self) -> Result<(), CriteriaValidationError> {
        if self.residency.minimum_years == 0 {
            return Err(CriteriaValidationError::ResidencyYears);
        }
        if self.income.monthly_threshold.is_sign_negative() {
            return Err(CriteriaValidationError::NegativeIncomeThreshold(
                self.income.monthly_threshold,
            ));
        }
        if self.income.borderline_band.is_sign_negative() {
            return Err(CriteriaValidationError::NegativeIncomeBand(
                self.income.borderline_band,
            ));
        }
        if self.age.max < self.age.min {
            return Err(CriteriaValidationError::AgeRange {
                min: self.age.min,
                max: self.age.max,
            });
        }
        if !self.gpa.minimum.is_finite() || !(0.0..=4.0).contains(&self.gpa.minimum) {
            return Err(CriteriaValidationError::GpaMinimum(self.gpa.minimum));
        }
        if !self.gpa.borderline_band.is_finite() || self.gpa.borderline_band < 0.0 {
            return Err(CriteriaValidationError::GpaBand(self.gpa.borderline_band));
        }
        if self.units.minimum == 0 {
            return Err(CriteriaValidationError::UnitMinimum);
        }
        Ok(())
    }
}

/// Rejected criteria configurations. Values are never coerced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CriteriaValidationError {
    #[error("residency requirement must be at least one year")]
    ResidencyYears,
    #[error("income threshold must not be negative (found {0})")]
    NegativeIncomeThreshold(Decimal),
    #[error("income borderline band must not be negative (found {0})")]
    NegativeIncomeBand(Decimal),
    #[error("maximum age {max} is below minimum age {min}")]
    AgeRange { min: u8, max: u8 },
    #[error("GPA minimum must be between 0 and 4 (found {0})")]
    GpaMinimum(f32),
    #[error("GPA borderline band must be a non-negative number (found {0})")]
    GpaBand(f32),
    #[error("unit load requirement must be at least one unit")]
    UnitMinimum,
}
