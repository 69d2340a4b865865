mod config;
mod overrides;
mod rules;

pub use config::{
    AgeRule, CriteriaConfig, CriteriaValidationError, GpaRule, GradePolicy, IncomeRule,
    ResidencyRule, UnitRule, VoterRule,
};
pub use overrides::{OverrideAction, OverrideAuditEntry, OverrideError, StatusOverride};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::ApplicantAttributes;

/// The rules an applicant is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    Residency,
    VoterRegistration,
    FamilyIncome,
    Age,
    Enrollment,
    Gpa,
    CourseLoad,
    AcademicRecord,
}

impl CriterionKind {
    pub const ALL: [CriterionKind; 8] = [
        CriterionKind::Residency,
        CriterionKind::VoterRegistration,
        CriterionKind::FamilyIncome,
        CriterionKind::Age,
        CriterionKind::Enrollment,
        CriterionKind::Gpa,
        CriterionKind::CourseLoad,
        CriterionKind::AcademicRecord,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            CriterionKind::Residency => "residency",
            CriterionKind::VoterRegistration => "voter_registration",
            CriterionKind::FamilyIncome => "family_income",
            CriterionKind::Age => "age",
            CriterionKind::Enrollment => "enrollment",
            CriterionKind::Gpa => "gpa",
            CriterionKind::CourseLoad => "course_load",
            CriterionKind::AcademicRecord => "academic_record",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == value)
    }
}

/// Outcome of a single criterion. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionStatus {
    Passed,
    Attention,
    Failed,
}

impl CriterionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CriterionStatus::Passed => "passed",
            CriterionStatus::Attention => "attention",
            CriterionStatus::Failed => "failed",
        }
    }
}

/// Computed status for one criterion plus any administrator override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionAssessment {
    pub criterion: CriterionKind,
    pub computed: CriterionStatus,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual: Option<StatusOverride>,
}

impl CriterionAssessment {
    pub(crate) fn baseline(criterion: CriterionKind, status: CriterionStatus, notes: String) -> Self {
        Self {
            criterion,
            computed: status,
            notes,
            manual: None,
        }
    }

    /// Override wins over the computed value whenever one is present.
    pub fn effective(&self) -> CriterionStatus {
        self.manual
            .as_ref()
            .map(|manual| manual.status)
            .unwrap_or(self.computed)
    }

    pub fn is_overridden(&self) -> bool {
        self.manual.is_some()
    }
}

/// Per-criterion results for one applicant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub assessments: BTreeMap<CriterionKind, CriterionAssessment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<OverrideAuditEntry>,
}

impl EligibilityReport {
    pub fn get(&self, criterion: CriterionKind) -> Option<&CriterionAssessment> {
        self.assessments.get(&criterion)
    }

    pub fn effective(&self, criterion: CriterionKind) -> Option<CriterionStatus> {
        self.get(criterion).map(CriterionAssessment::effective)
    }

    /// Worst effective status across all criteria; `Passed` when nothing was assessed.
    pub fn overall(&self) -> CriterionStatus {
        self.assessments
            .values()
            .map(CriterionAssessment::effective)
            .max()
            .unwrap_or(CriterionStatus::Passed)
    }
}

/// Stateless evaluator holding a validated criteria configuration.
#[derive(Debug, Clone)]
pub struct EligibilityEvaluator {
    config: CriteriaConfig,
}

impl EligibilityEvaluator {
    pub fn new(config: CriteriaConfig) -> Result<Self, CriteriaValidationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CriteriaConfig {
        &self.config
    }

    pub fn evaluate(&self, attributes: &ApplicantAttributes) -> EligibilityReport {
        let assessments = rules::assess_all(attributes, &self.config)
            .into_iter()
            .map(|assessment| (assessment.criterion, assessment))
            .collect();
        EligibilityReport {
            assessments,
            history: Vec::new(),
        }
    }
}
