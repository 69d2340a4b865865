use super::super::domain::ApplicantAttributes;
use super::config::CriteriaConfig;
use super::{CriterionAssessment, CriterionKind, CriterionStatus};

pub(crate) fn assess_all(
    attributes: &ApplicantAttributes,
    config: &CriteriaConfig,
) -> Vec<CriterionAssessment> {
    CriterionKind::ALL
        .iter()
        .map(|kind| {
            let (status, notes) = assess(*kind, attributes, config);
            let status = if status == CriterionStatus::Passed
                && attributes.awaiting_documents.contains(kind)
            {
                CriterionStatus::Attention
            } else {
                status
            };
            let notes = if attributes.awaiting_documents.contains(kind) {
                format!("{notes}; supporting document awaiting confirmation")
            } else {
                notes
            };
            CriterionAssessment::baseline(*kind, status, notes)
        })
        .collect()
}

/// Grades are compared in whole hundredths so band edges do not depend on
/// float rounding: with a 2.50 minimum and a 0.10 band, 2.60 passes.
fn hundredths(value: f32) -> i32 {
    (value * 100.0).round() as i32
}

fn assess(
    kind: CriterionKind,
    attributes: &ApplicantAttributes,
    config: &CriteriaConfig,
) -> (CriterionStatus, String) {
    match kind {
        CriterionKind::Residency => {
            let years = attributes.years_of_residency;
            let minimum = config.residency.minimum_years;
            if years < minimum {
                (
                    CriterionStatus::Failed,
                    format!("{years} year(s) of residency, {minimum} required"),
                )
            } else {
                (
                    CriterionStatus::Passed,
                    format!("{years} year(s) of residency meets {minimum}"),
                )
            }
        }
        CriterionKind::VoterRegistration => {
            if !config.voter.required {
                (
                    CriterionStatus::Passed,
                    "voter registration not required".to_string(),
                )
            } else if attributes.registered_voter {
                (CriterionStatus::Passed, "registered voter".to_string())
            } else {
                (CriterionStatus::Failed, "not a registered voter".to_string())
            }
        }
        CriterionKind::FamilyIncome => {
            let income = attributes.monthly_family_income;
            let threshold = config.income.monthly_threshold;
            if income > threshold {
                (
                    CriterionStatus::Failed,
                    format!("monthly family income {income} exceeds {threshold}"),
                )
            } else if income > threshold - config.income.borderline_band {
                (
                    CriterionStatus::Attention,
                    format!("monthly family income {income} is close to {threshold}"),
                )
            } else {
                (
                    CriterionStatus::Passed,
                    format!("monthly family income {income} below {threshold}"),
                )
            }
        }
        CriterionKind::Age => {
            let age = attributes.age;
            let (min, max) = (config.age.min, config.age.max);
            if (min..=max).contains(&age) {
                (CriterionStatus::Passed, format!("age {age} within {min}-{max}"))
            } else {
                (CriterionStatus::Failed, format!("age {age} outside {min}-{max}"))
            }
        }
        CriterionKind::Enrollment => {
            if attributes.enrolled {
                (CriterionStatus::Passed, "currently enrolled".to_string())
            } else {
                (CriterionStatus::Failed, "not currently enrolled".to_string())
            }
        }
        CriterionKind::Gpa => {
            let gpa = attributes.gpa;
            let minimum = config.gpa.minimum;
            let (grade, floor) = (hundredths(gpa), hundredths(minimum));
            if grade < floor {
                (
                    CriterionStatus::Failed,
                    format!("GPA {gpa:.2} below minimum {minimum:.2}"),
                )
            } else if grade < floor + hundredths(config.gpa.borderline_band) {
                (
                    CriterionStatus::Attention,
                    format!("GPA {gpa:.2} barely meets minimum {minimum:.2}"),
                )
            } else {
                (
                    CriterionStatus::Passed,
                    format!("GPA {gpa:.2} meets minimum {minimum:.2}"),
                )
            }
        }
        CriterionKind::CourseLoad => {
            let units = attributes.enrolled_units;
            let minimum = config.units.minimum;
            if units < minimum {
                (
                    CriterionStatus::Failed,
                    format!("{units} unit(s) enrolled, {minimum} required"),
                )
            } else {
                (
                    CriterionStatus::Passed,
                    format!("{units} unit(s) enrolled"),
                )
            }
        }
        CriterionKind::AcademicRecord => {
            match (attributes.has_failing_grades, config.grades.allow_failing) {
                (false, _) => (
                    CriterionStatus::Passed,
                    "no failing grades in previous semester".to_string(),
                ),
                (true, true) => (
                    CriterionStatus::Attention,
                    "failing grades present, allowed by policy".to_string(),
                ),
                (true, false) => (
                    CriterionStatus::Failed,
                    "failing grades in previous semester".to_string(),
                ),
            }
        }
    }
}
