//! Scholarship back office: application review, eligibility rules, and
//! disbursement budgeting for the IskoLAR program.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
