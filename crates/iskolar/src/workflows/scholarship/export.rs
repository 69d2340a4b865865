use serde::Serialize;

use super::domain::ApplicationRecord;

#[derive(Debug, Serialize)]
struct ApplicationExportRow<'a> {
    application_id: &'a str,
    user_id: &'a str,
    email_address: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    semester: &'a str,
    status: &'static str,
    rejection_reason: &'a str,
    created_at: String,
    submitted_at: String,
    reviewed_at: String,
}

impl<'a> From<&'a ApplicationRecord> for ApplicationExportRow<'a> {
    fn from(record: &'a ApplicationRecord) -> Self {
        Self {
            application_id: &record.application_id.0,
            user_id: &record.user_id.0,
            email_address: &record.applicant.email_address,
            first_name: &record.applicant.first_name,
            last_name: &record.applicant.last_name,
            semester: &record.semester_id.0,
            status: record.status.label(),
            rejection_reason: record.rejection_reason.as_deref().unwrap_or(""),
            created_at: record.created_at.to_rfc3339(),
            submitted_at: record.submitted_at.to_rfc3339(),
            reviewed_at: record
                .reviewed_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
        }
    }
}

/// Renders applications as CSV, newest first, with a header row even when empty.
pub fn applications_csv(records: &[ApplicationRecord]) -> Result<String, csv::Error> {
    let mut ordered: Vec<&ApplicationRecord> = records.iter().collect();
    ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record([
        "application_id",
        "user_id",
        "email_address",
        "first_name",
        "last_name",
        "semester",
        "status",
        "rejection_reason",
        "created_at",
        "submitted_at",
        "reviewed_at",
    ])?;
    for record in ordered {
        writer.serialize(ApplicationExportRow::from(record))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
