use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use super::super::domain::SemesterId;
use super::{Release, ReleaseDraft, ReleaseId, ReleaseState};

#[derive(Debug)]
pub enum ReleaseImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: usize, message: String },
}

impl std::fmt::Display for ReleaseImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleaseImportError::Io(err) => write!(f, "failed to read release export: {err}"),
            ReleaseImportError::Csv(err) => write!(f, "invalid release CSV data: {err}"),
            ReleaseImportError::InvalidRow { line, message } => {
                write!(f, "release CSV line {line}: {message}")
            }
        }
    }
}

impl std::error::Error for ReleaseImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReleaseImportError::Io(err) => Some(err),
            ReleaseImportError::Csv(err) => Some(err),
            ReleaseImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for ReleaseImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ReleaseImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub fn parse_releases_from_path<P: AsRef<Path>>(
    path: P,
    semester_id: &SemesterId,
) -> Result<Vec<Release>, ReleaseImportError> {
    let file = File::open(path)?;
    parse_releases(file, semester_id)
}

/// Reads a release schedule export. Rows are numbered from 1 in file order.
pub fn parse_releases<R: Read>(
    reader: R,
    semester_id: &SemesterId,
) -> Result<Vec<Release>, ReleaseImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut releases = Vec::new();

    for (index, row) in csv_reader.deserialize::<ReleaseRow>().enumerate() {
        let row = row?;
        let line = index + 2;
        let state = row.state(line)?;
        let draft = row.into_draft(line)?;
        let mut release = Release::from_draft(ReleaseId(index as u64 + 1), semester_id.clone(), draft);
        release.state = state;
        releases.push(release);
    }

    Ok(releases)
}

#[derive(Debug, Deserialize)]
struct ReleaseRow {
    release_type: String,
    release_date: String,
    release_time: String,
    barangay: String,
    #[serde(default)]
    location: String,
    amount_per_student: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    recipients: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    archived: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    additional_notes: Option<String>,
}

impl ReleaseRow {
    fn state(&self, line: usize) -> Result<ReleaseState, ReleaseImportError> {
        match self.archived.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("false") | Some("no") | Some("0") => Ok(ReleaseState::Active),
            Some("true") | Some("yes") | Some("1") => Ok(ReleaseState::Archived),
            Some(other) => Err(invalid(line, format!("archived flag '{other}' is not a boolean"))),
        }
    }

    fn into_draft(self, line: usize) -> Result<ReleaseDraft, ReleaseImportError> {
        let release_date = NaiveDate::parse_from_str(&self.release_date, "%Y-%m-%d")
            .map_err(|err| invalid(line, format!("release_date '{}': {err}", self.release_date)))?;
        let release_time = parse_time(&self.release_time)
            .ok_or_else(|| invalid(line, format!("release_time '{}' is not HH:MM", self.release_time)))?;
        let amount_per_student = Decimal::from_str(&self.amount_per_student).map_err(|err| {
            invalid(
                line,
                format!("amount_per_student '{}': {err}", self.amount_per_student),
            )
        })?;
        let recipients = self
            .recipients
            .as_deref()
            .map(|raw| {
                raw.parse::<u32>()
                    .map_err(|err| invalid(line, format!("recipients '{raw}': {err}")))
            })
            .transpose()?;

        let draft = ReleaseDraft {
            release_type: self.release_type,
            release_date,
            release_time,
            barangay: self.barangay,
            location: self.location,
            amount_per_student,
            recipients,
            additional_notes: self.additional_notes,
        };
        draft
            .validate()
            .map_err(|err| invalid(line, err.to_string()))?;
        Ok(draft)
    }
}

fn invalid(line: usize, message: String) -> ReleaseImportError {
    ReleaseImportError::InvalidRow { line, message }
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
