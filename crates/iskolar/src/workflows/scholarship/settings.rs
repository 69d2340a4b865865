use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{AdminContext, SemesterId, ValidationError};

/// Portal-wide switches maintained by super administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub general: GeneralSettings,
    pub features: FeatureFlags,
    pub maintenance: MaintenanceSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralSettings {
    pub site_name: String,
    pub default_timezone: String,
    pub date_format: String,
    /// Semester currently taking applications. `None` means any semester.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_semester: Option<SemesterId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub open_applications: bool,
    pub allow_application_deletion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceSettings {
    pub enabled: bool,
    pub message: String,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            general: GeneralSettings {
                site_name: "IskoLAR Scholarship System".to_string(),
                default_timezone: "Asia/Manila".to_string(),
                date_format: "MM/DD/YYYY".to_string(),
                active_semester: None,
            },
            features: FeatureFlags {
                open_applications: true,
                allow_application_deletion: false,
            },
            maintenance: MaintenanceSettings {
                enabled: false,
                message: "System is under maintenance. Please check back later.".to_string(),
            },
        }
    }
}

impl SystemSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.general.site_name.trim().is_empty() {
            return Err(ValidationError::MissingField("general.site_name"));
        }
        if self.general.default_timezone.trim().is_empty() {
            return Err(ValidationError::MissingField("general.default_timezone"));
        }
        if self.maintenance.enabled && self.maintenance.message.trim().is_empty() {
            return Err(ValidationError::MissingField("maintenance.message"));
        }
        Ok(())
    }

    /// Whether submissions for `semester_id` are accepted right now.
    pub fn accepts_applications_for(&self, semester_id: &SemesterId) -> bool {
        self.features.open_applications
            && self
                .general
                .active_semester
                .as_ref()
                .map_or(true, |active| active == semester_id)
    }

    pub fn maintenance_status(&self) -> MaintenanceStatus {
        MaintenanceStatus {
            maintenance_mode: self.maintenance.enabled,
            message: self
                .maintenance
                .enabled
                .then(|| self.maintenance.message.clone()),
        }
    }
}

/// Public banner payload; the message is only exposed while maintenance is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceStatus {
    pub maintenance_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One changed setting. Entries are appended on every update and never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsAuditEntry {
    /// Dotted path of the setting, e.g. `features.open_applications`.
    pub key: String,
    pub old_value: Value,
    pub new_value: Value,
    pub changed_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_by_email: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// One audit entry per setting whose value differs between `before` and `after`.
pub fn settings_changes(
    before: &SystemSettings,
    after: &SystemSettings,
    ctx: &AdminContext,
    changed_at: DateTime<Utc>,
) -> Vec<SettingsAuditEntry> {
    let old = flatten(before);
    let mut new = flatten(after);

    let mut keys: Vec<String> = old.keys().chain(new.keys()).cloned().collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|key| {
            let old_value = old.get(&key).cloned().unwrap_or(Value::Null);
            let new_value = new.remove(&key).unwrap_or(Value::Null);
            (old_value != new_value).then(|| SettingsAuditEntry {
                key,
                old_value,
                new_value,
                changed_by: ctx.admin_id.clone(),
                changed_by_email: ctx.email.clone(),
                changed_at,
            })
        })
        .collect()
}

fn flatten(settings: &SystemSettings) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    if let Ok(value) = serde_json::to_value(settings) {
        flatten_into(String::new(), value, &mut out);
    }
    out
}

fn flatten_into(prefix: String, value: Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(fields) => {
            for (name, field) in fields {
                let key = if prefix.is_empty() {
                    name
                } else {
                    format!("{prefix}.{name}")
                };
                flatten_into(key, field, out);
            }
        }
        leaf => {
            out.insert(prefix, leaf);
        }
    }
}
