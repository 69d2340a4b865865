use iskolar::workflows::scholarship::{
    ApplicationId, ApplicationQuery, ApplicationRecord, ApplicationRepository, Notification,
    NotificationError, NotificationPublisher, Release, ReleaseDraft, ReleaseId, ReleaseQuery,
    ReleaseRepository, RepositoryError, SemesterId,
};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local store used by the demo and the default server wiring.
#[derive(Default, Clone)]
pub(crate) struct InMemoryStore {
    applications: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
    releases: Arc<Mutex<BTreeMap<ReleaseId, Release>>>,
}

impl ApplicationRepository for InMemoryStore {
    fn find(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.applications.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.applications.lock().expect("store mutex poisoned");
        if guard.contains_key(&record.application_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.application_id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut guard = self.applications.lock().expect("store mutex poisoned");
        if guard.contains_key(&record.application_id) {
            guard.insert(record.application_id.clone(), record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn delete(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        let mut guard = self.applications.lock().expect("store mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }

    fn query(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.applications.lock().expect("store mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }
}

impl ReleaseRepository for InMemoryStore {
    fn find_release(&self, id: ReleaseId) -> Result<Option<Release>, RepositoryError> {
        let guard = self.releases.lock().expect("store mutex poisoned");
        Ok(guard.get(&id).cloned())
    }

    fn insert_release(
        &self,
        semester_id: &SemesterId,
        draft: ReleaseDraft,
    ) -> Result<Release, RepositoryError> {
        let mut guard = self.releases.lock().expect("store mutex poisoned");
        let next = guard
            .keys()
            .next_back()
            .map_or(1, |ReleaseId(last)| last + 1);
        let release = Release::from_draft(ReleaseId(next), semester_id.clone(), draft);
        guard.insert(release.release_id, release.clone());
        Ok(release)
    }

    fn update_release(&self, release: Release) -> Result<(), RepositoryError> {
        let mut guard = self.releases.lock().expect("store mutex poisoned");
        match guard.get_mut(&release.release_id) {
            Some(slot) => {
                *slot = release;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn delete_release(&self, id: ReleaseId) -> Result<(), RepositoryError> {
        let mut guard = self.releases.lock().expect("store mutex poisoned");
        guard.remove(&id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }

    fn query_releases(&self, query: &ReleaseQuery) -> Result<Vec<Release>, RepositoryError> {
        let guard = self.releases.lock().expect("store mutex poisoned");
        Ok(guard
            .values()
            .filter(|release| query.matches(release))
            .cloned()
            .collect())
    }
}

/// Notification sink that logs each message and keeps it for inspection.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationPublisher for LoggingNotifier {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            template = %notification.template,
            recipient = notification.recipient.as_deref().unwrap_or("-"),
            "notification queued"
        );
        let mut guard = self.events.lock().expect("notifier mutex poisoned");
        guard.push(notification);
        Ok(())
    }
}

impl LoggingNotifier {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, ',' | '₱'))
        .collect();
    let amount = Decimal::from_str(&cleaned)
        .map_err(|err| format!("failed to parse '{raw}' as an amount ({err})"))?;
    if amount.is_sign_negative() {
        return Err(format!("amount '{raw}' must not be negative"));
    }
    Ok(amount)
}
