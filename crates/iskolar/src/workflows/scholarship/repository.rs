use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::disbursement::{Release, ReleaseDraft, ReleaseId};
use super::domain::{ApplicationId, ApplicationRecord, ApplicationStatus, SemesterId, UserId};

/// Equality filters the data store can apply on its side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationQuery {
    pub semester_id: Option<SemesterId>,
    pub status: Option<ApplicationStatus>,
    pub user_id: Option<UserId>,
}

impl ApplicationQuery {
    pub fn for_semester(semester_id: SemesterId) -> Self {
        Self {
            semester_id: Some(semester_id),
            ..Self::default()
        }
    }

    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        self.semester_id
            .as_ref()
            .map_or(true, |semester| &record.semester_id == semester)
            && self.status.map_or(true, |status| record.status == status)
            && self
                .user_id
                .as_ref()
                .map_or(true, |user| &record.user_id == user)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseQuery {
    pub semester_id: Option<SemesterId>,
}

impl ReleaseQuery {
    pub fn for_semester(semester_id: SemesterId) -> Self {
        Self {
            semester_id: Some(semester_id),
        }
    }

    pub fn matches(&self, release: &Release) -> bool {
        self.semester_id
            .as_ref()
            .map_or(true, |semester| &release.semester_id == semester)
    }
}

/// Storage abstraction for application records.
pub trait ApplicationRepository: Send + Sync {
    fn find(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    /// Replaces the whole record in one write.
    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError>;
    fn delete(&self, id: &ApplicationId) -> Result<(), RepositoryError>;
    fn query(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRecord>, RepositoryError>;
}

/// Storage abstraction for releases. The store issues release identifiers.
pub trait ReleaseRepository: Send + Sync {
    fn find_release(&self, id: ReleaseId) -> Result<Option<Release>, RepositoryError>;
    fn insert_release(
        &self,
        semester_id: &SemesterId,
        draft: ReleaseDraft,
    ) -> Result<Release, RepositoryError>;
    /// Replaces the whole record in one write.
    fn update_release(&self, release: Release) -> Result<(), RepositoryError>;
    fn delete_release(&self, id: ReleaseId) -> Result<(), RepositoryError>;
    fn query_releases(&self, query: &ReleaseQuery) -> Result<Vec<Release>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("data store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook (e-mail adapters and the like).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
