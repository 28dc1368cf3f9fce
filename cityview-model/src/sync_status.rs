use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a document stands relative to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Pending,
    Synced,
    Error,
}

/// Sync bookkeeping persisted by the document store after each broker write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    #[serde(rename = "syncStatus")]
    pub state: SyncState,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
}

impl SyncStatus {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn synced_at(at: DateTime<Utc>) -> Self {
        Self {
            state: SyncState::Synced,
            last_sync_time: Some(at),
            last_sync_error: None,
        }
    }

    pub fn failed_at(at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            state: SyncState::Error,
            last_sync_time: Some(at),
            last_sync_error: Some(error.into()),
        }
    }

    pub fn is_synced(&self) -> bool {
        self.state == SyncState::Synced
    }
}
