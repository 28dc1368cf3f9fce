use chrono::{DateTime, Utc};
use cityview_model::Entity;
use cityview_ngsi::NgsiError;

/// The payload of a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchData {
    One(Entity),
    Many(Vec<Entity>),
}

impl FetchData {
    pub fn entities(&self) -> &[Entity] {
        match self {
            Self::One(entity) => std::slice::from_ref(entity),
            Self::Many(entities) => entities,
        }
    }

    pub fn into_entities(self) -> Vec<Entity> {
        match self {
            Self::One(entity) => vec![entity],
            Self::Many(entities) => entities,
        }
    }

    pub fn len(&self) -> usize {
        self.entities().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities().is_empty()
    }
}

/// Snapshot published after every change to a subscription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    /// Last good result. Survives failed refreshes.
    pub data: Option<FetchData>,
    pub is_loading: bool,
    /// Failure of the most recent completed fetch, cleared on success.
    pub error: Option<NgsiError>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl FetchState {
    pub fn entities(&self) -> &[Entity] {
        self.data.as_ref().map_or(&[], FetchData::entities)
    }

    /// Data is on screen but the latest refresh failed.
    pub fn is_stale(&self) -> bool {
        self.data.is_some() && self.error.is_some()
    }
}
