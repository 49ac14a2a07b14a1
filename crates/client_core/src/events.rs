use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{session::Session, tracker::BusySnapshot, view::ProposalView};

pub(crate) const AWAITING_CONFIRMATION: &str = "Please wait for transaction confirmation...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// User-facing notice, rendered by the presentation layer as a toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, title, description)
    }

    fn new(level: NotificationLevel, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            title: title.into(),
            description: description.into(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SessionChanged(Session),
    BusyStateChanged(BusySnapshot),
    SnapshotUpdated(Arc<Vec<ProposalView>>),
    Notification(Notification),
}
