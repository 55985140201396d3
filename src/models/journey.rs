use chrono::{DateTime, Utc};

use super::{CheckpointId, JourneyId, Media, UserId};
use crate::geo::Point;

/// Derived from `ended_at`; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JourneyStatus {
    Ongoing,
    Completed,
}

impl JourneyStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ongoing => "Ongoing",
            Self::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Journey {
    pub id: JourneyId,
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub is_public: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub checkpoints: Vec<Checkpoint>,
}

impl Journey {
    pub fn status(&self) -> JourneyStatus {
        if self.ended_at.is_some() {
            JourneyStatus::Completed
        } else {
            JourneyStatus::Ongoing
        }
    }

    /// Private journeys are visible to their owner only.
    pub fn is_readable_by(&self, requester: UserId) -> bool {
        self.is_public || self.owner_id == requester
    }

    /// Orders checkpoints by timestamp, ties broken by id, whatever order the
    /// store returned them in.
    pub fn sort_checkpoints(&mut self) {
        self.checkpoints
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub journey_id: JourneyId,
    /// `None` when the stored location is null.
    pub location: Option<Point>,
    pub timestamp: DateTime<Utc>,
    pub note: String,
    pub media: Vec<Media>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewJourney {
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub is_public: bool,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckpoint {
    pub journey_id: JourneyId,
    pub location: Point,
    pub timestamp: DateTime<Utc>,
    pub note: String,
}
