//! Presentation projections.
//!
//! Every id is masked and every storage key is resolved to a public URL on the
//! way out. Coordinates are emitted `[lat, lng]`, the reverse of the internal
//! longitude-first order.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ids::IdMasker;
use crate::models::{Checkpoint, Journey, Media, User};
use crate::storage::MediaStorage;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaView {
    pub id: String,
    pub url: String,
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointView {
    pub id: String,
    pub title: String,
    pub time: String,
    pub timestamp: DateTime<Utc>,
    /// `[lat, lng]`; `null` when the stored location is unset.
    pub coords: Option<[f64; 2]>,
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub media: Vec<MediaView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JourneyView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_date: String,
    pub status: &'static str,
    pub visibility: &'static str,
    pub checkpoints: Vec<CheckpointView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub profile_pic_url: String,
    pub created_at: DateTime<Utc>,
}

/// What a projection needs besides the entity itself.
#[derive(Clone, Copy)]
pub struct ViewContext<'a> {
    pub ids: &'a IdMasker,
    pub storage: &'a dyn MediaStorage,
}

impl<'a> ViewContext<'a> {
    pub fn new(ids: &'a IdMasker, storage: &'a dyn MediaStorage) -> Self {
        Self { ids, storage }
    }

    pub fn media(&self, media: &Media) -> MediaView {
        MediaView {
            id: self.ids.mask(media.id.get()),
            url: self.storage.public_url(&media.storage_key),
            kind: media.kind.as_str(),
        }
    }

    pub fn checkpoint(&self, checkpoint: &Checkpoint) -> CheckpointView {
        let media: Vec<MediaView> = checkpoint.media.iter().map(|m| self.media(m)).collect();
        CheckpointView {
            id: self.ids.mask(checkpoint.id.get()),
            title: "Checkpoint".to_string(),
            time: checkpoint.timestamp.format("%I:%M %p").to_string(),
            timestamp: checkpoint.timestamp,
            coords: checkpoint.location.map(|p| p.lat_lng()),
            note: checkpoint.note.clone(),
            image: media.first().map(|m| m.url.clone()),
            media,
        }
    }

    pub fn journey(&self, journey: &Journey) -> JourneyView {
        JourneyView {
            id: self.ids.mask(journey.id.get()),
            title: journey.title.clone(),
            description: journey.description.clone(),
            start_date: journey.started_at.format("%b %d, %Y").to_string(),
            status: journey.status().as_str(),
            visibility: if journey.is_public { "Public" } else { "Private" },
            checkpoints: journey
                .checkpoints
                .iter()
                .map(|c| self.checkpoint(c))
                .collect(),
        }
    }

    pub fn journeys(&self, journeys: &[Journey]) -> Vec<JourneyView> {
        journeys.iter().map(|j| self.journey(j)).collect()
    }

    pub fn user(&self, user: &User) -> UserView {
        UserView {
            id: self.ids.mask(user.id.get()),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            profile_pic_url: user
                .profile_pic
                .as_deref()
                .map(|key| self.storage.public_url(key))
                .unwrap_or_default(),
            created_at: user.created_at,
        }
    }

    pub fn users(&self, users: &[User]) -> Vec<UserView> {
        users.iter().map(|u| self.user(u)).collect()
    }
}
