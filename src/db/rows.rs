use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::geo::{self, RawGeometry};
use crate::models::{
    Checkpoint, CheckpointId, Journey, JourneyId, Media, MediaId, MediaKind, User, UserId,
};
use crate::repository::{RepositoryError, RepositoryResult};

/// Domain ids are unsigned; BIGSERIAL columns are `i64`.
pub(crate) fn to_db(id: u64) -> RepositoryResult<i64> {
    i64::try_from(id).map_err(|_| RepositoryError::IdOutOfRange(id))
}

pub(crate) fn from_db(id: i64) -> RepositoryResult<u64> {
    u64::try_from(id).map_err(|_| RepositoryError::CorruptId(id))
}

#[derive(Debug, FromRow)]
pub(crate) struct JourneyRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub is_public: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl JourneyRow {
    /// Checkpoints are attached by the caller.
    pub fn into_journey(self) -> RepositoryResult<Journey> {
        Ok(Journey {
            id: JourneyId(from_db(self.id)?),
            owner_id: UserId(from_db(self.user_id)?),
            title: self.title,
            description: self.description,
            is_public: self.is_public,
            started_at: self.started_at,
            ended_at: self.ended_at,
            created_at: self.created_at,
            checkpoints: Vec::new(),
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct CheckpointRow {
    pub id: i64,
    pub journey_id: i64,
    pub location: Option<String>, // ST_AsText output
    pub timestamp: DateTime<Utc>,
    pub note: String,
}

impl CheckpointRow {
    /// Media is attached by the caller.
    pub fn into_checkpoint(self) -> RepositoryResult<Checkpoint> {
        let location = geo::decode(RawGeometry::from(self.location.as_deref()))?;
        Ok(Checkpoint {
            id: CheckpointId(from_db(self.id)?),
            journey_id: JourneyId(from_db(self.journey_id)?),
            location,
            timestamp: self.timestamp,
            note: self.note,
            media: Vec::new(),
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct MediaRow {
    pub id: i64,
    pub checkpoint_id: i64,
    pub storage_key: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MediaRow> for Media {
    type Error = RepositoryError;

    fn try_from(row: MediaRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse::<MediaKind>()
            .map_err(|e| RepositoryError::Database(sqlx::Error::Decode(Box::new(e))))?;
        Ok(Self {
            id: MediaId(from_db(row.id)?),
            checkpoint_id: CheckpointId(from_db(row.checkpoint_id)?),
            storage_key: row.storage_key,
            kind,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId(from_db(row.id)?),
            email: row.email,
            display_name: row.display_name,
            profile_pic: row.profile_pic.filter(|key| !key.is_empty()),
            created_at: row.created_at,
        })
    }
}
