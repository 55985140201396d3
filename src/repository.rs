//! Persistence ports.
//!
//! Services depend on these traits only; `db::postgres` implements them over
//! sqlx and `db::memory` backs the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::geo::DecodeError;
use crate::models::{
    Checkpoint, CheckpointId, Journey, JourneyId, Media, NewCheckpoint, NewJourney, NewMedia,
    User, UserId,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored location is unreadable: {0}")]
    Decode(#[from] DecodeError),
    /// The id cannot exist in the store (above `i64::MAX`).
    #[error("id {0} is out of range")]
    IdOutOfRange(u64),
    #[error("stored id {0} is negative")]
    CorruptId(i64),
    #[error("unique constraint violated")]
    UniqueViolation,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Journey aggregate persistence. Every journey returned is fully hydrated:
/// checkpoints with their media.
#[async_trait]
pub trait JourneyRepository: Send + Sync {
    async fn insert_journey(&self, journey: NewJourney) -> RepositoryResult<Journey>;

    async fn find_journey(&self, id: JourneyId) -> RepositoryResult<Option<Journey>>;

    /// Owner of a journey without loading its checkpoints.
    async fn journey_owner(&self, id: JourneyId) -> RepositoryResult<Option<UserId>>;

    /// Newest-created first.
    async fn list_by_owner(&self, owner: UserId) -> RepositoryResult<Vec<Journey>>;

    /// Public journeys only, newest-created first.
    async fn list_public(&self, limit: u32, offset: u64) -> RepositoryResult<Vec<Journey>>;

    /// Returns `false` when nothing matched `id` for `owner`.
    async fn delete_journey(&self, owner: UserId, id: JourneyId) -> RepositoryResult<bool>;

    /// Sets `ended_at` only if it is still unset; returns `false` otherwise.
    async fn complete_journey(
        &self,
        owner: UserId,
        id: JourneyId,
        ended_at: DateTime<Utc>,
    ) -> RepositoryResult<bool>;

    async fn insert_checkpoint(&self, checkpoint: NewCheckpoint) -> RepositoryResult<Checkpoint>;

    /// Parent journey of a checkpoint, if the checkpoint exists and `owner`
    /// owns that journey.
    async fn owned_checkpoint_journey(
        &self,
        owner: UserId,
        id: CheckpointId,
    ) -> RepositoryResult<Option<JourneyId>>;

    /// Deletes the checkpoint and its media in one statement, matching only if
    /// `owner` owns the parent journey.
    async fn delete_checkpoint(&self, owner: UserId, id: CheckpointId) -> RepositoryResult<bool>;

    async fn insert_media(&self, media: NewMedia) -> RepositoryResult<Media>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: UserId) -> RepositoryResult<Option<User>>;

    async fn list_users(&self) -> RepositoryResult<Vec<User>>;

    async fn update_display_name(&self, id: UserId, name: &str) -> RepositoryResult<bool>;

    async fn set_profile_pic(&self, id: UserId, storage_key: &str) -> RepositoryResult<bool>;

    /// Fails with [`RepositoryError::UniqueViolation`] if already following.
    async fn insert_follow(&self, follower: UserId, following: UserId) -> RepositoryResult<()>;

    async fn delete_follow(&self, follower: UserId, following: UserId) -> RepositoryResult<bool>;

    async fn followers(&self, id: UserId) -> RepositoryResult<Vec<User>>;

    async fn following(&self, id: UserId) -> RepositoryResult<Vec<User>>;
}
