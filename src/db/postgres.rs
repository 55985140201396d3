//! sqlx/PostGIS implementation of the persistence ports.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::queries;
use super::rows::{from_db, to_db, CheckpointRow, JourneyRow, MediaRow, UserRow};
use super::DbPool;
use crate::geo;
use crate::models::{
    Checkpoint, CheckpointId, Journey, JourneyId, Media, NewCheckpoint, NewJourney, NewMedia,
    User, UserId,
};
use crate::repository::{JourneyRepository, RepositoryError, RepositoryResult, UserRepository};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Attaches checkpoints (timestamp ascending) and their media to each
    /// journey using two batched queries.
    async fn hydrate(&self, rows: Vec<JourneyRow>) -> RepositoryResult<Vec<Journey>> {
        let mut journeys = rows
            .into_iter()
            .map(JourneyRow::into_journey)
            .collect::<RepositoryResult<Vec<_>>>()?;
        if journeys.is_empty() {
            return Ok(journeys);
        }

        let journey_ids = journeys
            .iter()
            .map(|j| to_db(j.id.get()))
            .collect::<RepositoryResult<Vec<_>>>()?;
        let checkpoint_rows: Vec<CheckpointRow> =
            sqlx::query_as(queries::SELECT_CHECKPOINTS_FOR_JOURNEYS)
                .bind(&journey_ids)
                .fetch_all(&self.pool)
                .await?;
        let checkpoints = checkpoint_rows
            .into_iter()
            .map(CheckpointRow::into_checkpoint)
            .collect::<RepositoryResult<Vec<_>>>()?;

        let mut media_by_checkpoint: HashMap<CheckpointId, Vec<Media>> = HashMap::new();
        if !checkpoints.is_empty() {
            let checkpoint_ids = checkpoints
                .iter()
                .map(|c| to_db(c.id.get()))
                .collect::<RepositoryResult<Vec<_>>>()?;
            let media_rows: Vec<MediaRow> = sqlx::query_as(queries::SELECT_MEDIA_FOR_CHECKPOINTS)
                .bind(&checkpoint_ids)
                .fetch_all(&self.pool)
                .await?;
            for row in media_rows {
                let media = Media::try_from(row)?;
                media_by_checkpoint
                    .entry(media.checkpoint_id)
                    .or_default()
                    .push(media);
            }
        }

        let mut by_journey: HashMap<JourneyId, Vec<Checkpoint>> = HashMap::new();
        for mut checkpoint in checkpoints {
            checkpoint.media = media_by_checkpoint
                .remove(&checkpoint.id)
                .unwrap_or_default();
            by_journey
                .entry(checkpoint.journey_id)
                .or_default()
                .push(checkpoint);
        }
        for journey in &mut journeys {
            journey.checkpoints = by_journey.remove(&journey.id).unwrap_or_default();
            journey.sort_checkpoints();
        }
        Ok(journeys)
    }

    async fn users(&self, sql: &'static str, id: UserId) -> RepositoryResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(sql)
            .bind(to_db(id.get())?)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }
}

#[async_trait]
impl JourneyRepository for PgStore {
    async fn insert_journey(&self, journey: NewJourney) -> RepositoryResult<Journey> {
        let row: JourneyRow = sqlx::query_as(queries::INSERT_JOURNEY)
            .bind(to_db(journey.owner_id.get())?)
            .bind(&journey.title)
            .bind(&journey.description)
            .bind(journey.is_public)
            .bind(journey.started_at)
            .fetch_one(&self.pool)
            .await?;
        row.into_journey()
    }

    async fn find_journey(&self, id: JourneyId) -> RepositoryResult<Option<Journey>> {
        let Ok(db_id) = to_db(id.get()) else {
            return Ok(None);
        };
        let row: Option<JourneyRow> = sqlx::query_as(queries::SELECT_JOURNEY)
            .bind(db_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![row]).await?.pop())
    }

    async fn journey_owner(&self, id: JourneyId) -> RepositoryResult<Option<UserId>> {
        let Ok(db_id) = to_db(id.get()) else {
            return Ok(None);
        };
        let owner: Option<i64> = sqlx::query_scalar(queries::SELECT_JOURNEY_OWNER)
            .bind(db_id)
            .fetch_optional(&self.pool)
            .await?;
        owner.map(|o| from_db(o).map(UserId)).transpose()
    }

    async fn list_by_owner(&self, owner: UserId) -> RepositoryResult<Vec<Journey>> {
        let rows: Vec<JourneyRow> = sqlx::query_as(queries::SELECT_JOURNEYS_BY_OWNER)
            .bind(to_db(owner.get())?)
            .fetch_all(&self.pool)
            .await?;
        self.hydrate(rows).await
    }

    async fn list_public(&self, limit: u32, offset: u64) -> RepositoryResult<Vec<Journey>> {
        let rows: Vec<JourneyRow> = sqlx::query_as(queries::SELECT_PUBLIC_JOURNEYS)
            .bind(i64::from(limit))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        self.hydrate(rows).await
    }

    async fn delete_journey(&self, owner: UserId, id: JourneyId) -> RepositoryResult<bool> {
        let Ok(db_id) = to_db(id.get()) else {
            return Ok(false);
        };
        let result = sqlx::query(queries::DELETE_JOURNEY)
            .bind(db_id)
            .bind(to_db(owner.get())?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete_journey(
        &self,
        owner: UserId,
        id: JourneyId,
        ended_at: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let Ok(db_id) = to_db(id.get()) else {
            return Ok(false);
        };
        let result = sqlx::query(queries::COMPLETE_JOURNEY)
            .bind(db_id)
            .bind(to_db(owner.get())?)
            .bind(ended_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_checkpoint(&self, checkpoint: NewCheckpoint) -> RepositoryResult<Checkpoint> {
        let row: CheckpointRow = sqlx::query_as(queries::INSERT_CHECKPOINT)
            .bind(to_db(checkpoint.journey_id.get())?)
            .bind(geo::encode(checkpoint.location))
            .bind(checkpoint.timestamp)
            .bind(&checkpoint.note)
            .fetch_one(&self.pool)
            .await?;
        row.into_checkpoint()
    }

    async fn owned_checkpoint_journey(
        &self,
        owner: UserId,
        id: CheckpointId,
    ) -> RepositoryResult<Option<JourneyId>> {
        let Ok(db_id) = to_db(id.get()) else {
            return Ok(None);
        };
        let journey: Option<i64> = sqlx::query_scalar(queries::SELECT_OWNED_CHECKPOINT_JOURNEY)
            .bind(db_id)
            .bind(to_db(owner.get())?)
            .fetch_optional(&self.pool)
            .await?;
        journey.map(|j| from_db(j).map(JourneyId)).transpose()
    }

    async fn delete_checkpoint(&self, owner: UserId, id: CheckpointId) -> RepositoryResult<bool> {
        let Ok(db_id) = to_db(id.get()) else {
            return Ok(false);
        };
        let result = sqlx::query(queries::DELETE_OWNED_CHECKPOINT)
            .bind(db_id)
            .bind(to_db(owner.get())?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_media(&self, media: NewMedia) -> RepositoryResult<Media> {
        let row: MediaRow = sqlx::query_as(queries::INSERT_MEDIA)
            .bind(to_db(media.checkpoint_id.get())?)
            .bind(&media.storage_key)
            .bind(media.kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        Media::try_from(row)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user(&self, id: UserId) -> RepositoryResult<Option<User>> {
        let Ok(db_id) = to_db(id.get()) else {
            return Ok(None);
        };
        let row: Option<UserRow> = sqlx::query_as(queries::SELECT_USER)
            .bind(db_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> RepositoryResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(queries::SELECT_USERS)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn update_display_name(&self, id: UserId, name: &str) -> RepositoryResult<bool> {
        let result = sqlx::query(queries::UPDATE_DISPLAY_NAME)
            .bind(to_db(id.get())?)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_profile_pic(&self, id: UserId, storage_key: &str) -> RepositoryResult<bool> {
        let result = sqlx::query(queries::UPDATE_PROFILE_PIC)
            .bind(to_db(id.get())?)
            .bind(storage_key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_follow(&self, follower: UserId, following: UserId) -> RepositoryResult<()> {
        let result = sqlx::query(queries::INSERT_FOLLOW)
            .bind(to_db(follower.get())?)
            .bind(to_db(following.get())?)
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(RepositoryError::UniqueViolation)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_follow(&self, follower: UserId, following: UserId) -> RepositoryResult<bool> {
        let result = sqlx::query(queries::DELETE_FOLLOW)
            .bind(to_db(follower.get())?)
            .bind(to_db(following.get())?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn followers(&self, id: UserId) -> RepositoryResult<Vec<User>> {
        self.users(queries::SELECT_FOLLOWERS, id).await
    }

    async fn following(&self, id: UserId) -> RepositoryResult<Vec<User>> {
        self.users(queries::SELECT_FOLLOWING, id).await
    }
}
