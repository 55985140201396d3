//! In-memory implementation of the persistence ports for tests.
//!
//! Mirrors the relational behaviour the services rely on: cascade deletes,
//! single-step ownership-checked deletes, and the follow uniqueness
//! constraint. Checkpoints are returned in insertion order, not timestamp
//! order.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    Checkpoint, CheckpointId, Journey, JourneyId, Media, MediaId, NewCheckpoint, NewJourney,
    NewMedia, User, UserId,
};
use crate::repository::{JourneyRepository, RepositoryError, RepositoryResult, UserRepository};

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    users: Vec<User>,
    follows: BTreeSet<(UserId, UserId)>,
    journeys: Vec<Journey>,
    checkpoints: Vec<Checkpoint>,
    media: Vec<Media>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn hydrate(&self, journey: &Journey) -> Journey {
        let mut journey = journey.clone();
        journey.checkpoints = self
            .checkpoints
            .iter()
            .filter(|c| c.journey_id == journey.id)
            .map(|c| {
                let mut checkpoint = c.clone();
                checkpoint.media = self
                    .media
                    .iter()
                    .filter(|m| m.checkpoint_id == c.id)
                    .cloned()
                    .collect();
                checkpoint
            })
            .collect();
        journey
    }

    fn newest_first<'a>(&self, journeys: impl Iterator<Item = &'a Journey>) -> Vec<Journey> {
        let mut out: Vec<Journey> = journeys.map(|j| self.hydrate(j)).collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out
    }

    fn remove_checkpoints(&mut self, removed: &[CheckpointId]) {
        self.checkpoints.retain(|c| !removed.contains(&c.id));
        self.media.retain(|m| !removed.contains(&m.checkpoint_id));
    }

    fn users_where(&self, pred: impl Fn(UserId) -> bool) -> Vec<User> {
        self.users.iter().filter(|u| pred(u.id)).cloned().collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    failing_media: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a user the way the auth collaborator would on registration.
    pub fn add_user(&self, email: &str, display_name: &str) -> UserId {
        let mut state = self.lock();
        let id = UserId(state.next_id());
        state.users.push(User {
            id,
            email: email.to_string(),
            display_name: display_name.to_string(),
            profile_pic: None,
            created_at: Utc::now(),
        });
        id
    }

    /// Makes every subsequent media insert fail like a lost connection.
    pub fn fail_media_inserts(&self) {
        self.failing_media.store(true, Ordering::SeqCst);
    }

    pub fn checkpoint_count(&self) -> usize {
        self.lock().checkpoints.len()
    }

    pub fn media_count(&self) -> usize {
        self.lock().media.len()
    }
}

#[async_trait]
impl JourneyRepository for MemoryStore {
    async fn insert_journey(&self, journey: NewJourney) -> RepositoryResult<Journey> {
        let mut state = self.lock();
        let created = Journey {
            id: JourneyId(state.next_id()),
            owner_id: journey.owner_id,
            title: journey.title,
            description: journey.description,
            is_public: journey.is_public,
            started_at: journey.started_at,
            ended_at: None,
            created_at: Utc::now(),
            checkpoints: Vec::new(),
        };
        state.journeys.push(created.clone());
        Ok(created)
    }

    async fn find_journey(&self, id: JourneyId) -> RepositoryResult<Option<Journey>> {
        let state = self.lock();
        Ok(state
            .journeys
            .iter()
            .find(|j| j.id == id)
            .map(|j| state.hydrate(j)))
    }

    async fn journey_owner(&self, id: JourneyId) -> RepositoryResult<Option<UserId>> {
        Ok(self
            .lock()
            .journeys
            .iter()
            .find(|j| j.id == id)
            .map(|j| j.owner_id))
    }

    async fn list_by_owner(&self, owner: UserId) -> RepositoryResult<Vec<Journey>> {
        let state = self.lock();
        Ok(state.newest_first(state.journeys.iter().filter(|j| j.owner_id == owner)))
    }

    async fn list_public(&self, limit: u32, offset: u64) -> RepositoryResult<Vec<Journey>> {
        let state = self.lock();
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(state
            .newest_first(state.journeys.iter().filter(|j| j.is_public))
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect())
    }

    async fn delete_journey(&self, owner: UserId, id: JourneyId) -> RepositoryResult<bool> {
        let mut state = self.lock();
        let before = state.journeys.len();
        state
            .journeys
            .retain(|j| !(j.id == id && j.owner_id == owner));
        if state.journeys.len() == before {
            return Ok(false);
        }
        let removed: Vec<CheckpointId> = state
            .checkpoints
            .iter()
            .filter(|c| c.journey_id == id)
            .map(|c| c.id)
            .collect();
        state.remove_checkpoints(&removed);
        Ok(true)
    }

    async fn complete_journey(
        &self,
        owner: UserId,
        id: JourneyId,
        ended_at: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let mut state = self.lock();
        match state
            .journeys
            .iter_mut()
            .find(|j| j.id == id && j.owner_id == owner && j.ended_at.is_none())
        {
            Some(journey) => {
                journey.ended_at = Some(ended_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_checkpoint(&self, checkpoint: NewCheckpoint) -> RepositoryResult<Checkpoint> {
        let mut state = self.lock();
        if !state.journeys.iter().any(|j| j.id == checkpoint.journey_id) {
            return Err(RepositoryError::Database(sqlx::Error::RowNotFound));
        }
        let created = Checkpoint {
            id: CheckpointId(state.next_id()),
            journey_id: checkpoint.journey_id,
            location: Some(checkpoint.location),
            timestamp: checkpoint.timestamp,
            note: checkpoint.note,
            media: Vec::new(),
        };
        state.checkpoints.push(created.clone());
        Ok(created)
    }

    async fn owned_checkpoint_journey(
        &self,
        owner: UserId,
        id: CheckpointId,
    ) -> RepositoryResult<Option<JourneyId>> {
        let state = self.lock();
        Ok(state
            .checkpoints
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.journey_id)
            .filter(|journey_id| {
                state
                    .journeys
                    .iter()
                    .any(|j| j.id == *journey_id && j.owner_id == owner)
            }))
    }

    async fn delete_checkpoint(&self, owner: UserId, id: CheckpointId) -> RepositoryResult<bool> {
        let mut state = self.lock();
        let owned = state.checkpoints.iter().any(|c| {
            c.id == id
                && state
                    .journeys
                    .iter()
                    .any(|j| j.id == c.journey_id && j.owner_id == owner)
        });
        if owned {
            state.remove_checkpoints(&[id]);
        }
        Ok(owned)
    }

    async fn insert_media(&self, media: NewMedia) -> RepositoryResult<Media> {
        if self.failing_media.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut state = self.lock();
        if !state.checkpoints.iter().any(|c| c.id == media.checkpoint_id) {
            return Err(RepositoryError::Database(sqlx::Error::RowNotFound));
        }
        let created = Media {
            id: MediaId(state.next_id()),
            checkpoint_id: media.checkpoint_id,
            storage_key: media.storage_key,
            kind: media.kind,
            created_at: Utc::now(),
        };
        state.media.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: UserId) -> RepositoryResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> RepositoryResult<Vec<User>> {
        Ok(self.lock().users.clone())
    }

    async fn update_display_name(&self, id: UserId, name: &str) -> RepositoryResult<bool> {
        let mut state = self.lock();
        Ok(match state.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.display_name = name.to_string();
                true
            }
            None => false,
        })
    }

    async fn set_profile_pic(&self, id: UserId, storage_key: &str) -> RepositoryResult<bool> {
        let mut state = self.lock();
        Ok(match state.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.profile_pic = Some(storage_key.to_string());
                true
            }
            None => false,
        })
    }

    async fn insert_follow(&self, follower: UserId, following: UserId) -> RepositoryResult<()> {
        if self.lock().follows.insert((follower, following)) {
            Ok(())
        } else {
            Err(RepositoryError::UniqueViolation)
        }
    }

    async fn delete_follow(&self, follower: UserId, following: UserId) -> RepositoryResult<bool> {
        Ok(self.lock().follows.remove(&(follower, following)))
    }

    async fn followers(&self, id: UserId) -> RepositoryResult<Vec<User>> {
        let state = self.lock();
        Ok(state.users_where(|u| state.follows.contains(&(u, id))))
    }

    async fn following(&self, id: UserId) -> RepositoryResult<Vec<User>> {
        let state = self.lock();
        Ok(state.users_where(|u| state.follows.contains(&(id, u))))
    }
}
