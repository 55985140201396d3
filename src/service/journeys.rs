use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::{
    discard_upload, file_failure, lenient_timestamp, storage_failure, unmask,
    CreateCheckpointRequest, CreateJourneyRequest, Page,
};
use crate::error::{ServiceError, ServiceResult};
use crate::geo::Point;
use crate::ids::IdMasker;
use crate::models::{
    CheckpointId, JourneyId, MediaKind, NewCheckpoint, NewJourney, NewMedia, UserId,
};
use crate::repository::JourneyRepository;
use crate::storage::{Body, MediaStorage};
use crate::views::{CheckpointView, JourneyView, MediaView, ViewContext};

/// Journey aggregate operations: journeys, their checkpoints, and media.
pub struct JourneyService {
    repo: Arc<dyn JourneyRepository>,
    storage: Arc<dyn MediaStorage>,
    ids: Arc<IdMasker>,
}

impl JourneyService {
    pub fn new(
        repo: Arc<dyn JourneyRepository>,
        storage: Arc<dyn MediaStorage>,
        ids: Arc<IdMasker>,
    ) -> Self {
        Self { repo, storage, ids }
    }

    fn view(&self) -> ViewContext<'_> {
        ViewContext::new(&self.ids, self.storage.as_ref())
    }

    fn journey_id(&self, token: &str) -> ServiceResult<JourneyId> {
        unmask(&self.ids, token, "Journey").map(JourneyId)
    }

    fn checkpoint_id(&self, token: &str) -> ServiceResult<CheckpointId> {
        unmask(&self.ids, token, "Checkpoint").map(CheckpointId)
    }

    pub async fn create_journey(
        &self,
        owner: UserId,
        req: CreateJourneyRequest,
    ) -> ServiceResult<JourneyView> {
        let journey = self
            .repo
            .insert_journey(NewJourney {
                owner_id: owner,
                title: req.title,
                description: req.description,
                is_public: req.is_public,
                started_at: Utc::now(),
            })
            .await
            .map_err(storage_failure("Failed to create journey"))?;

        let view = self.view().journey(&journey);
        info!("Journey {} created (public: {})", view.id, journey.is_public);
        Ok(view)
    }

    /// Anonymous requesters pass [`UserId::ANONYMOUS`] and can only read public
    /// journeys.
    pub async fn get_journey(&self, token: &str, requester: UserId) -> ServiceResult<JourneyView> {
        let id = self.journey_id(token)?;
        let mut journey = self
            .repo
            .find_journey(id)
            .await
            .map_err(storage_failure("Failed to fetch journey"))?
            .ok_or_else(|| ServiceError::not_found("Journey not found"))?;

        if !journey.is_readable_by(requester) {
            return Err(ServiceError::forbidden("This journey is private"));
        }

        journey.sort_checkpoints();
        Ok(self.view().journey(&journey))
    }

    /// The caller's journeys, newest first.
    pub async fn list_user_journeys(&self, owner: UserId) -> ServiceResult<Vec<JourneyView>> {
        let mut journeys = self
            .repo
            .list_by_owner(owner)
            .await
            .map_err(storage_failure("Failed to fetch journeys"))?;
        journeys.iter_mut().for_each(|j| j.sort_checkpoints());
        Ok(self.view().journeys(&journeys))
    }

    /// The public feed, newest first.
    pub async fn list_public_journeys(&self, page: Page) -> ServiceResult<Vec<JourneyView>> {
        let mut journeys = self
            .repo
            .list_public(page.limit(), page.offset())
            .await
            .map_err(storage_failure("Failed to fetch public feed"))?;
        journeys.iter_mut().for_each(|j| j.sort_checkpoints());
        Ok(self.view().journeys(&journeys))
    }

    /// Deletes the journey with its checkpoints and media. A journey owned by
    /// someone else is reported exactly like a missing one.
    pub async fn delete_journey(&self, owner: UserId, token: &str) -> ServiceResult<()> {
        let id = self.journey_id(token)?;
        let deleted = self
            .repo
            .delete_journey(owner, id)
            .await
            .map_err(storage_failure("Failed to delete journey"))?;
        if !deleted {
            return Err(ServiceError::not_found("Journey not found or unauthorized"));
        }
        info!("Journey {} deleted", token);
        Ok(())
    }

    /// Marks an ongoing journey as completed. There is no way back to ongoing.
    pub async fn complete_journey(
        &self,
        owner: UserId,
        token: &str,
        ended_at: Option<&str>,
    ) -> ServiceResult<JourneyView> {
        let id = self.journey_id(token)?;
        let ended_at = lenient_timestamp(ended_at, Utc::now());
        let updated = self
            .repo
            .complete_journey(owner, id, ended_at)
            .await
            .map_err(storage_failure("Failed to complete journey"))?;

        if !updated {
            let current_owner = self
                .repo
                .journey_owner(id)
                .await
                .map_err(storage_failure("Failed to complete journey"))?;
            return Err(if current_owner == Some(owner) {
                ServiceError::conflict("Journey is already completed")
            } else {
                ServiceError::not_found("Journey not found or unauthorized")
            });
        }

        info!("Journey {} completed", token);
        self.get_journey(token, owner).await
    }

    pub async fn add_checkpoint(
        &self,
        owner: UserId,
        journey_token: &str,
        req: CreateCheckpointRequest,
    ) -> ServiceResult<CheckpointView> {
        let journey_id = self.journey_id(journey_token)?;

        let journey_owner = self
            .repo
            .journey_owner(journey_id)
            .await
            .map_err(storage_failure("Failed to add checkpoint"))?
            .ok_or_else(|| ServiceError::not_found("Journey not found"))?;
        if journey_owner != owner {
            return Err(ServiceError::forbidden("Not authorized to edit this journey"));
        }

        let location = Point::checked(req.lng, req.lat)
            .map_err(|e| ServiceError::bad_request(e.to_string()).with_source(e))?;

        let checkpoint = self
            .repo
            .insert_checkpoint(NewCheckpoint {
                journey_id,
                location,
                timestamp: lenient_timestamp(req.timestamp.as_deref(), Utc::now()),
                note: req.note,
            })
            .await
            .map_err(storage_failure("Failed to add checkpoint"))?;

        let view = self.view().checkpoint(&checkpoint);
        info!("Checkpoint {} added to journey {}", view.id, journey_token);
        Ok(view)
    }

    /// Ownership is checked through the parent journey; a checkpoint in
    /// someone else's journey is reported exactly like a missing one.
    pub async fn delete_checkpoint(&self, owner: UserId, token: &str) -> ServiceResult<()> {
        let id = self.checkpoint_id(token)?;
        let deleted = self
            .repo
            .delete_checkpoint(owner, id)
            .await
            .map_err(storage_failure("Failed to delete checkpoint"))?;
        if !deleted {
            return Err(ServiceError::not_found(
                "Checkpoint not found or unauthorized",
            ));
        }
        info!("Checkpoint {} deleted", token);
        Ok(())
    }

    /// Stores an attachment for one of the caller's checkpoints.
    pub async fn add_media(
        &self,
        owner: UserId,
        checkpoint_token: &str,
        filename: &str,
        kind: &str,
        body: Body<'_>,
    ) -> ServiceResult<MediaView> {
        let checkpoint_id = self.checkpoint_id(checkpoint_token)?;
        let kind: MediaKind = kind
            .parse()
            .map_err(|e| ServiceError::bad_request("Unknown media type").with_source(e))?;

        let journey_id = self
            .repo
            .owned_checkpoint_journey(owner, checkpoint_id)
            .await
            .map_err(storage_failure("Failed to add media"))?
            .ok_or_else(|| ServiceError::not_found("Checkpoint not found or unauthorized"))?;

        let journey_token = self.ids.mask(journey_id.get());
        let storage_key = self
            .storage
            .save_media(&journey_token, checkpoint_token, filename, body)
            .await
            .map_err(file_failure)?;

        let media = match self
            .repo
            .insert_media(NewMedia {
                checkpoint_id,
                storage_key: storage_key.clone(),
                kind,
            })
            .await
        {
            Ok(media) => media,
            Err(e) => {
                discard_upload(self.storage.as_ref(), &storage_key).await;
                return Err(storage_failure("Failed to record media")(e));
            }
        };

        info!(
            "Media {} ({}) saved for checkpoint {}",
            media.storage_key, kind, checkpoint_token
        );
        Ok(self.view().media(&media))
    }
}
