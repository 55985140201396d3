use std::sync::Arc;

use tracing::info;

use super::{discard_upload, file_failure, storage_failure, unmask};
use crate::error::{ServiceError, ServiceResult};
use crate::ids::IdMasker;
use crate::models::UserId;
use crate::repository::{RepositoryError, UserRepository};
use crate::storage::{Body, MediaStorage};
use crate::views::{UserView, ViewContext};

/// Profiles and the follow graph. Credentials and sessions belong to the auth
/// collaborator.
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    storage: Arc<dyn MediaStorage>,
    ids: Arc<IdMasker>,
}

impl UserService {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        storage: Arc<dyn MediaStorage>,
        ids: Arc<IdMasker>,
    ) -> Self {
        Self { repo, storage, ids }
    }

    fn view(&self) -> ViewContext<'_> {
        ViewContext::new(&self.ids, self.storage.as_ref())
    }

    fn user_id(&self, token: &str) -> ServiceResult<UserId> {
        unmask(&self.ids, token, "user").map(UserId)
    }

    pub async fn get_user(&self, id: UserId) -> ServiceResult<UserView> {
        let user = self
            .repo
            .find_user(id)
            .await
            .map_err(storage_failure("Failed to fetch user"))?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;
        Ok(self.view().user(&user))
    }

    /// Looks a user up by their public token.
    pub async fn get_profile(&self, token: &str) -> ServiceResult<UserView> {
        let id = self.user_id(token)?;
        self.get_user(id).await
    }

    pub async fn list_users(&self) -> ServiceResult<Vec<UserView>> {
        let users = self
            .repo
            .list_users()
            .await
            .map_err(storage_failure("Failed to fetch users"))?;
        Ok(self.view().users(&users))
    }

    pub async fn update_display_name(&self, id: UserId, name: &str) -> ServiceResult<UserView> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::bad_request("Display name cannot be empty"));
        }
        let updated = self
            .repo
            .update_display_name(id, name)
            .await
            .map_err(storage_failure("Update failed"))?;
        if !updated {
            return Err(ServiceError::not_found("User not found"));
        }
        self.get_user(id).await
    }

    pub async fn upload_profile_pic(
        &self,
        id: UserId,
        filename: &str,
        body: Body<'_>,
    ) -> ServiceResult<UserView> {
        let key = self
            .storage
            .save_profile_pic(&self.ids.mask(id.get()), filename, body)
            .await
            .map_err(file_failure)?;
        let updated = match self.repo.set_profile_pic(id, &key).await {
            Ok(updated) => updated,
            Err(e) => {
                discard_upload(self.storage.as_ref(), &key).await;
                return Err(storage_failure("Failed to update user profile")(e));
            }
        };
        if !updated {
            discard_upload(self.storage.as_ref(), &key).await;
            return Err(ServiceError::not_found("User not found"));
        }
        info!("Profile picture stored at {}", key);
        self.get_user(id).await
    }

    pub async fn follow(&self, follower: UserId, target_token: &str) -> ServiceResult<()> {
        let target = self.user_id(target_token)?;
        if target == follower {
            return Err(ServiceError::bad_request("You cannot follow yourself"));
        }

        self.repo
            .find_user(target)
            .await
            .map_err(storage_failure("Failed to follow user"))?
            .ok_or_else(|| ServiceError::not_found("Target user not found"))?;

        match self.repo.insert_follow(follower, target).await {
            Ok(()) => {
                info!("Now following {}", target_token);
                Ok(())
            }
            Err(RepositoryError::UniqueViolation) => Err(ServiceError::conflict(
                "You are already following this user",
            )),
            Err(e) => Err(storage_failure("Failed to follow user")(e)),
        }
    }

    pub async fn unfollow(&self, follower: UserId, target_token: &str) -> ServiceResult<()> {
        let target = self.user_id(target_token)?;
        let removed = self
            .repo
            .delete_follow(follower, target)
            .await
            .map_err(storage_failure("Failed to unfollow"))?;
        if !removed {
            return Err(ServiceError::not_found("Relationship not found"));
        }
        info!("Unfollowed {}", target_token);
        Ok(())
    }

    pub async fn followers(&self, token: &str) -> ServiceResult<Vec<UserView>> {
        let id = self.user_id(token)?;
        let users = self
            .repo
            .followers(id)
            .await
            .map_err(storage_failure("Failed to fetch followers"))?;
        Ok(self.view().users(&users))
    }

    pub async fn following(&self, token: &str) -> ServiceResult<Vec<UserView>> {
        let id = self.user_id(token)?;
        let users = self
            .repo
            .following(id)
            .await
            .map_err(storage_failure("Failed to fetch following list"))?;
        Ok(self.view().users(&users))
    }
}
