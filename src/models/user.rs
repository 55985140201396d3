use chrono::{DateTime, Utc};

use super::UserId;

/// Profile data. Credentials stay with the auth collaborator and are never
/// loaded here.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    /// Storage key of the avatar, if one was uploaded.
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
}
