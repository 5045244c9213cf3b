//! Profile-image data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored profile image record
#[derive(Debug, Clone)]
pub struct UserImage {
    pub id: String,
    pub owner_id: String,
    /// Content-addressed storage key: `users/{owner_id}/{sha256}.jpg`
    pub content_key: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Caller-facing view of a profile image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    pub content_key: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserImage> for ImageRef {
    fn from(image: UserImage) -> Self {
        Self {
            id: image.id,
            content_key: image.content_key,
            is_active: image.is_active,
            created_at: image.created_at,
        }
    }
}
