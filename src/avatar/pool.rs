//! Image pool manager
//!
//! The state machine governing a user's profile-image set: capacity bound,
//! single-active invariant, eviction on overflow, and reactivation on
//! delete. Every read-modify-write runs under a per-owner lock and a
//! database transaction; the user's denormalized `active_avatar_key` is
//! updated in the same transaction as the image records it mirrors.
//!
//! Write ordering against the object store follows a fixed discipline:
//! on add, bytes are written before the metadata commit (a failed commit
//! leaves a reclaimable orphan blob, never a record without bytes); on
//! delete and eviction, records go first and the blob delete afterwards is
//! best-effort (a dangling blob is unreferenced and harmless).

use crate::{
    avatar::{gate, ImageRef, UserImage},
    config::AvatarConfig,
    error::{MosaicError, MosaicResult},
    object_store::ObjectStore,
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Per-owner lock table
///
/// Serializes pool mutations for a single owner while letting different
/// owners proceed in parallel. Entries are small and bounded by the set of
/// owners seen since startup.
#[derive(Default)]
struct OwnerLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl OwnerLocks {
    fn for_owner(&self, owner_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("owner lock table poisoned");
        map.entry(owner_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Profile-image pool manager
pub struct AvatarPool {
    db: SqlitePool,
    store: Arc<dyn ObjectStore>,
    config: AvatarConfig,
    locks: OwnerLocks,
}

impl AvatarPool {
    /// Create a new pool manager
    pub fn new(db: SqlitePool, store: Arc<dyn ObjectStore>, config: AvatarConfig) -> Self {
        Self {
            db,
            store,
            config,
            locks: OwnerLocks::default(),
        }
    }

    /// Ingest an uploaded payload into the owner's pool
    ///
    /// The payload is validated and normalized, content-addressed, and
    /// placed according to the pool state: the first image becomes active,
    /// later images are inserted inactive, and at capacity the oldest
    /// inactive image is evicted to make room. Uploading byte-identical
    /// content twice is idempotent and returns the existing record.
    pub async fn add_image(&self, owner_id: &str, raw: &[u8]) -> MosaicResult<ImageRef> {
        let normalized =
            gate::validate_and_normalize(raw, self.config.max_upload_bytes, self.config.jpeg_quality)?;
        let digest = gate::content_digest(&normalized);
        let content_key = gate::content_key(owner_id, &digest);

        let lock = self.locks.for_owner(owner_id);
        let _guard = lock.lock().await;

        let mut tx = self.db.begin().await?;
        self.require_owner(&mut tx, owner_id).await?;

        // Identical normalized bytes map to the same key; return the
        // existing record instead of violating key uniqueness
        if let Some(existing) = sqlx::query(
            "SELECT id, owner_id, content_key, is_active, created_at
             FROM user_images WHERE owner_id = ?1 AND content_key = ?2",
        )
        .bind(owner_id)
        .bind(&content_key)
        .fetch_optional(&mut *tx)
        .await?
        {
            return Ok(image_from_row(&existing)?.into());
        }

        let count: i64 = sqlx::query("SELECT COUNT(*) FROM user_images WHERE owner_id = ?1")
            .bind(owner_id)
            .fetch_one(&mut *tx)
            .await?
            .try_get(0)?;

        let mut evicted_key: Option<String> = None;
        if count >= self.config.max_pool_size {
            // Reclaim the oldest inactive slot; the active image is never
            // evicted
            let oldest_inactive = sqlx::query(
                "SELECT id, owner_id, content_key, is_active, created_at
                 FROM user_images
                 WHERE owner_id = ?1 AND is_active = FALSE
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT 1",
            )
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await?;

            let victim = match oldest_inactive {
                Some(row) => image_from_row(&row)?,
                None => return Err(MosaicError::PoolExhausted),
            };

            sqlx::query("DELETE FROM user_images WHERE id = ?1")
                .bind(&victim.id)
                .execute(&mut *tx)
                .await?;
            evicted_key = Some(victim.content_key);
        }

        // First image auto-activates; everything after arrives inactive
        let is_active = count == 0;

        // Bytes land before the metadata commit, so a failed commit can
        // only orphan a blob
        self.store.put(&content_key, normalized).await?;

        let image = UserImage {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            content_key,
            is_active,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO user_images (id, owner_id, content_key, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&image.id)
        .bind(&image.owner_id)
        .bind(&image.content_key)
        .bind(image.is_active)
        .bind(image.created_at)
        .execute(&mut *tx)
        .await?;

        if is_active {
            sqlx::query("UPDATE users SET active_avatar_key = ?1 WHERE id = ?2")
                .bind(&image.content_key)
                .bind(owner_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        if let Some(key) = evicted_key {
            // The record is already gone; a failed blob delete leaves an
            // unreferenced object behind
            if let Err(e) = self.store.delete(&key).await {
                tracing::warn!("Failed to delete evicted image object {}: {}", key, e);
            }
        }

        tracing::info!("Added image {} for user {}", image.id, owner_id);
        Ok(image.into())
    }

    /// List the owner's images, newest first
    pub async fn list_images(&self, owner_id: &str) -> MosaicResult<Vec<ImageRef>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, content_key, is_active, created_at
             FROM user_images
             WHERE owner_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        let mut images = Vec::with_capacity(rows.len());
        for row in rows {
            images.push(image_from_row(&row)?.into());
        }

        Ok(images)
    }

    /// Make the given image the owner's active avatar
    ///
    /// No-op if the image is already active. Flips the previous active
    /// image to inactive and updates the owner's `active_avatar_key` in the
    /// same transaction.
    pub async fn set_active(&self, owner_id: &str, image_id: &str) -> MosaicResult<ImageRef> {
        let lock = self.locks.for_owner(owner_id);
        let _guard = lock.lock().await;

        let mut tx = self.db.begin().await?;

        let mut image = self.require_image(&mut tx, owner_id, image_id).await?;
        if image.is_active {
            return Ok(image.into());
        }

        sqlx::query("UPDATE user_images SET is_active = FALSE WHERE owner_id = ?1 AND is_active = TRUE")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE user_images SET is_active = TRUE WHERE id = ?1")
            .bind(image_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET active_avatar_key = ?1 WHERE id = ?2")
            .bind(&image.content_key)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        image.is_active = true;
        Ok(image.into())
    }

    /// Delete an image from the owner's pool
    ///
    /// Deleting the sole active image is refused. If the deleted image was
    /// active (possible only from a degenerate multi-active state), the
    /// most recently created remaining image is promoted and the owner's
    /// `active_avatar_key` updated; with nothing left, the key is cleared.
    pub async fn delete_image(&self, owner_id: &str, image_id: &str) -> MosaicResult<()> {
        let lock = self.locks.for_owner(owner_id);
        let _guard = lock.lock().await;

        let mut tx = self.db.begin().await?;

        let image = self.require_image(&mut tx, owner_id, image_id).await?;

        if image.is_active {
            let active_count: i64 = sqlx::query(
                "SELECT COUNT(*) FROM user_images WHERE owner_id = ?1 AND is_active = TRUE",
            )
            .bind(owner_id)
            .fetch_one(&mut *tx)
            .await?
            .try_get(0)?;

            if active_count == 1 {
                return Err(MosaicError::LastActiveImage);
            }
        }

        sqlx::query("DELETE FROM user_images WHERE id = ?1")
            .bind(image_id)
            .execute(&mut *tx)
            .await?;

        if image.is_active {
            // Restore uniqueness and reassign the avatar pointer
            let promoted = sqlx::query(
                "SELECT id, owner_id, content_key, is_active, created_at
                 FROM user_images
                 WHERE owner_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
            )
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await?;

            sqlx::query("UPDATE user_images SET is_active = FALSE WHERE owner_id = ?1")
                .bind(owner_id)
                .execute(&mut *tx)
                .await?;

            match promoted {
                Some(row) => {
                    let promoted = image_from_row(&row)?;
                    sqlx::query("UPDATE user_images SET is_active = TRUE WHERE id = ?1")
                        .bind(&promoted.id)
                        .execute(&mut *tx)
                        .await?;
                    sqlx::query("UPDATE users SET active_avatar_key = ?1 WHERE id = ?2")
                        .bind(&promoted.content_key)
                        .bind(owner_id)
                        .execute(&mut *tx)
                        .await?;
                }
                None => {
                    sqlx::query("UPDATE users SET active_avatar_key = NULL WHERE id = ?1")
                        .bind(owner_id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;

        if let Err(e) = self.store.delete(&image.content_key).await {
            tracing::warn!(
                "Failed to delete image object {}: {}",
                image.content_key,
                e
            );
        }

        tracing::info!("Deleted image {} for user {}", image_id, owner_id);
        Ok(())
    }

    /// Fetch the stored bytes for a content key
    pub async fn get_bytes(&self, content_key: &str) -> MosaicResult<Vec<u8>> {
        self.store
            .get(content_key)
            .await?
            .ok_or_else(|| MosaicError::NotFound(format!("Image not found: {}", content_key)))
    }

    /// Hand out the owner's mutation lock
    ///
    /// Lets account deletion hold the lock across the pool purge and the
    /// removal of the owning user row, so no upload can slip in between.
    pub(crate) fn owner_lock(&self, owner_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.for_owner(owner_id)
    }

    /// Remove every image (records and objects) belonging to an owner
    ///
    /// Used when an account is deleted.
    pub async fn purge_owner(&self, owner_id: &str) -> MosaicResult<()> {
        let lock = self.owner_lock(owner_id);
        let _guard = lock.lock().await;
        self.purge_owner_inner(owner_id).await
    }

    /// Purge body; the caller must hold the owner lock
    pub(crate) async fn purge_owner_inner(&self, owner_id: &str) -> MosaicResult<()> {
        let rows = sqlx::query("SELECT content_key FROM user_images WHERE owner_id = ?1")
            .bind(owner_id)
            .fetch_all(&self.db)
            .await?;

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM user_images WHERE owner_id = ?1")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE users SET active_avatar_key = NULL WHERE id = ?1")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        for row in rows {
            let key: String = row.try_get("content_key")?;
            if let Err(e) = self.store.delete(&key).await {
                tracing::warn!("Failed to delete image object {}: {}", key, e);
            }
        }

        Ok(())
    }

    async fn require_owner(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: &str,
    ) -> MosaicResult<()> {
        sqlx::query("SELECT id FROM users WHERE id = ?1")
            .bind(owner_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| MosaicError::NotFound(format!("User not found: {}", owner_id)))?;

        Ok(())
    }

    async fn require_image(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: &str,
        image_id: &str,
    ) -> MosaicResult<UserImage> {
        let row = sqlx::query(
            "SELECT id, owner_id, content_key, is_active, created_at
             FROM user_images WHERE id = ?1 AND owner_id = ?2",
        )
        .bind(image_id)
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| {
            MosaicError::NotFound("Image not found or does not belong to user".to_string())
        })?;

        image_from_row(&row)
    }
}

fn image_from_row(row: &SqliteRow) -> MosaicResult<UserImage> {
    Ok(UserImage {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        content_key: row.try_get("content_key")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}
