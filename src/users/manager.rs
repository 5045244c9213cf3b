//! User account manager
//!
//! Uses sqlx runtime query building (no compile-time macros, so no
//! DATABASE_URL is needed during builds).

use crate::{
    auth,
    avatar::AvatarPool,
    config::ServerConfig,
    error::{MosaicError, MosaicResult},
    mailer::Mailer,
    users::{LoginRequest, RegisterRequest, TokenResponse, User, UserProfile, UserRole},
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// User account manager service
pub struct UserManager {
    db: SqlitePool,
    avatars: Arc<AvatarPool>,
    mailer: Arc<Mailer>,
    config: Arc<ServerConfig>,
}

impl UserManager {
    /// Create a new user manager
    pub fn new(
        db: SqlitePool,
        avatars: Arc<AvatarPool>,
        mailer: Arc<Mailer>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            db,
            avatars,
            mailer,
            config,
        }
    }

    /// Register a new user account
    ///
    /// An optional initial profile image is ingested after the account row
    /// exists; being the pool's first image, it becomes the active avatar.
    /// A confirmation email is sent best-effort.
    pub async fn register(
        &self,
        request: RegisterRequest,
        initial_image: Option<&[u8]>,
    ) -> MosaicResult<UserProfile> {
        request
            .validate()
            .map_err(|e| MosaicError::Validation(e.to_string()))?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: request.username,
            email: request.email,
            password_hash: auth::hash_password(&request.password)?,
            role: UserRole::User,
            account_confirmed: false,
            active_avatar_key: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, account_confirmed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.account_confirmed)
        .bind(user.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                MosaicError::Conflict("Username or email already exists".to_string())
            }
            _ => MosaicError::Database(e),
        })?;

        if let Some(image_bytes) = initial_image {
            self.avatars.add_image(&user.id, image_bytes).await?;
        }

        // Confirmation email is best-effort; registration is already durable
        let token = auth::create_account_confirmation_token(
            &user.id,
            &user.email,
            &self.config.authentication.jwt_secret,
        )?;
        if let Err(e) = self
            .mailer
            .send_account_confirmation_email(
                &user.email,
                &user.username,
                &token,
                &self.config.service.public_url,
            )
            .await
        {
            tracing::warn!("Failed to send confirmation email to {}: {}", user.email, e);
        }

        tracing::info!("Registered user {} ({})", user.username, user.id);
        self.get_user(&user.id).await
    }

    /// Authenticate by username or email and issue an access token
    pub async fn login(&self, request: LoginRequest) -> MosaicResult<TokenResponse> {
        let user = match self.find_by_username(&request.username).await? {
            Some(user) => Some(user),
            // The identifier may be an email address instead
            None if request.username.contains('@') => {
                self.find_by_email(&request.username).await?
            }
            None => None,
        };

        let Some(user) = user else {
            return Err(MosaicError::Authentication("Invalid credentials".to_string()));
        };

        if !auth::verify_password(&request.password, &user.password_hash)? {
            return Err(MosaicError::Authentication("Invalid credentials".to_string()));
        }

        let (access_token, expires_at) = auth::create_access_token(
            &user.id,
            user.role,
            &self.config.authentication.jwt_secret,
            self.config.authentication.access_token_ttl_minutes,
        )?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_at,
        })
    }

    /// Fetch a user profile by id
    pub async fn get_user(&self, user_id: &str) -> MosaicResult<UserProfile> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, role, account_confirmed, active_avatar_key, created_at
             FROM users WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| MosaicError::NotFound(format!("User not found: {}", user_id)))?;

        Ok(user_from_row(&row)?.into())
    }

    /// Confirm an account from an emailed confirmation token
    pub async fn confirm_account(&self, token: &str) -> MosaicResult<()> {
        let claims = auth::verify_typed_token(
            token,
            &self.config.authentication.jwt_secret,
            auth::TOKEN_TYPE_ACCOUNT_CONFIRMATION,
        )?;
        let email = claims
            .email
            .ok_or_else(|| MosaicError::Authentication("Token missing email".to_string()))?;

        let result = sqlx::query(
            "UPDATE users SET account_confirmed = TRUE WHERE id = ?1 AND email = ?2",
        )
        .bind(&claims.sub)
        .bind(&email)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MosaicError::NotFound("User not found".to_string()));
        }

        let user = self.get_user(&claims.sub).await?;
        if let Err(e) = self
            .mailer
            .send_account_confirmed_email(&user.email, &user.username)
            .await
        {
            tracing::warn!("Failed to send confirmed notification to {}: {}", user.email, e);
        }

        tracing::info!("Confirmed account for user {}", claims.sub);
        Ok(())
    }

    /// Send a password reset email if the address is registered
    ///
    /// Always succeeds for unknown addresses so account existence is not
    /// revealed.
    pub async fn request_password_reset(&self, email: &str) -> MosaicResult<()> {
        let Some(user) = self.find_by_email(email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token =
            auth::create_password_reset_token(email, &self.config.authentication.jwt_secret)?;
        self.mailer
            .send_password_reset_email(
                &user.email,
                &user.username,
                &token,
                &self.config.service.public_url,
            )
            .await
    }

    /// Reset a password from an emailed reset token
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> MosaicResult<()> {
        if new_password != confirm_password {
            return Err(MosaicError::Validation("Passwords do not match".to_string()));
        }
        if new_password.len() < 8 {
            return Err(MosaicError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let claims = auth::verify_typed_token(
            token,
            &self.config.authentication.jwt_secret,
            auth::TOKEN_TYPE_PASSWORD_RESET,
        )?;
        let email = claims.email.unwrap_or(claims.sub);

        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| MosaicError::NotFound("User not found".to_string()))?;

        let password_hash = auth::hash_password(new_password)?;
        sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
            .bind(&password_hash)
            .bind(&user.id)
            .execute(&self.db)
            .await?;

        if let Err(e) = self
            .mailer
            .send_password_changed_email(&user.email, &user.username)
            .await
        {
            tracing::warn!("Failed to send password-changed notification: {}", e);
        }

        tracing::info!("Password reset for user {}", user.id);
        Ok(())
    }

    /// List all users (admin)
    pub async fn list_users(&self) -> MosaicResult<Vec<UserProfile>> {
        let rows = sqlx::query(
            "SELECT id, username, email, password_hash, role, account_confirmed, active_avatar_key, created_at
             FROM users ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.db)
        .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(user_from_row(&row)?.into());
        }

        Ok(users)
    }

    /// Delete a user account, purging their image pool first
    ///
    /// The owner lock is held across the purge and the row delete so an
    /// upload cannot land a blob in between.
    pub async fn delete_account(&self, user_id: &str) -> MosaicResult<()> {
        // Ensure the user exists before purging
        self.get_user(user_id).await?;

        let lock = self.avatars.owner_lock(user_id);
        let _guard = lock.lock().await;

        self.avatars.purge_owner_inner(user_id).await?;

        sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        tracing::info!("Deleted account {}", user_id);
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> MosaicResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, role, account_confirmed, active_avatar_key, created_at
             FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| user_from_row(&r)).transpose()
    }

    async fn find_by_email(&self, email: &str) -> MosaicResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, role, account_confirmed, active_avatar_key, created_at
             FROM users WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| user_from_row(&r)).transpose()
    }
}

fn user_from_row(row: &SqliteRow) -> MosaicResult<User> {
    let role: String = row.try_get("role")?;

    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: UserRole::from_str(&role),
        account_confirmed: row.try_get("account_confirmed")?,
        active_avatar_key: row.try_get("active_avatar_key")?,
        created_at: row.try_get("created_at")?,
    })
}
