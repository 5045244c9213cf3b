//! Authentication: token issuance, password hashing, and extractors

use crate::{
    context::AppContext,
    error::{MosaicError, MosaicResult},
    users::UserRole,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_ACCOUNT_CONFIRMATION: &str = "account_confirmation";
pub const TOKEN_TYPE_PASSWORD_RESET: &str = "password_reset";

/// JWT claims
///
/// `token_type` distinguishes session tokens from the single-purpose
/// confirmation and reset tokens; a token is only ever accepted for the
/// purpose it was minted for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: usize,
}

fn sign_claims(claims: &Claims, secret: &str) -> MosaicResult<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| MosaicError::Internal(format!("Token signing failed: {}", e)))
}

/// Issue a session access token, returning the token and its expiry
pub fn create_access_token(
    user_id: &str,
    role: UserRole,
    secret: &str,
    ttl_minutes: i64,
) -> MosaicResult<(String, DateTime<Utc>)> {
    let expires_at = Utc::now() + Duration::minutes(ttl_minutes);
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        token_type: TOKEN_TYPE_ACCESS.to_string(),
        email: None,
        exp: expires_at.timestamp() as usize,
    };

    Ok((sign_claims(&claims, secret)?, expires_at))
}

/// Issue an account confirmation token (24 hour lifetime)
pub fn create_account_confirmation_token(
    user_id: &str,
    email: &str,
    secret: &str,
) -> MosaicResult<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        role: UserRole::User.as_str().to_string(),
        token_type: TOKEN_TYPE_ACCOUNT_CONFIRMATION.to_string(),
        email: Some(email.to_string()),
        exp: (Utc::now() + Duration::hours(24)).timestamp() as usize,
    };

    sign_claims(&claims, secret)
}

/// Issue a password reset token (1 hour lifetime)
pub fn create_password_reset_token(email: &str, secret: &str) -> MosaicResult<String> {
    let claims = Claims {
        sub: email.to_string(),
        role: UserRole::User.as_str().to_string(),
        token_type: TOKEN_TYPE_PASSWORD_RESET.to_string(),
        email: Some(email.to_string()),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };

    sign_claims(&claims, secret)
}

/// Verify a token signature and expiry
pub fn verify_token(token: &str, secret: &str) -> MosaicResult<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| MosaicError::Authentication("Invalid or expired token".to_string()))?;

    Ok(data.claims)
}

/// Verify a token and require a specific token type
pub fn verify_typed_token(token: &str, secret: &str, expected_type: &str) -> MosaicResult<Claims> {
    let claims = verify_token(token, secret)?;
    if claims.token_type != expected_type {
        return Err(MosaicError::Authentication("Invalid token type".to_string()));
    }

    Ok(claims)
}

/// Hash a password with Argon2id and a random salt
pub fn hash_password(password: &str) -> MosaicResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| MosaicError::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(password: &str, stored_hash: &str) -> MosaicResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| MosaicError::Internal(format!("Invalid stored password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Extract a bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

/// Authenticated user context extracted from a bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: UserRole,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = MosaicError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or_else(|| {
            MosaicError::Authentication("Missing authorization header".to_string())
        })?;

        let claims = verify_typed_token(
            &token,
            &state.config.authentication.jwt_secret,
            TOKEN_TYPE_ACCESS,
        )?;

        Ok(AuthUser {
            user_id: claims.sub,
            role: UserRole::from_str(&claims.role),
        })
    }
}

/// Authenticated user context that additionally requires the admin role
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminUser {
    type Rejection = MosaicError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if auth.role != UserRole::Admin {
            return Err(MosaicError::Authorization(
                "Admin privileges required".to_string(),
            ));
        }

        Ok(AdminUser {
            user_id: auth.user_id,
        })
    }
}
