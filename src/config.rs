//! Configuration management for the Mosaic server

use crate::error::{MosaicError, MosaicResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub avatar: AvatarConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Public base URL used in emailed links
    pub public_url: String,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub object_store: ObjectStoreConfig,
}

/// Object store backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectStoreConfig {
    Disk {
        location: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
    },
}

/// Profile-image pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarConfig {
    /// Maximum number of images retained per user
    pub max_pool_size: i64,
    /// Maximum accepted upload size in bytes (default: 5 MiB)
    pub max_upload_bytes: usize,
    /// JPEG quality factor applied during normalization
    pub jpeg_quality: u8,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 5,
            max_upload_bytes: 5 * 1024 * 1024,
            jpeg_quality: 75,
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime in minutes
    pub access_token_ttl_minutes: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> MosaicResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("MOSAIC_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("MOSAIC_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| MosaicError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("MOSAIC_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));
        let version = env::var("MOSAIC_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("MOSAIC_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("MOSAIC_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("mosaic.sqlite"));

        let object_store = if let Ok(bucket) = env::var("MOSAIC_S3_BUCKET") {
            ObjectStoreConfig::S3 {
                bucket,
                region: env::var("MOSAIC_S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                endpoint: env::var("MOSAIC_S3_ENDPOINT").ok(),
            }
        } else {
            ObjectStoreConfig::Disk {
                location: env::var("MOSAIC_OBJECT_STORE_LOCATION")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| data_directory.join("objects")),
            }
        };

        let avatar = AvatarConfig {
            max_pool_size: env::var("MOSAIC_AVATAR_POOL_SIZE")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            max_upload_bytes: env::var("MOSAIC_AVATAR_MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| "5242880".to_string())
                .parse()
                .unwrap_or(5 * 1024 * 1024),
            jpeg_quality: env::var("MOSAIC_AVATAR_JPEG_QUALITY")
                .unwrap_or_else(|_| "75".to_string())
                .parse()
                .unwrap_or(75),
        };

        let jwt_secret = env::var("MOSAIC_JWT_SECRET")
            .map_err(|_| MosaicError::Validation("JWT secret required".to_string()))?;
        let access_token_ttl_minutes = env::var("MOSAIC_ACCESS_TOKEN_TTL_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        let email = if let Ok(smtp_url) = env::var("MOSAIC_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("MOSAIC_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
                object_store,
            },
            avatar,
            authentication: AuthConfig {
                jwt_secret,
                access_token_ttl_minutes,
            },
            email,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> MosaicResult<()> {
        if self.service.hostname.is_empty() {
            return Err(MosaicError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(MosaicError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.avatar.max_pool_size < 1 {
            return Err(MosaicError::Validation(
                "Avatar pool size must be at least 1".to_string(),
            ));
        }

        if self.avatar.jpeg_quality == 0 || self.avatar.jpeg_quality > 100 {
            return Err(MosaicError::Validation(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        Ok(())
    }
}
