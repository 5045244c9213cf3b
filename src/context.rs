//! Application context and dependency injection

use crate::{
    avatar::AvatarPool,
    config::{ObjectStoreConfig, ServerConfig},
    db,
    error::{MosaicError, MosaicResult},
    mailer::Mailer,
    object_store::{DiskObjectStore, ObjectStore},
    users::UserManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub object_store: Arc<dyn ObjectStore>,
    pub avatars: Arc<AvatarPool>,
    pub users: Arc<UserManager>,
    pub mailer: Arc<Mailer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> MosaicResult<Self> {
        config.validate()?;

        let config = Arc::new(config);

        // Initialize database
        tokio::fs::create_dir_all(&config.storage.data_directory).await?;
        let database_pool =
            db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&database_pool).await?;
        db::test_connection(&database_pool).await?;

        // Initialize object store
        let object_store: Arc<dyn ObjectStore> = match &config.storage.object_store {
            ObjectStoreConfig::Disk { location } => {
                tokio::fs::create_dir_all(location).await?;
                Arc::new(DiskObjectStore::new(location.clone()))
            }
            ObjectStoreConfig::S3 { .. } => {
                return Err(MosaicError::Internal(
                    "S3 object store backend not yet implemented".to_string(),
                ));
            }
        };

        // Initialize services
        let avatars = Arc::new(AvatarPool::new(
            database_pool.clone(),
            Arc::clone(&object_store),
            config.avatar.clone(),
        ));
        let mailer = Arc::new(Mailer::new(config.email.clone())?);
        let users = Arc::new(UserManager::new(
            database_pool.clone(),
            Arc::clone(&avatars),
            Arc::clone(&mailer),
            Arc::clone(&config),
        ));

        Ok(Self {
            config,
            db: database_pool,
            object_store,
            avatars,
            users,
            mailer,
        })
    }
}
