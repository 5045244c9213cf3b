//! HTTP API route modules

pub mod auth;
pub mod avatar;
pub mod users;

use crate::context::AppContext;
use axum::Router;

/// Build all API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(avatar::routes())
}

#[cfg(test)]
mod tests {
    use crate::{
        avatar::{AvatarPool, ImageRef},
        config::{
            AuthConfig, AvatarConfig, LoggingConfig, ObjectStoreConfig, ServerConfig,
            ServiceConfig, StorageConfig,
        },
        context::AppContext,
        mailer::Mailer,
        object_store::{DiskObjectStore, ObjectStore},
        server,
        users::{LoginRequest, RegisterRequest, UserManager},
    };
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use image::{ImageFormat, RgbImage};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    fn test_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 0,
                public_url: "http://localhost".to_string(),
                version: "test".to_string(),
            },
            storage: StorageConfig {
                data_directory: ".".into(),
                database: ":memory:".into(),
                object_store: ObjectStoreConfig::Disk { location: ".".into() },
            },
            avatar: AvatarConfig::default(),
            authentication: AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
                access_token_ttl_minutes: 60,
            },
            email: None,
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    async fn create_test_context() -> (AppContext, TempDir) {
        let dir = tempdir().unwrap();
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&db).await.unwrap();

        let config = Arc::new(test_config());
        let store: Arc<dyn ObjectStore> =
            Arc::new(DiskObjectStore::new(dir.path().to_path_buf()));
        let avatars = Arc::new(AvatarPool::new(
            db.clone(),
            Arc::clone(&store),
            config.avatar.clone(),
        ));
        let mailer = Arc::new(Mailer::new(None).unwrap());
        let users = Arc::new(UserManager::new(
            db.clone(),
            Arc::clone(&avatars),
            Arc::clone(&mailer),
            Arc::clone(&config),
        ));

        let ctx = AppContext {
            config,
            db,
            object_store: store,
            avatars,
            users,
            mailer,
        };
        (ctx, dir)
    }

    fn test_image() -> Vec<u8> {
        let img = RgbImage::from_pixel(16, 16, image::Rgb([120, 30, 60]));
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        buf
    }

    async fn register(ctx: &AppContext, username: &str) -> String {
        ctx.users
            .register(
                RegisterRequest {
                    username: username.to_string(),
                    email: format!("{}@example.com", username),
                    password: "correct-horse".to_string(),
                },
                None,
            )
            .await
            .unwrap()
            .id
    }

    async fn login(ctx: &AppContext, username: &str) -> String {
        ctx.users
            .login(LoginRequest {
                username: username.to_string(),
                password: "correct-horse".to_string(),
            })
            .await
            .unwrap()
            .access_token
    }

    async fn promote_to_admin(ctx: &AppContext, user_id: &str) {
        sqlx::query("UPDATE users SET role = 'admin' WHERE id = ?1")
            .bind(user_id)
            .execute(&ctx.db)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_user_can_delete_own_account() {
        let (ctx, _dir) = create_test_context().await;
        let user_id = register(&ctx, "alice").await;
        ctx.avatars.add_image(&user_id, &test_image()).await.unwrap();
        let token = login(&ctx, "alice").await;

        let response = server::build_router(ctx.clone())
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/users/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        assert!(ctx.users.get_user(&user_id).await.is_err());
        assert!(ctx.avatars.list_images(&user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_own_account_requires_auth() {
        let (ctx, _dir) = create_test_context().await;

        let response = server::build_router(ctx)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/users/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_lists_another_users_images() {
        let (ctx, _dir) = create_test_context().await;
        let admin_id = register(&ctx, "root").await;
        promote_to_admin(&ctx, &admin_id).await;
        let admin_token = login(&ctx, "root").await;

        let bob_id = register(&ctx, "bob").await;
        let uploaded = ctx.avatars.add_image(&bob_id, &test_image()).await.unwrap();

        let response = server::build_router(ctx.clone())
            .oneshot(
                Request::builder()
                    .uri(format!("/admin/users/{}/images", bob_id))
                    .header(header::AUTHORIZATION, format!("Bearer {}", admin_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let images: Vec<ImageRef> = serde_json::from_slice(&body).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].content_key, uploaded.content_key);
    }

    #[tokio::test]
    async fn test_admin_image_listing_rejects_regular_users() {
        let (ctx, _dir) = create_test_context().await;
        let bob_id = register(&ctx, "bob").await;
        let token = login(&ctx, "bob").await;

        let response = server::build_router(ctx)
            .oneshot(
                Request::builder()
                    .uri(format!("/admin/users/{}/images", bob_id))
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
