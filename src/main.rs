//! Mosaic - social platform backend
//!
//! User accounts with a bounded, content-addressed profile-image pool:
//! registration and login, account confirmation and password reset over
//! email, and avatar lifecycle management backed by an object store.

mod api;
mod auth;
mod avatar;
mod config;
mod context;
mod db;
mod error;
mod mailer;
mod object_store;
mod server;
mod users;

use config::ServerConfig;
use context::AppContext;
use error::MosaicResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> MosaicResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mosaic_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    __  ___                  _
   /  |/  /___  _________ _(_)____
  / /|_/ / __ \/ ___/ __ `/ / ___/
 / /  / / /_/ (__  ) /_/ / / /__
/_/  /_/\____/____/\__,_/_/\___/

        Social platform backend v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
