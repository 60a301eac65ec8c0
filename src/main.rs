/// Purrboard - cat gallery service
///
/// Proxies image listing and upload to a TheCatAPI-compatible backend
/// and serves votes and favourites through an optimistic engine:
/// speculative cache updates, rollback on failure, and coalescing of
/// burst user actions.

mod api;
mod config;
mod context;
mod engine;
mod error;
mod rate_limit;
mod remote;
mod server;

use config::ServerConfig;
use context::AppContext;
use error::GalleryResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> GalleryResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "purrboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Print banner
    print_banner();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = AppContext::new(config)?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    /\_/\
   ( o.o )    Purrboard Gallery v{}
    > ^ <
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
