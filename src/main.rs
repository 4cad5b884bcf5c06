/// Drops - signed message ingestion and distribution server
///
/// Accepts signed, timestamped message envelopes, appends them to
/// per-user content-addressed logs, and serves feed/thread queries
/// from a relational index.

mod api;
mod config;
mod content_store;
mod context;
mod crypto;
mod db;
mod discovery;
mod enrollment;
mod envelope;
mod error;
mod pipeline;
mod server;

use config::ServerConfig;
use context::AppContext;
use error::DropsResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> DropsResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drops=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let config = ServerConfig::from_env()?;
    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
        ____
       / __ \_________  ____  _____
      / / / / ___/ __ \/ __ \/ ___/
     / /_/ / /  / /_/ / /_/ (__  )
    /_____/_/   \____/ .___/____/
                    /_/

        Signed message distribution server v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
