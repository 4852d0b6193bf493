use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use task_rewards::{app, auth::TokenIssuer, catalog, config::Args, store::Store, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("task_rewards={},tower_http=info", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let tokens = match &args.jwt_secret {
        Some(secret) => TokenIssuer::new(secret, args.jwt_expiry_seconds)?,
        None => {
            warn!("No JWT_SECRET given, using the development secret");
            TokenIssuer::new_dev()
        }
    };

    let store = Store::open(&args.data_dir, args.lock_timeout())?;
    if args.seed_catalog && store.catalog().await.is_empty() {
        let rewards = catalog::default_catalog(Utc::now());
        info!(count = rewards.len(), "seeding reward catalog");
        store.add_catalog_rewards(rewards).await?;
    }

    let state = AppState::new(store, tokens);
    let app = app(state, args.static_dir.as_deref());

    info!("  Server running at http://{}", args.listen);
    info!("  API base:     http://{}/api", args.listen);
    if let Some(dir) = &args.static_dir {
        info!("  Static files: {}", dir.display());
    }

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
