use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use medcare_server::{
    auth::JwtKeys,
    build_app,
    config::Config,
    db, error,
    meeting::MeetingLinks,
    models::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config::from_env()?;
    error::expose_error_detail(!cfg.environment.is_production());

    let pool = db::connect_pg(&cfg.database_url, cfg.db_max_connections).await?;
    if cfg.run_migrations {
        db::run_migrations(&pool).await?;
    }

    tokio::fs::create_dir_all(&cfg.upload_dir)
        .await
        .with_context(|| format!("cannot create upload dir {}", cfg.upload_dir.display()))?;

    let meetings = MeetingLinks::new(cfg.meeting_base_url.clone());
    if cfg.meeting_base_url.is_none() {
        tracing::warn!("MEETING_BASE_URL not set; virtual consultations get no meeting link");
    }
    if cfg.admin_secret.is_none() {
        tracing::info!("ADMIN_SECRET not set; admin self-registration disabled");
    }

    let state = AppState {
        db: pool,
        jwt: Arc::new(JwtKeys::new(&cfg.jwt_secret, cfg.jwt_expires_in)),
        admin_secret: cfg.admin_secret.clone(),
        upload_dir: cfg.upload_dir.clone(),
        meetings,
    };

    let app = build_app(state);

    tracing::info!(environment = ?cfg.environment, "Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
