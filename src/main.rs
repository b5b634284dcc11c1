//! Cavemap Backend - cavern map read API with JWT authentication
//! Mission: Serve cavern/link map data and manage the token lifecycle

use anyhow::{Context, Result};
use cavemap_backend::{
    auth::{AuthState, RefreshTokenStore, TokenService, UserStore},
    location::{LocationState, LocationStore},
    routes::create_router,
};
use chrono::{Duration, Utc};
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("Cavemap backend starting");

    let db_path = resolve_data_path(env::var("CAVEMAP_DB_PATH").ok(), "cavemap.db");
    let jwt_secret = env::var("JWT_SECRET")
        .unwrap_or_else(|_| "dev-secret-change-in-production-minimum-32-characters".to_string());

    let access_ttl_minutes = env::var("ACCESS_TOKEN_TTL_MINUTES")
        .unwrap_or_else(|_| "30".to_string())
        .parse::<i64>()
        .context("Invalid ACCESS_TOKEN_TTL_MINUTES")?;
    let refresh_ttl_days = env::var("REFRESH_TOKEN_TTL_DAYS")
        .unwrap_or_else(|_| "7".to_string())
        .parse::<i64>()
        .context("Invalid REFRESH_TOKEN_TTL_DAYS")?;

    let users = Arc::new(UserStore::new(&db_path)?);
    let consumed = Arc::new(RefreshTokenStore::new(&db_path)?);
    let tokens = Arc::new(
        TokenService::new(jwt_secret).with_ttls(access_ttl_minutes, refresh_ttl_days),
    );
    let location_store = Arc::new(LocationStore::new(&db_path)?);

    info!("Database initialized at: {}", db_path);

    bootstrap_superuser(&users)?;

    // Housekeeping: drop consumed-refresh records old enough that their
    // tokens already fail expiry validation
    tokio::spawn(denylist_purge_loop(consumed.clone(), refresh_ttl_days));

    let auth_state = AuthState::new(users, consumed, tokens);
    let location_state = LocationState {
        store: location_store,
    };

    let app = create_router(auth_state, location_state);

    let addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Create the initial superuser from env if configured and not yet present
fn bootstrap_superuser(users: &UserStore) -> Result<()> {
    let (Ok(email), Ok(password)) = (
        env::var("CAVEMAP_SUPERUSER_EMAIL"),
        env::var("CAVEMAP_SUPERUSER_PASSWORD"),
    ) else {
        return Ok(());
    };

    if users.get_by_email(&email)?.is_some() {
        return Ok(());
    }

    users.create_superuser(&email, &password)?;
    info!("Bootstrapped superuser {}", email);

    Ok(())
}

async fn denylist_purge_loop(consumed: Arc<RefreshTokenStore>, refresh_ttl_days: i64) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3600));
    loop {
        ticker.tick().await;
        let cutoff = Utc::now() - Duration::days(refresh_ttl_days);
        match consumed.purge_consumed_before(cutoff) {
            Ok(0) => {}
            Ok(n) => info!("Purged {} stale consumed-refresh records", n),
            Err(e) => warn!("Denylist purge failed: {}", e),
        }
    }
}

/// Initialize tracing with env-filter overrides
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cavemap_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return base.join(default_filename).to_string_lossy().to_string();
    };

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }

    // Treat relative paths as relative to the crate dir, not the caller's cwd
    base.join(p).to_string_lossy().to_string()
}

fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // Also try the crate-local .env when running with --manifest-path from
    // elsewhere
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let local = manifest_dir.join(".env");
    if local.exists() {
        let _ = dotenv::from_path(&local);
    }
}
