use std::sync::Arc;

use anyhow::Context;
use bin_service::app::{build_router, AppState, SERVICE_NAME};
use bin_service::config::{load_config, JwtSettings, StoreBackend};
use bin_service::store::{BinStore, MemoryStore, NotificationStore, PgStore};
use common_auth::{JwtConfig, JwtVerifier};
use common_observability::BinMetrics;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;

    let (bins, notifications): (Arc<dyn BinStore>, Arc<dyn NotificationStore>) = match config.store {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;
            let pool = PgPool::connect(database_url)
                .await
                .context("Failed to connect to Postgres")?;
            if config.run_migrations {
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("Failed to apply migrations")?;
                info!("database migrations applied");
            }
            let store = Arc::new(PgStore::new(pool));
            (store.clone(), store)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory bin store; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
    };

    let jwt_verifier = build_jwt_verifier(&config.jwt).await?;
    spawn_jwks_refresh(jwt_verifier.clone(), &config.jwt);

    let metrics = Arc::new(BinMetrics::new().context("Failed to register metrics")?);
    let state = AppState::new(bins, notifications, jwt_verifier, metrics);
    let app = build_router(state, &config.cors_origins);

    info!(addr = %config.bind_addr, service = SERVICE_NAME, "starting");
    let listener = TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_jwt_verifier(settings: &JwtSettings) -> anyhow::Result<Arc<JwtVerifier>> {
    let config = JwtConfig::new(settings.issuer.clone(), settings.audience.clone())
        .with_leeway(settings.leeway_secs);
    let mut builder = JwtVerifier::builder(config);

    if let Some(url) = &settings.jwks_url {
        info!(jwks_url = %url, "Configuring JWKS fetcher");
        builder = builder.with_jwks_url(url.clone());
    }

    if let Some(pem) = &settings.dev_public_key_pem {
        warn!("Using JWT_DEV_PUBLIC_KEY_PEM for verification; do not enable in production");
        builder = builder
            .with_rsa_pem("local-dev", pem.as_bytes())
            .map_err(anyhow::Error::from)?;
    }

    if let Some(secret) = &settings.hs256_secret {
        builder = builder.with_hmac_secret(secret.as_bytes());
    }

    if !settings.has_key_source() {
        warn!("No JWT key source configured; bin writes will be rejected with 401");
    }

    let verifier = builder.build().await.map_err(anyhow::Error::from)?;
    info!("JWT verifier initialised");
    Ok(Arc::new(verifier))
}

fn spawn_jwks_refresh(verifier: Arc<JwtVerifier>, settings: &JwtSettings) {
    let Some(fetcher) = verifier.jwks_fetcher() else {
        return;
    };
    let url = fetcher.url().to_owned();
    let period = settings.jwks_refresh;

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately and build() already fetched once.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match verifier.refresh_jwks().await {
                Ok(count) => {
                    debug!(count, jwks_url = %url, "Refreshed JWKS keys");
                }
                Err(err) => {
                    warn!(error = %err, jwks_url = %url, "Failed to refresh JWKS keys");
                }
            }
        }
    });
}
