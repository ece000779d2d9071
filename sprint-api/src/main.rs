//! TechSprint API Server Entry Point
//!
//! Wires Postgres, the cache backend and the HTTP collaborators into the
//! domain services, spawns the file sweep and serves the router.

use std::sync::Arc;

use axum::Router;
use sprint_core::SprintError;
use sprint_lifecycle::{LogMailer, MailSender, Services};
use sprint_storage::{
    CacheBackend, CacheConfig, InMemoryObjectStore, MemoryCacheBackend, ObjectStore,
    ReadThroughCache, RedisCacheBackend,
};
use tokio::sync::watch;

use sprint_api::telemetry::{init_tracer, TelemetryConfig};
use sprint_api::{
    create_api_router, file_sweep_task, ApiConfig, ApiError, ApiResult, AppState, CacheSettings,
    CollaboratorConfig, DbConfig, FileSweepConfig, HttpMailer, HttpObjectStore, PgStore,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    let db_config = DbConfig::from_env();
    let cache_settings = CacheSettings::from_env();
    let collaborators = CollaboratorConfig::from_env();
    let sweep_config = FileSweepConfig::from_env();

    let store = PgStore::from_config(&db_config)?;
    store.migrate().await?;
    tracing::info!(host = %db_config.host, dbname = %db_config.dbname, "Postgres schema ready");

    let cache = build_cache(&cache_settings).await;
    let objects = build_object_store(&collaborators)?;
    let mailer = build_mailer(&collaborators)?;

    let services = Services::new(
        Arc::new(store),
        objects,
        cache,
        mailer,
        sweep_config.policy(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_handle = if sweep_config.enabled {
        Some(tokio::spawn(file_sweep_task(
            services.files.clone(),
            sweep_config,
            shutdown_rx,
        )))
    } else {
        tracing::info!("File sweep disabled");
        None
    };

    let state = Arc::new(AppState::new(services));
    let app: Router = create_api_router(state, &api_config);

    let addr = api_config
        .socket_addr()
        .map_err(|e| ApiError::invalid_input(e.to_string()))?;
    tracing::info!(%addr, "Starting TechSprint API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweep_handle {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "File sweep task ended abnormally");
        }
    }

    Ok(())
}

/// Redis when configured and reachable, the in-process cache otherwise.
async fn build_cache(settings: &CacheSettings) -> ReadThroughCache {
    let config = CacheConfig {
        entry_ttl: Some(settings.entry_ttl),
    };

    let backend: Arc<dyn CacheBackend> = match &settings.redis_url {
        Some(url) => match RedisCacheBackend::connect(url, settings.key_prefix.clone()).await {
            Ok(redis) => {
                tracing::info!("Using Redis cache backend");
                Arc::new(redis)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unreachable, falling back to in-process cache");
                Arc::new(MemoryCacheBackend::new())
            }
        },
        None => {
            tracing::info!("Using in-process cache backend");
            Arc::new(MemoryCacheBackend::new())
        }
    };

    ReadThroughCache::new(backend, config)
}

fn build_object_store(config: &CollaboratorConfig) -> ApiResult<Arc<dyn ObjectStore>> {
    match &config.object_store_url {
        Some(url) => {
            let store = HttpObjectStore::new(
                url.clone(),
                config.object_store_token.clone(),
                config.http_timeout,
            )
            .map_err(SprintError::from)?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("SPRINT_OBJECT_STORE_URL unset, keeping uploads in memory");
            Ok(Arc::new(InMemoryObjectStore::new()))
        }
    }
}

fn build_mailer(config: &CollaboratorConfig) -> ApiResult<Arc<dyn MailSender>> {
    match &config.mail_url {
        Some(url) => {
            let mailer = HttpMailer::new(
                url.clone(),
                config.mail_token.clone(),
                config.mail_from.clone(),
                config.http_timeout,
            )
            .map_err(SprintError::from)?;
            Ok(Arc::new(mailer))
        }
        None => {
            tracing::warn!("SPRINT_MAIL_URL unset, confirmation mail is only logged");
            Ok(Arc::new(LogMailer))
        }
    }
}
