use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use geocat_db_postgres::{PostgresConfig, PostgresStorage};
use geocat_storage::DynStorage;

use crate::auth::AuthService;
use crate::cache::{CacheTtls, CatalogCache};
use crate::config::{AppConfig, UploadsConfig};
use crate::handlers;
use crate::middleware as app_middleware;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: DynStorage,
    pub cache: Arc<CatalogCache>,
    pub auth: Arc<AuthService>,
    pub uploads: UploadsConfig,
}

/// Builds the full application: storage backend, cache, auth, router.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let pg = cfg
        .storage
        .postgres
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("storage.postgres config is required"))?;

    let pg_config = PostgresConfig::new(pg.connection_url())
        .with_pool_size(pg.pool_size)
        .with_connect_timeout_ms(pg.connect_timeout_ms)
        .with_run_migrations(pg.run_migrations);

    let storage: DynStorage = Arc::new(PostgresStorage::new(pg_config).await?);

    let backend = crate::create_cache_backend(cfg).await;
    let cache = Arc::new(CatalogCache::new(backend, CacheTtls::from(&cfg.cache)));

    let state = AppState {
        storage,
        cache,
        auth: Arc::new(AuthService::new(cfg.auth.clone())),
        uploads: cfg.uploads.clone(),
    };

    Ok(build_router(state, cfg))
}

/// Builds the router for an already-constructed state. Kept separate from
/// [`build_app`] so tests can inject their own storage and cache backend.
pub fn build_router(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;

    let admin_routes = Router::new()
        .route(
            "/types",
            get(handlers::admin::list_types).post(handlers::admin::create_type),
        )
        .route(
            "/types/{id}",
            axum::routing::put(handlers::admin::update_type).delete(handlers::admin::delete_type),
        )
        .route(
            "/epochs",
            get(handlers::admin::list_epochs).post(handlers::admin::create_epoch),
        )
        .route(
            "/epochs/{id}",
            axum::routing::put(handlers::admin::update_epoch).delete(handlers::admin::delete_epoch),
        )
        .route(
            "/points",
            get(handlers::admin::list_points).post(handlers::admin::create_point),
        )
        .route(
            "/points/{id}",
            axum::routing::put(handlers::admin::update_point).delete(handlers::admin::delete_point),
        )
        .route("/admin-divisions", get(handlers::admin::list_admin_divisions))
        .route(
            "/documents",
            get(handlers::admin::list_documents).post(handlers::admin::upload_document),
        )
        .route(
            "/documents/{id}",
            axum::routing::delete(handlers::admin::delete_document),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::require_auth,
        ));

    let cors = match cfg
        .server
        .cors_origin
        .as_deref()
        .and_then(|origin| origin.parse::<HeaderValue>().ok())
    {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        None => CorsLayer::permissive(),
    };

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        // Public map API
        .route("/api/points", get(handlers::public::get_points))
        .route("/api/points/{id}", get(handlers::public::get_point_info))
        .route("/api/data", get(handlers::public::get_data))
        .route("/api/adminAreas", get(handlers::public::get_admin_areas))
        .route("/api/check-location", get(handlers::public::check_location))
        .route("/api/filters", get(handlers::public::get_filters))
        .route(
            "/api/documents/{id}/download",
            get(handlers::public::download_document),
        )
        // Authentication
        .route("/api/auth/login", post(crate::auth::login))
        // Protected admin API
        .nest("/api/admin", admin_routes)
        .with_state(state)
        // Middleware stack (order: request id -> compression/cors/trace -> body limit)
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                let req_id = req
                    .extensions()
                    .get::<axum::http::HeaderValue>()
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    http.method = %method,
                    http.target = %uri,
                    request_id = %req_id
                )
            }),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct GeocatServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<GeocatServer> {
        let app = build_app(&self.config).await?;

        Ok(GeocatServer {
            addr: self.addr,
            app,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GeocatServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
