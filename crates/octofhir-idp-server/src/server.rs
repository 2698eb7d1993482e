use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{Router, extract::DefaultBodyLimit, http::StatusCode, routing::get};
use octofhir_idp::{IdpState, IdpStores, router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::seed;

/// Mounts the provider routes plus `/healthz` and wraps them in the
/// request tracing, CORS, and body limit layers.
pub fn build_app(cfg: &AppConfig, state: IdpState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    router(state)
        .route("/healthz", get(healthz))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            use tracing::field::Empty;
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri().path(),
                                http.status_code = Empty
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

pub struct ServerBuilder {
    config: AppConfig,
    stores: Option<IdpStores>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            stores: None,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Uses an existing storage backend instead of fresh in-memory storage.
    pub fn with_stores(mut self, stores: IdpStores) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Validates the configuration, seeds storage, and makes sure a signing
    /// key exists before any request is served.
    pub async fn build(self) -> anyhow::Result<IdpServer> {
        let cfg = self.config;
        cfg.validate().map_err(anyhow::Error::msg)?;

        let stores = self.stores.unwrap_or_else(IdpStores::in_memory);
        let summary = seed::seed(&stores, &cfg).await?;
        tracing::info!(
            clients = summary.clients,
            users = summary.users,
            initial_access_tokens = summary.initial_access_tokens,
            "storage seeded"
        );

        let state = IdpState::new(&stores, cfg.idp.clone());
        let kid = state.keys.ensure_active_key().await?;
        tracing::info!(kid = %kid, issuer = %state.config.issuer_base(), "signing key ready");

        let app = build_app(&cfg, state.clone());
        Ok(IdpServer {
            addr: cfg.addr(),
            app,
            stores,
            state,
            housekeeping_interval: cfg.housekeeping.interval,
        })
    }
}

pub struct IdpServer {
    addr: SocketAddr,
    app: Router,
    stores: IdpStores,
    state: IdpState,
    housekeeping_interval: Duration,
}

impl IdpServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `shutdown` resolves. Background
    /// housekeeping and key rotation run for as long as the server does.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("listening on {}", listener.local_addr()?);

        let mut tasks = vec![spawn_housekeeping(
            self.stores.clone(),
            self.housekeeping_interval,
        )];
        if let Some(every) = self.state.config.signing.rotation_interval {
            tasks.push(spawn_key_rotation(self.state.clone(), every));
        }

        let result = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await;

        for task in tasks {
            task.abort();
        }
        result?;
        Ok(())
    }
}

fn spawn_housekeeping(stores: IdpStores, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match stores.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "expired records removed"),
                Err(e) => tracing::warn!(error = %e, "housekeeping failed"),
            }
        }
    })
}

fn spawn_key_rotation(state: IdpState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match state.keys.rotate().await {
                Ok(kid) => tracing::info!(kid = %kid, "signing key rotated"),
                Err(e) => tracing::error!(error = %e, "signing key rotation failed"),
            }
        }
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
