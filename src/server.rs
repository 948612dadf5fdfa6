//! HTTP dispatcher exposing harvest runs.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::logging::HarvestLogger;
use crate::pipeline::Harvester;
use crate::session::SessionProvider;
use crate::types::Record;

pub const START_ROUTE: &str = "/api/automation/start";
pub const HEALTH_ROUTE: &str = "/health";

/// Body of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutomationResponse {
    pub status: String,
    pub message: String,
    pub data: Vec<Record>,
}

impl AutomationResponse {
    pub fn completed(data: Vec<Record>) -> Self {
        Self {
            status: "success".to_string(),
            message: "Automation completed".to_string(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}

pub struct AppState<P> {
    harvester: Harvester<P>,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            harvester: self.harvester.clone(),
        }
    }
}

/// Build the router with request logging applied to every route.
pub fn router<P>(harvester: Harvester<P>) -> Router
where
    P: SessionProvider + 'static,
{
    let logger = Arc::clone(harvester.logger());
    let state = AppState { harvester };

    Router::new()
        .route(START_ROUTE, post(start_automation::<P>))
        .route(HEALTH_ROUTE, get(health))
        .layer(middleware::from_fn_with_state(logger, log_requests))
        .with_state(state)
}

async fn log_requests(
    State(logger): State<Arc<HarvestLogger>>,
    request: Request,
    next: Next,
) -> Response {
    logger.http(
        format!("{} {}", request.method(), request.uri()),
        Some("http"),
        None,
    );
    next.run(request).await
}

async fn start_automation<P>(State(state): State<AppState<P>>) -> Response
where
    P: SessionProvider + 'static,
{
    match state.harvester.run().await {
        Ok(run) => Json(AutomationResponse::completed(run.records)).into_response(),
        Err(err) => {
            state.harvester.logger().error(
                format!("automation failed: {err}"),
                Some("http"),
                None,
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "Automation failed").into_response()
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Serve on `0.0.0.0:{port}` until `shutdown` resolves, then drain.
pub async fn serve<P, F>(harvester: Harvester<P>, port: u16, shutdown: F) -> std::io::Result<()>
where
    P: SessionProvider + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let logger = Arc::clone(harvester.logger());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    logger.info(format!("listening on {addr}"), Some("server"), None);

    axum::serve(listener, router(harvester))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolve on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal(logger: Arc<HarvestLogger>) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            logger.error(
                format!("failed to listen for SIGINT: {err}"),
                Some("server"),
                None,
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                logger.error(
                    format!("failed to listen for SIGTERM: {err}"),
                    Some("server"),
                    None,
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    logger.info("shutdown signal received", Some("server"), None);
}
