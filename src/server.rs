//! HTTP surface for the question pipeline.
//!
//! | Route | Method | Response |
//! |-------|--------|----------|
//! | `/` | GET | welcome message |
//! | `/healthz` | GET | `ok` |
//! | `/ask/`, `/ask` | POST | `{generated_sql, result}` or `500 {error}` |

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post}
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    error::{AppError, AppResult, config_error, error_detail},
    service::QueryService,
    translator::TextGenerator
};

pub const WELCOME: &str = "🏏 Welcome to the IPL SQL Chatbot API! Post questions at /ask/";

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String
}

/// Failure envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String
}

/// Routes with permissive CORS and request tracing
pub fn build_router<G>(service: Arc<QueryService<G>>) -> Router
where
    G: TextGenerator + Send + Sync + 'static
{
    Router::new()
        .route("/", get(welcome))
        .route("/healthz", get(healthz))
        .route("/ask/", post(ask::<G>))
        .route("/ask", post(ask::<G>))
        .with_state(service)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until the process is stopped
pub async fn serve<G>(addr: &str, service: QueryService<G>) -> AppResult<()>
where
    G: TextGenerator + Send + Sync + 'static
{
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| config_error(format!("Invalid listen address '{}': {}", addr, e)))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;
    info!(%addr, "listening");
    axum::serve(listener, build_router(Arc::new(service)))
        .await
        .map_err(|e| AppError::internal(format!("HTTP server exited: {}", e)))
}

async fn welcome() -> Json<serde_json::Value> {
    Json(json!({ "message": WELCOME }))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ask<G>(
    State(service): State<Arc<QueryService<G>>>,
    Json(request): Json<AskRequest>
) -> Response
where
    G: TextGenerator + Send + Sync + 'static
{
    match service.ask(&request.question).await {
        Ok(answer) => Json(answer).into_response(),
        Err(e) => error_response(&e)
    }
}

fn error_response(err: &AppError) -> Response {
    let detail = error_detail(err);
    error!(error = %detail, "question failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: detail
        })
    )
        .into_response()
}
