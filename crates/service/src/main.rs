use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, routing::post, Json, Router};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use asklegal_rag::{AnswerError, AnswerRequest, AnswerResponse, AnswerService, Bootstrap};

#[derive(Clone)]
struct AppState {
    service: Arc<AnswerService>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let service = Bootstrap::default().build_service().await?;
    let state = AppState {
        service: Arc::new(service),
    };
    let app = router(state);
    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/answer", post(handle_answer))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    remote_available: bool,
    rate_table: String,
    rate_tables: Vec<String>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health(&state.service))
}

fn health(service: &AnswerService) -> HealthResponse {
    let router = service.router();
    let engine = router.engine();
    HealthResponse {
        status: "ok",
        remote_available: router.remote_available(),
        rate_table: engine.default_version().to_string(),
        rate_tables: engine.versions().map(str::to_string).collect(),
    }
}

async fn handle_answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let response = state.service.answer(request).await?;
    Ok(Json(response))
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Answer(AnswerError::MalformedQuery(_)) => StatusCode::BAD_REQUEST,
            AppError::Answer(AnswerError::Generation { .. }) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("answer_failed" = %self);
        } else {
            warn!("answer_rejected" = %self);
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asklegal_rag::{AdapterError, Strategy};

    #[test]
    fn malformed_query_is_bad_request() {
        let err = AppError::from(AnswerError::MalformedQuery("query text is empty"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn generation_failure_is_bad_gateway() {
        let err = AppError::from(AnswerError::Generation {
            strategy: Strategy::LocalModel,
            source: AdapterError::Provider("down".to_string()),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn health_lists_rate_tables() {
        let boot = Bootstrap {
            config_path: Some("does/not/exist.toml".into()),
            corpus_path: Some("does/not/exist.jsonl".into()),
        };
        let service = boot.build_service().await.unwrap();
        let health = health(&service);
        assert_eq!(health.rate_table, "FY2024-25");
        assert_eq!(health.rate_tables, vec!["FY2024-25".to_string()]);
    }
}
