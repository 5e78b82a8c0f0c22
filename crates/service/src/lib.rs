use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task;
use tracing::{error, info};

use docqa_core::DocQaConfig;
use docqa_index::{NamespaceKey, NamespaceStore};
use docqa_llm::InferenceConfig;
use docqa_rag::{EmbeddingClient, Inference, QaPipeline, Retriever, SubprocessInference};

pub const MISSING_FIELDS_MESSAGE: &str =
    "Fields 'question', 'organization', and 'entity' are required.";
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Only POST method allowed";

pub struct AppState {
    pub store: NamespaceStore,
    pub embedder: EmbeddingClient,
    pub inference: Arc<dyn Inference>,
    pub top_k: usize,
}

impl AppState {
    pub fn from_config(config: &DocQaConfig) -> anyhow::Result<Self> {
        Ok(Self {
            store: NamespaceStore::new(config.index_root()),
            embedder: EmbeddingClient::from_config(&config.embedding)?,
            inference: Arc::new(SubprocessInference::new(InferenceConfig::from_section(
                &config.inference,
            ))),
            top_k: config.top_k,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/query",
            post(handle_query).fallback(method_not_allowed),
        )
        .with_state(state)
}

/// Every field is optional at the JSON level so a missing field is reported
/// as a validation failure rather than a malformed body.
#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    pub question: Option<String>,
    pub organization: Option<String>,
    pub entity: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn handle_query(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(request) = body.map_err(|rejection| {
        info!(reason = %rejection.body_text(), "rejected query body");
        AppError::bad_request(INVALID_JSON_MESSAGE)
    })?;
    let (question, key) = validate(&request)?;
    info!(namespace = %key, "query received");
    let answer = task::spawn_blocking(move || {
        let pipeline = QaPipeline::new(
            Retriever::new(&state.store, &state.embedder),
            state.inference.as_ref(),
            state.top_k,
        );
        pipeline.answer(&question, &key)
    })
    .await
    .map_err(AppError::internal)??;
    Ok(Json(QueryResponse {
        answer: answer.answer,
    }))
}

fn validate(request: &QueryRequest) -> Result<(String, NamespaceKey), AppError> {
    let field = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let (Some(question), Some(organization), Some(entity)) = (
        field(&request.question),
        field(&request.organization),
        field(&request.entity),
    ) else {
        return Err(AppError::bad_request(MISSING_FIELDS_MESSAGE));
    };
    let key = NamespaceKey::new(&organization, &entity).map_err(AppError::bad_request)?;
    Ok((question, key))
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn bad_request<E: ToString>(msg: E) -> Self {
        Self::BadRequest(msg.to_string())
    }

    fn internal<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                METHOD_NOT_ALLOWED_MESSAGE.to_string(),
            ),
            AppError::Internal(err) => {
                let detail = format!("{err:#}");
                error!(error = %detail, "query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
