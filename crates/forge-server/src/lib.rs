pub mod config;
pub mod spool;

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use forge_ai::backend::ChatBackend;
use forge_ai::pipeline::{DesignRequest, Orchestrator, PipelineConfig, SessionError, SessionOutcome};
use forge_geom::to_binary_stl;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::spool::SpoolFile;

pub struct AppState<B: ChatBackend> {
    orchestrator: Orchestrator<B>,
    spool_dir: PathBuf,
    static_dir: PathBuf,
}

impl<B: ChatBackend> AppState<B> {
    pub fn new(
        backend: B,
        config: PipelineConfig,
        spool_dir: PathBuf,
        static_dir: PathBuf,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(backend, config),
            spool_dir,
            static_dir,
        }
    }
}

pub fn app<B: ChatBackend + 'static>(state: Arc<AppState<B>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate::<B>))
        .nest_service("/view", ServeDir::new(&state.static_dir))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    prompt: String,
    base_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    status: &'static str,
    artifact_data: String,
    code: String,
    analysis: AnalysisJson,
}

#[derive(Debug, Serialize)]
struct AnalysisJson {
    volume: f64,
    warning: Option<String>,
    plan: String,
    errors: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    errors: Vec<String>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    fn unprocessable(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
            errors,
        }
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            errors: Vec::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                errors: self.errors,
            }),
        )
            .into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn generate<B: ChatBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request: GenerateRequest = parse_json(&body)?;
    if request.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt must not be empty"));
    }

    let design = DesignRequest {
        prompt: request.prompt,
        base_code: request.base_code,
    };

    let outcome = match state.orchestrator.run(&design).await {
        Ok(outcome) => outcome,
        Err(SessionError::AgentUnavailable(reason)) => {
            return Err(ApiError::bad_gateway(format!(
                "chat backend unavailable: {reason}"
            )));
        }
        Err(SessionError::ExhaustedRetries { attempts, failures }) => {
            let errors = failures
                .iter()
                .map(|failure| format!("attempt {}: {}", failure.attempt, failure.message))
                .collect();
            return Err(ApiError::unprocessable(
                format!("failed to produce a valid part after {attempts} attempt(s)"),
                errors,
            ));
        }
    };

    let artifact = export_artifact(&state, &outcome)?;
    Ok(Json(success_response(outcome, &artifact)))
}

/// Spools the STL to a per-session file and reads it back; the guard removes
/// the file on every exit path. A fault here is an export fault, distinct
/// from a generation failure.
fn export_artifact<B: ChatBackend>(
    state: &AppState<B>,
    outcome: &SessionOutcome,
) -> Result<Vec<u8>, ApiError> {
    let stl = to_binary_stl(outcome.solid.mesh(), "part");
    let spool = SpoolFile::create(&state.spool_dir);
    spool
        .write(&stl)
        .and_then(|_| spool.read_back())
        .map_err(|err| {
            ApiError::internal(format!(
                "artifact export failed at {}: {err}",
                spool.path().display()
            ))
        })
}

fn success_response(outcome: SessionOutcome, artifact: &[u8]) -> GenerateResponse {
    GenerateResponse {
        status: "success",
        artifact_data: BASE64.encode(artifact),
        code: outcome.source,
        analysis: AnalysisJson {
            volume: round2(outcome.report.volume),
            warning: outcome.report.warning,
            plan: outcome.plan,
            errors: outcome
                .failures
                .iter()
                .map(|failure| format!("attempt {}: {}", failure.attempt, failure.message))
                .collect(),
        },
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("request body is required"));
    }

    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("invalid JSON body: {err}")))
}
