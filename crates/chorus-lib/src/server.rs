//! HTTP API for the chorus synthesis relay.
//!
//! CORS-permissive so browser clients on other origins can fetch audio
//! directly. Engine failures never become HTTP errors on `/api/tts`; the
//! client is told to fall back to its own speech synthesis instead.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use chorus_core::error::ValidationError;
use chorus_core::text_prep::{clean_text_for_speech, truncate_chars};
use chorus_core::types::{AudioResult, EngineKind, StatusReport, SynthesisOutcome};

use crate::orchestrator::Orchestrator;

/// Header naming the engine that produced the audio.
pub const ENGINE_HEADER: &str = "x-tts-engine";

const FALLBACK_MESSAGE: &str = "All speech engines failed; use browser speech synthesis";

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    clean_text: bool,
}

/// Build the axum router around a shared [`Orchestrator`].
pub fn router(orchestrator: Arc<Orchestrator>, clean_text: bool) -> Router {
    let state = AppState {
        orchestrator,
        clean_text,
    };
    Router::new()
        .route("/api/tts", post(synthesize))
        .route("/api/tts/", post(synthesize))
        .route("/api/tts/offline", post(synthesize_offline))
        .route("/api/tts/offline/", post(synthesize_offline))
        .route("/api/tts/neural", post(synthesize_neural))
        .route("/api/tts/neural/", post(synthesize_neural))
        .route("/api/tts/status", get(status))
        .route("/api/tts/status/", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Request / response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FallbackResponse {
    pub use_browser_tts: bool,
    pub text: String,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine: Option<&'a str>,
}

// ─── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{engine} engine unavailable: {reason}")]
    EngineUnavailable { engine: String, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(ValidationError::MalformedBody(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Validation(e) => {
                let msg = e.to_string();
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorBody {
                        error: &msg,
                        engine: None,
                    }),
                )
                    .into_response()
            }
            ApiError::EngineUnavailable { engine, .. } => {
                let msg = self.to_string();
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ErrorBody {
                        error: &msg,
                        engine: Some(engine.as_str()),
                    }),
                )
                    .into_response()
            }
            ApiError::Internal(detail) => {
                error!("api: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: "internal server error",
                        engine: None,
                    }),
                )
                    .into_response()
            }
        }
    }
}

// ─── Handlers ──────────────────────────────────────────────────────────────

async fn synthesize(
    State(state): State<AppState>,
    body: Result<Json<SynthesizeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let submitted = body?.0.text;
    let text = state.speakable(&submitted);
    match state.orchestrator.synthesize(&text).await? {
        SynthesisOutcome::Success { engine, audio } => audio_response(&engine, audio),
        // Echo the submitted text, not the cleaned one.
        SynthesisOutcome::Unavailable { .. } => Ok(Json(FallbackResponse {
            use_browser_tts: true,
            text: truncate_chars(&submitted, state.orchestrator.max_text_chars()).to_string(),
            message: FALLBACK_MESSAGE.to_string(),
        })
        .into_response()),
    }
}

async fn synthesize_offline(
    State(state): State<AppState>,
    body: Result<Json<SynthesizeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    state.single_engine(EngineKind::Offline, body?.0).await
}

async fn synthesize_neural(
    State(state): State<AppState>,
    body: Result<Json<SynthesizeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    state.single_engine(EngineKind::Neural, body?.0).await
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.orchestrator.status().await)
}

impl AppState {
    fn speakable(&self, text: &str) -> String {
        if self.clean_text {
            clean_text_for_speech(text)
        } else {
            text.to_string()
        }
    }

    async fn single_engine(
        &self,
        kind: EngineKind,
        req: SynthesizeRequest,
    ) -> Result<Response, ApiError> {
        let text = self.speakable(&req.text);
        match self.orchestrator.synthesize_with(kind.as_str(), &text).await? {
            SynthesisOutcome::Success { engine, audio } => audio_response(&engine, audio),
            SynthesisOutcome::Unavailable { failures, .. } => {
                let reason = failures
                    .into_iter()
                    .next()
                    .map(|f| f.reason)
                    .unwrap_or_else(|| "no attempt made".to_string());
                Err(ApiError::EngineUnavailable {
                    engine: kind.as_str().to_string(),
                    reason,
                })
            }
        }
    }
}

fn audio_response(engine: &str, audio: AudioResult) -> Result<Response, ApiError> {
    let disposition = format!("inline; filename=\"{}\"", audio.suggested_filename());
    let engine = HeaderValue::from_str(engine).map_err(|e| ApiError::Internal(e.to_string()))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, audio.mime_type())
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(ENGINE_HEADER, engine)
        .body(Body::from(audio.bytes))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
