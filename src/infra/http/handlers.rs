use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    application::error::ErrorReport,
    domain::{
        documents::DEFAULT_DOCUMENT_NAME, engine::EngineChoice, outcome::CompilationOutcome,
    },
};

use super::{HttpState, error::ApiError};

#[derive(Debug, Serialize, Deserialize)]
pub struct FilesResponse {
    pub files: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileContentResponse {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SaveFileRequest {
    pub filename: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CompileRequest {
    pub filename: Option<String>,
    pub engine: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EngineStatus {
    pub engine: String,
    pub path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnginesResponse {
    pub default: String,
    pub engines: Vec<EngineStatus>,
}

pub async fn list_files(State(state): State<HttpState>) -> Result<Json<FilesResponse>, ApiError> {
    let files = state.documents.list().await?;
    Ok(Json(FilesResponse { files }))
}

pub async fn get_file(
    State(state): State<HttpState>,
    Path(filename): Path<String>,
) -> Result<Json<FileContentResponse>, ApiError> {
    let content = state.documents.read(&filename).await?;
    Ok(Json(FileContentResponse { content }))
}

pub async fn save_file(
    State(state): State<HttpState>,
    Json(request): Json<SaveFileRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let document = state
        .documents
        .save(
            request.filename.as_deref(),
            request.content.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(MessageResponse {
        message: "File saved".to_string(),
        filename: Some(document.to_string()),
    }))
}

pub async fn delete_file(
    State(state): State<HttpState>,
    Path(filename): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.documents.delete(&filename).await?;
    Ok(Json(MessageResponse {
        message: "File deleted".to_string(),
        filename: None,
    }))
}

pub async fn compile(
    State(state): State<HttpState>,
    Json(request): Json<CompileRequest>,
) -> Result<Response, ApiError> {
    let filename = request.filename.as_deref().unwrap_or(DEFAULT_DOCUMENT_NAME);
    let engine = request.engine.as_deref().unwrap_or_default();
    let outcome = state.compiler.compile(filename, engine).await?;

    let status = outcome_status(&outcome);
    let mut response = (status, Json(&outcome)).into_response();
    if !outcome.is_success() {
        ErrorReport::from_message(
            "infra::http::compile",
            status,
            format!("compile outcome `{}` for `{filename}`", outcome.kind()),
        )
        .attach(&mut response);
    }
    Ok(response)
}

pub async fn get_pdf(
    State(state): State<HttpState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let (_artifact, bytes) = state.documents.read_artifact(&filename).await?;
    let mut response = bytes.into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    Ok(response)
}

pub async fn engines(State(state): State<HttpState>) -> Json<EnginesResponse> {
    let locator = state.compiler.locator();
    let engines = EngineChoice::ALL
        .into_iter()
        .map(|kind| EngineStatus {
            engine: kind.executable().to_string(),
            path: locator
                .locate(kind)
                .map(|handle| handle.path.display().to_string()),
        })
        .collect();
    Json(EnginesResponse {
        default: state.compiler.default_engine().executable().to_string(),
        engines,
    })
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Transport status for each outcome; only `Success` is a 2xx.
pub fn outcome_status(outcome: &CompilationOutcome) -> StatusCode {
    match outcome {
        CompilationOutcome::Success { .. } => StatusCode::OK,
        CompilationOutcome::Timeout => StatusCode::GATEWAY_TIMEOUT,
        CompilationOutcome::EngineNotFound { .. }
        | CompilationOutcome::CompilationFailed { .. }
        | CompilationOutcome::ArtifactMissing { .. }
        | CompilationOutcome::SystemError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
