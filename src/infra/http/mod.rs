mod error;
pub mod handlers;
mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
};

pub use error::ApiError;

use crate::application::{compile::CompileService, documents::DocumentService};

pub use middleware::REQUEST_ID_HEADER;

#[derive(Clone)]
pub struct HttpState {
    pub documents: Arc<DocumentService>,
    pub compiler: Arc<CompileService>,
}

pub fn build_router(state: HttpState, max_request_bytes: usize) -> Router {
    Router::new()
        .route("/api/files", get(handlers::list_files))
        .route("/api/file", post(handlers::save_file))
        .route("/api/file/{filename}", get(handlers::get_file))
        .route("/api/delete/{filename}", delete(handlers::delete_file))
        .route("/api/compile", post(handlers::compile))
        .route("/api/pdf/{filename}", get(handlers::get_pdf))
        .route("/api/engines", get(handlers::engines))
        .route("/_health", get(handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(axum_middleware::from_fn(middleware::trace_requests))
}
