#![cfg(unix)]

mod support;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use offtex::{
    application::compile::CompileOptions,
    domain::engine::EngineChoice,
    infra::http::{HttpState, REQUEST_ID_HEADER, build_router},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use support::{CountingRunner, WRITES_PDF, Workspace};

const BODY_LIMIT: usize = 1024 * 1024;

fn router(workspace: &Workspace) -> Router {
    let state = HttpState {
        documents: Arc::new(workspace.document_service()),
        compiler: Arc::new(workspace.compile_service(
            Arc::new(CountingRunner::default()),
            CompileOptions::default(),
        )),
    };
    build_router(state, BODY_LIMIT)
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router responded");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes()
        .to_vec();
    (status, bytes)
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("json body")
}

#[tokio::test]
async fn document_lifecycle_round_trips_through_the_api() {
    let workspace = Workspace::new();
    let app = router(&workspace);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/file",
        Some(json!({ "filename": "Thesis Draft.tex", "content": "\\relax" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["filename"], "Thesis_Draft.tex");

    let (status, body) = send(&app, Method::GET, "/api/files", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({ "files": ["Thesis_Draft.tex"] }));

    let (status, body) = send(&app, Method::GET, "/api/file/Thesis_Draft.tex", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({ "content": "\\relax" }));

    let (status, _) = send(&app, Method::DELETE, "/api/delete/Thesis_Draft.tex", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/api/file/Thesis_Draft.tex", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["error"]["code"], "not_found");
}

#[tokio::test]
async fn saving_without_a_name_uses_the_default_document() {
    let workspace = Workspace::new();
    let app = router(&workspace);

    let (status, body) =
        send(&app, Method::POST, "/api/file", Some(json!({ "content": "x" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["filename"], "document.tex");
}

#[tokio::test]
async fn deleting_a_missing_document_is_not_found() {
    let workspace = Workspace::new();
    let app = router(&workspace);

    let (status, _) = send(&app, Method::DELETE, "/api/delete/ghost.tex", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn compile_then_download_the_pdf() {
    let workspace = Workspace::new();
    workspace.install_engine(EngineChoice::PdfLatex, WRITES_PDF);
    workspace.add_document("paper.tex", "\\relax").await;
    let app = router(&workspace);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/compile",
        Some(json!({ "filename": "paper.tex", "engine": "pdflatex" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!({ "outcome": "success", "artifact": "paper.pdf" })
    );

    let request = Request::builder()
        .uri("/api/pdf/paper.pdf")
        .body(Body::empty())
        .expect("build request");
    let response = app.clone().oneshot(request).await.expect("router responded");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).expect("content type"),
        "application/pdf"
    );
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn failed_compile_returns_the_engine_diagnostic() {
    let workspace = Workspace::new();
    workspace.install_engine(EngineChoice::PdfLatex, "printf '! Emergency stop.' >&2\nexit 1\n");
    workspace.add_document("broken.tex", "\\begin{document}").await;
    let app = router(&workspace);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/compile",
        Some(json!({ "filename": "broken.tex" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(&body),
        json!({ "outcome": "compilation_failed", "stderr": "! Emergency stop." })
    );
}

#[tokio::test]
async fn compile_with_no_installed_engine_reports_engine_not_found() {
    let workspace = Workspace::new();
    workspace.add_document("paper.tex", "\\relax").await;
    let app = router(&workspace);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/compile",
        Some(json!({ "filename": "paper.tex", "engine": "xelatex" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(&body),
        json!({ "outcome": "engine_not_found", "requested": "xelatex" })
    );
}

#[tokio::test]
async fn compile_of_a_missing_document_is_not_found() {
    let workspace = Workspace::new();
    workspace.install_engine(EngineChoice::PdfLatex, WRITES_PDF);
    let app = router(&workspace);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/compile",
        Some(json!({ "filename": "nowhere.tex" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["error"]["code"], "not_found");
}

#[tokio::test]
async fn unusable_names_are_rejected_as_invalid_input() {
    let workspace = Workspace::new();
    let app = router(&workspace);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/compile",
        Some(json!({ "filename": "!!!.tex" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn missing_pdf_is_not_found() {
    let workspace = Workspace::new();
    let app = router(&workspace);

    let (status, _) = send(&app, Method::GET, "/api/pdf/never-built.pdf", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn engines_endpoint_lists_every_kind() {
    let workspace = Workspace::new();
    workspace.install_engine(EngineChoice::XeLatex, WRITES_PDF);
    let app = router(&workspace);

    let (status, body) = send(&app, Method::GET, "/api/engines", None).await;
    assert_eq!(status, StatusCode::OK);

    let body = json_body(&body);
    assert_eq!(body["default"], "pdflatex");
    let engines = body["engines"].as_array().expect("engine list");
    assert_eq!(engines.len(), 3);
    for entry in engines {
        let installed = entry["engine"] == "xelatex";
        assert_eq!(entry["path"].is_string(), installed, "entry: {entry}");
    }
}

#[tokio::test]
async fn health_check_is_empty() {
    let workspace = Workspace::new();
    let app = router(&workspace);

    let (status, body) = send(&app, Method::GET, "/_health", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let workspace = Workspace::new();
    let app = router(&workspace);

    let request = Request::builder()
        .uri("/api/file/missing.tex")
        .body(Body::empty())
        .expect("build request");
    let response = app.oneshot(request).await.expect("router responded");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .expect("request id header")
        .to_str()
        .expect("ascii header");
    assert_eq!(request_id.len(), 36);
}

#[tokio::test]
async fn listed_names_can_be_read_and_compiled() {
    let workspace = Workspace::new();
    workspace.install_engine(EngineChoice::PdfLatex, WRITES_PDF);
    std::fs::write(workspace.documents_dir().join("My_Thesis.tex"), "\\relax")
        .expect("place document by hand");
    let app = router(&workspace);

    let (status, body) = send(&app, Method::GET, "/api/files", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({ "files": ["My_Thesis.tex"] }));

    let (status, body) = send(&app, Method::GET, "/api/file/My_Thesis.tex", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({ "content": "\\relax" }));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/compile",
        Some(json!({ "filename": "My_Thesis.tex" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!({ "outcome": "success", "artifact": "My_Thesis.pdf" })
    );
}
