//! Compilation orchestration: locate an engine, run it against a stored document
//! under a deadline, and interpret what happened.

mod interpreter;
mod locator;
mod locks;
mod runner;

use std::{
    ffi::OsString,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{info, warn};

pub use interpreter::interpret;
pub use locator::{DEFAULT_SEARCH_DIRS, EngineHandle, EngineLocator};
pub use locks::{DocumentLockGuard, DocumentLocks};
pub use runner::{Invocation, ProcessOutput, ProcessRunner, RunOutcome, TokioProcessRunner};

use crate::{
    application::stores::{ArtifactStore, DocumentStore},
    domain::{
        documents::DocumentRef, engine::EngineChoice, error::DomainError,
        outcome::CompilationOutcome,
    },
};

/// Requests rejected before any compilation work starts.
#[derive(Debug, Error)]
pub enum CompileRequestError {
    #[error(transparent)]
    InvalidRequest(#[from] DomainError),
    #[error("document `{0}` not found")]
    DocumentNotFound(DocumentRef),
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub timeout: Duration,
    pub default_engine: EngineChoice,
    pub serialize_per_document: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            default_engine: EngineChoice::default(),
            serialize_per_document: true,
        }
    }
}

/// Entry point for compilations. Holds no per-request state and may be shared freely.
pub struct CompileService {
    documents: Arc<dyn DocumentStore>,
    artifacts: Arc<dyn ArtifactStore>,
    locator: EngineLocator,
    runner: Arc<dyn ProcessRunner>,
    options: CompileOptions,
    locks: DocumentLocks,
}

impl CompileService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        artifacts: Arc<dyn ArtifactStore>,
        locator: EngineLocator,
        runner: Arc<dyn ProcessRunner>,
        options: CompileOptions,
    ) -> Self {
        Self {
            documents,
            artifacts,
            locator,
            runner,
            options,
            locks: DocumentLocks::new(),
        }
    }

    pub fn locator(&self) -> &EngineLocator {
        &self.locator
    }

    pub fn default_engine(&self) -> EngineChoice {
        self.options.default_engine
    }

    /// Compile a document named by loosely-typed request fields.
    ///
    /// Unknown engine names fall back to the configured default engine.
    pub async fn compile(
        &self,
        document_id: &str,
        engine_kind: &str,
    ) -> Result<CompilationOutcome, CompileRequestError> {
        let document = DocumentRef::parse(document_id)?;
        let engine = EngineChoice::resolve_or(engine_kind, self.options.default_engine);
        self.compile_document(&document, engine).await
    }

    pub async fn compile_document(
        &self,
        document: &DocumentRef,
        engine: EngineChoice,
    ) -> Result<CompilationOutcome, CompileRequestError> {
        let started_at = Instant::now();

        match self.documents.exists(document).await {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    target = "application::compile",
                    op = "compile::compile_document",
                    result = "document_not_found",
                    document = %document,
                    "Compile requested for a missing document"
                );
                return Err(CompileRequestError::DocumentNotFound(document.clone()));
            }
            Err(err) => {
                let outcome = CompilationOutcome::system_error(err.to_string());
                return Ok(record(document, engine, started_at, outcome));
            }
        }

        let _guard = if self.options.serialize_per_document {
            Some(self.locks.acquire(document).await)
        } else {
            None
        };

        let outcome = self.run_engine(document, engine).await;
        Ok(record(document, engine, started_at, outcome))
    }

    async fn run_engine(&self, document: &DocumentRef, engine: EngineChoice) -> CompilationOutcome {
        let Some(handle) = self.locator.locate(engine) else {
            return CompilationOutcome::EngineNotFound { requested: engine };
        };

        let source_path = match self.documents.resolve_path(document) {
            Ok(path) => path,
            Err(err) => return CompilationOutcome::system_error(err.to_string()),
        };
        let artifact = document.artifact();
        let artifact_path = match self.artifacts.resolve_path(&artifact) {
            Ok(path) => path,
            Err(err) => return CompilationOutcome::system_error(err.to_string()),
        };
        let (Some(working_dir), Some(output_dir)) = (source_path.parent(), artifact_path.parent())
        else {
            return CompilationOutcome::system_error("store paths have no parent directory");
        };

        let invocation = Invocation {
            program: handle.path,
            args: engine_arguments(output_dir, document),
            working_dir: working_dir.to_path_buf(),
            timeout: self.options.timeout,
        };

        counter!("offtex_engine_invocations_total", "engine" => engine.executable()).increment(1);
        let run = self.runner.run(&invocation).await;
        interpret(run, &artifact, self.artifacts.as_ref()).await
    }
}

/// Batch mode, explicit output directory, then the document file name.
fn engine_arguments(output_dir: &Path, document: &DocumentRef) -> Vec<OsString> {
    let mut output_flag = OsString::from("-output-directory=");
    output_flag.push(output_dir);
    vec![
        OsString::from("-interaction=nonstopmode"),
        output_flag,
        OsString::from(document.as_str()),
    ]
}

fn record(
    document: &DocumentRef,
    engine: EngineChoice,
    started_at: Instant,
    outcome: CompilationOutcome,
) -> CompilationOutcome {
    let elapsed_ms = started_at.elapsed().as_millis() as u64;
    counter!("offtex_compile_total", "outcome" => outcome.kind()).increment(1);
    histogram!("offtex_compile_duration_ms").record(elapsed_ms as f64);

    if outcome.is_success() {
        info!(
            target = "application::compile",
            op = "compile::compile_document",
            result = outcome.kind(),
            document = %document,
            engine = engine.executable(),
            elapsed_ms,
            "Document compiled"
        );
    } else {
        warn!(
            target = "application::compile",
            op = "compile::compile_document",
            result = outcome.kind(),
            document = %document,
            engine = engine.executable(),
            elapsed_ms,
            "Document compilation did not produce an artifact"
        );
    }

    outcome
}
