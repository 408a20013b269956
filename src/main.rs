use std::{process, sync::Arc};

use offtex::{
    application::{
        compile::{CompileOptions, CompileService, EngineLocator, TokioProcessRunner},
        documents::DocumentService,
        error::AppError,
        stores::{ArtifactStore, DocumentStore},
    },
    config,
    domain::engine::EngineChoice,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        storage::{FsArtifactStore, FsDocumentStore},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const INSTALL_HINTS: &str =
    "install a TeX distribution: `brew install --cask mactex` or `sudo apt-get install texlive-full`";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Compile(args) => run_compile(settings, args).await,
        config::Command::Engines(_) => run_engines(settings),
    }
}

struct ApplicationContext {
    documents: Arc<DocumentService>,
    compiler: Arc<CompileService>,
}

fn build_application_context(settings: &config::Settings) -> Result<ApplicationContext, AppError> {
    let document_store = Arc::new(
        FsDocumentStore::open(&settings.storage.documents_dir)
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );
    let artifact_store = Arc::new(
        FsArtifactStore::open(&settings.storage.artifacts_dir)
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    info!(
        target = "offtex::startup",
        documents_dir = %document_store.directory().display(),
        artifacts_dir = %artifact_store.directory().display(),
        "Storage directories ready"
    );

    let documents: Arc<dyn DocumentStore> = document_store;
    let artifacts: Arc<dyn ArtifactStore> = artifact_store;

    let compiler = CompileService::new(
        documents.clone(),
        artifacts.clone(),
        EngineLocator::from_env(&settings.compile.search_dirs),
        Arc::new(TokioProcessRunner),
        CompileOptions::from(&settings.compile),
    );

    Ok(ApplicationContext {
        documents: Arc::new(DocumentService::new(documents, artifacts)),
        compiler: Arc::new(compiler),
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings)?;
    check_default_engine(&app.compiler);

    let body_limit = usize::try_from(settings.server.max_request_bytes.get())
        .map_err(|_| InfraError::configuration("server.max_request_bytes exceeds usize"))?;
    let router = http::build_router(
        HttpState {
            documents: app.documents,
            compiler: app.compiler,
        },
        body_limit,
    );

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "offtex::serve",
        addr = %settings.server.addr,
        "Listening for requests"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "offtex::serve", "Server stopped");
    Ok(())
}

async fn run_compile(
    settings: config::Settings,
    args: config::CompileArgs,
) -> Result<(), AppError> {
    let app = build_application_context(&settings)?;
    let engine = args.engine.as_deref().unwrap_or_default();

    let outcome = app.compiler.compile(&args.document, engine).await?;

    let rendered = serde_json::to_string_pretty(&outcome)
        .map_err(|err| AppError::unexpected(format!("failed to encode outcome: {err}")))?;
    println!("{rendered}");

    if outcome.is_success() {
        Ok(())
    } else {
        Err(AppError::unexpected(format!(
            "compilation of `{}` finished with {}",
            args.document,
            outcome.kind()
        )))
    }
}

fn run_engines(settings: config::Settings) -> Result<(), AppError> {
    let locator = EngineLocator::from_env(&settings.compile.search_dirs);

    for kind in EngineChoice::ALL {
        match locator.locate(kind) {
            Some(handle) => println!("{kind}\t{}", handle.path.display()),
            None => println!("{kind}\tnot found"),
        }
    }

    if locator.locate(settings.compile.default_engine).is_none() {
        warn!(
            target = "offtex::engines",
            engine = %settings.compile.default_engine,
            hint = INSTALL_HINTS,
            "Default engine is not installed"
        );
    }

    Ok(())
}

fn check_default_engine(compiler: &CompileService) {
    let engine = compiler.default_engine();
    match compiler.locator().locate(engine) {
        Some(handle) => info!(
            target = "offtex::startup",
            engine = %engine,
            path = %handle.path.display(),
            "Default engine located"
        ),
        None => warn!(
            target = "offtex::startup",
            engine = %engine,
            hint = INSTALL_HINTS,
            "Default engine not found; compilations will report engine_not_found"
        ),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "offtex::serve", error = %err, "Failed to listen for Ctrl+C");
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
                warn!(target = "offtex::serve", error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!(target = "offtex::serve", "Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!(target = "offtex::serve", "Received terminate signal, shutting down");
        }
    }
}
