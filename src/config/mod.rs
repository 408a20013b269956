//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{
    CliArgs, Command, CompileArgs, CompileOverrides, EnginesArgs, LoggingOverrides, ServeArgs,
    ServeOverrides, StorageOverrides,
};

use crate::{application::compile::CompileOptions, domain::engine::EngineChoice};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "offtex";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MAX_REQUEST_BYTES: u64 = 16 * 1024 * 1024;
const DEFAULT_DOCUMENTS_DIR: &str = "tex_files";
const DEFAULT_ARTIFACTS_DIR: &str = "pdf_output";
const DEFAULT_COMPILE_TIMEOUT_SECS: u64 = 60;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub compile: CompileSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub documents_dir: PathBuf,
    pub artifacts_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CompileSettings {
    pub timeout: Duration,
    pub serialize_per_document: bool,
    pub search_dirs: Vec<PathBuf>,
    pub default_engine: EngineChoice,
}

impl From<&CompileSettings> for CompileOptions {
    fn from(settings: &CompileSettings) -> Self {
        Self {
            timeout: settings.timeout,
            default_engine: settings.default_engine,
            serialize_per_document: settings.serialize_per_document,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("OFFTEX").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Compile(args)) => {
            raw.apply_logging_overrides(&args.logging);
            raw.apply_storage_overrides(&args.storage);
            raw.apply_compile_overrides(&args.compile);
        }
        Some(Command::Engines(args)) => {
            raw.apply_logging_overrides(&args.logging);
            raw.apply_compile_overrides(&args.compile);
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    compile: RawCompileSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(limit) = overrides.server_max_request_bytes {
            self.server.max_request_bytes = Some(limit);
        }

        self.apply_logging_overrides(&overrides.logging);
        self.apply_storage_overrides(&overrides.storage);
        self.apply_compile_overrides(&overrides.compile);
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_storage_overrides(&mut self, overrides: &StorageOverrides) {
        if let Some(dir) = overrides.documents_dir.as_ref() {
            self.storage.documents_dir = Some(dir.clone());
        }
        if let Some(dir) = overrides.artifacts_dir.as_ref() {
            self.storage.artifacts_dir = Some(dir.clone());
        }
    }

    fn apply_compile_overrides(&mut self, overrides: &CompileOverrides) {
        if let Some(seconds) = overrides.timeout_seconds {
            self.compile.timeout_seconds = Some(seconds);
        }
        if let Some(serialize) = overrides.serialize_per_document {
            self.compile.serialize_per_document = Some(serialize);
        }
        if !overrides.search_dirs.is_empty() {
            self.compile.search_dirs = Some(overrides.search_dirs.clone());
        }
        if let Some(engine) = overrides.default_engine.as_ref() {
            self.compile.default_engine = Some(engine.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            storage,
            compile,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            storage: build_storage_settings(storage)?,
            compile: build_compile_settings(compile)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let max_request_bytes_value = server
        .max_request_bytes
        .unwrap_or(DEFAULT_MAX_REQUEST_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("server.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "server.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(ServerSettings {
        addr,
        max_request_bytes,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let documents_dir = storage
        .documents_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCUMENTS_DIR));
    if documents_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.documents_dir",
            "path must not be empty",
        ));
    }

    let artifacts_dir = storage
        .artifacts_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR));
    if artifacts_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.artifacts_dir",
            "path must not be empty",
        ));
    }

    Ok(StorageSettings {
        documents_dir,
        artifacts_dir,
    })
}

fn build_compile_settings(compile: RawCompileSettings) -> Result<CompileSettings, LoadError> {
    let timeout_seconds = compile
        .timeout_seconds
        .unwrap_or(DEFAULT_COMPILE_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "compile.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let default_engine = match compile.default_engine {
        Some(name) => name
            .parse::<EngineChoice>()
            .map_err(|err| LoadError::invalid("compile.default_engine", err.to_string()))?,
        None => EngineChoice::default(),
    };

    let search_dirs = compile.search_dirs.unwrap_or_default();
    if search_dirs.iter().any(|dir| dir.as_os_str().is_empty()) {
        return Err(LoadError::invalid(
            "compile.search_dirs",
            "entries must not be empty",
        ));
    }

    Ok(CompileSettings {
        timeout: Duration::from_secs(timeout_seconds),
        serialize_per_document: compile.serialize_per_document.unwrap_or(true),
        search_dirs,
        default_engine,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    documents_dir: Option<PathBuf>,
    artifacts_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCompileSettings {
    timeout_seconds: Option<u64>,
    serialize_per_document: Option<bool>,
    search_dirs: Option<Vec<PathBuf>>,
    default_engine: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
