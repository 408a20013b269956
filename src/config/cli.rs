use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the offtex binary.
#[derive(Debug, Parser)]
#[command(name = "offtex", version, about = "Offline LaTeX compiler service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "OFFTEX_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Compile one stored document and print the outcome as JSON.
    Compile(CompileArgs),
    /// Report which engines are installed and where.
    Engines(EnginesArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StorageOverrides {
    /// Override the directory holding source documents.
    #[arg(long = "documents-dir", value_name = "PATH")]
    pub documents_dir: Option<PathBuf>,

    /// Override the directory receiving compiled PDFs.
    #[arg(long = "artifacts-dir", value_name = "PATH")]
    pub artifacts_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CompileOverrides {
    /// Override the per-compilation timeout.
    #[arg(long = "compile-timeout-seconds", value_name = "SECONDS")]
    pub timeout_seconds: Option<u64>,

    /// Toggle per-document serialization of concurrent compilations.
    #[arg(
        long = "compile-serialize-per-document",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub serialize_per_document: Option<bool>,

    /// Additional directory probed for engines before the built-in list (repeatable).
    #[arg(long = "engine-search-dir", value_name = "PATH")]
    pub search_dirs: Vec<PathBuf>,

    /// Override the engine used when a request names none or an unknown one.
    #[arg(long = "default-engine", value_name = "ENGINE")]
    pub default_engine: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub storage: StorageOverrides,

    #[command(flatten)]
    pub compile: CompileOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the maximum request body size in bytes.
    #[arg(long = "server-max-request-bytes", value_name = "BYTES")]
    pub server_max_request_bytes: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct CompileArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub storage: StorageOverrides,

    #[command(flatten)]
    pub compile: CompileOverrides,

    /// Engine to run (pdflatex|xelatex|lualatex); unknown names use the default engine.
    #[arg(long, short = 'e', value_name = "ENGINE")]
    pub engine: Option<String>,

    /// Name of the stored document to compile.
    #[arg(value_name = "DOCUMENT")]
    pub document: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct EnginesArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub compile: CompileOverrides,
}
