//! Shared fixtures: temporary store directories and `#!/bin/sh` stand-ins for engines.

#![allow(dead_code)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use offtex::{
    application::{
        compile::{
            CompileOptions, CompileService, EngineLocator, Invocation, ProcessRunner, RunOutcome,
            TokioProcessRunner,
        },
        documents::DocumentService,
        stores::{ArtifactStore, DocumentStore},
    },
    domain::{documents::DocumentRef, engine::EngineChoice},
    infra::storage::{FsArtifactStore, FsDocumentStore},
};
use tempfile::TempDir;

/// Sets `$out` to the output directory and `$doc` to the document argument.
const ARGUMENT_PRELUDE: &str = r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    -output-directory=*) out="${arg#-output-directory=}" ;;
    *.tex) doc="$arg" ;;
  esac
done
pdf="$out/${doc%.tex}.pdf"
"#;

pub const WRITES_PDF: &str = r#"printf '%%PDF-1.4 fake\n' > "$pdf"
exit 0
"#;

pub struct Workspace {
    _root: TempDir,
    bin_dir: PathBuf,
    documents: Arc<FsDocumentStore>,
    artifacts: Arc<FsArtifactStore>,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let bin_dir = root.path().join("bin");
        fs::create_dir_all(&bin_dir).expect("create bin dir");
        let documents =
            FsDocumentStore::open(root.path().join("tex_files")).expect("open document store");
        let artifacts =
            FsArtifactStore::open(root.path().join("pdf_output")).expect("open artifact store");
        Self {
            _root: root,
            bin_dir,
            documents: Arc::new(documents),
            artifacts: Arc::new(artifacts),
        }
    }

    pub fn documents_dir(&self) -> &Path {
        self.documents.directory()
    }

    pub fn artifacts_dir(&self) -> &Path {
        self.artifacts.directory()
    }

    /// Install a fake engine whose body runs after argument parsing.
    pub fn install_engine(&self, engine: EngineChoice, body: &str) {
        self.install_raw(engine, &format!("{ARGUMENT_PRELUDE}{body}"));
    }

    pub fn install_raw(&self, engine: EngineChoice, script: &str) {
        let path = self.bin_dir.join(engine.executable());
        fs::write(&path, script).expect("write fake engine");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake engine");
    }

    pub async fn add_document(&self, name: &str, content: &str) -> DocumentRef {
        let document = DocumentRef::parse(name).expect("valid document name");
        self.documents
            .write(&document, content)
            .await
            .expect("write document");
        document
    }

    /// A locator that only sees this workspace's fake engines.
    pub fn locator(&self) -> EngineLocator {
        EngineLocator::with_search_path(vec![self.bin_dir.clone()], "")
    }

    pub fn compile_service(
        &self,
        runner: Arc<dyn ProcessRunner>,
        options: CompileOptions,
    ) -> CompileService {
        let documents: Arc<dyn DocumentStore> = self.documents.clone();
        let artifacts: Arc<dyn ArtifactStore> = self.artifacts.clone();
        CompileService::new(documents, artifacts, self.locator(), runner, options)
    }

    pub fn document_service(&self) -> DocumentService {
        let documents: Arc<dyn DocumentStore> = self.documents.clone();
        let artifacts: Arc<dyn ArtifactStore> = self.artifacts.clone();
        DocumentService::new(documents, artifacts)
    }
}

pub fn options_with_timeout(timeout: Duration) -> CompileOptions {
    CompileOptions {
        timeout,
        ..CompileOptions::default()
    }
}

/// Real process runner that records every invocation it receives.
#[derive(Default)]
pub struct CountingRunner {
    inner: TokioProcessRunner,
    calls: AtomicUsize,
}

impl CountingRunner {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessRunner for CountingRunner {
    async fn run(&self, invocation: &Invocation) -> RunOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.run(invocation).await
    }
}

/// Whether `pid` has exited, allowing a few seconds for the kernel to tear it down.
/// An unreaped zombie counts as exited.
#[cfg(target_os = "linux")]
pub async fn process_gone(pid: &str) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(3);
    loop {
        let running = match fs::read_to_string(Path::new("/proc").join(pid).join("stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z"),
            Err(_) => false,
        };
        if !running {
            return true;
        }
        if std::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
