use std::{
    env,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::domain::engine::EngineChoice;

/// Vendor installation directories probed before the executable search path.
pub const DEFAULT_SEARCH_DIRS: [&str; 3] = [
    "/Library/TeX/texbin",
    "/usr/local/texlive/2024/bin/universal-darwin",
    "/usr/local/texlive/2023/bin/universal-darwin",
];

/// A located engine executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineHandle {
    pub kind: EngineChoice,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
enum SearchPath {
    /// Read `PATH` from the process environment on every lookup.
    Process,
    Fixed(OsString),
}

/// Resolves engine kinds to executables. Lookups are never cached.
#[derive(Debug, Clone)]
pub struct EngineLocator {
    search_dirs: Vec<PathBuf>,
    search_path: SearchPath,
}

impl EngineLocator {
    /// Probe `extra_dirs`, then [`DEFAULT_SEARCH_DIRS`], then the process `PATH`.
    pub fn from_env(extra_dirs: &[PathBuf]) -> Self {
        let search_dirs = extra_dirs
            .iter()
            .cloned()
            .chain(DEFAULT_SEARCH_DIRS.iter().map(PathBuf::from))
            .collect();
        Self {
            search_dirs,
            search_path: SearchPath::Process,
        }
    }

    /// Probe exactly `search_dirs`, then the entries of `search_path`.
    pub fn with_search_path(search_dirs: Vec<PathBuf>, search_path: impl Into<OsString>) -> Self {
        Self {
            search_dirs,
            search_path: SearchPath::Fixed(search_path.into()),
        }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Find the executable for `kind`; `None` means the engine is not installed.
    pub fn locate(&self, kind: EngineChoice) -> Option<EngineHandle> {
        let basename = kind.executable();

        if let Some(path) = self
            .search_dirs
            .iter()
            .map(|dir| dir.join(basename))
            .find(|candidate| is_executable(candidate))
        {
            debug!(
                target = "application::compile::locator",
                op = "locator::locate",
                result = "install_dir_hit",
                engine = basename,
                path = %path.display(),
                "Engine found in installation directory"
            );
            return Some(EngineHandle { kind, path });
        }

        let search_path = match &self.search_path {
            SearchPath::Process => env::var_os("PATH"),
            SearchPath::Fixed(value) => Some(value.clone()),
        };
        let found = search_path.and_then(|paths| {
            env::split_paths(&paths)
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(|dir| dir.join(basename))
                .find(|candidate| is_executable(candidate))
        });

        match found {
            Some(path) => {
                debug!(
                    target = "application::compile::locator",
                    op = "locator::locate",
                    result = "search_path_hit",
                    engine = basename,
                    path = %path.display(),
                    "Engine found on search path"
                );
                Some(EngineHandle { kind, path })
            }
            None => {
                debug!(
                    target = "application::compile::locator",
                    op = "locator::locate",
                    result = "not_found",
                    engine = basename,
                    "Engine not installed"
                );
                None
            }
        }
    }
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    let executable = {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    };
    #[cfg(not(unix))]
    let executable = true;

    executable
}
