//! Discovery of the LibreOffice converter executable.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Executable names probed on the search path.
#[cfg(windows)]
const EXECUTABLE_NAMES: &[&str] = &["soffice.exe", "soffice.com"];
#[cfg(not(windows))]
const EXECUTABLE_NAMES: &[&str] = &["soffice"];

/// Well-known install locations, probed after the search path.
#[cfg(target_os = "macos")]
const KNOWN_PATHS: &[&str] = &[
    "/Applications/LibreOffice.app/Contents/MacOS/soffice",
    "/opt/homebrew/bin/soffice",
    "/usr/local/bin/soffice",
];
#[cfg(windows)]
const KNOWN_PATHS: &[&str] = &[
    r"C:\Program Files\LibreOffice\program\soffice.exe",
    r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
];
#[cfg(not(any(target_os = "macos", windows)))]
const KNOWN_PATHS: &[&str] = &[
    "/usr/bin/soffice",
    "/usr/local/bin/soffice",
    "/usr/lib/libreoffice/program/soffice",
    "/opt/libreoffice/program/soffice",
    "/snap/bin/libreoffice",
];

/// Something that can resolve the converter executable.
pub trait EngineLocator {
    /// Return the converter path, or `None` if no usable executable exists.
    fn locate(&self) -> Option<PathBuf>;
}

/// Looks on the search path, then in the platform's usual install locations.
#[derive(Debug, Clone)]
pub struct SystemLocator {
    search_path: Option<OsString>,
    known_paths: Vec<PathBuf>,
}

impl Default for SystemLocator {
    fn default() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
            known_paths: KNOWN_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl SystemLocator {
    /// Create a locator for the current process environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific search path instead of `$PATH`.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// Replace the list of well-known install paths.
    pub fn with_known_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.known_paths = paths;
        self
    }

    fn search_path_candidates(&self) -> Vec<PathBuf> {
        let Some(search_path) = &self.search_path else {
            return Vec::new();
        };

        std::env::split_paths(search_path)
            .flat_map(|dir| EXECUTABLE_NAMES.iter().map(move |name| dir.join(name)))
            .collect()
    }
}

impl EngineLocator for SystemLocator {
    fn locate(&self) -> Option<PathBuf> {
        let found = self
            .search_path_candidates()
            .into_iter()
            .chain(self.known_paths.iter().cloned())
            .find(|p| is_executable(p));

        match &found {
            Some(path) => log::debug!("Found converter at {}", path.display()),
            None => log::debug!("No converter found on search path or in known locations"),
        }

        found
    }
}

/// Uses exactly one configured path.
#[derive(Debug, Clone)]
pub struct FixedLocator {
    path: PathBuf,
}

impl FixedLocator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EngineLocator for FixedLocator {
    fn locate(&self) -> Option<PathBuf> {
        if is_executable(&self.path) {
            Some(self.path.clone())
        } else {
            log::debug!("Configured converter {} is not executable", self.path.display());
            None
        }
    }
}

/// Whether `path` is an existing file this process may execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };

    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}
