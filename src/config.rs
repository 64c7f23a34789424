use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extensions counted by default (lowercase, with the leading dot).
pub const DEFAULT_EXTENSIONS: &[&str] = &[".py", ".js", ".html", ".css", ".json", ".md", ".sh"];

/// Directory names whose files are never counted.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &["node_modules", ".git", "__pycache__", ".vscode", ".idea"];

/// Exact file names that are never counted.
pub const DEFAULT_EXCLUDE_FILES: &[&str] = &["package-lock.json"];

/// Files at or above this size are memory-mapped instead of streamed.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 4 * 1024 * 1024;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RUNTIME: &str = "node";
pub const DEFAULT_BACKEND_SCRIPT: &str = "src/backend/server.js";
pub const DEFAULT_FRONTEND_FILE: &str = "src/frontend/cplus.html";
pub const DEFAULT_RUNTIME_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_READY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// How excluded directory names are matched against a file's relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirMatch {
    /// The name occurs anywhere in the path string.
    #[default]
    Substring,
    /// A whole path component equals the name.
    Component,
}

/// What to do with files that cannot be read or decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// Record a warning and keep going.
    #[default]
    Lenient,
    /// Abort the run.
    Strict,
}

#[derive(Debug, Clone)]
pub struct CountConfig {
    pub root: PathBuf,
    pub extensions: Vec<String>, // lowercase, leading dot
    pub exclude_dirs: Vec<String>,
    pub exclude_files: Vec<String>,
    pub dir_match: DirMatch,
    pub read_policy: ReadPolicy,
    pub follow_symlinks: bool,
    /// `None` disables memory-mapping.
    pub mmap_threshold: Option<u64>,
}

impl CountConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| (*s).to_string()).collect(),
            exclude_files: DEFAULT_EXCLUDE_FILES.iter().map(|s| (*s).to_string()).collect(),
            dir_match: DirMatch::default(),
            read_policy: ReadPolicy::default(),
            follow_symlinks: false,
            mmap_threshold: Some(DEFAULT_MMAP_THRESHOLD),
        }
    }
}

/// Normalizes a user-supplied extension list: `py, .JS` -> `[".py", ".js"]`.
pub fn parse_extension_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!(".{}", t.trim_start_matches('.').to_ascii_lowercase()))
        .collect()
}

pub fn parse_name_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// How the launcher decides whether the backend port is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PortProbe {
    /// Try to connect; anything answering means occupied.
    #[default]
    Connect,
    /// Try to bind and release immediately.
    Bind,
}

#[derive(Debug, Clone)]
pub struct LauncherConfig {
    pub project_root: PathBuf,
    pub runtime: OsString,
    pub runtime_version_arg: String,
    pub runtime_timeout: Duration,
    /// Relative to `project_root` unless absolute.
    pub backend_script: PathBuf,
    /// Relative to `project_root` unless absolute.
    pub frontend_file: PathBuf,
    pub port: u16,
    pub port_probe: PortProbe,
    pub port_probe_timeout: Duration,
    pub startup_delay: Duration,
    pub ready_delay: Duration,
    pub grace_period: Duration,
    pub open_browser: bool,
}

impl LauncherConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            runtime: OsString::from(DEFAULT_RUNTIME),
            runtime_version_arg: "--version".to_string(),
            runtime_timeout: DEFAULT_RUNTIME_TIMEOUT,
            backend_script: PathBuf::from(DEFAULT_BACKEND_SCRIPT),
            frontend_file: PathBuf::from(DEFAULT_FRONTEND_FILE),
            port: DEFAULT_PORT,
            port_probe: PortProbe::default(),
            port_probe_timeout: DEFAULT_RUNTIME_TIMEOUT,
            startup_delay: DEFAULT_STARTUP_DELAY,
            ready_delay: DEFAULT_READY_DELAY,
            grace_period: DEFAULT_GRACE_PERIOD,
            open_browser: true,
        }
    }

    pub fn backend_script_path(&self) -> PathBuf {
        self.project_root.join(&self.backend_script)
    }

    /// Working directory for the backend: the script's own directory.
    pub fn backend_dir(&self) -> PathBuf {
        self.backend_script_path()
            .parent()
            .map_or_else(|| self.project_root.clone(), Path::to_path_buf)
    }

    pub fn frontend_path(&self) -> PathBuf {
        self.project_root.join(&self.frontend_file)
    }

    pub fn backend_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    pub fn runtime_name(&self) -> String {
        Path::new(&self.runtime)
            .file_name()
            .unwrap_or(self.runtime.as_os_str())
            .to_string_lossy()
            .into_owned()
    }
}
