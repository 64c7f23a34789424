use std::io;
use std::path::{Path, PathBuf};

use crate::config::LauncherConfig;
use crate::error::LaunchError;

/// Hands a URL to something that can display it.
pub trait Browser {
    fn open(&self, url: &str) -> io::Result<()>;
}

impl<T: Browser + ?Sized> Browser for &T {
    fn open(&self, url: &str) -> io::Result<()> {
        (**self).open(url)
    }
}

/// The host's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        open::that(url)
    }
}

/// Builds a `file:///` URL with `/` separators from an absolute path.
pub fn file_url(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    format!("file:///{}", normalized.trim_start_matches('/'))
}

/// Resolves the configured frontend file to an absolute, existing path.
pub fn resolve_frontend(cfg: &LauncherConfig) -> Result<PathBuf, LaunchError> {
    let path = cfg.frontend_path();
    let absolute = std::path::absolute(&path).unwrap_or(path);
    if absolute.is_file() {
        Ok(absolute)
    } else {
        Err(LaunchError::MissingFrontend(absolute))
    }
}

/// Opens the frontend page in `browser` and returns the URL it was given.
pub fn open_frontend<B: Browser>(cfg: &LauncherConfig, browser: &B) -> Result<String, LaunchError> {
    let path = resolve_frontend(cfg)?;
    let url = file_url(&path);
    tracing::info!(%url, "opening frontend");
    browser.open(&url).map_err(LaunchError::BrowserOpen)?;
    Ok(url)
}
