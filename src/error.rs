use std::io;
use std::path::PathBuf;

use crate::launcher::BackendState;

/// Everything that can stop the launcher, one variant per failure class.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("{runtime} was not found ({reason}); install it and try again")]
    RuntimeMissing { runtime: String, reason: String },

    #[error("backend script not found: {}", .0.display())]
    MissingBackendScript(PathBuf),

    #[error("port {0} is already in use; close the program holding it or pick another port")]
    PortInUse(u16),

    #[error("failed to start the backend: {0}")]
    Spawn(#[source] io::Error),

    #[error("backend exited during startup ({0}); see its output above")]
    StartupFailed(String),

    #[error("frontend file not found: {}", .0.display())]
    MissingFrontend(PathBuf),

    #[error("could not open the browser: {0}")]
    BrowserOpen(#[source] io::Error),

    #[error("backend process error: {0}")]
    Process(#[from] io::Error),
}

impl LaunchError {
    /// Lifecycle state the backend is left in, for errors raised while starting it.
    pub fn backend_state(&self) -> Option<BackendState> {
        match self {
            Self::MissingBackendScript(_) | Self::Spawn(_) | Self::StartupFailed(_) => {
                Some(BackendState::Failed)
            }
            Self::PortInUse(_) => Some(BackendState::PortBlocked),
            _ => None,
        }
    }

    /// Whether the launcher must stop; the frontend and browser problems only warn.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MissingFrontend(_) | Self::BrowserOpen(_))
    }
}
