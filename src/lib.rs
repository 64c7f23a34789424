pub mod analyzer;
pub mod cli;
pub mod config;
pub mod count;
pub mod error;
pub mod formatters;
pub mod launcher;
pub mod logging;
pub mod traversal;
pub mod types;

pub use config::{CountConfig, LauncherConfig};
pub use count::count_tree;
pub use error::LaunchError;
pub use types::{CountReport, ExtCounts};
