use std::ffi::OsString;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueHint};

use crate::config::{
    DEFAULT_BACKEND_SCRIPT, DEFAULT_FRONTEND_FILE, DEFAULT_PORT, DEFAULT_RUNTIME, LauncherConfig, PortProbe,
};
use crate::error::LaunchError;
use crate::launcher::{LaunchOutcome, Launcher, SystemBrowser, SystemSpawner};
use crate::logging;

#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug, Clone)]
#[command(
    name = "labkit-start",
    version,
    about = "Start the lab backend and open the frontend in a browser",
    long_about = None
)]
pub struct StartArgs {
    /// Project root holding src/backend and src/frontend
    #[arg(long = "root", value_name = "DIR", default_value = ".", value_hint = ValueHint::DirPath)]
    pub root: PathBuf,

    /// Port the backend listens on
    #[arg(long = "port", value_name = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Runtime used to run the backend script
    #[arg(long = "runtime", value_name = "PROGRAM", default_value = DEFAULT_RUNTIME)]
    pub runtime: OsString,

    /// Backend entry script, relative to the root
    #[arg(long = "backend-script", value_name = "PATH", default_value = DEFAULT_BACKEND_SCRIPT)]
    pub backend_script: PathBuf,

    /// Frontend page, relative to the root
    #[arg(long = "frontend", value_name = "PATH", default_value = DEFAULT_FRONTEND_FILE)]
    pub frontend: PathBuf,

    /// How long the backend must survive before it counts as started
    #[arg(long = "startup-delay-ms", value_name = "MS", default_value_t = 2000)]
    pub startup_delay_ms: u64,

    /// Pause before opening the browser
    #[arg(long = "ready-delay-ms", value_name = "MS", default_value_t = 1000)]
    pub ready_delay_ms: u64,

    /// Time allowed after the terminate request before killing the backend
    #[arg(long = "grace-ms", value_name = "MS", default_value_t = 5000)]
    pub grace_ms: u64,

    /// Timeout for the runtime version check and the port probe
    #[arg(long = "runtime-timeout-ms", value_name = "MS", default_value_t = 5000)]
    pub runtime_timeout_ms: u64,

    /// Port availability check
    #[arg(long = "probe", value_enum, default_value_t = PortProbe::Connect)]
    pub probe: PortProbe,

    /// Do not open a browser
    #[arg(long = "no-browser", action = ArgAction::SetTrue)]
    pub no_browser: bool,

    /// Do not wait for Enter after a failure
    #[arg(long = "no-pause", action = ArgAction::SetTrue)]
    pub no_pause: bool,

    /// Verbose logging (repeat for more)
    #[arg(long = "verbose", short = 'v', action = ArgAction::Count)]
    pub verbose: u8,
}

impl StartArgs {
    pub fn to_config(&self) -> LauncherConfig {
        let mut cfg = LauncherConfig::new(&self.root);
        cfg.port = self.port;
        cfg.runtime.clone_from(&self.runtime);
        cfg.backend_script.clone_from(&self.backend_script);
        cfg.frontend_file.clone_from(&self.frontend);
        cfg.startup_delay = Duration::from_millis(self.startup_delay_ms);
        cfg.ready_delay = Duration::from_millis(self.ready_delay_ms);
        cfg.grace_period = Duration::from_millis(self.grace_ms);
        cfg.runtime_timeout = Duration::from_millis(self.runtime_timeout_ms);
        cfg.port_probe_timeout = cfg.runtime_timeout;
        cfg.port_probe = self.probe;
        cfg.open_browser = !self.no_browser;
        cfg
    }
}

/// Runs the launcher and returns the process exit status.
pub fn run() -> i32 {
    run_with_args(&StartArgs::parse())
}

pub fn run_with_args(args: &StartArgs) -> i32 {
    logging::init(args.verbose);
    let cfg = args.to_config();

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start the async runtime: {e}");
            return 1;
        }
    };

    let launcher = Launcher::new(&cfg, SystemSpawner, SystemBrowser);
    match rt.block_on(launcher.run(tokio::signal::ctrl_c())) {
        Ok(outcome) => {
            if outcome == LaunchOutcome::Cancelled {
                println!();
                println!("Interrupted");
            }
            tracing::debug!(?outcome, "launcher finished");
            0
        }
        Err(err) => {
            tracing::error!(error = %err, "launch failed");
            println!();
            println!("✗ {err}");
            if let Some(hint) = hint_for(&err, &cfg) {
                println!("  {hint}");
            }
            acknowledge(args.no_pause);
            1
        }
    }
}

fn hint_for(err: &LaunchError, cfg: &LauncherConfig) -> Option<String> {
    match err {
        LaunchError::RuntimeMissing { .. } if cfg.runtime_name() == DEFAULT_RUNTIME => {
            Some("Install Node.js from https://nodejs.org/".to_string())
        }
        LaunchError::PortInUse(port) => Some(format!(
            "Stop whatever holds port {port}, or change the port in the server and pass --port"
        )),
        LaunchError::StartupFailed(_) => Some("Check the server output above for the cause".to_string()),
        _ => None,
    }
}

/// Waits for Enter so a double-clicked console window stays open.
fn acknowledge(no_pause: bool) {
    let stdin = io::stdin();
    if no_pause || !stdin.is_terminal() {
        return;
    }
    print!("\nPress Enter to exit...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = stdin.lock().read_line(&mut line);
}
