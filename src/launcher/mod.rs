//! Local development launcher: preflight, backend lifecycle, frontend.
//!
//! The flow is strictly sequential. The launcher owns the backend child for
//! the whole run and always stops it before returning, whether the operator
//! interrupts during startup or while monitoring.

pub mod backend;
pub mod frontend;
pub mod preflight;

use std::future::Future;
use std::io;
use std::pin::Pin;

pub use backend::{
    Backend, BackendProcess, BackendState, ChildProcess, MonitorOutcome, ProcessExit, ShutdownOutcome, Spawn,
    SystemSpawner,
};
pub use frontend::{Browser, SystemBrowser};

use crate::config::LauncherConfig;
use crate::error::LaunchError;

const RULE_WIDTH: usize = 50;

/// How a successful launcher run ended. Both mean exit status 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The backend stopped by itself while being monitored.
    BackendExited(ProcessExit),
    /// The operator interrupted and the backend was shut down.
    Interrupted(ShutdownOutcome),
    /// The operator interrupted before any backend was spawned.
    Cancelled,
}

pub struct Launcher<'a, S, B> {
    config: &'a LauncherConfig,
    spawner: S,
    browser: B,
}

impl<'a, S: Spawn, B: Browser> Launcher<'a, S, B> {
    pub fn new(config: &'a LauncherConfig, spawner: S, browser: B) -> Self {
        Self {
            config,
            spawner,
            browser,
        }
    }

    /// Runs the whole launch sequence until the backend stops or `interrupt` fires.
    ///
    /// # Errors
    /// Returns the first fatal [`LaunchError`]; frontend problems only warn.
    pub async fn run<I>(&self, interrupt: I) -> Result<LaunchOutcome, LaunchError>
    where
        I: Future<Output = io::Result<()>>,
    {
        let cfg = self.config;
        tokio::pin!(interrupt);

        // The first poll installs the signal listener.
        if or_interrupt(&mut interrupt, std::future::ready(())).await.is_none() {
            return Ok(LaunchOutcome::Cancelled);
        }

        print_banner();

        let Some(version) = or_interrupt(&mut interrupt, preflight::detect_runtime(cfg)).await else {
            return Ok(LaunchOutcome::Cancelled);
        };
        println!("✓ {} is installed: {}", cfg.runtime_name(), version?);
        println!();

        let Some(checked) = or_interrupt(&mut interrupt, backend::preflight_backend(cfg)).await else {
            return Ok(LaunchOutcome::Cancelled);
        };
        let script_name = checked?;

        println!("Starting backend server (port {})...", cfg.port);
        let mut backend = backend::start_backend(cfg, &self.spawner, script_name)?;

        match or_interrupt(&mut interrupt, backend.confirm_started(cfg.startup_delay)).await {
            Some(result) => result?,
            None => return self.stop(&mut backend).await,
        }
        match backend.pid() {
            Some(pid) => println!("✓ Backend server started (PID: {pid})"),
            None => println!("✓ Backend server started"),
        }
        println!("  Server logs appear below");
        println!();

        println!("Waiting for the server to be ready...");
        if or_interrupt(&mut interrupt, tokio::time::sleep(cfg.ready_delay)).await.is_none() {
            return self.stop(&mut backend).await;
        }

        if cfg.open_browser {
            self.activate_frontend();
        }

        print_summary(cfg);

        match backend.monitor(&mut interrupt).await? {
            MonitorOutcome::Exited(exit) => {
                println!();
                println!("Backend server stopped ({exit})");
                Ok(LaunchOutcome::BackendExited(exit))
            }
            MonitorOutcome::Interrupted => self.stop(&mut backend).await,
        }
    }

    fn activate_frontend(&self) {
        println!("Opening frontend page...");
        match frontend::open_frontend(self.config, &self.browser) {
            Ok(_) => println!("✓ Frontend page opened"),
            Err(err) => {
                tracing::warn!(error = %err, "frontend not opened");
                println!("✗ {err}");
                println!(
                    "Warning: could not open the browser automatically; open {} manually",
                    self.config.frontend_path().display()
                );
            }
        }
    }

    async fn stop(&self, backend: &mut Backend<S::Process>) -> Result<LaunchOutcome, LaunchError> {
        println!();
        println!("Shutting down the server...");
        let outcome = backend.shutdown(self.config.grace_period).await?;
        match outcome {
            ShutdownOutcome::Killed => println!("Server did not stop in time and was killed"),
            _ => println!("Server stopped"),
        }
        println!("Thanks for using the lab!");
        Ok(LaunchOutcome::Interrupted(outcome))
    }
}

/// Drives `fut` to completion unless `interrupt` fires first.
async fn or_interrupt<I, F>(interrupt: &mut Pin<&mut I>, fut: F) -> Option<F::Output>
where
    I: Future<Output = io::Result<()>>,
    F: Future,
{
    tokio::select! {
        biased;
        signal = interrupt => {
            if let Err(e) = signal {
                tracing::warn!(error = %e, "interrupt listener failed; treating as interrupt");
            }
            None
        }
        out = fut => Some(out),
    }
}

fn print_banner() {
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("Teaching lab - launcher");
    println!("{}", "=".repeat(RULE_WIDTH));
    println!();
}

fn print_summary(cfg: &LauncherConfig) {
    let frontend = std::path::absolute(cfg.frontend_path()).unwrap_or_else(|_| cfg.frontend_path());
    println!();
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("System is up!");
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("Backend server: {}", cfg.backend_url());
    println!("Frontend page:  {}", frontend.display());
    println!();
    println!("Tips:");
    println!("  - Closing this window stops the backend server");
    println!("  - Press Ctrl+C to shut down cleanly");
    println!();
}

#[cfg(test)]
mod tests {
    use super::backend::testing::{Behavior, FakeSpawner};
    use super::frontend::testing::RecordingBrowser;
    use super::*;
    use std::ffi::OsString;
    use std::net::{Ipv4Addr, TcpListener};
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    fn lab_project() -> (TempDir, LauncherConfig) {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/backend")).unwrap();
        std::fs::create_dir_all(root.join("src/frontend")).unwrap();
        std::fs::write(root.join("src/backend/server.js"), "// server\n").unwrap();
        std::fs::write(root.join("src/frontend/cplus.html"), "<html></html>\n").unwrap();

        let mut cfg = LauncherConfig::new(root);
        cfg.runtime = OsString::from(env!("CARGO"));
        cfg.port = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        cfg.port_probe_timeout = Duration::from_secs(1);
        cfg.startup_delay = Duration::from_millis(20);
        cfg.ready_delay = Duration::from_millis(10);
        cfg.grace_period = Duration::from_millis(100);
        (dir, cfg)
    }

    /// Fires `ms` after the fake backend has been spawned.
    async fn after_spawn(spawner: FakeSpawner, ms: u64) -> io::Result<()> {
        while spawner.spawn_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }

    #[tokio::test]
    async fn interrupt_while_running_terminates_backend() {
        let (_dir, cfg) = lab_project();
        let spawner = FakeSpawner::new(Behavior::Obedient);
        let browser = RecordingBrowser::default();
        let launcher = Launcher::new(&cfg, spawner.clone(), &browser);

        let outcome = launcher.run(after_spawn(spawner.clone(), 150)).await.unwrap();
        assert!(matches!(outcome, LaunchOutcome::Interrupted(ShutdownOutcome::Terminated(_))));
        assert_eq!(spawner.spawn_count(), 1);
        assert_eq!(spawner.events(), vec!["terminate"]);
        assert_eq!(browser.opened.borrow().len(), 1);
    }

    #[tokio::test]
    async fn stubborn_backend_is_killed_after_grace() {
        let (_dir, cfg) = lab_project();
        let spawner = FakeSpawner::new(Behavior::Stubborn);
        let launcher = Launcher::new(&cfg, spawner.clone(), RecordingBrowser::default());

        let outcome = launcher.run(after_spawn(spawner.clone(), 100)).await.unwrap();
        assert_eq!(outcome, LaunchOutcome::Interrupted(ShutdownOutcome::Killed));
        assert_eq!(spawner.events(), vec!["terminate", "kill"]);
    }

    #[tokio::test]
    async fn interrupt_during_startup_still_stops_backend() {
        let (_dir, mut cfg) = lab_project();
        cfg.startup_delay = Duration::from_secs(30);
        let spawner = FakeSpawner::new(Behavior::Obedient);
        let browser = RecordingBrowser::default();
        let launcher = Launcher::new(&cfg, spawner.clone(), &browser);

        let outcome = launcher.run(after_spawn(spawner.clone(), 20)).await.unwrap();
        assert!(matches!(outcome, LaunchOutcome::Interrupted(ShutdownOutcome::Terminated(_))));
        assert_eq!(spawner.events(), vec!["terminate"]);
        assert!(browser.opened.borrow().is_empty());
    }

    #[tokio::test]
    async fn backend_exiting_on_its_own_ends_the_run() {
        let (_dir, cfg) = lab_project();
        let spawner = FakeSpawner::new(Behavior::ExitsAfter(Duration::from_millis(300), 0));
        let launcher = Launcher::new(&cfg, spawner.clone(), RecordingBrowser::default());

        let outcome = launcher.run(std::future::pending::<io::Result<()>>()).await.unwrap();
        assert_eq!(outcome, LaunchOutcome::BackendExited(ProcessExit { code: Some(0) }));
        assert!(spawner.events().is_empty());
    }

    #[tokio::test]
    async fn missing_frontend_does_not_abort() {
        let (dir, mut cfg) = lab_project();
        std::fs::remove_file(dir.path().join("src/frontend/cplus.html")).unwrap();
        cfg.frontend_file = "src/frontend/cplus.html".into();
        let spawner = FakeSpawner::new(Behavior::Obedient);
        let browser = RecordingBrowser::default();
        let launcher = Launcher::new(&cfg, spawner.clone(), &browser);

        let outcome = launcher.run(after_spawn(spawner.clone(), 100)).await.unwrap();
        assert!(matches!(outcome, LaunchOutcome::Interrupted(_)));
        assert!(browser.opened.borrow().is_empty());
    }

    #[tokio::test]
    async fn no_browser_skips_frontend() {
        let (_dir, mut cfg) = lab_project();
        cfg.open_browser = false;
        let spawner = FakeSpawner::new(Behavior::Obedient);
        let browser = RecordingBrowser::default();
        let launcher = Launcher::new(&cfg, spawner.clone(), &browser);

        launcher.run(after_spawn(spawner.clone(), 80)).await.unwrap();
        assert!(browser.opened.borrow().is_empty());
    }

    #[tokio::test]
    async fn startup_crash_is_fatal() {
        let (_dir, cfg) = lab_project();
        let launcher = Launcher::new(&cfg, FakeSpawner::new(Behavior::Crashes(1)), RecordingBrowser::default());

        let err = launcher.run(std::future::pending::<io::Result<()>>()).await.unwrap_err();
        assert!(matches!(err, LaunchError::StartupFailed(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn interrupt_before_spawn_cancels_cleanly() {
        let (_dir, cfg) = lab_project();
        let spawner = FakeSpawner::new(Behavior::Obedient);
        let launcher = Launcher::new(&cfg, spawner.clone(), RecordingBrowser::default());

        let outcome = launcher.run(std::future::ready::<io::Result<()>>(Ok(()))).await.unwrap();
        assert_eq!(outcome, LaunchOutcome::Cancelled);
        assert_eq!(spawner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn missing_runtime_stops_before_spawning() {
        let (_dir, mut cfg) = lab_project();
        cfg.runtime = OsString::from("labkit-no-such-runtime-7f3a");
        let spawner = FakeSpawner::new(Behavior::Obedient);
        let launcher = Launcher::new(&cfg, spawner.clone(), RecordingBrowser::default());

        let err = launcher.run(std::future::pending::<io::Result<()>>()).await.unwrap_err();
        assert!(matches!(err, LaunchError::RuntimeMissing { .. }));
        assert_eq!(spawner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn occupied_port_stops_before_spawning() {
        let (_dir, mut cfg) = lab_project();
        let holder = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        cfg.port = holder.local_addr().unwrap().port();
        let spawner = FakeSpawner::new(Behavior::Obedient);
        let launcher = Launcher::new(&cfg, spawner.clone(), RecordingBrowser::default());

        let err = launcher.run(std::future::pending::<io::Result<()>>()).await.unwrap_err();
        assert!(matches!(err, LaunchError::PortInUse(p) if p == cfg.port));
        assert_eq!(spawner.spawn_count(), 0);
    }
}
