use std::ffi::{OsStr, OsString};
use std::fmt;
use std::future::Future;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use crate::config::LauncherConfig;
use crate::error::LaunchError;
use crate::launcher::preflight::check_port_free;

/// Lifecycle of the backend child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Absent,
    PortBlocked,
    Starting,
    Running,
    Failed,
    Stopped,
}

impl BackendState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when ended by a signal.
    pub code: Option<i32>,
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        ProcessExit { code: status.code() }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Control surface the launcher needs over a spawned backend.
pub trait BackendProcess {
    fn id(&self) -> Option<u32>;

    /// Non-blocking exit check.
    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>>;

    fn wait(&mut self) -> impl Future<Output = io::Result<ProcessExit>>;

    /// Politely asks the process to stop (SIGTERM on Unix).
    fn terminate(&mut self) -> io::Result<()>;

    /// Forcibly kills the process and reaps it.
    fn kill(&mut self) -> impl Future<Output = io::Result<()>>;
}

/// Starts backend processes.
pub trait Spawn {
    type Process: BackendProcess;

    fn spawn(&self, program: &OsStr, args: &[OsString], cwd: &Path) -> io::Result<Self::Process>;
}

/// Spawns real child processes that share the launcher's console.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

impl Spawn for SystemSpawner {
    type Process = ChildProcess;

    fn spawn(&self, program: &OsStr, args: &[OsString], cwd: &Path) -> io::Result<ChildProcess> {
        let child = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        Ok(ChildProcess { inner: child })
    }
}

#[derive(Debug)]
pub struct ChildProcess {
    inner: tokio::process::Child,
}

impl BackendProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.inner.id()
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self.inner.try_wait()?.map(ProcessExit::from))
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        Ok(self.inner.wait().await?.into())
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        // id() is None once the child has been reaped
        let Some(pid) = self.inner.id() else {
            return Ok(());
        };
        let pid = i32::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(io::Error::from)
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.inner.start_kill()
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.inner.kill().await
    }
}

/// How a graceful shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The process had exited before we asked.
    AlreadyExited(ProcessExit),
    /// Exited within the grace period after the terminate request.
    Terminated(ProcessExit),
    /// Still alive after the grace period and force-killed.
    Killed,
}

/// What ended the monitoring wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    Exited(ProcessExit),
    Interrupted,
}

/// A spawned backend, exclusively owned by the launcher.
#[derive(Debug)]
pub struct Backend<P> {
    process: P,
    pid: Option<u32>,
    state: BackendState,
}

impl<P: BackendProcess> Backend<P> {
    pub fn state(&self) -> BackendState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    fn transition(&mut self, next: BackendState) {
        tracing::debug!(from = ?self.state, to = ?next, pid = ?self.pid, "backend state");
        self.state = next;
    }

    /// Waits out the startup delay, then checks the process is still alive.
    ///
    /// Moves Starting to Running, or to Failed if the process already exited.
    pub async fn confirm_started(&mut self, delay: Duration) -> Result<(), LaunchError> {
        tokio::time::sleep(delay).await;
        match self.process.try_wait() {
            Ok(None) => {
                self.transition(BackendState::Running);
                Ok(())
            }
            Ok(Some(exit)) => {
                self.transition(BackendState::Failed);
                Err(LaunchError::StartupFailed(exit.to_string()))
            }
            Err(e) => {
                self.transition(BackendState::Failed);
                Err(LaunchError::Process(e))
            }
        }
    }

    /// Blocks until the backend exits on its own or `interrupt` resolves.
    ///
    /// An interrupt leaves the state untouched; call [`Backend::shutdown`] next.
    pub async fn monitor<I>(&mut self, interrupt: I) -> Result<MonitorOutcome, LaunchError>
    where
        I: Future<Output = io::Result<()>>,
    {
        tokio::select! {
            biased;
            signal = interrupt => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "interrupt listener failed; shutting down");
                }
                Ok(MonitorOutcome::Interrupted)
            }
            exit = self.process.wait() => {
                let exit = exit?;
                self.transition(BackendState::Stopped);
                Ok(MonitorOutcome::Exited(exit))
            }
        }
    }

    /// Terminate, wait up to `grace`, then kill.
    pub async fn shutdown(&mut self, grace: Duration) -> Result<ShutdownOutcome, LaunchError> {
        if let Some(exit) = self.process.try_wait()? {
            self.transition(BackendState::Stopped);
            return Ok(ShutdownOutcome::AlreadyExited(exit));
        }

        self.process.terminate()?;
        let outcome = match tokio::time::timeout(grace, self.process.wait()).await {
            Ok(exit) => ShutdownOutcome::Terminated(exit?),
            Err(_) => {
                tracing::warn!(pid = ?self.pid, ?grace, "backend ignored terminate; killing");
                self.process.kill().await?;
                ShutdownOutcome::Killed
            }
        };
        self.transition(BackendState::Stopped);
        Ok(outcome)
    }
}

/// Checks that the backend can be started: the script exists, then the port
/// is free. Returns the script file name to run.
///
/// Nothing is spawned either way; [`LaunchError::backend_state`] gives the
/// state a failure leaves the backend in.
pub async fn preflight_backend(cfg: &LauncherConfig) -> Result<OsString, LaunchError> {
    let script = cfg.backend_script_path();
    if !script.is_file() {
        return Err(LaunchError::MissingBackendScript(script));
    }

    if !check_port_free(cfg.port, cfg.port_probe, cfg.port_probe_timeout).await {
        return Err(LaunchError::PortInUse(cfg.port));
    }

    script
        .file_name()
        .map(OsString::from)
        .ok_or(LaunchError::MissingBackendScript(script))
}

/// Spawns `<runtime> <script_name>` in the script's directory.
///
/// Call after [`preflight_backend`]. On success the backend is Starting;
/// follow with [`Backend::confirm_started`].
pub fn start_backend<S: Spawn>(
    cfg: &LauncherConfig,
    spawner: &S,
    script_name: OsString,
) -> Result<Backend<S::Process>, LaunchError> {
    let cwd = cfg.backend_dir();
    tracing::info!(runtime = ?cfg.runtime, script = ?script_name, cwd = %cwd.display(), "spawning backend");

    let process = spawner
        .spawn(&cfg.runtime, &[script_name], &cwd)
        .map_err(LaunchError::Spawn)?;
    let pid = process.id();
    Ok(Backend {
        process,
        pid,
        state: BackendState::Starting,
    })
}

/// [`preflight_backend`] followed by [`start_backend`].
pub async fn spawn_backend<S: Spawn>(cfg: &LauncherConfig, spawner: &S) -> Result<Backend<S::Process>, LaunchError> {
    let script_name = preflight_backend(cfg).await?;
    start_backend(cfg, spawner, script_name)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// What happened to fake processes, shared with the test body.
    #[derive(Debug, Default)]
    pub struct Journal {
        pub spawned: Vec<(OsString, Vec<OsString>, std::path::PathBuf)>,
        pub events: Vec<&'static str>,
    }

    #[derive(Debug, Clone, Copy)]
    pub enum Behavior {
        /// Runs until terminated.
        Obedient,
        /// Ignores terminate; only kill stops it.
        Stubborn,
        /// Exits by itself right away with this code.
        Crashes(i32),
        /// Runs for a while, then exits by itself with this code.
        ExitsAfter(Duration, i32),
    }

    #[derive(Debug, Clone)]
    pub struct FakeSpawner {
        pub behavior: Behavior,
        pub journal: Arc<Mutex<Journal>>,
    }

    impl FakeSpawner {
        pub fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                journal: Arc::default(),
            }
        }

        pub fn spawn_count(&self) -> usize {
            self.journal.lock().unwrap().spawned.len()
        }

        pub fn events(&self) -> Vec<&'static str> {
            self.journal.lock().unwrap().events.clone()
        }
    }

    impl Spawn for FakeSpawner {
        type Process = FakeProcess;

        fn spawn(&self, program: &OsStr, args: &[OsString], cwd: &Path) -> io::Result<FakeProcess> {
            self.journal
                .lock()
                .unwrap()
                .spawned
                .push((program.to_os_string(), args.to_vec(), cwd.to_path_buf()));
            let exited = match self.behavior {
                Behavior::Crashes(code) => Some(ProcessExit { code: Some(code) }),
                _ => None,
            };
            Ok(FakeProcess {
                behavior: self.behavior,
                exited,
                started: std::time::Instant::now(),
                journal: Arc::clone(&self.journal),
            })
        }
    }

    #[derive(Debug)]
    pub struct FakeProcess {
        behavior: Behavior,
        exited: Option<ProcessExit>,
        started: std::time::Instant,
        journal: Arc<Mutex<Journal>>,
    }

    impl FakeProcess {
        fn poll_exit(&mut self) -> Option<ProcessExit> {
            if let (None, Behavior::ExitsAfter(after, code)) = (self.exited, self.behavior) {
                if self.started.elapsed() >= after {
                    self.exited = Some(ProcessExit { code: Some(code) });
                }
            }
            self.exited
        }

        fn log(&self, event: &'static str) {
            self.journal.lock().unwrap().events.push(event);
        }

        /// Lets the fake exit on its own, as a crashing server would.
        pub fn exit_now(&mut self, code: i32) {
            self.exited = Some(ProcessExit { code: Some(code) });
        }
    }

    impl BackendProcess for FakeProcess {
        fn id(&self) -> Option<u32> {
            Some(4242)
        }

        fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
            Ok(self.poll_exit())
        }

        async fn wait(&mut self) -> io::Result<ProcessExit> {
            loop {
                if let Some(exit) = self.poll_exit() {
                    return Ok(exit);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        fn terminate(&mut self) -> io::Result<()> {
            self.log("terminate");
            if !matches!(self.behavior, Behavior::Stubborn) {
                self.exited = Some(ProcessExit { code: None });
            }
            Ok(())
        }

        async fn kill(&mut self) -> io::Result<()> {
            self.log("kill");
            self.exited = Some(ProcessExit { code: None });
            Ok(())
        }
    }
}
