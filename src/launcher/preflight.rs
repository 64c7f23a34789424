use std::io;
use std::net::{Ipv4Addr, TcpListener};
use std::process::Stdio;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::Command;

use crate::config::{LauncherConfig, PortProbe};
use crate::error::LaunchError;

/// Runs `<runtime> --version` and returns its trimmed output.
///
/// A missing executable, a non-zero exit, or exceeding the configured timeout
/// all come back as [`LaunchError::RuntimeMissing`].
pub async fn detect_runtime(cfg: &LauncherConfig) -> Result<String, LaunchError> {
    let runtime = cfg.runtime_name();
    let missing = |reason: String| LaunchError::RuntimeMissing {
        runtime: runtime.clone(),
        reason,
    };

    let mut cmd = Command::new(&cfg.runtime);
    cmd.arg(&cfg.runtime_version_arg)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(cfg.runtime_timeout, cmd.output()).await {
        Err(_) => {
            return Err(missing(format!(
                "version check timed out after {:?}",
                cfg.runtime_timeout
            )));
        }
        Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
            return Err(missing("not installed or not on PATH".to_string()));
        }
        Ok(Err(e)) => return Err(missing(e.to_string())),
        Ok(Ok(out)) => out,
    };

    if !output.status.success() {
        return Err(missing(format!("version check exited with {}", output.status)));
    }
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    tracing::debug!(%runtime, %version, "runtime detected");
    Ok(version)
}

pub async fn check_runtime_available(cfg: &LauncherConfig) -> bool {
    detect_runtime(cfg).await.is_ok()
}

/// Whether nothing is listening on `127.0.0.1:port`.
///
/// Racy by nature: the port can be taken between this check and the
/// backend binding it.
pub async fn check_port_free(port: u16, probe: PortProbe, timeout: Duration) -> bool {
    let free = match probe {
        PortProbe::Connect => {
            let attempt = tokio::time::timeout(timeout, TcpStream::connect((Ipv4Addr::LOCALHOST, port)));
            !matches!(attempt.await, Ok(Ok(_)))
        }
        PortProbe::Bind => TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok(),
    };
    tracing::debug!(port, ?probe, free, "port probe");
    free
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn unused_port() -> u16 {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn occupied_port_is_reported_by_both_probes() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let t = Duration::from_secs(2);
        assert!(!check_port_free(port, PortProbe::Connect, t).await);
        assert!(!check_port_free(port, PortProbe::Bind, t).await);
    }

    #[tokio::test]
    async fn released_port_is_free() {
        let port = unused_port();
        let t = Duration::from_secs(2);
        assert!(check_port_free(port, PortProbe::Connect, t).await);
        assert!(check_port_free(port, PortProbe::Bind, t).await);
    }

    #[tokio::test]
    async fn missing_runtime_is_unavailable() {
        let mut cfg = LauncherConfig::new(".");
        cfg.runtime = OsString::from("labkit-no-such-runtime-7f3a");
        assert!(!check_runtime_available(&cfg).await);
        match detect_runtime(&cfg).await {
            Err(LaunchError::RuntimeMissing { runtime, .. }) => {
                assert_eq!(runtime, "labkit-no-such-runtime-7f3a");
            }
            other => panic!("expected RuntimeMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn present_runtime_reports_its_version() {
        let mut cfg = LauncherConfig::new(".");
        cfg.runtime = OsString::from(env!("CARGO"));
        let version = detect_runtime(&cfg).await.unwrap();
        assert!(version.starts_with("cargo"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_version_command_is_unavailable() {
        let mut cfg = LauncherConfig::new(".");
        cfg.runtime = OsString::from("false");
        assert!(!check_runtime_available(&cfg).await);
    }
}
