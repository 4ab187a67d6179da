//! Infrastructure implementations of the `ServiceHost` port.
//!
//! Each host drives the platform service manager through a `CommandRunner`:
//! `systemctl` on Linux, `launchctl` on macOS and `sc.exe` on Windows. All
//! three compile everywhere so they can be exercised with a scripted runner.
//! `start` only succeeds if the service is still running after a short
//! settle period, so an executable that crashes on launch counts as a failed
//! start and triggers rollback.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};

use crate::application::ports::{CommandRunner, ServiceHost};
use crate::infra::command_runner::{TokioCommandRunner, check_success};
use crate::infra::fs::install_executable;

/// How long a freshly started service must stay up.
pub const DEFAULT_START_SETTLE: Duration = Duration::from_secs(3);

/// How long to wait for a Windows service to reach a requested state.
pub const SCM_STATE_TIMEOUT: Duration = Duration::from_secs(30);
const SCM_POLL: Duration = Duration::from_millis(500);

async fn confirm_started(host: &impl ServiceHost, service: &str, settle: Duration) -> Result<()> {
    if settle.is_zero() {
        return Ok(());
    }
    tokio::time::sleep(settle).await;
    if host.is_running(service).await? {
        Ok(())
    } else {
        bail!("{service} exited within {}s of starting", settle.as_secs())
    }
}

// ── systemd ──────────────────────────────────────────────────────────────────

pub struct SystemdHost<R> {
    runner: R,
    settle: Duration,
}

impl<R: CommandRunner> SystemdHost<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            settle: DEFAULT_START_SETTLE,
        }
    }

    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    async fn systemctl(&self, args: &[&str]) -> Result<()> {
        let output = self.runner.run("systemctl", args).await?;
        check_success("systemctl", args, &output)
    }
}

impl<R: CommandRunner + 'static> ServiceHost for SystemdHost<R> {
    async fn stop(&self, service: &str) -> Result<()> {
        self.systemctl(&["stop", service]).await
    }

    async fn start(&self, service: &str) -> Result<()> {
        self.systemctl(&["start", service]).await?;
        confirm_started(self, service, self.settle).await
    }

    async fn is_running(&self, service: &str) -> Result<bool> {
        let output = self
            .runner
            .run("systemctl", &["is-active", "--quiet", service])
            .await?;
        Ok(output.status.success())
    }

    fn install_artifact(&self, staged: &Path, target: &Path) -> Result<()> {
        install_executable(staged, target)
    }
}

// ── launchd ──────────────────────────────────────────────────────────────────

pub struct LaunchdHost<R> {
    runner: R,
    plist_dir: PathBuf,
    settle: Duration,
}

impl<R: CommandRunner> LaunchdHost<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            plist_dir: PathBuf::from("/Library/LaunchDaemons"),
            settle: DEFAULT_START_SETTLE,
        }
    }

    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn plist(&self, service: &str) -> String {
        self.plist_dir
            .join(format!("{service}.plist"))
            .to_string_lossy()
            .into_owned()
    }

    async fn launchctl(&self, args: &[&str]) -> Result<()> {
        let output = self.runner.run("launchctl", args).await?;
        check_success("launchctl", args, &output)
    }
}

impl<R: CommandRunner + 'static> ServiceHost for LaunchdHost<R> {
    async fn stop(&self, service: &str) -> Result<()> {
        let plist = self.plist(service);
        self.launchctl(&["unload", &plist]).await
    }

    async fn start(&self, service: &str) -> Result<()> {
        let plist = self.plist(service);
        self.launchctl(&["load", "-w", &plist]).await?;
        confirm_started(self, service, self.settle).await
    }

    async fn is_running(&self, service: &str) -> Result<bool> {
        let output = self.runner.run("launchctl", &["list", service]).await?;
        if !output.status.success() {
            return Ok(false);
        }
        Ok(String::from_utf8_lossy(&output.stdout).contains("\"PID\" ="))
    }

    fn install_artifact(&self, staged: &Path, target: &Path) -> Result<()> {
        install_executable(staged, target)
    }
}

// ── Windows service control manager ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScState {
    Stopped,
    StartPending,
    StopPending,
    Running,
    Other,
}

/// Parse the `STATE` line of `sc.exe query` output.
#[must_use]
pub fn parse_sc_state(stdout: &str) -> Option<ScState> {
    let line = stdout
        .lines()
        .find(|l| l.trim_start().starts_with("STATE"))?;
    let (_, rest) = line.split_once(':')?;
    let name = rest.split_whitespace().nth(1)?;
    Some(match name {
        "STOPPED" => ScState::Stopped,
        "START_PENDING" => ScState::StartPending,
        "STOP_PENDING" => ScState::StopPending,
        "RUNNING" => ScState::Running,
        _ => ScState::Other,
    })
}

/// `sc.exe` exit code when stopping a service that is not started.
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;
/// `sc.exe` exit code when starting a service that is already running.
const ERROR_SERVICE_ALREADY_RUNNING: i32 = 1056;

pub struct WindowsScmHost<R> {
    runner: R,
    settle: Duration,
    state_timeout: Duration,
}

impl<R: CommandRunner> WindowsScmHost<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            settle: DEFAULT_START_SETTLE,
            state_timeout: SCM_STATE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    async fn state(&self, service: &str) -> Result<Option<ScState>> {
        let output = self.runner.run("sc.exe", &["query", service]).await?;
        check_success("sc.exe", &["query", service], &output)?;
        Ok(parse_sc_state(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn wait_for(&self, service: &str, wanted: ScState) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.state_timeout;
        loop {
            let state = self.state(service).await?;
            if state == Some(wanted) {
                return Ok(());
            }
            if state == Some(ScState::Stopped) && wanted == ScState::Running {
                bail!("{service} stopped while starting");
            }
            if tokio::time::Instant::now() >= deadline {
                bail!(
                    "{service} did not reach {wanted:?} within {}s (last state {state:?})",
                    self.state_timeout.as_secs()
                );
            }
            tokio::time::sleep(SCM_POLL).await;
        }
    }

    async fn sc(&self, args: &[&str], tolerated: i32) -> Result<()> {
        let output = self.runner.run("sc.exe", args).await?;
        if output.status.code() == Some(tolerated) {
            return Ok(());
        }
        check_success("sc.exe", args, &output)
    }
}

impl<R: CommandRunner + 'static> ServiceHost for WindowsScmHost<R> {
    async fn stop(&self, service: &str) -> Result<()> {
        self.sc(&["stop", service], ERROR_SERVICE_NOT_ACTIVE).await?;
        self.wait_for(service, ScState::Stopped).await
    }

    async fn start(&self, service: &str) -> Result<()> {
        self.sc(&["start", service], ERROR_SERVICE_ALREADY_RUNNING)
            .await?;
        self.wait_for(service, ScState::Running).await?;
        confirm_started(self, service, self.settle).await
    }

    async fn is_running(&self, service: &str) -> Result<bool> {
        Ok(self.state(service).await? == Some(ScState::Running))
    }

    fn install_artifact(&self, staged: &Path, target: &Path) -> Result<()> {
        install_executable(staged, target)
    }
}

// ── Platform selection ───────────────────────────────────────────────────────

#[cfg(windows)]
pub type PlatformHost = WindowsScmHost<TokioCommandRunner>;

#[cfg(target_os = "macos")]
pub type PlatformHost = LaunchdHost<TokioCommandRunner>;

#[cfg(all(unix, not(target_os = "macos")))]
pub type PlatformHost = SystemdHost<TokioCommandRunner>;

/// The service manager of the running platform.
#[must_use]
pub fn platform_host() -> PlatformHost {
    PlatformHost::new(TokioCommandRunner::default())
}
