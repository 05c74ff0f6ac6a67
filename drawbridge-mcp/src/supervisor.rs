//! Supervision of the optional sibling stdio MCP binary.
//!
//! Some agent runtimes only speak stdio transports. When a sibling binary
//! exposing the same tool catalogue over stdio exists, the server spawns and
//! supervises it; when it does not, the HTTP transport simply remains the
//! only one. Child faults never propagate - the supervisor retries with a
//! bounded budget and then disables itself.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Lifecycle of the supervised child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No child running (not yet started, no binary found, or stopped).
    Idle,
    /// A spawn is in progress.
    Starting,
    /// The child is alive.
    Running,
    /// The child exited and a restart is pending.
    Restarting,
    /// The restart budget is exhausted; the child stays down.
    Disabled,
}

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Canvas server URL injected into the child environment.
    pub server_url: String,
    /// Candidate binary paths, probed in priority order.
    pub candidates: Vec<PathBuf>,
    /// Restart attempts before disabling.
    pub max_restarts: u32,
    /// Delay between an exit and the respawn.
    pub restart_delay: Duration,
}

impl SupervisorConfig {
    /// Configuration for a server listening on `port`, with the default
    /// candidate list.
    #[must_use]
    pub fn for_port(port: u16) -> Self {
        Self {
            server_url: format!("http://localhost:{port}"),
            candidates: default_candidates(),
            max_restarts: 3,
            restart_delay: Duration::from_secs(2),
        }
    }
}

/// Candidate stdio binaries: explicit override first, then siblings of the
/// running executable, then the working directory.
fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(path) = std::env::var("CANVAS_MCP_BIN") {
        if !path.is_empty() {
            candidates.push(PathBuf::from(path));
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("drawbridge-mcp-stdio"));
            candidates.push(dir.join("../drawbridge-mcp-stdio"));
        }
    }
    candidates.push(PathBuf::from("./drawbridge-mcp-stdio"));
    candidates
}

#[derive(Debug)]
struct Inner {
    config: SupervisorConfig,
    state: Mutex<SupervisorState>,
    shutting_down: AtomicBool,
    restarts: AtomicU32,
    child: tokio::sync::Mutex<Option<Child>>,
}

/// Supervisor for the sibling stdio MCP binary.
#[derive(Debug, Clone)]
pub struct ChildSupervisor {
    inner: Arc<Inner>,
}

impl ChildSupervisor {
    /// Create a supervisor; nothing is spawned until [`ChildSupervisor::start`].
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(SupervisorState::Idle),
                shutting_down: AtomicBool::new(false),
                restarts: AtomicU32::new(0),
                child: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set_state(&self, state: SupervisorState) {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = state;
    }

    /// Probe the candidate list and, when a binary exists, spawn it and
    /// begin supervision in the background. When none exists this logs and
    /// returns - the HTTP transport remains.
    pub fn start(&self) {
        let Some(binary) = self
            .inner
            .config
            .candidates
            .iter()
            .find(|path| path.is_file())
            .cloned()
        else {
            tracing::info!("no stdio MCP binary found; HTTP transport only");
            return;
        };

        tracing::info!(binary = %binary.display(), "starting stdio MCP child");
        let supervisor = self.clone();
        tokio::spawn(async move {
            supervisor.run(binary).await;
        });
    }

    /// Flag shutdown, terminate the child, and clear the handle.
    pub async fn stop(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        let mut guard = self.inner.child.lock().await;
        if let Some(mut child) = guard.take() {
            let _ = child.start_kill();
            if tokio::time::timeout(Duration::from_secs(5), child.wait())
                .await
                .is_err()
            {
                tracing::warn!("stdio MCP child did not exit in time");
            }
        }
        self.set_state(SupervisorState::Idle);
    }

    async fn run(&self, binary: PathBuf) {
        loop {
            if self.inner.shutting_down.load(Ordering::SeqCst) {
                return;
            }
            self.set_state(SupervisorState::Starting);

            match self.spawn_child(&binary) {
                Ok(child) => {
                    self.set_state(SupervisorState::Running);
                    *self.inner.child.lock().await = Some(child);
                    if !self.watch_exit().await {
                        // stop() took the handle.
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(binary = %binary.display(), "failed to spawn stdio MCP child: {e}");
                }
            }

            if self.inner.shutting_down.load(Ordering::SeqCst) {
                return;
            }
            let attempts = self.inner.restarts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempts > self.inner.config.max_restarts {
                tracing::error!(
                    attempts,
                    "stdio MCP child keeps exiting; disabling restarts"
                );
                self.set_state(SupervisorState::Disabled);
                return;
            }
            tracing::warn!(
                attempt = attempts,
                max = self.inner.config.max_restarts,
                "stdio MCP child exited; restarting"
            );
            self.set_state(SupervisorState::Restarting);
            tokio::time::sleep(self.inner.config.restart_delay).await;
        }
    }

    fn spawn_child(&self, binary: &std::path::Path) -> std::io::Result<Child> {
        let mut child = Command::new(binary)
            .env("CANVAS_SERVER_URL", &self.inner.config.server_url)
            .env("NO_COLOR", "1")
            .env("FORCE_COLOR", "0")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // stderr carries the child's log output.
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(target: "mcp_stdio", "{line}");
                }
            });
        }
        // stdout carries JSON-RPC for the agent side; drain it so the pipe
        // never fills, but do not interpret it.
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::trace!(target: "mcp_stdio", "{line}");
                }
            });
        }

        Ok(child)
    }

    /// Poll until the child exits. Returns `false` when the handle was taken
    /// by [`ChildSupervisor::stop`] instead.
    async fn watch_exit(&self) -> bool {
        loop {
            tokio::time::sleep(Duration::from_millis(250)).await;
            let mut guard = self.inner.child.lock().await;
            match guard.as_mut() {
                None => return false,
                Some(child) => match child.try_wait() {
                    Ok(Some(status)) => {
                        tracing::info!(%status, "stdio MCP child exited");
                        *guard = None;
                        return true;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!("failed to poll stdio MCP child: {e}");
                        *guard = None;
                        return true;
                    }
                },
            }
        }
    }
}
