//! App-under-test management - spawning and health checking the web server
//!
//! The prompt library is an external collaborator: this harness either
//! spawns it from a binary or attaches to an instance already listening.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Handle to the application under test
pub struct ServerHandle {
    /// The spawned process, when we own the lifecycle
    child: Option<Child>,
    base_url: String,
}

impl ServerHandle {
    /// Spawn the app server binary and wait until it serves the health path
    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        let command = config.command.clone().ok_or_else(|| {
            E2eError::ServerStartup("no app binary configured and no base URL to attach to".into())
        })?;

        let port = config.port.unwrap_or_else(find_free_port);
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning app server on port {}", port);

        let mut cmd = Command::new(&command);
        cmd.args(&config.args)
            .env("PROMPTLIB_PORT", port.to_string())
            .env("PROMPTLIB_HOST", "127.0.0.1")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!("Failed to spawn {}: {}", command.display(), e))
        })?;

        // Keep the pipes drained so a chatty app never blocks on a full buffer
        if let Some(stdout) = child.stdout.take() {
            drain(stdout, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            drain(stderr, "stderr");
        }

        let handle = ServerHandle {
            child: Some(child),
            base_url,
        };

        handle
            .wait_for_healthy(&config.health_path, config.startup_timeout)
            .await?;

        info!("App server is healthy at {}", handle.base_url);
        Ok(handle)
    }

    /// Attach to an app server that is already running
    pub async fn attach(config: ServerConfig) -> E2eResult<Self> {
        let base_url = config.base_url.clone().ok_or_else(|| {
            E2eError::ServerStartup("attach requires a base URL".into())
        })?;

        let handle = ServerHandle {
            child: None,
            base_url,
        };

        handle
            .wait_for_healthy(&config.health_path, config.startup_timeout)
            .await?;

        info!("Attached to app server at {}", handle.base_url);
        Ok(handle)
    }

    /// Wait for the server to respond on the health path
    async fn wait_for_healthy(&self, health_path: &str, timeout: Duration) -> E2eResult<()> {
        let health_url = format!("{}{}", self.base_url, health_path);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for app server to start...");
                    }
                    // Connection refused is expected while the server is starting
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the server if this handle owns it
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(()); // Attached, not ours to stop
        };

        info!("Stopping app server (pid: {})", child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        // Force kill if still running
        let _ = child.kill();
        let _ = child.wait();

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for reaching the application under test
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the app server binary (spawn mode)
    pub command: Option<PathBuf>,

    /// Extra arguments for the app server binary
    pub args: Vec<String>,

    /// Base URL of an already running instance (attach mode)
    pub base_url: Option<String>,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Path polled until it answers 2xx
    pub health_path: String,

    /// Timeout for server startup
    pub startup_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: Some(PathBuf::from("target/debug/promptlib-web")),
            args: Vec::new(),
            base_url: None,
            port: None,
            // The listing route doubles as the health probe
            health_path: "/prompts".to_string(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Whether this configuration attaches rather than spawns
    pub fn is_attach(&self) -> bool {
        self.base_url.is_some()
    }
}

/// Forward a child pipe to the log from a background thread
///
/// Returns the number of lines read, once the pipe closes.
fn drain<R: Read + Send + 'static>(reader: R, label: &'static str) -> std::thread::JoinHandle<usize> {
    std::thread::spawn(move || {
        let mut count = 0;
        for line in BufReader::new(reader).lines() {
            let Ok(line) = line else { break };
            debug!("app {}: {}", label, line);
            count += 1;
        }
        count
    })
}

/// Find a free port to use
fn find_free_port() -> u16 {
    use std::net::TcpListener;

    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to find free port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}
