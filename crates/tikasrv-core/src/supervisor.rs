//! Launching and tearing down the Tika server process.
//!
//! [`Supervisor::start`] spawns the server bound to a child [`Context`],
//! waits for the readiness probe and hands back a [`RunningServer`]. The
//! child process is owned by a background task that kills and reaps it as
//! soon as that context is cancelled, so cancelling the caller's context,
//! calling [`RunningServer::teardown`] or dropping the `RunningServer` all
//! stop the server.
//!
//! Stdout and stderr are drained for the whole life of the process into one
//! bounded buffer; on a failed start its contents are attached to the error.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handle::ServerHandle;
use crate::probe::{Prober, ReadinessProbe, VersionClient};

/// Most recent output kept per process.
const MAX_CAPTURED_OUTPUT: usize = 256 * 1024;

/// How long to keep reading output after the process is gone (pipes may be
/// held open by grandchildren).
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

/// How a supervised process ended.
#[derive(Debug)]
pub struct ServerExit {
    /// Exit status, or why waiting for it failed.
    pub status: io::Result<ExitStatus>,
    /// Combined stdout and stderr (tail, lossy UTF-8).
    pub output: String,
    /// Set when the output could not be fully collected.
    pub capture_error: Option<String>,
}

impl ServerExit {
    fn status_string(&self) -> String {
        match &self.status {
            Ok(status) => status.to_string(),
            Err(e) => format!("wait failed: {}", e),
        }
    }
}

/// A started server. Owns the process until [`RunningServer::teardown`] or
/// [`RunningServer::shutdown`] is called, or the value is dropped.
#[derive(Debug)]
pub struct RunningServer {
    handle: ServerHandle,
    scope: Context,
    pid: Option<u32>,
    task: Option<JoinHandle<ServerExit>>,
}

impl RunningServer {
    pub fn handle(&self) -> &ServerHandle {
        &self.handle
    }

    pub fn url(&self) -> &str {
        self.handle.url()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// True once the process has exited and been reaped.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stops the server. Returns immediately; safe to call more than once.
    pub fn teardown(&self) {
        if self.scope.err().is_none() {
            info!(url = %self.handle.url(), pid = ?self.pid, "tearing down server");
        }
        self.scope.cancel();
    }

    /// Stops the server and waits until the process has been reaped.
    pub async fn shutdown(mut self) -> Result<ServerExit> {
        self.teardown();
        let task = match self.task.take() {
            Some(task) => task,
            None => {
                return Err(Error::io(
                    "wait",
                    self.handle.binary(),
                    io::Error::new(io::ErrorKind::Other, "server already reaped"),
                ))
            }
        };
        task.await.map_err(|e| {
            Error::io(
                "wait",
                self.handle.binary(),
                io::Error::new(io::ErrorKind::Other, e),
            )
        })
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

/// Starts servers and waits for them with a [`Prober`].
#[derive(Debug, Clone)]
pub struct Supervisor<P> {
    prober: Prober<P>,
    startup_timeout: Option<Duration>,
}

impl Default for Supervisor<VersionClient> {
    fn default() -> Self {
        Self::new(Prober::new(VersionClient::default()))
    }
}

impl<P: ReadinessProbe> Supervisor<P> {
    pub fn new(prober: Prober<P>) -> Self {
        Self {
            prober,
            startup_timeout: None,
        }
    }

    /// Bounds the readiness wait without limiting how long the server runs
    /// afterwards. Without it, only `ctx` bounds the wait.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    /// Launches the server described by `handle` and waits until it answers
    /// the readiness probe or `ctx` (or the startup timeout) is done. The
    /// process lives until `ctx` is cancelled or the returned server is torn
    /// down.
    ///
    /// Every failure path stops the process before returning. A readiness
    /// failure carries the process output collected so far.
    pub async fn start(&self, ctx: &Context, handle: &ServerHandle) -> Result<RunningServer> {
        let scope = ctx.with_cancel();
        // Dropping this future before it returns kills the child.
        let kill_guard = scope.cancel_on_drop();
        let (program, args) = handle.command_line();
        let program_name = program.to_string_lossy().into_owned();

        let mut child = match Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                scope.cancel();
                return Err(Error::FailedToStart {
                    program: program_name,
                    source,
                });
            }
        };

        let pid = child.id();
        info!(program = %program_name, port = %handle.port(), pid = ?pid, "server process spawned");

        let output = Arc::new(Mutex::new(Vec::new()));
        let readers = tokio::spawn(collect_output(
            child.stdout.take(),
            child.stderr.take(),
            Arc::clone(&output),
        ));
        let mut task = tokio::spawn(supervise(child, scope.clone(), readers, output));

        let startup = match self.startup_timeout {
            Some(timeout) => scope.with_timeout(timeout),
            None => scope.clone(),
        };
        let ready = tokio::select! {
            biased;
            ready = self.prober.wait_until_ready(&startup, handle.url()) => ready,
            exit = &mut task => {
                let cause = startup.err();
                scope.cancel();
                let exit = exit.map_err(|e| {
                    Error::io("wait", handle.binary(), io::Error::new(io::ErrorKind::Other, e))
                })?;
                if let Some(cause) = cause {
                    return Err(Error::FailedReadiness {
                        url: handle.url().to_string(),
                        cause,
                        output: exit.output,
                        capture_error: exit.capture_error,
                    });
                }
                warn!(pid = ?pid, status = %exit.status_string(), "server exited before becoming ready");
                return Err(Error::ExitedEarly {
                    status: exit.status_string(),
                    output: exit.output,
                });
            }
        };

        if let Err(cause) = ready {
            scope.cancel();
            warn!(url = %handle.url(), %cause, "server did not become ready");
            let (output, capture_error) = match task.await {
                Ok(exit) => (exit.output, exit.capture_error),
                Err(e) => (String::new(), Some(format!("supervisor task: {}", e))),
            };
            return Err(Error::FailedReadiness {
                url: handle.url().to_string(),
                cause,
                output,
                capture_error,
            });
        }

        info!(url = %handle.url(), pid = ?pid, "server ready");
        kill_guard.disarm();
        Ok(RunningServer {
            handle: handle.clone(),
            scope,
            pid,
            task: Some(task),
        })
    }
}

/// Starts `handle` with the default version probe and poll interval.
pub async fn start(ctx: &Context, handle: &ServerHandle) -> Result<RunningServer> {
    Supervisor::<VersionClient>::default().start(ctx, handle).await
}

/// Owns the child: waits for it to exit, or kills it once `scope` is done.
async fn supervise(
    mut child: Child,
    scope: Context,
    mut readers: JoinHandle<io::Result<()>>,
    output: Arc<Mutex<Vec<u8>>>,
) -> ServerExit {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = scope.done() => {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "kill failed, process may have exited already");
            }
            child.wait().await
        }
    };
    debug!(?status, "server process exited");

    let capture_error = match tokio::time::timeout(OUTPUT_GRACE, &mut readers).await {
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(e))) => Some(e.to_string()),
        Ok(Err(e)) => Some(format!("output reader: {}", e)),
        Err(_) => {
            readers.abort();
            Some("output pipes still open after exit".to_string())
        }
    };

    let output = {
        let buf = output.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    };
    ServerExit {
        status,
        output,
        capture_error,
    }
}

async fn collect_output<O, E>(
    stdout: Option<O>,
    stderr: Option<E>,
    buf: Arc<Mutex<Vec<u8>>>,
) -> io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let (out, err) = tokio::join!(drain(stdout, &buf), drain(stderr, &buf));
    out.and(err)
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>, buf: &Mutex<Vec<u8>>) -> io::Result<()> {
    let Some(mut reader) = reader else {
        return Ok(());
    };
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        let mut guard = buf.lock().unwrap_or_else(|e| e.into_inner());
        guard.extend_from_slice(&chunk[..n]);
        if guard.len() > MAX_CAPTURED_OUTPUT {
            let excess = guard.len() - MAX_CAPTURED_OUTPUT;
            guard.drain(..excess);
        }
    }
}
