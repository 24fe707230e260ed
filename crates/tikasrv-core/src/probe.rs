//! Readiness polling for a freshly launched server.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::context::{Context, ContextError};

/// Interval between readiness probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Per-request timeout of the default version probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A request that fails while the server is unreachable and succeeds once it
/// serves requests.
pub trait ReadinessProbe: Send + Sync {
    /// Returns the server's version string.
    fn version(&self, base_url: &str) -> impl Future<Output = Result<String, ProbeError>> + Send;
}

#[derive(Debug, thiserror::Error)]
#[error("probe {url}: {reason}")]
pub struct ProbeError {
    pub url: String,
    pub reason: String,
}

/// Default probe: `GET <base>/version` through libcurl.
#[derive(Debug, Clone)]
pub struct VersionClient {
    timeout: Duration,
}

impl Default for VersionClient {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl VersionClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ReadinessProbe for VersionClient {
    fn version(&self, base_url: &str) -> impl Future<Output = Result<String, ProbeError>> + Send {
        let url = format!("{}/version", base_url.trim_end_matches('/'));
        let timeout = self.timeout;
        async move {
            let target = url.clone();
            tokio::task::spawn_blocking(move || get_text(&target, timeout))
                .await
                .map_err(|e| e.to_string())
                .and_then(|r| r)
                .map_err(|reason| ProbeError { url, reason })
        }
    }
}

fn get_text(url: &str, timeout: Duration) -> Result<String, String> {
    let mut body = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(|e| e.to_string())?;
    easy.timeout(timeout).map_err(|e| e.to_string())?;
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(|e| e.to_string())?;
        transfer.perform().map_err(|e| e.to_string())?;
    }
    let code = easy.response_code().map_err(|e| e.to_string())?;
    if !(200..300).contains(&code) {
        return Err(format!("HTTP {}", code));
    }
    Ok(String::from_utf8_lossy(&body).trim().to_string())
}

/// Polls a [`ReadinessProbe`] on a constant interval.
#[derive(Debug, Clone)]
pub struct Prober<P> {
    probe: P,
    interval: Duration,
}

impl<P: ReadinessProbe> Prober<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until a probe against `base_url` succeeds.
    ///
    /// The first probe fires one interval after the call. There is no attempt
    /// limit: the loop only ends on success or when `ctx` is done, in which
    /// case the context's error is returned. A context that is already done
    /// returns without probing.
    pub async fn wait_until_ready(&self, ctx: &Context, base_url: &str) -> Result<(), ContextError> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts: u64 = 0;
        loop {
            tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                _ = ticker.tick() => {}
            }
            attempts += 1;
            match ctx.run(self.probe.version(base_url)).await? {
                Ok(version) => {
                    debug!(%base_url, %version, attempts, "server ready");
                    return Ok(());
                }
                Err(_) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct CountingProbe {
        calls: Arc<AtomicUsize>,
        ready_after: usize,
    }

    impl ReadinessProbe for CountingProbe {
        fn version(&self, base_url: &str) -> impl Future<Output = Result<String, ProbeError>> + Send {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let ready = self.ready_after > 0 && n >= self.ready_after;
            let url = base_url.to_string();
            async move {
                if ready {
                    Ok("Apache Tika 1.16".to_string())
                } else {
                    Err(ProbeError {
                        url,
                        reason: "connection refused".to_string(),
                    })
                }
            }
        }
    }

    #[tokio::test]
    async fn cancelled_context_never_probes() {
        let probe = CountingProbe::default();
        let calls = Arc::clone(&probe.calls);
        let ctx = Context::background();
        ctx.cancel();
        let res = Prober::new(probe)
            .with_interval(Duration::from_millis(1))
            .wait_until_ready(&ctx, "http://localhost:9998")
            .await;
        assert_eq!(res, Err(ContextError::Canceled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn returns_on_first_success() {
        let probe = CountingProbe {
            ready_after: 3,
            ..Default::default()
        };
        let calls = Arc::clone(&probe.calls);
        let ctx = Context::background().with_timeout(Duration::from_secs(5));
        Prober::new(probe)
            .with_interval(Duration::from_millis(10))
            .wait_until_ready(&ctx, "http://localhost:9998")
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn deadline_ends_polling() {
        let probe = CountingProbe::default();
        let calls = Arc::clone(&probe.calls);
        let ctx = Context::background().with_timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let res = Prober::new(probe)
            .with_interval(Duration::from_millis(20))
            .wait_until_ready(&ctx, "http://localhost:9998")
            .await;
        assert_eq!(res, Err(ContextError::DeadlineExceeded));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn hung_probe_does_not_block_cancellation() {
        struct Hang;
        impl ReadinessProbe for Hang {
            fn version(&self, _: &str) -> impl Future<Output = Result<String, ProbeError>> + Send {
                std::future::pending()
            }
        }
        let ctx = Context::background().with_timeout(Duration::from_millis(100));
        let res = Prober::new(Hang)
            .with_interval(Duration::from_millis(10))
            .wait_until_ready(&ctx, "http://localhost:9998")
            .await;
        assert_eq!(res, Err(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn version_client_fails_when_nothing_listens() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let res = VersionClient::new(Duration::from_millis(500))
            .version(&format!("http://127.0.0.1:{}", port))
            .await;
        assert!(res.is_err());
    }
}
