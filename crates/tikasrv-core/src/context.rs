//! Cancellable lifetime scopes with optional deadlines.
//!
//! A [`Context`] pairs a `CancellationToken` with an optional deadline. Child
//! contexts are cancelled with their parent and never outlive its deadline.
//! Downloads, the readiness prober and the process supervisor all take a
//! `&Context` and stop as soon as it is done.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why a context is done.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// Root context: never done unless cancelled.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Child context that can be cancelled independently of `self`.
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Child context that is done after `timeout`, or earlier if `self` is.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            token: self.token.child_token(),
            deadline: Some(match self.deadline {
                Some(d) => d.min(deadline),
                None => deadline,
            }),
        }
    }

    /// Cancels this context and all of its children. Calling it again is a no-op.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Guard that cancels this context when dropped, unless disarmed first.
    /// Ties the context to the future that holds the guard.
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Some` once the context is done, without waiting.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        if let Some(err) = self.err() {
            return err;
        }
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => ContextError::Canceled,
                    _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ContextError::Canceled
            }
        }
    }

    /// Runs `fut` to completion unless the context is done first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, ContextError>
    where
        F: std::future::Future<Output = T>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_propagates_to_children() {
        let root = Context::background();
        let child = root.with_cancel();
        assert!(child.err().is_none());
        root.cancel();
        assert_eq!(child.err(), Some(ContextError::Canceled));
        assert_eq!(child.done().await, ContextError::Canceled);
    }

    #[tokio::test]
    async fn child_cancel_does_not_touch_parent() {
        let root = Context::background();
        let child = root.with_cancel();
        child.cancel();
        child.cancel();
        assert!(root.err().is_none());
    }

    #[tokio::test]
    async fn drop_guard_cancels_unless_disarmed() {
        let root = Context::background();
        let child = root.with_cancel();
        drop(child.cancel_on_drop());
        assert_eq!(child.err(), Some(ContextError::Canceled));
        assert!(root.err().is_none());

        let kept = root.with_cancel();
        kept.cancel_on_drop().disarm();
        assert!(kept.err().is_none());
    }

    #[tokio::test]
    async fn timeout_reports_deadline_exceeded() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        assert_eq!(ctx.done().await, ContextError::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn child_inherits_earlier_deadline() {
        let parent = Context::background().with_timeout(Duration::from_millis(10));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn run_stops_pending_future() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let res = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(res, Err(ContextError::DeadlineExceeded));
    }
}
