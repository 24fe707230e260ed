//! Mapping Ctrl-C onto context cancellation.

use std::future::Future;
use tikasrv_core::Context;
use tokio::task::JoinHandle;

/// Cancels the watched context when the signal fires. Dropping it stops
/// watching.
pub(crate) struct Interrupt(JoinHandle<()>);

impl Drop for Interrupt {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Cancels `ctx` once `signal` resolves.
pub(crate) fn cancel_on<F>(ctx: &Context, signal: F) -> Interrupt
where
    F: Future + Send + 'static,
{
    let ctx = ctx.clone();
    Interrupt(tokio::spawn(async move {
        signal.await;
        tracing::info!("interrupted, cancelling");
        ctx.cancel();
    }))
}

/// Cancels `ctx` on Ctrl-C. If the handler cannot be installed the context
/// is left alone.
pub(crate) fn cancel_on_ctrl_c(ctx: &Context) -> Interrupt {
    cancel_on(ctx, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    })
}
