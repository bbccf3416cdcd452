//! Cancellable request contexts.
//!
//! A [`Context`] carries a cancellation token and an optional deadline. Every
//! suspension point in the client (waiting on the transport, draining a body,
//! sleeping between retries) races against it, so a cancelled or expired
//! context ends the call promptly with [`Error::Cancelled`] or
//! [`Error::DeadlineExceeded`].
//!
//! # Examples
//!
//! ```
//! use courier_http::Context;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let ctx = Context::background().with_timeout(Duration::from_secs(5));
//! assert!(ctx.err().is_none());
//!
//! let (child, cancel) = ctx.with_cancel();
//! cancel.cancel();
//! assert!(child.err().is_some());
//! assert!(ctx.err().is_none());
//! # });
//! ```

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation scope for one or more logical calls.
///
/// Cloning is cheap; clones share the same token and deadline. Derived
/// contexts are cancelled together with their parent but never cancel it.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that expires at `deadline`.
    ///
    /// An earlier deadline inherited from the parent is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a context together with the token that cancels it.
    pub fn with_cancel(&self) -> (Self, CancellationToken) {
        let token = self.token.child_token();
        let ctx = Self {
            token: token.clone(),
            deadline: self.deadline,
        };
        (ctx, token)
    }

    /// Cancel this context and everything derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The reason this context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<Error> {
        if self.token.is_cancelled() {
            return Some(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => Error::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Error::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                Error::Cancelled
            }
        }
    }

    /// Drive `fut` to completion unless the context finishes first.
    ///
    /// The future is dropped, not polled further, when the context wins.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
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

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(100));
        assert!(ctx.err().is_none());

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(matches!(ctx.err(), Some(Error::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_aborts_long_future() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let started = Instant::now();

        let result = ctx.run(tokio::time::sleep(Duration::from_secs(60))).await;

        assert!(matches!(result, Err(Error::DeadlineExceeded)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_run_completes_before_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_secs(5));
        let value = ctx.run(async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_children_only() {
        let parent = Context::background();
        let (child, cancel) = parent.with_cancel();
        let grandchild = child.with_timeout(Duration::from_secs(60));

        cancel.cancel();

        assert!(matches!(child.err(), Some(Error::Cancelled)));
        assert!(matches!(grandchild.err(), Some(Error::Cancelled)));
        assert!(parent.err().is_none());
        assert!(matches!(grandchild.done().await, Error::Cancelled));
    }

    #[test]
    fn test_earlier_parent_deadline_wins() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let parent = Context::background().with_timeout(Duration::from_secs(1));
            let child = parent.with_timeout(Duration::from_secs(30));
            assert_eq!(child.deadline(), parent.deadline());
        });
    }
}
