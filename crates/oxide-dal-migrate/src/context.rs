//! Cancellation and deadlines.
//!
//! Every database call takes a [`Context`]. The call is raced against the
//! context's cancellation token and deadline, so a canceled context aborts
//! in-flight work instead of waiting for the driver.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{MigrateError, Result};

/// Cancellation token plus optional deadline.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never canceled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Wraps an existing token, e.g. one canceled by a signal handler.
    #[must_use]
    pub const fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Returns a copy whose deadline is at most `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let at = Instant::now() + timeout;
        self.with_deadline(at)
    }

    /// Returns a copy whose deadline is at most `at`.
    #[must_use]
    pub fn with_deadline(mut self, at: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(at, |current| current.min(at)));
        self
    }

    /// A child context: canceled with its parent, cancelable on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels this context and its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails if the context is already canceled or past its deadline.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Canceled`] or [`MigrateError::DeadlineExceeded`].
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(MigrateError::Canceled);
        }
        if self.deadline.is_some_and(|at| Instant::now() >= at) {
            return Err(MigrateError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Runs `fut` until it completes, the context is canceled, or the
    /// deadline passes, whichever comes first.
    ///
    /// # Errors
    ///
    /// Returns the future's error, [`MigrateError::Canceled`] or
    /// [`MigrateError::DeadlineExceeded`].
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(MigrateError::Canceled),
            () = expire(self.deadline) => Err(MigrateError::DeadlineExceeded),
            result = fut => result,
        }
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = Context::background();
        let value = ctx.run(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_canceled_before_start() {
        let ctx = Context::background();
        ctx.cancel();
        let result = ctx.run(async { Ok(()) }).await;
        assert!(matches!(result, Err(MigrateError::Canceled)));
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight() {
        let ctx = Context::background();
        let canceler = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceler.cancel();
        });
        let result: Result<()> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(MigrateError::Canceled)));
    }

    #[tokio::test]
    async fn test_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(5));
        let result: Result<()> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(MigrateError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_child_follows_parent() {
        let parent = Context::background();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_canceled());

        let parent = Context::background();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_canceled());
    }

    #[test]
    fn test_deadline_only_tightens() {
        let ctx = Context::background().with_timeout(Duration::from_secs(1));
        let first = ctx.deadline().unwrap();
        let ctx = ctx.with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(first));
    }
}
