//! Deadline-bound execution contexts.
//!
//! A [`Context`] carries a cancellation signal and an optional deadline down
//! to every attempt of a race. Contexts form a tree: canceling a parent cancels
//! all of its children, and a child's deadline is never later than its
//! parent's.

use std::{
    future::Future,
    sync::{Arc, OnceLock},
    time::Duration,
};

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Why a [`Context`] is done.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The context, or one of its ancestors, was canceled explicitly.
    #[error("context canceled")]
    Canceled,

    /// The context deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

struct Inner {
    token: CancellationToken,
    deadline: Option<Instant>,
    cause: OnceLock<ContextError>,
    parent: Option<Context>,
}

/// A cloneable handle to a cancellation scope with an optional deadline.
///
/// Clones share the same scope: canceling any clone cancels them all.
///
/// # Example
/// ```no_run
/// use race_get::Context;
/// use std::time::Duration;
///
/// # async fn example() {
/// let ctx = Context::with_timeout(Duration::from_millis(50));
/// let slow = tokio::time::sleep(Duration::from_secs(1));
/// assert!(ctx.run(slow).await.is_err());
/// # }
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    fn new(token: CancellationToken, deadline: Option<Instant>, parent: Option<Context>) -> Self {
        Self {
            inner: Arc::new(Inner {
                token,
                deadline,
                cause: OnceLock::new(),
                parent,
            }),
        }
    }

    /// A root context that is never done unless canceled.
    pub fn background() -> Self {
        Self::new(CancellationToken::new(), None, None)
    }

    /// A root context that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A root context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::new(CancellationToken::new(), Some(deadline), None)
    }

    /// Derives a child that inherits this context's deadline.
    ///
    /// Canceling the child leaves the parent untouched.
    pub fn child(&self) -> Self {
        Self::new(
            self.inner.token.child_token(),
            self.inner.deadline,
            Some(self.clone()),
        )
    }

    /// Derives a child whose deadline is the earlier of the parent's and
    /// `now + timeout`.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) => parent.min(own),
            None => own,
        };
        Self::new(self.inner.token.child_token(), Some(deadline), Some(self.clone()))
    }

    /// Cancels this context and every context derived from it.
    ///
    /// A context that already expired keeps reporting
    /// [`ContextError::DeadlineExceeded`].
    pub fn cancel(&self) {
        if self.err().is_none() {
            let _ = self.inner.cause.set(ContextError::Canceled);
        }
        self.inner.token.cancel();
    }

    /// Returns a guard that cancels this context when dropped.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, or `None` without one.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns why the context is done, or `None` while it is still live.
    ///
    /// The first observed cause sticks: a context canceled before its deadline
    /// keeps reporting [`ContextError::Canceled`] afterwards.
    pub fn err(&self) -> Option<ContextError> {
        if let Some(cause) = self.inner.cause.get() {
            return Some(*cause);
        }
        if let Some(cause) = self.inner.parent.as_ref().and_then(Context::err) {
            return Some(*self.inner.cause.get_or_init(|| cause));
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Some(*self.inner.cause.get_or_init(|| ContextError::DeadlineExceeded))
            }
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is canceled or its deadline elapses.
    pub async fn done(&self) -> ContextError {
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = time::sleep_until(deadline) => {}
                }
            }
            None => self.inner.token.cancelled().await,
        }

        self.err().unwrap_or(ContextError::Canceled)
    }

    /// Drives `fut` to completion unless the context finishes first.
    ///
    /// A context that is already done never polls `fut`.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
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

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.inner.deadline)
            .field("err", &self.err())
            .finish()
    }
}

/// Cancels the wrapped [`Context`] on drop.
#[must_use = "the context is canceled as soon as the guard is dropped"]
pub struct CancelOnDrop(Context);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_reports_deadline_exceeded() {
        let ctx = Context::with_timeout(Duration::from_millis(50));
        assert_eq!(ctx.err(), None);

        assert_eq!(ctx.done().await, ContextError::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_deadline_sticks() {
        let ctx = Context::with_timeout(Duration::from_millis(50));
        ctx.cancel();
        time::sleep(Duration::from_millis(100)).await;

        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_deadline_keeps_deadline_exceeded() {
        let ctx = Context::with_timeout(Duration::from_millis(50));
        time::sleep(Duration::from_millis(100)).await;
        ctx.cancel();

        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));

        let parent = Context::with_timeout(Duration::from_millis(50));
        let child = parent.child();
        time::sleep(Duration::from_millis(100)).await;
        child.cancel();

        assert_eq!(child.err(), Some(ContextError::DeadlineExceeded));
        assert_eq!(parent.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn parent_cancel_reaches_children_only_downwards() {
        let parent = Context::background();
        let child = parent.child();
        let sibling = parent.child();

        child.cancel();
        assert!(child.is_done());
        assert!(!parent.is_done());
        assert!(!sibling.is_done());

        parent.cancel();
        assert_eq!(sibling.done().await, ContextError::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn child_deadline_never_outlives_parent() {
        let parent = Context::with_timeout(Duration::from_millis(20));
        let child = parent.child_with_timeout(Duration::from_secs(10));

        assert_eq!(child.deadline(), parent.deadline());
        assert_eq!(child.done().await, ContextError::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn run_abandons_slow_future() {
        let ctx = Context::with_timeout(Duration::from_millis(10));
        let res = ctx.run(time::sleep(Duration::from_secs(5))).await;
        assert_eq!(res, Err(ContextError::DeadlineExceeded));

        let live = Context::background();
        assert_eq!(live.run(async { 7 }).await, Ok(7));
    }

    #[test]
    fn guard_cancels_on_drop() {
        let ctx = Context::background();
        {
            let _guard = ctx.cancel_on_drop();
        }
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }
}
