//! Cancellation context threaded through a mining cycle.
//!
//! A [`RunContext`] pairs a [`CancellationToken`] with an optional deadline.
//! Contexts derived with [`RunContext::with_timeout`] observe their parent's
//! cancellation and never outlive the parent's deadline.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// Explicit cancellation (shutdown signal, parent cancelled).
    Cancelled,
    /// The context's deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Cancelled => write!(f, "context cancelled"),
            CancelCause::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::background()
    }
}

impl RunContext {
    /// A root context with no deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Root context driven by an externally owned token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a child that is cancelled with this context and expires after `timeout`
    /// (or at this context's deadline, whichever comes first). A timeout too large
    /// to represent adds no deadline of its own.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(parent), Some(candidate)) => Some(parent.min(candidate)),
            (parent, None) => parent,
            (None, candidate) => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// Derive a child that can be cancelled on its own without affecting this context.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Some(cause)` once the context is finished.
    pub fn err(&self) -> Option<CancelCause> {
        if self.token.is_cancelled() {
            return Some(CancelCause::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(CancelCause::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolve when the context finishes.
    pub async fn done(&self) -> CancelCause {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => CancelCause::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => CancelCause::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                CancelCause::Cancelled
            }
        }
    }

    /// Sleep for `duration` unless the context finishes first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), CancelCause> {
        if let Some(cause) = self.err() {
            return Err(cause);
        }
        tokio::select! {
            biased;
            cause = self.done() => Err(cause),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn background_is_not_done() {
        let ctx = RunContext::background();
        assert!(!ctx.is_done());
        assert_eq!(ctx.err(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_propagates_to_children() {
        let parent = RunContext::background();
        let child = parent.with_timeout(Duration::from_secs(60));
        parent.cancel();
        assert_eq!(child.err(), Some(CancelCause::Cancelled));
        assert_eq!(child.done().await, CancelCause::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_child_leaves_parent_running() {
        let parent = RunContext::background();
        let child = parent.child();
        child.cancel();
        assert!(child.is_done());
        assert!(!parent.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = RunContext::background().with_timeout(Duration::from_secs(5));
        assert!(!ctx.is_done());
        assert_eq!(ctx.done().await, CancelCause::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(CancelCause::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn child_never_outlives_parent_deadline() {
        let parent = RunContext::background().with_timeout(Duration::from_secs(2));
        let child = parent.with_timeout(Duration::from_secs(30));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_timeout_adds_no_deadline() {
        let root = RunContext::background().with_timeout(Duration::MAX);
        assert_eq!(root.deadline(), None);
        assert!(!root.is_done());

        let parent = RunContext::background().with_timeout(Duration::from_secs(2));
        let child = parent.with_timeout(Duration::MAX);
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_interrupted_by_cancel() {
        let ctx = RunContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });
        let started = Instant::now();
        let res = ctx.sleep(Duration::from_secs(10)).await;
        assert_eq!(res, Err(CancelCause::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
