//! Per-request context carried into engine calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Context with a freshly generated request id and no deadline.
    pub fn new() -> Self {
        Self::with_request_id(Uuid::new_v4().to_string())
    }

    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this request and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with [`Error::Cancelled`] once the request was cancelled or its deadline passed.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled(format!(
                "request {} was cancelled",
                self.request_id
            )));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::Cancelled(format!(
                    "request {} exceeded its deadline",
                    self.request_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn fresh_context_is_active() {
        let ctx = RequestContext::new();
        assert!(!ctx.request_id.is_empty());
        assert!(ctx.ensure_active().is_ok());
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let ctx = RequestContext::with_request_id("req-1");
        let clone = ctx.clone();
        ctx.cancel();
        let err = clone.ensure_active().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(err.to_string().contains("req-1"));
    }

    #[test]
    fn expired_deadline_is_rejected() {
        let ctx = RequestContext::new().with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(ctx.ensure_active().is_err());

        let ctx = RequestContext::new().with_timeout(Duration::from_secs(60));
        assert!(ctx.ensure_active().is_ok());
    }
}
