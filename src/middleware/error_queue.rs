use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use super::core::{ErrorMiddleware, Mounted, Next};
use crate::error::{RegistrationError, RouteError};
use crate::request::Request;
use crate::response::Response;

#[derive(Default)]
struct QueueState {
    pending: Vec<Mounted<dyn ErrorMiddleware>>,
    flushed: bool,
}

/// Buffer for error middleware registered during setup.
///
/// Registrations accumulate until [`ErrorMiddlewareQueue::flush`] runs once at
/// startup; the flushed units become the immutable [`ErrorPipeline`]. After the
/// flush the queue rejects further registrations, so a late unit is reported to
/// the caller instead of silently never running.
#[derive(Clone, Default)]
pub struct ErrorMiddlewareQueue {
    state: Arc<Mutex<QueueState>>,
}

impl ErrorMiddlewareQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an error handler for every request path.
    pub fn use_fn<F>(&self, f: F) -> Result<(), RegistrationError>
    where
        F: Fn(&RouteError, &mut Request, &mut Response) -> anyhow::Result<Next>
            + Send
            + Sync
            + 'static,
    {
        self.enqueue(Mounted::new(None, Arc::new(f)))
    }

    /// Queue an error handler that only sees errors for paths under `mount`.
    pub fn use_at<F>(&self, mount: &str, f: F) -> Result<(), RegistrationError>
    where
        F: Fn(&RouteError, &mut Request, &mut Response) -> anyhow::Result<Next>
            + Send
            + Sync
            + 'static,
    {
        self.enqueue(Mounted::new(Some(mount), Arc::new(f)))
    }

    pub fn use_middleware(
        &self,
        middleware: Arc<dyn ErrorMiddleware>,
    ) -> Result<(), RegistrationError> {
        self.enqueue(Mounted::new(None, middleware))
    }

    pub fn use_middleware_at(
        &self,
        mount: &str,
        middleware: Arc<dyn ErrorMiddleware>,
    ) -> Result<(), RegistrationError> {
        self.enqueue(Mounted::new(Some(mount), middleware))
    }

    fn enqueue(&self, unit: Mounted<dyn ErrorMiddleware>) -> Result<(), RegistrationError> {
        let mut state = self.lock();
        if state.flushed {
            warn!(
                mount = ?unit.mount(),
                "Error middleware registered after startup - it will never run"
            );
            return Err(RegistrationError::ErrorPipelineFinalized);
        }
        state.pending.push(unit);
        Ok(())
    }

    /// Number of units waiting for the flush
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    #[must_use]
    pub fn is_flushed(&self) -> bool {
        self.lock().flushed
    }

    /// Move every queued unit into an [`ErrorPipeline`] and close the queue.
    ///
    /// A second call yields an empty pipeline.
    pub(crate) fn flush(&self) -> ErrorPipeline {
        let mut state = self.lock();
        state.flushed = true;
        let entries = std::mem::take(&mut state.pending);
        info!(count = entries.len(), "Error middleware pipeline finalized");
        ErrorPipeline { entries }
    }
}

/// The active, immutable error pipeline built by the one-shot flush.
#[derive(Clone, Default)]
pub struct ErrorPipeline {
    entries: Vec<Mounted<dyn ErrorMiddleware>>,
}

impl ErrorPipeline {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Units applicable to `path`, in registration order.
    pub(crate) fn for_path<'a>(
        &'a self,
        path: &'a str,
    ) -> impl Iterator<Item = &'a Arc<dyn ErrorMiddleware>> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.applies_to(path))
            .map(|entry| &entry.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &RouteError, _: &mut Request, _: &mut Response) -> anyhow::Result<Next> {
        Ok(Next::Continue)
    }

    #[test]
    fn test_flush_moves_pending_once() {
        let queue = ErrorMiddlewareQueue::new();
        queue.use_fn(noop).unwrap();
        queue.use_at("/api", noop).unwrap();
        assert_eq!(queue.pending(), 2);

        let pipeline = queue.flush();
        assert_eq!(pipeline.len(), 2);
        assert_eq!(queue.pending(), 0);
        assert!(queue.is_flushed());

        assert_eq!(pipeline.for_path("/api/x").count(), 2);
        assert_eq!(pipeline.for_path("/other").count(), 1);
    }

    #[test]
    fn test_late_registration_rejected() {
        let queue = ErrorMiddlewareQueue::new();
        let handle = queue.clone();
        let pipeline = queue.flush();
        assert!(pipeline.is_empty());

        assert_eq!(
            handle.use_fn(noop),
            Err(RegistrationError::ErrorPipelineFinalized)
        );
        assert_eq!(handle.pending(), 0);
        assert!(queue.flush().is_empty());
    }
}
