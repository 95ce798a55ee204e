use std::sync::Arc;

use crate::error::RouteError;
use crate::request::Request;
use crate::response::Response;

/// Control value returned by every middleware unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Proceed to the next unit in the chain
    Continue,
    /// Stop the chain; the unit produced (or deliberately withheld) the response
    Handled,
}

/// Ordinary request middleware.
///
/// Runs before the route handler. Return [`Next::Continue`] to pass control on,
/// [`Next::Handled`] to short-circuit (usually after sending an early response),
/// or an error to jump to the error pipeline.
pub trait Middleware: Send + Sync {
    fn handle(&self, req: &mut Request, res: &mut Response) -> anyhow::Result<Next>;
}

impl<F> Middleware for F
where
    F: Fn(&mut Request, &mut Response) -> anyhow::Result<Next> + Send + Sync,
{
    fn handle(&self, req: &mut Request, res: &mut Response) -> anyhow::Result<Next> {
        self(req, res)
    }
}

/// Error-handling middleware.
///
/// Receives the error together with the request/response pair. Returning
/// [`Next::Handled`] ends error processing, [`Next::Continue`] forwards the same
/// error to the next error middleware, and returning `Err` forwards the new error.
pub trait ErrorMiddleware: Send + Sync {
    fn handle_error(
        &self,
        err: &RouteError,
        req: &mut Request,
        res: &mut Response,
    ) -> anyhow::Result<Next>;
}

impl<F> ErrorMiddleware for F
where
    F: Fn(&RouteError, &mut Request, &mut Response) -> anyhow::Result<Next> + Send + Sync,
{
    fn handle_error(
        &self,
        err: &RouteError,
        req: &mut Request,
        res: &mut Response,
    ) -> anyhow::Result<Next> {
        self(err, req, res)
    }
}

/// Explicit classification of a middleware registration.
///
/// The registration API routes `Normal` units into the live request pipeline and
/// `Error` units into the deferred error queue.
#[derive(Clone)]
pub enum MiddlewareKind {
    Normal(Arc<dyn Middleware>),
    Error(Arc<dyn ErrorMiddleware>),
}

impl MiddlewareKind {
    /// Wrap a request middleware closure.
    pub fn normal<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) -> anyhow::Result<Next> + Send + Sync + 'static,
    {
        MiddlewareKind::Normal(Arc::new(f))
    }

    /// Wrap an error middleware closure.
    pub fn error<F>(f: F) -> Self
    where
        F: Fn(&RouteError, &mut Request, &mut Response) -> anyhow::Result<Next>
            + Send
            + Sync
            + 'static,
    {
        MiddlewareKind::Error(Arc::new(f))
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, MiddlewareKind::Error(_))
    }
}

/// A middleware unit optionally restricted to a mount path.
pub struct Mounted<M: ?Sized> {
    pub(crate) mount: Option<Arc<str>>,
    pub(crate) unit: Arc<M>,
}

impl<M: ?Sized> Clone for Mounted<M> {
    fn clone(&self) -> Self {
        Self {
            mount: self.mount.clone(),
            unit: Arc::clone(&self.unit),
        }
    }
}

impl<M: ?Sized> Mounted<M> {
    pub(crate) fn new(mount: Option<&str>, unit: Arc<M>) -> Self {
        Self {
            mount: mount.and_then(normalize_mount).map(Arc::from),
            unit,
        }
    }

    /// Mount path, `None` when the unit applies to every request
    pub fn mount(&self) -> Option<&str> {
        self.mount.as_deref()
    }

    pub(crate) fn applies_to(&self, path: &str) -> bool {
        self.mount
            .as_deref()
            .map_or(true, |mount| mount_matches(mount, path))
    }
}

/// Normalize a mount path: leading slash, no trailing slash. `/` and `""` mean "everything".
fn normalize_mount(mount: &str) -> Option<String> {
    let trimmed = mount.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{trimmed}"))
    }
}

/// Whether `path` lies under `mount` on a segment boundary (`/api` covers `/api` and
/// `/api/x`, not `/apix`).
pub(crate) fn mount_matches(mount: &str, path: &str) -> bool {
    match path.strip_prefix(mount) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
