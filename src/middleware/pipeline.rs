use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use super::core::{Middleware, Mounted, Next};
use crate::error::{panic_message, RouteError};
use crate::request::Request;
use crate::response::Response;

/// Ordered, append-only chain of request middleware.
///
/// The chain stays live for the whole process: units can be appended after the
/// dispatcher started serving. Readers take a snapshot with a single atomic load,
/// so a request in flight never observes a half-updated chain.
pub struct MiddlewarePipeline {
    units: ArcSwap<Vec<Mounted<dyn Middleware>>>,
}

impl Default for MiddlewarePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewarePipeline {
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Append a closure that runs for every request.
    pub fn use_fn<F>(&self, f: F)
    where
        F: Fn(&mut Request, &mut Response) -> anyhow::Result<Next> + Send + Sync + 'static,
    {
        self.push(Mounted::new(None, Arc::new(f)));
    }

    /// Append a closure that only runs for paths under `mount`.
    pub fn use_at<F>(&self, mount: &str, f: F)
    where
        F: Fn(&mut Request, &mut Response) -> anyhow::Result<Next> + Send + Sync + 'static,
    {
        self.push(Mounted::new(Some(mount), Arc::new(f)));
    }

    pub fn use_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.push(Mounted::new(None, middleware));
    }

    pub fn use_middleware_at(&self, mount: &str, middleware: Arc<dyn Middleware>) {
        self.push(Mounted::new(Some(mount), middleware));
    }

    fn push(&self, unit: Mounted<dyn Middleware>) {
        debug!(mount = ?unit.mount(), "Middleware appended");
        self.units.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(unit.clone());
            next
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.load().is_empty()
    }

    /// Run the chain in registration order.
    ///
    /// Returns `Next::Handled` as soon as a unit short-circuits or finalizes the
    /// response, `Next::Continue` when every applicable unit passed control on.
    /// A unit's error or panic stops the chain and is returned as a [`RouteError`].
    pub fn run(&self, req: &mut Request, res: &mut Response) -> Result<Next, RouteError> {
        let snapshot = self.units.load_full();
        for (index, unit) in snapshot.iter().enumerate() {
            if !unit.applies_to(&req.path) {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| unit.unit.handle(req, res)));
            match outcome {
                Ok(Ok(Next::Continue)) if res.is_finished() => {
                    warn!(
                        request_id = %req.request_id,
                        index,
                        "Middleware sent a response but returned Continue - treating as handled"
                    );
                    return Ok(Next::Handled);
                }
                Ok(Ok(Next::Continue)) => {}
                Ok(Ok(Next::Handled)) => {
                    debug!(request_id = %req.request_id, index, "Middleware short-circuited");
                    return Ok(Next::Handled);
                }
                Ok(Err(err)) => return Err(RouteError::from_anyhow(err)),
                Err(payload) => return Err(RouteError::Panic(panic_message(payload.as_ref()))),
            }
        }
        Ok(Next::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_runs_in_order_and_short_circuits() {
        let pipeline = MiddlewarePipeline::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let first = Arc::clone(&hits);
        pipeline.use_fn(move |req, _res| {
            first.fetch_add(1, Ordering::SeqCst);
            req.extensions.insert(1u8);
            Ok(Next::Continue)
        });
        pipeline.use_fn(|req, res| {
            assert_eq!(req.extensions.get::<u8>(), Some(&1));
            res.send_json(401, serde_json::json!({"error": "nope"}))?;
            Ok(Next::Handled)
        });
        let last = Arc::clone(&hits);
        pipeline.use_fn(move |_req, _res| {
            last.fetch_add(100, Ordering::SeqCst);
            Ok(Next::Continue)
        });

        let mut req = Request::new(Method::GET, "/x");
        let mut res = Response::new(false);
        assert_eq!(pipeline.run(&mut req, &mut res).unwrap(), Next::Handled);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(res.status(), 401);
    }

    #[test]
    fn test_mounted_unit_skips_other_paths() {
        let pipeline = MiddlewarePipeline::new();
        pipeline.use_at("/admin", |_req, _res| Err(anyhow::anyhow!("forbidden")));

        let mut req = Request::new(Method::GET, "/public");
        let mut res = Response::new(false);
        assert_eq!(pipeline.run(&mut req, &mut res).unwrap(), Next::Continue);

        let mut req = Request::new(Method::GET, "/admin/users");
        let err = pipeline.run(&mut req, &mut res).unwrap_err();
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_panic_becomes_error() {
        let pipeline = MiddlewarePipeline::new();
        pipeline.use_fn(|_req, _res| panic!("middleware exploded"));

        let mut req = Request::new(Method::GET, "/");
        let mut res = Response::new(false);
        let err = pipeline.run(&mut req, &mut res).unwrap_err();
        assert!(matches!(err, RouteError::Panic(ref msg) if msg.contains("exploded")));
    }

    #[test]
    fn test_send_without_handled_stops_chain() {
        let pipeline = MiddlewarePipeline::new();
        pipeline.use_fn(|_req, res| {
            res.send_json(200, serde_json::json!({}))?;
            Ok(Next::Continue)
        });
        pipeline.use_fn(|_req, _res| Err(anyhow::anyhow!("must not run")));

        let mut req = Request::new(Method::GET, "/");
        let mut res = Response::new(false);
        assert_eq!(pipeline.run(&mut req, &mut res).unwrap(), Next::Handled);
        assert_eq!(pipeline.len(), 2);
    }
}
