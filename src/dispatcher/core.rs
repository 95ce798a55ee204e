//! Dispatcher core module - hot path for request dispatch.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use arc_swap::ArcSwap;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use may::coroutine;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::error::{panic_message, RegistrationError, RouteError};
use crate::middleware::{
    ErrorMiddleware, ErrorMiddlewareQueue, ErrorPipeline, MiddlewareKind, MiddlewarePipeline, Next,
};
use crate::registry::{Handler, RouteEntry, RouteRegistry};
use crate::request::{BodyLimitExceeded, Request};
use crate::response::Response;

/// Per-request processing state, logged at debug level on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    Parsed,
    MiddlewareChain,
    HandlerExecuting,
    Responded,
    Errored,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Received => "received",
            DispatchState::Parsed => "parsed",
            DispatchState::MiddlewareChain => "middleware_chain",
            DispatchState::HandlerExecuting => "handler_executing",
            DispatchState::Responded => "responded",
            DispatchState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Everything the dispatcher needs, assembled by
/// [`JsonRoutes::finalize`](crate::app::JsonRoutes::finalize).
pub(crate) struct DispatcherParts {
    pub registry: RouteRegistry,
    pub parsers: MiddlewarePipeline,
    pub middleware: Arc<MiddlewarePipeline>,
    pub error_queue: ErrorMiddlewareQueue,
    pub error_pipeline: ErrorPipeline,
    pub default_headers: HeaderMap,
    pub body_limit: usize,
    pub stack_size: usize,
    pub pretty: bool,
}

/// The active routing configuration.
///
/// Routes and the error pipeline are fixed; the user middleware pipeline and
/// the default headers stay live. Each handler and error handler runs in its
/// own coroutine, so blocking-style code inside them only suspends that
/// coroutine.
pub struct Dispatcher {
    registry: RouteRegistry,
    parsers: MiddlewarePipeline,
    middleware: Arc<MiddlewarePipeline>,
    error_queue: ErrorMiddlewareQueue,
    error_pipeline: ErrorPipeline,
    default_headers: ArcSwap<HeaderMap>,
    body_limit: usize,
    stack_size: usize,
    pretty: bool,
}

impl Dispatcher {
    pub(crate) fn from_parts(parts: DispatcherParts) -> Self {
        info!(
            routes = parts.registry.routes().len(),
            middleware = parts.middleware.len(),
            error_middleware = parts.error_pipeline.len(),
            stack_size = parts.stack_size,
            pretty = parts.pretty,
            "Dispatcher ready"
        );
        Self {
            registry: parts.registry,
            parsers: parts.parsers,
            middleware: parts.middleware,
            error_queue: parts.error_queue,
            error_pipeline: parts.error_pipeline,
            default_headers: ArcSwap::from_pointee(parts.default_headers),
            body_limit: parts.body_limit,
            stack_size: parts.stack_size,
            pretty: parts.pretty,
        }
    }

    /// Registered routes in registration order
    #[must_use]
    pub fn routes(&self) -> &[RouteEntry] {
        self.registry.routes()
    }

    /// The live user middleware pipeline. Units appended here apply to the next request.
    #[must_use]
    pub fn middleware(&self) -> &MiddlewarePipeline {
        &self.middleware
    }

    /// Register a tagged middleware unit on the running dispatcher.
    ///
    /// Ordinary middleware joins the live pipeline. Error middleware is rejected
    /// because the error pipeline was fixed at finalize.
    pub fn register(&self, kind: MiddlewareKind) -> Result<(), RegistrationError> {
        match kind {
            MiddlewareKind::Normal(unit) => {
                self.middleware.use_middleware(unit);
                Ok(())
            }
            MiddlewareKind::Error(unit) => self.error_queue.use_middleware(unit),
        }
    }

    /// Number of active error middleware units
    #[must_use]
    pub fn error_pipeline_len(&self) -> usize {
        self.error_pipeline.len()
    }

    /// Replace the headers applied to every response from now on.
    pub fn set_response_headers(&self, headers: HeaderMap) {
        debug!(count = headers.len(), "Default response headers replaced");
        self.default_headers.store(Arc::new(headers));
    }

    #[must_use]
    pub fn response_headers(&self) -> Arc<HeaderMap> {
        self.default_headers.load_full()
    }

    fn new_response(&self) -> Response {
        let mut res = Response::new(self.pretty);
        self.apply_default_headers(&mut res);
        res
    }

    fn apply_default_headers(&self, res: &mut Response) {
        if let Err(err) = res.set_headers(&self.default_headers.load()) {
            warn!(error = %err, "Failed to apply default headers");
        }
    }

    /// Reject a body over the configured limit, whatever its content type.
    fn check_body_limit(&self, req: &mut Request) -> Result<(), RouteError> {
        if let Some(exceeded) = req.extensions.remove::<BodyLimitExceeded>() {
            return Err(RouteError::PayloadTooLarge {
                limit: exceeded.limit,
                actual: exceeded.actual,
            });
        }
        if req.raw_body.len() > self.body_limit {
            return Err(RouteError::PayloadTooLarge {
                limit: self.body_limit,
                actual: req.raw_body.len(),
            });
        }
        Ok(())
    }

    fn transition(&self, req: &Request, state: DispatchState) {
        debug!(request_id = %req.request_id, state = %state, "Dispatch state");
    }

    /// Process one request through parsers, middleware, handler and error pipeline.
    ///
    /// Always returns a finished response; failures never escape as panics.
    pub fn dispatch(&self, mut req: Request) -> Response {
        let start = Instant::now();
        let method = req.method.clone();
        let path = req.path.clone();
        let request_id = req.request_id;
        self.transition(&req, DispatchState::Received);

        let mut res = self.new_response();
        let route = self.registry.resolve(&req.method, &req.path);

        let mut outcome = match self.check_body_limit(&mut req) {
            Err(err) => Err(err),
            Ok(()) => match &route {
                Some(_) if self.registry.is_under_namespace(&req.path) => {
                    self.parsers.run(&mut req, &mut res)
                }
                _ => Ok(Next::Continue),
            },
        };
        self.transition(&req, DispatchState::Parsed);

        if let Ok(Next::Continue) = outcome {
            outcome = self.middleware.run(&mut req, &mut res);
        }
        self.transition(&req, DispatchState::MiddlewareChain);

        let res = match outcome {
            Ok(Next::Handled) => {
                self.transition(&req, DispatchState::Responded);
                finish(res, &req, "Middleware short-circuited without sending a response")
            }
            Ok(Next::Continue) => match route {
                Some(route_match) => {
                    req.path_params = route_match.path_params;
                    // Defaults win over headers set by middleware on routed requests
                    self.apply_default_headers(&mut res);
                    self.transition(&req, DispatchState::HandlerExecuting);
                    self.run_handler(route_match.target, req, res)
                }
                None => {
                    self.transition(&req, DispatchState::Responded);
                    self.not_found(&req, res)
                }
            },
            Err(err) => {
                self.transition(&req, DispatchState::Errored);
                self.handle_error(err, req, res)
            }
        };

        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = res.status(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        res
    }

    fn run_handler(&self, handler: Arc<dyn Handler>, req: Request, res: Response) -> Response {
        let request_id = req.request_id;
        let execution_start = Instant::now();
        let (req, res, outcome) =
            match self.run_isolated(req, res, move |req, res| handler.call(req, res)) {
                Ok(parts) => parts,
                Err(err) => return self.fallback_error(&err, request_id),
            };

        let execution_time_ms = execution_start.elapsed().as_millis() as u64;
        match outcome {
            Ok(Ok(())) => {
                debug!(
                    request_id = %request_id,
                    execution_time_ms,
                    "Handler execution complete"
                );
                self.transition(&req, DispatchState::Responded);
                finish(res, &req, "Handler returned without sending a response")
            }
            Ok(Err(err)) => {
                let err = RouteError::from_anyhow(err);
                warn!(
                    request_id = %request_id,
                    error = %err,
                    execution_time_ms,
                    "Handler returned an error"
                );
                self.transition(&req, DispatchState::Errored);
                self.handle_error(err, req, res)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    request_id = %request_id,
                    panic_message = %message,
                    "Handler panicked - CRITICAL"
                );
                self.transition(&req, DispatchState::Errored);
                self.handle_error(RouteError::Panic(message), req, res)
            }
        }
    }

    /// Walk the error pipeline until a unit returns [`Next::Handled`].
    ///
    /// Every error reaches the pipeline, even when the response was already
    /// sent; units can check [`Response::is_finished`] before writing.
    fn handle_error(&self, mut err: RouteError, mut req: Request, mut res: Response) -> Response {
        let request_id = req.request_id;
        let units: Vec<Arc<dyn ErrorMiddleware>> =
            self.error_pipeline.for_path(&req.path).map(Arc::clone).collect();
        if res.is_finished() {
            debug!(request_id = %request_id, error = %err, "Error raised after the response was sent");
        }

        for (index, unit) in units.into_iter().enumerate() {
            let sent_before = res.is_finished();
            let job = move |req: &mut Request, res: &mut Response| {
                let outcome = unit.handle_error(&err, req, res);
                (err, outcome)
            };
            let (next_req, next_res, outcome) = match self.run_isolated(req, res, job) {
                Ok(parts) => parts,
                Err(spawn_err) => return self.fallback_error(&spawn_err, request_id),
            };
            req = next_req;
            res = next_res;

            err = match outcome {
                Ok((_, Ok(Next::Handled))) => {
                    debug!(request_id = %request_id, index, "Error middleware handled error");
                    return finish(res, &req, "Error middleware handled without sending a response");
                }
                Ok((_, Ok(Next::Continue))) if !sent_before && res.is_finished() => {
                    debug!(request_id = %request_id, index, "Error middleware sent a response");
                    return res;
                }
                Ok((same, Ok(Next::Continue))) => same,
                Ok((_, Err(new_err))) => RouteError::from_anyhow(new_err),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(
                        request_id = %request_id,
                        index,
                        panic_message = %message,
                        "Error middleware panicked"
                    );
                    RouteError::Panic(message)
                }
            };
        }

        if res.is_finished() {
            warn!(request_id = %request_id, error = %err, "Error not handled after the response was sent");
            return res;
        }
        self.fallback_error(&err, request_id)
    }

    /// Run `job` in its own coroutine, moving the request and response in and
    /// back out. A panic inside `job` is captured in the returned `thread::Result`.
    fn run_isolated<T, F>(
        &self,
        req: Request,
        res: Response,
        job: F,
    ) -> Result<(Request, Response, thread::Result<T>), RouteError>
    where
        F: FnOnce(&mut Request, &mut Response) -> T + Send + 'static,
        T: Send + 'static,
    {
        let request_id = req.request_id;
        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure is Send + 'static and owns everything it touches; the request
        // and response are moved in and handed back through the join handle.
        let spawn_result = unsafe {
            coroutine::Builder::new()
                .stack_size(self.stack_size)
                .spawn(move || {
                    let mut req = req;
                    let mut res = res;
                    let outcome = catch_unwind(AssertUnwindSafe(|| job(&mut req, &mut res)));
                    (req, res, outcome)
                })
        };

        let handle = spawn_result.map_err(|e| {
            error!(
                request_id = %request_id,
                error = %e,
                stack_size = self.stack_size,
                "Failed to spawn handler coroutine - CRITICAL"
            );
            RouteError::Spawn(e.to_string())
        })?;

        handle.join().map_err(|payload| {
            let message = panic_message(payload.as_ref());
            error!(
                request_id = %request_id,
                panic_message = %message,
                "Handler coroutine aborted"
            );
            RouteError::Panic(message)
        })
    }

    fn not_found(&self, req: &Request, mut res: Response) -> Response {
        debug!(request_id = %req.request_id, method = %req.method, path = %req.path, "No route matched");
        let body = json!({
            "error": "Not Found",
            "method": req.method.as_str(),
            "path": req.path,
        });
        if let Err(err) = res.send_json(404, body) {
            warn!(request_id = %req.request_id, error = %err, "Failed to write 404 response");
            return self.fallback_status(404);
        }
        res
    }

    /// Unstructured failure response for an error nothing handled.
    fn fallback_error(&self, err: &RouteError, request_id: crate::ids::RequestId) -> Response {
        error!(
            request_id = %request_id,
            status = err.status(),
            error = %err,
            "Unhandled error - sending fallback response"
        );
        self.fallback_status(err.status())
    }

    fn fallback_status(&self, status: u16) -> Response {
        let mut res = self.new_response();
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let reason = status.canonical_reason().unwrap_or("Error");
        if res.set_status(status.as_u16()).is_err() || res.write(reason.as_bytes()).is_err() {
            warn!(status = status.as_u16(), "Failed to write fallback response");
        }
        res.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        res.force_finish();
        res
    }
}

/// Finalize a response a unit left open, warning that nothing was sent.
fn finish(mut res: Response, req: &Request, message: &'static str) -> Response {
    if !res.is_finished() {
        warn!(request_id = %req.request_id, path = %req.path, "{message}");
        res.force_finish();
    }
    res
}
