//! Integration tests for the request middleware pipeline

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use http::Method;
use jsonroutes::middleware::{Middleware, TracingMiddleware};
use jsonroutes::{JsonRoutes, Next, Request, Response, ResponseOptions, RouteError};
use serde_json::json;

mod common;
use common::test_server::setup_may_runtime;

use tracing_util::TestTracing;

fn counting_app(handler_hits: &Arc<AtomicUsize>) -> JsonRoutes {
    setup_may_runtime();
    let mut app = JsonRoutes::default();
    let hits = Arc::clone(handler_hits);
    app.add("GET", "/guarded", move |_req, res| {
        hits.fetch_add(1, Ordering::SeqCst);
        res.send_result(ResponseOptions::new().data(json!({ "ok": true })))?;
        Ok(())
    })
    .unwrap();
    app
}

#[test]
fn test_middleware_runs_before_handler_in_order() {
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let app = counting_app(&handler_hits);
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&order);
    app.middleware().use_fn(move |_req, _res| {
        first.lock().unwrap().push("first");
        Ok(Next::Continue)
    });
    let second = Arc::clone(&order);
    app.middleware().use_fn(move |_req, _res| {
        second.lock().unwrap().push("second");
        Ok(Next::Continue)
    });

    let res = app.finalize().dispatch(Request::new(Method::GET, "/guarded"));
    assert_eq!(res.status(), 200);
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    assert_eq!(handler_hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_short_circuit_prevents_handler() {
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let app = counting_app(&handler_hits);
    let after_hits = Arc::new(AtomicUsize::new(0));

    app.middleware().use_fn(|req, res| {
        if req.header("x-api-key") != Some("secret") {
            res.send_result(
                ResponseOptions::new()
                    .code(401)
                    .data(json!({ "error": "unauthorized" })),
            )?;
            return Ok(Next::Handled);
        }
        Ok(Next::Continue)
    });
    let after = Arc::clone(&after_hits);
    app.middleware().use_fn(move |_req, _res| {
        after.fetch_add(1, Ordering::SeqCst);
        Ok(Next::Continue)
    });
    let dispatcher = app.finalize();

    let res = dispatcher.dispatch(Request::new(Method::GET, "/guarded"));
    assert_eq!(res.status(), 401);
    assert_eq!(res.header("cache-control"), Some("no-store"));
    assert_eq!(handler_hits.load(Ordering::SeqCst), 0);
    assert_eq!(after_hits.load(Ordering::SeqCst), 0);

    let req = Request::new(Method::GET, "/guarded").with_header("x-api-key", "secret");
    let res = dispatcher.dispatch(req);
    assert_eq!(res.status(), 200);
    assert_eq!(handler_hits.load(Ordering::SeqCst), 1);
    assert_eq!(after_hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_parsers_run_before_user_middleware() {
    setup_may_runtime();
    let mut app = JsonRoutes::default();
    app.add("POST", "/form", |req, res| {
        res.send_result(ResponseOptions::new().data(req.body.clone().unwrap_or_default()))?;
        Ok(())
    })
    .unwrap();
    let seen_body = Arc::new(Mutex::new(None));
    let capture = Arc::clone(&seen_body);
    app.middleware().use_fn(move |req, _res| {
        *capture.lock().unwrap() = req.body.clone();
        Ok(Next::Continue)
    });

    let req = Request::new(Method::POST, "/form?src=test")
        .with_header("content-type", "application/x-www-form-urlencoded")
        .with_body("tag=a&tag=b");
    let res = app.finalize().dispatch(req);
    assert_eq!(res.status(), 200);
    assert_eq!(*seen_body.lock().unwrap(), Some(json!({ "tag": ["a", "b"] })));
}

#[test]
fn test_middleware_runs_for_unmatched_paths() {
    setup_may_runtime();
    let app = JsonRoutes::default();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    app.middleware().use_fn(move |_req, _res| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Next::Continue)
    });

    let res = app.finalize().dispatch(Request::new(Method::GET, "/missing"));
    assert_eq!(res.status(), 404);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_mounted_middleware_only_for_its_path() {
    setup_may_runtime();
    let mut app = JsonRoutes::default();
    app.add("GET", "/admin/stats", |_req, res| {
        res.send_json(200, json!({}))?;
        Ok(())
    })
    .unwrap();
    app.add("GET", "/public", |_req, res| {
        res.send_json(200, json!({}))?;
        Ok(())
    })
    .unwrap();
    app.middleware().use_at("/admin", |_req, _res| {
        Err(RouteError::with_status(403, "admins only").into())
    });
    let dispatcher = app.finalize();

    assert_eq!(dispatcher.dispatch(Request::new(Method::GET, "/admin/stats")).status(), 403);
    assert_eq!(dispatcher.dispatch(Request::new(Method::GET, "/public")).status(), 200);
}

#[test]
fn test_middleware_error_goes_to_error_pipeline() {
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let app = counting_app(&handler_hits);
    app.middleware()
        .use_fn(|_req, _res| Err(anyhow::anyhow!("rate limited")));
    app.error_middleware()
        .use_fn(|err, _req, res| {
            res.send_json(429, json!({ "error": err.to_string() }))?;
            Ok(Next::Handled)
        })
        .unwrap();

    let res = app.finalize().dispatch(Request::new(Method::GET, "/guarded"));
    assert_eq!(res.status(), 429);
    assert_eq!(handler_hits.load(Ordering::SeqCst), 0);
}

struct RequestCounter {
    seen: AtomicUsize,
}

impl Middleware for RequestCounter {
    fn handle(&self, req: &mut Request, _res: &mut Response) -> anyhow::Result<Next> {
        let n = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        req.extensions.insert(n);
        Ok(Next::Continue)
    }
}

#[test]
fn test_struct_middleware_and_extensions() {
    setup_may_runtime();
    let mut app = JsonRoutes::default();
    app.add("GET", "/count", |req, res| {
        let n = req.extensions.get::<usize>().copied().unwrap_or_default();
        res.send_json(200, json!({ "n": n }))?;
        Ok(())
    })
    .unwrap();
    let counter = Arc::new(RequestCounter {
        seen: AtomicUsize::new(0),
    });
    app.middleware().use_middleware(Arc::clone(&counter) as Arc<dyn Middleware>);
    let dispatcher = app.finalize();

    dispatcher.dispatch(Request::new(Method::GET, "/count"));
    let res = dispatcher.dispatch(Request::new(Method::GET, "/count"));
    assert_eq!(res.body(), br#"{"n":2}"#);
    assert_eq!(counter.seen.load(Ordering::SeqCst), 2);
}

#[test]
fn test_tracing_middleware_logs_request() {
    setup_may_runtime();
    let tracing = TestTracing::init();
    let app = JsonRoutes::default();
    app.middleware().use_middleware(Arc::new(TracingMiddleware));

    let res = app.finalize().dispatch(Request::new(Method::GET, "/traced?x=1"));
    assert_eq!(res.status(), 404);
    let logs = tracing.logs.contents();
    assert!(logs.contains("Request received"));
    assert!(logs.contains("/traced"));
    assert!(logs.contains("Request completed"));
}
