//! # jsonroutes
//!
//! A small JSON routing layer on top of the `may` coroutine runtime: register
//! method + path handlers under a namespace, run ordered middleware in front of
//! them, collect failures in a deferred error pipeline and write JSON responses
//! through one uniform contract.
//!
//! ## Architecture
//!
//! - **[`app`]** - [`JsonRoutes`], the registration-phase configuration object
//! - **[`registry`]** - namespaced route table and route listing
//! - **[`router`]** - radix-tree path matching with `{id}` / `:id` parameters
//! - **[`middleware`]** - request pipeline, error queue/pipeline and body parsers
//! - **[`dispatcher`]** - per-request state machine; handlers run in their own coroutine
//! - **[`response`]** - [`Response`] and [`send_result`]
//! - **[`server`]** - `may_minihttp` adapter
//! - **[`runtime_config`]** / **[`logging`]** - environment and file configuration, tracing setup
//!
//! ## Lifecycle
//!
//! ```text
//! JsonRoutes::new(config)      registration phase
//!   .add(method, path, handler)
//!   .middleware().use_fn(..)
//!   .error_middleware().use_fn(..)
//!   .finalize()                 error middleware flushed once
//! -> Dispatcher                 active phase
//!   .dispatch(request) -> Response
//! ```
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use jsonroutes::{JsonRoutes, Next, Request, ResponseOptions};
//! use serde_json::json;
//!
//! let mut app = JsonRoutes::default();
//! app.add("GET", "hello/{name}", |req, res| {
//!     let name = req.path_param("name").unwrap_or("world").to_string();
//!     res.send_result(ResponseOptions::new().data(json!({ "hello": name })))?;
//!     Ok(())
//! })
//! .unwrap();
//! app.error_middleware()
//!     .use_fn(|err, _req, res| {
//!         res.send_json(err.status(), json!({ "error": err.to_string() }))?;
//!         Ok(Next::Handled)
//!     })
//!     .unwrap();
//!
//! let dispatcher = app.finalize();
//! let res = dispatcher.dispatch(Request::new(Method::GET, "/hello/rust"));
//! assert_eq!(res.status(), 200);
//! assert_eq!(res.body(), br#"{"hello":"rust"}"#);
//! assert_eq!(res.header("cache-control"), Some("no-store"));
//! ```
//!
//! ## Configuration
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `JSONROUTES_NAMESPACE` | prefix for every route | none |
//! | `JSONROUTES_ENV` | `development` pretty-prints JSON | `production` |
//! | `JSONROUTES_STACK_SIZE` | handler coroutine stack (hex or decimal) | `0x10000` |
//! | `JSONROUTES_BODY_LIMIT` | max parsed body size in bytes | 1 MiB |
//! | `JSONROUTES_ADDR` | listen address for `jsonroutes serve` | `0.0.0.0:8080` |
//! | `JSONROUTES_LOG_LEVEL` / `JSONROUTES_LOG_FORMAT` | logging | `info` / `json` |

pub mod app;
pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod registry;
pub mod request;
pub mod response;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use app::JsonRoutes;
pub use dispatcher::{DispatchState, Dispatcher};
pub use error::{ParseKind, RegistrationError, ResponseError, RouteError};
pub use ids::RequestId;
pub use middleware::{ErrorMiddleware, Middleware, MiddlewareKind, Next};
pub use registry::{Handler, RouteEntry};
pub use request::Request;
pub use response::{send_result, Response, ResponseOptions};
pub use runtime_config::{Environment, RuntimeConfig};
