//! # Server Module
//!
//! Binds a [`Dispatcher`](crate::dispatcher::Dispatcher) to `may_minihttp`.
//! The HTTP/1.1 parsing and connection handling are `may_minihttp`'s; this
//! module converts requests in, writes responses out and manages the
//! listener's lifetime.
//!
//! ## Header limits
//!
//! The crates.io `may_minihttp` 0.1 parses at most 16 request headers; a
//! request with more is rejected by the transport before it reaches the
//! dispatcher. Responses are capped at 16 header lines as well: extra lines
//! are dropped with a warning. Distinct `Name: value` lines are cached for
//! the life of the process up to a fixed bound, after which new per-request
//! values (an echoed request id, an ETag) are dropped from the wire response.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jsonroutes::server::{AppService, HttpServer};
//! use jsonroutes::JsonRoutes;
//!
//! let app = JsonRoutes::default();
//! let body_limit = app.config().body_limit;
//! let dispatcher = Arc::new(app.finalize());
//! let handle = HttpServer(AppService::new(dispatcher, body_limit))
//!     .start("127.0.0.1:8080")
//!     .unwrap();
//! handle.wait_ready().unwrap();
//! handle.join().unwrap();
//! ```

mod http_server;
mod request;
mod response;
mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::build_request;
pub use service::AppService;
