//! # Middleware Module
//!
//! Two chains wrap every routed request:
//!
//! - the **request pipeline** ([`MiddlewarePipeline`]): ordered units that run
//!   before the handler and may short-circuit by returning [`Next::Handled`]
//! - the **error pipeline** ([`ErrorPipeline`]): units that receive a
//!   [`RouteError`](crate::error::RouteError) raised by a handler or middleware
//!
//! Error middleware is registered through an [`ErrorMiddlewareQueue`] and only
//! becomes active when the queue is flushed at startup. Registrations after that
//! point are rejected.
//!
//! ## Writing middleware
//!
//! Closures work directly:
//!
//! ```rust
//! use jsonroutes::middleware::{MiddlewarePipeline, Next};
//!
//! let pipeline = MiddlewarePipeline::new();
//! pipeline.use_fn(|req, res| {
//!     if req.header("x-api-key").is_none() {
//!         res.send_json(401, serde_json::json!({"error": "missing key"}))?;
//!         return Ok(Next::Handled);
//!     }
//!     Ok(Next::Continue)
//! });
//! ```
//!
//! Types implement [`Middleware`] or [`ErrorMiddleware`].

mod core;
mod error_queue;
mod parsers;
mod pipeline;
mod tracing;

pub(crate) use core::mount_matches;
pub use core::{ErrorMiddleware, Middleware, MiddlewareKind, Mounted, Next};
pub use error_queue::{ErrorMiddlewareQueue, ErrorPipeline};
pub use parsers::{default_parsers, JsonParser, QueryParser, UrlEncodedParser};
pub use pipeline::MiddlewarePipeline;
pub use tracing::TracingMiddleware;
