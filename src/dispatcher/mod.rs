//! # Dispatcher Module
//!
//! Turns a [`Request`](crate::request::Request) into a finished
//! [`Response`](crate::response::Response).
//!
//! ## Request Flow
//!
//! 1. The route is resolved through the registry
//! 2. For a matched route the parsers run (urlencoded, JSON, query)
//! 3. The user middleware pipeline runs for every request
//! 4. The handler runs in its own `may` coroutine
//! 5. Any error, from a parser, middleware or handler, walks the error pipeline
//!
//! Each step is logged as a [`DispatchState`] transition at debug level.
//!
//! ## Isolation
//!
//! Handlers and error handlers each get a fresh coroutine with the configured
//! stack size (`JSONROUTES_STACK_SIZE`, 64 KiB by default). A handler that
//! blocks on coroutine-aware I/O suspends only its own coroutine. Panics are
//! caught inside the coroutine and turned into [`RouteError::Panic`](crate::error::RouteError::Panic).
//!
//! ## Fallbacks
//!
//! - No route matched: 404 with `{"error":"Not Found","method":..,"path":..}`
//! - Error nobody handled: the error's status with a plain-text reason phrase

mod core;

pub(crate) use core::DispatcherParts;
pub use core::{DispatchState, Dispatcher};
