//! Router core module - hot path for request routing.

use http::Method;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::radix::RadixRouter;

/// Maximum number of path/query parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` because they come from the static route tree and
/// are cloned on every match; values are per-request data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of successfully matching a request path to a route
#[derive(Debug, Clone)]
pub struct RouteMatch<T> {
    /// Value registered for the route
    pub target: T,
    /// Path parameters extracted from the URL (e.g., `{id}` → `("id", "123")`)
    pub path_params: ParamVec,
}

/// Method + path router used by the route registry.
///
/// Dispatch priority: static segments beat parameter segments at every depth;
/// for an identical method and pattern the last registration wins.
#[derive(Clone)]
pub struct Router<T> {
    radix_router: RadixRouter<T>,
    len: usize,
}

impl<T: Clone> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Router<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            radix_router: RadixRouter::new(),
            len: 0,
        }
    }

    /// Register `target` for `method` and `pattern`.
    pub fn insert(&mut self, method: Method, pattern: &str, target: T) {
        if self.radix_router.insert(method.clone(), pattern, target).is_some() {
            warn!(
                method = %method,
                pattern = %pattern,
                "Route registered twice - last registration wins"
            );
        } else {
            self.len += 1;
        }
    }

    /// Number of distinct (method, pattern) pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Match an HTTP request to a route.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch<T>> {
        let match_start = Instant::now();
        let result = self.radix_router.route(method, path);
        let match_duration = match_start.elapsed();

        if match_duration > Duration::from_millis(1) {
            warn!(
                method = %method,
                path = %path,
                duration_us = match_duration.as_micros(),
                "Slow route matching detected"
            );
        }

        match result {
            Some((target, path_params)) => {
                debug!(
                    method = %method,
                    path = %path,
                    path_params = ?path_params,
                    duration_us = match_duration.as_micros(),
                    "Route matched"
                );
                Some(RouteMatch {
                    target,
                    path_params,
                })
            }
            None => {
                debug!(method = %method, path = %path, "No route matched");
                None
            }
        }
    }
}
