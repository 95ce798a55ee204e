//! Route registry: the namespaced route table and its public listing.

use std::sync::Arc;

use http::Method;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::info;

use crate::error::RegistrationError;
use crate::request::Request;
use crate::response::Response;
use crate::router::{RouteMatch, Router};

/// A route handler.
///
/// Handlers write their output through the [`Response`] (usually with
/// [`send_result`](crate::response::send_result)). Returning `Err` hands the
/// error to the error pipeline.
pub trait Handler: Send + Sync {
    fn call(&self, req: &mut Request, res: &mut Response) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut Request, &mut Response) -> anyhow::Result<()> + Send + Sync,
{
    fn call(&self, req: &mut Request, res: &mut Response) -> anyhow::Result<()> {
        self(req, res)
    }
}

/// One registered route as listed by [`RouteRegistry::routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub method: Method,
    /// Full path including the namespace, always starting with `/`
    pub path: String,
}

impl Serialize for RouteEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RouteEntry", 2)?;
        state.serialize_field("method", self.method.as_str())?;
        state.serialize_field("path", &self.path)?;
        state.end()
    }
}

/// Normalize a namespace to `/segment` form; `""` and `"/"` mean no namespace.
pub(crate) fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Registered routes plus the router that matches them.
///
/// Registration order is kept in the listing only; matching priority comes
/// from the [`Router`] (static segments beat parameters, identical keys are
/// replaced by the later registration).
pub struct RouteRegistry {
    namespace: String,
    routes: Vec<RouteEntry>,
    router: Router<Arc<dyn Handler>>,
}

impl RouteRegistry {
    #[must_use]
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: normalize_namespace(namespace),
            routes: Vec::new(),
            router: Router::new(),
        }
    }

    /// Normalized namespace, empty when routes are mounted at the root
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Full path a route registered as `path` is served at.
    #[must_use]
    pub fn namespaced_path(&self, path: &str) -> String {
        let path = path.trim();
        let mut full = String::with_capacity(self.namespace.len() + path.len() + 1);
        full.push_str(&self.namespace);
        if !path.starts_with('/') {
            full.push('/');
        }
        full.push_str(path);
        if full.len() > 1 && full.ends_with('/') {
            full.pop();
        }
        full
    }

    /// Register a closure for `method` (case-insensitive) and `path`.
    pub fn add<F>(&mut self, method: &str, path: &str, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add_handler(method, path, Arc::new(handler))
    }

    pub fn add_handler(
        &mut self,
        method: &str,
        path: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RegistrationError> {
        let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| RegistrationError::InvalidMethod(method.to_string()))?;
        let full_path = self.namespaced_path(path);

        info!(method = %method, path = %full_path, "Route registered");
        self.router.insert(method.clone(), &full_path, handler);
        self.routes.push(RouteEntry {
            method,
            path: full_path,
        });
        Ok(())
    }

    /// Every registration in order, including repeated ones.
    #[must_use]
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// Whether `path` lies under the namespace (always true without one).
    #[must_use]
    pub fn is_under_namespace(&self, path: &str) -> bool {
        if self.namespace.is_empty() {
            return true;
        }
        crate::middleware::mount_matches(&self.namespace, path)
    }

    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch<Arc<dyn Handler>>> {
        self.router.route(method, path)
    }
}
