//! Registration-phase configuration object.
//!
//! [`JsonRoutes`] collects routes, middleware and error middleware. Calling
//! [`JsonRoutes::finalize`] flushes the buffered error middleware exactly once and
//! produces the [`Dispatcher`] that serves requests.
//!
//! ```rust
//! use jsonroutes::{JsonRoutes, Next, ResponseOptions};
//! use serde_json::json;
//!
//! let mut app = JsonRoutes::default();
//! app.add("get", "pets/{id}", |req, res| {
//!     let id = req.path_param("id").unwrap_or_default().to_string();
//!     res.send_result(ResponseOptions::new().data(json!({ "id": id })))?;
//!     Ok(())
//! })
//! .unwrap();
//! app.middleware().use_fn(|_req, _res| Ok(Next::Continue));
//!
//! let dispatcher = app.finalize();
//! assert_eq!(dispatcher.routes().len(), 1);
//! ```

use std::sync::Arc;

use http::header::HeaderMap;
use tracing::info;

use crate::dispatcher::{Dispatcher, DispatcherParts};
use crate::error::{RegistrationError, ResponseError};
use crate::middleware::{
    default_parsers, ErrorMiddlewareQueue, MiddlewareKind, MiddlewarePipeline,
};
use crate::registry::{Handler, RouteEntry, RouteRegistry};
use crate::request::Request;
use crate::response::Response;
use crate::runtime_config::{default_response_headers, RuntimeConfig};

pub struct JsonRoutes {
    config: RuntimeConfig,
    registry: RouteRegistry,
    middleware: Arc<MiddlewarePipeline>,
    error_queue: ErrorMiddlewareQueue,
    default_headers: HeaderMap,
}

impl Default for JsonRoutes {
    fn default() -> Self {
        let config = RuntimeConfig::default();
        Self {
            registry: RouteRegistry::new(&config.namespace),
            middleware: Arc::new(MiddlewarePipeline::new()),
            error_queue: ErrorMiddlewareQueue::new(),
            default_headers: default_response_headers(),
            config,
        }
    }
}

impl JsonRoutes {
    /// Build from a runtime configuration.
    ///
    /// Fails when a configured default response header is not valid HTTP.
    pub fn new(config: RuntimeConfig) -> Result<Self, ResponseError> {
        let default_headers = config.default_headers()?;
        Ok(Self {
            registry: RouteRegistry::new(&config.namespace),
            middleware: Arc::new(MiddlewarePipeline::new()),
            error_queue: ErrorMiddlewareQueue::new(),
            default_headers,
            config,
        })
    }

    /// Build from `JSONROUTES_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::new(RuntimeConfig::from_env())?)
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Normalized namespace prepended to every route
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.registry.namespace()
    }

    /// Register a handler. The method is case-insensitive; the path gets a
    /// leading slash if missing and is prefixed with the namespace.
    pub fn add<F>(&mut self, method: &str, path: &str, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.add(method, path, handler)
    }

    pub fn add_handler(
        &mut self,
        method: &str,
        path: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), RegistrationError> {
        self.registry.add_handler(method, path, handler)
    }

    /// The user middleware pipeline; it stays live after [`finalize`](Self::finalize).
    #[must_use]
    pub fn middleware(&self) -> &MiddlewarePipeline {
        &self.middleware
    }

    /// Queue for error middleware. Clone it to keep a handle; registrations made
    /// through a handle after finalize are rejected.
    #[must_use]
    pub fn error_middleware(&self) -> &ErrorMiddlewareQueue {
        &self.error_queue
    }

    /// Register a tagged middleware unit into the matching pipeline.
    pub fn register(&self, kind: MiddlewareKind) -> Result<(), RegistrationError> {
        match kind {
            MiddlewareKind::Normal(unit) => {
                self.middleware.use_middleware(unit);
                Ok(())
            }
            MiddlewareKind::Error(unit) => self.error_queue.use_middleware(unit),
        }
    }

    /// Replace the default response headers wholesale.
    pub fn set_response_headers(&mut self, headers: HeaderMap) {
        self.default_headers = headers;
    }

    #[must_use]
    pub fn response_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Registered routes in registration order
    #[must_use]
    pub fn routes(&self) -> &[RouteEntry] {
        self.registry.routes()
    }

    /// End the registration phase.
    ///
    /// Flushes the error middleware queue into the active error pipeline. Any
    /// error middleware registered afterwards is rejected with
    /// [`RegistrationError::ErrorPipelineFinalized`].
    #[must_use]
    pub fn finalize(self) -> Dispatcher {
        let parsers = MiddlewarePipeline::new();
        for parser in default_parsers(self.config.body_limit) {
            parsers.use_middleware(parser);
        }
        let error_pipeline = self.error_queue.flush();

        info!(
            namespace = %self.registry.namespace(),
            routes = self.registry.routes().len(),
            environment = ?self.config.environment,
            "Route configuration finalized"
        );

        Dispatcher::from_parts(DispatcherParts {
            registry: self.registry,
            parsers,
            middleware: self.middleware,
            error_queue: self.error_queue,
            error_pipeline,
            default_headers: self.default_headers,
            body_limit: self.config.body_limit,
            stack_size: self.config.stack_size,
            pretty: self.config.environment.pretty_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_config::Environment;

    #[test]
    fn test_namespace_from_config() {
        let config = RuntimeConfig {
            namespace: "api".to_string(),
            ..RuntimeConfig::default()
        };
        let mut app = JsonRoutes::new(config).unwrap();
        app.add("get", "pets", |_req, _res| Ok(())).unwrap();
        assert_eq!(app.namespace(), "/api");
        assert_eq!(app.routes()[0].path, "/api/pets");
    }

    #[test]
    fn test_register_tagged_kinds() {
        let app = JsonRoutes::default();
        app.register(MiddlewareKind::normal(|_req, _res| Ok(crate::Next::Continue)))
            .unwrap();
        app.register(MiddlewareKind::error(|_err, _req, _res| {
            Ok(crate::Next::Continue)
        }))
        .unwrap();
        assert_eq!(app.middleware().len(), 1);
        assert_eq!(app.error_middleware().pending(), 1);

        let dispatcher = app.finalize();
        assert_eq!(dispatcher.error_pipeline_len(), 1);
    }

    #[test]
    fn test_finalize_closes_error_queue() {
        let app = JsonRoutes::default();
        let late_handle = app.error_middleware().clone();
        let dispatcher = app.finalize();

        assert_eq!(
            late_handle.use_fn(|_err, _req, _res| Ok(crate::Next::Handled)),
            Err(RegistrationError::ErrorPipelineFinalized)
        );
        assert_eq!(
            dispatcher.register(MiddlewareKind::error(|_err, _req, _res| {
                Ok(crate::Next::Handled)
            })),
            Err(RegistrationError::ErrorPipelineFinalized)
        );
        assert_eq!(dispatcher.error_pipeline_len(), 0);
    }

    #[test]
    fn test_invalid_configured_header_rejected() {
        let mut config = RuntimeConfig {
            environment: Environment::Development,
            ..RuntimeConfig::default()
        };
        config
            .response_headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(JsonRoutes::new(config).is_err());
    }
}
