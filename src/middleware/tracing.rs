use tracing::info;

use super::core::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Logs one structured line per request before the handler runs.
///
/// Completion (status and latency) is logged by the dispatcher, which sees the
/// final response.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn handle(&self, req: &mut Request, _res: &mut Response) -> anyhow::Result<Next> {
        info!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            query = ?req.query_string,
            body_bytes = req.raw_body.len(),
            "Request received"
        );
        Ok(Next::Continue)
    }
}
