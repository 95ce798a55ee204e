use std::io;
use std::sync::Arc;

use may_minihttp::{HttpService, Request, Response};
use tracing::warn;

use super::request::from_minihttp;
use super::response::{status_reason, write_response};
use crate::dispatcher::Dispatcher;

/// `may_minihttp` service that feeds every connection's requests to a [`Dispatcher`].
///
/// `may_minihttp` already serves each connection on its own coroutine; the
/// dispatcher adds one more per handler invocation.
#[derive(Clone)]
pub struct AppService {
    pub dispatcher: Arc<Dispatcher>,
    pub body_limit: usize,
}

impl AppService {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, body_limit: usize) -> Self {
        Self {
            dispatcher,
            body_limit,
        }
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let request = match from_minihttp(req, self.body_limit) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "Failed to read request body");
                res.status_code(400, status_reason(400));
                return Ok(());
            }
        };
        let response = self.dispatcher.dispatch(request);
        write_response(res, response);
        Ok(())
    }
}
