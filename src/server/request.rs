use std::io::{self, Read};

use http::Method;
use tracing::{debug, warn};

use crate::ids::RequestId;
use crate::request::{BodyLimitExceeded, Request};

/// Build a routing [`Request`] from the raw pieces of an HTTP request.
///
/// Header names and values that are not valid HTTP are dropped. An
/// `x-request-id` header carrying a ULID is reused as the request ID.
pub fn build_request<'a, I>(method: &str, raw_path: &str, headers: I, body: Vec<u8>) -> Request
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let method = Method::from_bytes(method.as_bytes()).unwrap_or(Method::GET);
    let mut req = Request::new(method, raw_path).with_body(body);
    for (name, value) in headers {
        let parsed = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_bytes(value),
        );
        match parsed {
            (Ok(name), Ok(value)) => {
                req.headers.append(name, value);
            }
            _ => debug!(header = %name, "Dropping invalid request header"),
        }
    }
    req.request_id = RequestId::from_header_or_new(req.header("x-request-id"));
    req
}

/// Read at most `limit + 1` bytes so an oversized body is detectable without
/// buffering all of it.
pub(crate) fn read_body<R: Read>(reader: R, limit: usize) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    reader.take(cap).read_to_end(&mut body)?;
    Ok(body)
}

/// Flag a body that [`read_body`] cut off so the dispatcher rejects it with
/// 413 instead of passing the truncated bytes on.
pub(crate) fn mark_oversized(req: &mut Request, limit: usize) {
    if req.raw_body.len() <= limit {
        return;
    }
    let declared = req
        .header("content-length")
        .and_then(|v| v.trim().parse::<usize>().ok());
    let actual = declared.unwrap_or(req.raw_body.len());
    warn!(
        request_id = %req.request_id,
        limit,
        actual,
        "Request body exceeds limit"
    );
    req.raw_body.truncate(limit);
    req.extensions.insert(BodyLimitExceeded { limit, actual });
}

/// Convert a `may_minihttp` request.
pub(crate) fn from_minihttp(req: may_minihttp::Request, body_limit: usize) -> io::Result<Request> {
    let method = req.method().to_string();
    let raw_path = req.path().to_string();
    let headers: Vec<(String, Vec<u8>)> = req
        .headers()
        .iter()
        .map(|h| (h.name.to_string(), h.value.to_vec()))
        .collect();
    let body = read_body(req.body(), body_limit)?;

    let mut request = build_request(
        &method,
        &raw_path,
        headers.iter().map(|(n, v)| (n.as_str(), v.as_slice())),
        body,
    );
    mark_oversized(&mut request, body_limit);
    debug!(
        request_id = %request.request_id,
        method = %request.method,
        path = %request.path,
        header_count = request.headers.len(),
        body_bytes = request.raw_body.len(),
        "HTTP request parsed"
    );
    Ok(request)
}
