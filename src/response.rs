//! # Response Writer
//!
//! [`Response`] is the per-request response object middleware and handlers write to;
//! [`send_result`] is the uniform JSON writing contract:
//!
//! - `options.headers` are merged over the headers already on the response
//! - the status is `options.code`, or 200 when unset
//! - `data: None` means no body and no `Content-Type`; `Some(Value::Null)` writes `null`
//! - JSON is pretty-printed (2-space indent) in development mode, compact otherwise
//! - the response is finalized; a second terminal write fails with
//!   [`ResponseError::AlreadySent`]

use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;

use crate::error::ResponseError;

/// Per-call options for [`send_result`].
#[derive(Debug, Clone, Default)]
pub struct ResponseOptions {
    /// HTTP status code, 200 when `None`
    pub code: Option<u16>,
    /// Headers merged over the ones already set
    pub headers: Vec<(String, String)>,
    /// Body to serialize; `None` means no body at all
    pub data: Option<Value>,
}

impl ResponseOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body. `Value::Null` is written as the literal `null`.
    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the body from any serializable value.
    pub fn try_data<T: Serialize>(mut self, data: &T) -> Result<Self, ResponseError> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }
}

/// Response under construction.
///
/// Created by the dispatcher with the default headers already applied. Once
/// finalized (by [`send_result`] or [`Response::end`]) it rejects further writes.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
    finished: bool,
    pretty: bool,
}

impl Response {
    /// Create an empty 200 response. `pretty` selects pretty-printed JSON.
    #[must_use]
    pub fn new(pretty: bool) -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            body: Vec::new(),
            finished: false,
            pretty,
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Get a header by name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether a terminal write already happened
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn pretty(&self) -> bool {
        self.pretty
    }

    fn ensure_open(&self) -> Result<(), ResponseError> {
        if self.finished {
            Err(ResponseError::AlreadySent)
        } else {
            Ok(())
        }
    }

    pub fn set_status(&mut self, status: u16) -> Result<(), ResponseError> {
        self.ensure_open()?;
        if !(100..=999).contains(&status) {
            return Err(ResponseError::InvalidStatus(status));
        }
        self.status = status;
        Ok(())
    }

    /// Set a header, replacing any previous value with the same name.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), ResponseError> {
        self.ensure_open()?;
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ResponseError::InvalidHeader {
                name: name.to_string(),
            }
        })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| ResponseError::InvalidHeader {
                name: name.to_string(),
            })?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    /// Merge a header map over the current headers.
    pub fn set_headers(&mut self, headers: &HeaderMap) -> Result<(), ResponseError> {
        self.ensure_open()?;
        for name in headers.keys() {
            self.headers.remove(name);
        }
        for (name, value) in headers {
            self.headers.append(name.clone(), value.clone());
        }
        Ok(())
    }

    /// Append raw bytes to the body.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    /// Finalize the response.
    pub fn end(&mut self) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.finished = true;
        Ok(())
    }

    pub(crate) fn force_finish(&mut self) {
        self.finished = true;
    }

    pub(crate) fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Write `value` as the JSON body, honoring the pretty-print mode.
    pub fn write_json(&mut self, value: &Value) -> Result<(), ResponseError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.write(&bytes)
    }

    /// Method form of [`send_result`].
    pub fn send_result(&mut self, options: ResponseOptions) -> Result<(), ResponseError> {
        send_result(self, options)
    }

    /// Shorthand for a JSON response with a status code.
    pub fn send_json(&mut self, code: u16, data: Value) -> Result<(), ResponseError> {
        send_result(self, ResponseOptions::new().code(code).data(data))
    }
}

/// Set headers, status and JSON body on `res`, then finalize it.
///
/// Validation happens before anything is written, so a rejected call leaves the
/// response untouched and still open.
pub fn send_result(res: &mut Response, options: ResponseOptions) -> Result<(), ResponseError> {
    res.ensure_open()?;

    let status = options.code.unwrap_or(200);
    if !(100..=999).contains(&status) {
        return Err(ResponseError::InvalidStatus(status));
    }

    let mut extra = HeaderMap::with_capacity(options.headers.len());
    for (name, value) in &options.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ResponseError::InvalidHeader { name: name.clone() })?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ResponseError::InvalidHeader { name: name.clone() })?;
        extra.insert(header_name, header_value);
    }

    let body = match &options.data {
        Some(data) if res.pretty => Some(serde_json::to_vec_pretty(data)?),
        Some(data) => Some(serde_json::to_vec(data)?),
        None => None,
    };

    res.set_headers(&extra)?;
    res.status = status;
    if let Some(bytes) = body {
        res.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        res.body.extend_from_slice(&bytes);
    }
    res.end()
}
