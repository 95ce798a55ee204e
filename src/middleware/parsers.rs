//! Request parsing middleware.
//!
//! Registered in front of the user middleware for every path under the route
//! namespace, in the order urlencoded, JSON, query. Each parser only touches
//! requests it recognizes and leaves already-parsed data alone.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use super::core::{Middleware, Next};
use crate::error::{ParseKind, RouteError};
use crate::request::Request;
use crate::response::Response;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Marker stored in request extensions once the query string was parsed.
#[derive(Debug, Clone, Copy)]
struct QueryParsed;

fn check_limit(req: &Request, limit: usize) -> Result<(), RouteError> {
    if req.raw_body.len() > limit {
        return Err(RouteError::PayloadTooLarge {
            limit,
            actual: req.raw_body.len(),
        });
    }
    Ok(())
}

fn is_json_media_type(media_type: &str) -> bool {
    media_type == "application/json" || media_type.ends_with("+json")
}

/// Parses `application/x-www-form-urlencoded` bodies into a JSON object.
///
/// Repeated keys are collected into an array in order of appearance.
pub struct UrlEncodedParser {
    limit: usize,
}

impl UrlEncodedParser {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Middleware for UrlEncodedParser {
    fn handle(&self, req: &mut Request, _res: &mut Response) -> anyhow::Result<Next> {
        if req.body.is_some() || req.content_type().as_deref() != Some(FORM_CONTENT_TYPE) {
            return Ok(Next::Continue);
        }
        check_limit(req, self.limit)?;
        if std::str::from_utf8(&req.raw_body).is_err() {
            return Err(RouteError::Parse {
                kind: ParseKind::UrlEncoded,
                message: "body is not valid UTF-8".to_string(),
            }
            .into());
        }

        let mut fields = Map::new();
        for (key, value) in url::form_urlencoded::parse(&req.raw_body) {
            let value = Value::String(value.into_owned());
            match fields.get_mut(key.as_ref()) {
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    fields.insert(key.into_owned(), value);
                }
            }
        }
        debug!(request_id = %req.request_id, fields = fields.len(), "Parsed urlencoded body");
        req.body = Some(Value::Object(fields));
        Ok(Next::Continue)
    }
}

/// Parses JSON bodies (`application/json` and `*+json`).
///
/// In strict mode only objects and arrays are accepted at the top level.
pub struct JsonParser {
    limit: usize,
    strict: bool,
}

impl JsonParser {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            strict: true,
        }
    }

    /// Accept any JSON value at the top level.
    #[must_use]
    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }
}

impl Middleware for JsonParser {
    fn handle(&self, req: &mut Request, _res: &mut Response) -> anyhow::Result<Next> {
        if req.body.is_some() || req.raw_body.is_empty() {
            return Ok(Next::Continue);
        }
        match req.content_type() {
            Some(media_type) if is_json_media_type(&media_type) => {}
            _ => return Ok(Next::Continue),
        }
        check_limit(req, self.limit)?;

        let value: Value =
            serde_json::from_slice(&req.raw_body).map_err(|err| RouteError::Parse {
                kind: ParseKind::Json,
                message: err.to_string(),
            })?;
        if self.strict && !(value.is_object() || value.is_array()) {
            return Err(RouteError::Parse {
                kind: ParseKind::Json,
                message: "top-level value must be an object or an array".to_string(),
            }
            .into());
        }
        debug!(request_id = %req.request_id, bytes = req.raw_body.len(), "Parsed JSON body");
        req.body = Some(value);
        Ok(Next::Continue)
    }
}

/// Fills [`Request::query_params`] from the query string.
#[derive(Default)]
pub struct QueryParser;

impl Middleware for QueryParser {
    fn handle(&self, req: &mut Request, _res: &mut Response) -> anyhow::Result<Next> {
        if req.extensions.get::<QueryParsed>().is_some() {
            return Ok(Next::Continue);
        }
        let Some(query) = req.query_string.take() else {
            req.extensions.insert(QueryParsed);
            return Ok(Next::Continue);
        };

        let mut parsed = Vec::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if (key.contains('\u{FFFD}') || value.contains('\u{FFFD}'))
                && !query.contains('\u{FFFD}')
            {
                req.query_string = Some(query);
                return Err(RouteError::Parse {
                    kind: ParseKind::Query,
                    message: "query string is not valid UTF-8".to_string(),
                }
                .into());
            }
            parsed.push((key.into_owned(), value.into_owned()));
        }
        for (key, value) in parsed {
            req.push_query_param(&key, value);
        }
        req.query_string = Some(query);
        req.extensions.insert(QueryParsed);
        Ok(Next::Continue)
    }
}

/// The standard parser chain: urlencoded, JSON, query.
#[must_use]
pub fn default_parsers(limit: usize) -> Vec<Arc<dyn Middleware>> {
    vec![
        Arc::new(UrlEncodedParser::new(limit)),
        Arc::new(JsonParser::new(limit)),
        Arc::new(QueryParser),
    ]
}
