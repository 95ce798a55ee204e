use dashmap::DashMap;
use http::StatusCode;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::response::Response;

/// Distinct header lines kept for the life of the process. Lines past this are
/// dropped from the response instead of leaking.
const MAX_INTERNED_HEADER_LINES: usize = 4096;

/// `may_minihttp` 0.1 holds at most this many header lines per response and
/// panics past it.
pub(crate) const MAX_RESPONSE_HEADERS: usize = 16;

/// `may_minihttp` only accepts `&'static str` header lines. Each distinct
/// `Name: value` line is leaked once and reused afterwards.
static HEADER_LINES: Lazy<DashMap<String, &'static str>> = Lazy::new(DashMap::new);

pub(crate) fn header_line(name: &str, value: &str) -> Option<&'static str> {
    intern_line(&HEADER_LINES, MAX_INTERNED_HEADER_LINES, name, value)
}

fn intern_line(
    table: &DashMap<String, &'static str>,
    cap: usize,
    name: &str,
    value: &str,
) -> Option<&'static str> {
    let line = format!("{name}: {value}");
    if let Some(interned) = table.get(&line) {
        return Some(*interned);
    }
    if table.len() >= cap {
        warn!(
            cap,
            header = %name,
            "Header line cache full - dropping per-request header value"
        );
        return None;
    }
    let entry = table.entry(line);
    let key = entry.key().clone();
    Some(*entry.or_insert_with(|| Box::leak(key.into_boxed_str())))
}

/// Reason phrase for the status line.
pub(crate) fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Copy a finished routing response onto the wire response.
pub(crate) fn write_response(out: &mut may_minihttp::Response, response: Response) {
    let status = response.status();
    out.status_code(usize::from(status), status_reason(status));
    let mut written = 0;
    for (name, value) in response.headers() {
        if written == MAX_RESPONSE_HEADERS {
            warn!(
                limit = MAX_RESPONSE_HEADERS,
                header = %name,
                "Too many response headers - dropping the rest"
            );
            break;
        }
        let Ok(value) = value.to_str() else {
            warn!(header = %name, "Skipping non-ASCII response header");
            continue;
        };
        if let Some(line) = header_line(name.as_str(), value) {
            out.header(line);
            written += 1;
        }
    }
    out.body_vec(response.into_body());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(799), "Unknown");
    }

    #[test]
    fn test_header_line_interned() {
        let a = header_line("cache-control", "no-store").unwrap();
        let b = header_line("cache-control", "no-store").unwrap();
        assert_eq!(a, "cache-control: no-store");
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_intern_table_is_bounded() {
        let table = DashMap::new();
        assert!(intern_line(&table, 2, "etag", "\"a\"").is_some());
        assert!(intern_line(&table, 2, "etag", "\"b\"").is_some());
        assert!(intern_line(&table, 2, "etag", "\"c\"").is_none());
        assert_eq!(table.len(), 2);
        // Known lines are still served once the table is full
        assert_eq!(intern_line(&table, 2, "etag", "\"a\""), Some("etag: \"a\""));
    }
}
