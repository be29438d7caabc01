//! Request path normalization for metric labels.
//!
//! Per-entity paths (`/account/550e8400-...`, `/orders/42`) would create one
//! time series per id ever requested. Sanitizing collapses them into a
//! stable route shape (`/account/:id`) so label cardinality stays bounded.

/// Placeholder substituted for id-like path segments.
pub const ID_PLACEHOLDER: &str = ":id";

/// Path label for requests no route matched.
pub const UNMATCHED_PATH: &str = "/unmatched";

/// Method label for anything outside the standard HTTP methods.
pub const OTHER_METHOD: &str = "OTHER";

const KNOWN_METHODS: [&str; 9] = [
    "GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH",
];

/// Normalize a raw request path into a low-cardinality label.
///
/// - drops the query string,
/// - replaces UUID, all-digit and `:param` segments with `:id`,
/// - collapses consecutive placeholders into one,
/// - guarantees a leading `/`.
pub fn sanitize(raw: &str) -> String {
    let path = match raw.split_once('?') {
        Some((p, _)) => p,
        None => raw,
    };

    let mut segs: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        if is_placeholder(seg) {
            if segs.last() == Some(&ID_PLACEHOLDER) {
                continue;
            }
            segs.push(ID_PLACEHOLDER);
        } else {
            segs.push(seg);
        }
    }

    let joined = segs.join("/");
    if joined.starts_with('/') {
        joined
    } else {
        format!("/{joined}")
    }
}

/// Remove the API version prefix (`/api/v1`, `/api/1`, `/api`) from a path.
pub fn strip_api_prefix(path: &str) -> &str {
    for prefix in ["/api/v1", "/api/1"] {
        if let Some(rest) = path.strip_prefix(prefix) {
            if rest.starts_with('/') {
                return rest;
            }
        }
    }
    match path.strip_prefix("/api") {
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Label path for a request: API prefix stripped, then sanitized.
pub fn label_path(path: &str) -> String {
    sanitize(strip_api_prefix(path))
}

/// Method label: standard methods pass through, extension methods become
/// [`OTHER_METHOD`].
pub fn method_label(method: &str) -> &str {
    if KNOWN_METHODS.contains(&method) {
        method
    } else {
        OTHER_METHOD
    }
}

fn is_placeholder(seg: &str) -> bool {
    is_uuid(seg) || is_numeric(seg) || is_route_param(seg)
}

fn is_numeric(seg: &str) -> bool {
    !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit())
}

fn is_route_param(seg: &str) -> bool {
    match seg.strip_prefix(':') {
        Some(name) => {
            !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        }
        None => false,
    }
}

// 8-4-4-4-12 hex, any case.
fn is_uuid(seg: &str) -> bool {
    let b = seg.as_bytes();
    if b.len() != 36 {
        return false;
    }
    b.iter().enumerate().all(|(i, c)| match i {
        8 | 13 | 18 | 23 => *c == b'-',
        _ => c.is_ascii_hexdigit(),
    })
}
