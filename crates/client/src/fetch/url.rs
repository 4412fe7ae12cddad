//! Request URL resolution for consistent cache keys.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a request target against the application origin.
///
/// Root-relative paths (`/styles.css`) are joined onto `origin`; anything
/// else must be an absolute http(s) URL. In both cases:
/// 1. Leading/trailing whitespace is trimmed
/// 2. The host is lowercased
/// 3. The fragment is removed
/// 4. The query string is kept intact
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = if trimmed.starts_with('/') {
        origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else {
        Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}
