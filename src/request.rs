//! Framework-neutral view of an incoming request.

use http::header::{HeaderName, HeaderValue, COOKIE};
use http::{HeaderMap, Method};

/// Headers consulted, in order, for a caller supplied request id.
pub const REQUEST_ID_HEADERS: [&str; 2] = ["x-request-id", "x-traceid"];

/// The parts of an HTTP request the pipeline looks at.
///
/// Hosts build this from their framework's request type, usually via
/// `From<&http::request::Parts>`. It owns its data so it can cross task
/// boundaries freely.
///
/// # Examples
///
/// ```
/// use http::Method;
/// use steak_security::RequestParts;
///
/// let request = RequestParts::new(Method::GET, "/orders/42?expand=items")
///     .with_header("Authorization", "Bearer abc")
///     .with_cookie("SESSION", "xyz");
///
/// assert_eq!(request.path(), "/orders/42");
/// assert_eq!(request.header("authorization"), Some("Bearer abc"));
/// assert_eq!(request.cookie("SESSION").as_deref(), Some("xyz"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestParts {
    method: Method,
    path: String,
    headers: HeaderMap,
}

impl RequestParts {
    /// Creates request parts for `method` and `path`; any query string is dropped.
    pub fn new(method: Method, path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        let path = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
        Self {
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
        }
    }

    /// Creates request parts from an existing header map.
    pub fn with_headers(method: Method, path: impl AsRef<str>, headers: HeaderMap) -> Self {
        let mut parts = Self::new(method, path);
        parts.headers = headers;
        parts
    }

    /// Appends a header. Names or values that are not valid HTTP are dropped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::debug!(header = name, "ignoring invalid header"),
        }
        self
    }

    /// Appends a cookie as its own `Cookie` header.
    pub fn with_cookie(self, name: &str, value: &str) -> Self {
        let pair = format!("{}={}", name, value);
        self.with_header(COOKIE.as_str(), &pair)
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path, without query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// All request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The first value of header `name` if it is valid visible ASCII.
    ///
    /// Header names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Looks up cookie `name` across every `Cookie` header.
    ///
    /// Unparseable cookie pairs are skipped.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|raw| cookie::Cookie::split_parse(raw.to_string()))
            .filter_map(Result::ok)
            .find(|c| c.name() == name)
            .map(|c| c.value().to_string())
    }

    /// A caller supplied request id, if present and non-empty.
    pub fn request_id(&self) -> Option<&str> {
        REQUEST_ID_HEADERS
            .iter()
            .filter_map(|name| self.header(name))
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

impl From<&http::request::Parts> for RequestParts {
    fn from(parts: &http::request::Parts) -> Self {
        RequestParts::with_headers(parts.method.clone(), parts.uri.path(), parts.headers.clone())
    }
}

impl<B> From<&http::Request<B>> for RequestParts {
    fn from(request: &http::Request<B>) -> Self {
        RequestParts::with_headers(
            request.method().clone(),
            request.uri().path(),
            request.headers().clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_is_stripped() {
        let request = RequestParts::new(Method::GET, "/search?q=rust");
        assert_eq!(request.path(), "/search");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = RequestParts::new(Method::GET, "/").with_header("X-Api-Key", "k1");
        assert_eq!(request.header("x-api-key"), Some("k1"));
        assert_eq!(request.header("X-API-KEY"), Some("k1"));
    }

    #[test]
    fn invalid_headers_are_dropped() {
        let request = RequestParts::new(Method::GET, "/").with_header("bad header", "v");
        assert!(request.headers().is_empty());
    }

    #[test]
    fn cookies_are_found_across_headers() {
        let request = RequestParts::new(Method::GET, "/")
            .with_header("Cookie", "theme=dark; lang=en")
            .with_cookie("SESSION", "abc");

        assert_eq!(request.cookie("lang").as_deref(), Some("en"));
        assert_eq!(request.cookie("SESSION").as_deref(), Some("abc"));
        assert_eq!(request.cookie("missing"), None);
    }

    #[test]
    fn request_id_prefers_x_request_id() {
        let request = RequestParts::new(Method::GET, "/")
            .with_header("X-TraceId", "trace-1")
            .with_header("X-Request-Id", "req-1");
        assert_eq!(request.request_id(), Some("req-1"));

        let request = RequestParts::new(Method::GET, "/").with_header("X-TraceId", "trace-2");
        assert_eq!(request.request_id(), Some("trace-2"));
    }

    #[test]
    fn builds_from_http_request() {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("https://api.example.com/orders?draft=true")
            .header("Authorization", "Bearer t")
            .body(())
            .unwrap();

        let parts = RequestParts::from(&request);
        assert_eq!(parts.method(), &Method::POST);
        assert_eq!(parts.path(), "/orders");
        assert_eq!(parts.header("authorization"), Some("Bearer t"));
    }
}
