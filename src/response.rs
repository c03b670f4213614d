//! Mapping rejections to HTTP responses.

use http::header::{HeaderValue, CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{HeaderMap, StatusCode};

use crate::error::RejectReason;

/// Default realm announced in `WWW-Authenticate` challenges.
pub const DEFAULT_REALM: &str = "api";

/// A response the host should send instead of invoking the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityResponse {
    /// Status code
    pub status: StatusCode,
    /// Headers, including any authentication challenge
    pub headers: HeaderMap,
    /// Fixed body text
    pub body: &'static str,
}

impl SecurityResponse {
    /// Converts into an [`http::Response`].
    pub fn into_http(self) -> http::Response<&'static str> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Turns rejection reasons into HTTP responses.
///
/// | Reason | Status | Challenge |
/// |---|---|---|
/// | MissingCredential | 401 | `Bearer realm` |
/// | Malformed, Invalid, Expired | 401 | `Bearer realm, error="invalid_token"` |
/// | InsufficientScope | 403 | `Bearer realm, error="insufficient_scope"` |
/// | InternalError | 500 | none |
///
/// The three credential failures produce identical responses. Rejection
/// details never appear in a response.
#[derive(Debug, Clone)]
pub struct ResponseMapper {
    realm: String,
}

impl ResponseMapper {
    /// Creates a mapper announcing `realm`.
    ///
    /// Quotes, backslashes and non-printable or non-ASCII characters are
    /// stripped so the challenge stays a valid header value.
    pub fn new(realm: impl Into<String>) -> Self {
        let realm: String = realm
            .into()
            .chars()
            .filter(|c| (c.is_ascii_graphic() || *c == ' ') && *c != '"' && *c != '\\')
            .collect();
        Self { realm }
    }

    /// The realm.
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Maps `reason` to a response.
    pub fn map(&self, reason: RejectReason) -> SecurityResponse {
        let (status, challenge, body) = match reason {
            RejectReason::MissingCredential => (
                StatusCode::UNAUTHORIZED,
                Some(format!("Bearer realm=\"{}\"", self.realm)),
                "Unauthorized",
            ),
            RejectReason::MalformedCredential
            | RejectReason::InvalidCredential
            | RejectReason::ExpiredCredential => (
                StatusCode::UNAUTHORIZED,
                Some(format!(
                    "Bearer realm=\"{}\", error=\"invalid_token\"",
                    self.realm
                )),
                "Unauthorized",
            ),
            RejectReason::InsufficientScope => (
                StatusCode::FORBIDDEN,
                Some(format!(
                    "Bearer realm=\"{}\", error=\"insufficient_scope\"",
                    self.realm
                )),
                "Forbidden",
            ),
            RejectReason::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, None, "Internal Server Error")
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        if let Some(challenge) = challenge.and_then(|c| HeaderValue::from_str(&c).ok()) {
            headers.insert(WWW_AUTHENTICATE, challenge);
        }

        SecurityResponse {
            status,
            headers,
            body,
        }
    }
}

impl Default for ResponseMapper {
    fn default() -> Self {
        Self::new(DEFAULT_REALM)
    }
}
