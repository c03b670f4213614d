//! Credential extraction from request headers and cookies.
//!
//! Extraction never fails: a request without a recognized credential simply
//! yields `None`, and the pipeline turns that into `MissingCredential`.
//! Whether a credential is well formed is the validator's call.
//!
//! # Precedence
//!
//! When several sources are present the first one in this list wins:
//!
//! 1. `Authorization` header
//! 2. API key header (`X-Api-Key` by default)
//! 3. Internal secret header (`X-Internal-Secret` by default)
//! 4. Trusted gateway headers (`X-Authenticated: true`), only when enabled
//! 5. Session cookie (`SESSION` by default)

use std::fmt;

use http::header::AUTHORIZATION;
use serde::Deserialize;

use crate::request::RequestParts;
use crate::secret::Secret;

/// Gateway header carrying the authentication flag.
pub const GATEWAY_AUTHENTICATED_HEADER: &str = "x-authenticated";
/// Gateway header carrying the user id.
pub const GATEWAY_USER_ID_HEADER: &str = "x-userid";
/// Gateway header carrying the tenant id.
pub const GATEWAY_TENANT_ID_HEADER: &str = "x-tenantid";
/// Gateway header carrying the device id.
pub const GATEWAY_DEVICE_ID_HEADER: &str = "x-deviceid";
/// Gateway header carrying comma separated `action.resource.scope` entries.
pub const GATEWAY_AUTHORITIES_HEADER: &str = "x-authorities";

/// Where a credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CredentialSource {
    /// The `Authorization` header
    Authorization,
    /// A dedicated API key header
    ApiKey,
    /// The internal service-to-service secret header
    InternalSecret,
    /// Identity headers set by a trusted upstream gateway
    Gateway,
    /// A session cookie holding a token
    SessionCookie,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialSource::Authorization => "authorization",
            CredentialSource::ApiKey => "api_key",
            CredentialSource::InternalSecret => "internal_secret",
            CredentialSource::Gateway => "gateway",
            CredentialSource::SessionCookie => "session_cookie",
        };
        f.write_str(name)
    }
}

/// Identity headers asserted by an upstream gateway, still unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayAssertion {
    /// Raw `X-UserId` value
    pub user_id: Option<String>,
    /// Raw `X-TenantId` value
    pub tenant_id: Option<String>,
    /// Raw `X-DeviceId` value
    pub device_id: Option<String>,
    /// Raw `X-Authorities` value
    pub authorities: Option<String>,
}

#[derive(Debug)]
enum Material {
    Secret(Secret<String>),
    Asserted(GatewayAssertion),
}

/// A candidate credential taken from a request.
///
/// Immutable once extracted. Secret material is redacted in `Debug`.
#[derive(Debug)]
pub struct Credential {
    source: CredentialSource,
    origin: String,
    material: Material,
}

impl Credential {
    /// Creates a credential carrying secret material (token, key, shared secret).
    pub fn secret(
        source: CredentialSource,
        origin: impl Into<String>,
        value: impl Into<Secret<String>>,
    ) -> Self {
        Self {
            source,
            origin: origin.into(),
            material: Material::Secret(value.into()),
        }
    }

    /// Creates a credential from gateway identity headers.
    pub fn gateway(assertion: GatewayAssertion) -> Self {
        Self {
            source: CredentialSource::Gateway,
            origin: GATEWAY_AUTHENTICATED_HEADER.to_string(),
            material: Material::Asserted(assertion),
        }
    }

    /// Where the credential came from.
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Name of the header or cookie the credential was read from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The secret material, for token, key and shared-secret credentials.
    pub fn secret_value(&self) -> Option<&Secret<String>> {
        match &self.material {
            Material::Secret(secret) => Some(secret),
            Material::Asserted(_) => None,
        }
    }

    /// The asserted identity, for gateway credentials.
    pub fn assertion(&self) -> Option<&GatewayAssertion> {
        match &self.material {
            Material::Asserted(assertion) => Some(assertion),
            Material::Secret(_) => None,
        }
    }
}

/// Extracts a candidate credential from a request.
///
/// Implementations must be side-effect free and deterministic.
pub trait ExtractCredential: Send + Sync {
    /// Returns the highest-precedence credential present, or `None`.
    fn extract(&self, request: &RequestParts) -> Option<Credential>;
}

/// Which credential sources the extractor consults and under which names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    /// Read the `Authorization` header; `false` disables bearer tokens
    pub authorization_header: bool,
    /// API key header name; `None` disables API keys
    pub api_key_header: Option<String>,
    /// Internal secret header name; `None` disables internal callers
    pub internal_secret_header: Option<String>,
    /// Honour `X-Authenticated` and friends from an upstream gateway
    pub trust_gateway_headers: bool,
    /// Session cookie name; `None` disables cookie tokens
    pub session_cookie: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            authorization_header: true,
            api_key_header: Some("X-Api-Key".to_string()),
            internal_secret_header: Some("X-Internal-Secret".to_string()),
            trust_gateway_headers: false,
            session_cookie: Some("SESSION".to_string()),
        }
    }
}

/// The standard header/cookie credential extractor.
///
/// # Examples
///
/// ```
/// use http::Method;
/// use steak_security::{CredentialExtractor, CredentialSource, ExtractCredential, RequestParts};
///
/// let extractor = CredentialExtractor::default();
/// let request = RequestParts::new(Method::GET, "/me")
///     .with_header("Authorization", "Bearer token-1")
///     .with_cookie("SESSION", "token-2");
///
/// let credential = extractor.extract(&request).expect("credential present");
/// assert_eq!(credential.source(), CredentialSource::Authorization);
///
/// let anonymous = RequestParts::new(Method::GET, "/me");
/// assert!(extractor.extract(&anonymous).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CredentialExtractor {
    config: ExtractorConfig,
}

impl CredentialExtractor {
    /// Creates an extractor with the given configuration.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn from_header(
        request: &RequestParts,
        name: &str,
        source: CredentialSource,
    ) -> Option<Credential> {
        let value = request.header(name)?.trim();
        if value.is_empty() {
            return None;
        }
        Some(Credential::secret(source, name, value))
    }

    fn from_gateway(request: &RequestParts) -> Option<Credential> {
        let flag = request.header(GATEWAY_AUTHENTICATED_HEADER)?;
        if !flag.trim().eq_ignore_ascii_case("true") {
            return None;
        }
        let owned = |name: &str| {
            request
                .header(name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Some(Credential::gateway(GatewayAssertion {
            user_id: owned(GATEWAY_USER_ID_HEADER),
            tenant_id: owned(GATEWAY_TENANT_ID_HEADER),
            device_id: owned(GATEWAY_DEVICE_ID_HEADER),
            authorities: owned(GATEWAY_AUTHORITIES_HEADER),
        }))
    }

    fn from_cookie(request: &RequestParts, name: &str) -> Option<Credential> {
        let value = request.cookie(name)?;
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(Credential::secret(
            CredentialSource::SessionCookie,
            name,
            value,
        ))
    }
}

impl ExtractCredential for CredentialExtractor {
    fn extract(&self, request: &RequestParts) -> Option<Credential> {
        let config = &self.config;

        let authorization = config.authorization_header.then(|| {
            Self::from_header(
                request,
                AUTHORIZATION.as_str(),
                CredentialSource::Authorization,
            )
        });

        authorization
            .flatten()
            .or_else(|| {
                config
                    .api_key_header
                    .as_deref()
                    .and_then(|name| Self::from_header(request, name, CredentialSource::ApiKey))
            })
            .or_else(|| {
                config.internal_secret_header.as_deref().and_then(|name| {
                    Self::from_header(request, name, CredentialSource::InternalSecret)
                })
            })
            .or_else(|| {
                if config.trust_gateway_headers {
                    Self::from_gateway(request)
                } else {
                    None
                }
            })
            .or_else(|| {
                config
                    .session_cookie
                    .as_deref()
                    .and_then(|name| Self::from_cookie(request, name))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn request() -> RequestParts {
        RequestParts::new(Method::GET, "/resource")
    }

    #[test]
    fn absent_when_no_source_present() {
        let extractor = CredentialExtractor::default();
        let req = request().with_header("Accept", "application/json");
        assert!(extractor.extract(&req).is_none());
    }

    #[test]
    fn authorization_header_wins_over_everything() {
        let extractor = CredentialExtractor::default();
        let req = request()
            .with_header("X-Api-Key", "key")
            .with_header("X-Internal-Secret", "s3cret")
            .with_cookie("SESSION", "cookie-token")
            .with_header("Authorization", "Bearer header-token");

        let credential = extractor.extract(&req).unwrap();
        assert_eq!(credential.source(), CredentialSource::Authorization);
        assert_eq!(
            credential.secret_value().unwrap().expose_secret(),
            "Bearer header-token"
        );
    }

    #[test]
    fn api_key_precedes_internal_secret_and_cookie() {
        let extractor = CredentialExtractor::default();
        let req = request()
            .with_cookie("SESSION", "cookie-token")
            .with_header("X-Internal-Secret", "s3cret")
            .with_header("X-Api-Key", "key");

        assert_eq!(
            extractor.extract(&req).unwrap().source(),
            CredentialSource::ApiKey
        );
    }

    #[test]
    fn cookie_used_when_alone() {
        let extractor = CredentialExtractor::default();
        let req = request().with_cookie("SESSION", "cookie-token");

        let credential = extractor.extract(&req).unwrap();
        assert_eq!(credential.source(), CredentialSource::SessionCookie);
        assert_eq!(credential.origin(), "SESSION");
    }

    #[test]
    fn empty_values_count_as_absent() {
        let extractor = CredentialExtractor::default();
        let req = request()
            .with_header("Authorization", "   ")
            .with_cookie("SESSION", "");
        assert!(extractor.extract(&req).is_none());
    }

    #[test]
    fn disabled_sources_are_ignored() {
        let extractor = CredentialExtractor::new(ExtractorConfig {
            authorization_header: false,
            api_key_header: None,
            internal_secret_header: None,
            trust_gateway_headers: false,
            session_cookie: None,
        });
        let req = request()
            .with_header("Authorization", "Basic YTpi")
            .with_header("X-Api-Key", "key")
            .with_cookie("SESSION", "token");
        assert!(extractor.extract(&req).is_none());
    }

    #[test]
    fn gateway_headers_need_opt_in() {
        let req = request()
            .with_header("X-Authenticated", "true")
            .with_header("X-UserId", "42");

        assert!(CredentialExtractor::default().extract(&req).is_none());

        let extractor = CredentialExtractor::new(ExtractorConfig {
            trust_gateway_headers: true,
            ..ExtractorConfig::default()
        });
        let credential = extractor.extract(&req).unwrap();
        assert_eq!(credential.source(), CredentialSource::Gateway);
        assert_eq!(
            credential.assertion().unwrap().user_id.as_deref(),
            Some("42")
        );
    }

    #[test]
    fn gateway_false_flag_is_absent() {
        let extractor = CredentialExtractor::new(ExtractorConfig {
            trust_gateway_headers: true,
            ..ExtractorConfig::default()
        });
        let req = request()
            .with_header("X-Authenticated", "false")
            .with_header("X-UserId", "42");
        assert!(extractor.extract(&req).is_none());
    }

    #[test]
    fn debug_output_redacts_material() {
        let credential = Credential::secret(CredentialSource::ApiKey, "X-Api-Key", "sk-live-1");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("sk-live-1"));
        assert!(debug.contains("REDACTED"));
    }
}
