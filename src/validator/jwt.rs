//! Signed token (JWT) validation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::keys::{KeyError, KeyResolver};
use super::CredentialValidator;
use crate::credential::{Credential, CredentialSource};
use crate::error::Rejection;
use crate::principal::Identity;
use crate::scope::Authorities;

/// Settings for [`JwtValidator`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    /// The only algorithm accepted; the token header cannot change it
    pub algorithm: Algorithm,
    /// Required `iss` claim, if any
    pub issuer: Option<String>,
    /// Required `aud` claim, if any
    pub audience: Option<String>,
    /// Clock skew tolerance for `exp` and `nbf`, in seconds
    pub leeway_secs: u64,
    /// Upper bound on key resolution, in milliseconds
    pub key_timeout_ms: u64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::HS256,
            issuer: None,
            audience: None,
            leeway_secs: 30,
            key_timeout_ms: 2_000,
        }
    }
}

impl JwtSettings {
    /// Settings pinned to `algorithm` with everything else defaulted.
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    /// Requires the given issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Requires the given audience.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Sets the clock skew tolerance.
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Sets the key resolution timeout.
    pub fn with_key_timeout(mut self, timeout: Duration) -> Self {
        self.key_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The key resolution timeout.
    pub fn key_timeout(&self) -> Duration {
        Duration::from_millis(self.key_timeout_ms)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = self.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        let mut required = vec!["exp", "sub"];
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        match &self.audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        // A pinned issuer or audience must be present in the token.
        validation.set_required_spec_claims(&required);
        validation
    }
}

/// Claims read from a token.
///
/// Besides the registered claims, tokens may carry `roles`, `authorities`
/// (`action.resource.scope` entries), `tenant_id` and `device_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject
    pub sub: String,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
    /// Issued at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Not before
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Tenant identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Device identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Granted roles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Granted authorities as `action.resource.scope`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorities: Vec<String>,
}

impl TokenClaims {
    /// Claims for `subject` expiring at `exp`, with nothing granted.
    pub fn new(subject: impl Into<String>, exp: i64) -> Self {
        Self {
            sub: subject.into(),
            exp,
            iat: None,
            nbf: None,
            iss: None,
            aud: None,
            tenant_id: None,
            device_id: None,
            roles: Vec::new(),
            authorities: Vec::new(),
        }
    }

    fn into_identity(self) -> Result<Identity, Rejection> {
        let expires_at = OffsetDateTime::from_unix_timestamp(self.exp)
            .map_err(|_| Rejection::malformed("exp claim out of range"))?;
        let authorities = Authorities::parse_all(&self.authorities)?;

        let mut identity = Identity::new(self.sub)
            .with_authorities(authorities)
            .expiring_at(expires_at);
        identity.tenant_id = self.tenant_id;
        identity.device_id = self.device_id;
        identity.roles = self.roles.into_iter().collect();
        Ok(identity)
    }
}

/// Extracts the token from a `Bearer` authorization value.
///
/// The scheme is matched case-insensitively.
///
/// # Errors
///
/// Returns `MalformedCredential` for any other scheme or an empty token.
pub fn bearer_token(value: &str) -> Result<&str, Rejection> {
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| Rejection::malformed("authorization value has no scheme"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(Rejection::malformed(format!(
            "unsupported authorization scheme '{}'",
            scheme
        )));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(Rejection::malformed("empty bearer token"));
    }
    Ok(token)
}

/// Validates signed tokens from the `Authorization` header or a session cookie.
///
/// The expected algorithm is fixed by [`JwtSettings`]; a token announcing any
/// other algorithm is rejected before a key is even looked up.
pub struct JwtValidator {
    settings: JwtSettings,
    validation: Validation,
    keys: Arc<dyn KeyResolver>,
}

impl JwtValidator {
    /// Creates a validator using `keys` for signature verification.
    pub fn new(settings: JwtSettings, keys: Arc<dyn KeyResolver>) -> Self {
        let validation = settings.validation();
        Self {
            settings,
            validation,
            keys,
        }
    }

    /// The active settings.
    pub fn settings(&self) -> &JwtSettings {
        &self.settings
    }

    fn token<'a>(&self, credential: &'a Credential) -> Result<&'a str, Rejection> {
        let value = credential
            .secret_value()
            .ok_or_else(|| Rejection::malformed("credential carries no token"))?
            .expose_secret();
        match credential.source() {
            CredentialSource::Authorization => bearer_token(value),
            CredentialSource::SessionCookie => Ok(value.trim()),
            other => Err(Rejection::malformed(format!(
                "{} credentials are not tokens",
                other
            ))),
        }
    }

    /// Verifies `token` and returns its claims.
    ///
    /// # Errors
    ///
    /// `MalformedCredential` when the token cannot be decoded,
    /// `ExpiredCredential` past `exp`, `InternalError` when the key source
    /// fails, and `InvalidCredential` for everything else (bad signature,
    /// wrong algorithm, unknown key, key lookup timeout, issuer or audience
    /// mismatch).
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, Rejection> {
        let header = decode_header(token)
            .map_err(|e| Rejection::malformed(format!("undecodable token header: {}", e)))?;

        if header.alg != self.settings.algorithm {
            return Err(Rejection::invalid(format!(
                "token algorithm {:?} does not match pinned {:?}",
                header.alg, self.settings.algorithm
            )));
        }

        let lookup = self.keys.resolve(header.kid.as_deref());
        let key = match tokio::time::timeout(self.settings.key_timeout(), lookup).await {
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.settings.key_timeout_ms,
                    "verification key lookup timed out"
                );
                return Err(Rejection::invalid("verification key lookup timed out"));
            }
            Ok(Err(KeyError::NotFound(kid))) => {
                return Err(Rejection::invalid(format!(
                    "no verification key for kid {:?}",
                    kid
                )))
            }
            Ok(Err(KeyError::Unavailable(message))) => {
                return Err(Rejection::internal(format!(
                    "key source unavailable: {}",
                    message
                )))
            }
            Ok(Ok(key)) => key,
        };

        decode::<TokenClaims>(token, &key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| map_jwt_error(&e))
    }
}

fn map_jwt_error(err: &jsonwebtoken::errors::Error) -> Rejection {
    match err.kind() {
        ErrorKind::ExpiredSignature => Rejection::expired("token has expired"),
        ErrorKind::InvalidToken
        | ErrorKind::MissingAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingRequiredClaim(_) => {
            Rejection::malformed(format!("token is malformed: {}", err))
        }
        _ => Rejection::invalid(format!("token rejected: {}", err)),
    }
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialValidator for JwtValidator {
    async fn validate(&self, credential: &Credential) -> Result<Identity, Rejection> {
        let token = self.token(credential)?;
        let claims = self.verify(token).await?;
        claims.into_identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectReason;
    use crate::scope::{Permission, Scope};
    use crate::secret::Secret;
    use crate::validator::keys::StaticKeyResolver;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "a-test-secret-that-is-long-enough-for-hs256";

    fn now() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }

    fn validator(settings: JwtSettings) -> JwtValidator {
        JwtValidator::new(
            settings,
            Arc::new(StaticKeyResolver::hmac(&Secret::from(SECRET))),
        )
    }

    fn sign(claims: &TokenClaims, alg: Algorithm, secret: &str) -> String {
        encode(
            &Header::new(alg),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn bearer(token: &str) -> Credential {
        Credential::secret(
            CredentialSource::Authorization,
            "authorization",
            format!("Bearer {}", token),
        )
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc").unwrap(), "abc");
        assert_eq!(bearer_token("bearer   abc ").unwrap(), "abc");
        assert_eq!(
            bearer_token("Basic dXNlcjpwYXNz").unwrap_err().reason,
            RejectReason::MalformedCredential
        );
        assert_eq!(
            bearer_token("Bearer").unwrap_err().reason,
            RejectReason::MalformedCredential
        );
    }

    #[tokio::test]
    async fn valid_token_yields_identity() {
        let mut claims = TokenClaims::new("user-7", now() + 600);
        claims.tenant_id = Some("acme".to_string());
        claims.roles = vec!["admin".to_string()];
        claims.authorities = vec!["create.user.tenant".to_string()];
        let token = sign(&claims, Algorithm::HS256, SECRET);

        let identity = validator(JwtSettings::default())
            .validate(&bearer(&token))
            .await
            .unwrap();

        assert_eq!(identity.subject, "user-7");
        assert_eq!(identity.tenant_id.as_deref(), Some("acme"));
        assert!(identity.roles.contains("admin"));
        assert!(identity
            .authorities
            .allows(&Permission::new("create", "user"), Scope::Tenant));
        assert!(identity.expires_at.is_some());
    }

    #[tokio::test]
    async fn wrong_secret_is_invalid() {
        let token = sign(
            &TokenClaims::new("user-7", now() + 600),
            Algorithm::HS256,
            "some-other-secret-that-is-also-long-enough",
        );

        let err = validator(JwtSettings::default())
            .validate(&bearer(&token))
            .await
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::InvalidCredential);
    }

    #[tokio::test]
    async fn expired_token_is_expired() {
        let token = sign(
            &TokenClaims::new("user-7", now() - 3_600),
            Algorithm::HS256,
            SECRET,
        );

        let err = validator(JwtSettings::default().with_leeway(0))
            .validate(&bearer(&token))
            .await
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::ExpiredCredential);
    }

    #[tokio::test]
    async fn algorithm_other_than_pinned_is_rejected() {
        let token = sign(
            &TokenClaims::new("user-7", now() + 600),
            Algorithm::HS384,
            SECRET,
        );

        let err = validator(JwtSettings::new(Algorithm::HS256))
            .validate(&bearer(&token))
            .await
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::InvalidCredential);
    }

    #[tokio::test]
    async fn unsigned_token_is_rejected() {
        // {"alg":"none","typ":"JWT"} . {"sub":"root","exp":9999999999} . <empty>
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.\
                     eyJzdWIiOiJyb290IiwiZXhwIjo5OTk5OTk5OTk5fQ.";

        let err = validator(JwtSettings::default())
            .validate(&bearer(token))
            .await
            .unwrap_err();
        assert!(err.reason.is_authentication_failure());
        assert_ne!(err.reason, RejectReason::MissingCredential);
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let err = validator(JwtSettings::default())
            .validate(&bearer("not-a-jwt"))
            .await
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::MalformedCredential);
    }

    #[tokio::test]
    async fn issuer_is_enforced() {
        let mut claims = TokenClaims::new("user-7", now() + 600);
        claims.iss = Some("https://evil.example".to_string());
        let token = sign(&claims, Algorithm::HS256, SECRET);

        let err = validator(JwtSettings::default().with_issuer("https://auth.example"))
            .validate(&bearer(&token))
            .await
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::InvalidCredential);
    }

    #[tokio::test]
    async fn audience_is_enforced_when_configured() {
        let mut claims = TokenClaims::new("user-7", now() + 600);
        claims.aud = Some("billing".to_string());
        let token = sign(&claims, Algorithm::HS256, SECRET);

        let accepted = validator(JwtSettings::default().with_audience("billing"))
            .validate(&bearer(&token))
            .await;
        assert!(accepted.is_ok());

        let err = validator(JwtSettings::default().with_audience("orders"))
            .validate(&bearer(&token))
            .await
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::InvalidCredential);
    }

    #[tokio::test]
    async fn missing_pinned_issuer_or_audience_is_rejected() {
        let token = sign(
            &TokenClaims::new("mallory", now() + 600),
            Algorithm::HS256,
            SECRET,
        );

        let err = validator(JwtSettings::default().with_issuer("https://auth.example"))
            .validate(&bearer(&token))
            .await
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::MalformedCredential);

        let err = validator(JwtSettings::default().with_audience("billing"))
            .validate(&bearer(&token))
            .await
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::MalformedCredential);

        let mut claims = TokenClaims::new("mallory", now() + 600);
        claims.iss = Some("https://auth.example".to_string());
        let token = sign(&claims, Algorithm::HS256, SECRET);
        let err = validator(
            JwtSettings::default()
                .with_issuer("https://auth.example")
                .with_audience("billing"),
        )
        .validate(&bearer(&token))
        .await
        .unwrap_err();
        assert!(err.reason.is_authentication_failure());
    }

    #[tokio::test]
    async fn session_cookie_tokens_are_accepted() {
        let token = sign(
            &TokenClaims::new("user-7", now() + 600),
            Algorithm::HS256,
            SECRET,
        );
        let credential = Credential::secret(CredentialSource::SessionCookie, "SESSION", token);

        let identity = validator(JwtSettings::default())
            .validate(&credential)
            .await
            .unwrap();
        assert_eq!(identity.subject, "user-7");
    }

    #[tokio::test]
    async fn malformed_authority_claim_is_malformed() {
        let mut claims = TokenClaims::new("user-7", now() + 600);
        claims.authorities = vec!["nonsense".to_string()];
        let token = sign(&claims, Algorithm::HS256, SECRET);

        let err = validator(JwtSettings::default())
            .validate(&bearer(&token))
            .await
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::MalformedCredential);
    }

    struct Stalled;

    #[async_trait]
    impl KeyResolver for Stalled {
        async fn resolve(
            &self,
            _kid: Option<&str>,
        ) -> Result<jsonwebtoken::DecodingKey, KeyError> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Err(KeyError::Unavailable("never".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn key_lookup_timeout_is_invalid() {
        let token = sign(
            &TokenClaims::new("user-7", now() + 600),
            Algorithm::HS256,
            SECRET,
        );
        let validator = JwtValidator::new(
            JwtSettings::default().with_key_timeout(Duration::from_millis(50)),
            Arc::new(Stalled),
        );

        let err = validator.validate(&bearer(&token)).await.unwrap_err();
        assert_eq!(err.reason, RejectReason::InvalidCredential);
    }

    struct Broken;

    #[async_trait]
    impl KeyResolver for Broken {
        async fn resolve(
            &self,
            _kid: Option<&str>,
        ) -> Result<jsonwebtoken::DecodingKey, KeyError> {
            Err(KeyError::Unavailable("jwks endpoint returned 500".to_string()))
        }
    }

    #[tokio::test]
    async fn key_source_fault_is_internal() {
        let token = sign(
            &TokenClaims::new("user-7", now() + 600),
            Algorithm::HS256,
            SECRET,
        );
        let validator = JwtValidator::new(JwtSettings::default(), Arc::new(Broken));

        let err = validator.validate(&bearer(&token)).await.unwrap_err();
        assert_eq!(err.reason, RejectReason::InternalError);
    }
}
