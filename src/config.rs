//! Configuration loading.
//!
//! Configuration is JSON. Secrets can be kept out of the file and supplied
//! through the environment instead:
//!
//! - `STEAK_SECURITY_JWT_SECRET` sets `jwt.secret`
//! - `STEAK_SECURITY_INTERNAL_SECRET` sets `internal_secret`
//!
//! ```json
//! {
//!   "realm": "orders",
//!   "extractor": { "trust_gateway_headers": false },
//!   "jwt": { "algorithm": "HS256", "issuer": "https://auth.example" },
//!   "api_keys": [ { "key": "k-1", "subject": "reporting", "roles": ["reporter"] } ],
//!   "policies": [
//!     { "resource": "/admin/**", "roles": ["admin"] },
//!     { "resource": "/internal/**", "internal": true },
//!     { "resource": "/**" }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonwebtoken::Algorithm;
use serde::Deserialize;

use crate::credential::{CredentialExtractor, CredentialSource, ExtractorConfig};
use crate::error::ConfigError;
use crate::pipeline::SecurityPipeline;
use crate::policy::{PolicyConfig, PolicySet};
use crate::response::DEFAULT_REALM;
use crate::secret::Secret;
use crate::validator::{
    ApiKeyEntry, ApiKeyValidator, CredentialValidator, GatewayHeaderValidator,
    InternalSecretValidator, JwtSettings, JwtValidator, StaticKeyResolver, ValidatorSet,
};

/// Environment variable overriding `jwt.secret`.
pub const JWT_SECRET_ENV: &str = "STEAK_SECURITY_JWT_SECRET";
/// Environment variable overriding `internal_secret`.
pub const INTERNAL_SECRET_ENV: &str = "STEAK_SECURITY_INTERNAL_SECRET";

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// Realm announced in `WWW-Authenticate` challenges
    pub realm: String,
    /// Credential sources
    pub extractor: ExtractorConfig,
    /// Signed token validation; `None` disables bearer and cookie tokens
    pub jwt: Option<JwtConfig>,
    /// Registered API keys
    pub api_keys: Vec<ApiKeyEntry>,
    /// Shared secret for internal callers; `None` disables them
    pub internal_secret: Option<Secret<String>>,
    /// Access policies in declaration order
    pub policies: Vec<PolicyConfig>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            realm: DEFAULT_REALM.to_string(),
            extractor: ExtractorConfig::default(),
            jwt: None,
            api_keys: Vec::new(),
            internal_secret: None,
            policies: Vec::new(),
        }
    }
}

/// Token validation settings plus the verification key.
#[derive(Debug, Deserialize)]
pub struct JwtConfig {
    /// Algorithm, issuer, audience, leeway and key timeout
    #[serde(flatten)]
    pub settings: JwtSettings,
    /// HMAC secret for `HS*` algorithms
    #[serde(default)]
    pub secret: Option<Secret<String>>,
    /// Public key PEM for asymmetric algorithms
    #[serde(default)]
    pub public_key_pem: Option<String>,
    /// File holding the public key PEM
    #[serde(default)]
    pub public_key_file: Option<PathBuf>,
    /// Also accept tokens from the session cookie
    #[serde(default = "enabled")]
    pub session_cookie: bool,
}

fn enabled() -> bool {
    true
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            settings: JwtSettings::default(),
            secret: None,
            public_key_pem: None,
            public_key_file: None,
            session_cookie: true,
        }
    }
}

impl JwtConfig {
    /// Builds the key resolver the settings call for.
    ///
    /// # Errors
    ///
    /// Fails when the key for the configured algorithm is missing or does
    /// not parse.
    pub fn key_resolver(&self) -> Result<StaticKeyResolver, ConfigError> {
        match self.settings.algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = self
                    .secret
                    .as_ref()
                    .filter(|s| !s.is_empty())
                    .ok_or(ConfigError::MissingSecret("jwt.secret"))?;
                Ok(StaticKeyResolver::hmac(secret))
            }
            Algorithm::ES256 | Algorithm::ES384 => StaticKeyResolver::ec_pem(&self.public_key()?),
            Algorithm::EdDSA => StaticKeyResolver::ed_pem(&self.public_key()?),
            // RS* and PS*
            _ => StaticKeyResolver::rsa_pem(&self.public_key()?),
        }
    }

    fn public_key(&self) -> Result<Vec<u8>, ConfigError> {
        if let Some(pem) = &self.public_key_pem {
            return Ok(pem.as_bytes().to_vec());
        }
        match &self.public_key_file {
            Some(path) => Ok(std::fs::read(path)?),
            None => Err(ConfigError::MissingSecret("jwt.public_key_pem")),
        }
    }
}

impl SecurityConfig {
    /// Parses configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed JSON or unknown fields.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        tracing::debug!(path = %path.display(), "security configuration loaded");
        Ok(config)
    }

    /// Reads configuration from a file and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Same as [`from_file`](Self::from_file).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::from_file(path)?.with_env_overrides(|name| std::env::var(name).ok()))
    }

    /// Applies secret overrides looked up through `lookup`.
    ///
    /// A JWT secret override enables token validation with default settings
    /// if the file did not configure it.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(secret) = lookup(JWT_SECRET_ENV).filter(|s| !s.is_empty()) {
            tracing::debug!(variable = JWT_SECRET_ENV, "jwt secret taken from environment");
            self.jwt.get_or_insert_with(JwtConfig::default).secret = Some(Secret::new(secret));
        }
        if let Some(secret) = lookup(INTERNAL_SECRET_ENV).filter(|s| !s.is_empty()) {
            tracing::debug!(
                variable = INTERNAL_SECRET_ENV,
                "internal secret taken from environment"
            );
            self.internal_secret = Some(Secret::new(secret));
        }
        self
    }

    fn validators(&self) -> Result<ValidatorSet, ConfigError> {
        let mut validators = ValidatorSet::new();

        if let Some(jwt) = &self.jwt {
            let keys = jwt.key_resolver()?;
            let validator: Arc<dyn CredentialValidator> =
                Arc::new(JwtValidator::new(jwt.settings.clone(), Arc::new(keys)));
            validators =
                validators.with_shared(CredentialSource::Authorization, Arc::clone(&validator));
            if jwt.session_cookie {
                validators = validators.with_shared(CredentialSource::SessionCookie, validator);
            }
        }

        if let Some(secret) = &self.internal_secret {
            if secret.is_empty() {
                return Err(ConfigError::MissingSecret("internal_secret"));
            }
            let secret = Arc::new(Secret::new(secret.expose_secret().clone()));
            validators = validators.with(
                CredentialSource::InternalSecret,
                InternalSecretValidator::new(secret),
            );
        }

        if self.extractor.trust_gateway_headers {
            validators = validators.with(CredentialSource::Gateway, GatewayHeaderValidator::new());
        }

        Ok(validators)
    }

    // Sources without a validator are never extracted.
    fn extractor(&self) -> ExtractorConfig {
        let mut extractor = self.extractor.clone();
        let jwt_cookie = self.jwt.as_ref().is_some_and(|jwt| jwt.session_cookie);
        if self.jwt.is_none() {
            extractor.authorization_header = false;
        }
        if !jwt_cookie {
            extractor.session_cookie = None;
        }
        if self.api_keys.is_empty() {
            extractor.api_key_header = None;
        }
        if self.internal_secret.is_none() {
            extractor.internal_secret_header = None;
        }
        extractor
    }
}

impl SecurityPipeline {
    /// Composes a pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Fails on missing or unparsable keys, empty secrets and invalid policies.
    pub fn from_config(config: SecurityConfig) -> Result<Self, ConfigError> {
        let mut validators = config.validators()?;
        let extractor = config.extractor();

        if config.api_keys.iter().any(|entry| entry.key.is_empty()) {
            return Err(ConfigError::Invalid("api key entries must not be empty".to_string()));
        }
        let api_key_count = config.api_keys.len();
        if api_key_count > 0 {
            validators = validators.with(
                CredentialSource::ApiKey,
                ApiKeyValidator::new(config.api_keys),
            );
        }

        let policies = PolicySet::from_configs(config.policies)?;
        tracing::info!(
            policies = policies.len(),
            api_keys = api_key_count,
            jwt = config.jwt.is_some(),
            gateway = config.extractor.trust_gateway_headers,
            "security pipeline configured"
        );

        Ok(SecurityPipeline::builder()
            .extractor(CredentialExtractor::new(extractor))
            .validators(validators)
            .policies(policies)
            .realm(config.realm)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = SecurityConfig::from_json_str("{}").unwrap();
        assert_eq!(config.realm, DEFAULT_REALM);
        assert!(config.jwt.is_none());
        assert!(config.policies.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            SecurityConfig::from_json_str(r#"{"relam": "typo"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn jwt_settings_are_flattened() {
        let config = SecurityConfig::from_json_str(
            r#"{"jwt": {"algorithm": "HS512", "secret": "s", "leeway_secs": 5, "session_cookie": false}}"#,
        )
        .unwrap();
        let jwt = config.jwt.unwrap();
        assert_eq!(jwt.settings.algorithm, Algorithm::HS512);
        assert_eq!(jwt.settings.leeway_secs, 5);
        assert!(!jwt.session_cookie);
        assert_eq!(format!("{:?}", jwt.secret), "Some([REDACTED])");
    }

    #[test]
    fn hmac_without_secret_is_an_error() {
        let jwt = JwtConfig::default();
        assert!(matches!(
            jwt.key_resolver(),
            Err(ConfigError::MissingSecret("jwt.secret"))
        ));
    }

    #[test]
    fn rsa_without_key_is_an_error() {
        let jwt = JwtConfig {
            settings: JwtSettings::new(Algorithm::RS256),
            ..JwtConfig::default()
        };
        assert!(matches!(
            jwt.key_resolver(),
            Err(ConfigError::MissingSecret("jwt.public_key_pem"))
        ));
    }

    #[test]
    fn env_overrides_fill_in_secrets() {
        let config = SecurityConfig::default().with_env_overrides(|name| match name {
            JWT_SECRET_ENV => Some("from-env".to_string()),
            INTERNAL_SECRET_ENV => Some("internal-from-env".to_string()),
            _ => None,
        });

        let jwt = config.jwt.as_ref().unwrap();
        assert_eq!(jwt.secret.as_ref().unwrap().expose_secret(), "from-env");
        assert_eq!(jwt.settings.algorithm, Algorithm::HS256);
        assert_eq!(
            config.internal_secret.as_ref().unwrap().expose_secret(),
            "internal-from-env"
        );
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let config = SecurityConfig::default().with_env_overrides(|_| Some(String::new()));
        assert!(config.jwt.is_none());
        assert!(config.internal_secret.is_none());
    }

    #[test]
    fn pipeline_from_config_rejects_bad_policies() {
        let config =
            SecurityConfig::from_json_str(r#"{"policies": [{"resource": "admin"}]}"#).unwrap();
        assert!(matches!(
            SecurityPipeline::from_config(config),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn extractor_skips_sources_without_validators() {
        let config = SecurityConfig::from_json_str(
            r#"{"api_keys": [{"key": "k", "subject": "s"}], "jwt": {"secret": "s", "session_cookie": false}}"#,
        )
        .unwrap();
        let extractor = config.extractor();
        assert!(extractor.authorization_header);
        assert_eq!(extractor.api_key_header.as_deref(), Some("X-Api-Key"));
        assert!(extractor.session_cookie.is_none());
        assert!(extractor.internal_secret_header.is_none());

        let bare = SecurityConfig::default().extractor();
        assert!(!bare.authorization_header);
        assert!(bare.api_key_header.is_none());
        assert!(bare.session_cookie.is_none());
    }

    #[test]
    fn pipeline_from_config_rejects_empty_internal_secret() {
        let config = SecurityConfig::from_json_str(r#"{"internal_secret": ""}"#).unwrap();
        assert!(matches!(
            SecurityPipeline::from_config(config),
            Err(ConfigError::MissingSecret("internal_secret"))
        ));
    }
}
