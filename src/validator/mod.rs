//! Credential validation.
//!
//! A validator turns a [`Credential`] into an [`Identity`] or a
//! [`Rejection`] with one of `MalformedCredential`, `InvalidCredential` or
//! `ExpiredCredential` (`InternalError` for faults in key sources).
//! Validators are deterministic; the only side effect allowed is caching.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::credential::{Credential, CredentialSource};
use crate::error::Rejection;
use crate::principal::Identity;

mod api_key;
mod gateway;
mod internal;
mod jwt;
mod keys;

pub use api_key::{ApiKeyEntry, ApiKeyValidator};
pub use gateway::GatewayHeaderValidator;
pub use internal::{InternalSecretValidator, INTERNAL_SUBJECT};
pub use jwt::{bearer_token, JwtSettings, JwtValidator, TokenClaims};
pub use keys::{CachedKeyResolver, KeyError, KeyResolver, StaticKeyResolver};

/// Verifies a credential and produces the identity it proves.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Validates `credential`.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] describing why the credential is not acceptable.
    async fn validate(&self, credential: &Credential) -> Result<Identity, Rejection>;
}

#[async_trait]
impl<V: CredentialValidator + ?Sized> CredentialValidator for Arc<V> {
    async fn validate(&self, credential: &Credential) -> Result<Identity, Rejection> {
        (**self).validate(credential).await
    }
}

/// Routes each credential to the validator registered for its source.
///
/// A credential from a source with no registered validator is rejected as
/// `InvalidCredential`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use steak_security::{CredentialSource, InternalSecretValidator, Secret, ValidatorSet};
///
/// let validators = ValidatorSet::new().with(
///     CredentialSource::InternalSecret,
///     InternalSecretValidator::new(Arc::new(Secret::from("shared"))),
/// );
/// assert!(validators.handles(CredentialSource::InternalSecret));
/// assert!(!validators.handles(CredentialSource::ApiKey));
/// ```
#[derive(Clone, Default)]
pub struct ValidatorSet {
    routes: BTreeMap<CredentialSource, Arc<dyn CredentialValidator>>,
}

impl ValidatorSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `validator` for credentials from `source`, replacing any previous one.
    pub fn with(
        mut self,
        source: CredentialSource,
        validator: impl CredentialValidator + 'static,
    ) -> Self {
        self.routes.insert(source, Arc::new(validator));
        self
    }

    /// Registers a shared validator for `source`.
    pub fn with_shared(
        mut self,
        source: CredentialSource,
        validator: Arc<dyn CredentialValidator>,
    ) -> Self {
        self.routes.insert(source, validator);
        self
    }

    /// Returns `true` if a validator is registered for `source`.
    pub fn handles(&self, source: CredentialSource) -> bool {
        self.routes.contains_key(&source)
    }
}

impl std::fmt::Debug for ValidatorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorSet")
            .field("sources", &self.routes.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl CredentialValidator for ValidatorSet {
    async fn validate(&self, credential: &Credential) -> Result<Identity, Rejection> {
        match self.routes.get(&credential.source()) {
            Some(validator) => validator.validate(credential).await,
            None => Err(Rejection::invalid(format!(
                "no validator registered for {} credentials",
                credential.source()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectReason;
    use crate::secret::Secret;

    struct Fixed(&'static str);

    #[async_trait]
    impl CredentialValidator for Fixed {
        async fn validate(&self, _credential: &Credential) -> Result<Identity, Rejection> {
            Ok(Identity::new(self.0))
        }
    }

    #[tokio::test]
    async fn routes_by_source() {
        let set = ValidatorSet::new()
            .with(CredentialSource::ApiKey, Fixed("from-api-key"))
            .with(CredentialSource::SessionCookie, Fixed("from-cookie"));

        let credential = Credential::secret(CredentialSource::SessionCookie, "SESSION", "t");
        let identity = set.validate(&credential).await.unwrap();
        assert_eq!(identity.subject, "from-cookie");
    }

    #[tokio::test]
    async fn unregistered_source_is_invalid() {
        let set = ValidatorSet::new().with(CredentialSource::ApiKey, Fixed("x"));
        let credential = Credential::secret(
            CredentialSource::InternalSecret,
            "X-Internal-Secret",
            Secret::from("s"),
        );

        let err = set.validate(&credential).await.unwrap_err();
        assert_eq!(err.reason, RejectReason::InvalidCredential);
    }
}
