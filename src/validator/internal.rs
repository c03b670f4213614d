use std::sync::Arc;

use async_trait::async_trait;

use super::CredentialValidator;
use crate::credential::Credential;
use crate::error::Rejection;
use crate::principal::Identity;
use crate::secret::Secret;

/// Subject assigned to callers holding the internal shared secret.
pub const INTERNAL_SUBJECT: &str = "internal";

/// Validates the shared secret trusted service callers present.
///
/// A match yields an internal identity with no roles or authorities; it is
/// admitted only where a policy asks for an internal caller.
#[derive(Debug, Clone)]
pub struct InternalSecretValidator {
    secret: Arc<Secret<String>>,
}

impl InternalSecretValidator {
    /// Creates a validator for `secret`.
    pub fn new(secret: Arc<Secret<String>>) -> Self {
        Self { secret }
    }
}

#[async_trait]
impl CredentialValidator for InternalSecretValidator {
    async fn validate(&self, credential: &Credential) -> Result<Identity, Rejection> {
        let presented = credential
            .secret_value()
            .ok_or_else(|| Rejection::malformed("internal credential carries no value"))?;
        if presented.is_empty() {
            return Err(Rejection::malformed("empty internal secret"));
        }
        if self.secret.is_empty() || !self.secret.matches(presented.expose_secret().as_bytes()) {
            return Err(Rejection::invalid("internal secret mismatch"));
        }
        Ok(Identity::new(INTERNAL_SUBJECT).internal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialSource;
    use crate::error::RejectReason;

    fn presented(value: &str) -> Credential {
        Credential::secret(CredentialSource::InternalSecret, "X-Internal-Secret", value)
    }

    #[tokio::test]
    async fn matching_secret_is_internal() {
        let validator = InternalSecretValidator::new(Arc::new(Secret::from("s3cr3t")));
        let identity = validator.validate(&presented("s3cr3t")).await.unwrap();

        assert_eq!(identity.subject, INTERNAL_SUBJECT);
        assert!(identity.internal);
        assert!(identity.authorities.is_empty());
    }

    #[tokio::test]
    async fn wrong_secret_is_invalid() {
        let validator = InternalSecretValidator::new(Arc::new(Secret::from("s3cr3t")));
        let err = validator.validate(&presented("guess")).await.unwrap_err();
        assert_eq!(err.reason, RejectReason::InvalidCredential);
    }

    #[tokio::test]
    async fn unconfigured_secret_accepts_nothing() {
        let validator = InternalSecretValidator::new(Arc::new(Secret::from("")));
        let err = validator.validate(&presented("anything")).await.unwrap_err();
        assert_eq!(err.reason, RejectReason::InvalidCredential);
    }
}
