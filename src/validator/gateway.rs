use async_trait::async_trait;

use super::CredentialValidator;
use crate::credential::Credential;
use crate::error::Rejection;
use crate::principal::Identity;
use crate::scope::Authorities;

/// Accepts identity asserted by a trusted upstream gateway.
///
/// The gateway has already authenticated the caller; this validator only
/// checks that the assertion is complete and well formed. Register it only
/// when the service is reachable exclusively through that gateway.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayHeaderValidator {
    _private: (),
}

impl GatewayHeaderValidator {
    /// Creates the validator.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

#[async_trait]
impl CredentialValidator for GatewayHeaderValidator {
    async fn validate(&self, credential: &Credential) -> Result<Identity, Rejection> {
        let assertion = credential
            .assertion()
            .ok_or_else(|| Rejection::malformed("credential is not a gateway assertion"))?;

        let user_id = assertion
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Rejection::malformed("gateway assertion has no user id"))?;

        let authorities = match assertion.authorities.as_deref() {
            Some(value) => Authorities::parse_header(value)?,
            None => Authorities::new(),
        };

        let mut identity = Identity::new(user_id).with_authorities(authorities);
        identity.tenant_id = assertion.tenant_id.clone();
        identity.device_id = assertion.device_id.clone();
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::GatewayAssertion;
    use crate::error::RejectReason;
    use crate::scope::{Permission, Scope};

    #[tokio::test]
    async fn complete_assertion_is_accepted() {
        let credential = Credential::gateway(GatewayAssertion {
            user_id: Some("u-1".to_string()),
            tenant_id: Some("t-1".to_string()),
            device_id: Some("d-1".to_string()),
            authorities: Some("create.user.tenant, read.order.own".to_string()),
        });

        let identity = GatewayHeaderValidator::new()
            .validate(&credential)
            .await
            .unwrap();

        assert_eq!(identity.subject, "u-1");
        assert_eq!(identity.device_id.as_deref(), Some("d-1"));
        assert_eq!(
            identity
                .authorities
                .scope_of(&Permission::new("read", "order")),
            Some(Scope::Own)
        );
    }

    #[tokio::test]
    async fn missing_user_id_is_malformed() {
        let credential = Credential::gateway(GatewayAssertion {
            tenant_id: Some("t-1".to_string()),
            ..GatewayAssertion::default()
        });

        let err = GatewayHeaderValidator::new()
            .validate(&credential)
            .await
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::MalformedCredential);
    }

    #[tokio::test]
    async fn garbled_authorities_are_malformed() {
        let credential = Credential::gateway(GatewayAssertion {
            user_id: Some("u-1".to_string()),
            authorities: Some("admin".to_string()),
            ..GatewayAssertion::default()
        });

        let err = GatewayHeaderValidator::new()
            .validate(&credential)
            .await
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::MalformedCredential);
    }
}
