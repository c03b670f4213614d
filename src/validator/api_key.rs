use async_trait::async_trait;
use serde::Deserialize;

use super::CredentialValidator;
use crate::credential::Credential;
use crate::error::Rejection;
use crate::principal::Identity;
use crate::scope::Authorities;
use crate::secret::Secret;

/// A registered API key and the identity it grants.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyEntry {
    /// The key value
    pub key: Secret<String>,
    /// Subject the key authenticates as
    pub subject: String,
    /// Tenant the key belongs to
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Roles granted to the key
    #[serde(default)]
    pub roles: Vec<String>,
    /// Authorities as `action.resource.scope`
    #[serde(default)]
    pub authorities: Vec<String>,
}

impl ApiKeyEntry {
    /// An entry for `subject` with nothing granted.
    pub fn new(key: impl Into<Secret<String>>, subject: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            subject: subject.into(),
            tenant_id: None,
            roles: Vec::new(),
            authorities: Vec::new(),
        }
    }

    /// Adds a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Adds an `action.resource.scope` authority.
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.push(authority.into());
        self
    }

    fn identity(&self) -> Result<Identity, Rejection> {
        let authorities = Authorities::parse_all(&self.authorities)
            .map_err(|e| Rejection::internal(format!("api key '{}': {}", self.subject, e.detail)))?;
        let mut identity = Identity::new(self.subject.clone()).with_authorities(authorities);
        identity.tenant_id = self.tenant_id.clone();
        identity.roles = self.roles.iter().cloned().collect();
        Ok(identity)
    }
}

/// Validates API keys against a fixed registry.
///
/// Every registered key is compared, in constant time, on every request.
#[derive(Debug, Default)]
pub struct ApiKeyValidator {
    entries: Vec<ApiKeyEntry>,
}

impl ApiKeyValidator {
    /// Creates a validator over `entries`.
    pub fn new(entries: Vec<ApiKeyEntry>) -> Self {
        Self { entries }
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CredentialValidator for ApiKeyValidator {
    async fn validate(&self, credential: &Credential) -> Result<Identity, Rejection> {
        let presented = credential
            .secret_value()
            .ok_or_else(|| Rejection::malformed("api key credential carries no value"))?
            .expose_secret()
            .trim();
        if presented.is_empty() {
            return Err(Rejection::malformed("empty api key"));
        }

        // No early exit: the match position must not show in timing.
        let mut matched = None;
        for entry in &self.entries {
            if entry.key.matches(presented.as_bytes()) && matched.is_none() {
                matched = Some(entry);
            }
        }

        match matched {
            Some(entry) => entry.identity(),
            None => Err(Rejection::invalid("unknown api key")),
        }
    }
}
