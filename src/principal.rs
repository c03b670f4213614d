use std::collections::BTreeSet;

use time::OffsetDateTime;

use crate::credential::CredentialSource;
use crate::scope::{Authorities, Permission, Scope};

/// Identity data returned by a validator.
///
/// This is plain data. It becomes a [`Principal`] only inside the pipeline,
/// after the validator that produced it has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Subject identifier (user id, service name, API key owner)
    pub subject: String,
    /// Tenant the subject belongs to
    pub tenant_id: Option<String>,
    /// Device the request originated from
    pub device_id: Option<String>,
    /// Granted roles
    pub roles: BTreeSet<String>,
    /// Granted authorities
    pub authorities: Authorities,
    /// When the identity stops being valid; `None` means no expiry
    pub expires_at: Option<OffsetDateTime>,
    /// Whether the caller is a trusted internal service
    pub internal: bool,
}

impl Identity {
    /// Creates an identity for `subject` with nothing granted.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            tenant_id: None,
            device_id: None,
            roles: BTreeSet::new(),
            authorities: Authorities::new(),
            expires_at: None,
            internal: false,
        }
    }

    /// Sets the tenant id.
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Sets the device id.
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Adds a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Grants an authority.
    pub fn with_authority(mut self, permission: Permission, scope: Scope) -> Self {
        self.authorities.grant(permission, scope);
        self
    }

    /// Replaces all authorities.
    pub fn with_authorities(mut self, authorities: Authorities) -> Self {
        self.authorities = authorities;
        self
    }

    /// Sets the expiry instant.
    pub fn expiring_at(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Marks the identity as an internal service caller.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}

/// An authenticated identity.
///
/// There is no public constructor: a `Principal` exists only because a
/// credential validator accepted the request's credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    identity: Identity,
    source: CredentialSource,
}

impl Principal {
    pub(crate) fn from_validated(identity: Identity, source: CredentialSource) -> Self {
        Self { identity, source }
    }

    /// Subject identifier.
    pub fn subject(&self) -> &str {
        &self.identity.subject
    }

    /// Tenant identifier, if known.
    pub fn tenant_id(&self) -> Option<&str> {
        self.identity.tenant_id.as_deref()
    }

    /// Device identifier, if known.
    pub fn device_id(&self) -> Option<&str> {
        self.identity.device_id.as_deref()
    }

    /// Granted roles.
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.identity.roles
    }

    /// Returns `true` if the principal holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.identity.roles.contains(role)
    }

    /// Granted authorities.
    pub fn authorities(&self) -> &Authorities {
        &self.identity.authorities
    }

    /// Returns `true` if `permission` is granted at a scope covering `required`.
    pub fn has_authority(&self, permission: &Permission, required: Scope) -> bool {
        self.identity.authorities.allows(permission, required)
    }

    /// Expiry instant, if the credential carried one.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.identity.expires_at
    }

    /// Returns `true` if the principal is expired at `now`.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.identity
            .expires_at
            .map(|expiry| expiry <= now)
            .unwrap_or(false)
    }

    /// Returns `true` for internal service callers.
    pub fn is_internal(&self) -> bool {
        self.identity.internal
    }

    /// The credential source the principal was authenticated from.
    pub fn source(&self) -> CredentialSource {
        self.source
    }
}
