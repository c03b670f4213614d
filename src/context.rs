use crate::error::Rejection;
use crate::logging::RequestLog;
use crate::principal::Principal;
use crate::scope::{Permission, Scope};

/// The authorized identity of a request, handed to protected logic.
///
/// A `SecurityContext` is produced only by the pipeline, and only for
/// requests that reached the authorized state. It is passed explicitly; there
/// is no ambient or thread-local lookup.
///
/// Handlers can tighten access further with the `require_*` guards, which
/// apply the same scope ordering as policy evaluation.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    request_id: String,
    principal: Principal,
}

impl SecurityContext {
    pub(crate) fn new(request_id: String, principal: Principal) -> Self {
        Self {
            request_id,
            principal,
        }
    }

    /// Returns the request ID for this context.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The authenticated principal.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Returns `true` if the caller is a trusted internal service.
    pub fn is_internal(&self) -> bool {
        self.principal.is_internal()
    }

    /// A logger tagged with this request's id.
    pub fn log(&self) -> RequestLog<'_> {
        RequestLog::new(&self.request_id)
    }

    /// Requires an authenticated, non-internal principal.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` for internal callers, which carry no user
    /// identity.
    pub fn require_authenticated(&self) -> Result<&Principal, Rejection> {
        if self.principal.is_internal() {
            return Err(Rejection::missing("internal caller has no user identity"));
        }
        Ok(&self.principal)
    }

    /// Requires `action` on `resource` at a scope covering `scope`.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientScope` if the authority is missing or too narrow.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use steak_security::{Scope, SecurityContext};
    /// # fn handler(ctx: &SecurityContext) -> Result<(), steak_security::Rejection> {
    /// let principal = ctx.require_authority("user", "create", Scope::Tenant)?;
    /// println!("{} may create users", principal.subject());
    /// # Ok(())
    /// # }
    /// ```
    pub fn require_authority(
        &self,
        resource: &str,
        action: &str,
        scope: Scope,
    ) -> Result<&Principal, Rejection> {
        let permission = Permission::new(action, resource);
        if self.principal.has_authority(&permission, scope) {
            Ok(&self.principal)
        } else {
            Err(Rejection::insufficient_scope(format!(
                "{} requires {} scope",
                permission, scope
            )))
        }
    }

    /// Requires a trusted internal caller.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientScope` for any caller that did not present the
    /// internal secret.
    pub fn require_internal(&self) -> Result<&Principal, Rejection> {
        if self.principal.is_internal() {
            Ok(&self.principal)
        } else {
            Err(Rejection::insufficient_scope("caller is not an internal service"))
        }
    }
}
