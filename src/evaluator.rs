//! Authorization decisions.

use std::fmt;
use std::sync::Arc;

use http::Method;
use time::OffsetDateTime;

use crate::error::RejectReason;
use crate::policy::{PolicySet, PolicyStore};
use crate::principal::Principal;

/// The resource and action a request wants.
///
/// By default the resource is the request path and the action the HTTP
/// method; callers can evaluate any other pair through
/// [`SecurityPipeline::authorize`](crate::SecurityPipeline::authorize).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessTarget {
    resource: String,
    action: String,
}

impl AccessTarget {
    /// Creates a target.
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// The target for an HTTP request.
    pub fn from_request(method: &Method, path: &str) -> Self {
        Self::new(path, method.as_str())
    }

    /// The resource.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The action.
    pub fn action(&self) -> &str {
        &self.action
    }
}

impl fmt::Display for AccessTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.resource)
    }
}

/// Outcome of authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Access granted
    Allow,
    /// Access refused, with the reason
    Deny(RejectReason),
}

impl Decision {
    /// Returns `true` for [`Decision::Allow`].
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Decides whether a principal may act on a resource.
///
/// Each evaluation reads one snapshot of the policy store, so a concurrent
/// reload is either fully visible or not at all. Evaluation is fail-closed:
/// a request no policy governs is denied.
#[derive(Debug, Clone)]
pub struct AuthorizationEvaluator {
    policies: Arc<PolicyStore>,
}

impl AuthorizationEvaluator {
    /// Creates an evaluator over `policies`.
    pub fn new(policies: Arc<PolicyStore>) -> Self {
        Self { policies }
    }

    /// The backing store, for reloading.
    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.policies
    }

    /// Evaluates against the current policy set.
    pub fn evaluate(&self, principal: &Principal, target: &AccessTarget) -> Decision {
        self.evaluate_at(principal, target, OffsetDateTime::now_utc())
    }

    /// Evaluates as of `now`.
    pub fn evaluate_at(
        &self,
        principal: &Principal,
        target: &AccessTarget,
        now: OffsetDateTime,
    ) -> Decision {
        let snapshot = self.policies.snapshot();
        decide(&snapshot, principal, target, now)
    }
}

/// Evaluates against a fixed policy set.
pub fn decide(
    policies: &PolicySet,
    principal: &Principal,
    target: &AccessTarget,
    now: OffsetDateTime,
) -> Decision {
    if principal.is_expired_at(now) {
        return Decision::Deny(RejectReason::ExpiredCredential);
    }

    let Some(policy) = policies.find(target.resource(), target.action()) else {
        tracing::debug!(target = %target, "no policy governs target");
        return Decision::Deny(RejectReason::InsufficientScope);
    };

    if policy.requirement().is_satisfied_by(principal) {
        Decision::Allow
    } else {
        tracing::debug!(
            target = %target,
            policy = %policy.resource(),
            subject = principal.subject(),
            "requirement not met"
        );
        Decision::Deny(RejectReason::InsufficientScope)
    }
}
