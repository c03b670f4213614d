//! Access policies and the swappable set they live in.
//!
//! A [`Policy`] binds a resource pattern and an action to a [`Requirement`].
//! Policies are grouped into an immutable [`PolicySet`], and the active set
//! is held by a [`PolicyStore`] that can swap it atomically at runtime.

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::principal::Principal;
use crate::scope::{Permission, Scope};

mod pattern;
mod set;
mod store;

pub use pattern::{ResourcePattern, Specificity};
pub use set::PolicySet;
pub use store::PolicyStore;

/// The actions a policy applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionMatcher {
    /// Any action (`*`)
    Any,
    /// One action, compared case-insensitively; stored lowercase
    Exact(String),
}

impl ActionMatcher {
    /// Parses `*` or an action name.
    pub fn parse(action: &str) -> Self {
        match action.trim() {
            "*" => ActionMatcher::Any,
            action => ActionMatcher::Exact(action.to_ascii_lowercase()),
        }
    }

    /// Returns `true` if `action` is covered.
    pub fn matches(&self, action: &str) -> bool {
        match self {
            ActionMatcher::Any => true,
            ActionMatcher::Exact(expected) => expected.eq_ignore_ascii_case(action),
        }
    }
}

impl fmt::Display for ActionMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionMatcher::Any => f.write_str("*"),
            ActionMatcher::Exact(action) => f.write_str(action),
        }
    }
}

/// What a principal must hold for a policy to allow access.
///
/// An empty requirement admits any authenticated principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirement {
    roles: BTreeSet<String>,
    authorities: Vec<(Permission, Scope)>,
    internal_only: bool,
}

impl Requirement {
    /// A requirement satisfied by any authenticated principal.
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// A requirement satisfied only by internal service callers.
    pub fn internal() -> Self {
        Self {
            internal_only: true,
            ..Self::default()
        }
    }

    /// Also requires `role`.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Also requires `permission` granted at a scope covering `scope`.
    pub fn with_authority(mut self, permission: Permission, scope: Scope) -> Self {
        self.authorities.push((permission, scope));
        self
    }

    /// Required roles.
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Required authorities and their minimum scopes.
    pub fn authorities(&self) -> &[(Permission, Scope)] {
        &self.authorities
    }

    /// Whether only internal callers qualify.
    pub fn is_internal_only(&self) -> bool {
        self.internal_only
    }

    /// Returns `true` if `principal` satisfies every part of the requirement.
    pub fn is_satisfied_by(&self, principal: &Principal) -> bool {
        if self.internal_only && !principal.is_internal() {
            return false;
        }
        self.roles.iter().all(|role| principal.has_role(role))
            && self
                .authorities
                .iter()
                .all(|(permission, scope)| principal.has_authority(permission, *scope))
    }
}

/// An access rule: which principals may perform which actions on which resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    resource: ResourcePattern,
    action: ActionMatcher,
    requirement: Requirement,
}

impl Policy {
    /// Creates a policy.
    pub fn new(resource: ResourcePattern, action: ActionMatcher, requirement: Requirement) -> Self {
        Self {
            resource,
            action,
            requirement,
        }
    }

    /// Parses `resource` and `action` and creates a policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for an invalid resource pattern.
    pub fn parse(
        resource: &str,
        action: &str,
        requirement: Requirement,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            ResourcePattern::parse(resource)?,
            ActionMatcher::parse(action),
            requirement,
        ))
    }

    /// The resource pattern.
    pub fn resource(&self) -> &ResourcePattern {
        &self.resource
    }

    /// The action matcher.
    pub fn action(&self) -> &ActionMatcher {
        &self.action
    }

    /// The requirement.
    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Returns `true` if the policy governs `action` on `resource`.
    pub fn applies_to(&self, resource: &str, action: &str) -> bool {
        self.action.matches(action) && self.resource.matches(resource)
    }
}

/// Serialized form of a [`Policy`].
///
/// ```json
/// { "resource": "/admin/**", "action": "*", "roles": ["admin"],
///   "authorities": ["update.user.tenant"], "internal": false }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Resource pattern
    pub resource: String,
    /// Action name or `*`
    #[serde(default = "any_action")]
    pub action: String,
    /// Required roles
    #[serde(default)]
    pub roles: Vec<String>,
    /// Required authorities as `action.resource.scope`
    #[serde(default)]
    pub authorities: Vec<String>,
    /// Internal callers only
    #[serde(default)]
    pub internal: bool,
}

fn any_action() -> String {
    "*".to_string()
}

impl TryFrom<PolicyConfig> for Policy {
    type Error = ConfigError;

    fn try_from(config: PolicyConfig) -> Result<Self, Self::Error> {
        let mut requirement = if config.internal {
            Requirement::internal()
        } else {
            Requirement::authenticated()
        };
        for role in config.roles {
            requirement = requirement.with_role(role);
        }
        for authority in &config.authorities {
            let (permission, scope) = parse_required_authority(authority)?;
            requirement = requirement.with_authority(permission, scope);
        }
        Policy::parse(&config.resource, &config.action, requirement)
    }
}

// Required scopes are parsed strictly; a typo must not silently become `none`.
fn parse_required_authority(entry: &str) -> Result<(Permission, Scope), ConfigError> {
    let invalid = || {
        ConfigError::Invalid(format!(
            "required authority '{}' is not action.resource.scope",
            entry
        ))
    };
    let (permission, scope) = entry.trim().rsplit_once('.').ok_or_else(invalid)?;
    let permission: Permission = permission.parse().map_err(|_| invalid())?;
    let scope: Scope = scope.parse().map_err(|_| invalid())?;
    Ok((permission, scope))
}
