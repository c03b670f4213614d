//! Permission scope levels and authority maps.
//!
//! An authority grants a permission, written `action.resource`, at a
//! [`Scope`]. On the wire authorities travel as `action.resource.scope`
//! strings, e.g. `create.user.tenant`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Rejection;

/// Breadth of access a principal holds for a permission.
///
/// Levels are ordered: `None < Own < Tenant < All`. A higher level covers
/// every lower one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// No access
    #[default]
    None,
    /// Access to the principal's own resources
    Own,
    /// Access to resources within the principal's tenant
    Tenant,
    /// System-wide access
    All,
}

impl Scope {
    /// Numeric level of the scope (0-3).
    pub fn level(self) -> u8 {
        match self {
            Scope::None => 0,
            Scope::Own => 1,
            Scope::Tenant => 2,
            Scope::All => 3,
        }
    }

    /// Returns `true` if this granted scope satisfies `required`.
    ///
    /// `Scope::None` never satisfies anything, including itself.
    pub fn covers(self, required: Scope) -> bool {
        self != Scope::None && self >= required
    }

    /// Parses a scope name leniently: unknown names become `Scope::None`.
    pub fn parse_lenient(name: &str) -> Scope {
        name.parse().unwrap_or(Scope::None)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scope::None => "none",
            Scope::Own => "own",
            Scope::Tenant => "tenant",
            Scope::All => "all",
        };
        f.write_str(name)
    }
}

impl FromStr for Scope {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Scope::None),
            "own" => Ok(Scope::Own),
            "tenant" => Ok(Scope::Tenant),
            "all" => Ok(Scope::All),
            other => Err(Rejection::malformed(format!("unknown scope '{}'", other))),
        }
    }
}

/// A permission key: an action on a resource, displayed as `action.resource`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Permission {
    action: String,
    resource: String,
}

impl Permission {
    /// Creates a permission for `action` on `resource`.
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
        }
    }

    /// The action part.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The resource part.
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.action, self.resource)
    }
}

impl FromStr for Permission {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, '.');
        match (parts.next(), parts.next()) {
            (Some(action), Some(resource)) if !action.is_empty() && !resource.is_empty() => {
                Ok(Permission::new(action, resource))
            }
            _ => Err(Rejection::malformed(format!(
                "permission '{}' is not in action.resource form",
                s
            ))),
        }
    }
}

/// The set of authorities granted to a principal.
///
/// A permission appears at most once; when the same permission is granted
/// twice the broader scope is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorities {
    grants: BTreeMap<Permission, Scope>,
}

impl Authorities {
    /// Creates an empty authority map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `permission` at `scope`, keeping the broader scope on conflict.
    pub fn grant(&mut self, permission: Permission, scope: Scope) {
        let entry = self.grants.entry(permission).or_insert(scope);
        if scope > *entry {
            *entry = scope;
        }
    }

    /// Returns the scope granted for `permission`, if any.
    pub fn scope_of(&self, permission: &Permission) -> Option<Scope> {
        self.grants.get(permission).copied()
    }

    /// Returns `true` if `permission` is granted at a level covering `required`.
    pub fn allows(&self, permission: &Permission, required: Scope) -> bool {
        self.scope_of(permission)
            .map(|granted| granted.covers(required))
            .unwrap_or(false)
    }

    /// Number of distinct permissions granted.
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Returns `true` if nothing is granted.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Iterates over granted permissions and their scopes.
    pub fn iter(&self) -> impl Iterator<Item = (&Permission, Scope)> {
        self.grants.iter().map(|(p, s)| (p, *s))
    }

    /// Parses a single `action.resource.scope` entry.
    ///
    /// The permission part must be well formed; an unknown scope name
    /// degrades to `Scope::None` rather than failing.
    pub fn parse_entry(entry: &str) -> Result<(Permission, Scope), Rejection> {
        let entry = entry.trim();
        let (permission, scope) = entry.rsplit_once('.').ok_or_else(|| {
            Rejection::malformed(format!(
                "authority '{}' is not in action.resource.scope form",
                entry
            ))
        })?;
        let permission: Permission = permission.parse()?;
        Ok((permission, Scope::parse_lenient(scope)))
    }

    /// Parses a list of `action.resource.scope` entries.
    pub fn parse_all<I, S>(entries: I) -> Result<Self, Rejection>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut authorities = Authorities::new();
        for entry in entries {
            let entry = entry.as_ref();
            if entry.trim().is_empty() {
                continue;
            }
            let (permission, scope) = Self::parse_entry(entry)?;
            authorities.grant(permission, scope);
        }
        Ok(authorities)
    }

    /// Parses a comma separated header value such as
    /// `create.user.tenant,read.order.all`.
    pub fn parse_header(value: &str) -> Result<Self, Rejection> {
        Self::parse_all(value.split(','))
    }
}

impl FromIterator<(Permission, Scope)> for Authorities {
    fn from_iter<T: IntoIterator<Item = (Permission, Scope)>>(iter: T) -> Self {
        let mut authorities = Authorities::new();
        for (permission, scope) in iter {
            authorities.grant(permission, scope);
        }
        authorities
    }
}
