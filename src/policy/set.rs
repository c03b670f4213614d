use super::{Policy, PolicyConfig};
use crate::error::ConfigError;

/// An immutable, ordered collection of policies.
///
/// Policies are kept sorted from most to least specific resource pattern;
/// the sort is stable, so equally specific policies keep their declaration
/// order. Lookup returns the first policy that governs the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Builds a set from policies in declaration order.
    pub fn new(mut policies: Vec<Policy>) -> Self {
        policies.sort_by(|a, b| b.resource().specificity().cmp(&a.resource().specificity()));
        Self { policies }
    }

    /// An empty set; every request is denied.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a set from serialized policies.
    ///
    /// # Errors
    ///
    /// Fails on the first policy that does not convert.
    pub fn from_configs<I>(configs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = PolicyConfig>,
    {
        let policies = configs
            .into_iter()
            .map(Policy::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(policies))
    }

    /// The most specific policy governing `action` on `resource`, if any.
    pub fn find(&self, resource: &str, action: &str) -> Option<&Policy> {
        self.policies
            .iter()
            .find(|policy| policy.applies_to(resource, action))
    }

    /// Policies in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter()
    }

    /// Number of policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns `true` if the set holds no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl FromIterator<Policy> for PolicySet {
    fn from_iter<T: IntoIterator<Item = Policy>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Requirement;

    fn policy(resource: &str, action: &str, role: &str) -> Policy {
        Policy::parse(resource, action, Requirement::authenticated().with_role(role)).unwrap()
    }

    fn role_of(policy: Option<&Policy>) -> Option<&str> {
        policy.and_then(|p| p.requirement().roles().iter().next().map(String::as_str))
    }

    #[test]
    fn most_specific_pattern_wins() {
        let set = PolicySet::new(vec![
            policy("/**", "*", "user"),
            policy("/admin/**", "*", "admin"),
            policy("/admin/audit", "GET", "auditor"),
        ]);

        assert_eq!(role_of(set.find("/admin/audit", "GET")), Some("auditor"));
        assert_eq!(role_of(set.find("/admin/audit", "DELETE")), Some("admin"));
        assert_eq!(role_of(set.find("/orders", "GET")), Some("user"));
    }

    #[test]
    fn ties_keep_declaration_order() {
        let set = PolicySet::new(vec![
            policy("/items/{id}", "*", "first"),
            policy("/items/*", "*", "second"),
        ]);
        assert_eq!(role_of(set.find("/items/3", "GET")), Some("first"));
    }

    #[test]
    fn no_match_is_none() {
        let set = PolicySet::new(vec![policy("/admin/**", "*", "admin")]);
        assert!(set.find("/orders", "GET").is_none());
        assert!(PolicySet::empty().find("/", "GET").is_none());
    }

    #[test]
    fn from_configs_reports_bad_patterns() {
        let configs: Vec<PolicyConfig> =
            serde_json::from_str(r#"[{"resource": "/ok"}, {"resource": "no-slash"}]"#).unwrap();
        assert!(matches!(
            PolicySet::from_configs(configs),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }
}
