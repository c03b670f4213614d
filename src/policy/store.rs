use std::sync::Arc;

use arc_swap::ArcSwap;

use super::PolicySet;

/// Holds the active [`PolicySet`] and swaps it atomically.
///
/// Readers take a snapshot once per evaluation and keep using it even if a
/// reload happens meanwhile; no reader ever sees a partly replaced set.
/// Reads are lock-free.
#[derive(Debug)]
pub struct PolicyStore {
    current: ArcSwap<PolicySet>,
}

impl PolicyStore {
    /// Creates a store holding `policies`.
    pub fn new(policies: PolicySet) -> Self {
        Self {
            current: ArcSwap::from_pointee(policies),
        }
    }

    /// The active policy set.
    pub fn snapshot(&self) -> Arc<PolicySet> {
        self.current.load_full()
    }

    /// Replaces the active policy set, returning the previous one.
    pub fn reload(&self, policies: PolicySet) -> Arc<PolicySet> {
        let count = policies.len();
        let previous = self.current.swap(Arc::new(policies));
        tracing::info!(
            policies = count,
            previous = previous.len(),
            "policy set reloaded"
        );
        previous
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(PolicySet::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Policy, Requirement};

    #[test]
    fn snapshot_survives_reload() {
        let store = PolicyStore::new(PolicySet::new(vec![Policy::parse(
            "/a",
            "*",
            Requirement::authenticated(),
        )
        .unwrap()]));

        let before = store.snapshot();
        let previous = store.reload(PolicySet::empty());

        assert_eq!(before.len(), 1);
        assert!(Arc::ptr_eq(&before, &previous));
        assert!(store.snapshot().is_empty());
    }
}
