//! Pipeline stages.
//!
//! Zero-sized markers encode how far a request has progressed through the
//! pipeline at compile time, and [`PipelineState`] reports it at runtime.

use std::fmt;

/// Marker for an exchange no stage has run on yet.
#[derive(Debug, Clone, Copy)]
pub struct Pending {
    _private: (),
}

impl Pending {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Marker for an exchange holding an extracted, unvalidated credential.
#[derive(Debug, Clone, Copy)]
pub struct Extracted {
    _private: (),
}

impl Extracted {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Marker for an exchange holding a validated principal.
#[derive(Debug, Clone, Copy)]
pub struct Validated {
    _private: (),
}

impl Validated {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Marker for an exchange whose principal passed authorization.
///
/// Only an `Authorized` exchange can be turned into a
/// [`SecurityContext`](crate::SecurityContext).
#[derive(Debug, Clone, Copy)]
pub struct Authorized {
    _private: (),
}

impl Authorized {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Where a request stands in the pipeline.
///
/// `Authorized` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Nothing has run yet
    Pending,
    /// A credential was found
    Extracted,
    /// The credential was validated into a principal
    Validated,
    /// The principal may proceed
    Authorized,
    /// The request was refused
    Rejected,
}

impl PipelineState {
    /// Returns `true` for `Authorized` and `Rejected`.
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Authorized | PipelineState::Rejected)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Pending => "pending",
            PipelineState::Extracted => "extracted",
            PipelineState::Validated => "validated",
            PipelineState::Authorized => "authorized",
            PipelineState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Links a marker type to its runtime state.
pub trait Stage: sealed::Sealed {
    /// The runtime state for this marker.
    const STATE: PipelineState;
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Pending {}
    impl Sealed for super::Extracted {}
    impl Sealed for super::Validated {}
    impl Sealed for super::Authorized {}
}

impl Stage for Pending {
    const STATE: PipelineState = PipelineState::Pending;
}

impl Stage for Extracted {
    const STATE: PipelineState = PipelineState::Extracted;
}

impl Stage for Validated {
    const STATE: PipelineState = PipelineState::Validated;
}

impl Stage for Authorized {
    const STATE: PipelineState = PipelineState::Authorized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_zero_sized() {
        assert_eq!(std::mem::size_of::<Pending>(), 0);
        assert_eq!(std::mem::size_of::<Extracted>(), 0);
        assert_eq!(std::mem::size_of::<Validated>(), 0);
        assert_eq!(std::mem::size_of::<Authorized>(), 0);
    }

    #[test]
    fn markers_map_to_states() {
        assert_eq!(Pending::STATE, PipelineState::Pending);
        assert_eq!(Authorized::STATE, PipelineState::Authorized);
        assert!(Authorized::STATE.is_terminal());
        assert!(PipelineState::Rejected.is_terminal());
        assert!(!Validated::STATE.is_terminal());
    }

    #[test]
    fn markers_can_be_created_internally() {
        let _ = (
            Pending::new(),
            Extracted::new(),
            Validated::new(),
            Authorized::new(),
        );
    }
}
