use std::fmt;

use serde::{Deserialize, Deserializer};
use subtle::ConstantTimeEq;

/// A wrapper that keeps credential material out of logs and error messages.
///
/// Tokens, API keys and shared secrets travel through the pipeline inside
/// `Secret<T>`. The wrapped value is reachable only through
/// [`expose_secret`](Self::expose_secret).
///
/// # Examples
///
/// ```
/// use steak_security::Secret;
///
/// let token = Secret::new("eyJhbGciOi...".to_string());
///
/// assert_eq!(format!("{:?}", token), "[REDACTED]");
/// assert_eq!(format!("{}", token), "[REDACTED]");
/// assert_eq!(token.expose_secret(), "eyJhbGciOi...");
/// ```
// Do NOT derive Clone, Copy or Default: secrets are shared behind Arc, never duplicated.
pub struct Secret<T> {
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the secret value.
    ///
    /// Callers must not log or format the returned reference.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl<T: AsRef<[u8]>> Secret<T> {
    /// Compares the secret with `candidate` in constant time.
    ///
    /// Length differences still short-circuit; the content comparison does not.
    pub fn matches(&self, candidate: &[u8]) -> bool {
        self.inner.as_ref().ct_eq(candidate).into()
    }

    /// Returns `true` if the secret holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.inner.as_ref().is_empty()
    }
}

impl<T> fmt::Debug for Secret<T> {
    // MUST stay "[REDACTED]" unconditionally (CWE-532).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Secret<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Secret::new)
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Secret::new(value)
    }
}

impl From<&str> for Secret<String> {
    fn from(value: &str) -> Self {
        Secret::new(value.to_string())
    }
}
