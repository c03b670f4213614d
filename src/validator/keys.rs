//! Verification key resolution.
//!
//! Keys are looked up by the token's `kid` header. Resolvers may reach out
//! to a remote key set; [`JwtValidator`](super::JwtValidator) bounds every
//! lookup with a timeout, so implementations need not.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::ConfigError;
use crate::secret::Secret;

/// Errors from a key resolver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// No key matches the requested id
    #[error("no verification key for kid {0:?}")]
    NotFound(Option<String>),
    /// The key source could not be reached or returned garbage
    #[error("key source unavailable: {0}")]
    Unavailable(String),
}

/// Resolves the verification key for a token.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Returns the key for `kid`, or the default key when `kid` is `None`.
    async fn resolve(&self, kid: Option<&str>) -> Result<DecodingKey, KeyError>;
}

/// A fixed set of keys known at startup.
///
/// A token without `kid` uses the default key. A token with a `kid` uses
/// the matching named key; it falls back to the default key only when no
/// named keys are configured at all.
#[derive(Clone, Default)]
pub struct StaticKeyResolver {
    default: Option<DecodingKey>,
    named: HashMap<String, DecodingKey>,
}

impl StaticKeyResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver whose default key is an HMAC secret.
    pub fn hmac(secret: &Secret<String>) -> Self {
        Self::new().with_default(DecodingKey::from_secret(
            secret.expose_secret().as_bytes(),
        ))
    }

    /// Creates a resolver whose default key is an RSA public key in PEM form.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] if the PEM cannot be parsed.
    pub fn rsa_pem(pem: &[u8]) -> Result<Self, ConfigError> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| ConfigError::InvalidKey(format!("RSA public key: {}", e)))?;
        Ok(Self::new().with_default(key))
    }

    /// Creates a resolver whose default key is an EC public key in PEM form.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] if the PEM cannot be parsed.
    pub fn ec_pem(pem: &[u8]) -> Result<Self, ConfigError> {
        let key = DecodingKey::from_ec_pem(pem)
            .map_err(|e| ConfigError::InvalidKey(format!("EC public key: {}", e)))?;
        Ok(Self::new().with_default(key))
    }

    /// Creates a resolver whose default key is an Ed25519 public key in PEM form.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] if the PEM cannot be parsed.
    pub fn ed_pem(pem: &[u8]) -> Result<Self, ConfigError> {
        let key = DecodingKey::from_ed_pem(pem)
            .map_err(|e| ConfigError::InvalidKey(format!("Ed25519 public key: {}", e)))?;
        Ok(Self::new().with_default(key))
    }

    /// Sets the default key.
    pub fn with_default(mut self, key: DecodingKey) -> Self {
        self.default = Some(key);
        self
    }

    /// Adds a key under `kid`.
    pub fn with_key(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.named.insert(kid.into(), key);
        self
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve(&self, kid: Option<&str>) -> Result<DecodingKey, KeyError> {
        let key = match kid {
            Some(kid) if !self.named.is_empty() => self.named.get(kid),
            _ => self.default.as_ref(),
        };
        key.cloned()
            .ok_or_else(|| KeyError::NotFound(kid.map(str::to_string)))
    }
}

/// Caches keys from another resolver for a fixed time-to-live.
///
/// Only successful lookups are cached; failures go to the inner resolver
/// every time. At most `capacity` keys are held: expired entries are pruned
/// on insert, then the oldest entry is evicted if the cache is still full.
pub struct CachedKeyResolver<R> {
    inner: R,
    ttl: Duration,
    capacity: usize,
    entries: RwLock<HashMap<Option<String>, (DecodingKey, Instant)>>,
}

impl<R: KeyResolver> CachedKeyResolver<R> {
    /// Default maximum number of cached keys.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Wraps `inner`, keeping resolved keys for `ttl`.
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            capacity: Self::DEFAULT_CAPACITY,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the maximum number of cached keys (at least one).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Number of keys currently cached, expired ones included.
    pub async fn cached_keys(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Drops every cached key.
    pub async fn invalidate(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl<R: KeyResolver> KeyResolver for CachedKeyResolver<R> {
    async fn resolve(&self, kid: Option<&str>) -> Result<DecodingKey, KeyError> {
        let cache_key = kid.map(str::to_string);
        {
            let entries = self.entries.read().await;
            if let Some((key, fetched_at)) = entries.get(&cache_key) {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(key.clone());
                }
            }
        }

        let key = self.inner.resolve(kid).await?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if !entries.contains_key(&cache_key) && entries.len() >= self.capacity {
            entries.retain(|_, (_, fetched_at)| now.duration_since(*fetched_at) < self.ttl);
            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, (_, fetched_at))| *fetched_at)
                    .map(|(kid, _)| kid.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(cache_key, (key.clone(), now));
        Ok(key)
    }
}
