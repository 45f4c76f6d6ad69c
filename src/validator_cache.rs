//! # Validator Cache Module
//!
//! Memoizes compiled validators so each distinct (method, route template,
//! content type) combination is compiled at most once per process under
//! normal operation.
//!
//! ## Cache Key Structure
//!
//! Keys render as `{method}-{route}-{content_type}`:
//! - `method`: upper-case HTTP method
//! - `route`: the OpenAPI route template (`/pets/{id}`), never the concrete URL
//! - `content_type`: the first content-type equivalent, or `not_provided`
//!
//! ## Thread Safety
//!
//! The cache is an `Arc<RwLock<HashMap>>`:
//! - lookups take the read lock only
//! - a miss builds the value **outside** any lock, then takes the write lock
//!   and re-checks; if another thread stored an entry first, that entry is
//!   returned and the fresh build is dropped
//!
//! Two threads missing on the same key may therefore both build, but every
//! caller observes the same stored `Arc` from then on. Building is pure for a
//! fixed contract, so the redundant build has no visible effect.
//!
//! Entries are never evicted: the contract is immutable for the lifetime of
//! the cache. A poisoned lock is recovered, since stored values are immutable.
//!
//! ## Configuration
//!
//! The cache can be disabled via `BRRTR_SCHEMA_CACHE=off`; every call then
//! builds a fresh value.

use crate::content_type::ContentType;
use http::Method;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Identifies one cached validator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatorKey {
    pub method: Method,
    pub route: String,
    pub content_type: String,
}

impl ValidatorKey {
    pub fn new(method: &Method, route: &str, content_type: &ContentType) -> Self {
        Self {
            method: method.clone(),
            route: route.to_string(),
            content_type: content_type.cache_key(),
        }
    }
}

impl fmt::Display for ValidatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.method, self.route, self.content_type)
    }
}

/// Thread-safe, append-only cache of compiled validators.
///
/// # Example
///
/// ```rust
/// use brrtguard::validator_cache::{ValidatorCache, ValidatorKey};
/// use brrtguard::content_type::ContentType;
///
/// let cache: ValidatorCache<String> = ValidatorCache::new(true);
/// let key = ValidatorKey::new(&http::Method::GET, "/pets", &ContentType::parse(None));
/// let v = cache.get_or_build(&key, || Ok::<_, ()>("compiled".to_string())).unwrap();
/// assert_eq!(v.as_str(), "compiled");
/// assert_eq!(cache.size(), 1);
/// ```
pub struct ValidatorCache<V> {
    cache: Arc<RwLock<HashMap<String, Arc<V>>>>,
    /// Whether the cache is enabled (from `BRRTR_SCHEMA_CACHE`)
    enabled: bool,
}

impl<V> Clone for ValidatorCache<V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            enabled: self.enabled,
        }
    }
}

impl<V> fmt::Debug for ValidatorCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorCache")
            .field("enabled", &self.enabled)
            .field("size", &self.size())
            .finish()
    }
}

impl<V> ValidatorCache<V> {
    pub fn new(enabled: bool) -> Self {
        info!(enabled = enabled, "Initializing validator cache");
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            enabled,
        }
    }

    /// Whether values are being memoized
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return the cached value for `key`, building it with `build` on a miss.
    ///
    /// `build` runs at most once per call and never while a lock is held.
    ///
    /// # Errors
    ///
    /// Whatever `build` returns. Failures are not cached; the next call for
    /// the same key builds again.
    pub fn get_or_build<E, F>(&self, key: &ValidatorKey, build: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if !self.enabled {
            return build().map(Arc::new);
        }

        let cache_key = key.to_string();

        // Fast path: read lock only
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = cache.get(&cache_key) {
                debug!(cache_key = %cache_key, "Validator cache hit");
                return Ok(Arc::clone(existing));
            }
        }

        let built = Arc::new(build()?);

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // Double-check: another thread may have stored an entry while we built
        if let Some(existing) = cache.get(&cache_key) {
            debug!(cache_key = %cache_key, "Validator compiled by another thread");
            return Ok(Arc::clone(existing));
        }
        cache.insert(cache_key.clone(), Arc::clone(&built));
        info!(
            method = %key.method,
            route = %key.route,
            content_type = %key.content_type,
            cache_size = cache.len(),
            "Validator compiled and cached"
        );
        Ok(built)
    }

    /// Number of cached entries
    #[must_use]
    pub fn size(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
