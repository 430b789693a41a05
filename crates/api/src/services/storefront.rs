//! Storefront resolution.
//!
//! Maps the `Host` of a shopper's request to the vendor whose live domain
//! it is. Lookups (including misses) are cached for a minute.

use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use univendor_core::VendorStatus;

use crate::db::RepositoryError;
use crate::db::domains::DomainRepository;
use crate::db::vendors::VendorRepository;
use crate::models::vendor::Vendor;

const CACHE_TTL: Duration = Duration::from_secs(60);
const CACHE_CAPACITY: u64 = 10_000;

/// Lower-cased host name without port or trailing dot.
#[must_use]
pub fn normalize_host(host: &str) -> Option<String> {
    let host = host.trim();
    let host = match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    (!host.is_empty()).then_some(host)
}

/// Host to vendor lookup with a short-lived cache.
#[derive(Clone)]
pub struct StorefrontResolver {
    cache: Cache<String, Option<Vendor>>,
}

impl Default for StorefrontResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl StorefrontResolver {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();
        Self { cache }
    }

    /// The vendor serving `host`, if any.
    ///
    /// Suspended vendors have no storefront.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a lookup fails. Failures are
    /// not cached.
    pub async fn resolve(&self, pool: &PgPool, host: &str) -> Result<Option<Vendor>, RepositoryError> {
        let Some(host) = normalize_host(host) else {
            return Ok(None);
        };

        if let Some(cached) = self.cache.get(&host).await {
            return Ok(cached);
        }

        let vendor = match DomainRepository::new(pool).find_live(&host).await? {
            Some(domain) => VendorRepository::new(pool)
                .get(domain.vendor_id)
                .await?
                .filter(|v| v.status != VendorStatus::Suspended),
            None => None,
        };

        tracing::debug!(host = %host, found = vendor.is_some(), "Storefront resolved");
        self.cache.insert(host, vendor.clone()).await;
        Ok(vendor)
    }

    /// Drop every cached lookup. Called whenever a domain or vendor changes.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("Shop.Example.com").as_deref(), Some("shop.example.com"));
        assert_eq!(normalize_host("shop.example.com:8080").as_deref(), Some("shop.example.com"));
        assert_eq!(normalize_host("shop.example.com.").as_deref(), Some("shop.example.com"));
        assert_eq!(normalize_host("[::1]:3000").as_deref(), Some("[::1]"));
        assert_eq!(normalize_host("  "), None);
    }
}
