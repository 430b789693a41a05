//! Storefront domain lifecycle.
//!
//! Platform subdomains go live immediately. Custom domains get a
//! verification token and DNS instructions and stay pending until a
//! [`DomainVerifier`] accepts them.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use sqlx::types::Json;
use thiserror::Error;

use univendor_core::{
    DomainName, DomainNameError, DomainStatus, DomainType, VendorId, VerificationStatus,
};

use crate::db::RepositoryError;
use crate::db::domains::{DomainRepository, NewDomain};
use crate::models::domain::{DnsRecord, Domain};

/// Prefix of every verification token.
pub const TOKEN_PREFIX: &str = "univendor-verify-";

const TOKEN_SUFFIX_LEN: usize = 13;
const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Label of the TXT record holding the verification token.
const VERIFICATION_RECORD_LABEL: &str = "_univendor-verification";

/// How long a registration lasts before renewal.
const REGISTRATION_DAYS: i64 = 365;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid domain name: {0}")]
    InvalidName(#[from] DomainNameError),

    #[error("subdomains must end in .{0}")]
    NotPlatformSubdomain(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of checking a custom domain's DNS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    Failed(String),
}

pub type VerifyFuture<'a> = Pin<Box<dyn Future<Output = VerificationOutcome> + Send + 'a>>;

/// Checks that a vendor controls a custom domain.
pub trait DomainVerifier: Send + Sync {
    fn verify<'a>(&'a self, domain: &'a Domain) -> VerifyFuture<'a>;
}

/// Accepts every domain without a DNS lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptingVerifier;

impl DomainVerifier for AcceptingVerifier {
    fn verify<'a>(&'a self, _domain: &'a Domain) -> VerifyFuture<'a> {
        Box::pin(async { VerificationOutcome::Verified })
    }
}

/// A fresh token such as `univendor-verify-k3j9x0q2m7a1z`.
#[must_use]
pub fn generate_verification_token() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..TOKEN_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..TOKEN_ALPHABET.len());
            char::from(TOKEN_ALPHABET.get(idx).copied().unwrap_or(b'x'))
        })
        .collect();
    format!("{TOKEN_PREFIX}{suffix}")
}

/// Records a vendor must publish to verify and route a custom domain.
#[must_use]
pub fn dns_instructions(name: &str, token: &str, cname_target: &str) -> Vec<DnsRecord> {
    vec![
        DnsRecord {
            record_type: "TXT".to_string(),
            name: format!("{VERIFICATION_RECORD_LABEL}.{name}"),
            value: token.to_string(),
        },
        DnsRecord {
            record_type: "CNAME".to_string(),
            name: name.to_string(),
            value: cname_target.to_string(),
        },
        DnsRecord {
            record_type: "CNAME".to_string(),
            name: format!("www.{name}"),
            value: cname_target.to_string(),
        },
    ]
}

/// Changes a vendor may request on a domain.
#[derive(Debug, Clone, Default)]
pub struct DomainPatch {
    pub name: Option<String>,
    pub domain_type: Option<DomainType>,
    pub is_primary: Option<bool>,
    /// Only honoured for super admins.
    pub status: Option<DomainStatus>,
}

pub struct DomainService<'a> {
    domains: DomainRepository<'a>,
    verifier: &'a dyn DomainVerifier,
    platform_domain: &'a str,
    cname_target: &'a str,
}

impl<'a> DomainService<'a> {
    #[must_use]
    pub fn new(
        pool: &'a PgPool,
        verifier: &'a dyn DomainVerifier,
        platform_domain: &'a str,
        cname_target: &'a str,
    ) -> Self {
        Self {
            domains: DomainRepository::new(pool),
            verifier,
            platform_domain,
            cname_target,
        }
    }

    /// Register a domain for `vendor_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidName` for a malformed name,
    /// `DomainError::NotPlatformSubdomain` for a subdomain outside the
    /// platform domain and a repository conflict if the name is taken.
    pub async fn create(
        &self,
        vendor_id: VendorId,
        name: &str,
        domain_type: DomainType,
        is_primary: bool,
        now: DateTime<Utc>,
    ) -> Result<Domain, DomainError> {
        let name = DomainName::parse(name)?;

        let new = match domain_type {
            DomainType::Subdomain => {
                self.check_subdomain(&name)?;
                NewDomain {
                    vendor_id,
                    name,
                    domain_type,
                    status: DomainStatus::Active,
                    verification_status: VerificationStatus::Verified,
                    verification_token: None,
                    dns_records: Vec::new(),
                    is_primary,
                    expires_at: now + Duration::days(REGISTRATION_DAYS),
                }
            }
            DomainType::Custom => {
                let token = generate_verification_token();
                let dns_records = dns_instructions(name.as_str(), &token, self.cname_target);
                NewDomain {
                    vendor_id,
                    name,
                    domain_type,
                    status: DomainStatus::Pending,
                    verification_status: VerificationStatus::Pending,
                    verification_token: Some(token),
                    dns_records,
                    is_primary,
                    expires_at: now + Duration::days(REGISTRATION_DAYS),
                }
            }
        };

        let domain = self.domains.create(&new).await?;
        tracing::info!(domain = %domain.name, vendor_id = %vendor_id, "Domain registered");
        Ok(domain)
    }

    /// Apply a patch.
    ///
    /// Switching to a custom domain without a token issues one with DNS
    /// instructions and resets verification to pending.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidName` for a malformed new name.
    pub async fn update(&self, mut domain: Domain, patch: DomainPatch) -> Result<Domain, DomainError> {
        if let Some(name) = patch.name.as_deref() {
            domain.name = DomainName::parse(name)?.into();
        }
        if let Some(domain_type) = patch.domain_type {
            domain.domain_type = domain_type;
        }
        if let Some(is_primary) = patch.is_primary {
            domain.is_primary = is_primary;
        }
        if let Some(status) = patch.status {
            domain.status = status;
        }

        match domain.domain_type {
            DomainType::Custom if domain.verification_token.is_none() => {
                let token = generate_verification_token();
                domain.dns_records = Json(dns_instructions(&domain.name, &token, self.cname_target));
                domain.verification_token = Some(token);
                domain.verification_status = VerificationStatus::Pending;
                domain.status = DomainStatus::Pending;
            }
            DomainType::Subdomain => {
                self.check_subdomain(&DomainName::parse(&domain.name)?)?;
            }
            DomainType::Custom => {}
        }

        Ok(self.domains.save(&domain).await?)
    }

    /// Ask the verifier whether the vendor controls the domain.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::VerificationFailed` when the check fails; the
    /// failure is recorded on the domain.
    pub async fn verify(&self, mut domain: Domain, now: DateTime<Utc>) -> Result<Domain, DomainError> {
        let outcome = self.verifier.verify(&domain).await;
        domain.last_checked_at = Some(now);

        match outcome {
            VerificationOutcome::Verified => {
                domain.verification_status = VerificationStatus::Verified;
                domain.status = DomainStatus::Active;
                let domain = self.domains.save(&domain).await?;
                tracing::info!(domain = %domain.name, "Domain verified");
                Ok(domain)
            }
            VerificationOutcome::Failed(reason) => {
                domain.verification_status = VerificationStatus::Failed;
                self.domains.save(&domain).await?;
                tracing::warn!(domain = %domain.name, reason = %reason, "Domain verification failed");
                Err(DomainError::VerificationFailed(reason))
            }
        }
    }

    /// Replace the verification token and DNS instructions.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the update fails.
    pub async fn regenerate_token(
        &self,
        mut domain: Domain,
        now: DateTime<Utc>,
    ) -> Result<Domain, DomainError> {
        let token = generate_verification_token();
        domain.dns_records = Json(dns_instructions(&domain.name, &token, self.cname_target));
        domain.verification_token = Some(token);
        domain.verification_status = VerificationStatus::Pending;
        domain.last_checked_at = Some(now);

        Ok(self.domains.save(&domain).await?)
    }

    /// Mark SSL active on every live domain. Returns the number updated.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the update fails.
    pub async fn check_ssl(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let updated = self.domains.activate_ssl_for_live(now).await?;
        tracing::info!(updated, "SSL check complete");
        Ok(updated)
    }

    fn check_subdomain(&self, name: &DomainName) -> Result<(), DomainError> {
        if name.is_subdomain_of(self.platform_domain) {
            Ok(())
        } else {
            Err(DomainError::NotPlatformSubdomain(self.platform_domain.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use univendor_core::SslStatus;

    use super::*;

    #[test]
    fn test_verification_token_shape() {
        let token = generate_verification_token();
        let suffix = token.strip_prefix(TOKEN_PREFIX).expect("prefixed");
        assert_eq!(suffix.len(), 13);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
        assert_ne!(token, generate_verification_token());
    }

    #[test]
    fn test_dns_instructions() {
        let records = dns_instructions("shop.example.com", "univendor-verify-abc", "stores.univendor.app");
        assert_eq!(records.len(), 3);

        let txt = records.first().expect("txt record");
        assert_eq!(txt.record_type, "TXT");
        assert_eq!(txt.name, "_univendor-verification.shop.example.com");
        assert_eq!(txt.value, "univendor-verify-abc");

        let www = records.get(2).expect("www record");
        assert_eq!(www.record_type, "CNAME");
        assert_eq!(www.name, "www.shop.example.com");
        assert_eq!(www.value, "stores.univendor.app");
    }

    #[tokio::test]
    async fn test_accepting_verifier() {
        let domain = Domain {
            id: univendor_core::DomainId::new(1),
            vendor_id: VendorId::new(1),
            name: "shop.example.com".to_string(),
            domain_type: DomainType::Custom,
            status: DomainStatus::Pending,
            verification_status: VerificationStatus::Pending,
            verification_token: Some(generate_verification_token()),
            dns_records: Json(Vec::new()),
            ssl_status: SslStatus::Pending,
            is_primary: false,
            last_checked_at: None,
            expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(
            AcceptingVerifier.verify(&domain).await,
            VerificationOutcome::Verified
        );
    }
}
