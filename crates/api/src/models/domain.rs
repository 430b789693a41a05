//! Storefront domains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use univendor_core::{
    DomainId, DomainStatus, DomainType, SslStatus, VendorId, VerificationStatus,
};

/// A DNS record the vendor must publish for a custom domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub value: String,
}

/// A domain serving a vendor's storefront.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: DomainId,
    pub vendor_id: VendorId,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub domain_type: DomainType,
    pub status: DomainStatus,
    pub verification_status: VerificationStatus,
    pub verification_token: Option<String>,
    pub dns_records: Json<Vec<DnsRecord>>,
    pub ssl_status: SslStatus,
    pub is_primary: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    /// Whether the domain may serve traffic.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status == DomainStatus::Active
            && self.verification_status == VerificationStatus::Verified
    }
}
