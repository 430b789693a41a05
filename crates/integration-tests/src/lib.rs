//! Integration tests for UniVendor.
//!
//! The tests drive a running API server over HTTP and use the database
//! directly only to plant login codes, which are otherwise emailed.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and start the server
//! cargo run -p univendor-cli -- migrate
//! cargo run -p univendor-api
//!
//! # Run the ignored integration tests
//! cargo test -p univendor-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `UNIVENDOR_TEST_URL` - API base URL (default: `http://localhost:3000`)
//! - `UNIVENDOR_DATABASE_URL` (or `DATABASE_URL`) - the server's database
//! - `UNIVENDOR_PLATFORM_DOMAIN` - must match the server (default: `univendor.app`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::{Duration, Utc};
use reqwest::{Client, Response, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use univendor_api::db::create_pool;
use univendor_api::db::otp::OtpRepository;
use univendor_api::services::auth::hash_code;
use univendor_core::{Email, OtpCode};

/// Header the API reads before `Host` to pick a storefront.
pub const FORWARDED_HOST: &str = "x-forwarded-host";

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("UNIVENDOR_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Domain under which storefront subdomains are issued.
#[must_use]
pub fn platform_domain() -> String {
    std::env::var("UNIVENDOR_PLATFORM_DOMAIN").unwrap_or_else(|_| "univendor.app".to_string())
}

/// A unique address so tests never collide.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

/// Shared handles for one test.
pub struct TestContext {
    pub pool: PgPool,
    pub base_url: String,
}

impl TestContext {
    /// Connect to the server's database.
    ///
    /// # Panics
    ///
    /// Panics if no database URL is configured or it is unreachable.
    pub async fn new() -> Self {
        let database_url = std::env::var("UNIVENDOR_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map(SecretString::from)
            .expect("UNIVENDOR_DATABASE_URL or DATABASE_URL must be set");
        let pool = create_pool(&database_url)
            .await
            .expect("Failed to connect to test database");

        Self {
            pool,
            base_url: base_url(),
        }
    }

    /// A client that keeps its session cookie, like a browser.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn client() -> Client {
        Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client")
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sign `client` in as `email`, creating the account on first use.
    ///
    /// A known code is planted directly instead of reading email.
    ///
    /// # Panics
    ///
    /// Panics if the code cannot be stored or the server rejects it.
    pub async fn login(&self, client: &Client, email: &str, is_customer: bool) -> Value {
        let code = OtpCode::generate();
        let parsed = Email::parse(email).expect("valid test email");
        OtpRepository::new(&self.pool)
            .create(&parsed, &hash_code(&code), Utc::now() + Duration::minutes(10))
            .await
            .expect("Failed to plant login code");

        let resp = client
            .post(self.url("/api/auth/verify-otp"))
            .json(&json!({ "email": email, "otp": code.as_str(), "isCustomer": is_customer }))
            .send()
            .await
            .expect("verify-otp request failed");
        expect_status(resp, StatusCode::OK).await
    }

    /// Sign in a new user and open a store with a live platform subdomain.
    ///
    /// Returns the vendor JSON and the storefront host.
    ///
    /// # Panics
    ///
    /// Panics if any step fails.
    pub async fn create_vendor(&self, client: &Client) -> (Value, String) {
        self.login(client, &unique_email("vendor"), false).await;

        let resp = client
            .post(self.url("/api/vendors"))
            .json(&json!({ "storeName": "Test Store", "description": "Integration test store" }))
            .send()
            .await
            .expect("create vendor request failed");
        let vendor = expect_status(resp, StatusCode::CREATED).await;

        let host = format!("shop-{}.{}", Uuid::new_v4().simple(), platform_domain());
        let resp = client
            .post(self.url("/api/domains"))
            .json(&json!({ "name": host, "type": "subdomain", "isPrimary": true }))
            .send()
            .await
            .expect("create domain request failed");
        expect_status(resp, StatusCode::CREATED).await;

        (vendor, host)
    }

    /// Create an active product priced at `price`.
    ///
    /// # Panics
    ///
    /// Panics if the server rejects the product.
    pub async fn create_product(&self, client: &Client, price: &str, stock: i32) -> Value {
        let resp = client
            .post(self.url("/api/products"))
            .json(&json!({
                "name": format!("Product {}", Uuid::new_v4().simple()),
                "sellingPrice": price,
                "stockQuantity": stock,
            }))
            .send()
            .await
            .expect("create product request failed");
        expect_status(resp, StatusCode::CREATED).await
    }
}

/// Assert the status and return the JSON body.
///
/// # Panics
///
/// Panics with the body text when the status differs.
pub async fn expect_status(resp: Response, status: StatusCode) -> Value {
    let actual = resp.status();
    let text = resp.text().await.expect("Failed to read response body");
    assert_eq!(actual, status, "unexpected status, body: {text}");
    if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).expect("Response body is not JSON")
    }
}

/// A decimal field, serialized by the API as a string.
///
/// # Panics
///
/// Panics if the field is missing or not numeric.
#[must_use]
pub fn money(value: &Value) -> f64 {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("money field should be a decimal string")
}

/// A shipping address every checkout can use.
#[must_use]
pub fn shipping_address() -> Value {
    json!({
        "fullName": "Ada Lovelace",
        "line1": "12 Analytical Way",
        "city": "London",
        "state": "LDN",
        "postalCode": "N1 9GU",
        "country": "GB",
    })
}
