//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::domains::{AcceptingVerifier, DomainVerifier};
use crate::services::email::{EmailError, EmailService};
use crate::services::storefront::StorefrontResolver;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    email: EmailService,
    verifier: Arc<dyn DomainVerifier>,
    storefronts: StorefrontResolver,
}

impl AppState {
    /// Create a new application state with the shipped domain verifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, EmailError> {
        let email = match &config.email {
            Some(email_config) => EmailService::new(email_config)?,
            None => EmailService::log_only(),
        };
        Ok(Self::with_parts(config, pool, email, Arc::new(AcceptingVerifier)))
    }

    /// Assemble state from explicit parts.
    #[must_use]
    pub fn with_parts(
        config: ApiConfig,
        pool: PgPool,
        email: EmailService,
        verifier: Arc<dyn DomainVerifier>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                email,
                verifier,
                storefronts: StorefrontResolver::new(),
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// The checker that decides whether a custom domain is verified.
    #[must_use]
    pub fn verifier(&self) -> &dyn DomainVerifier {
        self.inner.verifier.as_ref()
    }

    #[must_use]
    pub fn storefronts(&self) -> &StorefrontResolver {
        &self.inner.storefronts
    }
}
