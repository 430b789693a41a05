//! Storefront extractor.
//!
//! Resolves the vendor behind the request's host. A proxy's
//! `x-forwarded-host` takes precedence over `Host`.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::error::AppError;
use crate::models::vendor::Vendor;
use crate::state::AppState;

const FORWARDED_HOST: &str = "x-forwarded-host";

/// The vendor whose storefront this request targets.
pub struct Storefront(pub Vendor);

fn request_host(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(FORWARDED_HOST)
        .or_else(|| parts.headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v))
}

impl FromRequestParts<AppState> for Storefront {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let not_found = || AppError::NotFound("Storefront not found".to_string());
        let host = request_host(parts).ok_or_else(not_found)?;

        state
            .storefronts()
            .resolve(state.pool(), host)
            .await?
            .map(Self)
            .ok_or_else(not_found)
    }
}
