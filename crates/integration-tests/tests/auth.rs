//! Sign-in, session and impersonation flows.
//!
//! These tests require a migrated database and a running API server; see
//! the crate docs. Run with: cargo test -p univendor-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::json;

use univendor_integration_tests::{TestContext, expect_status, unique_email};

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_session_requires_login() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();

    let resp = client.get(ctx.url("/api/auth/session")).send().await.unwrap();
    let body = expect_status(resp, StatusCode::UNAUTHORIZED).await;
    assert_eq!(body["message"], "Not authenticated");
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_wrong_code_is_rejected() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();
    let email = unique_email("wrong-code");

    // No code has been issued for this address.
    let resp = client
        .post(ctx.url("/api/auth/verify-otp"))
        .json(&json!({ "email": email, "otp": "000000" }))
        .send()
        .await
        .unwrap();
    let body = expect_status(resp, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["message"], "No valid OTP found for this email");
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_login_session_logout() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();
    let email = unique_email("shopper");

    let user = ctx.login(&client, &email, true).await;
    assert_eq!(user["email"], email.as_str());
    assert_eq!(user["role"], "customer");

    let resp = client.get(ctx.url("/api/auth/session")).send().await.unwrap();
    let session = expect_status(resp, StatusCode::OK).await;
    assert_eq!(session["email"], email.as_str());
    assert_eq!(session["isImpersonated"], false);

    let resp = client.post(ctx.url("/api/auth/logout")).send().await.unwrap();
    let body = expect_status(resp, StatusCode::OK).await;
    assert_eq!(body["message"], "Logged out successfully");

    let resp = client.get(ctx.url("/api/auth/session")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_customers_cannot_reach_admin_routes() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();
    ctx.login(&client, &unique_email("shopper"), true).await;

    let resp = client.get(ctx.url("/api/admin/stats")).send().await.unwrap();
    let body = expect_status(resp, StatusCode::FORBIDDEN).await;
    assert_eq!(body["message"], "Insufficient permissions");
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_impersonation_round_trip() {
    let ctx = TestContext::new().await;

    let admin_email = unique_email("admin");
    univendor_api::db::users::UserRepository::new(&ctx.pool)
        .upsert_super_admin(
            &univendor_core::Email::parse(&admin_email).unwrap(),
            Some("Super"),
            Some("Admin"),
        )
        .await
        .unwrap();

    let shopper_client = TestContext::client();
    let shopper = ctx.login(&shopper_client, &unique_email("target"), true).await;

    let admin = TestContext::client();
    ctx.login(&admin, &admin_email, false).await;

    let resp = admin
        .post(ctx.url(&format!("/api/auth/impersonate/{}", shopper["id"])))
        .send()
        .await
        .unwrap();
    let body = expect_status(resp, StatusCode::OK).await;
    assert_eq!(body["impersonationStarted"], true);
    assert_eq!(body["user"]["id"], shopper["id"]);

    let resp = admin
        .get(ctx.url("/api/auth/impersonation-status"))
        .send()
        .await
        .unwrap();
    let status = expect_status(resp, StatusCode::OK).await;
    assert_eq!(status["isImpersonating"], true);
    assert_eq!(status["originalUser"]["email"], admin_email.as_str());

    let resp = admin.post(ctx.url("/api/auth/logout")).send().await.unwrap();
    let body = expect_status(resp, StatusCode::OK).await;
    assert_eq!(body["impersonationEnded"], true);
    assert_eq!(body["user"]["email"], admin_email.as_str());
}
