//! Vendor onboarding through storefront checkout and refunds.
//!
//! These tests require a migrated database and a running API server; see
//! the crate docs. Run with: cargo test -p univendor-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use univendor_integration_tests::{
    FORWARDED_HOST, TestContext, expect_status, money, shipping_address, unique_email,
};

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_second_store_is_a_conflict() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();
    ctx.create_vendor(&client).await;

    let resp = client
        .post(ctx.url("/api/vendors"))
        .json(&json!({ "storeName": "Another" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_storefront_resolves_by_host() {
    let ctx = TestContext::new().await;
    let vendor_client = TestContext::client();
    let (vendor, host) = ctx.create_vendor(&vendor_client).await;
    let product = ctx.create_product(&vendor_client, "19.99", 5).await;

    let shopper = TestContext::client();
    let resp = shopper
        .get(ctx.url("/api/storefront"))
        .header(FORWARDED_HOST, format!("{}:443", host.to_uppercase()))
        .send()
        .await
        .unwrap();
    let store = expect_status(resp, StatusCode::OK).await;
    assert_eq!(store["id"], vendor["id"]);

    let resp = shopper
        .get(ctx.url("/api/storefront/products"))
        .header(FORWARDED_HOST, host.as_str())
        .send()
        .await
        .unwrap();
    let products = expect_status(resp, StatusCode::OK).await;
    assert!(
        products
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["id"] == product["id"])
    );

    let resp = shopper
        .get(ctx.url("/api/storefront"))
        .header(FORWARDED_HOST, "unknown.example.net")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_guest_checkout_and_refund() {
    let ctx = TestContext::new().await;
    let vendor_client = TestContext::client();
    ctx.create_vendor(&vendor_client).await;
    let product = ctx.create_product(&vendor_client, "20.00", 3).await;

    // Guest cart: the session cookie carries the guest token.
    let guest = TestContext::client();
    let resp = guest
        .post(ctx.url("/api/cart/items"))
        .json(&json!({ "productId": product["id"], "quantity": 2 }))
        .send()
        .await
        .unwrap();
    let cart = expect_status(resp, StatusCode::OK).await;
    assert!((money(&cart["subtotal"]) - 40.0).abs() < 1e-9);
    assert!((money(&cart["tax"]) - 3.30).abs() < 1e-9);
    assert!((money(&cart["total"]) - 43.30).abs() < 1e-9);

    // More than the remaining stock.
    let resp = guest
        .post(ctx.url("/api/cart/items"))
        .json(&json!({ "productId": product["id"], "quantity": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let shopper_email = unique_email("buyer");
    let resp = guest
        .post(ctx.url("/api/checkout"))
        .json(&json!({
            "email": shopper_email,
            "firstName": "Ada",
            "lastName": "Lovelace",
            "shippingAddress": shipping_address(),
        }))
        .send()
        .await
        .unwrap();
    let order = expect_status(resp, StatusCode::OK).await;
    assert!(order["orderNumber"].as_str().unwrap().starts_with("ORD-"));
    assert_eq!(order["status"], "pending");
    assert_eq!(order["items"].as_array().unwrap().len(), 1);

    let resp = guest.get(ctx.url("/api/cart")).send().await.unwrap();
    let cart = expect_status(resp, StatusCode::OK).await;
    assert!(cart["items"].as_array().unwrap().is_empty());

    // Stock was decremented.
    let resp = vendor_client
        .get(ctx.url(&format!("/api/products/{}", product["id"])))
        .send()
        .await
        .unwrap();
    let detail = expect_status(resp, StatusCode::OK).await;
    assert_eq!(detail["stockQuantity"], 1);

    // The vendor settles the order, which completes the pending payment.
    let resp = vendor_client
        .patch(ctx.url(&format!("/api/orders/{}", order["id"])))
        .json(&json!({ "paymentStatus": "paid", "status": "processing" }))
        .send()
        .await
        .unwrap();
    expect_status(resp, StatusCode::OK).await;

    let resp = vendor_client
        .get(ctx.url(&format!("/api/orders/{}/transactions", order["id"])))
        .send()
        .await
        .unwrap();
    let transactions = expect_status(resp, StatusCode::OK).await;
    let payment = transactions
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["type"] == "payment")
        .unwrap()
        .clone();
    assert_eq!(payment["status"], "completed");

    let refund_url = ctx.url(&format!("/api/transactions/{}/refund", payment["id"]));
    let resp = vendor_client
        .post(&refund_url)
        .json(&json!({ "amount": "10.00", "reason": "Damaged box" }))
        .send()
        .await
        .unwrap();
    let body = expect_status(resp, StatusCode::OK).await;
    assert_eq!(body["transaction"]["status"], "partial_refund");
    assert_eq!(body["refund"]["type"], "refund");
    assert_eq!(
        body["refund"]["metadata"]["original_transaction_id"],
        payment["id"]
    );

    // Over-refunding is rejected.
    let resp = vendor_client
        .post(&refund_url)
        .json(&json!({ "amount": "100.00", "reason": "Too much" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_other_vendors_products_are_hidden() {
    let ctx = TestContext::new().await;
    let first = TestContext::client();
    ctx.create_vendor(&first).await;
    let product = ctx.create_product(&first, "5.00", 1).await;

    let second = TestContext::client();
    ctx.create_vendor(&second).await;

    let resp = second
        .delete(ctx.url(&format!("/api/products/{}", product["id"])))
        .send()
        .await
        .unwrap();
    let body = expect_status(resp, StatusCode::NOT_FOUND).await;
    assert_eq!(body["message"], "Product not found");
}

/// Add `quantity` of `product` to the cart held by `client`'s session.
async fn add_to_cart(ctx: &TestContext, client: &reqwest::Client, product: &Value, quantity: i64) {
    let resp = client
        .post(ctx.url("/api/cart/items"))
        .json(&json!({ "productId": product["id"], "quantity": quantity }))
        .send()
        .await
        .unwrap();
    expect_status(resp, StatusCode::OK).await;
}

/// Quantity per product id in `client`'s cart.
async fn cart_lines(ctx: &TestContext, client: &reqwest::Client) -> Vec<(Value, i64)> {
    let resp = client.get(ctx.url("/api/cart")).send().await.unwrap();
    let cart = expect_status(resp, StatusCode::OK).await;
    cart["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| (item["productId"].clone(), item["quantity"].as_i64().unwrap()))
        .collect()
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_guest_cart_merges_on_login() {
    let ctx = TestContext::new().await;
    let vendor_client = TestContext::client();
    ctx.create_vendor(&vendor_client).await;
    let product = ctx.create_product(&vendor_client, "8.00", 5).await;
    let shopper = unique_email("merge");

    // No user cart yet: the guest cart is adopted.
    let first = TestContext::client();
    add_to_cart(&ctx, &first, &product, 2).await;
    ctx.login(&first, &shopper, true).await;
    assert_eq!(cart_lines(&ctx, &first).await, vec![(product["id"].clone(), 2)]);

    // Same product again from another device: quantities are summed.
    let second = TestContext::client();
    add_to_cart(&ctx, &second, &product, 1).await;
    ctx.login(&second, &shopper, true).await;
    assert_eq!(cart_lines(&ctx, &second).await, vec![(product["id"].clone(), 3)]);

    // The sum would pass the 5 in stock, so the line is capped.
    let third = TestContext::client();
    add_to_cart(&ctx, &third, &product, 3).await;
    ctx.login(&third, &shopper, true).await;
    assert_eq!(cart_lines(&ctx, &third).await, vec![(product["id"].clone(), 5)]);

    // A guest cart from another store replaces the user's lines.
    let other_vendor = TestContext::client();
    ctx.create_vendor(&other_vendor).await;
    let other_product = ctx.create_product(&other_vendor, "3.50", 4).await;

    let fourth = TestContext::client();
    add_to_cart(&ctx, &fourth, &other_product, 1).await;
    ctx.login(&fourth, &shopper, true).await;
    assert_eq!(
        cart_lines(&ctx, &fourth).await,
        vec![(other_product["id"].clone(), 1)]
    );
}
