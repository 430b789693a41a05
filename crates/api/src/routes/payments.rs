//! Vendor payment methods, invoices, the transaction ledger and payouts.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use univendor_core::{InvoiceId, PaymentMethodId, PayoutId, TransactionId, VendorId};

use crate::db::RepositoryError;
use crate::db::payments::{PaymentMethodInput, PaymentRepository};
use crate::db::vendors::VendorRepository;
use crate::error::{AppError, Result};
use crate::middleware::{RequireRole, SuperAdminOnly, VendorOnly};
use crate::models::CurrentUser;
use crate::models::payment::{Invoice, PaymentMethod, Payout, Transaction};
use crate::routes::{authorize_vendor, not_found, own_vendor};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/payment-methods", get(list_methods).post(create_method))
        .route(
            "/api/payment-methods/{id}",
            put(update_method).delete(delete_method),
        )
        .route("/api/payment-methods/{id}/default", post(set_default_method))
        .route("/api/invoices", get(list_invoices))
        .route("/api/invoices/{id}", get(show_invoice))
        .route("/api/invoices/{id}/pay", post(pay_invoice))
        .route("/api/transactions", get(list_transactions))
        .route("/api/transactions/{id}/refund", post(refund))
        .route("/api/payouts", get(list_payouts).post(create_payout))
        .route("/api/payouts/{id}/complete", post(complete_payout))
}

// Payment methods

async fn owned_method(
    state: &AppState,
    user: &CurrentUser,
    id: PaymentMethodId,
) -> Result<PaymentMethod> {
    let method = PaymentRepository::new(state.pool())
        .get_method(id)
        .await?
        .ok_or_else(|| not_found("Payment method"))?;
    authorize_vendor(state, user, method.vendor_id, "Payment method").await?;
    Ok(method)
}

fn validate_method(input: &PaymentMethodInput) -> Result<()> {
    if input.label.trim().is_empty() {
        return Err(AppError::BadRequest("Label is required".to_string()));
    }
    if input
        .last4
        .as_deref()
        .is_some_and(|d| d.len() != 4 || !d.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(AppError::BadRequest("last4 must be four digits".to_string()));
    }
    Ok(())
}

pub async fn list_methods(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
) -> Result<Json<Vec<PaymentMethod>>> {
    let vendor = own_vendor(&state, &user).await?;
    Ok(Json(
        PaymentRepository::new(state.pool())
            .list_methods(vendor.id)
            .await?,
    ))
}

#[instrument(skip(state, user, body))]
pub async fn create_method(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Json(body): Json<PaymentMethodInput>,
) -> Result<(StatusCode, Json<PaymentMethod>)> {
    validate_method(&body)?;
    let vendor = own_vendor(&state, &user).await?;

    let method = PaymentRepository::new(state.pool())
        .create_method(vendor.id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(method)))
}

#[instrument(skip(state, user, body))]
pub async fn update_method(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<PaymentMethodId>,
    Json(body): Json<PaymentMethodInput>,
) -> Result<Json<PaymentMethod>> {
    validate_method(&body)?;
    owned_method(&state, &user, id).await?;

    Ok(Json(
        PaymentRepository::new(state.pool())
            .update_method(id, &body)
            .await?,
    ))
}

#[instrument(skip(state, user))]
pub async fn delete_method(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<PaymentMethodId>,
) -> Result<StatusCode> {
    owned_method(&state, &user, id).await?;
    PaymentRepository::new(state.pool()).delete_method(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user))]
pub async fn set_default_method(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<PaymentMethodId>,
) -> Result<Json<PaymentMethod>> {
    owned_method(&state, &user, id).await?;
    Ok(Json(
        PaymentRepository::new(state.pool())
            .set_default_method(id)
            .await?,
    ))
}

// Invoices

pub async fn list_invoices(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
) -> Result<Json<Vec<Invoice>>> {
    let vendor = own_vendor(&state, &user).await?;
    Ok(Json(
        PaymentRepository::new(state.pool())
            .list_invoices(vendor.id)
            .await?,
    ))
}

pub async fn show_invoice(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<Invoice>> {
    let invoice = PaymentRepository::new(state.pool())
        .get_invoice(id)
        .await?
        .ok_or_else(|| not_found("Invoice"))?;
    authorize_vendor(&state, &user, invoice.vendor_id, "Invoice").await?;
    Ok(Json(invoice))
}

/// Record an invoice as settled.
#[instrument(skip(state, _admin))]
pub async fn pay_invoice(
    State(state): State<AppState>,
    _admin: RequireRole<SuperAdminOnly>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<Invoice>> {
    let invoice = PaymentRepository::new(state.pool())
        .mark_invoice_paid(id, Utc::now())
        .await?;
    tracing::info!(invoice = %invoice.invoice_number, "Invoice paid");
    Ok(Json(invoice))
}

// Transactions

pub async fn list_transactions(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
) -> Result<Json<Vec<Transaction>>> {
    let vendor = own_vendor(&state, &user).await?;
    Ok(Json(
        PaymentRepository::new(state.pool())
            .list_transactions(vendor.id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub transaction: Transaction,
    pub refund: Transaction,
}

/// Refund part or all of a payment.
#[instrument(skip(state, user, body), fields(amount = %body.amount))]
pub async fn refund(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
    Path(id): Path<TransactionId>,
    Json(body): Json<RefundRequest>,
) -> Result<Json<RefundResponse>> {
    if body.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "Refund amount must be greater than zero".to_string(),
        ));
    }

    let payments = PaymentRepository::new(state.pool());
    let original = payments
        .get_transaction(id)
        .await?
        .ok_or_else(|| not_found("Transaction"))?;
    authorize_vendor(&state, &user, original.vendor_id, "Transaction").await?;

    let reason = body.reason.trim();
    let (transaction, refund) = payments
        .refund(id, body.amount, reason)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(msg) => AppError::BadRequest(msg),
            other => other.into(),
        })?;

    tracing::info!(
        transaction_id = %id,
        refund_id = %refund.id,
        status = %transaction.status,
        "Refund recorded"
    );
    Ok(Json(RefundResponse { transaction, refund }))
}

// Payouts

pub async fn list_payouts(
    State(state): State<AppState>,
    RequireRole(user, _): RequireRole<VendorOnly>,
) -> Result<Json<Vec<Payout>>> {
    let vendor = own_vendor(&state, &user).await?;
    Ok(Json(
        PaymentRepository::new(state.pool())
            .list_payouts(vendor.id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayoutRequest {
    pub vendor_id: VendorId,
    pub payment_method_id: Option<PaymentMethodId>,
    pub amount: Decimal,
    #[serde(default = "usd")]
    pub currency: String,
}

fn usd() -> String {
    "USD".to_string()
}

#[instrument(skip(state, _admin, body), fields(vendor_id = %body.vendor_id))]
pub async fn create_payout(
    State(state): State<AppState>,
    _admin: RequireRole<SuperAdminOnly>,
    Json(body): Json<CreatePayoutRequest>,
) -> Result<(StatusCode, Json<Payout>)> {
    if body.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "Payout amount must be greater than zero".to_string(),
        ));
    }
    VendorRepository::new(state.pool())
        .get(body.vendor_id)
        .await?
        .ok_or_else(|| not_found("Vendor"))?;

    let payout = PaymentRepository::new(state.pool())
        .create_payout(
            body.vendor_id,
            body.payment_method_id,
            body.amount,
            &body.currency,
        )
        .await?;
    tracing::info!(payout_id = %payout.id, amount = %payout.amount, "Payout scheduled");
    Ok((StatusCode::CREATED, Json(payout)))
}

#[derive(Debug, Deserialize)]
pub struct CompletePayoutRequest {
    pub reference: Option<String>,
}

#[instrument(skip(state, _admin, body))]
pub async fn complete_payout(
    State(state): State<AppState>,
    _admin: RequireRole<SuperAdminOnly>,
    Path(id): Path<PayoutId>,
    body: Option<Json<CompletePayoutRequest>>,
) -> Result<Json<Payout>> {
    let reference = body.and_then(|Json(b)| b.reference);
    let payout = PaymentRepository::new(state.pool())
        .complete_payout(id, reference.as_deref(), Utc::now())
        .await?;
    tracing::info!(payout_id = %id, "Payout completed");
    Ok(Json(payout))
}

#[cfg(test)]
mod tests {
    use univendor_core::PaymentMethodType;

    use super::*;

    #[test]
    fn test_validate_method() {
        let mut input = PaymentMethodInput {
            method_type: PaymentMethodType::BankAccount,
            label: "Operating account".to_string(),
            last4: Some("1234".to_string()),
            details: serde_json::Value::Null,
            is_default: false,
        };
        assert!(validate_method(&input).is_ok());

        input.last4 = Some("12a4".to_string());
        assert!(validate_method(&input).is_err());

        input.last4 = None;
        input.label = String::new();
        assert!(validate_method(&input).is_err());
    }
}
