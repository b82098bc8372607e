use crate::AppState;
use crate::error::{ApiError, Result};
use crate::models::{PROPOSAL_TTL_SECS, Proposal, store_proposal, take_proposal};
use axum::extract::{Json, Path, Query, State};
use axum::http::HeaderMap;
use credits::Purchase;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use wallet::Rail;

/// Signature header the payment provider sets on every callback.
const SIGNATURE_HEADER: &str = "x-callback-signature";

#[derive(Deserialize)]
pub struct ApikeyAuth {
    apikey: String,
}

fn auth(app: &AppState, auth: &ApikeyAuth) -> Result<()> {
    if auth.apikey != app.apikey {
        return Err(ApiError::UserAuth);
    }
    Ok(())
}

/// Inbound payment provider webhook. Authenticated by its signature, not
/// by the apikey; the orchestrator verifies it before touching any state.
pub async fn payment_callback(
    State(app): State<Arc<AppState>>,
    Path(rail): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Purchase>> {
    let rail = Rail::from_str(&rail).ok_or(ApiError::Invalid("invalid type".to_owned()))?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    info!(
        "[callback] {} / sig:{} / body:{}",
        rail.as_str(),
        signature.unwrap_or("-"),
        body
    );

    let purchase = app.service.reconcile(rail, signature, &body).await?;
    Ok(Json(purchase))
}

#[derive(Deserialize)]
pub struct ProposePurchase {
    user: i32,
    method: i32,
    credits: String,
    chat_id: Option<String>,
    message_id: Option<String>,
}

#[derive(Serialize)]
pub struct ProposalResponse {
    proposal: String,
    rail: String,
    credits: String,
    pay_amount: String,
    expires_in: u64,
}

/// First phase of the human-in-the-loop purchase: validate and quote, then
/// park the proposal until the user decides. No provider call, no record.
pub async fn propose_purchase(
    State(app): State<Arc<AppState>>,
    Query(key): Query<ApikeyAuth>,
    Json(data): Json<ProposePurchase>,
) -> Result<Json<ProposalResponse>> {
    auth(&app, &key)?;

    let quote = app.service.quote(data.user, data.method, &data.credits).await?;
    let proposal = Proposal {
        user: data.user,
        method: data.method,
        credits: data.credits.trim().to_owned(),
        pay_amount: quote.pay_amount.clone(),
        rail: quote.rail.as_str().to_owned(),
        chat_id: data.chat_id,
        message_id: data.message_id,
    };
    let id = store_proposal(&app.redis, &proposal).await?;

    Ok(Json(ProposalResponse {
        proposal: id,
        rail: proposal.rail,
        credits: proposal.credits,
        pay_amount: proposal.pay_amount,
        expires_in: PROPOSAL_TTL_SECS,
    }))
}

#[derive(Deserialize)]
pub struct ConfirmPurchase {
    proposal: String,
}

/// Second phase: consume the proposal (single use) and run the purchase.
pub async fn confirm_purchase(
    State(app): State<Arc<AppState>>,
    Query(key): Query<ApikeyAuth>,
    Json(data): Json<ConfirmPurchase>,
) -> Result<Json<Purchase>> {
    auth(&app, &key)?;

    let proposal = take_proposal(&app.redis, &data.proposal)
        .await?
        .ok_or(ApiError::NotFound)?;
    let purchase = app
        .service
        .initiate(
            proposal.user,
            proposal.method,
            &proposal.credits,
            proposal.chat_id,
            proposal.message_id,
        )
        .await?;

    Ok(Json(purchase))
}

#[derive(Deserialize)]
pub struct PurchaseAuth {
    apikey: String,
    user: i32,
}

/// Owner-scoped purchase lookup, polled by the UI after a confirm.
pub async fn get_purchase(
    State(app): State<Arc<AppState>>,
    Query(key): Query<PurchaseAuth>,
    Path(id): Path<i32>,
) -> Result<Json<Purchase>> {
    if key.apikey != app.apikey {
        return Err(ApiError::UserAuth);
    }

    let purchase = app.service.purchase(id, key.user).await?;
    Ok(Json(purchase))
}

#[derive(Serialize)]
pub struct BalanceResponse {
    balance: i64,
}

pub async fn get_credits(
    State(app): State<Arc<AppState>>,
    Query(key): Query<ApikeyAuth>,
    Path(user): Path<i32>,
) -> Result<Json<BalanceResponse>> {
    auth(&app, &key)?;

    let balance = app.service.balance(user).await?;
    Ok(Json(BalanceResponse { balance }))
}

#[derive(Deserialize)]
pub struct SpendCredits {
    amount: i64,
    reference: String,
    description: Option<String>,
}

#[derive(Serialize)]
pub struct SpendResponse {
    applied: bool,
    balance: i64,
}

/// Charge credits for a completed unit of assistant work. A non-positive
/// balance makes this a no-op rather than an error.
pub async fn spend_credits(
    State(app): State<Arc<AppState>>,
    Query(key): Query<ApikeyAuth>,
    Path(user): Path<i32>,
    Json(data): Json<SpendCredits>,
) -> Result<Json<SpendResponse>> {
    auth(&app, &key)?;

    let description = data.description.unwrap_or("Assistant usage".to_owned());
    let applied = app
        .service
        .spend(user, data.amount, &data.reference, &description)
        .await?;
    let balance = app.service.balance(user).await?;

    Ok(Json(SpendResponse { applied, balance }))
}

pub async fn list_methods(
    State(app): State<Arc<AppState>>,
    Query(key): Query<ApikeyAuth>,
    Path(user): Path<i32>,
) -> Result<Json<Vec<credits::PaymentMethod>>> {
    auth(&app, &key)?;

    let methods = app.service.payment_methods(user).await?;
    Ok(Json(methods))
}
