mod amount;
mod event;

pub use amount::amount_to_pay;
pub use event::PaymentCallback;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use wallet::{CreatePayment, PaymentGateway, Rail, VerifyError};

/// Rails configure
#[derive(Debug, Serialize, Deserialize)]
pub struct RailsConfig {
    pub rails: Vec<RailConfig>,
}

/// Per-rail configure: token parameters for the provider call, the
/// credit conversion ratio, and the provider wallet key that signs our
/// callbacks. Passed in explicitly so tests can supply fixed values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailConfig {
    pub rail: String,
    pub token_address: String,
    pub token_network: String,
    pub decimals: u8,
    pub ratio: f64,
    pub wallet_public_key: String,
}

/// Purchase lifecycle. `pending` is the only non-terminal state and no
/// transition leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl PurchaseStatus {
    pub fn from_str(s: &str) -> Option<PurchaseStatus> {
        match s {
            "pending" => Some(PurchaseStatus::Pending),
            "completed" => Some(PurchaseStatus::Completed),
            "cancelled" => Some(PurchaseStatus::Cancelled),
            "failed" => Some(PurchaseStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Cancelled => "cancelled",
            PurchaseStatus::Failed => "failed",
        }
    }
}

/// A user's registered payment method, provisioned elsewhere and
/// read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: i32,
    pub user: i32,
    pub rail: String,
    /// on-chain address used as the payment sender
    pub reference: String,
}

/// A persisted purchase attempt. `reference` is the provider payment id,
/// set at creation and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i32,
    pub user: i32,
    pub method: i32,
    /// credits requested, positive integer-valued decimal string
    pub amount: String,
    /// token amount in minor units, derived
    pub pay_amount: String,
    pub rail: String,
    pub reference: String,
    pub status: PurchaseStatus,
    pub txn_hash: Option<String>,
    pub description: String,
    pub chat_id: Option<String>,
    pub message_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Fields for a new pending purchase record.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub user: i32,
    pub method: i32,
    pub amount: String,
    pub pay_amount: String,
    pub rail: String,
    pub reference: String,
    pub description: String,
    pub chat_id: Option<String>,
    pub message_id: Option<String>,
}

/// Result of the conditional pending -> terminal transition.
#[derive(Debug)]
pub enum Settlement {
    Applied(Purchase),
    NotPending,
    NotFound,
}

/// Main storage interface for the credit core.
///
/// `settle_purchase` carries the one safety-critical contract: the status
/// update must be conditional on the record still being `pending`, and
/// when the new status is `completed` the matching `purchase` ledger entry
/// (+amount credits, reference = purchase id) must land in the same atomic
/// unit as the status write. Two concurrent settles of one reference must
/// therefore produce exactly one ledger entry.
pub trait CreditStorage: Send + Sync + 'static {
    fn payment_method(
        &self,
        user: i32,
        method: i32,
    ) -> impl Future<Output = anyhow::Result<Option<PaymentMethod>>> + Send;
    fn payment_methods(
        &self,
        user: i32,
    ) -> impl Future<Output = anyhow::Result<Vec<PaymentMethod>>> + Send;
    fn create_purchase(
        &self,
        purchase: NewPurchase,
    ) -> impl Future<Output = anyhow::Result<Purchase>> + Send;
    fn purchase(
        &self,
        id: i32,
        user: i32,
    ) -> impl Future<Output = anyhow::Result<Option<Purchase>>> + Send;
    fn settle_purchase(
        &self,
        reference: &str,
        status: PurchaseStatus,
        txn_hash: Option<String>,
    ) -> impl Future<Output = anyhow::Result<Settlement>> + Send;
    fn balance(&self, user: i32) -> impl Future<Output = anyhow::Result<i64>> + Send;
    /// Append a negative `spend` entry only if the balance is positive,
    /// as one atomic decrement-if-positive. Concurrent spends for one
    /// user must serialize so two of them cannot both observe the same
    /// positive balance. Returns whether it applied.
    fn spend(
        &self,
        user: i32,
        amount: i64,
        reference: &str,
        description: &str,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;
}

/// Credit core error taxonomy, mapped to response codes at the edge.
#[derive(Debug)]
pub enum CreditError {
    /// credits are not a positive integer-valued decimal string
    InvalidAmount(String),
    /// payment method rail outside evm/xrp
    UnsupportedRail(String),
    /// callback carried an event name this core does not handle
    UnknownEvent(String),
    /// callback body did not match the documented shape
    InvalidPayload(String),
    /// callback authentication failed
    Signature(VerifyError),
    MethodNotFound,
    PurchaseNotFound,
    /// reconcile hit a record already in a terminal state; the safe
    /// outcome of a duplicate delivery
    NotPending,
    /// rail has no configuration entry
    Misconfigured(&'static str),
    /// provider unreachable or malformed response
    Gateway(anyhow::Error),
    /// persistence failure, retryable by the caller
    Storage(anyhow::Error),
}

impl CreditError {
    pub fn message(&self) -> String {
        match self {
            CreditError::InvalidAmount(s) => format!("invalid credit amount: {}", s),
            CreditError::UnsupportedRail(s) => format!("unsupported payment method: {}", s),
            CreditError::UnknownEvent(s) => format!("unknown event name: {}", s),
            CreditError::InvalidPayload(s) => format!("invalid payload: {}", s),
            CreditError::Signature(e) => e.message().to_owned(),
            CreditError::MethodNotFound => "payment method not found".to_owned(),
            CreditError::PurchaseNotFound => "purchase not found".to_owned(),
            CreditError::NotPending => "purchase is not pending".to_owned(),
            CreditError::Misconfigured(s) => s.to_string(),
            CreditError::Gateway(_) => "payment provider failure".to_owned(),
            CreditError::Storage(_) => "storage failure".to_owned(),
        }
    }
}

/// A quoted purchase: the resolved method, its rail, and the token amount
/// the user would pay. Produced without side effects.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub method: PaymentMethod,
    pub rail: Rail,
    pub pay_amount: String,
}

struct RailTokens {
    token_address: String,
    token_network: String,
    decimals: u8,
    ratio: f64,
    wallet_public_key: String,
}

/// The purchase orchestrator: drives a credit purchase from initiation
/// through the provider to ledger settlement, and reconciles the
/// asynchronous signed callbacks. Holds no state across calls beyond
/// configuration and its collaborators.
pub struct CreditService<S: CreditStorage, G: PaymentGateway> {
    storage: S,
    gateway: G,
    rails: HashMap<Rail, RailTokens>,
    tolerance_ms: i64,
}

impl<S: CreditStorage, G: PaymentGateway> CreditService<S, G> {
    pub fn new(storage: S, gateway: G, config: RailsConfig) -> anyhow::Result<Self> {
        let mut rails = HashMap::new();
        for rail in config.rails {
            let key = Rail::from_str(&rail.rail)
                .ok_or(anyhow::anyhow!("unknown rail: {}", rail.rail))?;
            rails.insert(
                key,
                RailTokens {
                    token_address: rail.token_address,
                    token_network: rail.token_network,
                    decimals: rail.decimals,
                    ratio: rail.ratio,
                    wallet_public_key: rail.wallet_public_key,
                },
            );
        }

        Ok(Self {
            storage,
            gateway,
            rails,
            tolerance_ms: wallet::DEFAULT_TOLERANCE_MS,
        })
    }

    fn rail(&self, rail: Rail) -> Result<&RailTokens, CreditError> {
        self.rails
            .get(&rail)
            .ok_or(CreditError::Misconfigured("wallet is not setup for rail"))
    }

    /// Resolve a payment method and quote the token amount for a credit
    /// purchase. No side effects; initiate re-derives the same quote.
    pub async fn quote(
        &self,
        user: i32,
        method: i32,
        credits: &str,
    ) -> Result<Quote, CreditError> {
        let method = self
            .storage
            .payment_method(user, method)
            .await
            .map_err(CreditError::Storage)?
            .ok_or(CreditError::MethodNotFound)?;
        let rail =
            Rail::from_str(&method.rail).ok_or(CreditError::UnsupportedRail(method.rail.clone()))?;
        let tokens = self.rail(rail)?;
        let pay_amount = amount_to_pay(credits, tokens.ratio, tokens.decimals)?;

        Ok(Quote {
            method,
            rail,
            pay_amount,
        })
    }

    /// Create a payment intent with the provider and persist the pending
    /// purchase record with the provider id as its reference.
    ///
    /// Deliberately not idempotent: each call is its own purchase attempt
    /// and de-duplication stays with the caller.
    pub async fn initiate(
        &self,
        user: i32,
        method: i32,
        credits: &str,
        chat_id: Option<String>,
        message_id: Option<String>,
    ) -> Result<Purchase, CreditError> {
        let quote = self.quote(user, method, credits).await?;
        let tokens = self.rail(quote.rail)?;
        let description = format!("Purchase of {} credits", credits.trim());

        let intent = self
            .gateway
            .create_payment(CreatePayment {
                from: quote.method.reference.clone(),
                amount: quote.pay_amount.clone(),
                token_address: tokens.token_address.clone(),
                token_network: tokens.token_network.clone(),
                description: description.clone(),
                expired_in_minutes: None,
            })
            .await
            .map_err(CreditError::Gateway)?;

        let purchase = self
            .storage
            .create_purchase(NewPurchase {
                user,
                method: quote.method.id,
                amount: credits.trim().to_owned(),
                pay_amount: quote.pay_amount,
                rail: quote.rail.as_str().to_owned(),
                reference: intent.id.clone(),
                description,
                chat_id,
                message_id,
            })
            .await
            .map_err(CreditError::Storage)?;

        tracing::info!(
            "purchase created: {}, payment: {}, rail: {}",
            purchase.id,
            intent.id,
            purchase.rail
        );
        Ok(purchase)
    }

    /// Process a provider callback: verify the signature over the raw
    /// body, parse it, and drive the pending record to its terminal
    /// state. Only the first delivery for a pending record has any
    /// effect; duplicates report `NotPending`.
    pub async fn reconcile(
        &self,
        rail: Rail,
        signature: Option<&str>,
        body: &Value,
    ) -> Result<Purchase, CreditError> {
        let tokens = self.rail(rail)?;

        if let Err(err) = wallet::verify_callback(
            signature,
            body,
            &tokens.wallet_public_key,
            rail,
            self.tolerance_ms,
        ) {
            tracing::error!("callback {}: {}", rail.as_str(), err.message());
            return Err(CreditError::Signature(err));
        }

        let callback: PaymentCallback = serde_json::from_value(body.clone())
            .map_err(|err| CreditError::InvalidPayload(err.to_string()))?;
        let status = callback
            .outcome()
            .ok_or(CreditError::UnknownEvent(callback.event_name.clone()))?;
        let txn_hash = match status {
            PurchaseStatus::Completed => callback.txn_hash.clone(),
            _ => None,
        };

        let settled = self
            .storage
            .settle_purchase(&callback.payment_id, status, txn_hash)
            .await
            .map_err(CreditError::Storage)?;

        match settled {
            Settlement::Applied(purchase) => {
                tracing::info!(
                    "purchase with payment: {} updated to status: {}",
                    callback.payment_id,
                    status.as_str()
                );
                Ok(purchase)
            }
            Settlement::NotPending => Err(CreditError::NotPending),
            Settlement::NotFound => Err(CreditError::PurchaseNotFound),
        }
    }

    /// Charge `amount` credits for a completed unit of assistant work.
    /// Applied only while the balance is positive, as a single atomic
    /// decrement-if-positive.
    pub async fn spend(
        &self,
        user: i32,
        amount: i64,
        reference: &str,
        description: &str,
    ) -> Result<bool, CreditError> {
        if amount <= 0 {
            return Err(CreditError::InvalidAmount(amount.to_string()));
        }
        self.storage
            .spend(user, amount, reference, description)
            .await
            .map_err(CreditError::Storage)
    }

    pub async fn balance(&self, user: i32) -> Result<i64, CreditError> {
        self.storage.balance(user).await.map_err(CreditError::Storage)
    }

    pub async fn purchase(&self, id: i32, user: i32) -> Result<Purchase, CreditError> {
        self.storage
            .purchase(id, user)
            .await
            .map_err(CreditError::Storage)?
            .ok_or(CreditError::PurchaseNotFound)
    }

    pub async fn payment_methods(&self, user: i32) -> Result<Vec<PaymentMethod>, CreditError> {
        self.storage
            .payment_methods(user)
            .await
            .map_err(CreditError::Storage)
    }
}
