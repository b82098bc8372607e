use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for the provider's create-payment call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayment {
    pub from: String,
    pub amount: String,
    pub token_address: String,
    pub token_network: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_in_minutes: Option<i64>,
}

/// Provider-side payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

/// A created payment intent as the provider reports it. Deserialization is
/// the validation: a response missing any of these fields is malformed and
/// the whole call fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub status: PaymentStatus,
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
    pub from: String,
    pub to: String,
    pub token_network: String,
    pub token_address: String,
    pub description: String,
    pub metadata: Value,
    pub txn_hash: Option<String>,
    pub callback_url: Option<String>,
    pub amount: String,
}

/// Outbound boundary to the payment provider. The orchestrator only needs
/// this one call, keeping it a trait lets tests run against a mock.
pub trait PaymentGateway: Send + Sync + 'static {
    fn create_payment(&self, req: CreatePayment) -> impl Future<Output = Result<PaymentIntent>> + Send;
}

/// HTTP client for the external wallet/payment service. Holds one outbound
/// credential per rail; the credential is selected by the token network of
/// the request.
pub struct WalletApi {
    base: String,
    evm_key: String,
    xrp_key: String,
    client: reqwest::Client,
}

impl WalletApi {
    pub fn new(base: &str, evm_key: &str, xrp_key: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_owned(),
            evm_key: evm_key.to_owned(),
            xrp_key: xrp_key.to_owned(),
            client: reqwest::Client::new(),
        }
    }
}

impl PaymentGateway for WalletApi {
    async fn create_payment(&self, req: CreatePayment) -> Result<PaymentIntent> {
        let key = if req.token_network.contains("xrpl") {
            &self.xrp_key
        } else {
            &self.evm_key
        };

        let response = self
            .client
            .post(format!("{}/agent/payment", self.base))
            .header("X-WALLET-KEY", key)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        tracing::debug!("create payment: {} / {}", status, body);

        serde_json::from_value(body).map_err(|err| anyhow!("malformed payment response: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intent_json() -> Value {
        json!({
            "status": "PENDING",
            "id": "pay_123",
            "createdAt": "2024-05-01T00:00:00Z",
            "updatedAt": "2024-05-01T00:00:00Z",
            "expiredAt": "2024-05-01T01:00:00Z",
            "from": "0xsender",
            "to": "0xreceiver",
            "tokenNetwork": "11155111",
            "tokenAddress": "0xtoken",
            "description": "Purchase of 500 credits",
            "metadata": {},
            "txnHash": null,
            "callbackUrl": null,
            "amount": "5000000"
        })
    }

    #[test]
    fn intent_parses_strictly() {
        let intent: PaymentIntent = serde_json::from_value(intent_json()).unwrap();
        assert_eq!(intent.id, "pay_123");
        assert_eq!(intent.status, PaymentStatus::Pending);
        assert_eq!(intent.amount, "5000000");
    }

    #[test]
    fn malformed_response_is_rejected() {
        let mut body = intent_json();
        body.as_object_mut().unwrap().remove("id");
        assert!(serde_json::from_value::<PaymentIntent>(body).is_err());

        let mut body = intent_json();
        body["status"] = json!("SETTLED");
        assert!(serde_json::from_value::<PaymentIntent>(body).is_err());
    }

    #[test]
    fn request_body_skips_absent_expiry() {
        let req = CreatePayment {
            from: "0xsender".into(),
            amount: "5000000".into(),
            token_address: "0xtoken".into(),
            token_network: "11155111".into(),
            description: "Purchase of 500 credits".into(),
            expired_in_minutes: None,
        };
        let body = serde_json::to_value(&req).unwrap();
        assert!(body.get("expiredInMinutes").is_none());
        assert_eq!(body["tokenNetwork"], "11155111");
    }
}
