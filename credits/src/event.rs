use crate::PurchaseStatus;
use serde::Deserialize;

/// Callback payload the payment provider posts to the webhook after the
/// signature has been verified over the raw body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    pub payment_id: String,
    #[serde(default)]
    pub txn_hash: Option<String>,
    pub event_name: String,
    pub event_type: String,
    pub event_id: String,
    /// ms epoch, also covered by the signature freshness check
    pub timestamp: i64,
}

impl PaymentCallback {
    /// Map the provider event name onto the terminal purchase state.
    /// Unknown event names are a validation error at the edge.
    pub fn outcome(&self) -> Option<PurchaseStatus> {
        match self.event_name.as_str() {
            "payment-success" => Some(PurchaseStatus::Completed),
            "payment-cancelled" => Some(PurchaseStatus::Cancelled),
            "payment-failed" => Some(PurchaseStatus::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_camel_case_payload() {
        let callback: PaymentCallback = serde_json::from_value(json!({
            "paymentId": "pay_123",
            "txnHash": "0xabc",
            "eventName": "payment-success",
            "eventType": "payment",
            "eventId": "evt_1",
            "timestamp": 1700000000000i64,
        }))
        .unwrap();

        assert_eq!(callback.payment_id, "pay_123");
        assert_eq!(callback.txn_hash.as_deref(), Some("0xabc"));
        assert_eq!(callback.outcome(), Some(PurchaseStatus::Completed));
    }

    #[test]
    fn txn_hash_is_optional() {
        let callback: PaymentCallback = serde_json::from_value(json!({
            "paymentId": "pay_123",
            "eventName": "payment-cancelled",
            "eventType": "payment",
            "eventId": "evt_2",
            "timestamp": 1700000000000i64,
        }))
        .unwrap();

        assert_eq!(callback.txn_hash, None);
        assert_eq!(callback.outcome(), Some(PurchaseStatus::Cancelled));
    }

    #[test]
    fn unknown_event_has_no_outcome() {
        let callback: PaymentCallback = serde_json::from_value(json!({
            "paymentId": "pay_123",
            "eventName": "payment-refunded",
            "eventType": "payment",
            "eventId": "evt_3",
            "timestamp": 1700000000000i64,
        }))
        .unwrap();

        assert_eq!(callback.outcome(), None);
    }
}
