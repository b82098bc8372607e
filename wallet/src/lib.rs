mod scheme;
pub use scheme::evm;
pub use scheme::xrp;

mod client;
pub use client::{CreatePayment, PaymentGateway, PaymentIntent, PaymentStatus, WalletApi};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default replay window for callback signatures: 60 seconds.
pub const DEFAULT_TOLERANCE_MS: i64 = 60 * 1000;

/// A payment rail: the network technology + signature scheme pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rail {
    Evm,
    Xrp,
}

impl Rail {
    pub fn from_str(s: &str) -> Option<Rail> {
        match s.to_lowercase().as_str() {
            "evm" => Some(Rail::Evm),
            "xrp" => Some(Rail::Xrp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rail::Evm => "evm",
            Rail::Xrp => "xrp",
        }
    }
}

/// Why a callback signature was rejected. The cryptographic failure case
/// carries no detail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    /// No `x-callback-signature` value was provided
    MissingSignature,
    /// Payload has no numeric `timestamp` field
    MissingTimestamp,
    /// Timestamp is outside the tolerance window
    Expired,
    /// The cryptographic check failed
    InvalidSignature,
}

impl VerifyError {
    pub fn message(&self) -> &'static str {
        match self {
            VerifyError::MissingSignature => "Signature is not provided",
            VerifyError::MissingTimestamp => "Timestamp is missing from payload",
            VerifyError::Expired => "Timestamp is too old",
            VerifyError::InvalidSignature => "Signature is invalid",
        }
    }
}

/// Build the canonical message for a callback payload: every field except
/// `timestamp`, keys sorted, joined as `key=<compact JSON>` pairs with `&`,
/// then `&timestamp=<timestamp>` appended. Signer and verifier must agree
/// byte for byte, so nothing here depends on map ordering.
pub fn canonical_message(payload: &Map<String, Value>) -> Result<(String, i64), VerifyError> {
    let timestamp = payload
        .get("timestamp")
        .and_then(Value::as_i64)
        .ok_or(VerifyError::MissingTimestamp)?;

    let mut keys: Vec<&String> = payload.keys().filter(|k| *k != "timestamp").collect();
    keys.sort();

    let pairs: Vec<String> = keys
        .iter()
        .map(|k| format!("{}={}", k, payload[k.as_str()]))
        .collect();

    Ok((format!("{}&timestamp={}", pairs.join("&"), timestamp), timestamp))
}

/// Verify an inbound payment callback against the provider wallet key for
/// the given rail. Checks presence, freshness (`tolerance_ms` around now),
/// then the rail's native signature scheme over the canonical message.
/// Pure except for reading the clock; this gates a financial webhook, so
/// it performs no I/O and leaks no detail about a failed check.
pub fn verify_callback(
    signature: Option<&str>,
    payload: &Value,
    wallet_public_key: &str,
    rail: Rail,
    tolerance_ms: i64,
) -> Result<(), VerifyError> {
    let signature = signature
        .filter(|s| !s.is_empty())
        .ok_or(VerifyError::MissingSignature)?;

    let fields = payload.as_object().ok_or(VerifyError::MissingTimestamp)?;
    let (message, timestamp) = canonical_message(fields)?;

    let now = Utc::now().timestamp_millis();
    if (now - timestamp).abs() > tolerance_ms {
        return Err(VerifyError::Expired);
    }

    let verified = match rail {
        Rail::Evm => evm::verify(&message, signature, wallet_public_key),
        Rail::Xrp => xrp::verify(&message, signature, wallet_public_key),
    };

    if verified {
        Ok(())
    } else {
        Err(VerifyError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::{SignerSync, local::PrivateKeySigner};
    use serde_json::json;

    fn callback_payload(timestamp: i64) -> Value {
        json!({
            "paymentId": "pay_123",
            "eventName": "payment-success",
            "eventType": "payment",
            "eventId": "evt_1",
            "txnHash": "0xabc",
            "timestamp": timestamp,
        })
    }

    #[test]
    fn canonical_message_sorts_and_appends_timestamp() {
        let payload = json!({
            "b": "two",
            "a": 1,
            "timestamp": 1700000000000i64,
        });
        let (message, ts) = canonical_message(payload.as_object().unwrap()).unwrap();
        assert_eq!(message, "a=1&b=\"two\"&timestamp=1700000000000");
        assert_eq!(ts, 1700000000000);
    }

    #[test]
    fn canonical_message_requires_timestamp() {
        let payload = json!({ "a": 1 });
        let err = canonical_message(payload.as_object().unwrap()).unwrap_err();
        assert_eq!(err, VerifyError::MissingTimestamp);
    }

    #[test]
    fn evm_signature_roundtrip() {
        let signer = PrivateKeySigner::random();
        let address = signer.address().to_checksum(None);
        let payload = callback_payload(Utc::now().timestamp_millis());

        let (message, _) = canonical_message(payload.as_object().unwrap()).unwrap();
        let sig = signer.sign_message_sync(message.as_bytes()).unwrap();
        let sig = format!("0x{}", hex::encode(sig.as_bytes()));

        assert!(
            verify_callback(Some(&sig), &payload, &address, Rail::Evm, DEFAULT_TOLERANCE_MS)
                .is_ok()
        );
    }

    #[test]
    fn evm_signature_rejects_tampered_payload() {
        let signer = PrivateKeySigner::random();
        let address = signer.address().to_checksum(None);
        let payload = callback_payload(Utc::now().timestamp_millis());

        let (message, _) = canonical_message(payload.as_object().unwrap()).unwrap();
        let sig = signer.sign_message_sync(message.as_bytes()).unwrap();
        let sig = format!("0x{}", hex::encode(sig.as_bytes()));

        let mut tampered = payload.clone();
        tampered["paymentId"] = json!("pay_999");
        assert_eq!(
            verify_callback(Some(&sig), &tampered, &address, Rail::Evm, DEFAULT_TOLERANCE_MS),
            Err(VerifyError::InvalidSignature)
        );
    }

    #[test]
    fn stale_timestamp_is_rejected_before_crypto() {
        let payload = callback_payload(Utc::now().timestamp_millis() - 5 * 60 * 1000);
        // signature is garbage, the freshness gate fires first
        assert_eq!(
            verify_callback(Some("0xdead"), &payload, "0x00", Rail::Evm, DEFAULT_TOLERANCE_MS),
            Err(VerifyError::Expired)
        );
    }

    #[test]
    fn missing_signature_is_rejected() {
        let payload = callback_payload(Utc::now().timestamp_millis());
        assert_eq!(
            verify_callback(None, &payload, "0x00", Rail::Evm, DEFAULT_TOLERANCE_MS),
            Err(VerifyError::MissingSignature)
        );
        assert_eq!(
            verify_callback(Some(""), &payload, "0x00", Rail::Evm, DEFAULT_TOLERANCE_MS),
            Err(VerifyError::MissingSignature)
        );
    }

    #[test]
    fn xrp_ed25519_roundtrip() {
        use ed25519_dalek::{Signer, SigningKey};

        let key = SigningKey::from_bytes(&[7u8; 32]);
        let public = format!("ED{}", hex::encode(key.verifying_key().to_bytes()));
        let payload = callback_payload(Utc::now().timestamp_millis());

        let (message, _) = canonical_message(payload.as_object().unwrap()).unwrap();
        let sig = hex::encode(key.sign(message.as_bytes()).to_bytes());

        assert!(
            verify_callback(Some(&sig), &payload, &public, Rail::Xrp, DEFAULT_TOLERANCE_MS)
                .is_ok()
        );

        let mut tampered = payload.clone();
        tampered["eventName"] = json!("payment-failed");
        assert_eq!(
            verify_callback(Some(&sig), &tampered, &public, Rail::Xrp, DEFAULT_TOLERANCE_MS),
            Err(VerifyError::InvalidSignature)
        );
    }
}
