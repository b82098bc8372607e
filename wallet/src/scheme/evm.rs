use alloy::{
    primitives::Address,
    signers::{Signature, SignerSync, local::PrivateKeySigner},
};
use anyhow::Result;

/// Verify an EIP-191 personal-sign signature over `message` and check the
/// recovered address against the claimed one.
///
/// Returns false for any parse or recovery failure, the caller only ever
/// learns pass/fail.
pub fn verify(message: &str, signature: &str, address: &str) -> bool {
    let Ok(signature) = signature.parse::<Signature>() else {
        return false;
    };
    let Ok(expected) = address.parse::<Address>() else {
        return false;
    };

    match signature.recover_address_from_msg(message.as_bytes()) {
        Ok(recovered) => recovered == expected,
        Err(_) => false,
    }
}

/// Sign `message` with the EIP-191 personal-sign scheme, hex-encoded with
/// a 0x prefix. Counterpart of [`verify`], used by tooling and tests.
pub fn sign(message: &str, signer: &PrivateKeySigner) -> Result<String> {
    let signature = signer.sign_message_sync(message.as_bytes())?;
    Ok(format!("0x{}", hex::encode(signature.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let signer = PrivateKeySigner::random();
        let address = signer.address().to_checksum(None);

        let sig = sign("hello", &signer).unwrap();
        assert!(verify("hello", &sig, &address));
        assert!(!verify("hello!", &sig, &address));
    }

    #[test]
    fn wrong_address_fails() {
        let signer = PrivateKeySigner::random();
        let other = PrivateKeySigner::random().address().to_checksum(None);

        let sig = sign("hello", &signer).unwrap();
        assert!(!verify("hello", &sig, &other));
    }

    #[test]
    fn garbage_inputs_fail_closed() {
        assert!(!verify("hello", "not-hex", "0x0000000000000000000000000000000000000000"));
        assert!(!verify("hello", "0x00", "not-an-address"));
    }
}
