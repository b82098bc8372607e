use ed25519_dalek::{Signature as EdSignature, Verifier, VerifyingKey as EdVerifyingKey};
use k256::ecdsa::{
    Signature as EcdsaSignature, VerifyingKey as EcdsaVerifyingKey,
    signature::hazmat::PrehashVerifier,
};
use sha2::{Digest, Sha512};

/// Verify an XRP ledger keypair signature over `message`.
///
/// The key and signature are hex strings in ripple-keypairs form: a 33-byte
/// public key whose first byte selects the scheme. `0xED` keys are ed25519
/// over the raw message bytes; anything else is treated as a SEC1 secp256k1
/// key with a DER ECDSA signature over the sha512-half digest.
pub fn verify(message: &str, signature: &str, public_key: &str) -> bool {
    let Ok(key) = hex::decode(public_key) else {
        return false;
    };
    let Ok(signature) = hex::decode(signature) else {
        return false;
    };

    match key.split_first() {
        Some((0xED, rest)) if rest.len() == 32 => verify_ed25519(message.as_bytes(), &signature, rest),
        Some(_) => verify_secp256k1(message.as_bytes(), &signature, &key),
        None => false,
    }
}

fn verify_ed25519(message: &[u8], signature: &[u8], key: &[u8]) -> bool {
    let Ok(key) = <[u8; 32]>::try_from(key) else {
        return false;
    };
    let Ok(key) = EdVerifyingKey::from_bytes(&key) else {
        return false;
    };
    let Ok(signature) = <[u8; 64]>::try_from(signature) else {
        return false;
    };

    key.verify(message, &EdSignature::from_bytes(&signature)).is_ok()
}

fn verify_secp256k1(message: &[u8], signature: &[u8], key: &[u8]) -> bool {
    let Ok(key) = EcdsaVerifyingKey::from_sec1_bytes(key) else {
        return false;
    };
    let Ok(signature) = EcdsaSignature::from_der(signature) else {
        return false;
    };

    key.verify_prehash(&sha512_half(message), &signature).is_ok()
}

// Ripple hashes with the first half of sha512 instead of sha256.
fn sha512_half(message: &[u8]) -> [u8; 32] {
    let digest = Sha512::digest(message);
    let mut half = [0u8; 32];
    half.copy_from_slice(&digest[..32]);
    half
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey as EdSigningKey};
    use k256::ecdsa::{SigningKey, signature::hazmat::PrehashSigner};

    #[test]
    fn ed25519_roundtrip() {
        let key = EdSigningKey::from_bytes(&[42u8; 32]);
        let public = format!("ED{}", hex::encode(key.verifying_key().to_bytes()));

        let sig = hex::encode(key.sign(b"callback").to_bytes());
        assert!(verify("callback", &sig, &public));
        assert!(!verify("callback!", &sig, &public));
    }

    #[test]
    fn secp256k1_roundtrip() {
        let key = SigningKey::from_bytes(&[9u8; 32].into()).unwrap();
        let public = hex::encode(key.verifying_key().to_sec1_bytes());

        let signature: EcdsaSignature = key.sign_prehash(&sha512_half(b"callback")).unwrap();
        let sig = hex::encode(signature.to_der());
        assert!(verify("callback", &sig, &public));
        assert!(!verify("tampered", &sig, &public));
    }

    #[test]
    fn garbage_inputs_fail_closed() {
        assert!(!verify("callback", "zz", "ED00"));
        assert!(!verify("callback", "00", ""));
        assert!(!verify("callback", "00", "ED00"));
    }
}
