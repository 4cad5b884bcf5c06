/// Signature primitives for envelope verification
///
/// Senders and the timestamp authority sign the SHA-256 of canonical
/// JSON bytes with secp256k1. Signatures travel as 0x-prefixed hex of
/// the 65-byte `r || s || v` form so the signer can be recovered
/// without shipping public keys alongside every message.
pub mod timestamp;
pub mod verifier;

use crate::error::{DropsError, DropsResult};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

/// Derive the wire address of a verifying key
///
/// Address = `0x` + hex of the last 20 bytes of the SHA-256 of the
/// uncompressed public key point (without the 0x04 prefix byte).
pub fn derive_address(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let digest = Sha256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Sign a payload, producing a recoverable signature
pub fn sign_payload(key: &SigningKey, payload: &[u8]) -> DropsResult<String> {
    let prehash = Sha256::digest(payload);
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&prehash)
        .map_err(|e| DropsError::Internal(format!("Signing failed: {}", e)))?;

    let mut raw = signature.to_bytes().to_vec();
    raw.push(recovery_id.to_byte());
    Ok(format!("0x{}", hex::encode(raw)))
}

/// Recover the signer address of a payload from its signature
///
/// Any malformed or forged signature maps to `InvalidSignature`; the
/// caller compares the recovered address against the claimed one.
pub fn recover_address(payload: &[u8], signature_hex: &str) -> DropsResult<String> {
    let stripped = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let raw = hex::decode(stripped).map_err(|_| DropsError::InvalidSignature)?;
    if raw.len() != 65 {
        return Err(DropsError::InvalidSignature);
    }

    let signature = Signature::from_slice(&raw[..64]).map_err(|_| DropsError::InvalidSignature)?;
    let recovery_id = RecoveryId::from_byte(raw[64]).ok_or(DropsError::InvalidSignature)?;

    let prehash = Sha256::digest(payload);
    let key = VerifyingKey::recover_from_prehash(&prehash, &signature, recovery_id)
        .map_err(|_| DropsError::InvalidSignature)?;

    Ok(derive_address(&key))
}

/// Parse a hex private key into a signing key
pub fn signing_key_from_hex(key_hex: &str) -> DropsResult<SigningKey> {
    let stripped = key_hex.strip_prefix("0x").unwrap_or(key_hex);
    let raw = hex::decode(stripped)
        .map_err(|e| DropsError::Validation(format!("Invalid private key hex: {}", e)))?;
    SigningKey::from_slice(&raw)
        .map_err(|e| DropsError::Validation(format!("Invalid private key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_sign_and_recover_roundtrip() {
        let key = SigningKey::random(&mut OsRng);
        let address = derive_address(key.verifying_key());

        let signature = sign_payload(&key, b"payload").unwrap();
        let recovered = recover_address(b"payload", &signature).unwrap();
        assert_eq!(recovered, address);
    }

    #[test]
    fn test_recovery_differs_for_other_payload() {
        let key = SigningKey::random(&mut OsRng);
        let address = derive_address(key.verifying_key());

        let signature = sign_payload(&key, b"payload").unwrap();
        // Either recovery fails outright or it yields some other address
        match recover_address(b"tampered", &signature) {
            Ok(recovered) => assert_ne!(recovered, address),
            Err(DropsError::InvalidSignature) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[test]
    fn test_malformed_signature_rejected() {
        assert!(matches!(
            recover_address(b"x", "0xdeadbeef"),
            Err(DropsError::InvalidSignature)
        ));
        assert!(matches!(
            recover_address(b"x", "not hex at all"),
            Err(DropsError::InvalidSignature)
        ));
    }

    #[test]
    fn test_address_shape() {
        let key = SigningKey::random(&mut OsRng);
        let address = derive_address(key.verifying_key());
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 42);
    }
}
