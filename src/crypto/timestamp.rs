/// Timestamp authority signer
///
/// Backs the sign-timestamp endpoint: stamps a client-supplied content
/// hash with the current time and the authority's signature. The
/// authority key is distinct from any sender key; its address is fixed
/// configuration on the verifying side.
use crate::{
    crypto::{derive_address, sign_payload, signing_key_from_hex},
    envelope::{canonical_bytes, SignedTimestamp, TimestampData},
    error::{DropsError, DropsResult},
};
use chrono::Utc;
use k256::ecdsa::SigningKey;

pub struct TimestampSigner {
    signing_key: SigningKey,
}

impl TimestampSigner {
    pub fn from_hex(key_hex: &str) -> DropsResult<Self> {
        Ok(Self {
            signing_key: signing_key_from_hex(key_hex)?,
        })
    }

    /// Address that signatures from this signer recover to
    pub fn address(&self) -> String {
        derive_address(self.signing_key.verifying_key())
    }

    /// Stamp a content hash with the current epoch-millis time
    pub fn sign(&self, hash: &str) -> DropsResult<SignedTimestamp> {
        if !hash.starts_with("0x") {
            return Err(DropsError::Validation(
                "Hash must be a 0x-prefixed hex string".to_string(),
            ));
        }

        let data = TimestampData {
            timestamp: Utc::now().timestamp_millis().to_string(),
            hash: hash.to_string(),
        };
        let payload = canonical_bytes(&data)
            .map_err(|e| DropsError::Internal(format!("Cannot serialize timestamp: {}", e)))?;
        let signature = sign_payload(&self.signing_key, &payload)?;

        Ok(SignedTimestamp { data, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::recover_address;

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_signed_timestamp_recovers_to_authority() {
        let signer = TimestampSigner::from_hex(TEST_KEY).unwrap();
        let stamped = signer.sign("0xabcdef").unwrap();

        assert_eq!(stamped.data.hash, "0xabcdef");
        let payload = canonical_bytes(&stamped.data).unwrap();
        let recovered = recover_address(&payload, &stamped.signature).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_unprefixed_hash_rejected() {
        let signer = TimestampSigner::from_hex(TEST_KEY).unwrap();
        assert!(signer.sign("abcdef").is_err());
    }

    #[test]
    fn test_bad_key_hex_rejected() {
        assert!(TimestampSigner::from_hex("zz").is_err());
    }
}
