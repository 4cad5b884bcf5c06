/// Signature & timestamp verification for inbound envelopes
use crate::{
    crypto::recover_address,
    envelope::{canonical_bytes, canonical_hash, SignedEnvelope},
    error::{DropsError, DropsResult},
};

/// Verifies the three bindings of an envelope: message-to-timestamp
/// hash, sender signature, and authority signature. Pure function of
/// its inputs plus the configured authority address.
#[derive(Debug, Clone)]
pub struct EnvelopeVerifier {
    authority_address: String,
}

impl EnvelopeVerifier {
    pub fn new(authority_address: String) -> Self {
        Self {
            authority_address: authority_address.to_lowercase(),
        }
    }

    /// Verify an envelope, rejecting on the first failed check
    pub fn verify(&self, envelope: &SignedEnvelope) -> DropsResult<()> {
        self.verify_hash_binding(envelope)?;
        self.verify_sender_signature(envelope)?;
        self.verify_timestamp_signature(envelope)?;
        Ok(())
    }

    /// The timestamped hash must equal the canonical hash of the message
    fn verify_hash_binding(&self, envelope: &SignedEnvelope) -> DropsResult<()> {
        let computed = canonical_hash(&envelope.data.message)
            .map_err(|e| DropsError::Validation(format!("Cannot hash message: {}", e)))?;
        if computed != envelope.data.timestamp.data.hash {
            return Err(DropsError::HashMismatch);
        }
        Ok(())
    }

    /// The outer signature must recover to the claimed sender
    fn verify_sender_signature(&self, envelope: &SignedEnvelope) -> DropsResult<()> {
        let payload = canonical_bytes(&envelope.data)
            .map_err(|e| DropsError::Validation(format!("Cannot serialize envelope: {}", e)))?;
        let recovered = recover_address(&payload, &envelope.signature)?;
        if recovered != envelope.sender().to_lowercase() {
            return Err(DropsError::InvalidSignature);
        }
        Ok(())
    }

    /// The timestamp signature must recover to the authority address
    fn verify_timestamp_signature(&self, envelope: &SignedEnvelope) -> DropsResult<()> {
        let payload = canonical_bytes(&envelope.data.timestamp.data)
            .map_err(|e| DropsError::Validation(format!("Cannot serialize timestamp: {}", e)))?;
        let recovered =
            recover_address(&payload, &envelope.data.timestamp.signature).map_err(|_| DropsError::UntrustedTimestamp)?;
        if recovered != self.authority_address {
            return Err(DropsError::UntrustedTimestamp);
        }
        Ok(())
    }
}
