//! Authentication of inbound settlement-provider webhooks.
//!
//! Every delivery carries three headers:
//! * `x-mural-webhook-signature`: base64 encoding of a DER ECDSA signature,
//! * `x-mural-webhook-signature-version`: the signing scheme version,
//! * `x-mural-webhook-timestamp`: the delivery timestamp.
//!
//! The signed message is `timestamp + "." + raw_body`. It is hashed with SHA-256 and verified against the provider's
//! P-256 public key, which is configured as a PEM-encoded SubjectPublicKeyInfo.
use log::*;
use p256::{
    ecdsa::{signature::Verifier, Signature, VerifyingKey},
    pkcs8::DecodePublicKey,
};
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-mural-webhook-signature";
pub const SIGNATURE_VERSION_HEADER: &str = "x-mural-webhook-signature-version";
pub const TIMESTAMP_HEADER: &str = "x-mural-webhook-timestamp";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Missing webhook signature headers")]
    MissingHeaders,
    #[error("The webhook signature is not valid base64/DER. {0}")]
    InvalidSignatureEncoding(String),
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Invalid webhook public key. {0}")]
    InvalidPublicKey(String),
    #[error("Invalid webhook payload. {0}")]
    MalformedPayload(String),
}

/// Builds the exact byte string the provider signs.
pub fn signed_message(timestamp: &str, body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(timestamp.len() + 1 + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'.');
    message.extend_from_slice(body);
    message
}

#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    key: VerifyingKey,
}

impl WebhookVerifier {
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Parses a PEM `PUBLIC KEY` block. Escaped newlines (`\n`), as often found in `.env` files, are accepted.
    pub fn from_pem(pem: &str) -> Result<Self, WebhookError> {
        let pem = pem.trim().replace("\\n", "\n");
        let key = VerifyingKey::from_public_key_pem(&pem).map_err(|e| WebhookError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { key })
    }

    pub fn verify(&self, timestamp: &str, body: &[u8], signature_b64: &str) -> Result<(), WebhookError> {
        let der = base64::decode(signature_b64.trim())
            .map_err(|e| WebhookError::InvalidSignatureEncoding(e.to_string()))?;
        let signature = Signature::from_der(&der).map_err(|e| WebhookError::InvalidSignatureEncoding(e.to_string()))?;
        // Signers are not required to emit low-S signatures
        let signature = signature.normalize_s().unwrap_or(signature);
        let message = signed_message(timestamp, body);
        self.key.verify(&message, &signature).map_err(|_| {
            debug!("🪝️ Webhook signature check failed for timestamp {timestamp}");
            WebhookError::InvalidSignature
        })
    }
}
