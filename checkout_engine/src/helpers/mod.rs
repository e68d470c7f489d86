mod webhook_signature;

pub use webhook_signature::{
    signed_message,
    WebhookError,
    WebhookVerifier,
    SIGNATURE_HEADER,
    SIGNATURE_VERSION_HEADER,
    TIMESTAMP_HEADER,
};
