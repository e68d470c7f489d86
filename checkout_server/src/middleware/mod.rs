mod acl;
mod webhook_signature;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService};
pub use webhook_signature::{WebhookSignatureFactory, WebhookSignatureService};
