//! Signature middleware for settlement-provider webhooks.
//!
//! The provider signs each delivery with its P-256 key. The signature, the signing scheme version and the delivery
//! timestamp are sent in the `x-mural-webhook-*` headers (see [`checkout_engine::helpers`]).
//!
//! The verifier is taken from the [`WebhookVerifier`] registered as app data. When there is none, no public key was
//! configured and deliveries are passed through unchecked.
//!
//! The body has to be read in full to check the signature, so it is put back into the request afterwards for the
//! handler to consume.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use checkout_engine::helpers::{
    WebhookError,
    WebhookVerifier,
    SIGNATURE_HEADER,
    SIGNATURE_VERSION_HEADER,
    TIMESTAMP_HEADER,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::errors::ServerError;

#[derive(Default)]
pub struct WebhookSignatureFactory;

impl WebhookSignatureFactory {
    pub fn new() -> Self {
        Self
    }
}

impl<S, B> Transform<S, ServiceRequest> for WebhookSignatureFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<EitherBody<B>>;
    type Transform = WebhookSignatureService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WebhookSignatureService { service: Rc::new(service) }))
    }
}

pub struct WebhookSignatureService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for WebhookSignatureService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<EitherBody<B>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let Some(verifier) = req.app_data::<web::Data<WebhookVerifier>>().cloned() else {
                trace!("🪝️ No webhook public key configured. Skipping the signature check.");
                return service.call(req).await.map(ServiceResponse::map_into_left_body);
            };
            let data = match req.extract::<web::Bytes>().await {
                Ok(data) => data,
                Err(e) => {
                    warn!("🪝️ Failed to read webhook body. {e}");
                    let err = ServerError::InvalidRequestBody(e.to_string());
                    return Ok(req.error_response(err).map_into_right_body());
                },
            };
            if let Err(e) = check_signature(&req, &verifier, &data) {
                warn!("🪝️ Rejecting webhook delivery. {e}");
                return Ok(req.error_response(ServerError::from(e)).map_into_right_body());
            }
            trace!("🪝️ Webhook signature check ✅️");
            req.set_payload(bytes_to_payload(data));
            service.call(req).await.map(ServiceResponse::map_into_left_body)
        })
    }
}

fn check_signature(req: &ServiceRequest, verifier: &WebhookVerifier, body: &[u8]) -> Result<(), WebhookError> {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok()).filter(|v| !v.is_empty());
    let (Some(signature), Some(version), Some(timestamp)) =
        (header(SIGNATURE_HEADER), header(SIGNATURE_VERSION_HEADER), header(TIMESTAMP_HEADER))
    else {
        return Err(WebhookError::MissingHeaders);
    };
    trace!("🪝️ Checking webhook signature (version {version}, timestamp {timestamp})");
    verifier.verify(timestamp, body, signature)
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
