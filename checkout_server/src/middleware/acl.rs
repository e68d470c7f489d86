//! Access control list middleware for the checkout server.
//! This middleware can be placed on any route or service.
//!
//! It resolves the bearer token in the `Authorization` header against the [`AuthConfig`] registered as app data, and
//! checks the caller's role against the roles the route requires.
//! * No bearer token at all: 401 Unauthorized.
//! * A token that is unknown, or belongs to a caller without a required role: 403 Forbidden.
//!
//! On success the resolved [`Caller`] is stored in the request extensions.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::{
    auth::{bearer_token, Caller, Role},
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<EitherBody<B>>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) }))
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<EitherBody<B>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let caller = match resolve_caller(&req) {
                Ok(caller) => caller,
                Err(e) => return Ok(req.error_response(e).map_into_right_body()),
            };
            if !required_roles.iter().any(|role| caller.has_role(*role)) {
                warn!("💻️ {caller:?} tried to access {} without the required role", req.path());
                let e = ServerError::from(AuthError::InsufficientPermissions(format!("{} is restricted", req.path())));
                return Ok(req.error_response(e).map_into_right_body());
            }
            req.extensions_mut().insert(caller);
            service.call(req).await.map(ServiceResponse::map_into_left_body)
        })
    }
}

fn resolve_caller(req: &ServiceRequest) -> Result<Caller, ServerError> {
    let config = req.app_data::<web::Data<AuthConfig>>().ok_or_else(|| {
        error!("💻️ No AuthConfig has been registered with the app. Access to {} is denied.", req.path());
        ServerError::ConfigurationError("Authentication is not configured".into())
    })?;
    let token = bearer_token(req.headers()).ok_or_else(|| {
        debug!("💻️ No bearer token for {}", req.path());
        ServerError::from(AuthError::MissingToken)
    })?;
    Ok(config.caller_for_token(token))
}
