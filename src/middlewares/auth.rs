use crate::error::AppError;
use crate::utils::{JwtService, SessionRejection};
use actix_web::body::EitherBody;
use actix_web::http::Method;
use actix_web::{
    Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
    dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::rc::Rc;
use uuid::Uuid;

const NOT_AUTHENTICATED: &str = "Not authenticated";

// Paths reachable without a session
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            exact_paths: vec!["/swagger-ui", "/api-docs/openapi.json"],
            prefix_paths: vec!["/swagger-ui/", "/api-docs/", "/api/auth/"],
        }
    }

    fn is_public_path(&self, path: &str) -> bool {
        if self.exact_paths.contains(&path) {
            return true;
        }

        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

/// Session guard. Reads the session cookie, verifies it and stores the
/// user id in the request extensions; anything else gets a 401.
pub struct AuthMiddleware {
    jwt_service: JwtService,
    cookie_name: Rc<str>,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService, cookie_name: &str) -> Self {
        Self {
            jwt_service,
            cookie_name: Rc::from(cookie_name),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            cookie_name: self.cookie_name.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    cookie_name: Rc<str>,
    public_paths: PublicPaths,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // CORS preflight never carries the cookie
        if req.method() == Method::OPTIONS || self.public_paths.is_public_path(req.path()) {
            let fut = self.service.call(req);
            return Box::pin(async move { Ok(fut.await?.map_into_left_body()) });
        }

        let token = req.cookie(&self.cookie_name).map(|c| c.value().to_string());

        match self.jwt_service.authenticate(token.as_deref()) {
            Ok(user_id) => {
                req.extensions_mut().insert(SessionUser(user_id));
                let fut = self.service.call(req);
                Box::pin(async move { Ok(fut.await?.map_into_left_body()) })
            }
            Err(rejection) => {
                match &rejection {
                    SessionRejection::Missing => {
                        log::info!("No session cookie on {} {}", req.method(), req.path())
                    }
                    other => log::warn!(
                        "Rejected session on {} {}: {}",
                        req.method(),
                        req.path(),
                        other
                    ),
                }
                let response = AppError::AuthError(NOT_AUTHENTICATED.to_string()).error_response();
                Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) })
            }
        }
    }
}

/// Id of the user whose session was accepted for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUser(pub Uuid);

/// Extractor for handlers behind the session guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<SessionUser>()
                .map(|s| AuthUser(s.0))
                .ok_or_else(|| AppError::AuthError(NOT_AUTHENTICATED.to_string())),
        )
    }
}
