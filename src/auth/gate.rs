//! The trust boundary for protected routes.
//!
//! Each step is a plain function returning either the enriched value to
//! continue with or an [`AuthError`] that short-circuits the request:
//!
//! 1. [`bearer_token`] pulls the token out of the `Authorization` header.
//! 2. [`authenticate`] verifies it and yields an [`Identity`].
//! 3. [`authorize`] checks the identity's role.
//!
//! The axum middleware and the extractor below are thin wrappers around these.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use super::{
    claims::{Claims, Role},
    jwt::{JwtKeys, TokenError},
};
use crate::error::AppError;

/// Who the request is from, as asserted by a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl From<Claims> for Identity {
    fn from(c: Claims) -> Self {
        Self {
            user_id: c.sub,
            role: c.role,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("No token provided")]
    MissingToken,
    #[error("Malformed authorization header")]
    MalformedHeader,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("Authentication required")]
    NotAuthenticated,
    #[error("Admin access required")]
    Forbidden,
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Forbidden => AppError::Forbidden,
            other => AppError::Unauthenticated(other.to_string()),
        }
    }
}

pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingToken)?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

pub fn authenticate(keys: &JwtKeys, header: Option<&str>) -> Result<Identity, AuthError> {
    let token = bearer_token(header)?;
    let claims = keys.verify(token)?;
    Ok(claims.into())
}

/// Fails closed: without an identity the request is unauthenticated, never
/// treated as some default role.
pub fn authorize(identity: Option<&Identity>, required: Role) -> Result<&Identity, AuthError> {
    let identity = identity.ok_or(AuthError::NotAuthenticated)?;
    match required {
        Role::User => Ok(identity),
        Role::Admin if identity.role == Role::Admin => Ok(identity),
        Role::Admin => Err(AuthError::Forbidden),
    }
}

fn header_str(headers: &axum::http::HeaderMap) -> Result<Option<&str>, AuthError> {
    match headers.get(AUTHORIZATION) {
        None => Ok(None),
        Some(v) => v.to_str().map(Some).map_err(|_| AuthError::MalformedHeader),
    }
}

fn authenticate_parts(keys: &JwtKeys, parts: &Parts) -> Result<Identity, AuthError> {
    if let Some(identity) = parts.extensions.get::<Identity>() {
        return Ok(*identity);
    }
    authenticate(keys, header_str(&parts.headers)?)
}

/// Verifies the bearer token and attaches the [`Identity`] to the request.
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let result = header_str(req.headers()).and_then(|h| authenticate(&keys, h));
    let identity = result.map_err(|e| {
        warn!(error = %e, path = %req.uri().path(), "request rejected by gate");
        e
    })?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Must be layered inside [`require_auth`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    if let Err(e) = authorize(req.extensions().get::<Identity>(), Role::Admin) {
        warn!(error = %e, path = %req.uri().path(), "request rejected by role check");
        return Err(e.into());
    }
    Ok(next.run(req).await)
}

/// Extracts the caller's identity, reusing one attached by [`require_auth`].
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let identity = authenticate_parts(&keys, parts).map_err(|e| {
            warn!(error = %e, "invalid or missing token");
            e
        })?;
        Ok(AuthUser(identity))
    }
}
