//! Bearer-token guards.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, OptionalFromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{AuthError, Claims, Identity, TokenService};
use crate::error::GuardError;

/// State for [`require_role`]: token service plus the accepted roles.
#[derive(Clone)]
pub struct RoleGuard {
    pub tokens: Arc<TokenService>,
    roles: Arc<[String]>,
}

impl RoleGuard {
    pub fn new<I, R>(tokens: Arc<TokenService>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            tokens,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Case-insensitive role membership.
    pub fn permits(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidScheme)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidScheme)?;
    if scheme != "Bearer" {
        return Err(AuthError::InvalidScheme);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }
    Ok(token)
}

/// Validate the bearer token in `headers`.
pub fn authenticate(tokens: &TokenService, headers: &HeaderMap) -> Result<Claims, AuthError> {
    let token = bearer_token(headers)?;
    Ok(tokens.validate(token, None)?)
}

fn attach(request: &mut Request<Body>, claims: Claims) {
    request.extensions_mut().insert(claims.identity());
    request.extensions_mut().insert(claims);
}

/// Reject requests without a valid bearer token.
pub async fn require_auth(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&tokens, request.headers()) {
        Ok(claims) => {
            attach(&mut request, claims);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(path = %request.uri().path(), reason = %err, "Authentication failed");
            GuardError::from(err).into_response()
        }
    }
}

/// Attach an identity when a valid token is present; never reject.
pub async fn optional_auth(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&tokens, request.headers()) {
        Ok(claims) => attach(&mut request, claims),
        Err(AuthError::MissingToken) => {}
        Err(err) => {
            tracing::debug!(reason = %err, "Ignoring invalid optional token");
        }
    }
    next.run(request).await
}

/// Require a valid token whose role is one of the guard's roles.
///
/// Authenticates on its own when no earlier guard did, so it can be
/// layered without [`require_auth`].
pub async fn require_role(
    State(guard): State<RoleGuard>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let claims = match request.extensions().get::<Claims>() {
        Some(claims) => claims.clone(),
        None => match authenticate(&guard.tokens, request.headers()) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::warn!(path = %request.uri().path(), reason = %err, "Authentication failed");
                return GuardError::from(err).into_response();
            }
        },
    };

    if !guard.permits(&claims.role) {
        tracing::warn!(
            subject_id = %claims.subject_id,
            role = %claims.role,
            path = %request.uri().path(),
            "Role not permitted"
        );
        return GuardError::from(AuthError::InsufficientRole { role: claims.role }).into_response();
    }

    attach(&mut request, claims);
    next.run(request).await
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = GuardError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| AuthError::Unauthenticated.into())
    }
}

impl<S> OptionalFromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Identity>().cloned())
    }
}
