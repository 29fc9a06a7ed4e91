use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use crate::verifier::JwtVerifier;

/// The caller behind a bin write, resolved from the `Authorization: Bearer`
/// header.
///
/// Reads and sensor ingestion never ask for this; only creating and editing
/// bins do. A caller carries exactly one role, and only `officer` and `admin`
/// may write bins (see [`crate::roles::BIN_WRITE_ROLES`]).
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    /// The raw bearer token, as sent.
    pub token: String,
}

impl AuthContext {
    /// The token's `sub`. An officer who creates a bin becomes its field
    /// officer under this id.
    pub fn caller_id(&self) -> &str {
        &self.claims.subject
    }

    /// The single resolved role, lowercased: `app_metadata.role`, then
    /// `user_metadata.role`, then the top-level `role`, else `user`.
    pub fn role(&self) -> &str {
        &self.claims.role
    }

    /// ASCII case-insensitive.
    pub fn has_role(&self, role: &str) -> bool {
        self.claims.has_role(role)
    }
}

/// Rejects with 401 unless the header carries a bearer token that verifies.
#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<JwtVerifier>::from_ref(state);

        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;

        let token = parse_bearer(header_value)?;
        let claims = verifier.verify(&token)?;

        Ok(Self { claims, token })
    }
}

fn parse_bearer(value: &axum::http::HeaderValue) -> AuthResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?
        .trim();

    let (scheme, token) = raw
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthorization)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthorization);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(token.to_owned())
}
