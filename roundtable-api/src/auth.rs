//! Request authentication
//!
//! Every request carries a base64-JSON principal header injected by the
//! auth proxy in front of the service. Authentication here means
//! decoding that header and resolving it to a user record; anything
//! missing or malformed collapses into a single 401 so callers cannot
//! distinguish the failure modes.

use crate::error::ApiError;
use crate::state::AppState;
use axum::http::HeaderMap;
use roundtable_core::core_identity::{IdentityError, Principal};
use roundtable_core::core_store::User;

/// Header the auth proxy writes the encoded principal into
pub const PRINCIPAL_HEADER: &str = "x-client-principal";

/// Resolve the request's principal header to a user, provisioning the
/// account on first sight
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let raw = headers
        .get(PRINCIPAL_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let principal = Principal::from_header(raw).map_err(|_| ApiError::Unauthorized)?;

    state.identity.resolve(&principal).map_err(|err| match err {
        IdentityError::Anonymous | IdentityError::MalformedPrincipal(_) => ApiError::Unauthorized,
        other => other.into(),
    })
}
