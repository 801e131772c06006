//! Caller identity.
//!
//! Authentication happens upstream; the gateway forwards the verified
//! identity as headers:
//!
//! - `X-Principal-Id: u42`
//! - `X-Principal-Roles: MANAGER,fse`
//! - `X-Principal-Reports: u7,u9` (optional)

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crm_core::Principal;

use super::error::ApiError;

pub(crate) const PRINCIPAL_ID: &str = "x-principal-id";
pub(crate) const PRINCIPAL_ROLES: &str = "x-principal-roles";
pub(crate) const PRINCIPAL_REPORTS: &str = "x-principal-reports";

/// Extractor yielding the calling [`Principal`].
pub(crate) struct Caller(pub(crate) Principal);

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Result<&'h str, ApiError> {
    match headers.get(name) {
        None => Ok(""),
        Some(v) => v
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("header {} is not valid text", name))),
    }
}

pub(crate) fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, ApiError> {
    let principal = Principal::from_claims(
        header(headers, PRINCIPAL_ID)?,
        header(headers, PRINCIPAL_ROLES)?,
        header(headers, PRINCIPAL_REPORTS)?,
    )?;
    Ok(principal)
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_headers(&parts.headers).map(Caller)
    }
}
