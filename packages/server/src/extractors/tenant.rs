use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// Tenant context installed by the upstream auth gateway.
///
/// Authentication and organization membership are resolved before requests
/// reach this service; the gateway forwards the result in headers. Handlers
/// trust these values verbatim but still perform their own ownership check
/// against the model row.
pub struct TenantContext {
    pub organization_id: Uuid,
    pub actor_id: Uuid,
}

const ORGANIZATION_HEADER: &str = "x-organization-id";
const ACTOR_HEADER: &str = "x-actor-id";

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let organization_id = header_uuid(parts, ORGANIZATION_HEADER)?;
        let actor_id = header_uuid(parts, ACTOR_HEADER)?;

        Ok(TenantContext {
            organization_id,
            actor_id,
        })
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, AppError> {
    let value = parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::TenantMissing)?;
    Uuid::parse_str(value).map_err(|_| AppError::TenantMissing)
}

/// Best-effort client IP for the upload audit trail.
pub fn client_ip(parts: &axum::http::HeaderMap) -> Option<String> {
    parts
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
