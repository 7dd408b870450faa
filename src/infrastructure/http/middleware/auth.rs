use crate::application::services::PostService;
use crate::domain::entities::PrincipalId;
use crate::infrastructure::http::middleware::error::ApiError;
use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

/// Header carrying the principal id forwarded by the upstream auth layer.
pub const PRINCIPAL_HEADER: &str = "x-principal-id";

#[derive(Clone)]
pub struct AppState {
    pub post_service: PostService,
}

/// Identity of the caller, inserted as a request extension by `require_principal`.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal {
    pub id: PrincipalId,
}

/// Reject requests that do not carry a well-formed principal id.
pub async fn require_principal(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let id = principal_from_headers(request.headers())?.ok_or(ApiError::Unauthorized)?;

    request
        .extensions_mut()
        .insert(AuthenticatedPrincipal { id });

    Ok(next.run(request).await)
}

/// Public routes: attach the principal when one is sent, let anonymous
/// requests through, and still reject a malformed header.
pub async fn optional_principal(mut request: Request, next: Next) -> Result<Response, ApiError> {
    if let Some(id) = principal_from_headers(request.headers())? {
        request
            .extensions_mut()
            .insert(AuthenticatedPrincipal { id });
    }

    Ok(next.run(request).await)
}

fn principal_from_headers(headers: &HeaderMap) -> Result<Option<PrincipalId>, ApiError> {
    let Some(value) = headers.get(PRINCIPAL_HEADER) else {
        return Ok(None);
    };

    let raw = value.to_str().map_err(|_| ApiError::Unauthorized)?;
    let id = PrincipalId::parse(raw).map_err(|e| {
        tracing::debug!("Rejected principal header: {}", e);
        ApiError::Unauthorized
    })?;
    Ok(Some(id))
}
