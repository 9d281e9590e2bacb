use axum::{
    Extension,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use expanse_types::api::Claims;
use expanse_types::models::Role;

use crate::error::ApiError;
use crate::state::AppState;

/// Extract and validate the bearer JWT, inserting the claims as a request
/// extension for downstream handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingAuth)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::MissingAuth)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::InvalidToken)?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Second gate stacked on `require_auth` for teacher-only route groups.
pub async fn require_teacher(
    Extension(claims): Extension<Claims>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if claims.role != Role::Teacher {
        return Err(ApiError::TeacherOnly);
    }
    Ok(next.run(req).await)
}
