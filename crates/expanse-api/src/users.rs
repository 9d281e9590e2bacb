use axum::{Json, extract::Path, extract::State, response::IntoResponse};
use tracing::warn;

use expanse_db::models::UserRow;
use expanse_types::api::DirectoryUser;
use expanse_types::envelope::Envelope;
use expanse_types::models::{Role, User};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::{parse_ts, parse_uuid, run_blocking};

/// GET /api/users: student directory for the enrollment screen. The ids
/// handed out here are provider account ids, the same ids the enrollment
/// replace endpoint accepts back.
pub async fn directory(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let db = state.clone();
    let rows = run_blocking(move || db.db.list_student_directory()).await?;

    let users: Vec<DirectoryUser> = rows
        .into_iter()
        .map(|r| DirectoryUser {
            id: r.provider_account_id,
            name: r.name,
        })
        .collect();

    Ok(Json(Envelope::success(
        users,
        "Users retrieved successfully",
    )))
}

/// GET /api/users/{provider_account_id}: one user resolved through the
/// accounts table.
pub async fn get_user(
    State(state): State<AppState>,
    Path(provider_account_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let db = state.clone();
    let row = run_blocking(move || db.db.get_user_by_provider_account(&provider_account_id))
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(Envelope::success(
        user_from_row(row),
        "User retrieved successfully",
    )))
}

pub(crate) fn user_from_row(row: UserRow) -> User {
    let role = row.role.parse::<Role>().unwrap_or_else(|e| {
        warn!("Corrupt role '{}' on user '{}': {}", row.role, row.id, e);
        Role::Student
    });

    User {
        id: parse_uuid(&row.id),
        name: row.name,
        email: row.email,
        image: row.image,
        role,
        created_at: parse_ts(&row.created_at),
    }
}
