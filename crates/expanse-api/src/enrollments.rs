use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;

use expanse_db::now_ts;
use expanse_types::api::{EnrollmentList, EnrollmentRequest};
use expanse_types::envelope::Envelope;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::run_blocking;

pub async fn get_enrollment(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let db = state.clone();
    let users = run_blocking(move || {
        if db.db.get_course(course_id)?.is_none() {
            return Ok(None);
        }
        db.db.list_enrollment(course_id).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("Course"))?;

    Ok(Json(Envelope::success(
        EnrollmentList { users },
        "Enrolled users retrieved successfully",
    )))
}

/// Replace the course's enrollment wholesale. The request carries provider
/// account ids; any id that does not resolve to a user fails the whole
/// request before the swap, so a typo cannot half-apply.
pub async fn replace_enrollment(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    Json(req): Json<EnrollmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut seen = HashSet::new();
    let requested: Vec<String> = req
        .user_id
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect();

    let db = state.clone();
    let users = run_blocking(move || {
        if db.db.get_course(course_id)?.is_none() {
            return Ok(Err(ApiError::NotFound("Course")));
        }

        let resolved = db.db.resolve_provider_accounts(&requested)?;
        if resolved.len() != requested.len() {
            let known: HashSet<&String> = resolved.iter().map(|(acct, _)| acct).collect();
            let unknown: Vec<String> = requested
                .iter()
                .filter(|id| !known.contains(id))
                .cloned()
                .collect();
            return Ok(Err(ApiError::UnknownUsers(unknown)));
        }

        let user_ids: Vec<String> = resolved.into_iter().map(|(_, uid)| uid).collect();
        db.db.replace_enrollments(course_id, &user_ids, &now_ts())?;
        info!("Enrollment for course {} now has {} users", course_id, user_ids.len());

        Ok(Ok(db.db.list_enrollment(course_id)?))
    })
    .await??;

    Ok(Json(Envelope::success(
        EnrollmentList { users },
        "User enrolled successfully",
    )))
}
