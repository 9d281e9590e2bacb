pub mod auth;
pub mod contents;
pub mod courses;
pub mod enrollments;
pub mod error;
pub mod forum;
pub mod middleware;
pub mod quizzes;
pub mod state;
pub mod store;
pub mod sweeper;
pub mod topics;
pub mod users;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{error, warn};
use uuid::Uuid;

use expanse_types::api::Claims;
use expanse_types::models::Role;

use crate::error::ApiError;
use crate::state::AppState;

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed: {e}"))
        })?
        .map_err(ApiError::Internal)
}

/// Parse a stored timestamp. Columns are written as RFC 3339, but SQLite's
/// own `datetime('now')` shape is accepted too.
pub(crate) fn parse_ts(value: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", value, e);
            DateTime::default()
        })
}

pub(crate) fn parse_uuid(value: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt uuid '{}': {}", value, e);
        Uuid::default()
    })
}

/// Course-scoped access check used by the forum and quiz handlers: the
/// course must exist, and students must be enrolled in it. Teachers can
/// reach every course.
pub(crate) async fn ensure_course_access(
    state: &AppState,
    course_id: i64,
    claims: &Claims,
) -> Result<(), ApiError> {
    let db = state.clone();
    let user_id = claims.sub.to_string();
    let is_teacher = claims.role == Role::Teacher;
    run_blocking(move || {
        if db.db.get_course(course_id)?.is_none() {
            return Ok(Err(ApiError::NotFound("Course")));
        }
        if !is_teacher && !db.db.is_enrolled(course_id, &user_id)? {
            return Ok(Err(ApiError::NotEnrolled));
        }
        Ok(Ok(()))
    })
    .await?
}
