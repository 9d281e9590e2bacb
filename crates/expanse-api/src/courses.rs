use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use expanse_db::models::CourseRow;
use expanse_db::now_ts;
use expanse_types::api::{Claims, CreateCourseRequest, UpdateCourseRequest};
use expanse_types::envelope::Envelope;
use expanse_types::models::Course;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::{parse_ts, parse_uuid, run_blocking};

pub async fn list_courses(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let db = state.clone();
    let rows = run_blocking(move || db.db.list_courses()).await?;

    let courses: Vec<Course> = rows.into_iter().map(course_from_row).collect();
    Ok(Json(Envelope::success(
        courses,
        "Courses retrieved successfully",
    )))
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let db = state.clone();
    let row = run_blocking(move || db.db.get_course(course_id))
        .await?
        .ok_or(ApiError::NotFound("Course"))?;

    Ok(Json(Envelope::success(
        course_from_row(row),
        "Course retrieved successfully",
    )))
}

pub async fn create_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCourseRequest>,
) -> ApiResult<impl IntoResponse> {
    let code = req.course_code.trim().to_string();
    let name = req.course_name.trim().to_string();
    let description = req.course_description.trim().to_string();
    if code.is_empty() || name.is_empty() || description.is_empty() {
        return Err(ApiError::Validation(
            "Course code, name and description are required".into(),
        ));
    }

    let db = state.clone();
    let check = code.clone();
    if run_blocking(move || db.db.get_course_by_code(&check))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Course code already exists".into()));
    }

    let db = state.clone();
    let creator = claims.sub.to_string();
    let row = run_blocking(move || {
        let id = db.db.create_course(&code, &name, &description, &creator, &now_ts())?;
        db.db
            .get_course(id)?
            .ok_or_else(|| anyhow::anyhow!("Course vanished after insert"))
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(
            course_from_row(row),
            "Course created successfully",
        )),
    ))
}

pub async fn update_course(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateCourseRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.course_code.is_none() && req.course_name.is_none() && req.course_description.is_none() {
        return Err(ApiError::Validation("Nothing to update".into()));
    }

    let db = state.clone();
    let existing = run_blocking(move || db.db.get_course(course_id))
        .await?
        .ok_or(ApiError::NotFound("Course"))?;

    let code = merge_field(req.course_code, &existing.course_code, "course_code")?;
    let name = merge_field(req.course_name, &existing.course_name, "course_name")?;
    let description = merge_field(
        req.course_description,
        &existing.course_description,
        "course_description",
    )?;

    if code != existing.course_code {
        let db = state.clone();
        let check = code.clone();
        if let Some(other) = run_blocking(move || db.db.get_course_by_code(&check)).await? {
            if other.course_id != course_id {
                return Err(ApiError::Conflict("Course code already exists".into()));
            }
        }
    }

    let db = state.clone();
    let updater = claims.sub.to_string();
    let row = run_blocking(move || {
        db.db
            .update_course(course_id, &code, &name, &description, &updater, &now_ts())?;
        db.db
            .get_course(course_id)?
            .ok_or_else(|| anyhow::anyhow!("Course vanished during update"))
    })
    .await?;

    Ok(Json(Envelope::success(
        course_from_row(row),
        "Course updated successfully",
    )))
}

pub async fn delete_course(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let db = state.clone();
    let blob_ids = run_blocking(move || {
        if db.db.get_course(course_id)?.is_none() {
            return Ok(None);
        }
        db.db.delete_course(course_id).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("Course"))?;

    // Rows are gone; now remove the orphaned blobs. A blob that fails to
    // delete only leaks disk space, it can never be served again.
    for id in &blob_ids {
        state.store.delete(id).await.ok();
    }

    info!(
        "Deleted course {} and {} content blobs",
        course_id,
        blob_ids.len()
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Apply one optional field of a partial update; a provided-but-blank value
/// is rejected rather than silently keeping the old one.
fn merge_field(new: Option<String>, current: &str, field: &str) -> Result<String, ApiError> {
    match new {
        None => Ok(current.to_string()),
        Some(v) => {
            let v = v.trim().to_string();
            if v.is_empty() {
                return Err(ApiError::Validation(format!("{field} must not be blank")));
            }
            Ok(v)
        }
    }
}

pub(crate) fn course_from_row(row: CourseRow) -> Course {
    Course {
        course_id: row.course_id,
        course_code: row.course_code,
        course_name: row.course_name,
        course_description: row.course_description,
        created_by: parse_uuid(&row.created_by),
        created_at: parse_ts(&row.created_at),
        updated_by: parse_uuid(&row.updated_by),
        updated_at: parse_ts(&row.updated_at),
    }
}
