use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, State},
    extract::multipart::{Field, MultipartError},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use uuid::Uuid;

use expanse_db::now_ts;
use expanse_types::api::{Claims, UploadedContent};
use expanse_types::envelope::Envelope;
use expanse_types::models::Role;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::run_blocking;

/// One file part pulled out of a multipart body, fully buffered.
pub(crate) struct UploadPart {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

pub(crate) fn bad_part(err: MultipartError) -> ApiError {
    ApiError::Validation(format!("Malformed multipart request: {err}"))
}

pub(crate) async fn read_file_part(
    field: Field<'_>,
    max_bytes: u64,
) -> Result<UploadPart, ApiError> {
    let file_name = field.file_name().unwrap_or("file").to_string();
    let declared = field.content_type().map(|s| s.to_string());

    let data = field.bytes().await.map_err(bad_part)?;
    if data.len() as u64 > max_bytes {
        return Err(ApiError::PayloadTooLarge);
    }
    if data.is_empty() {
        return Err(ApiError::Validation(format!(
            "File {file_name} is empty"
        )));
    }

    let mime_type = resolve_mime(declared.as_deref(), &file_name);
    Ok(UploadPart {
        file_name,
        mime_type,
        data,
    })
}

/// Declared content type wins; otherwise guess from the extension.
pub(crate) fn resolve_mime(declared: Option<&str>, file_name: &str) -> String {
    match declared {
        Some(ct) if !ct.trim().is_empty() && ct != "application/octet-stream" => ct.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

/// Write the blob to disk, then record its metadata row. Blob first: a row
/// without a blob would be served as a 404, a blob without a row is only
/// leaked disk space.
pub(crate) async fn store_content(
    state: &AppState,
    course_id: i64,
    topic_id: i64,
    part: UploadPart,
    created_by: &Uuid,
) -> Result<UploadedContent, ApiError> {
    let content_id = Uuid::new_v4();
    let id_str = content_id.to_string();

    let (size_bytes, sha256) = state.store.write(&id_str, &part.data).await?;

    let db = state.clone();
    let row_id = id_str.clone();
    let row_sha = sha256.clone();
    let file_name = part.file_name.clone();
    let mime_type = part.mime_type.clone();
    let creator = created_by.to_string();
    run_blocking(move || {
        db.db.insert_content(
            &row_id,
            course_id,
            topic_id,
            &file_name,
            &mime_type,
            size_bytes as i64,
            &row_sha,
            &creator,
            &now_ts(),
        )
    })
    .await?;

    Ok(UploadedContent {
        content_id,
        file_name: part.file_name,
        mime_type: part.mime_type,
        size_bytes,
        sha256,
    })
}

/// POST /contents: multipart `course_id`, `topic_id` and one `file` part,
/// attaching another blob to an existing topic.
pub async fn upload_content(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut course_id: Option<i64> = None;
    let mut topic_id: Option<i64> = None;
    let mut file: Option<UploadPart> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_part)? {
        match field.name().unwrap_or("") {
            "course_id" => course_id = Some(parse_id_field(field, "course_id").await?),
            "topic_id" => topic_id = Some(parse_id_field(field, "topic_id").await?),
            "file" => file = Some(read_file_part(field, state.max_upload_bytes).await?),
            other => warn!("Ignoring unexpected multipart field {:?}", other),
        }
    }

    let course_id =
        course_id.ok_or_else(|| ApiError::Validation("course_id is required".into()))?;
    let topic_id = topic_id.ok_or_else(|| ApiError::Validation("topic_id is required".into()))?;
    let file = file.ok_or_else(|| ApiError::Validation("file is required".into()))?;

    let db = state.clone();
    let topic = run_blocking(move || db.db.get_topic(topic_id))
        .await?
        .ok_or(ApiError::NotFound("Topic"))?;
    if topic.course_id != course_id {
        return Err(ApiError::Validation(
            "Topic does not belong to the course".into(),
        ));
    }

    let stored = store_content(&state, course_id, topic_id, file, &claims.sub).await?;
    info!(
        "Content {} ({}) uploaded to topic {}",
        stored.content_id, stored.file_name, topic_id
    );

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(stored, "Content uploaded successfully")),
    ))
}

/// GET /contents/{id}: streams the stored blob back with its original
/// metadata. Students must be enrolled in the owning course.
pub async fn download_content(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(content_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    // Content ids are uuids; anything else can only be a traversal attempt.
    let id = content_id
        .parse::<Uuid>()
        .map_err(|_| ApiError::NotFound("Content"))?
        .to_string();

    let db = state.clone();
    let lookup = id.clone();
    let row = run_blocking(move || db.db.get_content(&lookup))
        .await?
        .ok_or(ApiError::NotFound("Content"))?;

    if claims.role == Role::Student {
        let db = state.clone();
        let user_id = claims.sub.to_string();
        let course_id = row.course_id;
        if !run_blocking(move || db.db.is_enrolled(course_id, &user_id)).await? {
            return Err(ApiError::NotEnrolled);
        }
    }

    let file = match state.store.open(&id).await {
        Ok(f) => f,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("Content {} has a metadata row but no blob", id);
            return Err(ApiError::NotFound("Content"));
        }
        Err(err) => return Err(ApiError::Internal(err.into())),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&row.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(row.size_bytes as u64),
    );
    headers.insert(
        header::ETAG,
        HeaderValue::from_str(&format!("\"{}\"", row.sha256))
            .unwrap_or_else(|_| HeaderValue::from_static("\"\"")),
    );
    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_file_name(&row.file_name)
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body))
}

/// DELETE /contents/{id}: drops the metadata row, then the blob.
pub async fn delete_content(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = content_id
        .parse::<Uuid>()
        .map_err(|_| ApiError::NotFound("Content"))?
        .to_string();

    let db = state.clone();
    let row_id = id.clone();
    let deleted = run_blocking(move || db.db.delete_content(&row_id)).await?;
    if !deleted {
        return Err(ApiError::NotFound("Content"));
    }

    state.store.delete(&id).await.ok();
    info!("Content {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

async fn parse_id_field(field: Field<'_>, name: &'static str) -> Result<i64, ApiError> {
    let raw = field.text().await.map_err(bad_part)?;
    raw.trim()
        .parse()
        .map_err(|_| ApiError::Validation(format!("{name} must be an integer")))
}

/// File names go out inside a quoted Content-Disposition value. The narrow
/// no-break space (U+202F) shows up in names generated by macOS screenshots
/// and breaks naive header parsers, so it is flattened along with regular
/// spaces and quotes.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\u{202F}' | ' ' | '"' => '_',
            c => c,
        })
        .collect()
}
