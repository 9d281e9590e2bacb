use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use expanse_db::models::TopicRow;
use expanse_db::now_ts;
use expanse_types::api::{
    Claims, ContentSummary, CreateTopicResponse, TopicWithContents, UpdateTopicRequest,
    UploadedContent,
};
use expanse_types::envelope::Envelope;
use expanse_types::models::Role;

use crate::contents::{UploadPart, bad_part, read_file_part, store_content};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::{parse_ts, run_blocking};

/// POST /topics: multipart form carrying the topic fields plus any number
/// of `files` parts, each stored as a content blob under the new topic.
pub async fn create_topic(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut topic_name: Option<String> = None;
    let mut topic_description: Option<String> = None;
    let mut course_id: Option<i64> = None;
    let mut is_released = false;
    let mut files: Vec<UploadPart> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_part)? {
        match field.name().unwrap_or("") {
            "topic_name" => topic_name = Some(field.text().await.map_err(bad_part)?),
            "topic_description" => {
                topic_description = Some(field.text().await.map_err(bad_part)?)
            }
            "course_id" => {
                let raw = field.text().await.map_err(bad_part)?;
                course_id = Some(raw.trim().parse().map_err(|_| {
                    ApiError::Validation("course_id must be an integer".into())
                })?);
            }
            "topic_is_released" => {
                let raw = field.text().await.map_err(bad_part)?;
                is_released = matches!(raw.trim(), "true" | "1");
            }
            "files" => files.push(read_file_part(field, state.max_upload_bytes).await?),
            other => warn!("Ignoring unexpected multipart field {:?}", other),
        }
    }

    let topic_name = topic_name
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("topic_name is required".into()))?;
    let topic_description = topic_description
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let course_id =
        course_id.ok_or_else(|| ApiError::Validation("course_id is required".into()))?;

    let db = state.clone();
    if run_blocking(move || db.db.get_course(course_id)).await?.is_none() {
        return Err(ApiError::NotFound("Course"));
    }

    let db = state.clone();
    let creator = claims.sub.to_string();
    let name = topic_name.clone();
    let description = topic_description.clone();
    let topic_id = run_blocking(move || {
        db.db
            .create_topic(course_id, &name, &description, is_released, &creator, &now_ts())
    })
    .await?;

    let mut contents: Vec<UploadedContent> = Vec::with_capacity(files.len());
    for part in files {
        contents.push(store_content(&state, course_id, topic_id, part, &claims.sub).await?);
    }

    info!(
        "Topic {} created in course {} with {} files",
        topic_id,
        course_id,
        contents.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(
            CreateTopicResponse {
                topic_id,
                course_id,
                topic_name,
                is_released,
                contents,
            },
            "Topic created successfully",
        )),
    ))
}

/// GET /courses/{id}/topics: the course's topics with their content
/// metadata. Students only see released topics.
pub async fn list_course_topics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let released_only = claims.role != Role::Teacher;

    let db = state.clone();
    let (topics, contents) = run_blocking(move || {
        if db.db.get_course(course_id)?.is_none() {
            return Ok(None);
        }
        let topics = db.db.list_topics_for_course(course_id, released_only)?;
        let ids: Vec<i64> = topics.iter().map(|t| t.topic_id).collect();
        let contents = db.db.list_contents_for_topics(&ids)?;
        Ok(Some((topics, contents)))
    })
    .await?
    .ok_or(ApiError::NotFound("Course"))?;

    let mut by_topic: HashMap<i64, Vec<ContentSummary>> = HashMap::new();
    for row in contents {
        by_topic
            .entry(row.topic_id)
            .or_default()
            .push(ContentSummary {
                content_id: crate::parse_uuid(&row.content_id),
                file_name: row.file_name,
                mime_type: row.mime_type,
                size_bytes: row.size_bytes as u64,
            });
    }

    let topics: Vec<TopicWithContents> = topics
        .into_iter()
        .map(|row| {
            let contents = by_topic.remove(&row.topic_id).unwrap_or_default();
            topic_with_contents(row, contents)
        })
        .collect();

    Ok(Json(Envelope::success(
        topics,
        "Topics retrieved successfully",
    )))
}

/// PUT /topics/{id}: partial update; flipping `topic_is_released` is how a
/// teacher publishes or hides a topic.
pub async fn update_topic(
    State(state): State<AppState>,
    Path(topic_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateTopicRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.topic_name.is_none()
        && req.topic_description.is_none()
        && req.topic_is_released.is_none()
    {
        return Err(ApiError::Validation("Nothing to update".into()));
    }

    let db = state.clone();
    let existing = run_blocking(move || db.db.get_topic(topic_id))
        .await?
        .ok_or(ApiError::NotFound("Topic"))?;

    let name = match req.topic_name {
        None => existing.topic_name.clone(),
        Some(v) => {
            let v = v.trim().to_string();
            if v.is_empty() {
                return Err(ApiError::Validation("topic_name must not be blank".into()));
            }
            v
        }
    };
    let description = match req.topic_description {
        None => existing.topic_description.clone(),
        Some(v) => v.trim().to_string(),
    };
    let is_released = req.topic_is_released.unwrap_or(existing.is_released);

    let db = state.clone();
    let updater = claims.sub.to_string();
    let (row_name, row_desc) = (name, description);
    let row = run_blocking(move || {
        db.db
            .update_topic(topic_id, &row_name, &row_desc, is_released, &updater, &now_ts())?;
        db.db
            .get_topic(topic_id)?
            .ok_or_else(|| anyhow::anyhow!("Topic vanished during update"))
    })
    .await?;

    let db = state.clone();
    let contents = run_blocking(move || db.db.list_contents_for_topics(&[topic_id])).await?;
    let contents = contents
        .into_iter()
        .map(|c| ContentSummary {
            content_id: crate::parse_uuid(&c.content_id),
            file_name: c.file_name,
            mime_type: c.mime_type,
            size_bytes: c.size_bytes as u64,
        })
        .collect();

    Ok(Json(Envelope::success(
        topic_with_contents(row, contents),
        "Topic updated successfully",
    )))
}

/// DELETE /topics/{id}: removes the topic, its content rows and blobs.
pub async fn delete_topic(
    State(state): State<AppState>,
    Path(topic_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let db = state.clone();
    let blob_ids = run_blocking(move || {
        if db.db.get_topic(topic_id)?.is_none() {
            return Ok(None);
        }
        db.db.delete_topic(topic_id).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("Topic"))?;

    for id in &blob_ids {
        state.store.delete(id).await.ok();
    }

    info!("Deleted topic {} and {} content blobs", topic_id, blob_ids.len());
    Ok(StatusCode::NO_CONTENT)
}

fn topic_with_contents(row: TopicRow, contents: Vec<ContentSummary>) -> TopicWithContents {
    TopicWithContents {
        topic_id: row.topic_id,
        course_id: row.course_id,
        topic_name: row.topic_name,
        topic_description: row.topic_description,
        is_released: row.is_released,
        created_at: parse_ts(&row.created_at),
        updated_at: parse_ts(&row.updated_at),
        contents,
    }
}
