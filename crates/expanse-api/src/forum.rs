use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

use expanse_db::models::{CommentRow, PostSummaryRow};
use expanse_db::now_ts;
use expanse_types::api::{
    Claims, CreateCommentRequest, CreatePostRequest, PostSummary, UpdateCommentRequest,
    UpdatePostRequest, VoteRequest, VoteResponse,
};
use expanse_types::envelope::Envelope;
use expanse_types::models::Comment;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::{ensure_course_access, parse_ts, parse_uuid, run_blocking};

// -- Posts --

pub async fn list_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    ensure_course_access(&state, course_id, &claims).await?;

    let db = state.clone();
    let rows = run_blocking(move || db.db.list_posts_for_course(course_id)).await?;
    if rows.is_empty() {
        return Err(ApiError::NoPosts);
    }

    let posts: Vec<PostSummary> = rows.into_iter().map(post_summary).collect();
    Ok(Json(Envelope::success(
        posts,
        "All posts retrieved successfully",
    )))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    ensure_course_access(&state, course_id, &claims).await?;

    let title = req.post_title.trim().to_string();
    let content = req.post_content.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return Err(ApiError::Validation(
            "Post title and content are required".into(),
        ));
    }

    let db = state.clone();
    let author = claims.sub.to_string();
    let row = run_blocking(move || {
        let id = db.db.create_post(course_id, &title, &content, &author, &now_ts())?;
        db.db
            .get_post_summary(id)?
            .ok_or_else(|| anyhow::anyhow!("Post vanished after insert"))
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(
            post_summary(row),
            "Post created successfully",
        )),
    ))
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, post_id)): Path<(i64, i64)>,
    Json(req): Json<UpdatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    ensure_course_access(&state, course_id, &claims).await?;

    if req.post_title.is_none() && req.post_content.is_none() {
        return Err(ApiError::Validation("Nothing to update".into()));
    }

    let existing = post_in_course(&state, course_id, post_id).await?;
    if existing.created_by != claims.sub.to_string() {
        return Err(ApiError::NotAuthor);
    }

    let title = merge_text(req.post_title, &existing.post_title, "post_title")?;
    let content = merge_text(req.post_content, &existing.post_content, "post_content")?;

    let db = state.clone();
    let row = run_blocking(move || {
        db.db.update_post(post_id, &title, &content, &now_ts())?;
        db.db
            .get_post_summary(post_id)?
            .ok_or_else(|| anyhow::anyhow!("Post vanished during update"))
    })
    .await?;

    Ok(Json(Envelope::success(
        post_summary(row),
        "Post updated successfully",
    )))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, post_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    ensure_course_access(&state, course_id, &claims).await?;

    let existing = post_in_course(&state, course_id, post_id).await?;
    if existing.created_by != claims.sub.to_string() {
        return Err(ApiError::NotAuthor);
    }

    let db = state.clone();
    run_blocking(move || {
        db.db.delete_post(post_id)?;
        Ok(())
    })
    .await?;

    info!("Post {} deleted by its author", post_id);
    Ok(Json(Envelope::success(
        json!({}),
        "Post deleted successfully",
    )))
}

// -- Votes --

pub async fn vote_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, post_id)): Path<(i64, i64)>,
    Json(req): Json<VoteRequest>,
) -> ApiResult<impl IntoResponse> {
    ensure_course_access(&state, course_id, &claims).await?;

    if req.value != 1 && req.value != -1 {
        return Err(ApiError::Validation("value must be 1 or -1".into()));
    }

    post_in_course(&state, course_id, post_id).await?;

    let db = state.clone();
    let voter = claims.sub.to_string();
    let value = req.value;
    let (your_vote, vote_score) =
        run_blocking(move || db.db.toggle_vote(post_id, &voter, value)).await?;

    Ok(Json(Envelope::success(
        VoteResponse {
            post_id,
            vote_score,
            your_vote,
        },
        "Vote recorded successfully",
    )))
}

// -- Comments --

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, post_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    ensure_course_access(&state, course_id, &claims).await?;
    post_in_course(&state, course_id, post_id).await?;

    let db = state.clone();
    let rows = run_blocking(move || db.db.list_comments_for_post(post_id)).await?;

    // An empty thread is a normal state, unlike an empty forum.
    let message = if rows.is_empty() {
        "No Comments Found"
    } else {
        "Comments retrieved successfully"
    };

    let comments: Vec<Comment> = rows.into_iter().map(comment_model).collect();
    Ok(Json(Envelope::success(comments, message)))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, post_id)): Path<(i64, i64)>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    ensure_course_access(&state, course_id, &claims).await?;
    post_in_course(&state, course_id, post_id).await?;

    let content = req.comment_content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::Validation("comment_content is required".into()));
    }

    if let Some(parent_id) = req.reply_to {
        let db = state.clone();
        let parent = run_blocking(move || db.db.get_comment(parent_id))
            .await?
            .filter(|c| c.post_id == post_id);
        if parent.is_none() {
            return Err(ApiError::Validation(
                "reply_to must reference a comment on the same post".into(),
            ));
        }
    }

    let db = state.clone();
    let author = claims.sub.to_string();
    let reply_to = req.reply_to;
    let row = run_blocking(move || {
        let id = db.db.create_comment(post_id, &content, reply_to, &author, &now_ts())?;
        db.db
            .get_comment(id)?
            .ok_or_else(|| anyhow::anyhow!("Comment vanished after insert"))
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(
            comment_model(row),
            "Comment created successfully",
        )),
    ))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, comment_id)): Path<(i64, i64)>,
    Json(req): Json<UpdateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    ensure_course_access(&state, course_id, &claims).await?;

    let existing = comment_in_course(&state, course_id, comment_id).await?;
    if existing.created_by != claims.sub.to_string() {
        return Err(ApiError::NotAuthor);
    }

    let content = req.comment_content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::Validation("comment_content is required".into()));
    }

    let db = state.clone();
    let row = run_blocking(move || {
        db.db.update_comment(comment_id, &content, &now_ts())?;
        db.db
            .get_comment(comment_id)?
            .ok_or_else(|| anyhow::anyhow!("Comment vanished during update"))
    })
    .await?;

    Ok(Json(Envelope::success(
        comment_model(row),
        "Comment updated successfully",
    )))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, comment_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    ensure_course_access(&state, course_id, &claims).await?;

    let existing = comment_in_course(&state, course_id, comment_id).await?;
    if existing.created_by != claims.sub.to_string() {
        return Err(ApiError::NotAuthor);
    }

    let db = state.clone();
    run_blocking(move || {
        db.db.delete_comment(comment_id)?;
        Ok(())
    })
    .await?;

    Ok(Json(Envelope::success(
        json!({}),
        "Comment deleted successfully",
    )))
}

// -- Helpers --

/// A post id from another course's URL is treated as absent, so the forum
/// of one course can never read or touch another's.
async fn post_in_course(
    state: &AppState,
    course_id: i64,
    post_id: i64,
) -> Result<expanse_db::models::PostRow, ApiError> {
    let db = state.clone();
    run_blocking(move || db.db.get_post(post_id))
        .await?
        .filter(|p| p.course_id == course_id)
        .ok_or(ApiError::NotFound("Post"))
}

async fn comment_in_course(
    state: &AppState,
    course_id: i64,
    comment_id: i64,
) -> Result<CommentRow, ApiError> {
    let db = state.clone();
    let found = run_blocking(move || {
        let Some(comment) = db.db.get_comment(comment_id)? else {
            return Ok(None);
        };
        let post = db.db.get_post(comment.post_id)?;
        Ok(post.filter(|p| p.course_id == course_id).map(|_| comment))
    })
    .await?;
    found.ok_or(ApiError::NotFound("Comment"))
}

fn merge_text(new: Option<String>, current: &str, field: &str) -> Result<String, ApiError> {
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

fn post_summary(row: PostSummaryRow) -> PostSummary {
    PostSummary {
        post_id: row.post_id,
        course_id: row.course_id,
        post_title: row.post_title,
        post_content: row.post_content,
        created_by: parse_uuid(&row.created_by),
        created_at: parse_ts(&row.created_at),
        updated_at: parse_ts(&row.updated_at),
        vote_score: row.vote_score,
        comment_count: row.comment_count,
    }
}

fn comment_model(row: CommentRow) -> Comment {
    Comment {
        comment_id: row.comment_id,
        post_id: row.post_id,
        comment_content: row.comment_content,
        reply_to: row.reply_to,
        created_by: parse_uuid(&row.created_by),
        created_at: parse_ts(&row.created_at),
        updated_at: parse_ts(&row.updated_at),
    }
}
