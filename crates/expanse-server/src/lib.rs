// Router assembly lives in the library so integration tests can drive the
// exact route table the binary serves.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};

use expanse_api::middleware::{require_auth, require_teacher};
use expanse_api::state::AppState;
use expanse_api::{auth, contents, courses, enrollments, forum, quizzes, topics, users};

/// Slack on top of the per-file upload cap for multipart framing and the
/// form fields that ride along with a file.
const UPLOAD_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Assemble the full route table around the shared state. CORS and tracing
/// layers are the caller's business.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/courses", get(courses::list_courses))
        .route("/courses/{course_id}", get(courses::get_course))
        .route("/courses/{course_id}/topics", get(topics::list_course_topics))
        .route("/contents/{content_id}", get(contents::download_content))
        .route(
            "/courses/{course_id}/discussions",
            get(forum::list_posts).post(forum::create_post),
        )
        .route(
            "/courses/{course_id}/discussions/{post_id}",
            put(forum::update_post).delete(forum::delete_post),
        )
        .route(
            "/courses/{course_id}/discussions/{post_id}/vote",
            put(forum::vote_post),
        )
        .route(
            "/courses/{course_id}/discussions/{post_id}/comments",
            get(forum::list_comments).post(forum::create_comment),
        )
        .route(
            "/courses/{course_id}/discussions/comments/{comment_id}",
            put(forum::update_comment).delete(forum::delete_comment),
        )
        .route("/quiz/get-quiz/{quiz_id}", get(quizzes::get_quiz))
        .route("/quiz/get-quiz-course/{course_id}", get(quizzes::list_course_quizzes))
        .route("/quiz/start/{quiz_id}", post(quizzes::start_attempt))
        .route("/quiz/submit-quiz", post(quizzes::submit_quiz))
        .route("/quiz/get-score", get(quizzes::get_scores))
        .route("/api/users/{provider_account_id}", get(users::get_user))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let teacher_routes = Router::new()
        .route("/courses", post(courses::create_course))
        .route(
            "/courses/{course_id}",
            put(courses::update_course).delete(courses::delete_course),
        )
        .route(
            "/courses/{course_id}/enrollment",
            get(enrollments::get_enrollment).put(enrollments::replace_enrollment),
        )
        .route("/topics", post(topics::create_topic))
        .route(
            "/topics/{topic_id}",
            put(topics::update_topic).delete(topics::delete_topic),
        )
        .route("/contents", post(contents::upload_content))
        .route("/contents/{content_id}", delete(contents::delete_content))
        .route("/quiz/create-quiz", post(quizzes::create_quiz))
        .route("/api/users", get(users::directory))
        .layer(middleware::from_fn(require_teacher))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let body_limit = state.max_upload_bytes as usize + UPLOAD_OVERHEAD_BYTES;

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(teacher_routes)
        .layer(DefaultBodyLimit::max(body_limit))
}

async fn health() -> &'static str {
    "ok"
}
