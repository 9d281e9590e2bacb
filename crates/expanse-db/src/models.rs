//! Database row types mapping directly to SQLite rows. Distinct from the
//! expanse-types wire models so the persistence layer stays independent of
//! the HTTP contract; the API layer converts.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: Option<String>,
    pub role: String,
    pub created_at: String,
}

/// One `(provider_account_id, name)` pair from the student directory.
pub struct DirectoryRow {
    pub provider_account_id: String,
    pub name: String,
}

pub struct CourseRow {
    pub course_id: i64,
    pub course_code: String,
    pub course_name: String,
    pub course_description: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_by: String,
    pub updated_at: String,
}

pub struct TopicRow {
    pub topic_id: i64,
    pub course_id: i64,
    pub topic_name: String,
    pub topic_description: String,
    pub is_released: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_by: String,
    pub updated_at: String,
}

pub struct ContentRow {
    pub content_id: String,
    pub course_id: i64,
    pub topic_id: i64,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub created_by: String,
    pub created_at: String,
}

pub struct PostRow {
    pub post_id: i64,
    pub course_id: i64,
    pub post_title: String,
    pub post_content: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Post plus the aggregates the forum listing shows.
pub struct PostSummaryRow {
    pub post_id: i64,
    pub course_id: i64,
    pub post_title: String,
    pub post_content: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    pub vote_score: i64,
    pub comment_count: i64,
}

pub struct CommentRow {
    pub comment_id: i64,
    pub post_id: i64,
    pub comment_content: String,
    pub reply_to: Option<i64>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// `content` is the question list as stored JSON; the API layer parses it.
pub struct QuizRow {
    pub quiz_id: i64,
    pub course_id: i64,
    pub description: String,
    pub content: String,
    pub max_score: f64,
    pub created_by: String,
    pub created_at: String,
}

pub struct AttemptRow {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub user_id: String,
    pub started_at: String,
    pub deadline: String,
    pub status: String,
    pub score: Option<f64>,
    pub submitted_at: Option<String>,
}

/// One finished attempt joined with its quiz, for the score listing.
pub struct ScoreRow {
    pub quiz_id: i64,
    pub course_id: i64,
    pub description: String,
    pub score: f64,
    pub max_score: f64,
    pub status: String,
    pub submitted_at: Option<String>,
}
