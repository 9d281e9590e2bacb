use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Question, Role};

// -- JWT Claims --

/// JWT claims attached to every authenticated request. Canonical definition
/// lives here so the API middleware and the integration tests share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
    pub token: String,
}

// -- User directory --

/// Entry in the student directory consumed by the enrollment screen.
/// `id` is the provider account id, not the internal user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: String,
    pub name: String,
}

// -- Courses --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCourseRequest {
    pub course_code: String,
    pub course_name: String,
    pub course_description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCourseRequest {
    pub course_code: Option<String>,
    pub course_name: Option<String>,
    pub course_description: Option<String>,
}

// -- Topics & content --

/// Per-file metadata embedded in topic listings.
#[derive(Debug, Serialize, Deserialize)]
pub struct ContentSummary {
    pub content_id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicWithContents {
    pub topic_id: i64,
    pub course_id: i64,
    pub topic_name: String,
    pub topic_description: String,
    pub is_released: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub contents: Vec<ContentSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTopicRequest {
    pub topic_name: Option<String>,
    pub topic_description: Option<String>,
    pub topic_is_released: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadedContent {
    pub content_id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTopicResponse {
    pub topic_id: i64,
    pub course_id: i64,
    pub topic_name: String,
    pub is_released: bool,
    pub contents: Vec<UploadedContent>,
}

// -- Discussion forum --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub post_title: String,
    pub post_content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePostRequest {
    pub post_title: Option<String>,
    pub post_content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostSummary {
    pub post_id: i64,
    pub course_id: i64,
    pub post_title: String,
    pub post_content: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub vote_score: i64,
    pub comment_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoteRequest {
    /// +1 for an upvote, -1 for a downvote.
    pub value: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub post_id: i64,
    pub vote_score: i64,
    /// The caller's vote after the operation; None when a repeated vote
    /// in the same direction toggled it off.
    pub your_vote: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub comment_content: String,
    pub reply_to: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommentRequest {
    pub comment_content: String,
}

// -- Quizzes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateQuizRequest {
    pub quiz_description: String,
    pub quiz_content: Vec<Question>,
    pub max_score: Option<f64>,
    pub course_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateQuizResponse {
    pub quiz_id: i64,
}

/// Full quiz as served to a client. The answer keys inside `content` are
/// present only on the teacher path.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizView {
    pub quiz_id: i64,
    pub course_id: i64,
    pub description: String,
    pub content: Vec<Question>,
    pub max_score: f64,
}

/// Listing entry: no question content, just enough to render a quiz card.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizSummary {
    pub quiz_id: i64,
    pub course_id: i64,
    pub description: String,
    pub max_score: f64,
    pub question_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartAttemptResponse {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub deadline: DateTime<Utc>,
    pub time_limit_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedAnswer {
    pub ques_no: u32,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitQuizRequest {
    pub quiz_id: i64,
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuizResult {
    pub quiz_id: i64,
    pub attempt_id: i64,
    pub score: f64,
    pub max_score: f64,
    pub correct: usize,
    pub total: usize,
    /// Question list with answer keys included, for the results screen.
    pub content: Vec<Question>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub quiz_id: i64,
    pub course_id: i64,
    pub description: String,
    pub score: f64,
    pub max_score: f64,
    pub status: crate::models::AttemptStatus,
    pub submitted_at: Option<DateTime<Utc>>,
}

// -- Enrollment --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrollmentRequest {
    /// Provider account ids of the users to enroll; replaces the whole set.
    pub user_id: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnrollmentList {
    pub users: Vec<String>,
}
