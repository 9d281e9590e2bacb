use std::collections::{HashMap, HashSet};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use tracing::{info, warn};

use expanse_db::models::QuizRow;
use expanse_db::now_ts;
use expanse_types::api::{
    Claims, CreateQuizRequest, CreateQuizResponse, QuizResult, QuizSummary, QuizView,
    ScoreEntry, StartAttemptResponse, SubmitQuizRequest, SubmittedAnswer,
};
use expanse_types::envelope::Envelope;
use expanse_types::models::{AttemptStatus, Question, Role};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::{ensure_course_access, parse_ts, run_blocking};

/// POST /quiz/create-quiz: teachers publish a quiz into a course.
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateQuizRequest>,
) -> ApiResult<impl IntoResponse> {
    let description = req.quiz_description.trim().to_string();
    if description.is_empty() {
        return Err(ApiError::Validation("quiz_description is required".into()));
    }

    validate_questions(&req.quiz_content)?;

    let max_score = req.max_score.unwrap_or(100.0);
    if !max_score.is_finite() || max_score <= 0.0 {
        return Err(ApiError::Validation("max_score must be positive".into()));
    }

    let course_id = req.course_id;
    let db = state.clone();
    if run_blocking(move || db.db.get_course(course_id)).await?.is_none() {
        return Err(ApiError::NotFound("Course"));
    }

    let content_json = serde_json::to_string(&req.quiz_content).map_err(anyhow::Error::from)?;

    let db = state.clone();
    let creator = claims.sub.to_string();
    let quiz_id = run_blocking(move || {
        db.db
            .create_quiz(course_id, &description, &content_json, max_score, &creator, &now_ts())
    })
    .await?;

    info!(
        "Quiz {} created in course {} with {} questions",
        quiz_id,
        course_id,
        req.quiz_content.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(
            CreateQuizResponse { quiz_id },
            "Quiz created successfully",
        )),
    ))
}

/// GET /quiz/get-quiz/{id}: the full quiz. Students get the questions with
/// the answer keys stripped; teachers see the keys.
pub async fn get_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let row = fetch_quiz(&state, quiz_id).await?;
    ensure_course_access(&state, row.course_id, &claims).await?;

    let questions = parse_questions(&row);
    let content = if claims.role == Role::Teacher {
        questions
    } else {
        questions.into_iter().map(|q| q.redacted()).collect()
    };

    Ok(Json(Envelope::success(
        QuizView {
            quiz_id: row.quiz_id,
            course_id: row.course_id,
            description: row.description,
            content,
            max_score: row.max_score,
        },
        "Quiz retrieved successfully",
    )))
}

/// GET /quiz/get-quiz-course/{course_id}: quiz cards for a course, without
/// question content.
pub async fn list_course_quizzes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    ensure_course_access(&state, course_id, &claims).await?;

    let db = state.clone();
    let rows = run_blocking(move || db.db.list_quizzes_for_course(course_id)).await?;

    let quizzes: Vec<QuizSummary> = rows
        .into_iter()
        .map(|row| {
            let question_count = parse_questions(&row).len();
            QuizSummary {
                quiz_id: row.quiz_id,
                course_id: row.course_id,
                description: row.description,
                max_score: row.max_score,
                question_count,
            }
        })
        .collect();

    Ok(Json(Envelope::success(
        quizzes,
        "Quizzes retrieved successfully",
    )))
}

/// POST /quiz/start/{id}: open the student's attempt and fix its deadline.
/// Starting again while in progress returns the original deadline unchanged,
/// so a page reload cannot buy extra time.
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    if claims.role != Role::Student {
        return Err(ApiError::StudentOnly);
    }

    let row = fetch_quiz(&state, quiz_id).await?;
    ensure_course_access(&state, row.course_id, &claims).await?;

    let now = Utc::now();
    let deadline = now + Duration::seconds(state.quiz_time_limit_secs as i64);

    let db = state.clone();
    let user_id = claims.sub.to_string();
    let started_at = now.to_rfc3339();
    let deadline_str = deadline.to_rfc3339();
    let (attempt, created) = run_blocking(move || {
        db.db.start_attempt(quiz_id, &user_id, &started_at, &deadline_str)
    })
    .await?;

    if !created && attempt.status != AttemptStatus::InProgress.as_str() {
        return Err(ApiError::Conflict("Quiz already completed".into()));
    }

    let response = StartAttemptResponse {
        attempt_id: attempt.attempt_id,
        quiz_id,
        deadline: parse_ts(&attempt.deadline),
        time_limit_secs: state.quiz_time_limit_secs,
    };

    if created {
        info!(
            "Attempt {} on quiz {} started, deadline {}",
            response.attempt_id, quiz_id, attempt.deadline
        );
        Ok((
            StatusCode::CREATED,
            Json(Envelope::success(response, "Quiz started successfully")),
        ))
    } else {
        Ok((
            StatusCode::OK,
            Json(Envelope::success(response, "Quiz already in progress")),
        ))
    }
}

/// POST /quiz/submit-quiz: grade the caller's open attempt. The deadline is
/// enforced here against the server clock; a submission that arrives late is
/// expired on the spot rather than graded.
pub async fn submit_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitQuizRequest>,
) -> ApiResult<impl IntoResponse> {
    if claims.role != Role::Student {
        return Err(ApiError::StudentOnly);
    }

    let row = fetch_quiz(&state, req.quiz_id).await?;
    ensure_course_access(&state, row.course_id, &claims).await?;

    let db = state.clone();
    let user_id = claims.sub.to_string();
    let quiz_id = req.quiz_id;
    let attempt = run_blocking(move || db.db.get_attempt(quiz_id, &user_id))
        .await?
        .ok_or_else(|| ApiError::Conflict("Quiz not started".into()))?;

    if attempt.status != AttemptStatus::InProgress.as_str() {
        return Err(ApiError::Conflict("Quiz already completed".into()));
    }

    if Utc::now() >= parse_ts(&attempt.deadline) {
        let db = state.clone();
        run_blocking(move || db.db.expire_overdue_attempts(&now_ts()).map(|_| ())).await?;
        return Err(ApiError::Conflict("Quiz deadline has passed".into()));
    }

    let questions = parse_questions(&row);
    let (score, correct, total) = grade(&questions, &req.answers, row.max_score);

    let db = state.clone();
    let attempt_id = attempt.attempt_id;
    let finalized =
        run_blocking(move || db.db.finalize_submission(attempt_id, score, &now_ts())).await?;
    if !finalized {
        // Lost the race against the sweeper.
        return Err(ApiError::Conflict("Quiz already completed".into()));
    }

    info!(
        "Attempt {} on quiz {} submitted: {}/{} correct, score {}",
        attempt_id, req.quiz_id, correct, total, score
    );

    Ok(Json(Envelope::success(
        QuizResult {
            quiz_id: req.quiz_id,
            attempt_id,
            score,
            max_score: row.max_score,
            correct,
            total,
            content: questions,
        },
        "Quiz submitted successfully",
    )))
}

/// GET /quiz/get-score: the caller's finished attempts, newest first.
pub async fn get_scores(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let db = state.clone();
    let user_id = claims.sub.to_string();
    let rows = run_blocking(move || db.db.list_results_for_user(&user_id)).await?;

    let scores: Vec<ScoreEntry> = rows
        .into_iter()
        .map(|row| {
            let status = row.status.parse().unwrap_or_else(|e| {
                warn!("Corrupt attempt status: {}", e);
                AttemptStatus::Expired
            });
            ScoreEntry {
                quiz_id: row.quiz_id,
                course_id: row.course_id,
                description: row.description,
                score: row.score,
                max_score: row.max_score,
                status,
                submitted_at: row.submitted_at.as_deref().map(parse_ts),
            }
        })
        .collect();

    Ok(Json(Envelope::success(
        scores,
        "Scores retrieved successfully",
    )))
}

// -- Helpers --

async fn fetch_quiz(state: &AppState, quiz_id: i64) -> Result<QuizRow, ApiError> {
    let db = state.clone();
    run_blocking(move || db.db.get_quiz(quiz_id))
        .await?
        .ok_or(ApiError::NotFound("Quiz"))
}

fn parse_questions(row: &QuizRow) -> Vec<Question> {
    serde_json::from_str(&row.content).unwrap_or_else(|e| {
        warn!("Quiz {} has corrupt content: {}", row.quiz_id, e);
        vec![]
    })
}

fn validate_questions(questions: &[Question]) -> Result<(), ApiError> {
    if questions.is_empty() {
        return Err(ApiError::Validation(
            "A quiz needs at least one question".into(),
        ));
    }

    let mut seen = HashSet::new();
    for q in questions {
        if !seen.insert(q.ques_no) {
            return Err(ApiError::Validation(format!(
                "Duplicate question number {}",
                q.ques_no
            )));
        }
        if q.question.trim().is_empty() {
            return Err(ApiError::Validation(format!(
                "Question {} has no text",
                q.ques_no
            )));
        }
        if q.options.len() < 2 {
            return Err(ApiError::Validation(format!(
                "Question {} needs at least two options",
                q.ques_no
            )));
        }
        match &q.answer {
            Some(key) if q.options.contains_key(key) => {}
            Some(_) => {
                return Err(ApiError::Validation(format!(
                    "Question {} answer is not one of its options",
                    q.ques_no
                )));
            }
            None => {
                return Err(ApiError::Validation(format!(
                    "Question {} is missing its answer key",
                    q.ques_no
                )));
            }
        }
    }
    Ok(())
}

/// Score a set of submitted answers against the question list. Answers are
/// matched by question number and the last submission for a number wins;
/// anything aimed at an unknown number is ignored.
fn grade(questions: &[Question], answers: &[SubmittedAnswer], max_score: f64) -> (f64, usize, usize) {
    let total = questions.len();
    if total == 0 {
        return (0.0, 0, 0);
    }

    let mut picked: HashMap<u32, &str> = HashMap::new();
    for answer in answers {
        picked.insert(answer.ques_no, answer.answer.as_str());
    }

    let correct = questions
        .iter()
        .filter(|q| match (&q.answer, picked.get(&q.ques_no)) {
            (Some(key), Some(given)) => key == given,
            _ => false,
        })
        .count();

    let score = max_score * correct as f64 / total as f64;
    (score, correct, total)
}
