use anyhow::{Result, anyhow};
use expanse_types::models::AttemptStatus;
use rusqlite::{Connection, Row};

use crate::models::{AttemptRow, QuizRow, ScoreRow};
use crate::{Database, OptionalExt};

impl Database {
    // -- Quizzes --

    pub fn create_quiz(
        &self,
        course_id: i64,
        description: &str,
        content_json: &str,
        max_score: f64,
        created_by: &str,
        now: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO quizzes (course_id, description, content, max_score, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![course_id, description, content_json, max_score, created_by, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_quiz(&self, quiz_id: i64) -> Result<Option<QuizRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT quiz_id, course_id, description, content, max_score, created_by, created_at
                 FROM quizzes WHERE quiz_id = ?1",
                [quiz_id],
                map_quiz_row,
            )
            .optional()
        })
    }

    pub fn list_quizzes_for_course(&self, course_id: i64) -> Result<Vec<QuizRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT quiz_id, course_id, description, content, max_score, created_by, created_at
                 FROM quizzes WHERE course_id = ?1 ORDER BY quiz_id",
            )?;

            let rows = stmt
                .query_map([course_id], map_quiz_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Attempts --

    /// Start (or resume) the caller's attempt on a quiz. One attempt per
    /// user per quiz: if one already exists it is returned unchanged, so a
    /// re-start while in progress sees the original deadline and a re-start
    /// after finishing sees the recorded outcome. The bool is true when a
    /// fresh attempt was created.
    pub fn start_attempt(
        &self,
        quiz_id: i64,
        user_id: &str,
        now: &str,
        deadline: &str,
    ) -> Result<(AttemptRow, bool)> {
        self.with_conn_mut(|conn| {
            if let Some(existing) = query_attempt(conn, quiz_id, user_id)? {
                return Ok((existing, false));
            }

            conn.execute(
                "INSERT INTO quiz_attempts (quiz_id, user_id, started_at, deadline, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    quiz_id,
                    user_id,
                    now,
                    deadline,
                    AttemptStatus::InProgress.as_str()
                ],
            )?;

            let row = query_attempt(conn, quiz_id, user_id)?
                .ok_or_else(|| anyhow!("Attempt vanished after insert"))?;
            Ok((row, true))
        })
    }

    pub fn get_attempt(&self, quiz_id: i64, user_id: &str) -> Result<Option<AttemptRow>> {
        self.with_conn(|conn| query_attempt(conn, quiz_id, user_id))
    }

    /// Record a graded submission. The status guard makes the
    /// in_progress -> submitted transition happen at most once; false means
    /// the attempt was already finalized (or never existed).
    pub fn finalize_submission(&self, attempt_id: i64, score: f64, submitted_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE quiz_attempts
                 SET status = ?2, score = ?3, submitted_at = ?4
                 WHERE attempt_id = ?1 AND status = ?5",
                rusqlite::params![
                    attempt_id,
                    AttemptStatus::Submitted.as_str(),
                    score,
                    submitted_at,
                    AttemptStatus::InProgress.as_str()
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Finalize every in-progress attempt whose deadline has passed, with a
    /// zero score. The same status guard as submission means each attempt
    /// expires exactly once; returns how many were flipped.
    pub fn expire_overdue_attempts(&self, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE quiz_attempts
                 SET status = ?2, score = 0, submitted_at = deadline
                 WHERE status = ?1 AND deadline < ?3",
                rusqlite::params![
                    AttemptStatus::InProgress.as_str(),
                    AttemptStatus::Expired.as_str(),
                    now
                ],
            )?;
            Ok(changed)
        })
    }

    /// Finished attempts of one user joined with their quizzes, newest
    /// submission first. In-progress attempts are not results yet.
    pub fn list_results_for_user(&self, user_id: &str) -> Result<Vec<ScoreRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.quiz_id, q.course_id, q.description,
                        COALESCE(a.score, 0), q.max_score, a.status, a.submitted_at
                 FROM quiz_attempts a
                 JOIN quizzes q ON q.quiz_id = a.quiz_id
                 WHERE a.user_id = ?1 AND a.status != ?2
                 ORDER BY a.submitted_at DESC",
            )?;

            let rows = stmt
                .query_map(
                    rusqlite::params![user_id, AttemptStatus::InProgress.as_str()],
                    |row| {
                        Ok(ScoreRow {
                            quiz_id: row.get(0)?,
                            course_id: row.get(1)?,
                            description: row.get(2)?,
                            score: row.get(3)?,
                            max_score: row.get(4)?,
                            status: row.get(5)?,
                            submitted_at: row.get(6)?,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn map_quiz_row(row: &Row<'_>) -> rusqlite::Result<QuizRow> {
    Ok(QuizRow {
        quiz_id: row.get(0)?,
        course_id: row.get(1)?,
        description: row.get(2)?,
        content: row.get(3)?,
        max_score: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn query_attempt(conn: &Connection, quiz_id: i64, user_id: &str) -> Result<Option<AttemptRow>> {
    conn.query_row(
        "SELECT attempt_id, quiz_id, user_id, started_at, deadline, status, score, submitted_at
         FROM quiz_attempts WHERE quiz_id = ?1 AND user_id = ?2",
        rusqlite::params![quiz_id, user_id],
        |row| {
            Ok(AttemptRow {
                attempt_id: row.get(0)?,
                quiz_id: row.get(1)?,
                user_id: row.get(2)?,
                started_at: row.get(3)?,
                deadline: row.get(4)?,
                status: row.get(5)?,
                score: row.get(6)?,
                submitted_at: row.get(7)?,
            })
        },
    )
    .optional()
}
