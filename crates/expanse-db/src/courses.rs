use anyhow::Result;
use rusqlite::Row;

use crate::models::CourseRow;
use crate::{Database, OptionalExt};

impl Database {
    // -- Courses --

    pub fn create_course(
        &self,
        code: &str,
        name: &str,
        description: &str,
        created_by: &str,
        now: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO courses
                     (course_code, course_name, course_description,
                      created_by, created_at, updated_by, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?4, ?5)",
                rusqlite::params![code, name, description, created_by, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_course(&self, course_id: i64) -> Result<Option<CourseRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT course_id, course_code, course_name, course_description,
                        created_by, created_at, updated_by, updated_at
                 FROM courses WHERE course_id = ?1",
                [course_id],
                map_course_row,
            )
            .optional()
        })
    }

    pub fn get_course_by_code(&self, code: &str) -> Result<Option<CourseRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT course_id, course_code, course_name, course_description,
                        created_by, created_at, updated_by, updated_at
                 FROM courses WHERE course_code = ?1",
                [code],
                map_course_row,
            )
            .optional()
        })
    }

    pub fn list_courses(&self) -> Result<Vec<CourseRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT course_id, course_code, course_name, course_description,
                        created_by, created_at, updated_by, updated_at
                 FROM courses ORDER BY course_code",
            )?;

            let rows = stmt
                .query_map([], map_course_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Full-row update; the handler merges partial requests against the
    /// current row before calling. Returns false when the course is gone.
    pub fn update_course(
        &self,
        course_id: i64,
        code: &str,
        name: &str,
        description: &str,
        updated_by: &str,
        now: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE courses
                 SET course_code = ?2, course_name = ?3, course_description = ?4,
                     updated_by = ?5, updated_at = ?6
                 WHERE course_id = ?1",
                rusqlite::params![course_id, code, name, description, updated_by, now],
            )?;
            Ok(changed > 0)
        })
    }

    /// Delete a course and everything hanging off it (topics, contents,
    /// posts, comments, votes, enrollments, quizzes and attempts, all via
    /// FK cascade). Returns the ids of the content blobs that the caller
    /// still has to remove from disk.
    pub fn delete_course(&self, course_id: i64) -> Result<Vec<String>> {
        self.with_conn_mut(|conn| {
            let mut stmt =
                conn.prepare("SELECT content_id FROM contents WHERE course_id = ?1")?;
            let content_ids = stmt
                .query_map([course_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            drop(stmt);

            conn.execute("DELETE FROM courses WHERE course_id = ?1", [course_id])?;
            Ok(content_ids)
        })
    }

    // -- Enrollment --

    /// Provider account ids of everyone enrolled in the course.
    pub fn list_enrollment(&self, course_id: i64) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.provider_account_id
                 FROM enrollments e
                 JOIN accounts a ON a.user_id = e.user_id
                 WHERE e.course_id = ?1
                 ORDER BY a.provider_account_id",
            )?;

            let rows = stmt
                .query_map([course_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Replace the course's enrollment set wholesale with the given internal
    /// user ids. The enrollment screen stages adds and removes client-side
    /// and saves once, so the write is a full swap in one transaction.
    pub fn replace_enrollments(&self, course_id: i64, user_ids: &[String], now: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM enrollments WHERE course_id = ?1", [course_id])?;
            for user_id in user_ids {
                tx.execute(
                    "INSERT INTO enrollments (course_id, user_id, enrolled_at)
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![course_id, user_id, now],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn is_enrolled(&self, course_id: i64, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM enrollments WHERE course_id = ?1 AND user_id = ?2",
                    rusqlite::params![course_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }
}

fn map_course_row(row: &Row<'_>) -> rusqlite::Result<CourseRow> {
    Ok(CourseRow {
        course_id: row.get(0)?,
        course_code: row.get(1)?,
        course_name: row.get(2)?,
        course_description: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
        updated_by: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
