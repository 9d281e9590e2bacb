use anyhow::Result;
use rusqlite::Row;

use crate::models::{ContentRow, TopicRow};
use crate::{Database, OptionalExt};

impl Database {
    // -- Topics --

    pub fn create_topic(
        &self,
        course_id: i64,
        name: &str,
        description: &str,
        is_released: bool,
        created_by: &str,
        now: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO topics
                     (course_id, topic_name, topic_description, is_released,
                      created_by, created_at, updated_by, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?5, ?6)",
                rusqlite::params![course_id, name, description, is_released, created_by, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_topic(&self, topic_id: i64) -> Result<Option<TopicRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT topic_id, course_id, topic_name, topic_description, is_released,
                        created_by, created_at, updated_by, updated_at
                 FROM topics WHERE topic_id = ?1",
                [topic_id],
                map_topic_row,
            )
            .optional()
        })
    }

    /// Topics of a course in creation order. `released_only` is the student
    /// view; teachers see unreleased topics too.
    pub fn list_topics_for_course(&self, course_id: i64, released_only: bool) -> Result<Vec<TopicRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT topic_id, course_id, topic_name, topic_description, is_released,
                        created_by, created_at, updated_by, updated_at
                 FROM topics
                 WHERE course_id = ?1 AND (is_released = 1 OR ?2 = 0)
                 ORDER BY topic_id",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![course_id, released_only], map_topic_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn update_topic(
        &self,
        topic_id: i64,
        name: &str,
        description: &str,
        is_released: bool,
        updated_by: &str,
        now: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE topics
                 SET topic_name = ?2, topic_description = ?3, is_released = ?4,
                     updated_by = ?5, updated_at = ?6
                 WHERE topic_id = ?1",
                rusqlite::params![topic_id, name, description, is_released, updated_by, now],
            )?;
            Ok(changed > 0)
        })
    }

    /// Delete a topic; its content rows go with it via cascade. Returns the
    /// content ids whose blobs the caller must remove from disk.
    pub fn delete_topic(&self, topic_id: i64) -> Result<Vec<String>> {
        self.with_conn_mut(|conn| {
            let mut stmt = conn.prepare("SELECT content_id FROM contents WHERE topic_id = ?1")?;
            let content_ids = stmt
                .query_map([topic_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            drop(stmt);

            conn.execute("DELETE FROM topics WHERE topic_id = ?1", [topic_id])?;
            Ok(content_ids)
        })
    }

    // -- Contents --

    #[allow(clippy::too_many_arguments)]
    pub fn insert_content(
        &self,
        content_id: &str,
        course_id: i64,
        topic_id: i64,
        file_name: &str,
        mime_type: &str,
        size_bytes: i64,
        sha256: &str,
        created_by: &str,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO contents
                     (content_id, course_id, topic_id, file_name, mime_type,
                      size_bytes, sha256, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    content_id, course_id, topic_id, file_name, mime_type, size_bytes, sha256,
                    created_by, now
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_content(&self, content_id: &str) -> Result<Option<ContentRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT content_id, course_id, topic_id, file_name, mime_type,
                        size_bytes, sha256, created_by, created_at
                 FROM contents WHERE content_id = ?1",
                [content_id],
                map_content_row,
            )
            .optional()
        })
    }

    /// Batch-fetch content rows for a set of topics, for assembling topic
    /// listings without an N+1.
    pub fn list_contents_for_topics(&self, topic_ids: &[i64]) -> Result<Vec<ContentRow>> {
        if topic_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=topic_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT content_id, course_id, topic_id, file_name, mime_type,
                        size_bytes, sha256, created_by, created_at
                 FROM contents WHERE topic_id IN ({}) ORDER BY created_at",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = topic_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), map_content_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn delete_content(&self, content_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM contents WHERE content_id = ?1", [content_id])?;
            Ok(changed > 0)
        })
    }
}

fn map_topic_row(row: &Row<'_>) -> rusqlite::Result<TopicRow> {
    Ok(TopicRow {
        topic_id: row.get(0)?,
        course_id: row.get(1)?,
        topic_name: row.get(2)?,
        topic_description: row.get(3)?,
        is_released: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        updated_by: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn map_content_row(row: &Row<'_>) -> rusqlite::Result<ContentRow> {
    Ok(ContentRow {
        content_id: row.get(0)?,
        course_id: row.get(1)?,
        topic_id: row.get(2)?,
        file_name: row.get(3)?,
        mime_type: row.get(4)?,
        size_bytes: row.get(5)?,
        sha256: row.get(6)?,
        created_by: row.get(7)?,
        created_at: row.get(8)?,
    })
}
