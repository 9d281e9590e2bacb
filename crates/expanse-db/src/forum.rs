use anyhow::Result;
use rusqlite::Row;

use crate::models::{CommentRow, PostRow, PostSummaryRow};
use crate::{Database, OptionalExt};

impl Database {
    // -- Posts --

    pub fn create_post(
        &self,
        course_id: i64,
        title: &str,
        content: &str,
        created_by: &str,
        now: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts (course_id, post_title, post_content, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![course_id, title, content, created_by, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_post(&self, post_id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT post_id, course_id, post_title, post_content, created_by, created_at, updated_at
                 FROM posts WHERE post_id = ?1",
                [post_id],
                |row| {
                    Ok(PostRow {
                        post_id: row.get(0)?,
                        course_id: row.get(1)?,
                        post_title: row.get(2)?,
                        post_content: row.get(3)?,
                        created_by: row.get(4)?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Posts of a course, most recently updated first, with the vote score
    /// and comment count the forum listing shows.
    pub fn list_posts_for_course(&self, course_id: i64) -> Result<Vec<PostSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.post_id, p.course_id, p.post_title, p.post_content,
                        p.created_by, p.created_at, p.updated_at,
                        COALESCE((SELECT SUM(v.value) FROM votes v WHERE v.post_id = p.post_id), 0),
                        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.post_id)
                 FROM posts p
                 WHERE p.course_id = ?1
                 ORDER BY p.updated_at DESC",
            )?;

            let rows = stmt
                .query_map([course_id], map_post_summary_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Single post with the same score and comment count as the listing.
    pub fn get_post_summary(&self, post_id: i64) -> Result<Option<PostSummaryRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT p.post_id, p.course_id, p.post_title, p.post_content,
                        p.created_by, p.created_at, p.updated_at,
                        COALESCE((SELECT SUM(v.value) FROM votes v WHERE v.post_id = p.post_id), 0),
                        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.post_id)
                 FROM posts p
                 WHERE p.post_id = ?1",
                [post_id],
                map_post_summary_row,
            )
            .optional()
        })
    }

    /// Update title and body; `created_at` and the id never change.
    pub fn update_post(&self, post_id: i64, title: &str, content: &str, now: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET post_title = ?2, post_content = ?3, updated_at = ?4
                 WHERE post_id = ?1",
                rusqlite::params![post_id, title, content, now],
            )?;
            Ok(changed > 0)
        })
    }

    /// Delete a post; comments and votes go with it via cascade.
    pub fn delete_post(&self, post_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM posts WHERE post_id = ?1", [post_id])?;
            Ok(changed > 0)
        })
    }

    // -- Votes --

    /// Upsert the caller's vote. Re-voting in the same direction removes the
    /// vote (toggle); voting the other direction flips it. Returns the
    /// caller's vote after the operation and the post's new score.
    pub fn toggle_vote(&self, post_id: i64, user_id: &str, value: i32) -> Result<(Option<i32>, i64)> {
        self.with_conn_mut(|conn| {
            let existing: Option<i32> = conn
                .query_row(
                    "SELECT value FROM votes WHERE post_id = ?1 AND user_id = ?2",
                    rusqlite::params![post_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;

            let your_vote = match existing {
                Some(v) if v == value => {
                    conn.execute(
                        "DELETE FROM votes WHERE post_id = ?1 AND user_id = ?2",
                        rusqlite::params![post_id, user_id],
                    )?;
                    None
                }
                Some(_) => {
                    conn.execute(
                        "UPDATE votes SET value = ?3 WHERE post_id = ?1 AND user_id = ?2",
                        rusqlite::params![post_id, user_id, value],
                    )?;
                    Some(value)
                }
                None => {
                    conn.execute(
                        "INSERT INTO votes (post_id, user_id, value) VALUES (?1, ?2, ?3)",
                        rusqlite::params![post_id, user_id, value],
                    )?;
                    Some(value)
                }
            };

            let score: i64 = conn.query_row(
                "SELECT COALESCE(SUM(value), 0) FROM votes WHERE post_id = ?1",
                [post_id],
                |row| row.get(0),
            )?;

            Ok((your_vote, score))
        })
    }

    // -- Comments --

    pub fn create_comment(
        &self,
        post_id: i64,
        content: &str,
        reply_to: Option<i64>,
        created_by: &str,
        now: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO comments (post_id, comment_content, reply_to, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![post_id, content, reply_to, created_by, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_comment(&self, comment_id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT comment_id, post_id, comment_content, reply_to, created_by, created_at, updated_at
                 FROM comments WHERE comment_id = ?1",
                [comment_id],
                map_comment_row,
            )
            .optional()
        })
    }

    /// Comments of a post, oldest first.
    pub fn list_comments_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT comment_id, post_id, comment_content, reply_to, created_by, created_at, updated_at
                 FROM comments WHERE post_id = ?1
                 ORDER BY created_at, comment_id",
            )?;

            let rows = stmt
                .query_map([post_id], map_comment_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn update_comment(&self, comment_id: i64, content: &str, now: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET comment_content = ?2, updated_at = ?3 WHERE comment_id = ?1",
                rusqlite::params![comment_id, content, now],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_comment(&self, comment_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM comments WHERE comment_id = ?1", [comment_id])?;
            Ok(changed > 0)
        })
    }
}

fn map_post_summary_row(row: &Row<'_>) -> rusqlite::Result<PostSummaryRow> {
    Ok(PostSummaryRow {
        post_id: row.get(0)?,
        course_id: row.get(1)?,
        post_title: row.get(2)?,
        post_content: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        vote_score: row.get(7)?,
        comment_count: row.get(8)?,
    })
}

fn map_comment_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        comment_id: row.get(0)?,
        post_id: row.get(1)?,
        comment_content: row.get(2)?,
        reply_to: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
