use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Versioned migrations guarded by the schema_version table. Timestamp
/// columns are TEXT and always written by the query layer as RFC 3339 UTC;
/// there are no SQL-side datetime defaults.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                image       TEXT,
                role        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE accounts (
                id                   TEXT PRIMARY KEY,
                user_id              TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                provider             TEXT NOT NULL,
                provider_account_id  TEXT NOT NULL,
                UNIQUE(provider, provider_account_id)
            );

            CREATE INDEX idx_accounts_user ON accounts(user_id);

            CREATE TABLE courses (
                course_id           INTEGER PRIMARY KEY AUTOINCREMENT,
                course_code         TEXT NOT NULL UNIQUE,
                course_name         TEXT NOT NULL,
                course_description  TEXT NOT NULL,
                created_by          TEXT NOT NULL REFERENCES users(id),
                created_at          TEXT NOT NULL,
                updated_by          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE TABLE enrollments (
                course_id    INTEGER NOT NULL REFERENCES courses(course_id) ON DELETE CASCADE,
                user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                enrolled_at  TEXT NOT NULL,
                PRIMARY KEY (course_id, user_id)
            );

            CREATE TABLE topics (
                topic_id           INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id          INTEGER NOT NULL REFERENCES courses(course_id) ON DELETE CASCADE,
                topic_name         TEXT NOT NULL,
                topic_description  TEXT NOT NULL,
                is_released        INTEGER NOT NULL DEFAULT 0,
                created_by         TEXT NOT NULL,
                created_at         TEXT NOT NULL,
                updated_by         TEXT NOT NULL,
                updated_at         TEXT NOT NULL
            );

            CREATE INDEX idx_topics_course ON topics(course_id);

            CREATE TABLE contents (
                content_id  TEXT PRIMARY KEY,
                course_id   INTEGER NOT NULL REFERENCES courses(course_id) ON DELETE CASCADE,
                topic_id    INTEGER NOT NULL REFERENCES topics(topic_id) ON DELETE CASCADE,
                file_name   TEXT NOT NULL,
                mime_type   TEXT NOT NULL,
                size_bytes  INTEGER NOT NULL,
                sha256      TEXT NOT NULL,
                created_by  TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_contents_topic ON contents(topic_id);
            CREATE INDEX idx_contents_course ON contents(course_id);

            CREATE TABLE posts (
                post_id       INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id     INTEGER NOT NULL REFERENCES courses(course_id) ON DELETE CASCADE,
                post_title    TEXT NOT NULL,
                post_content  TEXT NOT NULL,
                created_by    TEXT NOT NULL REFERENCES users(id),
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE INDEX idx_posts_course ON posts(course_id, updated_at);

            CREATE TABLE comments (
                comment_id       INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id          INTEGER NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
                comment_content  TEXT NOT NULL,
                reply_to         INTEGER REFERENCES comments(comment_id) ON DELETE SET NULL,
                created_by       TEXT NOT NULL REFERENCES users(id),
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL
            );

            CREATE INDEX idx_comments_post ON comments(post_id, created_at);

            CREATE TABLE votes (
                post_id  INTEGER NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
                user_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                value    INTEGER NOT NULL,
                PRIMARY KEY (post_id, user_id)
            );

            CREATE TABLE quizzes (
                quiz_id      INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id    INTEGER NOT NULL REFERENCES courses(course_id) ON DELETE CASCADE,
                description  TEXT NOT NULL,
                content      TEXT NOT NULL,
                max_score    REAL NOT NULL,
                created_by   TEXT NOT NULL,
                created_at   TEXT NOT NULL
            );

            CREATE INDEX idx_quizzes_course ON quizzes(course_id);

            CREATE TABLE quiz_attempts (
                attempt_id    INTEGER PRIMARY KEY AUTOINCREMENT,
                quiz_id       INTEGER NOT NULL REFERENCES quizzes(quiz_id) ON DELETE CASCADE,
                user_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                started_at    TEXT NOT NULL,
                deadline      TEXT NOT NULL,
                status        TEXT NOT NULL,
                score         REAL,
                submitted_at  TEXT,
                UNIQUE(quiz_id, user_id)
            );

            CREATE INDEX idx_attempts_status ON quiz_attempts(status, deadline);
            CREATE INDEX idx_attempts_user ON quiz_attempts(user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
