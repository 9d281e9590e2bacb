use std::sync::Arc;

use expanse_db::Database;

use crate::store::ContentStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub store: ContentStore,
    pub jwt_secret: String,
    /// Email domains whose registrations get the teacher role.
    pub teacher_domains: Vec<String>,
    pub quiz_time_limit_secs: u64,
    pub max_upload_bytes: u64,
}
