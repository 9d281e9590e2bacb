use std::time::Duration;

use tracing::{info, warn};

use expanse_db::now_ts;

use crate::state::AppState;

/// Background task that finalizes overdue quiz attempts.
///
/// Runs on an interval and flips every in-progress attempt whose deadline
/// has passed to expired with a zero score. Submission checks the deadline
/// itself; this loop covers students who simply walk away, so their attempt
/// still becomes a recorded result.
pub async fn run_sweeper_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match state.db.expire_overdue_attempts(&now_ts()) {
            Ok(count) => {
                if count > 0 {
                    info!("Sweep: expired {} overdue quiz attempts", count);
                }
            }
            Err(e) => {
                warn!("Attempt sweep error: {}", e);
            }
        }
    }
}
