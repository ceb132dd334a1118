use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use agora_api::auth::AppState;

/// Background task that deletes expired sessions.
///
/// Expired tokens are already rejected at validation time; this only keeps
/// the sessions table from growing without bound.
pub async fn run_session_reaper(state: AppState, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        let state = state.clone();
        let result =
            tokio::task::spawn_blocking(move || state.sessions.purge_expired(Utc::now())).await;

        match result {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Cleanup: removed {} expired sessions", count);
                }
            }
            Ok(Err(e)) => warn!("Session cleanup error: {}", e),
            Err(e) => warn!("Session cleanup task failed: {}", e),
        }
    }
}
