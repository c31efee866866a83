//! Background job: evict expired sessions from the local tier.
//!
//! Redis expires its own keys; this only keeps the in-process map from
//! growing with sessions nobody will read again.

use std::time::Duration;

use tokio::time;

use crate::session::SessionStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the sweep task. Call this once at startup.
pub fn spawn(sessions: SessionStore) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweep(&sessions);
        }
    })
}

fn sweep(sessions: &SessionStore) -> usize {
    let evicted = sessions.evict_expired();
    if evicted > 0 {
        tracing::debug!(evicted, remaining = sessions.local_len(), "expired sessions evicted");
    }
    evicted
}
