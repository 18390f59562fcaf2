use super::registry::Broadcaster;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Periodically write a keep-alive comment to every subscriber so idle
/// connections survive proxies and dead peers get detected.
///
/// The task exits on its own once the broadcaster starts shutting down.
///
/// # Panics
///
/// Panics if `period` is zero.
pub fn spawn_heartbeat(broadcaster: Broadcaster, period: Duration) -> JoinHandle<()> {
    assert!(!period.is_zero(), "heartbeat period must be non-zero");

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_secs = period.as_secs(), "SSE heartbeat started");

        loop {
            ticker.tick().await;
            if broadcaster.is_shutting_down() {
                break;
            }
            let reached = broadcaster.heartbeat();
            debug!(reached, "SSE heartbeat sent");
        }

        info!("SSE heartbeat stopped");
    })
}
