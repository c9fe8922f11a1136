use std::time::Duration;

use tokio::{task::JoinHandle, time::MissedTickBehavior};

use super::SharedRegistry;

/// Periodically removes inactive rooms older than `retention_hours`
pub fn spawn_cleanup_task(
    registry: SharedRegistry,
    every: Duration,
    retention_hours: i64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            interval_secs = every.as_secs(),
            retention_hours,
            "Room cleanup task started"
        );

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = registry.write().await.cleanup_old_rooms(retention_hours);
            tracing::debug!(removed = removed.len(), "Cleanup sweep finished");
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::{
        config::Config,
        services::{ManualClock, Registry},
    };

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_on_interval() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = Registry::with_clock(&Config::default(), clock.clone()).shared();

        let (stale, live) = {
            let mut guard = registry.write().await;
            let stale = guard.create_room("stale").unwrap().id;
            let live = guard.create_room("live").unwrap().id;
            guard.join_room(&stale, "a", "Ann", None).unwrap();
            guard.leave_room(&stale, "a").unwrap();
            (stale, live)
        };

        let task = spawn_cleanup_task(registry.clone(), Duration::from_secs(60), 24);
        clock.advance(chrono::Duration::hours(25));

        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        let guard = registry.read().await;
        assert!(guard.get_room(&stale).is_none());
        assert!(guard.get_room(&live).is_some());
        task.abort();
    }
}
