// Background flush scheduler
//
// Calls FlushCoordinator::flush_due_buckets on a fixed interval until the
// shutdown channel flips. Every worker runs one; the flush lock decides which
// of them does the work. Expired in-memory bucket state is purged after each
// tick, since expiry is otherwise only applied when a key is touched.

use notifagg_engine::{FlushCoordinator, FlushOutcome};
use notifagg_store::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub(crate) async fn run_flush_loop(
    coordinator: Arc<FlushCoordinator>,
    store: Arc<MemoryStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(
        "Background flush task started (interval={}s)",
        interval.as_secs()
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        match coordinator.flush_due_buckets().await {
            Ok(FlushOutcome::Completed(report)) => {
                debug!(flushed = report.flushed, pending = report.pending, "scheduled flush finished");
            }
            Ok(FlushOutcome::LockHeld) => {
                debug!("scheduled flush skipped, lock held elsewhere");
            }
            Err(e) => {
                warn!(error = %e, "scheduled flush failed");
            }
        }

        let purged = store.purge_expired();
        if purged > 0 {
            debug!(purged, "purged expired bucket state");
        }
    }

    debug!("Background flush task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_services;
    use notifagg_config::RuntimeConfig;
    use notifagg_core::{EventType, InteractionEvent, ManualClock};

    #[tokio::test(start_paused = true)]
    async fn test_flush_loop_delivers_closed_buckets_and_stops() {
        let config = RuntimeConfig::default();
        let clock = Arc::new(ManualClock::new(0));
        let services = build_services(&config, clock.clone()).unwrap();

        services
            .ingestor
            .record_event(&InteractionEvent {
                recipient_id: "alice".to_string(),
                actor_id: "bob".to_string(),
                event_type: EventType::Like,
                subject_id: "post-1".to_string(),
                entity_id: "post-1".to_string(),
            })
            .await
            .unwrap();
        clock.advance(config.aggregation.window());

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_flush_loop(
            services.coordinator.clone(),
            services.store.clone(),
            Duration::from_secs(1),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(services.repository.list_for_recipient("alice").len(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
