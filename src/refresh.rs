use crate::state::AppState;
use crate::storage::ChangeEvent;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, warn};

pub fn spawn(state: AppState) -> JoinHandle<()> {
    tokio::spawn(run(state))
}

/// Drives the snapshot from two independent triggers: the backend change
/// feed and a fixed poll. Both end in the same refresh calls.
pub async fn run(state: AppState) {
    let mut ticker = interval(state.config.refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut changes = state.backend.subscribe();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                debug!("poll refresh");
                if let Err(err) = state.refresh_all().await {
                    error!("poll refresh failed: {err}");
                }
            }
            event = next_change(&mut changes) => match event {
                Ok(ChangeEvent { table }) => {
                    debug!(table = table.name(), "change notification");
                    if let Err(err) = state.refresh_table(table).await {
                        error!("refresh of {} failed: {err}", table.name());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("change feed lagged by {skipped} events, refreshing everything");
                    if let Err(err) = state.refresh_all().await {
                        error!("refresh failed: {err}");
                    }
                }
                Err(RecvError::Closed) => {
                    warn!("change feed closed, continuing with polling only");
                    changes = None;
                }
            }
        }
    }
}

async fn next_change(
    changes: &mut Option<broadcast::Receiver<ChangeEvent>>,
) -> Result<ChangeEvent, RecvError> {
    match changes {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{CapacityRecord, EntryRecord};
    use crate::session::{AdminGate, tests::MemoryFlagStore};
    use crate::storage::{FileBackend, ParkingBackend, StoreError, Table};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    async fn state_with(backend: Arc<dyn ParkingBackend>, poll: Duration) -> AppState {
        let mut config = Config::from_lookup(|_| None);
        config.refresh_interval = poll;
        let gate = AdminGate::restore(Arc::new(MemoryFlagStore::default()), "admin123").await;
        AppState::new(config, backend, gate)
    }

    async fn wait_for_available(state: &AppState, expected: u32) {
        let reached = timeout(Duration::from_secs(2), async {
            loop {
                if state.dashboard.lock().await.occupancy.available() == expected {
                    return;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(reached.is_ok(), "dashboard never showed {expected} free spaces");
    }

    async fn wait_for_first_refresh(state: &AppState) {
        let done = timeout(Duration::from_secs(2), async {
            while state.dashboard.lock().await.last_update.is_none() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(done.is_ok(), "first poll never ran");
    }

    /// Serves a capacity figure set by the test and hands out a change feed
    /// the test controls.
    struct ScriptedBackend {
        available: Mutex<i64>,
        feed: Mutex<Option<broadcast::Sender<ChangeEvent>>>,
        capacity: usize,
        closed: bool,
    }

    impl ScriptedBackend {
        fn new(capacity: usize, closed: bool) -> Self {
            Self {
                available: Mutex::new(4),
                feed: Mutex::new(None),
                capacity,
                closed,
            }
        }

        fn set_available(&self, available: i64) {
            *self.available.lock().unwrap() = available;
        }

        fn notify(&self, table: Table) {
            if let Some(sender) = self.feed.lock().unwrap().as_ref() {
                let _ = sender.send(ChangeEvent { table });
            }
        }
    }

    #[async_trait]
    impl ParkingBackend for ScriptedBackend {
        async fn latest_capacity(&self) -> Result<Option<CapacityRecord>, StoreError> {
            Ok(Some(CapacityRecord {
                id: "1".into(),
                available_spaces: *self.available.lock().unwrap(),
                recorded_at: Utc::now(),
            }))
        }

        async fn append_capacity(&self, _available: u32) -> Result<CapacityRecord, StoreError> {
            Err(StoreError::Permission("read only".into()))
        }

        async fn list_entries(&self) -> Result<Vec<EntryRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn insert_entry(
            &self,
            _amount: Decimal,
            _created_at: DateTime<Utc>,
        ) -> Result<EntryRecord, StoreError> {
            Err(StoreError::Permission("read only".into()))
        }

        fn subscribe(&self) -> Option<broadcast::Receiver<ChangeEvent>> {
            let (sender, receiver) = broadcast::channel(self.capacity);
            if !self.closed {
                *self.feed.lock().unwrap() = Some(sender);
            }
            Some(receiver)
        }
    }

    #[tokio::test]
    async fn change_notifications_refresh_without_waiting_for_the_poll() {
        let mut path = std::env::temp_dir();
        path.push(format!("parking_control_refresh_{}.json", uuid::Uuid::new_v4()));
        let backend = Arc::new(FileBackend::open(path.clone()).await.unwrap());
        let state = state_with(backend.clone(), Duration::from_secs(3600)).await;

        let task = spawn(state.clone());
        wait_for_first_refresh(&state).await;

        backend.append_capacity(1).await.unwrap();
        wait_for_available(&state, 1).await;
        assert_eq!(
            state.dashboard.lock().await.aggregates.today.revenue,
            Decimal::from(135)
        );

        task.abort();
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn lagged_feed_refreshes_every_table() {
        let backend = Arc::new(ScriptedBackend::new(1, false));
        let state = state_with(backend.clone(), Duration::from_secs(3600)).await;

        let task = spawn(state.clone());
        wait_for_first_refresh(&state).await;

        // Only entry-log events are sent, so the capacity change can only
        // arrive through the full refresh a lagged receiver triggers.
        backend.set_available(2);
        for _ in 0..3 {
            backend.notify(Table::CarEntries);
        }
        wait_for_available(&state, 2).await;

        task.abort();
    }

    #[tokio::test]
    async fn closed_feed_falls_back_to_polling() {
        let backend = Arc::new(ScriptedBackend::new(4, true));
        let state = state_with(backend.clone(), Duration::from_millis(20)).await;

        let task = spawn(state.clone());
        wait_for_first_refresh(&state).await;

        backend.set_available(3);
        wait_for_available(&state, 3).await;

        task.abort();
    }
}
