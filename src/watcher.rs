//! Live updates: periodic re-resolution with change events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;

use crate::error::ResolveError;
use crate::provider::ChangeEvent;
use crate::record::{self, Secrets};
use crate::resolver::Resolver;
use crate::tag::parse_tag;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Options for [`Resolver::watch`].
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Polling interval. Defaults to one minute.
    pub interval: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions {
            interval: Duration::from_secs(60),
        }
    }
}

/// Owns a record that is periodically re-resolved in the background.
///
/// Readers take the shared lock through [`read`](Watcher::read); the worker
/// takes the exclusive lock only while copying changed fields, so write
/// windows are bounded by field count. Dropping the watcher (or calling
/// [`stop`](Watcher::stop)) ends the worker and closes the event channel.
pub struct Watcher<R> {
    record: Arc<RwLock<R>>,
    changes: mpsc::Receiver<ChangeEvent>,
    stop: Option<watch::Sender<bool>>,
    worker: Option<JoinHandle<()>>,
}

impl<R> std::fmt::Debug for Watcher<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher").finish_non_exhaustive()
    }
}

impl<R> Watcher<R> {
    /// Locks the record for shared reading.
    pub async fn read(&self) -> RwLockReadGuard<'_, R> {
        self.record.read().await
    }

    /// A shared handle to the watched record, for use from other tasks.
    pub fn handle(&self) -> Arc<RwLock<R>> {
        self.record.clone()
    }

    /// Receives the next change event.
    ///
    /// Returns `None` once the watcher has stopped and all pending events
    /// have been drained.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.changes.recv().await
    }

    /// Stops the poll worker and waits for it to exit.
    pub async fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(true);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

/// Post-fragment bytes of one annotated field, in walker order.
struct FieldSnapshot {
    field: String,
    key: String,
    provider: String,
    bytes: Vec<u8>,
}

fn take_snapshot<R: Secrets>(record: &mut R) -> Vec<FieldSnapshot> {
    record
        .secret_fields()
        .into_iter()
        .map(|binding| {
            let bytes = record::slot_render(&mut *binding.slot);
            let (key, provider) = match parse_tag(binding.tag) {
                Ok(tag) => (
                    tag.key,
                    tag.scheme.unwrap_or_else(|| "default".to_string()),
                ),
                // Unparseable tags never survive the initial resolve.
                Err(_) => (String::new(), String::new()),
            };
            FieldSnapshot {
                field: binding.name,
                key,
                provider,
                bytes,
            }
        })
        .collect()
}

impl Resolver {
    /// Resolves `record` once, then keeps it fresh in the background.
    ///
    /// The initial resolve is synchronous: if it fails, no watcher is
    /// created and the error is returned. Afterwards a worker re-resolves
    /// into a shadow record every `options.interval`; when any annotated
    /// field changed, the changed values are copied into the live record
    /// under the write lock and one [`ChangeEvent`] per changed field is
    /// published in walker order. A failed cycle leaves the record and the
    /// snapshot untouched. Events that find the channel full are dropped
    /// rather than stalling the worker.
    pub async fn watch<R>(
        &self,
        mut record: R,
        options: WatchOptions,
    ) -> Result<Watcher<R>, ResolveError>
    where
        R: Secrets + Default + Send + Sync + 'static,
    {
        self.resolve(&mut record).await?;
        let snapshot = take_snapshot(&mut record);

        let shared = Arc::new(RwLock::new(record));
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = PollWorker {
            resolver: self.clone(),
            record: shared.clone(),
            events: event_tx,
            interval: options.interval,
            snapshot,
        };
        let handle = tokio::spawn(worker.run(stop_rx));

        Ok(Watcher {
            record: shared,
            changes: event_rx,
            stop: Some(stop_tx),
            worker: Some(handle),
        })
    }
}

struct PollWorker<R> {
    resolver: Resolver,
    record: Arc<RwLock<R>>,
    events: mpsc::Sender<ChangeEvent>,
    interval: Duration,
    snapshot: Vec<FieldSnapshot>,
}

impl<R> PollWorker<R>
where
    R: Secrets + Default + Send + Sync + 'static,
{
    async fn run(mut self, mut stop: watch::Receiver<bool>) {
        let first_tick = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(first_tick, self.interval);
        loop {
            tokio::select! {
                _ = stop.changed() => return,
                _ = ticker.tick() => self.cycle().await,
            }
        }
    }

    /// One poll cycle: resolve into a shadow record, diff against the prior
    /// snapshot, swap changed values into the live record, publish events.
    async fn cycle(&mut self) {
        let mut shadow = R::default();
        if let Err(error) = self.resolver.resolve(&mut shadow).await {
            tracing::warn!(%error, "secret refresh failed; keeping previous values");
            return;
        }
        let new_snapshot = take_snapshot(&mut shadow);

        let events: Vec<ChangeEvent> = self
            .snapshot
            .iter()
            .zip(new_snapshot.iter())
            .filter(|(old, new)| old.bytes != new.bytes)
            .map(|(old, new)| ChangeEvent {
                field: new.field.clone(),
                key: new.key.clone(),
                provider: new.provider.clone(),
                old_value: old.bytes.clone(),
                new_value: new.bytes.clone(),
            })
            .collect();

        if !events.is_empty() {
            // Copy only annotated fields so unannotated state survives the
            // update; the write lock is held for the copy alone.
            {
                let mut live = self.record.write().await;
                let mut live_bindings = live.secret_fields();
                let mut shadow_bindings = shadow.secret_fields();
                for (live_binding, shadow_binding) in
                    live_bindings.iter_mut().zip(shadow_bindings.iter_mut())
                {
                    live_binding.slot.swap_with(&mut *shadow_binding.slot);
                }
            }
            tracing::debug!(changes = events.len(), "secret values updated");
            for event in events {
                match self.events.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(event)) => {
                        tracing::debug!(
                            field = %event.field,
                            "change event channel full; dropping event"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {}
                }
            }
        }

        self.snapshot = new_snapshot;
    }
}
