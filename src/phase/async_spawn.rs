//! Off-thread entity spawns.
//!
//! Worker threads never touch the phase stack. They hold an
//! [`AsyncSpawner`], which either queues an entity for replay on the engine
//! thread or drops it, depending on `capture_entities_async`. The tracker
//! drains the queue inside an [`AsyncSpawnReplay`](super::PhaseState::AsyncSpawnReplay)
//! phase once its stack is empty.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::mpsc;

use crate::config::schema::PhaseTrackerSettings;
use crate::diagnostics::printer::report_async_entity_spawn;
use crate::diagnostics::sink::DiagnosticSink;
use crate::observability::metrics::{self, AsyncSpawnOutcome};

use super::context::CapturedEntity;
use super::tracker::CaptureOutcome;

struct SpawnerShared {
    settings: PhaseTrackerSettings,
    sink: Arc<dyn DiagnosticSink>,
    printed: Arc<AtomicBool>,
}

/// Cloneable, `Send` handle for spawning entities from worker threads.
#[derive(Clone)]
pub struct AsyncSpawner {
    tx: mpsc::UnboundedSender<CapturedEntity>,
    shared: Arc<SpawnerShared>,
}

impl std::fmt::Debug for AsyncSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSpawner")
            .field("capture_entities_async", &self.shared.settings.capture_entities_async)
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl AsyncSpawner {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<CapturedEntity>,
        settings: PhaseTrackerSettings,
        sink: Arc<dyn DiagnosticSink>,
        printed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            tx,
            shared: Arc::new(SpawnerShared {
                settings,
                sink,
                printed,
            }),
        }
    }

    /// Queues `entity` for replay, or drops it when async capture is off or
    /// the tracker is gone.
    ///
    /// Returns [`CaptureOutcome::Queued`] or [`CaptureOutcome::Rejected`].
    pub fn spawn(&self, entity: CapturedEntity) -> CaptureOutcome {
        let settings = &self.shared.settings;
        let queued = settings.capture_entities_async && self.tx.send(entity.clone()).is_ok();

        report_async_entity_spawn(
            self.shared.sink.as_ref(),
            &self.shared.printed,
            settings,
            &entity,
            queued,
        );

        if queued {
            metrics::record_async_spawn(AsyncSpawnOutcome::Queued, 1);
            CaptureOutcome::Queued
        } else {
            tracing::debug!(entity = %entity, "dropped off-thread entity spawn");
            metrics::record_async_spawn(AsyncSpawnOutcome::Dropped, 1);
            CaptureOutcome::Rejected
        }
    }

    /// Returns `true` once the owning tracker has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::report::AnomalyKind;
    use crate::diagnostics::sink::MemorySink;

    fn spawner(settings: PhaseTrackerSettings) -> (AsyncSpawner, mpsc::UnboundedReceiver<CapturedEntity>, Arc<MemorySink>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(MemorySink::new());
        let spawner = AsyncSpawner::new(tx, settings, sink.clone(), Arc::new(AtomicBool::new(false)));
        (spawner, rx, sink)
    }

    #[test]
    fn queues_when_capture_enabled() {
        let (spawner, mut rx, sink) = spawner(PhaseTrackerSettings::default());
        assert_eq!(spawner.spawn(CapturedEntity::new("minecraft:zombie")), CaptureOutcome::Queued);
        assert_eq!(rx.try_recv().unwrap().kind, "minecraft:zombie");
        // quiet unless verbose
        assert!(sink.is_empty());
    }

    #[test]
    fn drops_when_capture_disabled() {
        let settings = PhaseTrackerSettings {
            capture_entities_async: false,
            verbose: true,
            ..PhaseTrackerSettings::default()
        };
        let (spawner, mut rx, sink) = spawner(settings);
        assert_eq!(spawner.spawn(CapturedEntity::new("minecraft:zombie")), CaptureOutcome::Rejected);
        assert_eq!(spawner.spawn(CapturedEntity::new("minecraft:zombie")), CaptureOutcome::Rejected);
        assert!(rx.try_recv().is_err());
        assert_eq!(sink.count(AnomalyKind::AsyncEntitySpawn), 1);
    }

    #[test]
    fn closed_channel_rejects() {
        let (spawner, rx, _sink) = spawner(PhaseTrackerSettings::default());
        drop(rx);
        assert!(spawner.is_closed());
        assert_eq!(spawner.spawn(CapturedEntity::new("minecraft:pig")), CaptureOutcome::Rejected);
    }

    #[test]
    fn spawner_is_send_and_clone() {
        fn assert_send<T: Send + Sync + Clone>() {}
        assert_send::<AsyncSpawner>();
    }
}
