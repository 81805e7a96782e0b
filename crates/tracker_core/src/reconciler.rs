use shared::protocol::PresentRecord;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    catalog::LineCatalog,
    processor::EventStreamProcessor,
    registry::{EntityKey, EntityRegistry},
    sink::RenderSink,
    track_new_entity, TrackerConfig, TrackerEvent, EVENT_CHANNEL_CAPACITY,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: usize,
    pub replaced: usize,
    pub without_position: usize,
    pub unknown_line: usize,
    /// Records that did not decode and were skipped.
    pub malformed: usize,
}

/// Seeds the registry from the snapshot feed. The only way to obtain an
/// [`EventStreamProcessor`] is to consume a reconciler, so live events are
/// never applied before the snapshot.
pub struct SnapshotReconciler<S> {
    catalog: LineCatalog,
    registry: EntityRegistry,
    sink: S,
    config: TrackerConfig,
    events: broadcast::Sender<TrackerEvent>,
}

impl<S: RenderSink> SnapshotReconciler<S> {
    pub fn new(catalog: LineCatalog, sink: S, config: TrackerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            catalog,
            registry: EntityRegistry::new(),
            sink,
            config,
            events,
        }
    }

    /// Observers subscribed here also receive every later live transition.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    /// Applies the raw snapshot body record by record. A record that fails to
    /// decode is skipped like one with an unknown line.
    pub fn reconcile<I>(mut self, records: I) -> (EventStreamProcessor<S>, ReconcileSummary)
    where
        I: IntoIterator<Item = serde_json::Value>,
    {
        let mut summary = ReconcileSummary::default();
        for raw in records {
            let record = match PresentRecord::decode(raw) {
                Ok(record) => record,
                Err(err) => {
                    warn!(%err, "snapshot: skipping malformed record");
                    summary.malformed += 1;
                    continue;
                }
            };
            let route = record.route();
            let line = match self.catalog.lookup(&route.line) {
                Ok(line) => line,
                Err(err) => {
                    warn!(%route, %err, "snapshot: skipping record");
                    summary.unknown_line += 1;
                    continue;
                }
            };
            let key = EntityKey::new(route, record.stop.id.clone());
            let Some(position) = record.stop.position() else {
                debug!(%key, "snapshot: vehicle present without position");
                summary.without_position += 1;
                continue;
            };

            if track_new_entity(&mut self.registry, &mut self.sink, line, key.clone(), position) {
                summary.replaced += 1;
            }
            summary.created += 1;
            let _ = self.events.send(TrackerEvent::Created { key, position });
        }

        info!(
            created = summary.created,
            replaced = summary.replaced,
            without_position = summary.without_position,
            unknown_line = summary.unknown_line,
            malformed = summary.malformed,
            "snapshot: reconciled"
        );

        let processor = EventStreamProcessor::new(
            self.catalog,
            self.registry,
            self.sink,
            self.config,
            self.events,
        );
        (processor, summary)
    }
}
