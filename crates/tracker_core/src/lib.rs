use std::time::Duration;

use anyhow::{Context, Result};
use shared::domain::Position;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub mod catalog;
pub mod error;
pub mod feed;
pub mod processor;
pub mod reconciler;
pub mod registry;
pub mod sink;

pub use catalog::{Line, LineCatalog};
pub use error::{FeedError, TrackerError};
pub use feed::{EventStream, FeedPaths, FeedSource, HttpFeed};
pub use processor::{Applied, EventStreamProcessor, StreamSummary};
pub use reconciler::{ReconcileSummary, SnapshotReconciler};
pub use registry::{EntityKey, EntityRegistry, TrackedEntity};
pub use sink::{IconStyle, PopupContent, RenderSink, VisualHandle};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_TRANSITION: Duration = Duration::from_millis(7000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// How long a marker takes to glide between two stops.
    pub transition: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            transition: DEFAULT_TRANSITION,
        }
    }
}

/// Lifecycle notifications for observers of the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Created {
        key: EntityKey,
        position: Position,
    },
    Relocated {
        from: EntityKey,
        to: EntityKey,
        position: Option<Position>,
    },
    Retired {
        key: EntityKey,
    },
    Dropped {
        reason: String,
    },
}

/// Draws and registers a new vehicle. A vehicle already tracked under the
/// same key is replaced and its visual disposed; returns whether that happened.
pub(crate) fn track_new_entity<S: RenderSink>(
    registry: &mut EntityRegistry,
    sink: &mut S,
    line: &Line,
    key: EntityKey,
    position: Position,
) -> bool {
    let icon = IconStyle::for_mode(line.mode);
    let popup = PopupContent::for_route(line, key.route.iti);
    let visual = sink.materialize(position, &icon, &popup);
    match registry.create(key, position, visual) {
        Ok(()) => false,
        Err(duplicate) => {
            warn!(key = %duplicate.displaced.key, "registry: duplicate vehicle replaced");
            sink.dispose(duplicate.displaced.visual);
            true
        }
    }
}

/// Everything a caller needs once startup is done.
pub struct Startup<S> {
    pub processor: EventStreamProcessor<S>,
    pub events: EventStream,
    /// Subscribed before the snapshot was applied, so it also carries the
    /// snapshot's `Created` notifications.
    pub notifications: broadcast::Receiver<TrackerEvent>,
    pub snapshot: ReconcileSummary,
}

/// Runs the startup sequence: line catalog, then snapshot, then the live
/// channel. The channel is opened only after the snapshot is fully applied.
///
/// Fails only when the catalog cannot be loaded or the channel cannot be
/// opened; an unavailable snapshot starts the tracker empty.
pub async fn bootstrap<F, S>(feed: &F, sink: S, config: TrackerConfig) -> Result<Startup<S>>
where
    F: FeedSource + ?Sized,
    S: RenderSink,
{
    let catalog = LineCatalog::load(feed)
        .await
        .context("failed to load line catalog")?;
    info!(lines = catalog.len(), "catalog: loaded");

    let present = match feed.fetch_present().await {
        Ok(present) => present,
        Err(err) => {
            warn!(%err, "snapshot: unavailable, starting empty");
            Vec::new()
        }
    };
    let reconciler = SnapshotReconciler::new(catalog, sink, config);
    let notifications = reconciler.subscribe();
    let (processor, snapshot) = reconciler.reconcile(present);

    let events = feed
        .open_events()
        .await
        .context("failed to open live event channel")?;
    info!(
        tracked = processor.registry().len(),
        "stream: live channel open"
    );
    Ok(Startup {
        processor,
        events,
        notifications,
        snapshot,
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
