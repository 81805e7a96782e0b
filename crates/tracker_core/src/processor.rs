use futures::{Stream, StreamExt};
use shared::protocol::StopEvent;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    catalog::LineCatalog,
    error::{FeedError, TrackerError},
    registry::{EntityKey, EntityRegistry},
    sink::RenderSink,
    track_new_entity, TrackerConfig, TrackerEvent,
};

/// Registry change made by one live event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Created(EntityKey),
    Relocated { from: EntityKey, to: EntityKey },
    Retired(EntityKey),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub received: usize,
    pub applied: usize,
    pub dropped: usize,
    /// Set when the stream ended on a transport error rather than a close.
    pub failure: Option<String>,
}

pub struct EventStreamProcessor<S> {
    catalog: LineCatalog,
    registry: EntityRegistry,
    sink: S,
    config: TrackerConfig,
    events: broadcast::Sender<TrackerEvent>,
}

impl<S: RenderSink> EventStreamProcessor<S> {
    pub(crate) fn new(
        catalog: LineCatalog,
        registry: EntityRegistry,
        sink: S,
        config: TrackerConfig,
        events: broadcast::Sender<TrackerEvent>,
    ) -> Self {
        Self {
            catalog,
            registry,
            sink,
            config,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    pub fn catalog(&self) -> &LineCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Applies messages one at a time until the stream ends. A bad message or
    /// unreadable frame is dropped; a transport error ends the run.
    pub async fn run<St>(&mut self, mut stream: St) -> StreamSummary
    where
        St: Stream<Item = Result<String, FeedError>> + Unpin,
    {
        let mut summary = StreamSummary::default();
        while let Some(next) = stream.next().await {
            match next {
                Ok(text) => {
                    summary.received += 1;
                    if self.handle_message(&text).is_some() {
                        summary.applied += 1;
                    } else {
                        summary.dropped += 1;
                    }
                }
                Err(FeedError::Malformed(err)) => {
                    summary.received += 1;
                    summary.dropped += 1;
                    self.report_dropped(TrackerError::MalformedMessage(err));
                }
                Err(err) => {
                    warn!(%err, "stream: receive failed");
                    summary.failure = Some(err.to_string());
                    break;
                }
            }
        }
        debug!(
            received = summary.received,
            applied = summary.applied,
            dropped = summary.dropped,
            "stream: ended"
        );
        summary
    }

    /// Decodes and applies one raw message. Never fails: rejected messages
    /// are logged, reported to subscribers and dropped.
    pub fn handle_message(&mut self, text: &str) -> Option<Applied> {
        let result = StopEvent::decode(text)
            .map_err(TrackerError::from)
            .and_then(|event| self.apply(event));
        match result {
            Ok(applied) => Some(applied),
            Err(err) => {
                self.report_dropped(err);
                None
            }
        }
    }

    fn report_dropped(&self, err: TrackerError) {
        match &err {
            TrackerError::NotFound(key) => debug!(%key, "stream: stale event dropped"),
            _ => warn!(%err, "stream: event dropped"),
        }
        let _ = self.events.send(TrackerEvent::Dropped {
            reason: err.to_string(),
        });
    }

    /// Applies one decoded event. Creation is checked before retirement, and
    /// anything else is a relocation.
    pub fn apply(&mut self, event: StopEvent) -> Result<Applied, TrackerError> {
        let StopEvent {
            route,
            origin,
            destination,
        } = event;
        let line = self.catalog.lookup(&route.line)?;

        if origin.id.is_sentinel() {
            if destination.id.is_sentinel() {
                return Err(TrackerError::NoStops(route));
            }
            let key = EntityKey::new(route, destination.id.clone());
            let position = destination
                .position()
                .ok_or_else(|| TrackerError::MissingPosition(key.clone()))?;
            track_new_entity(&mut self.registry, &mut self.sink, line, key.clone(), position);
            debug!(%key, %position, "stream: vehicle entered");
            let _ = self.events.send(TrackerEvent::Created {
                key: key.clone(),
                position,
            });
            return Ok(Applied::Created(key));
        }

        if destination.id.is_sentinel() {
            let key = EntityKey::new(route, origin.id);
            let entity = self.registry.retire(&key)?;
            self.sink.dispose(entity.visual);
            debug!(%key, "stream: vehicle left");
            let _ = self.events.send(TrackerEvent::Retired { key: key.clone() });
            return Ok(Applied::Retired(key));
        }

        let from = EntityKey::new(route.clone(), origin.id);
        let to = EntityKey::new(route, destination.id.clone());
        let visual = self
            .registry
            .get(&from)
            .map(|entity| entity.visual)
            .ok_or_else(|| TrackerError::NotFound(from.clone()))?;

        let target = destination.position();
        match target {
            Some(position) => self.sink.animate_to(visual, position, self.config.transition),
            None => debug!(%from, %to, "stream: destination has no position, moving without glide"),
        }
        let rekeyed = self.registry.rekey(&from, to.clone(), target)?;
        if let Some(displaced) = rekeyed.displaced {
            warn!(key = %to, "stream: relocation displaced a tracked vehicle");
            self.sink.dispose(displaced.visual);
        }
        debug!(%from, %to, "stream: vehicle moved");
        let _ = self.events.send(TrackerEvent::Relocated {
            from: from.clone(),
            to: to.clone(),
            position: target,
        });
        Ok(Applied::Relocated { from, to })
    }
}
