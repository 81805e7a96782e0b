use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use shared::domain::Position;
use tracing::{debug, info, warn};
use tracker_core::{IconStyle, PopupContent, RenderSink, VisualHandle};

/// Marker state kept by [`ConsoleSink`]: where it glides from, where to, and
/// over what time span.
#[derive(Debug, Clone)]
struct Marker {
    label: String,
    from: Position,
    to: Position,
    started: Instant,
    duration: Duration,
}

impl Marker {
    fn position_at(&self, now: Instant) -> Position {
        if self.duration.is_zero() {
            return self.to;
        }
        let elapsed = now.saturating_duration_since(self.started);
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        self.from.lerp(self.to, t)
    }
}

/// Terminal stand-in for a map layer. Markers are logged instead of drawn,
/// but glides are tracked so a retarget starts from where the marker is.
pub struct ConsoleSink {
    next_id: u64,
    retina: bool,
    markers: HashMap<VisualHandle, Marker>,
}

impl ConsoleSink {
    pub fn new(retina: bool) -> Self {
        Self {
            next_id: 1,
            retina,
            markers: HashMap::new(),
        }
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    fn animate_at(
        &mut self,
        visual: VisualHandle,
        target: Position,
        duration: Duration,
        now: Instant,
    ) {
        let Some(marker) = self.markers.get_mut(&visual) else {
            warn!(visual = visual.0, "map: animate on unknown marker");
            return;
        };
        marker.from = marker.position_at(now);
        marker.to = target;
        marker.started = now;
        marker.duration = duration;
        debug!(
            visual = visual.0,
            label = %marker.label,
            from = %marker.from,
            to = %target,
            ms = duration.as_millis() as u64,
            "map: marker moving"
        );
    }
}

impl RenderSink for ConsoleSink {
    fn materialize(
        &mut self,
        position: Position,
        icon: &IconStyle,
        popup: &PopupContent,
    ) -> VisualHandle {
        let visual = VisualHandle(self.next_id);
        self.next_id += 1;

        let label = match &popup.destination {
            Some(destination) => format!("{} -> {destination}", popup.line),
            None => popup.line.to_string(),
        };
        info!(
            visual = visual.0,
            %label,
            %position,
            icon = %icon.asset_path(self.retina),
            "map: marker added"
        );
        self.markers.insert(
            visual,
            Marker {
                label,
                from: position,
                to: position,
                started: Instant::now(),
                duration: Duration::ZERO,
            },
        );
        visual
    }

    fn animate_to(&mut self, visual: VisualHandle, position: Position, duration: Duration) {
        self.animate_at(visual, position, duration, Instant::now());
    }

    fn dispose(&mut self, visual: VisualHandle) {
        match self.markers.remove(&visual) {
            Some(marker) => info!(visual = visual.0, label = %marker.label, "map: marker removed"),
            None => warn!(visual = visual.0, "map: dispose on unknown marker"),
        }
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::{LineId, TransportMode};

    use super::*;

    fn popup() -> PopupContent {
        PopupContent {
            line: LineId::new("1"),
            bg_color: "C4008F".into(),
            fg_color: "FFFFFF".into(),
            destination: Some("STOCKEL".into()),
        }
    }

    fn close(a: Position, b: Position) -> bool {
        (a.latitude - b.latitude).abs() < 1e-9 && (a.longitude - b.longitude).abs() < 1e-9
    }

    #[test]
    fn issues_distinct_handles() {
        let mut sink = ConsoleSink::new(false);
        let icon = IconStyle::for_mode(TransportMode::Metro);
        let a = sink.materialize(Position::new(50.0, 4.0), &icon, &popup());
        let b = sink.materialize(Position::new(50.0, 4.0), &icon, &popup());
        assert_ne!(a, b);
        assert_eq!(sink.marker_count(), 2);
    }

    #[test]
    fn retarget_starts_from_current_position() {
        let mut sink = ConsoleSink::new(false);
        let icon = IconStyle::for_mode(TransportMode::Tram);
        let visual = sink.materialize(Position::new(0.0, 0.0), &icon, &popup());

        let start = Instant::now();
        sink.animate_at(
            visual,
            Position::new(10.0, 10.0),
            Duration::from_secs(10),
            start,
        );
        let halfway = start + Duration::from_secs(5);
        sink.animate_at(
            visual,
            Position::new(0.0, 10.0),
            Duration::from_secs(10),
            halfway,
        );

        let marker = &sink.markers[&visual];
        assert!(close(marker.from, Position::new(5.0, 5.0)));
        assert!(close(
            marker.position_at(halfway + Duration::from_secs(20)),
            Position::new(0.0, 10.0)
        ));
    }

    #[test]
    fn dispose_forgets_the_marker() {
        let mut sink = ConsoleSink::new(true);
        let icon = IconStyle::for_mode(TransportMode::Bus);
        let visual = sink.materialize(Position::new(50.0, 4.0), &icon, &popup());

        sink.dispose(visual);
        assert_eq!(sink.marker_count(), 0);
        assert!(!sink.markers.contains_key(&visual));
    }
}
