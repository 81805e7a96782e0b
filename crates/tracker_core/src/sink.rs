use std::time::Duration;

use shared::domain::{Iti, LineId, Position, TransportMode};

use crate::catalog::Line;

/// Opaque reference to a drawn marker, issued by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualHandle(pub u64);

const ICON_SIZE_PX: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconStyle {
    pub mode: TransportMode,
    pub size_px: u32,
}

impl IconStyle {
    pub fn for_mode(mode: TransportMode) -> Self {
        Self {
            mode,
            size_px: ICON_SIZE_PX,
        }
    }

    pub fn asset_path(&self, retina: bool) -> String {
        let suffix = if retina { "-2x" } else { "" };
        format!("/static/images/{}{suffix}.png", self.mode.asset_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupContent {
    pub line: LineId,
    pub bg_color: String,
    pub fg_color: String,
    pub destination: Option<String>,
}

impl PopupContent {
    pub fn for_route(line: &Line, iti: Iti) -> Self {
        Self {
            line: line.id.clone(),
            bg_color: line.bg_color.clone(),
            fg_color: line.fg_color.clone(),
            destination: line.destination(iti).map(str::to_string),
        }
    }
}

/// Drawing side of the tracker. The core only issues these calls and keeps
/// the returned handle; how a marker looks or glides is up to the sink.
pub trait RenderSink {
    /// Draws a new marker at `position` and attaches it to the map.
    fn materialize(
        &mut self,
        position: Position,
        icon: &IconStyle,
        popup: &PopupContent,
    ) -> VisualHandle;

    /// Glides a marker to `position`. May arrive while a previous glide is
    /// still running.
    fn animate_to(&mut self, visual: VisualHandle, position: Position, duration: Duration);

    /// Detaches the marker and releases everything held for it.
    fn dispose(&mut self, visual: VisualHandle);
}
