//! Drag-to-pan. Moves the view time only; playback never follows.

/// Bars panned by dragging across the full container width.
pub const BARS_PER_WIDTH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct DragOrigin {
    x: f64,
    view_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanGesture {
    width: f64,
    bar_ms: f64,
    total_ms: f64,
    bars_per_width: f64,
    origin: Option<DragOrigin>,
}

impl PanGesture {
    pub fn new(width: f64, bar_ms: f64, total_ms: f64) -> Self {
        Self {
            width,
            bar_ms,
            total_ms,
            bars_per_width: BARS_PER_WIDTH,
            origin: None,
        }
    }

    /// Update the container width after a resize.
    pub fn set_width(&mut self, width: f64) {
        self.width = width;
    }

    pub fn is_dragging(&self) -> bool {
        self.origin.is_some()
    }

    /// Pointer down at `x` while the view shows `view_ms`.
    ///
    /// Refused while a take is playing: the view is locked to "now".
    pub fn press(&mut self, x: f64, view_ms: f64, playing: bool) -> bool {
        if playing || self.width <= 0.0 {
            self.origin = None;
            return false;
        }
        self.origin = Some(DragOrigin { x, view_ms });
        true
    }

    /// Pointer moved to `x`; returns the new view time.
    ///
    /// Dragging right reveals earlier material, like pulling paper.
    pub fn drag(&mut self, x: f64) -> Option<f64> {
        let origin = self.origin?;
        let dx = x - origin.x;
        let delta_ms = -(dx / self.width) * self.bars_per_width * self.bar_ms;
        Some((origin.view_ms + delta_ms).clamp(0.0, self.total_ms.max(0.0)))
    }

    pub fn release(&mut self) {
        self.origin = None;
    }
}
