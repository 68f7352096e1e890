//! Scroll geometry for synchronized text
//!
//! Two independent axes: the segment list scrolls inside its own container,
//! and the window scrolls only to keep the player itself on screen. Neither
//! computation looks at the other.

/// Scroll state of the container holding the segments (pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerMetrics {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

/// Position of one segment inside its container (pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemMetrics {
    /// Offset from the top of the scrollable content
    pub offset_top: f64,
    pub height: f64,
}

/// Player bounds relative to the viewport (pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerBounds {
    pub top: f64,
    pub bottom: f64,
}

/// Container scroll offset that centers `item`
///
/// Half-height arithmetic rather than edge alignment, so a sticky player bar
/// does not cover the active line. Clamped to the scrollable range.
pub fn centered_scroll_top(container: ContainerMetrics, item: ItemMetrics) -> f64 {
    let target = item.offset_top - container.client_height / 2.0 + item.height / 2.0;
    let max = (container.scroll_height - container.client_height).max(0.0);
    target.clamp(0.0, max)
}

/// Window scroll delta that brings the player back within `margin` of the
/// viewport edges, or `None` when it is comfortably visible
///
/// Negative scrolls up, positive scrolls down.
pub fn viewport_nudge(bounds: PlayerBounds, viewport_height: f64, margin: f64) -> Option<f64> {
    if bounds.top < margin {
        Some(bounds.top - margin)
    } else if bounds.bottom > viewport_height - margin {
        let delta = bounds.bottom - (viewport_height - margin);
        // A player taller than the safe band: keep its top in view instead
        Some(delta.min(bounds.top - margin))
    } else {
        None
    }
}
