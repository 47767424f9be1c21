use glam::Vec2;
use std::f32::consts::TAU;

pub const RING_RADIUS: f32 = 20.0;
pub const RING_BOX: f32 = 50.0;

/// Circular hold-to-delete affordance. Progress runs from 0 (just shown) to 1 (about to
/// commit); the dash offset mirrors an SVG stroke that fills as progress grows.
#[derive(Debug, Clone, PartialEq)]
pub struct CountdownIndicator {
    visible: bool,
    center: Vec2,
    progress: f32,
}

impl CountdownIndicator {
    pub fn new() -> Self {
        Self { visible: false, center: Vec2::ZERO, progress: 0.0 }
    }

    pub fn circumference() -> f32 {
        TAU * RING_RADIUS
    }

    pub fn show(&mut self, center: Vec2) {
        self.visible = true;
        self.center = center;
        self.progress = 0.0;
    }

    pub fn set_progress(&mut self, progress: f32) {
        if self.visible {
            self.progress = progress.clamp(0.0, 1.0);
        }
    }

    /// Hides the ring and rewinds it to the empty state.
    pub fn reset(&mut self) {
        self.visible = false;
        self.progress = 0.0;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn dash_offset(&self) -> f32 {
        Self::circumference() * (1.0 - self.progress)
    }

    /// Screen-space polyline of the filled arc, starting at twelve o'clock and running clockwise.
    pub fn arc_points(&self, segments: usize) -> Vec<Vec2> {
        if !self.visible || self.progress <= 0.0 || segments == 0 {
            return Vec::new();
        }
        let sweep = TAU * self.progress;
        (0..=segments)
            .map(|i| {
                let angle = sweep * i as f32 / segments as f32;
                self.center + Vec2::new(angle.sin(), -angle.cos()) * RING_RADIUS
            })
            .collect()
    }
}

impl Default for CountdownIndicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_offset_tracks_progress() {
        let mut ring = CountdownIndicator::new();
        assert_eq!(ring.dash_offset(), CountdownIndicator::circumference());
        ring.set_progress(0.5);
        assert_eq!(ring.progress(), 0.0, "hidden ring ignores progress");
        ring.show(Vec2::new(10.0, 10.0));
        ring.set_progress(0.5);
        assert!((ring.dash_offset() - CountdownIndicator::circumference() * 0.5).abs() < 1e-4);
        ring.reset();
        assert!(!ring.is_visible());
        assert_eq!(ring.dash_offset(), CountdownIndicator::circumference());
    }

    #[test]
    fn full_arc_closes_on_itself() {
        let mut ring = CountdownIndicator::new();
        ring.show(Vec2::ZERO);
        ring.set_progress(1.0);
        let points = ring.arc_points(32);
        assert_eq!(points.len(), 33);
        assert!(points[0].distance(points[32]) < 1e-3);
        assert!((points[0] - Vec2::new(0.0, -RING_RADIUS)).length() < 1e-4);
    }
}
