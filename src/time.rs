use std::time::{Duration, Instant};

/// Snapshot of the frame clock handed to modes each tick.
#[derive(Debug, Clone, Copy)]
pub struct FrameTime {
    pub now: Instant,
    pub delta: Duration,
}

impl FrameTime {
    pub fn at(now: Instant) -> Self {
        Self { now, delta: Duration::ZERO }
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

pub struct Time {
    start: Instant,
    last: Instant,
    pub delta: Duration,
}

impl Time {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { start: now, last: now, delta: Duration::from_secs_f32(0.0) }
    }

    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        self.delta = now - self.last;
        self.last = now;
        FrameTime { now, delta: self.delta }
    }

    pub fn now(&self) -> Instant {
        self.last
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.last.duration_since(self.start).as_secs_f32()
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}
