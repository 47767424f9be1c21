//! Cooperative task scheduling for gesture timers and per-frame animations.
//!
//! Everything runs on the render thread. Tasks are plain data keyed by a monotonic deadline;
//! the owner polls with the frame's `Instant` and decides what a fired payload means. A
//! cancelled handle never fires again, which keeps stale gesture callbacks inert.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(u64);

/// Linear progress sample of a per-frame animation task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample<P> {
    pub handle: TaskHandle,
    pub payload: P,
    pub progress: f32,
    pub finished: bool,
}

#[derive(Debug, Clone, Copy)]
struct Animation<P> {
    start: Instant,
    duration: Duration,
    payload: P,
}

impl<P> Animation<P> {
    fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }
}

#[derive(Debug)]
pub struct Scheduler<P> {
    next_id: u64,
    timers: BTreeMap<(Instant, TaskHandle), P>,
    animations: BTreeMap<TaskHandle, Animation<P>>,
}

impl<P> Default for Scheduler<P> {
    fn default() -> Self {
        Self { next_id: 0, timers: BTreeMap::new(), animations: BTreeMap::new() }
    }
}

impl<P: Copy> Scheduler<P> {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> TaskHandle {
        self.next_id += 1;
        TaskHandle(self.next_id)
    }

    /// Schedules a one-shot task that becomes due at `deadline`.
    pub fn schedule_at(&mut self, deadline: Instant, payload: P) -> TaskHandle {
        let handle = self.allocate();
        self.timers.insert((deadline, handle), payload);
        handle
    }

    /// Schedules a per-frame task sampled by [`Scheduler::advance_frames`] until its progress reaches one.
    pub fn animate(&mut self, start: Instant, duration: Duration, payload: P) -> TaskHandle {
        let handle = self.allocate();
        self.animations.insert(handle, Animation { start, duration, payload });
        handle
    }

    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        if self.animations.remove(&handle).is_some() {
            return true;
        }
        let key = self.timers.keys().find(|(_, h)| *h == handle).copied();
        match key {
            Some(key) => self.timers.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.animations.contains_key(&handle) || self.timers.keys().any(|(_, h)| *h == handle)
    }

    pub fn deadline(&self, handle: TaskHandle) -> Option<Instant> {
        self.timers.keys().find(|(_, h)| *h == handle).map(|(deadline, _)| *deadline)
    }

    /// Pops the earliest timer whose deadline is not after `now`. Ties resolve in creation order.
    pub fn pop_due(&mut self, now: Instant) -> Option<(TaskHandle, Instant, P)> {
        let (&(deadline, handle), _) = self.timers.iter().next()?;
        if deadline > now {
            return None;
        }
        let payload = self.timers.remove(&(deadline, handle))?;
        Some((handle, deadline, payload))
    }

    /// Samples every live animation at `now`; finished animations are retired after sampling.
    pub fn advance_frames(&mut self, now: Instant) -> Vec<FrameSample<P>> {
        let mut samples = Vec::with_capacity(self.animations.len());
        for (handle, animation) in &self.animations {
            let progress = animation.progress(now);
            samples.push(FrameSample {
                handle: *handle,
                payload: animation.payload,
                progress,
                finished: progress >= 1.0,
            });
        }
        for sample in &samples {
            if sample.finished {
                self.animations.remove(&sample.handle);
            }
        }
        samples
    }

    pub fn clear(&mut self) {
        self.timers.clear();
        self.animations.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty() && self.animations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(t0 + ms(30), "late");
        scheduler.schedule_at(t0 + ms(10), "early");
        assert!(scheduler.pop_due(t0 + ms(5)).is_none());
        let (_, deadline, first) = scheduler.pop_due(t0 + ms(40)).expect("early fires");
        assert_eq!(first, "early");
        assert_eq!(deadline, t0 + ms(10));
        assert_eq!(scheduler.pop_due(t0 + ms(40)).map(|(_, _, p)| p), Some("late"));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule_at(t0 + ms(10), 1u8);
        assert!(scheduler.is_pending(handle));
        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle), "second cancel is a no-op");
        assert!(scheduler.pop_due(t0 + ms(100)).is_none());
    }

    #[test]
    fn animation_progress_is_linear_and_retires() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new();
        let handle = scheduler.animate(t0, ms(1000), ());
        let samples = scheduler.advance_frames(t0 + ms(250));
        assert_eq!(samples.len(), 1);
        assert!((samples[0].progress - 0.25).abs() < 1e-3);
        assert!(!samples[0].finished);

        let samples = scheduler.advance_frames(t0 + ms(1200));
        assert!(samples[0].finished);
        assert_eq!(samples[0].progress, 1.0);
        assert!(!scheduler.is_pending(handle));
        assert!(scheduler.advance_frames(t0 + ms(1300)).is_empty());
    }
}
