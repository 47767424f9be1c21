//! Section plane ownership and the pointer gesture that creates and clears planes.
//!
//! Gesture flow:
//! - double-click on geometry creates a plane facing away from the clicked face;
//! - a press arms a timer; once it fires the countdown ring appears and a commit timer starts;
//! - holding until the commit timer fires deletes every plane;
//! - moving past the threshold, releasing or leaving the viewport cancels at any point.
//!
//! Timers live in a [`Scheduler`] and carry the gesture generation they were created for, so a
//! task belonging to a cancelled gesture is ignored when it fires.

use glam::{Vec2, Vec3, Vec4};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::edges::{EdgeOverlayStyle, EdgeOverlays};
use super::indicator::CountdownIndicator;
use super::plane::{PlaneId, SectionPlane};
use crate::config::{EdgeStyleConfig, GestureConfig, SectionConfig};
use crate::error::SectionError;
use crate::events::{EventHub, EventScope, Subscription};
use crate::geometry::{GeometryIndex, PointerPicker, FragmentIdMap};
use crate::input::{InputEvent, ViewerAction};
use crate::scheduler::{Scheduler, TaskHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureTask {
    Arm { generation: u64 },
    Commit { generation: u64 },
    Progress { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureState {
    Idle,
    PressArmed { origin: Vec2, arm_task: TaskHandle },
    Countdown { origin: Vec2, commit_task: TaskHandle, progress_task: TaskHandle },
}

#[derive(Debug, Clone, Copy)]
struct GestureTiming {
    arm_delay: Duration,
    commit_delay: Duration,
    move_threshold: f32,
}

impl From<&GestureConfig> for GestureTiming {
    fn from(cfg: &GestureConfig) -> Self {
        Self {
            arm_delay: Duration::from_millis(cfg.arm_delay_ms),
            commit_delay: Duration::from_millis(cfg.commit_delay_ms),
            move_threshold: cfg.move_threshold_px,
        }
    }
}

pub struct ClipperManager {
    enabled: bool,
    disposed: bool,
    section: SectionConfig,
    timing: GestureTiming,
    planes: BTreeMap<PlaneId, SectionPlane>,
    next_plane: u64,
    overlays: EdgeOverlays,
    style_name: String,
    state: GestureState,
    generation: u64,
    scheduler: Scheduler<GestureTask>,
    indicator: CountdownIndicator,
    cursor: Option<Vec2>,
    window_events: Option<Subscription>,
    viewport_events: Option<Subscription>,
}

impl ClipperManager {
    pub fn new(section: SectionConfig, gesture: &GestureConfig, edges: &EdgeStyleConfig) -> Self {
        let mut overlays = EdgeOverlays::new();
        overlays.create(EdgeOverlayStyle::from_config(edges));
        Self {
            enabled: true,
            disposed: false,
            section,
            timing: GestureTiming::from(gesture),
            planes: BTreeMap::new(),
            next_plane: 0,
            overlays,
            style_name: edges.style_name.clone(),
            state: GestureState::Idle,
            generation: 0,
            scheduler: Scheduler::new(),
            indicator: CountdownIndicator::new(),
            cursor: None,
            window_events: None,
            viewport_events: None,
        }
    }

    /// Registers the window (keyboard) and viewport (pointer) subscriptions this manager drains.
    pub fn subscribe(&mut self, hub: &mut EventHub) {
        if self.disposed {
            tracing::warn!("ignoring subscribe on a disposed section manager");
            return;
        }
        self.window_events = Some(hub.subscribe(EventScope::Window));
        self.viewport_events = Some(hub.subscribe(EventScope::Viewport));
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn planes(&self) -> &BTreeMap<PlaneId, SectionPlane> {
        &self.planes
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Plane equations the renderer and picker clip against, in plane order. Only the first
    /// `max_planes` enabled planes clip; later ones still carry cut edges.
    pub fn clip_planes(&self) -> Vec<Vec4> {
        self.planes
            .values()
            .filter(|plane| plane.enabled)
            .take(self.section.max_planes)
            .map(SectionPlane::equation)
            .collect()
    }

    pub fn style(&self) -> Option<&EdgeOverlayStyle> {
        self.overlays.get(&self.style_name)
    }

    pub fn overlays(&self) -> &EdgeOverlays {
        &self.overlays
    }

    pub fn indicator(&self) -> &CountdownIndicator {
        &self.indicator
    }

    pub fn gesture_state(&self) -> GestureState {
        self.state
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.scheduler.is_empty()
    }

    fn guard(&self, operation: &str) -> Result<(), SectionError> {
        if self.disposed {
            tracing::warn!(operation, "section manager used after dispose");
            return Err(SectionError::Disposed);
        }
        Ok(())
    }

    /// Binds the edge style to every fragment in both mappings, then recomputes once. Fragments
    /// the index does not know are skipped.
    pub fn set_model_geometry(
        &mut self,
        index: &dyn GeometryIndex,
        primary: Option<&FragmentIdMap>,
        secondary: Option<&FragmentIdMap>,
    ) -> Result<(), SectionError> {
        self.guard("set_model_geometry")?;
        let (Some(primary), Some(secondary)) = (primary, secondary) else {
            tracing::warn!(
                primary = primary.is_some(),
                secondary = secondary.is_some(),
                "model geometry bindings missing, edges not applied"
            );
            return Err(SectionError::MissingBindings);
        };
        let Some(style) = self.overlays.get_mut(&self.style_name) else {
            return Err(SectionError::MissingBindings);
        };
        let mut bound = 0usize;
        let mut skipped = 0usize;
        for (fragment, elements) in primary.iter().chain(secondary.iter()) {
            match index.mesh_for(fragment) {
                Some(mesh) => {
                    style.bind(fragment.clone(), mesh, elements);
                    bound += 1;
                }
                None => {
                    tracing::debug!(fragment = %fragment, "fragment not in geometry index, skipping");
                    skipped += 1;
                }
            }
        }
        tracing::info!(style = %self.style_name, bound, skipped, "edge style bound to model geometry");
        self.refresh_overlays();
        Ok(())
    }

    pub fn create_plane(&mut self, origin: Vec3, normal: Vec3, now: Instant) -> Result<PlaneId, SectionError> {
        self.guard("create_plane")?;
        if self.planes.len() >= self.section.max_planes {
            tracing::warn!(
                limit = self.section.max_planes,
                "clip-plane limit reached, new plane draws cut edges without clipping"
            );
        }
        self.next_plane += 1;
        let id = PlaneId(self.next_plane);
        let plane = SectionPlane::new(id, origin, normal, &self.section, now);
        tracing::info!(plane = %id, origin = ?plane.origin, normal = ?plane.normal, "section plane created");
        self.planes.insert(id, plane);
        self.refresh_overlays();
        Ok(id)
    }

    pub fn delete_plane(&mut self, id: PlaneId) -> Result<bool, SectionError> {
        self.guard("delete_plane")?;
        if self.planes.remove(&id).is_none() {
            return Ok(false);
        }
        tracing::info!(plane = %id, "section plane deleted");
        self.refresh_overlays();
        Ok(true)
    }

    /// Removes every plane. Returns how many were removed.
    pub fn delete_all(&mut self) -> Result<usize, SectionError> {
        self.guard("delete_all")?;
        let removed = self.planes.len();
        if removed == 0 {
            return Ok(0);
        }
        self.planes.clear();
        tracing::info!(removed, "all section planes deleted");
        self.refresh_overlays();
        Ok(removed)
    }

    /// Teardown helper: cancels any gesture in flight and deletes every plane.
    pub fn clear_all(&mut self) -> Result<usize, SectionError> {
        self.guard("clear_all")?;
        self.cancel_gesture();
        self.delete_all()
    }

    /// Releases planes, bindings, timers and subscriptions. Later calls are no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.cancel_gesture();
        self.scheduler.clear();
        self.planes.clear();
        self.overlays.clear();
        if let Some(mut sub) = self.window_events.take() {
            sub.release();
        }
        if let Some(mut sub) = self.viewport_events.take() {
            sub.release();
        }
        self.cursor = None;
        self.disposed = true;
        tracing::debug!("section manager disposed");
    }

    fn refresh_overlays(&mut self) {
        // Planes and edge bookkeeping change in the same call so no frame sees one without the other.
        let errors = self.overlays.update(&self.planes);
        if !errors.is_empty() {
            tracing::warn!(failed = errors.len(), "edge overlay recomputed with skipped fragments");
        }
    }

    /// Drains queued input from the scoped subscriptions and feeds the gesture machine.
    pub fn process_events(&mut self, now: Instant, picker: &dyn PointerPicker) {
        if self.disposed {
            return;
        }
        let window = self.window_events.as_ref().map(Subscription::drain).unwrap_or_default();
        let viewport = self.viewport_events.as_ref().map(Subscription::drain).unwrap_or_default();
        for event in window {
            if let InputEvent::Action { action: ViewerAction::DeleteSections, pressed: true } = event {
                self.key_delete();
            }
        }
        for event in viewport {
            match event {
                InputEvent::CursorMoved { x, y } => self.pointer_move(Vec2::new(x, y), now),
                InputEvent::MouseButton { pressed: true, x, y, .. } => self.pointer_down(Vec2::new(x, y), now),
                InputEvent::MouseButton { pressed: false, .. } => self.pointer_up(now),
                InputEvent::CursorLeft => self.pointer_leave(now),
                InputEvent::DoubleClick { x, y } => self.double_click(Vec2::new(x, y), picker, now),
                _ => {}
            }
        }
    }

    pub fn double_click(&mut self, pointer: Vec2, picker: &dyn PointerPicker, now: Instant) {
        if self.disposed {
            tracing::warn!("double-click ignored, section manager disposed");
            return;
        }
        if !self.enabled {
            return;
        }
        let Some(hit) = picker.pick(pointer) else {
            tracing::debug!(x = pointer.x, y = pointer.y, "double-click missed geometry");
            return;
        };
        let _ = self.create_plane(hit.point, -hit.normal, now);
    }

    /// Any button arms a press. A press while a gesture is already running restarts it.
    pub fn pointer_down(&mut self, pointer: Vec2, now: Instant) {
        if self.disposed {
            return;
        }
        self.run_due(now);
        self.cursor = Some(pointer);
        self.cancel_gesture();
        let arm_task = self.scheduler.schedule_at(now + self.timing.arm_delay, GestureTask::Arm { generation: self.generation });
        self.state = GestureState::PressArmed { origin: pointer, arm_task };
    }

    pub fn pointer_move(&mut self, pointer: Vec2, now: Instant) {
        if self.disposed {
            return;
        }
        self.run_due(now);
        self.cursor = Some(pointer);
        let origin = match self.state {
            GestureState::Idle => return,
            GestureState::PressArmed { origin, .. } | GestureState::Countdown { origin, .. } => origin,
        };
        let delta = (pointer - origin).abs();
        if delta.x > self.timing.move_threshold || delta.y > self.timing.move_threshold {
            tracing::trace!(dx = delta.x, dy = delta.y, "pointer moved, gesture cancelled");
            self.cancel_gesture();
        }
    }

    pub fn pointer_up(&mut self, now: Instant) {
        if !self.disposed {
            self.run_due(now);
            self.cancel_gesture();
        }
    }

    pub fn pointer_leave(&mut self, now: Instant) {
        if !self.disposed {
            self.run_due(now);
            self.cursor = None;
            self.cancel_gesture();
        }
    }

    pub fn key_delete(&mut self) {
        if self.disposed {
            tracing::warn!("delete key ignored, section manager disposed");
            return;
        }
        if self.enabled {
            let _ = self.delete_all();
        }
    }

    /// Runs every gesture task due at `now`, then samples the countdown animation.
    pub fn tick(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        self.run_due(now);
        for sample in self.scheduler.advance_frames(now) {
            if sample.payload == (GestureTask::Progress { generation: self.generation }) {
                self.indicator.set_progress(sample.progress);
            }
        }
    }

    /// Fires timers already due at `now`. Pointer handlers run this before acting on the event.
    fn run_due(&mut self, now: Instant) {
        while let Some((handle, deadline, task)) = self.scheduler.pop_due(now) {
            match task {
                GestureTask::Arm { generation } if generation == self.generation => self.on_armed(handle, deadline),
                GestureTask::Commit { generation } if generation == self.generation => self.on_commit(handle),
                stale => tracing::trace!(task = ?stale, "stale gesture task ignored"),
            }
        }
    }

    fn on_armed(&mut self, handle: TaskHandle, deadline: Instant) {
        let GestureState::PressArmed { origin, arm_task } = self.state else {
            return;
        };
        if arm_task != handle {
            return;
        }
        if !self.enabled {
            self.state = GestureState::Idle;
            return;
        }
        let generation = self.generation;
        self.indicator.show(self.cursor.unwrap_or(origin));
        let commit_task =
            self.scheduler.schedule_at(deadline + self.timing.commit_delay, GestureTask::Commit { generation });
        let progress_task =
            self.scheduler.animate(deadline, self.timing.commit_delay, GestureTask::Progress { generation });
        self.state = GestureState::Countdown { origin, commit_task, progress_task };
        tracing::debug!("hold gesture armed, countdown started");
    }

    fn on_commit(&mut self, handle: TaskHandle) {
        let GestureState::Countdown { commit_task, .. } = self.state else {
            return;
        };
        if commit_task != handle {
            return;
        }
        self.cancel_gesture();
        if let Ok(removed) = self.delete_all() {
            tracing::info!(removed, "hold gesture completed");
        }
    }

    /// Cancels pending tasks, hides the ring and bumps the generation so in-flight tasks go stale.
    fn cancel_gesture(&mut self) {
        match self.state {
            GestureState::Idle => {}
            GestureState::PressArmed { arm_task, .. } => {
                self.scheduler.cancel(arm_task);
            }
            GestureState::Countdown { commit_task, progress_task, .. } => {
                self.scheduler.cancel(commit_task);
                self.scheduler.cancel(progress_task);
            }
        }
        self.generation += 1;
        self.state = GestureState::Idle;
        self.indicator.reset();
    }
}
