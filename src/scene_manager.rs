//! Mode lifecycle. The manager owns the shared container and the event hub and keeps at most one
//! mode attached to them.
//!
//! Switching is a two-phase commit: the requested mode is built and initialized while the current
//! one keeps running, and only once that succeeds is the current mode disposed, the container
//! cleared and the new mode attached. A failed initialization leaves the current mode untouched.

use anyhow::Result;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Instant;
use winit::dpi::PhysicalSize;

use crate::config::AppConfig;
use crate::container::ViewportContainer;
use crate::error::ViewerError;
use crate::events::EventHub;
use crate::geometry::ModelSource;
use crate::input::InputEvent;
use crate::modes::{CityMode, InspectionMode, Mode, ModeKind, ProjectMode};
use crate::renderer::RenderBackend;
use crate::time::FrameTime;

/// Builds a fresh mode instance for every activation.
pub trait ModeFactory {
    fn create(&self, kind: ModeKind) -> Result<Box<dyn Mode>>;
}

pub struct DefaultModeFactory {
    config: AppConfig,
    backend: Rc<dyn RenderBackend>,
    source: Rc<dyn ModelSource>,
}

impl DefaultModeFactory {
    pub fn new(config: AppConfig, backend: Rc<dyn RenderBackend>, source: Rc<dyn ModelSource>) -> Self {
        Self { config, backend, source }
    }
}

impl ModeFactory for DefaultModeFactory {
    fn create(&self, kind: ModeKind) -> Result<Box<dyn Mode>> {
        let mode: Box<dyn Mode> = match kind {
            ModeKind::Project => {
                Box::new(ProjectMode::new(&self.config, Rc::clone(&self.source), Rc::clone(&self.backend)))
            }
            ModeKind::Inspection => {
                Box::new(InspectionMode::new(&self.config, Rc::clone(&self.source), Rc::clone(&self.backend)))
            }
            ModeKind::City => Box::new(CityMode::new(self.config.city.url.clone())),
        };
        Ok(mode)
    }
}

pub struct SceneManager {
    factory: Box<dyn ModeFactory>,
    container: ViewportContainer,
    hub: EventHub,
    active: Option<Box<dyn Mode>>,
    failed_frames: u64,
}

impl SceneManager {
    pub fn new(container: ViewportContainer, factory: impl ModeFactory + 'static) -> Self {
        Self { factory: Box::new(factory), container, hub: EventHub::new(), active: None, failed_frames: 0 }
    }

    pub fn active_kind(&self) -> Option<ModeKind> {
        self.active.as_ref().map(|mode| mode.kind())
    }

    pub fn active_mode(&self) -> Option<&dyn Mode> {
        self.active.as_deref()
    }

    pub fn container(&self) -> &ViewportContainer {
        &self.container
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Frames whose update failed or panicked and were skipped.
    pub fn failed_frames(&self) -> u64 {
        self.failed_frames
    }

    pub async fn switch_mode(&mut self, name: &str) -> Result<(), ViewerError> {
        let Some(kind) = ModeKind::parse(name) else {
            tracing::warn!(mode = name, "unknown mode requested, ignoring");
            return Err(ViewerError::UnknownMode(name.to_string()));
        };

        let mut next = self.factory.create(kind).map_err(|source| {
            tracing::error!(mode = %kind, error = %format!("{source:#}"), "failed to construct mode");
            ViewerError::ModeInitialization { mode: kind, source }
        })?;

        if let Err(source) = next.initialize().await {
            tracing::error!(
                mode = %kind,
                current = ?self.active_kind(),
                error = %format!("{source:#}"),
                "mode initialization failed, keeping current mode"
            );
            next.dispose(&mut self.container);
            return Err(ViewerError::ModeInitialization { mode: kind, source });
        }

        if let Some(mut previous) = self.active.take() {
            let previous_kind = previous.kind();
            previous.dispose(&mut self.container);
            self.container.clear();
            tracing::debug!(mode = %previous_kind, "previous mode disposed");
        }

        if let Err(source) = next.attach(&mut self.container, &mut self.hub) {
            tracing::error!(mode = %kind, error = %format!("{source:#}"), "mode failed to attach");
            next.dispose(&mut self.container);
            self.container.clear();
            return Err(ViewerError::ModeInitialization { mode: kind, source });
        }

        tracing::info!(mode = %kind, "mode activated");
        self.active = Some(next);
        self.container.request_redraw();
        Ok(())
    }

    /// Forwards the frame tick. Errors and panics are logged and the frame is skipped; they never
    /// reach the caller's frame loop as a panic.
    pub fn update(&mut self, frame: &FrameTime) -> Result<(), ViewerError> {
        let Some(mode) = self.active.as_mut() else {
            return Ok(());
        };
        let kind = mode.kind();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| mode.update(frame)));
        let message = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => format!("{err:#}"),
            Err(payload) => format!("panic: {}", panic_message(payload.as_ref())),
        };
        self.failed_frames += 1;
        tracing::error!(mode = %kind, error = %message, "mode update failed, frame skipped");
        Err(ViewerError::ModeUpdate { mode: kind, message })
    }

    pub fn on_resize(&mut self, size: PhysicalSize<u32>) {
        self.container.set_size(size);
        if let Some(mode) = self.active.as_mut() {
            if mode.has_viewport() {
                mode.resize(size);
            }
        }
    }

    /// Publishes input to the active mode's subscriptions and lets it react immediately.
    pub fn handle_event(&mut self, event: &InputEvent, now: Instant) {
        let Some(mode) = self.active.as_mut() else {
            return;
        };
        self.hub.publish(event);
        mode.process_events(now);
    }

    pub fn toggle_category(&mut self, name: &str) -> Option<bool> {
        let mode = self.active.as_mut()?;
        let changed = mode.toggle_category(name);
        if changed.is_some() {
            self.container.request_redraw();
        }
        changed
    }

    pub fn clear_sections(&mut self) -> usize {
        self.active.as_mut().map_or(0, |mode| mode.clear_sections())
    }

    pub fn shutdown(&mut self) {
        if let Some(mut mode) = self.active.take() {
            let kind = mode.kind();
            mode.dispose(&mut self.container);
            tracing::info!(mode = %kind, "mode disposed on shutdown");
        }
        self.container.clear();
    }
}

impl Drop for SceneManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
