//! Visualization modes. Exactly one is active at a time; [`crate::scene_manager::SceneManager`]
//! drives the lifecycle.
//!
//! A mode goes through `initialize` (async, off the container: loads whatever it needs),
//! then `attach` (takes the container and the event hub), then any number of `update` calls,
//! and finally `dispose`. A mode that was never attached can still be disposed.

mod city;
mod inspection;
mod project;
mod view;
mod visibility;

pub use city::CityMode;
pub use inspection::InspectionMode;
pub use project::ProjectMode;
pub use visibility::CategoryVisibility;

use anyhow::Result;
use futures_util::future::LocalBoxFuture;
use std::fmt;
use std::time::Instant;
use winit::dpi::PhysicalSize;

use crate::container::ViewportContainer;
use crate::events::EventHub;
use crate::geometry::FragmentStore;
use crate::section::ClipperManager;
use crate::time::FrameTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    Project,
    Inspection,
    City,
}

impl ModeKind {
    pub const ALL: [ModeKind; 3] = [ModeKind::Project, ModeKind::Inspection, ModeKind::City];

    /// Case-insensitive lookup. `ifc` and `bim` are accepted for the inspection mode.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "project" => Some(ModeKind::Project),
            "inspection" | "ifc" | "bim" => Some(ModeKind::Inspection),
            "city" => Some(ModeKind::City),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModeKind::Project => "project",
            ModeKind::Inspection => "inspection",
            ModeKind::City => "city",
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Mode {
    fn kind(&self) -> ModeKind;

    /// Prepares everything that does not need the container (model fetches, classification).
    fn initialize(&mut self) -> LocalBoxFuture<'_, Result<()>>;

    /// Takes over the shared container and registers scoped input subscriptions.
    fn attach(&mut self, container: &mut ViewportContainer, hub: &mut EventHub) -> Result<()>;

    /// True from a successful `attach` until `dispose`.
    fn is_initialized(&self) -> bool;

    /// Whether the mode owns a camera and renderer that care about viewport size.
    fn has_viewport(&self) -> bool;

    fn update(&mut self, frame: &FrameTime) -> Result<()>;

    /// Drains input delivered through the mode's subscriptions.
    fn process_events(&mut self, _now: Instant) {}

    fn resize(&mut self, size: PhysicalSize<u32>);

    /// Returns the new visibility, or `None` when nothing changed.
    fn toggle_category(&mut self, _name: &str) -> Option<bool> {
        None
    }

    fn clear_sections(&mut self) -> usize {
        0
    }

    fn clipper(&self) -> Option<&ClipperManager> {
        None
    }

    fn clipper_mut(&mut self) -> Option<&mut ClipperManager> {
        None
    }

    fn geometry(&self) -> Option<&FragmentStore> {
        None
    }

    /// Releases every resource. Must be safe to call more than once.
    fn dispose(&mut self, container: &mut ViewportContainer);
}
