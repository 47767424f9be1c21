pub mod app;
pub mod camera3d;
pub mod cli;
pub mod config;
pub mod container;
pub mod error;
pub mod events;
pub mod geometry;
pub mod input;
pub mod logging;
pub mod modes;
pub mod renderer;
pub mod scene_manager;
pub mod scheduler;
pub mod section;
pub mod time;

pub use app::{run, run_with_overrides, App};
pub use error::{SectionError, ViewerError};
pub use modes::{Mode, ModeKind};
pub use scene_manager::{DefaultModeFactory, ModeFactory, SceneManager};
