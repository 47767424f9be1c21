use anyhow::{bail, Result};
use futures_util::future::LocalBoxFuture;
use winit::dpi::PhysicalSize;

use super::{Mode, ModeKind};
use crate::container::{ContainerLayer, ViewportContainer};
use crate::events::EventHub;
use crate::time::FrameTime;

/// Shows an externally hosted city viewer in place of the 3D scene. Owns no camera or GPU state.
pub struct CityMode {
    url: String,
    active: bool,
    disposed: bool,
}

impl CityMode {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), active: false, disposed: false }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn layer(&self) -> ContainerLayer {
        ContainerLayer::Embedded { url: self.url.clone() }
    }
}

impl Mode for CityMode {
    fn kind(&self) -> ModeKind {
        ModeKind::City
    }

    fn initialize(&mut self) -> LocalBoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.disposed {
                bail!("city mode was already disposed");
            }
            if self.url.trim().is_empty() {
                bail!("city viewer url is empty");
            }
            Ok(())
        })
    }

    fn attach(&mut self, container: &mut ViewportContainer, _hub: &mut EventHub) -> Result<()> {
        if self.disposed {
            bail!("city mode was already disposed");
        }
        container.push_layer(self.layer());
        self.active = true;
        tracing::info!(url = %self.url, "city viewer embedded");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.active
    }

    fn has_viewport(&self) -> bool {
        false
    }

    fn update(&mut self, _frame: &FrameTime) -> Result<()> {
        Ok(())
    }

    fn resize(&mut self, _size: PhysicalSize<u32>) {}

    fn dispose(&mut self, container: &mut ViewportContainer) {
        if self.disposed {
            return;
        }
        if self.active {
            container.remove_layer(&self.layer());
        }
        self.active = false;
        self.disposed = true;
    }
}
