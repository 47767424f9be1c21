use anyhow::{Context, Result};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window};

use crate::config::{AppConfig, AppConfigOverrides};
use crate::container::ViewportContainer;
use crate::geometry::FileModelSource;
use crate::input::{Input, InputEvent, RawInput, ViewerAction};
use crate::renderer::WgpuBackend;
use crate::scene_manager::{DefaultModeFactory, SceneManager};
use crate::time::Time;

pub const DEFAULT_CONFIG_PATH: &str = "config/app.json";

pub fn run() -> Result<()> {
    run_with_overrides(AppConfig::load_or_default(DEFAULT_CONFIG_PATH), AppConfigOverrides::default())
}

pub fn run_with_overrides(mut config: AppConfig, overrides: AppConfigOverrides) -> Result<()> {
    if !overrides.is_empty() {
        config.apply_overrides(&overrides);
        tracing::info!(fields = ?overrides.applied_fields(), "command line overrides applied");
    }
    let event_loop = EventLoop::new().context("Failed to create winit event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("Event loop execution failed")?;
    Ok(())
}

pub struct App {
    config: AppConfig,
    input: Input,
    time: Time,
    window: Option<Arc<Window>>,
    scene: Option<SceneManager>,
    should_close: bool,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let input = Input::from_config(&config.viewer.input_bindings, &config.gesture);
        Self { config, input, time: Time::new(), window: None, scene: None, should_close: false }
    }

    fn create_window(&self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        let window_cfg = &self.config.window;
        let mut attrs = Window::default_attributes()
            .with_title(window_cfg.title.clone())
            .with_inner_size(PhysicalSize::new(window_cfg.width, window_cfg.height));
        if window_cfg.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        Ok(Arc::new(event_loop.create_window(attrs).context("Failed to create window")?))
    }

    fn start_scene(&mut self, window: Arc<Window>) {
        let factory = DefaultModeFactory::new(
            self.config.clone(),
            Rc::new(WgpuBackend::new(self.config.window.vsync)),
            Rc::new(FileModelSource::default()),
        );
        let mut scene = SceneManager::new(ViewportContainer::for_window(window), factory);
        let initial = self.config.viewer.initial_mode.clone();
        if let Err(err) = pollster::block_on(scene.switch_mode(&initial)) {
            tracing::error!(mode = %initial, error = %err, "initial mode failed to start");
        }
        self.scene = Some(scene);
    }

    fn route(&mut self, event: InputEvent, now: Instant) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        match &event {
            InputEvent::Key { key: Key::Named(NamedKey::Escape), pressed: true } => {
                self.should_close = true;
                return;
            }
            InputEvent::Action { action, pressed: true } => {
                if let Some(mode) = action.mode_name() {
                    if let Err(err) = pollster::block_on(scene.switch_mode(mode)) {
                        tracing::warn!(mode, error = %err, "mode switch failed");
                    }
                    return;
                }
                if let Some(category) = action.category_name() {
                    scene.toggle_category(category);
                    return;
                }
                if *action == ViewerAction::ClearSections {
                    let removed = scene.clear_sections();
                    tracing::debug!(removed, "sections cleared");
                    return;
                }
            }
            _ => {}
        }
        scene.handle_event(&event, now);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window = match self.create_window(event_loop) {
            Ok(window) => window,
            Err(err) => {
                tracing::error!(error = ?err, "window creation failed");
                self.should_close = true;
                return;
            }
        };
        self.window = Some(Arc::clone(&window));
        self.start_scene(Arc::clone(&window));
        window.request_redraw();
    }

    fn window_event(&mut self, _el: &ActiveEventLoop, _id: winit::window::WindowId, event: WindowEvent) {
        let now = Instant::now();
        match &event {
            WindowEvent::CloseRequested => self.should_close = true,
            WindowEvent::Resized(size) => {
                if let Some(scene) = self.scene.as_mut() {
                    scene.on_resize(*size);
                }
            }
            WindowEvent::RedrawRequested => {
                let frame = self.time.tick();
                if let Some(scene) = self.scene.as_mut() {
                    // Failures are logged by the manager; the loop keeps going.
                    let _ = scene.update(&frame);
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
        for input_event in self.input.translate(&event, now) {
            self.route(input_event, now);
        }
    }

    fn device_event(&mut self, _el: &ActiveEventLoop, _dev: winit::event::DeviceId, ev: DeviceEvent) {
        let now = Instant::now();
        for input_event in self.input.push(RawInput::from_device_event(&ev), now) {
            self.route(input_event, now);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_close {
            if let Some(scene) = self.scene.as_mut() {
                scene.shutdown();
            }
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(scene) = self.scene.as_mut() {
            scene.shutdown();
        }
    }
}
