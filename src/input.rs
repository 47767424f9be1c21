use glam::Vec2;
use serde::Deserialize;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use winit::event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{Key, NamedKey};

use crate::config::GestureConfig;

/// Viewer-level commands a key can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerAction {
    DeleteSections,
    ClearSections,
    SwitchProject,
    SwitchInspection,
    SwitchCity,
    ToggleWalls,
    ToggleWindows,
    ToggleSlabs,
    ToggleColumns,
    ToggleBeams,
}

impl ViewerAction {
    fn from_str(value: &str) -> Option<Self> {
        match value {
            "delete_sections" => Some(Self::DeleteSections),
            "clear_sections" => Some(Self::ClearSections),
            "switch_project" => Some(Self::SwitchProject),
            "switch_inspection" => Some(Self::SwitchInspection),
            "switch_city" => Some(Self::SwitchCity),
            "toggle_walls" => Some(Self::ToggleWalls),
            "toggle_windows" => Some(Self::ToggleWindows),
            "toggle_slabs" => Some(Self::ToggleSlabs),
            "toggle_columns" => Some(Self::ToggleColumns),
            "toggle_beams" => Some(Self::ToggleBeams),
            _ => None,
        }
    }

    /// Mode name understood by `SceneManager::switch_mode`.
    pub fn mode_name(self) -> Option<&'static str> {
        match self {
            Self::SwitchProject => Some("project"),
            Self::SwitchInspection => Some("inspection"),
            Self::SwitchCity => Some("city"),
            _ => None,
        }
    }

    /// Category name understood by `InspectionMode::toggle_category`.
    pub fn category_name(self) -> Option<&'static str> {
        match self {
            Self::ToggleWalls => Some("IfcWall"),
            Self::ToggleWindows => Some("IfcWindow"),
            Self::ToggleSlabs => Some("IfcSlab"),
            Self::ToggleColumns => Some("IfcColumn"),
            Self::ToggleBeams => Some("IfcBeam"),
            _ => None,
        }
    }
}

/// Semantic input consumed by modes. Pointer coordinates are physical pixels relative to the
/// render target's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    CursorMoved { x: f32, y: f32 },
    CursorLeft,
    MouseButton { button: MouseButton, pressed: bool, x: f32, y: f32 },
    DoubleClick { x: f32, y: f32 },
    Wheel { delta: f32 },
    MouseMotion { dx: f32, dy: f32 },
    Action { action: ViewerAction, pressed: bool },
    Key { key: Key, pressed: bool },
}

impl InputEvent {
    pub fn is_keyboard(&self) -> bool {
        matches!(self, InputEvent::Action { .. } | InputEvent::Key { .. })
    }

    pub fn pointer_position(&self) -> Option<Vec2> {
        match self {
            InputEvent::CursorMoved { x, y }
            | InputEvent::MouseButton { x, y, .. }
            | InputEvent::DoubleClick { x, y } => Some(Vec2::new(*x, *y)),
            _ => None,
        }
    }
}

/// Platform events reduced to what the viewer cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    Key { key: Key, pressed: bool },
    MouseMove { dx: f32, dy: f32 },
    Wheel { delta: f32 },
    MouseButton { button: MouseButton, pressed: bool },
    CursorPos { x: f32, y: f32 },
    CursorLeft,
    Other,
}

impl RawInput {
    pub fn from_window_event(ev: &WindowEvent) -> Self {
        match ev {
            WindowEvent::MouseWheel { delta, .. } => {
                let d = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
                };
                RawInput::Wheel { delta: d }
            }
            WindowEvent::CursorMoved { position, .. } => {
                RawInput::CursorPos { x: position.x as f32, y: position.y as f32 }
            }
            WindowEvent::CursorLeft { .. } => RawInput::CursorLeft,
            WindowEvent::MouseInput { state, button, .. } => {
                RawInput::MouseButton { button: *button, pressed: *state == ElementState::Pressed }
            }
            WindowEvent::KeyboardInput { event, .. } => RawInput::Key {
                key: event.logical_key.clone(),
                pressed: event.state == ElementState::Pressed,
            },
            _ => RawInput::Other,
        }
    }

    pub fn from_device_event(ev: &DeviceEvent) -> Self {
        match ev {
            DeviceEvent::MouseMotion { delta: (dx, dy) } => {
                RawInput::MouseMove { dx: *dx as f32, dy: *dy as f32 }
            }
            _ => RawInput::Other,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ClickGate {
    window: Duration,
    max_distance: f32,
}

pub struct Input {
    bindings: InputBindings,
    click_gate: ClickGate,
    cursor_pos: Option<Vec2>,
    last_primary_press: Option<(Instant, Vec2)>,
    left_pressed: bool,
    right_pressed: bool,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(path: impl AsRef<Path>, gesture: &GestureConfig) -> Self {
        let bindings = InputBindings::load_or_default(path);
        let mut input = Self::with_bindings(bindings);
        input.click_gate = ClickGate {
            window: Duration::from_millis(gesture.double_click_ms),
            max_distance: gesture.move_threshold_px,
        };
        input
    }

    fn with_bindings(bindings: InputBindings) -> Self {
        let gesture = GestureConfig::default();
        Self {
            bindings,
            click_gate: ClickGate {
                window: Duration::from_millis(gesture.double_click_ms),
                max_distance: gesture.move_threshold_px,
            },
            cursor_pos: None,
            last_primary_press: None,
            left_pressed: false,
            right_pressed: false,
        }
    }

    pub fn translate(&mut self, ev: &WindowEvent, now: Instant) -> SmallVec<[InputEvent; 2]> {
        self.push(RawInput::from_window_event(ev), now)
    }

    /// Converts one raw event into zero or more viewer events. A primary press that completes a
    /// double click yields the button event followed by `DoubleClick`.
    pub fn push(&mut self, raw: RawInput, now: Instant) -> SmallVec<[InputEvent; 2]> {
        let mut out = SmallVec::new();
        match raw {
            RawInput::Key { key, pressed } => match self.action_for_key(&key) {
                Some(action) => out.push(InputEvent::Action { action, pressed }),
                None => out.push(InputEvent::Key { key, pressed }),
            },
            RawInput::MouseMove { dx, dy } => out.push(InputEvent::MouseMotion { dx, dy }),
            RawInput::Wheel { delta } => out.push(InputEvent::Wheel { delta }),
            RawInput::CursorPos { x, y } => {
                self.cursor_pos = Some(Vec2::new(x, y));
                out.push(InputEvent::CursorMoved { x, y });
            }
            RawInput::CursorLeft => {
                self.cursor_pos = None;
                self.left_pressed = false;
                self.right_pressed = false;
                out.push(InputEvent::CursorLeft);
            }
            RawInput::MouseButton { button, pressed } => {
                let pos = self.cursor_pos.unwrap_or(Vec2::ZERO);
                match button {
                    MouseButton::Left => self.left_pressed = pressed,
                    MouseButton::Right => self.right_pressed = pressed,
                    _ => {}
                }
                out.push(InputEvent::MouseButton { button, pressed, x: pos.x, y: pos.y });
                if button == MouseButton::Left && pressed {
                    if self.completes_double_click(pos, now) {
                        self.last_primary_press = None;
                        out.push(InputEvent::DoubleClick { x: pos.x, y: pos.y });
                    } else {
                        self.last_primary_press = Some((now, pos));
                    }
                }
            }
            RawInput::Other => {}
        }
        out
    }

    fn completes_double_click(&self, pos: Vec2, now: Instant) -> bool {
        let Some((at, first)) = self.last_primary_press else {
            return false;
        };
        let within_time = now.saturating_duration_since(at) <= self.click_gate.window;
        let delta = (pos - first).abs();
        within_time && delta.x <= self.click_gate.max_distance && delta.y <= self.click_gate.max_distance
    }

    fn action_for_key(&self, key: &Key) -> Option<ViewerAction> {
        let binding = InputKeyBinding::from_event_key(key)?;
        self.bindings.action_for_key(&binding)
    }

    pub fn left_held(&self) -> bool {
        self.left_pressed
    }

    pub fn right_held(&self) -> bool {
        self.right_pressed
    }

    pub fn cursor_position(&self) -> Option<Vec2> {
        self.cursor_pos
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::with_bindings(InputBindings::default())
    }
}

#[derive(Debug, Clone)]
struct InputBindings {
    key_to_action: HashMap<InputKeyBinding, ViewerAction>,
}

impl InputBindings {
    fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<InputConfigFile>(&contents) {
                Ok(config) => Self::from_config(config, &path.display().to_string()),
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse input bindings, falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read input bindings, falling back to defaults"
                );
                Self::default()
            }
        }
    }

    fn from_config(config: InputConfigFile, origin: &str) -> Self {
        let overrides = config.into_overrides(origin);
        Self::with_overrides(overrides)
    }

    fn with_overrides(overrides: HashMap<ViewerAction, Vec<InputKeyBinding>>) -> Self {
        let mut action_map = Self::default_action_map();
        for (action, keys) in overrides {
            if keys.is_empty() {
                continue;
            }
            action_map.insert(action, keys);
        }
        Self::from_action_map(action_map)
    }

    fn default_action_map() -> HashMap<ViewerAction, Vec<InputKeyBinding>> {
        use ViewerAction::*;
        let mut map = HashMap::new();
        map.insert(
            DeleteSections,
            vec![InputKeyBinding::named(NamedKeyCode::Delete), InputKeyBinding::named(NamedKeyCode::Backspace)],
        );
        map.insert(ClearSections, vec![InputKeyBinding::character("x")]);
        map.insert(SwitchProject, vec![InputKeyBinding::character("1")]);
        map.insert(SwitchInspection, vec![InputKeyBinding::character("2")]);
        map.insert(SwitchCity, vec![InputKeyBinding::character("3")]);
        map.insert(ToggleWalls, vec![InputKeyBinding::character("w")]);
        map.insert(ToggleWindows, vec![InputKeyBinding::character("n")]);
        map.insert(ToggleSlabs, vec![InputKeyBinding::character("s")]);
        map.insert(ToggleColumns, vec![InputKeyBinding::character("c")]);
        map.insert(ToggleBeams, vec![InputKeyBinding::character("b")]);
        map
    }

    fn from_action_map(action_map: HashMap<ViewerAction, Vec<InputKeyBinding>>) -> Self {
        let mut key_to_action = HashMap::new();
        for (action, keys) in action_map {
            for key in keys {
                key_to_action.insert(key, action);
            }
        }
        Self { key_to_action }
    }

    fn action_for_key(&self, key: &InputKeyBinding) -> Option<ViewerAction> {
        self.key_to_action.get(key).copied()
    }
}

impl Default for InputBindings {
    fn default() -> Self {
        Self::from_action_map(Self::default_action_map())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum InputKeyBinding {
    Character(String),
    Named(NamedKeyCode),
}

impl InputKeyBinding {
    fn character(ch: &str) -> Self {
        Self::Character(ch.to_lowercase())
    }

    fn named(named: NamedKeyCode) -> Self {
        Self::Named(named)
    }

    fn from_event_key(key: &Key) -> Option<Self> {
        match key {
            Key::Character(ch) => {
                let s = ch.to_string();
                if s.is_empty() {
                    None
                } else {
                    Some(Self::Character(s.to_lowercase()))
                }
            }
            Key::Named(named) => NamedKeyCode::from_named_key(named).map(Self::Named),
            _ => None,
        }
    }

    fn from_config_value(raw: &str) -> Result<Self, ()> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(());
        }
        if let Some(named) = NamedKeyCode::from_str(&normalized) {
            return Ok(Self::Named(named));
        }
        if normalized.chars().count() == 1 {
            return Ok(Self::Character(normalized));
        }
        Err(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NamedKeyCode {
    Delete,
    Backspace,
    Escape,
    Space,
}

impl NamedKeyCode {
    fn from_named_key(key: &NamedKey) -> Option<Self> {
        match key {
            NamedKey::Delete => Some(Self::Delete),
            NamedKey::Backspace => Some(Self::Backspace),
            NamedKey::Escape => Some(Self::Escape),
            NamedKey::Space => Some(Self::Space),
            _ => None,
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "delete" | "del" => Some(Self::Delete),
            "backspace" => Some(Self::Backspace),
            "escape" | "esc" => Some(Self::Escape),
            "space" => Some(Self::Space),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InputConfigFile {
    #[serde(default)]
    bindings: HashMap<String, Vec<String>>,
}

impl InputConfigFile {
    fn into_overrides(self, origin: &str) -> HashMap<ViewerAction, Vec<InputKeyBinding>> {
        let mut overrides = HashMap::new();
        for (action_name, keys) in self.bindings {
            let action_key = action_name.trim().to_lowercase();
            match ViewerAction::from_str(&action_key) {
                Some(action) => {
                    let mut parsed = Vec::new();
                    for key in keys {
                        match InputKeyBinding::from_config_value(&key) {
                            Ok(binding) => parsed.push(binding),
                            Err(_) => tracing::warn!(
                                %origin,
                                %key,
                                action = %action_name,
                                "unknown key in input bindings, ignoring"
                            ),
                        }
                    }
                    if parsed.is_empty() {
                        tracing::warn!(
                            %origin,
                            action = %action_name,
                            "action has no valid keys, keeping defaults"
                        );
                        continue;
                    }
                    overrides.insert(action, parsed);
                }
                None => tracing::warn!(%origin, action = %action_name, "unknown action in input bindings, ignoring"),
            }
        }
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_and_backspace_map_to_delete_sections() {
        let mut input = Input::new();
        let now = Instant::now();
        for named in [NamedKey::Delete, NamedKey::Backspace] {
            let events = input.push(RawInput::Key { key: Key::Named(named), pressed: true }, now);
            assert_eq!(
                events.as_slice(),
                &[InputEvent::Action { action: ViewerAction::DeleteSections, pressed: true }]
            );
        }
    }

    #[test]
    fn unbound_keys_pass_through_raw() {
        let mut input = Input::new();
        let events = input.push(RawInput::Key { key: Key::Character("z".into()), pressed: true }, Instant::now());
        assert!(matches!(events.as_slice(), [InputEvent::Key { pressed: true, .. }]));
    }

    #[test]
    fn two_quick_presses_synthesize_double_click() {
        let mut input = Input::new();
        let t0 = Instant::now();
        input.push(RawInput::CursorPos { x: 100.0, y: 80.0 }, t0);
        let first = input.push(RawInput::MouseButton { button: MouseButton::Left, pressed: true }, t0);
        assert_eq!(first.len(), 1);
        input.push(RawInput::MouseButton { button: MouseButton::Left, pressed: false }, t0);
        input.push(RawInput::CursorPos { x: 102.0, y: 81.0 }, t0);
        let second = input.push(
            RawInput::MouseButton { button: MouseButton::Left, pressed: true },
            t0 + Duration::from_millis(180),
        );
        assert_eq!(second.last(), Some(&InputEvent::DoubleClick { x: 102.0, y: 81.0 }));

        let third = input.push(
            RawInput::MouseButton { button: MouseButton::Left, pressed: true },
            t0 + Duration::from_millis(250),
        );
        assert_eq!(third.len(), 1, "a double click consumes the pending press");
    }

    #[test]
    fn slow_or_distant_presses_are_single_clicks() {
        let mut input = Input::new();
        let t0 = Instant::now();
        input.push(RawInput::CursorPos { x: 10.0, y: 10.0 }, t0);
        input.push(RawInput::MouseButton { button: MouseButton::Left, pressed: true }, t0);
        let late = input.push(
            RawInput::MouseButton { button: MouseButton::Left, pressed: true },
            t0 + Duration::from_millis(400),
        );
        assert_eq!(late.len(), 1);

        input.push(RawInput::CursorPos { x: 40.0, y: 10.0 }, t0);
        let far = input.push(
            RawInput::MouseButton { button: MouseButton::Left, pressed: true },
            t0 + Duration::from_millis(450),
        );
        assert_eq!(far.len(), 1);
    }
}
