use sitelens::config::GestureConfig;
use sitelens::input::{Input, InputEvent, RawInput, ViewerAction};
use std::io::Write;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use winit::event::MouseButton;
use winit::keyboard::{Key, NamedKey};

fn press(input: &mut Input, key: Key) -> Vec<InputEvent> {
    input.push(RawInput::Key { key, pressed: true }, Instant::now()).into_vec()
}

fn action(action: ViewerAction) -> Vec<InputEvent> {
    vec![InputEvent::Action { action, pressed: true }]
}

#[test]
fn remapped_section_controls_override_defaults() {
    let mut temp = NamedTempFile::new().expect("temp input config");
    write!(temp, r#"{{"bindings":{{"delete_sections":["d"],"switch_city":["F"],"toggle_walls":["Escape"]}}}}"#)
        .expect("write remap config");

    let mut input = Input::from_config(temp.path(), &GestureConfig::default());

    assert_eq!(press(&mut input, Key::Character("d".into())), action(ViewerAction::DeleteSections));
    assert!(
        matches!(press(&mut input, Key::Named(NamedKey::Delete)).as_slice(), [InputEvent::Key { .. }]),
        "default key should no longer fire when remapped"
    );

    assert_eq!(press(&mut input, Key::Character("f".into())), action(ViewerAction::SwitchCity));
    assert_eq!(press(&mut input, Key::Named(NamedKey::Escape)), action(ViewerAction::ToggleWalls));

    assert_eq!(
        press(&mut input, Key::Character("2".into())),
        action(ViewerAction::SwitchInspection),
        "actions missing from the file keep their defaults"
    );
}

#[test]
fn unreadable_config_falls_back_to_defaults() {
    let mut temp = NamedTempFile::new().expect("temp input config");
    write!(temp, "{{ not json").expect("write broken config");

    let mut input = Input::from_config(temp.path(), &GestureConfig::default());
    assert_eq!(press(&mut input, Key::Named(NamedKey::Backspace)), action(ViewerAction::DeleteSections));
    assert_eq!(press(&mut input, Key::Character("x".into())), action(ViewerAction::ClearSections));

    let mut missing = Input::from_config("config/does-not-exist.json", &GestureConfig::default());
    assert_eq!(press(&mut missing, Key::Character("w".into())), action(ViewerAction::ToggleWalls));
}

#[test]
fn double_click_window_follows_gesture_config() {
    let gesture = GestureConfig { double_click_ms: 100, ..GestureConfig::default() };
    let mut temp = NamedTempFile::new().expect("temp input config");
    write!(temp, r#"{{"bindings":{{}}}}"#).expect("write empty config");
    let mut input = Input::from_config(temp.path(), &gesture);

    let t0 = Instant::now();
    input.push(RawInput::CursorPos { x: 40.0, y: 40.0 }, t0);
    let left = RawInput::MouseButton { button: MouseButton::Left, pressed: true };
    input.push(left.clone(), t0);
    let slow = input.push(left.clone(), t0 + Duration::from_millis(150));
    assert_eq!(slow.len(), 1, "outside the configured window");

    let quick = input.push(left, t0 + Duration::from_millis(220));
    assert_eq!(quick.last(), Some(&InputEvent::DoubleClick { x: 40.0, y: 40.0 }));
}
