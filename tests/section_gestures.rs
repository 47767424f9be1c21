use glam::{Vec2, Vec3};
use sitelens::config::{EdgeStyleConfig, GestureConfig, SectionConfig};
use sitelens::events::EventHub;
use sitelens::geometry::{FragmentId, PickHit, PointerPicker};
use sitelens::input::{InputEvent, ViewerAction};
use sitelens::section::{ClipperManager, GestureState};
use std::time::{Duration, Instant};
use winit::event::MouseButton;

struct NoHit;

impl PointerPicker for NoHit {
    fn pick(&self, _pointer: Vec2) -> Option<PickHit> {
        None
    }
}

struct FloorHit;

impl PointerPicker for FloorHit {
    fn pick(&self, pointer: Vec2) -> Option<PickHit> {
        Some(PickHit {
            point: Vec3::new(pointer.x, 0.0, pointer.y),
            normal: Vec3::Y,
            distance: 10.0,
            fragment: FragmentId::new("site", "floor"),
            element: 7,
        })
    }
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn clipper_with_planes(count: usize, now: Instant) -> ClipperManager {
    let mut clipper =
        ClipperManager::new(SectionConfig::default(), &GestureConfig::default(), &EdgeStyleConfig::default());
    for i in 0..count {
        clipper.create_plane(Vec3::new(i as f32, 0.0, 0.0), Vec3::X, now).expect("create plane");
    }
    clipper
}

#[test]
fn moving_past_threshold_cancels_the_hold() {
    let t0 = Instant::now();
    let mut clipper = clipper_with_planes(2, t0);

    clipper.pointer_down(Vec2::new(200.0, 200.0), t0);
    clipper.tick(t0 + ms(100));
    clipper.pointer_move(Vec2::new(206.0, 200.0), t0 + ms(300));
    assert_eq!(clipper.gesture_state(), GestureState::Idle);

    clipper.tick(t0 + ms(2_000));
    assert_eq!(clipper.plane_count(), 2, "a cancelled hold never deletes");
    assert!(!clipper.indicator().is_visible());
    assert!(!clipper.has_pending_tasks());
}

#[test]
fn movement_within_threshold_keeps_the_hold() {
    let t0 = Instant::now();
    let mut clipper = clipper_with_planes(1, t0);

    clipper.pointer_down(Vec2::new(200.0, 200.0), t0);
    clipper.pointer_move(Vec2::new(204.0, 196.0), t0 + ms(200));
    clipper.tick(t0 + ms(500));
    assert!(matches!(clipper.gesture_state(), GestureState::Countdown { .. }));
    assert!(clipper.indicator().is_visible());

    clipper.tick(t0 + ms(1_500));
    assert_eq!(clipper.plane_count(), 0);
}

#[test]
fn short_hold_then_release_deletes_nothing() {
    let t0 = Instant::now();
    let mut clipper = clipper_with_planes(3, t0);

    clipper.pointer_down(Vec2::new(50.0, 50.0), t0);
    clipper.tick(t0 + ms(500));
    assert!(clipper.indicator().is_visible(), "ring appears once the arm delay elapses");
    clipper.pointer_up(t0 + ms(500));

    clipper.tick(t0 + ms(3_000));
    assert_eq!(clipper.plane_count(), 3);
    assert!(!clipper.indicator().is_visible());
    assert_eq!(clipper.indicator().progress(), 0.0);
}

#[test]
fn full_hold_deletes_every_plane() {
    let t0 = Instant::now();
    let mut clipper = clipper_with_planes(3, t0);

    clipper.pointer_down(Vec2::new(50.0, 50.0), t0);
    clipper.tick(t0 + ms(500));
    clipper.tick(t0 + ms(1_000));
    assert!(clipper.indicator().progress() > 0.4 && clipper.indicator().progress() < 0.6);
    assert_eq!(clipper.plane_count(), 3, "nothing is deleted before the countdown ends");

    clipper.tick(t0 + ms(1_500));
    assert_eq!(clipper.plane_count(), 0);
    assert!(clipper.clip_planes().is_empty());
    assert_eq!(clipper.gesture_state(), GestureState::Idle);
    assert!(!clipper.indicator().is_visible());
}

#[test]
fn release_between_commit_deadline_and_next_frame_still_deletes() {
    let t0 = Instant::now();
    let mut hub = EventHub::new();
    let mut clipper = clipper_with_planes(2, t0);
    clipper.subscribe(&mut hub);

    hub.publish(&InputEvent::MouseButton { button: MouseButton::Left, pressed: true, x: 20.0, y: 20.0 });
    clipper.process_events(t0, &NoHit);
    clipper.tick(t0 + ms(1_490));
    assert_eq!(clipper.plane_count(), 2);

    hub.publish(&InputEvent::MouseButton { button: MouseButton::Left, pressed: false, x: 20.0, y: 20.0 });
    clipper.process_events(t0 + ms(1_505), &NoHit);
    assert_eq!(clipper.plane_count(), 0, "the hold lasted past the commit deadline");
    assert_eq!(clipper.gesture_state(), GestureState::Idle);

    clipper.tick(t0 + ms(1_510));
    assert_eq!(clipper.plane_count(), 0);
    assert!(!clipper.has_pending_tasks());
}

#[test]
fn second_press_restarts_the_gesture() {
    let t0 = Instant::now();
    let mut clipper = clipper_with_planes(1, t0);

    clipper.pointer_down(Vec2::new(10.0, 10.0), t0);
    clipper.tick(t0 + ms(500));
    assert!(clipper.indicator().is_visible());

    clipper.pointer_down(Vec2::new(10.0, 10.0), t0 + ms(900));
    assert!(matches!(clipper.gesture_state(), GestureState::PressArmed { .. }));
    assert!(!clipper.indicator().is_visible());

    clipper.tick(t0 + ms(1_500));
    assert_eq!(clipper.plane_count(), 1, "the first countdown was discarded");

    clipper.tick(t0 + ms(2_400));
    assert_eq!(clipper.plane_count(), 0, "the restarted hold completes on its own schedule");
}

#[test]
fn leaving_the_viewport_cancels_the_countdown() {
    let t0 = Instant::now();
    let mut clipper = clipper_with_planes(1, t0);

    clipper.pointer_down(Vec2::new(10.0, 10.0), t0);
    clipper.tick(t0 + ms(600));
    clipper.pointer_leave(t0 + ms(700));
    clipper.tick(t0 + ms(2_000));
    assert_eq!(clipper.plane_count(), 1);
    assert!(!clipper.indicator().is_visible());
}

#[test]
fn delete_action_through_the_hub_requires_subscription_and_enabled() {
    let t0 = Instant::now();
    let delete = InputEvent::Action { action: ViewerAction::DeleteSections, pressed: true };
    let mut hub = EventHub::new();

    let mut unsubscribed = clipper_with_planes(2, t0);
    hub.publish(&delete);
    unsubscribed.process_events(t0, &NoHit);
    assert_eq!(unsubscribed.plane_count(), 2, "no subscription, no delivery");

    let mut clipper = clipper_with_planes(2, t0);
    clipper.subscribe(&mut hub);
    clipper.set_enabled(false);
    hub.publish(&delete);
    clipper.process_events(t0, &NoHit);
    assert_eq!(clipper.plane_count(), 2, "disabled manager ignores delete");

    clipper.set_enabled(true);
    hub.publish(&InputEvent::Action { action: ViewerAction::DeleteSections, pressed: false });
    clipper.process_events(t0, &NoHit);
    assert_eq!(clipper.plane_count(), 2, "key release is not a delete");

    hub.publish(&delete);
    clipper.process_events(t0, &NoHit);
    assert_eq!(clipper.plane_count(), 0);

    clipper.dispose();
    assert_eq!(hub.publish(&delete), 0, "dispose releases the subscriptions");
}

#[test]
fn pointer_events_through_the_hub_drive_the_gesture() {
    let t0 = Instant::now();
    let mut hub = EventHub::new();
    let mut clipper = clipper_with_planes(0, t0);
    clipper.subscribe(&mut hub);

    hub.publish(&InputEvent::MouseButton { button: MouseButton::Left, pressed: true, x: 30.0, y: 40.0 });
    hub.publish(&InputEvent::DoubleClick { x: 30.0, y: 40.0 });
    hub.publish(&InputEvent::MouseButton { button: MouseButton::Left, pressed: false, x: 30.0, y: 40.0 });
    clipper.process_events(t0, &FloorHit);

    assert_eq!(clipper.plane_count(), 1);
    let plane = clipper.planes().values().next().expect("plane");
    assert_eq!(plane.origin, Vec3::new(30.0, 0.0, 40.0));
    assert_eq!(plane.normal, -Vec3::Y);
    assert_eq!(clipper.gesture_state(), GestureState::Idle, "release ended the press");

    hub.publish(&InputEvent::MouseButton { button: MouseButton::Right, pressed: true, x: 30.0, y: 40.0 });
    clipper.process_events(t0 + ms(10), &FloorHit);
    clipper.tick(t0 + ms(510));
    clipper.tick(t0 + ms(1_510));
    assert_eq!(clipper.plane_count(), 0, "any button can hold to clear");
}

#[test]
fn disposed_manager_rejects_everything() {
    let t0 = Instant::now();
    let mut clipper = clipper_with_planes(1, t0);
    clipper.dispose();
    clipper.dispose();

    assert!(clipper.is_disposed());
    assert_eq!(clipper.plane_count(), 0);
    assert!(clipper.create_plane(Vec3::ZERO, Vec3::Y, t0).is_err());
    clipper.double_click(Vec2::ZERO, &FloorHit, t0);
    clipper.key_delete();
    clipper.pointer_down(Vec2::ZERO, t0);
    clipper.tick(t0 + ms(2_000));
    assert_eq!(clipper.plane_count(), 0);
    assert!(!clipper.has_pending_tasks());
}
