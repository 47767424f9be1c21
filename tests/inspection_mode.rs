mod common;

use glam::Vec3;
use sitelens::container::ViewportContainer;
use sitelens::events::EventHub;
use sitelens::geometry::{FragmentIdMap, FragmentStore, MemoryModelSource};
use sitelens::input::{InputEvent, ViewerAction};
use sitelens::modes::InspectionMode;
use sitelens::renderer::HeadlessBackend;
use sitelens::time::FrameTime;
use sitelens::{DefaultModeFactory, Mode, ModeKind, SceneManager, SectionError};
use std::rc::Rc;
use std::time::{Duration, Instant};
use winit::dpi::PhysicalSize;
use winit::event::MouseButton;

const CENTER: (f32, f32) = (400.0, 300.0);

fn inspection_scene() -> (SceneManager, HeadlessBackend) {
    let backend = HeadlessBackend::new();
    let factory =
        DefaultModeFactory::new(common::test_config(), Rc::new(backend.clone()), Rc::new(common::building_source()));
    let mut scene = SceneManager::new(ViewportContainer::headless(PhysicalSize::new(800, 600)), factory);
    pollster::block_on(scene.switch_mode("inspection")).expect("inspection mode");
    (scene, backend)
}

fn double_click_center(scene: &mut SceneManager, now: Instant) {
    let (x, y) = CENTER;
    scene.handle_event(&InputEvent::CursorMoved { x, y }, now);
    scene.handle_event(&InputEvent::MouseButton { button: MouseButton::Left, pressed: true, x, y }, now);
    scene.handle_event(&InputEvent::DoubleClick { x, y }, now);
    scene.handle_event(&InputEvent::MouseButton { button: MouseButton::Left, pressed: false, x, y }, now);
}

fn plane_count(scene: &SceneManager) -> usize {
    scene.active_mode().and_then(|mode| mode.clipper()).map_or(0, |clipper| clipper.plane_count())
}

#[test]
fn models_load_with_bound_edges() {
    let (mut scene, backend) = inspection_scene();
    let mode = scene.active_mode().expect("active");
    assert!(mode.is_initialized());
    assert_eq!(mode.geometry().expect("store").models(), ["slab", "wall"]);
    let style = mode.clipper().and_then(|clipper| clipper.style()).expect("edge style");
    assert_eq!(style.bound_fragments().len(), 2, "both models feed the edge style");

    scene.update(&FrameTime::at(Instant::now())).expect("update");
    let log = backend.log();
    assert_eq!(log.frames, 1);
    assert_eq!(log.last_triangles, 24);
    assert_eq!(log.last_clip_planes, 0);
}

#[test]
fn models_sharing_a_name_keep_their_own_fragments() {
    let source = MemoryModelSource::new()
        .with_file(
            "model/1.frag.json",
            common::block_model("tower", "f0", Vec3::new(-10.0, 0.0, -1.0), Vec3::new(10.0, 10.0, 1.0), 1, "IfcWall"),
        )
        .with_file(
            "model/2.frag.json",
            common::block_model("tower", "f0", Vec3::new(-10.0, -1.0, -10.0), Vec3::new(10.0, 0.0, 10.0), 2, "IfcSlab"),
        );
    let backend = HeadlessBackend::new();
    let factory = DefaultModeFactory::new(common::test_config(), Rc::new(backend.clone()), Rc::new(source));
    let mut scene = SceneManager::new(ViewportContainer::headless(PhysicalSize::new(800, 600)), factory);
    pollster::block_on(scene.switch_mode("inspection")).expect("inspection mode");

    let mode = scene.active_mode().expect("active");
    let store = mode.geometry().expect("store");
    assert_eq!(store.models(), ["tower", "tower#2"]);
    assert_eq!(store.fragment_ids().count(), 2);
    let style = mode.clipper().and_then(|clipper| clipper.style()).expect("edge style");
    assert_eq!(style.bound_fragments().len(), 2);

    scene.update(&FrameTime::at(Instant::now())).expect("update");
    assert_eq!(backend.log().last_triangles, 24, "both meshes are drawn");
}

#[test]
fn double_click_on_the_wall_creates_a_plane() {
    let (mut scene, backend) = inspection_scene();
    let now = Instant::now();
    double_click_center(&mut scene, now);

    let clipper = scene.active_mode().and_then(|mode| mode.clipper()).expect("clipper");
    assert_eq!(clipper.plane_count(), 1);
    let plane = clipper.planes().values().next().expect("plane");
    assert!(plane.origin.abs_diff_eq(Vec3::new(0.0, 5.0, 1.0), 1e-3), "origin {:?}", plane.origin);
    assert!(plane.normal.abs_diff_eq(Vec3::NEG_Z, 1e-4), "normal {:?}", plane.normal);
    assert!(plane.enabled);

    scene.update(&FrameTime::at(now + Duration::from_millis(16))).expect("update");
    let log = backend.log();
    assert_eq!(log.last_clip_planes, 1);
    assert!(log.last_world_lines > 0, "the slab is cut by the new plane");
}

#[test]
fn double_click_on_empty_space_creates_nothing() {
    let (mut scene, _backend) = inspection_scene();
    let now = Instant::now();
    scene.handle_event(&InputEvent::DoubleClick { x: 5.0, y: 5.0 }, now);
    assert_eq!(plane_count(&scene), 0);
}

#[test]
fn hold_and_delete_key_clear_planes_through_the_scene() {
    let (mut scene, _backend) = inspection_scene();
    let t0 = Instant::now();
    double_click_center(&mut scene, t0);
    assert_eq!(plane_count(&scene), 1);

    let (x, y) = CENTER;
    scene.handle_event(&InputEvent::MouseButton { button: MouseButton::Left, pressed: true, x, y }, t0);
    scene.update(&FrameTime::at(t0 + Duration::from_millis(500))).expect("arm");
    assert!(scene.active_mode().and_then(|mode| mode.clipper()).is_some_and(|c| c.indicator().is_visible()));
    scene.update(&FrameTime::at(t0 + Duration::from_millis(1_500))).expect("commit");
    assert_eq!(plane_count(&scene), 0);
    scene.handle_event(&InputEvent::MouseButton { button: MouseButton::Left, pressed: false, x, y }, t0);

    let t1 = t0 + Duration::from_secs(5);
    double_click_center(&mut scene, t1);
    assert_eq!(plane_count(&scene), 1);
    scene.handle_event(&InputEvent::Action { action: ViewerAction::DeleteSections, pressed: true }, t1);
    assert_eq!(plane_count(&scene), 0);

    double_click_center(&mut scene, t1);
    assert_eq!(scene.clear_sections(), 1);
    assert_eq!(plane_count(&scene), 0);
}

#[test]
fn toggling_categories_hides_and_restores_elements() {
    let (mut scene, backend) = inspection_scene();
    let frame = FrameTime::at(Instant::now());

    assert_eq!(scene.toggle_category("IfcWall"), Some(false));
    scene.update(&frame).expect("update");
    assert_eq!(backend.log().last_triangles, 12, "only the slab remains");

    let now = Instant::now();
    double_click_center(&mut scene, now);
    assert_eq!(plane_count(&scene), 0, "hidden walls cannot be picked");

    assert_eq!(scene.toggle_category("IfcWall"), Some(true));
    scene.update(&frame).expect("update");
    assert_eq!(backend.log().last_triangles, 24);

    assert_eq!(scene.toggle_category("IfcDoor"), None, "unknown names are ignored");
    assert_eq!(scene.toggle_category("IfcColumn"), None, "no columns in these models");
    let hidden = scene.active_mode().and_then(|mode| mode.geometry()).map(|store| store.hidden().len());
    assert_eq!(hidden, Some(0));
}

#[test]
fn categories_are_a_no_op_outside_inspection() {
    let (mut scene, _backend) = inspection_scene();
    pollster::block_on(scene.switch_mode("city")).expect("city");
    assert_eq!(scene.active_kind(), Some(ModeKind::City));
    assert_eq!(scene.toggle_category("IfcWall"), None);
    assert_eq!(scene.clear_sections(), 0);
}

#[test]
fn dispose_tears_down_sections_and_subscriptions() {
    let backend = HeadlessBackend::new();
    let source = Rc::new(common::building_source());
    let mut container = ViewportContainer::headless(PhysicalSize::new(800, 600));
    let mut hub = EventHub::new();
    let mut mode = InspectionMode::new(&common::test_config(), source, Rc::new(backend.clone()));
    pollster::block_on(mode.initialize()).expect("initialize");
    mode.attach(&mut container, &mut hub).expect("attach");
    assert_eq!(hub.live_subscriptions(), 3, "camera plus window and viewport section listeners");

    let now = Instant::now();
    let clipper = mode.clipper_mut().expect("clipper");
    clipper.create_plane(Vec3::ZERO, Vec3::Y, now).expect("plane");
    clipper.create_plane(Vec3::ZERO, Vec3::X, now).expect("plane");

    mode.dispose(&mut container);
    mode.dispose(&mut container);

    assert!(!mode.is_initialized());
    assert!(!mode.has_viewport());
    assert!(container.is_empty());
    assert_eq!(backend.log().attached_now, 0);
    assert_eq!(hub.publish(&InputEvent::Action { action: ViewerAction::DeleteSections, pressed: true }), 0);

    let clipper = mode.clipper().expect("clipper");
    assert!(clipper.is_disposed());
    assert_eq!(clipper.plane_count(), 0);
    assert!(clipper.clip_planes().is_empty());
    assert!(clipper.style().is_some_and(|style| !style.is_bound() && style.affected().is_empty()));

    let empty = FragmentIdMap::new();
    let store = FragmentStore::new();
    let clipper = mode.clipper_mut().expect("clipper");
    assert_eq!(clipper.set_model_geometry(&store, Some(&empty), Some(&empty)), Err(SectionError::Disposed));

    assert!(pollster::block_on(mode.initialize()).is_err(), "a disposed mode cannot be reused");
}
