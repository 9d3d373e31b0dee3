//! The viewer session: everything a running viewer owns, driven by the
//! event loop through clicks, drags, resizes, frames and load events.

use crate::assets::{prepare_model, AssetError, EnvironmentMap, LoadEvent, ModelAsset};
use crate::config::ViewerConfig;
use crate::interaction::{
    apply_isolation, pointer_to_ndc, reset_isolation, PartsRegistry, Selection,
};
use crate::render::camera::{OrbitController, PerspectiveCamera};
use crate::scene::{NodeId, SceneGraph, Transform};
use crate::ui::UiState;
use glam::{Quat, Vec2, Vec3};

pub struct ViewerSession {
    config: ViewerConfig,
    graph: SceneGraph,
    camera: PerspectiveCamera,
    controller: OrbitController,
    registry: PartsRegistry,
    selection: Selection,
    viewport: (u32, u32),
    ui: UiState,
    pending_environment: Option<EnvironmentMap>,
}

impl ViewerSession {
    pub fn new(config: ViewerConfig, width: u32, height: u32) -> Self {
        let viewport = (width.max(1), height.max(1));
        let mut camera =
            PerspectiveCamera::new(&config.camera, viewport.0 as f32 / viewport.1 as f32);
        let mut controller = OrbitController::new(&config.orbit);
        controller.update(&mut camera, 0.0);

        let mut ui = UiState::new();
        ui.show_description(None);

        Self {
            config,
            graph: SceneGraph::new(),
            camera,
            controller,
            registry: PartsRegistry::new(),
            selection: Selection::Idle,
            viewport,
            ui,
            pending_environment: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    #[cfg(test)]
    pub fn registry(&self) -> &PartsRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub fn selection(&self) -> Selection {
        self.selection
    }

    #[cfg(test)]
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    /// Hands a newly loaded environment to the renderer, once.
    pub fn take_pending_environment(&mut self) -> Option<EnvironmentMap> {
        self.pending_environment.take()
    }

    /// Advances the orbit controller. Returns whether the camera moved.
    pub fn update(&mut self, frame_dt: f32) -> bool {
        self.controller.update(&mut self.camera, frame_dt)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
        self.camera.set_viewport(self.viewport.0, self.viewport.1);
        log::debug!("Viewport resized to {}x{}", self.viewport.0, self.viewport.1);
    }

    pub fn orbit_drag(&mut self, delta: Vec2) {
        self.controller.rotate_by_pixels(delta, self.viewport.1);
    }

    /// Pans the orbit target; ignored unless panning is enabled.
    pub fn orbit_pan(&mut self, delta: Vec2) {
        self.controller
            .pan_by_pixels(delta, &self.camera, self.viewport.1);
    }

    pub fn orbit_wheel(&mut self, steps: f32) {
        self.controller.dolly(steps);
    }

    /// Resolves a click at physical pixel `(px, py)` into a selection,
    /// updating part visuals and the description panel.
    pub fn handle_click(&mut self, px: f32, py: f32) -> Selection {
        let ndc = pointer_to_ndc(px, py, self.viewport.0, self.viewport.1);
        let ray = self.camera.ray(ndc);
        match self.registry.pick(&self.graph, &ray) {
            Some(hit) => {
                let name = self.graph.node(hit).name.clone();
                log::info!("Clicked: {}", name);
                self.ui.show_description(Some(&name));
                apply_isolation(&mut self.graph, &self.registry, hit, &self.config.isolation);
                self.selection = Selection::Isolated(hit);
            }
            None => {
                reset_isolation(&mut self.graph, &self.registry);
                self.ui.show_description(None);
                self.selection = Selection::Idle;
            }
        }
        self.selection
    }

    pub fn handle_load_event(&mut self, event: LoadEvent) {
        match event {
            LoadEvent::EnvironmentLoaded(environment) => self.apply_environment(environment),
            LoadEvent::EnvironmentFailed(err) => {
                log::error!("Environment load failed: {}", err);
            }
            LoadEvent::ModelProgress(fraction) => self.ui.set_progress(fraction),
            LoadEvent::ModelLoaded(model) => self.apply_model(model),
            LoadEvent::ModelFailed(err) => self.model_failed(&err),
        }
    }

    pub fn apply_environment(&mut self, environment: EnvironmentMap) {
        log::info!("Environment {} installed", environment.name);
        self.pending_environment = Some(environment);
    }

    /// Places the model, prepares its parts and adds it to the scene.
    pub fn apply_model(&mut self, model: ModelAsset) {
        let ModelAsset { name, graph, root } = model;
        let offset = self.graph.len();
        self.graph.graft(graph);
        let root = NodeId(root.0 + offset);

        let placement = &self.config.model;
        self.graph.node_mut(root).transform = Transform {
            translation: Vec3::from(placement.position),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(placement.scale),
        };

        let parts = prepare_model(&mut self.graph, root);
        for &part in parts.parts() {
            self.registry.register(part);
        }
        self.ui.finish_loading();
        log::info!("Model {} ready with {} selectable parts", name, parts.len());
    }

    fn model_failed(&mut self, err: &AssetError) {
        // Single attempt; the loading indicator stays up.
        log::error!("Model load failed: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::MERGED_PARENT;
    use crate::scene::material::{color_from_hex, BLACK};
    use crate::scene::test_support::quad_at;
    use crate::scene::Node;

    struct Fixture {
        session: ViewerSession,
        pcb: NodeId,
        chip: NodeId,
        battery: NodeId,
    }

    /// A model with a PCB, a chip mounted in front of it and a battery off
    /// to the side, each a 40x40 quad in model units (2x2 after placement).
    fn loaded_session() -> Fixture {
        let mut session = ViewerSession::new(ViewerConfig::default(), 800, 600);
        let mut graph = SceneGraph::new();
        let root = graph.add_root(Node::new("Scene"));
        let pcb = graph.add_child(root, quad_at(MERGED_PARENT, Vec3::ZERO, 20.0));
        let chip = graph.add_child(pcb, quad_at("chip", Vec3::new(0.0, 0.0, 1.0), 5.0));
        let battery = graph.add_child(root, quad_at("battery", Vec3::new(60.0, 0.0, 0.0), 20.0));
        let offset = session.graph().len();
        session.handle_load_event(LoadEvent::ModelLoaded(ModelAsset {
            name: "test.glb".to_string(),
            graph,
            root,
        }));
        let remap = |id: NodeId| NodeId(id.0 + offset);
        Fixture {
            pcb: remap(pcb),
            chip: remap(chip),
            battery: remap(battery),
            session,
        }
    }

    fn pixel_of(session: &ViewerSession, world: Vec3) -> (f32, f32) {
        let ndc = session.camera().view_projection().project_point3(world);
        let (width, height) = session.viewport();
        (
            (ndc.x + 1.0) * 0.5 * width as f32,
            (1.0 - ndc.y) * 0.5 * height as f32,
        )
    }

    fn world_center(session: &ViewerSession, id: NodeId) -> Vec3 {
        session.graph().world_matrix(id).transform_point3(Vec3::ZERO)
    }

    fn material(session: &ViewerSession, id: NodeId) -> crate::scene::StandardMaterial {
        session
            .graph()
            .node(id)
            .standard_material()
            .cloned()
            .unwrap()
    }

    #[test]
    fn startup_shows_default_description_and_loading() {
        let session = ViewerSession::new(ViewerConfig::default(), 800, 600);
        assert!(session.ui().is_loading());
        assert!(session.ui().is_description_visible());
        assert_eq!(session.ui().description().title, "Drone Model");
        assert_eq!(session.selection(), Selection::Idle);
        assert_eq!(session.camera().target, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn model_load_places_model_and_registers_parts() {
        let fixture = loaded_session();
        let session = &fixture.session;
        assert!(!session.ui().is_loading());
        assert_eq!(
            session.registry().parts(),
            &[fixture.pcb, fixture.chip, fixture.battery]
        );
        assert_eq!(session.graph().node(fixture.chip).name, MERGED_PARENT);
        let pcb_center = world_center(session, fixture.pcb);
        assert!((pcb_center - Vec3::new(0.0, 1.05, -1.0)).length() < 1e-5);
        let battery_center = world_center(session, fixture.battery);
        assert!((battery_center - Vec3::new(3.0, 1.05, -1.0)).length() < 1e-5);
    }

    #[test]
    fn click_on_pcb_isolates_it() {
        let mut fixture = loaded_session();
        let (px, py) = pixel_of(&fixture.session, world_center(&fixture.session, fixture.pcb));
        let selection = fixture.session.handle_click(px, py);

        // The chip sits in front of the board and inherits its name.
        assert_eq!(selection, Selection::Isolated(fixture.chip));
        let session = &fixture.session;
        assert_eq!(session.ui().description().title, "Custom Flight Controller PCB");

        let selected = material(session, fixture.chip);
        assert_eq!(selected.opacity, 1.0);
        assert!(!selected.transparent);
        assert_eq!(selected.emissive, color_from_hex(0x444444));
        for other in [fixture.pcb, fixture.battery] {
            let dimmed = material(session, other);
            assert_eq!(dimmed.opacity, 0.1);
            assert!(dimmed.transparent);
            assert_eq!(dimmed.emissive, BLACK);
        }
    }

    #[test]
    fn click_on_battery_shows_its_description() {
        let mut fixture = loaded_session();
        let (px, py) = pixel_of(
            &fixture.session,
            world_center(&fixture.session, fixture.battery),
        );
        assert_eq!(
            fixture.session.handle_click(px, py),
            Selection::Isolated(fixture.battery)
        );
        assert_eq!(
            fixture.session.ui().description().title,
            "Tattu 5200mAh 14.8V 35C 4S1P LiPo Battery"
        );
    }

    #[test]
    fn click_on_empty_space_resets_everything() {
        let mut fixture = loaded_session();
        let (px, py) = pixel_of(&fixture.session, world_center(&fixture.session, fixture.pcb));
        fixture.session.handle_click(px, py);

        assert_eq!(fixture.session.handle_click(0.0, 0.0), Selection::Idle);
        let session = &fixture.session;
        assert_eq!(session.ui().description().title, "Drone Model");
        for id in session.registry().parts() {
            let restored = material(session, *id);
            assert_eq!(restored.opacity, 1.0);
            assert!(!restored.transparent);
            assert_eq!(restored.emissive, BLACK);
        }
    }

    #[test]
    fn click_before_model_load_is_a_miss() {
        let mut session = ViewerSession::new(ViewerConfig::default(), 800, 600);
        assert_eq!(session.handle_click(400.0, 300.0), Selection::Idle);
        assert_eq!(session.ui().description().title, "Drone Model");
    }

    #[test]
    fn resize_updates_aspect_without_touching_parts() {
        let mut fixture = loaded_session();
        let (px, py) = pixel_of(
            &fixture.session,
            world_center(&fixture.session, fixture.battery),
        );
        fixture.session.handle_click(px, py);
        let before: Vec<_> = fixture
            .session
            .registry()
            .parts()
            .iter()
            .map(|id| material(&fixture.session, *id))
            .collect();

        fixture.session.resize(1920, 1080);
        fixture.session.resize(1920, 1080);
        let session = &fixture.session;
        assert_eq!(session.viewport(), (1920, 1080));
        assert!((session.camera().aspect - 1920.0 / 1080.0).abs() < 1e-6);
        let after: Vec<_> = session
            .registry()
            .parts()
            .iter()
            .map(|id| material(session, *id))
            .collect();
        assert_eq!(before, after);
        assert_eq!(session.selection(), Selection::Isolated(fixture.battery));
    }

    #[test]
    fn failed_model_keeps_loading_indicator() {
        let mut session = ViewerSession::new(ViewerConfig::default(), 800, 600);
        session.handle_load_event(LoadEvent::ModelProgress(0.4));
        session.handle_load_event(LoadEvent::ModelFailed(AssetError::NoScene {
            path: "missing.glb".to_string(),
        }));
        assert!(session.ui().is_loading());
        assert_eq!(session.ui().progress(), 0.4);
        assert!(session.registry().is_empty());
    }

    #[test]
    fn environment_is_handed_over_once() {
        let mut session = ViewerSession::new(ViewerConfig::default(), 800, 600);
        let pixel = crate::assets::HdrImage {
            width: 1,
            height: 1,
            rgba: vec![1.0; 4],
        };
        session.handle_load_event(LoadEvent::EnvironmentLoaded(EnvironmentMap {
            name: "sky.exr".to_string(),
            radiance: pixel.clone(),
            irradiance: pixel,
        }));
        let handed = session.take_pending_environment().unwrap();
        assert_eq!(handed.name, "sky.exr");
        assert!(session.take_pending_environment().is_none());
    }

    #[test]
    fn pan_follows_the_orbit_config() {
        let mut session = ViewerSession::new(ViewerConfig::default(), 800, 600);
        let start = session.camera().target;
        session.orbit_pan(Vec2::new(120.0, 0.0));
        for _ in 0..100 {
            session.update(1.0 / 60.0);
        }
        assert_eq!(session.camera().target, start);

        let mut config = ViewerConfig::default();
        config.orbit.enable_pan = true;
        let mut session = ViewerSession::new(config, 800, 600);
        session.orbit_pan(Vec2::new(120.0, 0.0));
        assert!(session.update(1.0 / 60.0));
        assert!(session.camera().target.distance(start) > 1e-3);
    }

    #[test]
    fn drag_rotates_camera_over_frames() {
        let mut session = ViewerSession::new(ViewerConfig::default(), 800, 600);
        let start = session.camera().position;
        session.orbit_drag(Vec2::new(200.0, 0.0));
        assert!(session.update(1.0 / 60.0));
        assert!(session.camera().position.distance(start) > 1e-3);
    }
}
