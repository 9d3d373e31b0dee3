mod egui_host;
mod input;
mod timing;

pub use egui_host::EguiFrameOutput;

use crate::assets::{self, LoadEvent};
use crate::config::ViewerConfig;
use crate::render::{RenderContext, RenderError};
use crate::session::ViewerSession;
use egui_host::EguiHost;
use glam::Vec2;
use input::{DragButton, PointerState, PIXELS_PER_NOTCH};
use timing::FrameTiming;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

/// Everything that needs a live window.
struct Viewport {
    window: Arc<Window>,
    render: RenderContext,
    egui: EguiHost,
}

pub struct App {
    session: ViewerSession,
    viewport: Option<Viewport>,
    pointer: PointerState,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    failed: bool,
}

impl App {
    fn new(config: ViewerConfig) -> Self {
        let title = config.window.title.clone();
        let (width, height) = (config.window.width, config.window.height);
        Self {
            session: ViewerSession::new(config, width, height),
            viewport: None,
            pointer: PointerState::default(),
            timing: FrameTiming::new(title),
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
            failed: false,
        }
    }

    fn create_viewport(&self, event_loop: &ActiveEventLoop) -> Result<Viewport, RenderError> {
        let window_config = &self.session.config().window;
        let attributes = WindowAttributes::default()
            .with_title(window_config.title.clone())
            .with_inner_size(PhysicalSize::new(window_config.width, window_config.height))
            .with_resizable(true);
        let window = Arc::new(event_loop.create_window(attributes)?);
        let render = RenderContext::new(Arc::clone(&window), self.session.config())?;
        let egui = EguiHost::new(&window);
        Ok(Viewport {
            window,
            render,
            egui,
        })
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        self.session.resize(size.width, size.height);
        if let Some(viewport) = &mut self.viewport {
            viewport.render.resize(size.width, size.height);
        }
    }

    fn update_target_frame_duration(&mut self) {
        let mut target = Duration::from_millis(16);
        let monitor = self
            .viewport
            .as_ref()
            .and_then(|viewport| viewport.window.current_monitor());
        if let Some(millihz) = monitor.and_then(|monitor| monitor.refresh_rate_millihertz()) {
            let hz = millihz as f32 / 1000.0;
            if hz > 1.0 {
                target = Duration::from_secs_f32(1.0 / hz);
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn handle_click(&mut self, position: Vec2) {
        let selection = self.session.handle_click(position.x, position.y);
        match selection.selected() {
            Some(id) => log::debug!("Isolated {}", self.session.graph().node(id).name),
            None => log::debug!("Selection cleared"),
        }
    }

    fn handle_wheel(&mut self, delta: MouseScrollDelta) {
        let steps = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_NOTCH,
        };
        self.session.orbit_wheel(steps);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let frame_start = Instant::now();
        self.timing.update(
            self.viewport.as_ref().map(|viewport| viewport.window.as_ref()),
            frame_start,
        );
        self.session.update(self.timing.frame_dt);

        let Some(viewport) = self.viewport.as_mut() else {
            return;
        };
        let overlay = viewport.egui.run(&viewport.window, self.session.ui());
        if let Err(err) = viewport.render.render(&mut self.session, &overlay) {
            log::error!("Rendering failed: {}", err);
            self.failed = true;
            event_loop.exit();
            return;
        }
        self.timing
            .set_render_ms(frame_start.elapsed().as_secs_f32() * 1000.0);
    }
}

impl ApplicationHandler<LoadEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewport.is_some() {
            return;
        }
        match self.create_viewport(event_loop) {
            Ok(viewport) => {
                let size = viewport.window.inner_size();
                log::info!("Window created: {}x{}", size.width, size.height);
                viewport.window.request_redraw();
                self.viewport = Some(viewport);
                self.handle_resize(size);
                self.update_target_frame_duration();
            }
            Err(err) => {
                log::error!("Viewer startup failed: {}", err);
                self.failed = true;
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: LoadEvent) {
        self.session.handle_load_event(event);
        if let Some(viewport) = &self.viewport {
            viewport.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(viewport) = self.viewport.as_mut() else {
            return;
        };
        let consumed = viewport.egui.on_window_event(&viewport.window, &event);
        let overlay_has_pointer = viewport.egui.wants_pointer_input();
        let window = Arc::clone(&viewport.window);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("Escape pressed, shutting down...");
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(size) => {
                self.handle_resize(size);
                self.update_target_frame_duration();
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                self.handle_resize(window.inner_size());
            }
            WindowEvent::Moved(_) => {
                self.update_target_frame_duration();
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                if let Some(drag) = self.pointer.moved(position) {
                    match drag.button {
                        DragButton::Primary => self.session.orbit_drag(drag.delta),
                        DragButton::Secondary => self.session.orbit_pan(drag.delta),
                    }
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer.left_window();
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let Some(button) = DragButton::from_mouse(button) else {
                    return;
                };
                match state {
                    ElementState::Pressed => {
                        self.pointer
                            .pressed_unless(button, consumed || overlay_has_pointer);
                    }
                    ElementState::Released => {
                        if let Some(click) = self.pointer.released(button) {
                            self.handle_click(click);
                        }
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } if !consumed => {
                self.handle_wheel(delta);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(viewport) = &self.viewport {
                viewport.window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

pub fn run() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("Drone Viewer starting");
    log::info!("   Drag to orbit, scroll to zoom, click a part to isolate it");
    log::info!("   Press ESC or close window to exit");

    let config = ViewerConfig::from_args_or_env();

    let event_loop = match EventLoop::<LoadEvent>::with_user_event().build() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("Failed to create event loop: {}", err);
            return ExitCode::FAILURE;
        }
    };
    event_loop.set_control_flow(ControlFlow::Wait);

    let environment_path = config.assets.environment_path();
    if let Err(err) = assets::spawn_environment_load(environment_path, event_loop.create_proxy()) {
        log::error!("Failed to start environment loader: {}", err);
    }
    if let Err(err) = assets::spawn_model_load(config.assets.model_path(), event_loop.create_proxy()) {
        log::error!("Failed to start model loader: {}", err);
    }

    let mut app = App::new(config);
    if let Err(err) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", err);
        return ExitCode::FAILURE;
    }
    if app.failed {
        return ExitCode::FAILURE;
    }

    log::info!("Goodbye!");
    ExitCode::SUCCESS
}
