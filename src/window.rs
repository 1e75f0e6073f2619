use std::{sync::Arc, time::Instant};

use anyhow::Context;
use glam::Vec2;
use imgui::{FontConfig, FontSource};
use imgui_winit_support::WinitPlatform;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::{
    config::ViewerConfig,
    engine,
    gui::DebugGui,
    rendering::renderer::Renderer,
    viewer::ViewerState,
    viewport::Viewport,
};

struct ImguiState {
    context: imgui::Context,
    platform: WinitPlatform,
}

#[derive(Default)]
struct PointerState {
    /// Last cursor position in logical pixels.
    position: Option<Vec2>,
    rotating: bool,
    panning: bool,
}

struct App {
    state: ViewerState,
    renderer: Option<Renderer>,
    imgui: Option<ImguiState>,
    gui: DebugGui,
    pointer: PointerState,
    last_frame: Instant,
    fatal_error: Option<anyhow::Error>,
}

impl App {
    fn new(state: ViewerState) -> Self {
        let gui = DebugGui::new(state.config.show_gui);

        Self {
            state,
            renderer: None,
            imgui: None,
            gui,
            pointer: PointerState::default(),
            last_frame: Instant::now(),
            fatal_error: None,
        }
    }

    fn setup_imgui(window: &Window) -> ImguiState {
        let mut context = imgui::Context::create();
        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(
            context.io_mut(),
            window,
            imgui_winit_support::HiDpiMode::Default,
        );

        let font_size = 14.0;
        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        // Disable INI support because it's broken in the published version of imgui
        context.set_ini_filename(None);

        ImguiState { context, platform }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title(self.state.config.window_title.clone())
            .with_inner_size(LogicalSize::new(1280.0, 720.0));
        let window = event_loop
            .create_window(window_attributes)
            .context("Failed to create window")?;
        let window = Arc::new(window);

        let mut imgui = Self::setup_imgui(&window);
        let mut renderer = pollster::block_on(Renderer::new(
            window.clone(),
            &self.state,
            &mut imgui.context,
        ))?;

        engine::FrameTarget::upload_models(&mut renderer, &mut self.state.scene)?;
        self.state.resize(&renderer.viewport);

        window.request_redraw();
        self.renderer = Some(renderer);
        self.imgui = Some(imgui);

        Ok(())
    }

    fn handle_resize(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        let viewport = Viewport::from_window(
            renderer.window.inner_size(),
            renderer.window.scale_factor(),
            self.state.config.max_pixel_ratio,
        );

        renderer.resize(viewport);
        self.state.resize(&viewport);
    }

    fn wants_mouse(&self) -> bool {
        self.gui.visible
            && self
                .imgui
                .as_ref()
                .is_some_and(|imgui| imgui.context.io().want_capture_mouse)
    }

    fn handle_cursor_moved(&mut self, position: Vec2) {
        let previous = self.pointer.position.replace(position);
        let (Some(previous), Some(renderer)) = (previous, self.renderer.as_ref()) else {
            return;
        };

        let delta = position - previous;
        let height = renderer.viewport.height as f32;

        if self.pointer.rotating {
            self.state.controls.rotate_by_pixels(delta.x, delta.y, height);
        } else if self.pointer.panning {
            self.state
                .controls
                .pan_by_pixels(delta.x, delta.y, height, &self.state.camera);
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(imgui)) = (self.renderer.as_mut(), self.imgui.as_mut()) else {
            return;
        };

        let now = Instant::now();
        imgui.context.io_mut().update_delta_time(now - self.last_frame);
        self.last_frame = now;

        if let Err(error) = imgui
            .platform
            .prepare_frame(imgui.context.io_mut(), &renderer.window)
        {
            log::warn!("Failed to prepare Imgui frame: {}", error);
        }

        let ui = imgui.context.new_frame();
        self.gui.draw(ui, &mut self.state, renderer.model_count());
        imgui.platform.prepare_render(ui, &renderer.window);
        let draw_data = imgui.context.render();

        match engine::tick(&mut self.state, renderer, Some(draw_data)) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.configure_surface();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of memory");
                event_loop.exit();
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timeout");
            }
            Err(other) => {
                log::error!("Unexpected error: {:?}", other);
            }
        }

        renderer.window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }

        if let Err(error) = self.init(event_loop) {
            self.fatal_error = Some(error);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(imgui), Some(renderer)) = (self.imgui.as_mut(), self.renderer.as_ref()) {
            imgui.platform.handle_event::<()>(
                imgui.context.io_mut(),
                &renderer.window,
                &Event::WindowEvent {
                    window_id,
                    event: event.clone(),
                },
            );
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                self.handle_resize();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && !event.repeat
                    && event.physical_key == PhysicalKey::Code(KeyCode::F1)
                {
                    self.gui.toggle();
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state == ElementState::Pressed;
                if pressed && self.wants_mouse() {
                    return;
                }

                match button {
                    MouseButton::Left => self.pointer.rotating = pressed,
                    MouseButton::Right | MouseButton::Middle => self.pointer.panning = pressed,
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let Some(renderer) = self.renderer.as_ref() else {
                    return;
                };
                let logical = position.to_logical::<f32>(renderer.window.scale_factor());
                self.handle_cursor_moved(Vec2::new(logical.x, logical.y));
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer = PointerState::default();
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if self.wants_mouse() {
                    return;
                }

                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y,
                    MouseScrollDelta::PixelDelta(position) => -position.y as f32,
                };
                self.state.controls.dolly_by_wheel(delta_y);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => (),
        }
    }
}

pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let state = ViewerState::new(config).context("Failed to create viewer state")?;
    let mut app = App::new(state);
    event_loop.run_app(&mut app)?;

    match app.fatal_error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
