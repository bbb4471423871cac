//! Fixed-rate frame driver over the winit event loop.
//!
//! winit owns the thread, so the classic `while running` loop becomes a
//! `RedrawRequested` handler: every redraw runs exactly one tick (throttle,
//! update, render, present) and `about_to_wait` immediately schedules the
//! next one. Input events land in the sampler between ticks.

use std::path::PathBuf;
use std::sync::Arc;

use glam::IVec2;
use keel_core::{Action, FrameClock, InputSampler};
use keel_platform::{apply_mouse_mode, create_window, MouseMode, PlatformConfig};
use keel_render::{Renderer, RendererConfig};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::ctx::{RuntimeCommand, TickCtx};
use crate::state::{AppState, StateId, StateMachine};

pub struct RuntimeConfig {
    pub title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub resource_path: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "Keel Engine".to_string(),
            window_width: 1280,
            window_height: 720,
            screen_width: 800,
            screen_height: 600,
            resource_path: PathBuf::from("assets"),
        }
    }
}

pub struct Runtime {
    config: RuntimeConfig,
    machine: StateMachine,
    clock: FrameClock,
    input: InputSampler,
    mouse_mode: MouseMode,
    commands: Vec<RuntimeCommand>,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    initial_state: Option<StateId>,
    started: bool,
    quit_requested: bool,
    init_error: Option<String>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            machine: StateMachine::new(),
            clock: FrameClock::new(),
            input: InputSampler::new(),
            mouse_mode: MouseMode::Visible,
            commands: Vec::new(),
            window: None,
            renderer: None,
            initial_state: None,
            started: false,
            quit_requested: false,
            init_error: None,
        }
    }

    pub fn register_state(&mut self, id: StateId, state: Box<dyn AppState>) {
        if let Err(e) = self.machine.register(id, state) {
            log::error!("{}", e);
        }
    }

    /// Runs the event loop until quit. Returns an error if the initial state
    /// is unknown or any subsystem fails to come up.
    pub fn run(mut self, initial: StateId) -> Result<(), String> {
        if !self.machine.is_registered(initial) {
            return Err(format!("Initial state {:?} is not registered", initial));
        }
        self.initial_state = Some(initial);

        let event_loop =
            EventLoop::new().map_err(|e| format!("Failed to create event loop: {}", e))?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop
            .run_app(&mut self)
            .map_err(|e| format!("Event loop error: {}", e))?;

        match self.init_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), String> {
        let platform_config = PlatformConfig {
            title: self.config.title.clone(),
            width: self.config.window_width,
            height: self.config.window_height,
        };
        let window = create_window(event_loop, &platform_config)?;

        let renderer_config = RendererConfig {
            screen_width: self.config.screen_width,
            screen_height: self.config.screen_height,
            resource_path: self.config.resource_path.clone(),
        };
        let renderer = Renderer::new(Arc::clone(&window), &renderer_config)?;

        apply_mouse_mode(&window, self.mouse_mode);
        self.window = Some(window);
        self.renderer = Some(renderer);

        let Some(initial) = self.initial_state else {
            return Err("No initial state configured".to_string());
        };
        {
            let mut ctx = TickCtx::new(
                &self.input,
                self.clock.fps(),
                self.mouse_mode,
                &mut self.commands,
            );
            self.machine.set_active(initial, None, &mut ctx);
        }
        self.apply_commands();

        // Restart the clock so the first delta measures from the end of
        // startup rather than spanning window and GPU bring-up.
        self.clock = FrameClock::new();
        log::info!("{} initialized", self.config.title);
        Ok(())
    }

    fn tick(&mut self, event_loop: &ActiveEventLoop) {
        let delta = self.clock.wait_for_tick();

        if self.quit_requested {
            event_loop.exit();
            return;
        }

        {
            let mut ctx = TickCtx::new(
                &self.input,
                self.clock.fps(),
                self.mouse_mode,
                &mut self.commands,
            );
            self.machine.dispatch_update(&mut ctx, delta);
        }
        self.apply_commands();

        if let Some(renderer) = self.renderer.as_mut() {
            renderer.prepare_frame();
            self.machine.dispatch_render(renderer);
            renderer.present_frame();
        }

        self.input.begin_tick();
    }

    fn apply_commands(&mut self) {
        // A switch handler may queue further commands; keep draining until
        // the queue stays empty.
        while !self.commands.is_empty() {
            let batch: Vec<RuntimeCommand> = self.commands.drain(..).collect();
            for command in batch {
                match command {
                    RuntimeCommand::SwitchState(id, params) => {
                        let mut ctx = TickCtx::new(
                            &self.input,
                            self.clock.fps(),
                            self.mouse_mode,
                            &mut self.commands,
                        );
                        self.machine.set_active(id, params, &mut ctx);
                    }
                    RuntimeCommand::SetMouseMode(mode) => {
                        if mode != self.mouse_mode {
                            self.mouse_mode = mode;
                            if let Some(window) = &self.window {
                                apply_mouse_mode(window, mode);
                            }
                        }
                    }
                    RuntimeCommand::SetClearColor(color) => {
                        if let Some(renderer) = self.renderer.as_mut() {
                            renderer.set_clear_color(color);
                        }
                    }
                    RuntimeCommand::Quit => {
                        self.quit_requested = true;
                    }
                }
            }
        }
    }
}

impl ApplicationHandler for Runtime {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        self.started = true;
        if let Err(e) = self.start(event_loop) {
            log::error!("Startup failed: {}", e);
            self.init_error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting.");
                self.quit_requested = true;
            }

            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.resize(size.width, size.height);
                    }
                    log::info!("Window resized to {}x{}", size.width, size.height);
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key_code) = event.physical_key {
                    if let Some(action) = map_key(key_code) {
                        self.input.set_action(action, event.state.is_pressed());
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .set_mouse_position(IVec2::new(position.x as i32, position.y as i32));
            }

            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(action) = map_mouse_button(button) {
                    self.input.set_action(action, state.is_pressed());
                }
            }

            WindowEvent::RedrawRequested => {
                if self.renderer.is_some() {
                    self.tick(event_loop);
                }
            }

            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        // Raw motion keeps arriving while the cursor is locked, which is
        // what the captured camera relies on.
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input
                .add_mouse_delta(IVec2::new(delta.0 as i32, delta.1 as i32));
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if self.renderer.take().is_some() {
            log::info!("Renderer released");
        }
        if self.window.take().is_some() {
            log::info!("Window destroyed");
        }
        log::info!("Application quit gracefully.");
    }
}

fn map_key(key_code: KeyCode) -> Option<Action> {
    match key_code {
        KeyCode::KeyW => Some(Action::Forward),
        KeyCode::KeyS => Some(Action::Back),
        KeyCode::KeyA => Some(Action::Left),
        KeyCode::KeyD => Some(Action::Right),
        KeyCode::Space => Some(Action::Jump),
        KeyCode::ControlLeft => Some(Action::Crouch),
        KeyCode::Escape => Some(Action::Escape),
        KeyCode::Backquote => Some(Action::ToggleEditor),
        _ => None,
    }
}

fn map_mouse_button(button: MouseButton) -> Option<Action> {
    match button {
        MouseButton::Left => Some(Action::Primary),
        MouseButton::Right => Some(Action::Secondary),
        _ => None,
    }
}
