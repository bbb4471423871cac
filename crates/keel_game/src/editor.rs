//! Placeholder editor state. It swaps the clear color and frees the mouse
//! so the mode change is obvious, and draws a single reference cube.

use glam::{Mat4, Vec3};
use keel_core::Action;
use keel_platform::MouseMode;
use keel_render::Renderer;
use keel_runtime::{AppState, SwitchParams, TickCtx};

use crate::LEVEL_STATE;

pub struct EditorState;

impl EditorState {
    pub fn new() -> Self {
        Self
    }
}

impl AppState for EditorState {
    fn on_init(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn on_switch(&mut self, ctx: &mut TickCtx<'_>, _params: SwitchParams) {
        ctx.set_clear_color(Vec3::splat(0.8));
        ctx.set_mouse_mode(MouseMode::Visible);
        log::info!("Entered editor");
    }

    fn update(&mut self, ctx: &mut TickCtx<'_>, _delta: f32) {
        if ctx.input.is_just_pressed(Action::ToggleEditor) {
            ctx.switch_state(LEVEL_STATE, None);
        }
    }

    fn render(&mut self, renderer: &mut Renderer) {
        renderer.set_camera(Vec3::new(4.0, 3.0, 4.0), Vec3::ZERO);
        let grey = renderer.acquire_solid_color(0.5, 0.5, 0.5, 1.0);
        renderer.render_geometry(Mat4::IDENTITY, grey);
        renderer.render_light(Vec3::new(2.0, 2.0, 2.0));
    }
}
