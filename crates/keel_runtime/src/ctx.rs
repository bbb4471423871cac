//! Per-tick context handed to application states.
//!
//! A state runs while borrowed out of the machine, so anything that would
//! mutate the machine or the platform mid-dispatch is queued as a command
//! and applied by the driver after the state returns.

use glam::Vec3;
use keel_core::InputSampler;
use keel_platform::MouseMode;

use crate::state::{StateId, SwitchParams};

pub enum RuntimeCommand {
    SwitchState(StateId, SwitchParams),
    SetMouseMode(MouseMode),
    SetClearColor(Vec3),
    Quit,
}

pub struct TickCtx<'a> {
    pub input: &'a InputSampler,
    pub fps: u32,
    pub mouse_mode: MouseMode,
    commands: &'a mut Vec<RuntimeCommand>,
}

impl<'a> TickCtx<'a> {
    pub fn new(
        input: &'a InputSampler,
        fps: u32,
        mouse_mode: MouseMode,
        commands: &'a mut Vec<RuntimeCommand>,
    ) -> Self {
        Self {
            input,
            fps,
            mouse_mode,
            commands,
        }
    }

    /// Requests activation of another state at the end of this tick phase.
    pub fn switch_state(&mut self, id: StateId, params: SwitchParams) {
        self.commands.push(RuntimeCommand::SwitchState(id, params));
    }

    pub fn set_mouse_mode(&mut self, mode: MouseMode) {
        self.commands.push(RuntimeCommand::SetMouseMode(mode));
    }

    pub fn set_clear_color(&mut self, color: Vec3) {
        self.commands.push(RuntimeCommand::SetClearColor(color));
    }

    pub fn quit(&mut self) {
        self.commands.push(RuntimeCommand::Quit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_queue_in_call_order() {
        let input = InputSampler::new();
        let mut commands = Vec::new();
        let mut ctx = TickCtx::new(&input, 60, MouseMode::Visible, &mut commands);
        ctx.set_clear_color(Vec3::splat(0.5));
        ctx.switch_state(StateId(2), None);
        ctx.quit();

        assert_eq!(commands.len(), 3);
        assert!(matches!(commands[0], RuntimeCommand::SetClearColor(_)));
        assert!(matches!(
            commands[1],
            RuntimeCommand::SwitchState(StateId(2), None)
        ));
        assert!(matches!(commands[2], RuntimeCommand::Quit));
    }

    #[test]
    fn test_ctx_exposes_tick_snapshot() {
        let input = InputSampler::new();
        let mut commands = Vec::new();
        let ctx = TickCtx::new(&input, 144, MouseMode::RelativeCaptured, &mut commands);
        assert_eq!(ctx.fps, 144);
        assert_eq!(ctx.mouse_mode, MouseMode::RelativeCaptured);
    }
}
