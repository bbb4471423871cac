//! Per-tick sampled input: abstract action states plus mouse motion.
//!
//! Queries compare the current tick's sampled state against the previous
//! tick's, so the sampler retains exactly one prior snapshot:
//!
//! - **is_pressed:** the action is down in this tick's snapshot.
//! - **is_just_pressed / is_just_released:** the action differs between the
//!   previous snapshot and this one.
//!
//! The driver calls `begin_tick()` once per tick after dispatch; it rolls the
//! snapshot and zeroes the per-tick mouse delta. Events delivered between
//! ticks mutate the upcoming snapshot.

use glam::IVec2;

/// Abstract input actions; the driver owns the key/button mapping so this
/// crate stays platform-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Forward,
    Back,
    Left,
    Right,
    Jump,
    Crouch,
    Escape,
    ToggleEditor,
    Primary,
    Secondary,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::Forward,
        Action::Back,
        Action::Left,
        Action::Right,
        Action::Jump,
        Action::Crouch,
        Action::Escape,
        Action::ToggleEditor,
        Action::Primary,
        Action::Secondary,
    ];

    pub const COUNT: usize = Self::ALL.len();

    fn index(self) -> usize {
        self as usize
    }
}

pub struct InputSampler {
    current: [bool; Action::COUNT],
    previous: [bool; Action::COUNT],
    mouse_position: IVec2,
    mouse_relative: IVec2,
}

impl InputSampler {
    pub fn new() -> Self {
        Self {
            current: [false; Action::COUNT],
            previous: [false; Action::COUNT],
            mouse_position: IVec2::ZERO,
            mouse_relative: IVec2::ZERO,
        }
    }

    /// Rolls the current snapshot into the previous one and clears the
    /// per-tick mouse delta. Held actions persist until a release arrives.
    pub fn begin_tick(&mut self) {
        self.previous = self.current;
        self.mouse_relative = IVec2::ZERO;
    }

    pub fn set_action(&mut self, action: Action, down: bool) {
        self.current[action.index()] = down;
    }

    pub fn set_mouse_position(&mut self, position: IVec2) {
        self.mouse_position = position;
    }

    /// Motion arrives uncoalesced, so deltas accumulate within a tick.
    pub fn add_mouse_delta(&mut self, delta: IVec2) {
        self.mouse_relative += delta;
    }

    pub fn is_pressed(&self, action: Action) -> bool {
        self.current[action.index()]
    }

    pub fn is_just_pressed(&self, action: Action) -> bool {
        self.current[action.index()] && !self.previous[action.index()]
    }

    pub fn is_just_released(&self, action: Action) -> bool {
        !self.current[action.index()] && self.previous[action.index()]
    }

    pub fn mouse_position(&self) -> IVec2 {
        self.mouse_position
    }

    pub fn mouse_relative(&self) -> IVec2 {
        self.mouse_relative
    }
}

impl Default for InputSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_sets_pressed_and_just_pressed() {
        let mut input = InputSampler::new();
        input.set_action(Action::Jump, true);
        assert!(input.is_pressed(Action::Jump));
        assert!(input.is_just_pressed(Action::Jump));
        assert!(!input.is_just_released(Action::Jump));
    }

    #[test]
    fn test_held_action_stops_reporting_just_pressed_after_roll() {
        let mut input = InputSampler::new();
        input.set_action(Action::Forward, true);
        input.begin_tick();
        assert!(input.is_pressed(Action::Forward));
        assert!(!input.is_just_pressed(Action::Forward));
    }

    #[test]
    fn test_release_reports_just_released_for_one_tick() {
        let mut input = InputSampler::new();
        input.set_action(Action::Primary, true);
        input.begin_tick();
        input.set_action(Action::Primary, false);
        assert!(input.is_just_released(Action::Primary));
        assert!(!input.is_pressed(Action::Primary));
        input.begin_tick();
        assert!(!input.is_just_released(Action::Primary));
    }

    #[test]
    fn test_repeat_down_events_do_not_retrigger_just_pressed() {
        let mut input = InputSampler::new();
        input.set_action(Action::Jump, true);
        input.begin_tick();
        // OS key auto-repeat re-delivers the down event while held.
        input.set_action(Action::Jump, true);
        assert!(input.is_pressed(Action::Jump));
        assert!(!input.is_just_pressed(Action::Jump));
    }

    #[test]
    fn test_actions_are_independent() {
        let mut input = InputSampler::new();
        input.set_action(Action::Left, true);
        input.set_action(Action::Right, true);
        input.begin_tick();
        input.set_action(Action::Left, false);
        assert!(input.is_just_released(Action::Left));
        assert!(input.is_pressed(Action::Right));
        assert!(!input.is_just_released(Action::Right));
    }

    #[test]
    fn test_mouse_delta_accumulates_within_tick() {
        let mut input = InputSampler::new();
        input.add_mouse_delta(IVec2::new(3, -2));
        input.add_mouse_delta(IVec2::new(1, 5));
        assert_eq!(input.mouse_relative(), IVec2::new(4, 3));
    }

    #[test]
    fn test_mouse_delta_resets_each_tick() {
        let mut input = InputSampler::new();
        input.add_mouse_delta(IVec2::new(7, 7));
        input.begin_tick();
        assert_eq!(input.mouse_relative(), IVec2::ZERO);
    }

    #[test]
    fn test_mouse_position_persists_across_ticks() {
        let mut input = InputSampler::new();
        input.set_mouse_position(IVec2::new(320, 240));
        input.begin_tick();
        assert_eq!(input.mouse_position(), IVec2::new(320, 240));
    }

    #[test]
    fn test_default_state_is_empty() {
        let input = InputSampler::new();
        for action in Action::ALL {
            assert!(!input.is_pressed(action));
            assert!(!input.is_just_pressed(action));
            assert!(!input.is_just_released(action));
        }
        assert_eq!(input.mouse_position(), IVec2::ZERO);
        assert_eq!(input.mouse_relative(), IVec2::ZERO);
    }
}
