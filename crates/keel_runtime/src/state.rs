//! Application states and the machine that dispatches them.
//!
//! States register once under an integer id and stay resident for the life
//! of the program; switching between them never tears the previous one down,
//! it only redirects dispatch. Activation always reruns `on_switch`, even
//! when re-entering a state that was active before.

use std::any::Any;
use std::collections::HashMap;

use keel_render::Renderer;

use crate::ctx::TickCtx;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StateId(pub u32);

/// Opaque payload forwarded to `on_switch`. The receiving state downcasts it
/// to whatever it expects.
pub type SwitchParams = Option<Box<dyn Any>>;

pub trait AppState {
    /// Runs once at registration. Failure keeps the state out of the machine.
    fn on_init(&mut self) -> Result<(), String>;
    /// Runs every time the state becomes active, including re-entry.
    fn on_switch(&mut self, ctx: &mut TickCtx<'_>, params: SwitchParams);
    fn update(&mut self, ctx: &mut TickCtx<'_>, delta: f32);
    fn render(&mut self, renderer: &mut Renderer);
}

pub struct StateMachine {
    states: HashMap<StateId, Box<dyn AppState>>,
    active: Option<StateId>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            active: None,
        }
    }

    pub fn register(&mut self, id: StateId, mut state: Box<dyn AppState>) -> Result<(), String> {
        if self.states.contains_key(&id) {
            return Err(format!("State {:?} is already registered", id));
        }
        state
            .on_init()
            .map_err(|e| format!("State {:?} failed to initialize: {}", id, e))?;
        self.states.insert(id, state);
        Ok(())
    }

    pub fn is_registered(&self, id: StateId) -> bool {
        self.states.contains_key(&id)
    }

    pub fn active(&self) -> Option<StateId> {
        self.active
    }

    /// Activates `id` and runs its `on_switch` before returning. Unknown ids
    /// leave the current state active.
    pub fn set_active(&mut self, id: StateId, params: SwitchParams, ctx: &mut TickCtx<'_>) {
        let Some(state) = self.states.get_mut(&id) else {
            log::error!("Cannot switch to unregistered state {:?}", id);
            return;
        };
        self.active = Some(id);
        state.on_switch(ctx, params);
    }

    pub fn dispatch_update(&mut self, ctx: &mut TickCtx<'_>, delta: f32) {
        match self.active.and_then(|id| self.states.get_mut(&id)) {
            Some(state) => state.update(ctx, delta),
            None => log::error!("No active state to update"),
        }
    }

    pub fn dispatch_render(&mut self, renderer: &mut Renderer) {
        match self.active.and_then(|id| self.states.get_mut(&id)) {
            Some(state) => state.render(renderer),
            None => log::error!("No active state to render"),
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::RuntimeCommand;
    use keel_core::InputSampler;
    use keel_platform::MouseMode;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct CallLog {
        on_init: u32,
        on_switch: u32,
        update: u32,
        last_params: Option<i32>,
    }

    struct TestState {
        log: Rc<RefCell<CallLog>>,
        fail_init: bool,
    }

    impl TestState {
        fn new(log: &Rc<RefCell<CallLog>>) -> Box<Self> {
            Box::new(Self {
                log: Rc::clone(log),
                fail_init: false,
            })
        }

        fn failing(log: &Rc<RefCell<CallLog>>) -> Box<Self> {
            Box::new(Self {
                log: Rc::clone(log),
                fail_init: true,
            })
        }
    }

    impl AppState for TestState {
        fn on_init(&mut self) -> Result<(), String> {
            if self.fail_init {
                return Err("refused".to_string());
            }
            self.log.borrow_mut().on_init += 1;
            Ok(())
        }

        fn on_switch(&mut self, _ctx: &mut TickCtx<'_>, params: SwitchParams) {
            let mut log = self.log.borrow_mut();
            log.on_switch += 1;
            if let Some(params) = params {
                log.last_params = params.downcast::<i32>().ok().map(|p| *p);
            }
        }

        fn update(&mut self, _ctx: &mut TickCtx<'_>, _delta: f32) {
            self.log.borrow_mut().update += 1;
        }

        fn render(&mut self, _renderer: &mut Renderer) {}
    }

    fn with_ctx<R>(f: impl FnOnce(&mut TickCtx<'_>) -> R) -> R {
        let input = InputSampler::new();
        let mut commands: Vec<RuntimeCommand> = Vec::new();
        let mut ctx = TickCtx::new(&input, 0, MouseMode::Visible, &mut commands);
        f(&mut ctx)
    }

    #[test]
    fn test_register_runs_on_init_once() {
        let log = Rc::new(RefCell::new(CallLog::default()));
        let mut machine = StateMachine::new();
        machine.register(StateId(0), TestState::new(&log)).unwrap();
        assert_eq!(log.borrow().on_init, 1);
        assert!(machine.is_registered(StateId(0)));
        assert_eq!(machine.active(), None);
    }

    #[test]
    fn test_duplicate_id_is_rejected_and_original_kept() {
        let first = Rc::new(RefCell::new(CallLog::default()));
        let second = Rc::new(RefCell::new(CallLog::default()));
        let mut machine = StateMachine::new();
        machine.register(StateId(7), TestState::new(&first)).unwrap();

        let err = machine
            .register(StateId(7), TestState::new(&second))
            .unwrap_err();
        assert!(err.contains("already registered"));
        // The rejected state never initialized.
        assert_eq!(second.borrow().on_init, 0);

        // Activation still reaches the original registration.
        with_ctx(|ctx| machine.set_active(StateId(7), None, ctx));
        assert_eq!(first.borrow().on_switch, 1);
        assert_eq!(second.borrow().on_switch, 0);
    }

    #[test]
    fn test_failed_on_init_keeps_state_unregistered() {
        let log = Rc::new(RefCell::new(CallLog::default()));
        let mut machine = StateMachine::new();
        let err = machine
            .register(StateId(3), TestState::failing(&log))
            .unwrap_err();
        assert!(err.contains("failed to initialize"));
        assert!(!machine.is_registered(StateId(3)));

        with_ctx(|ctx| machine.set_active(StateId(3), None, ctx));
        assert_eq!(machine.active(), None);
    }

    #[test]
    fn test_switch_invokes_only_the_target() {
        let a = Rc::new(RefCell::new(CallLog::default()));
        let b = Rc::new(RefCell::new(CallLog::default()));
        let mut machine = StateMachine::new();
        machine.register(StateId(0), TestState::new(&a)).unwrap();
        machine.register(StateId(1), TestState::new(&b)).unwrap();

        with_ctx(|ctx| {
            machine.set_active(StateId(0), None, ctx);
            machine.set_active(StateId(1), None, ctx);
        });
        assert_eq!(a.borrow().on_switch, 1);
        assert_eq!(b.borrow().on_switch, 1);
        assert_eq!(machine.active(), Some(StateId(1)));
    }

    #[test]
    fn test_reentry_reruns_on_switch() {
        let a = Rc::new(RefCell::new(CallLog::default()));
        let b = Rc::new(RefCell::new(CallLog::default()));
        let mut machine = StateMachine::new();
        machine.register(StateId(0), TestState::new(&a)).unwrap();
        machine.register(StateId(1), TestState::new(&b)).unwrap();

        with_ctx(|ctx| {
            machine.set_active(StateId(0), None, ctx);
            machine.set_active(StateId(1), None, ctx);
            machine.set_active(StateId(0), None, ctx);
        });
        assert_eq!(a.borrow().on_switch, 2);
        // on_init still ran only at registration.
        assert_eq!(a.borrow().on_init, 1);
    }

    #[test]
    fn test_switch_params_reach_the_target() {
        let log = Rc::new(RefCell::new(CallLog::default()));
        let mut machine = StateMachine::new();
        machine.register(StateId(0), TestState::new(&log)).unwrap();

        with_ctx(|ctx| machine.set_active(StateId(0), Some(Box::new(42i32)), ctx));
        assert_eq!(log.borrow().last_params, Some(42));
    }

    #[test]
    fn test_switch_to_unknown_id_preserves_active_state() {
        let log = Rc::new(RefCell::new(CallLog::default()));
        let mut machine = StateMachine::new();
        machine.register(StateId(0), TestState::new(&log)).unwrap();

        with_ctx(|ctx| {
            machine.set_active(StateId(0), None, ctx);
            machine.set_active(StateId(99), None, ctx);
        });
        assert_eq!(machine.active(), Some(StateId(0)));
        assert_eq!(log.borrow().on_switch, 1);
    }

    #[test]
    fn test_update_reaches_only_the_active_state() {
        let a = Rc::new(RefCell::new(CallLog::default()));
        let b = Rc::new(RefCell::new(CallLog::default()));
        let mut machine = StateMachine::new();
        machine.register(StateId(0), TestState::new(&a)).unwrap();
        machine.register(StateId(1), TestState::new(&b)).unwrap();

        with_ctx(|ctx| {
            machine.set_active(StateId(1), None, ctx);
            machine.dispatch_update(ctx, 0.016);
            machine.dispatch_update(ctx, 0.016);
        });
        assert_eq!(a.borrow().update, 0);
        assert_eq!(b.borrow().update, 2);
    }

    #[test]
    fn test_dispatch_without_active_state_is_a_no_op() {
        let log = Rc::new(RefCell::new(CallLog::default()));
        let mut machine = StateMachine::new();
        machine.register(StateId(0), TestState::new(&log)).unwrap();

        with_ctx(|ctx| machine.dispatch_update(ctx, 0.016));
        assert_eq!(log.borrow().update, 0);
    }
}
