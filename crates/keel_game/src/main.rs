//! Sample game built on the Keel runtime: a walkable level plus a
//! placeholder editor, toggled with the backquote key.

mod editor;
mod level;

use keel_runtime::{Runtime, RuntimeConfig, StateId};

use crate::editor::EditorState;
use crate::level::LevelState;

pub const LEVEL_STATE: StateId = StateId(0);
pub const EDITOR_STATE: StateId = StateId(1);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Keel Engine starting...");

    let config = RuntimeConfig::default();
    let level_path = config.resource_path.join("levels").join("sample.json");

    let mut runtime = Runtime::new(config);
    runtime.register_state(LEVEL_STATE, Box::new(LevelState::new(level_path)));
    runtime.register_state(EDITOR_STATE, Box::new(EditorState::new()));

    if let Err(e) = runtime.run(LEVEL_STATE) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
