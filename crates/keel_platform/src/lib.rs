pub mod window;

pub use window::{apply_mouse_mode, create_window, MouseMode, PlatformConfig};
