use std::sync::Arc;
use winit::event_loop::ActiveEventLoop;
use winit::window::{CursorGrabMode, Window, WindowAttributes};

pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Keel Engine".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

pub fn create_window(
    event_loop: &ActiveEventLoop,
    config: &PlatformConfig,
) -> Result<Arc<Window>, String> {
    let attrs = WindowAttributes::default()
        .with_title(&config.title)
        .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

    let window = event_loop
        .create_window(attrs)
        .map_err(|e| format!("Failed to create window: {}", e))?;
    Ok(Arc::new(window))
}

/// Cursor behavior while the application runs. `Visible` is the ordinary
/// desktop cursor; `RelativeCaptured` hides it and reports deltas only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseMode {
    Visible,
    RelativeCaptured,
}

/// Applies a mouse mode to the window. Callers keep track of the current
/// mode; re-applying it is harmless but skipping the call is cheaper.
pub fn apply_mouse_mode(window: &Window, mode: MouseMode) {
    match mode {
        MouseMode::Visible => {
            if let Err(e) = window.set_cursor_grab(CursorGrabMode::None) {
                log::warn!("Failed to release cursor grab: {}", e);
            }
            window.set_cursor_visible(true);
        }
        MouseMode::RelativeCaptured => {
            // Locked is unsupported on some platforms; Confined still keeps
            // the cursor inside the window while hidden.
            if let Err(e) = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
            {
                log::warn!("Failed to capture cursor: {}", e);
            }
            window.set_cursor_visible(false);
        }
    }
}
