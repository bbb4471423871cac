pub mod gpu_context;
pub mod offscreen;
pub mod primitives;
pub mod renderer;
pub mod shader;
pub mod texture;

pub use gpu_context::GpuContext;
pub use offscreen::OffscreenTarget;
pub use renderer::{GlyphDraw, Material, PresentInfo, Renderer, RendererConfig};
pub use shader::{ShaderProgram, UniformType, UniformValue};
pub use texture::{TextureCache, TextureHandle};
