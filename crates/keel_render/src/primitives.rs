//! Built-in vertex primitives shared by every draw path.
//!
//! The renderer never loads meshes from disk. Everything it draws is one of
//! three baked vertex lists: a fullscreen quad for compositing, a unit quad
//! for glyphs, and a unit cube for geometry, models, and light markers.

use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl QuadVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: std::mem::offset_of!(QuadVertex, position) as wgpu::BufferAddress,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                // uv
                wgpu::VertexAttribute {
                    offset: std::mem::offset_of!(QuadVertex, uv) as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlyphVertex {
    pub position: [f32; 2],
}

impl GlyphVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GlyphVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: std::mem::offset_of!(GlyphVertex, position) as wgpu::BufferAddress,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CubeVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl CubeVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<CubeVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: std::mem::offset_of!(CubeVertex, position) as wgpu::BufferAddress,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // normal
                wgpu::VertexAttribute {
                    offset: std::mem::offset_of!(CubeVertex, normal) as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // uv
                wgpu::VertexAttribute {
                    offset: std::mem::offset_of!(CubeVertex, uv) as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Fullscreen triangle pair in NDC. UVs assume texture v = 0 samples the top
/// row, so the upper-left corner of the screen reads the upper-left texel of
/// the intermediate target.
const FULLSCREEN_QUAD: [QuadVertex; 6] = [
    QuadVertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    QuadVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    QuadVertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    QuadVertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    QuadVertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    QuadVertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
];

/// Unit quad with the origin at the top-left corner. The text shader scales
/// and offsets it into pixel space, and derives the glyph UV from the corner
/// position, so a single attribute covers both.
const GLYPH_QUAD: [GlyphVertex; 6] = [
    GlyphVertex { position: [0.0, 0.0] },
    GlyphVertex { position: [1.0, 0.0] },
    GlyphVertex { position: [0.0, 1.0] },
    GlyphVertex { position: [0.0, 1.0] },
    GlyphVertex { position: [1.0, 0.0] },
    GlyphVertex { position: [1.0, 1.0] },
];

/// Axis-aligned cube spanning [-1, 1] with per-face normals, wound
/// counter-clockwise when viewed from outside.
const CUBE: [CubeVertex; 36] = [
    // back face (z = -1)
    CubeVertex { position: [-1.0, -1.0, -1.0], normal: [0.0, 0.0, -1.0], uv: [0.0, 0.0] },
    CubeVertex { position: [1.0, 1.0, -1.0], normal: [0.0, 0.0, -1.0], uv: [1.0, 1.0] },
    CubeVertex { position: [1.0, -1.0, -1.0], normal: [0.0, 0.0, -1.0], uv: [1.0, 0.0] },
    CubeVertex { position: [1.0, 1.0, -1.0], normal: [0.0, 0.0, -1.0], uv: [1.0, 1.0] },
    CubeVertex { position: [-1.0, -1.0, -1.0], normal: [0.0, 0.0, -1.0], uv: [0.0, 0.0] },
    CubeVertex { position: [-1.0, 1.0, -1.0], normal: [0.0, 0.0, -1.0], uv: [0.0, 1.0] },
    // front face (z = 1)
    CubeVertex { position: [-1.0, -1.0, 1.0], normal: [0.0, 0.0, 1.0], uv: [0.0, 0.0] },
    CubeVertex { position: [1.0, -1.0, 1.0], normal: [0.0, 0.0, 1.0], uv: [1.0, 0.0] },
    CubeVertex { position: [1.0, 1.0, 1.0], normal: [0.0, 0.0, 1.0], uv: [1.0, 1.0] },
    CubeVertex { position: [1.0, 1.0, 1.0], normal: [0.0, 0.0, 1.0], uv: [1.0, 1.0] },
    CubeVertex { position: [-1.0, 1.0, 1.0], normal: [0.0, 0.0, 1.0], uv: [0.0, 1.0] },
    CubeVertex { position: [-1.0, -1.0, 1.0], normal: [0.0, 0.0, 1.0], uv: [0.0, 0.0] },
    // left face (x = -1)
    CubeVertex { position: [-1.0, 1.0, 1.0], normal: [-1.0, 0.0, 0.0], uv: [1.0, 0.0] },
    CubeVertex { position: [-1.0, 1.0, -1.0], normal: [-1.0, 0.0, 0.0], uv: [1.0, 1.0] },
    CubeVertex { position: [-1.0, -1.0, -1.0], normal: [-1.0, 0.0, 0.0], uv: [0.0, 1.0] },
    CubeVertex { position: [-1.0, -1.0, -1.0], normal: [-1.0, 0.0, 0.0], uv: [0.0, 1.0] },
    CubeVertex { position: [-1.0, -1.0, 1.0], normal: [-1.0, 0.0, 0.0], uv: [0.0, 0.0] },
    CubeVertex { position: [-1.0, 1.0, 1.0], normal: [-1.0, 0.0, 0.0], uv: [1.0, 0.0] },
    // right face (x = 1)
    CubeVertex { position: [1.0, 1.0, 1.0], normal: [1.0, 0.0, 0.0], uv: [1.0, 0.0] },
    CubeVertex { position: [1.0, -1.0, -1.0], normal: [1.0, 0.0, 0.0], uv: [0.0, 1.0] },
    CubeVertex { position: [1.0, 1.0, -1.0], normal: [1.0, 0.0, 0.0], uv: [1.0, 1.0] },
    CubeVertex { position: [1.0, -1.0, -1.0], normal: [1.0, 0.0, 0.0], uv: [0.0, 1.0] },
    CubeVertex { position: [1.0, 1.0, 1.0], normal: [1.0, 0.0, 0.0], uv: [1.0, 0.0] },
    CubeVertex { position: [1.0, -1.0, 1.0], normal: [1.0, 0.0, 0.0], uv: [0.0, 0.0] },
    // bottom face (y = -1)
    CubeVertex { position: [-1.0, -1.0, -1.0], normal: [0.0, -1.0, 0.0], uv: [0.0, 1.0] },
    CubeVertex { position: [1.0, -1.0, -1.0], normal: [0.0, -1.0, 0.0], uv: [1.0, 1.0] },
    CubeVertex { position: [1.0, -1.0, 1.0], normal: [0.0, -1.0, 0.0], uv: [1.0, 0.0] },
    CubeVertex { position: [1.0, -1.0, 1.0], normal: [0.0, -1.0, 0.0], uv: [1.0, 0.0] },
    CubeVertex { position: [-1.0, -1.0, 1.0], normal: [0.0, -1.0, 0.0], uv: [0.0, 0.0] },
    CubeVertex { position: [-1.0, -1.0, -1.0], normal: [0.0, -1.0, 0.0], uv: [0.0, 1.0] },
    // top face (y = 1)
    CubeVertex { position: [-1.0, 1.0, -1.0], normal: [0.0, 1.0, 0.0], uv: [0.0, 1.0] },
    CubeVertex { position: [1.0, 1.0, 1.0], normal: [0.0, 1.0, 0.0], uv: [1.0, 0.0] },
    CubeVertex { position: [1.0, 1.0, -1.0], normal: [0.0, 1.0, 0.0], uv: [1.0, 1.0] },
    CubeVertex { position: [1.0, 1.0, 1.0], normal: [0.0, 1.0, 0.0], uv: [1.0, 0.0] },
    CubeVertex { position: [-1.0, 1.0, -1.0], normal: [0.0, 1.0, 0.0], uv: [0.0, 1.0] },
    CubeVertex { position: [-1.0, 1.0, 1.0], normal: [0.0, 1.0, 0.0], uv: [0.0, 0.0] },
];

pub struct Primitive {
    pub buffer: wgpu::Buffer,
    pub vertex_count: u32,
}

impl Primitive {
    fn from_bytes(device: &wgpu::Device, label: &str, contents: &[u8], vertex_count: u32) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            buffer,
            vertex_count,
        }
    }
}

pub struct Primitives {
    pub quad: Primitive,
    pub glyph: Primitive,
    pub cube: Primitive,
}

impl Primitives {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            quad: Primitive::from_bytes(
                device,
                "Fullscreen Quad",
                bytemuck::cast_slice(&FULLSCREEN_QUAD),
                FULLSCREEN_QUAD.len() as u32,
            ),
            glyph: Primitive::from_bytes(
                device,
                "Glyph Quad",
                bytemuck::cast_slice(&GLYPH_QUAD),
                GLYPH_QUAD.len() as u32,
            ),
            cube: Primitive::from_bytes(
                device,
                "Unit Cube",
                bytemuck::cast_slice(&CUBE),
                CUBE.len() as u32,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_strides_match_layouts() {
        assert_eq!(QuadVertex::layout().array_stride, 16);
        assert_eq!(GlyphVertex::layout().array_stride, 8);
        assert_eq!(CubeVertex::layout().array_stride, 32);
    }

    #[test]
    fn test_cube_vertex_attribute_offsets() {
        let layout = CubeVertex::layout();
        assert_eq!(layout.attributes[0].offset, 0);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[2].offset, 24);
    }

    #[test]
    fn test_primitive_vertex_counts() {
        assert_eq!(FULLSCREEN_QUAD.len(), 6);
        assert_eq!(GLYPH_QUAD.len(), 6);
        assert_eq!(CUBE.len(), 36);
    }

    #[test]
    fn test_cube_normals_are_unit_length() {
        for vertex in CUBE.iter() {
            let [x, y, z] = vertex.normal;
            let len_sq = x * x + y * y + z * z;
            assert!((len_sq - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_cube_normals_point_away_from_center() {
        // Every face normal should agree in sign with the coordinate the
        // face is extruded along.
        for vertex in CUBE.iter() {
            let dot = vertex.position[0] * vertex.normal[0]
                + vertex.position[1] * vertex.normal[1]
                + vertex.position[2] * vertex.normal[2];
            assert!(dot > 0.0);
        }
    }

    #[test]
    fn test_fullscreen_quad_covers_ndc() {
        let min_x = FULLSCREEN_QUAD.iter().map(|v| v.position[0]).fold(f32::MAX, f32::min);
        let max_x = FULLSCREEN_QUAD.iter().map(|v| v.position[0]).fold(f32::MIN, f32::max);
        let min_y = FULLSCREEN_QUAD.iter().map(|v| v.position[1]).fold(f32::MAX, f32::min);
        let max_y = FULLSCREEN_QUAD.iter().map(|v| v.position[1]).fold(f32::MIN, f32::max);
        assert_eq!((min_x, max_x), (-1.0, 1.0));
        assert_eq!((min_y, max_y), (-1.0, 1.0));
    }

    #[test]
    fn test_glyph_quad_stays_in_unit_square() {
        for vertex in GLYPH_QUAD.iter() {
            assert!(vertex.position[0] >= 0.0 && vertex.position[0] <= 1.0);
            assert!(vertex.position[1] >= 0.0 && vertex.position[1] <= 1.0);
        }
    }
}
