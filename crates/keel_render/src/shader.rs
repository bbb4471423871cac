//! WGSL shader programs addressed through named uniforms.
//!
//! Each program owns one uniform block laid out per WGSL rules. Callers
//! set uniforms by name into a CPU staging copy; every draw snapshots the
//! staging bytes into a per-program arena buffer and binds them at a dynamic
//! offset, so a value set between two draws only affects the second one even
//! though all GPU work submits at the end of the frame.

use std::path::{Path, PathBuf};

use crate::offscreen::DEPTH_FORMAT;

/// wgpu's default `min_uniform_buffer_offset_alignment`.
const UNIFORM_STRIDE_ALIGN: u32 = 256;
const INITIAL_ARENA_SLOTS: u32 = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformType {
    Int,
    Uint,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    /// Fixed-length `array<mat4x4<f32>, N>`.
    Mat4Array(usize),
}

impl UniformType {
    fn align(self) -> usize {
        match self {
            UniformType::Int | UniformType::Uint | UniformType::Float => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3
            | UniformType::Vec4
            | UniformType::Mat4
            | UniformType::Mat4Array(_) => 16,
        }
    }

    fn size(self) -> usize {
        match self {
            UniformType::Int | UniformType::Uint | UniformType::Float => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            UniformType::Mat4 => 64,
            UniformType::Mat4Array(count) => 64 * count,
        }
    }
}

#[derive(Clone, Debug)]
pub enum UniformValue {
    Int(i32),
    Uint(u32),
    Float(f32),
    Vec2(glam::Vec2),
    Vec3(glam::Vec3),
    Vec4(glam::Vec4),
    Mat4(glam::Mat4),
    Mat4Array(Vec<glam::Mat4>),
}

struct UniformField {
    name: &'static str,
    ty: UniformType,
    offset: usize,
}

/// CPU staging copy of a program's uniform block.
pub struct UniformBlock {
    label: String,
    fields: Vec<UniformField>,
    bytes: Vec<u8>,
}

impl UniformBlock {
    pub fn new(label: &str, field_defs: &[(&'static str, UniformType)]) -> Self {
        let mut fields = Vec::with_capacity(field_defs.len());
        let mut cursor = 0usize;
        for &(name, ty) in field_defs {
            let align = ty.align();
            cursor = (cursor + align - 1) / align * align;
            fields.push(UniformField {
                name,
                ty,
                offset: cursor,
            });
            cursor += ty.size();
        }
        // Struct size rounds up to the largest member alignment, which is
        // 16 for every block we declare.
        let size = (cursor + 15) / 16 * 16;
        Self {
            label: label.to_string(),
            fields,
            bytes: vec![0; size],
        }
    }

    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.offset)
    }

    pub fn set(&mut self, name: &str, value: UniformValue) {
        let Some(field) = self.fields.iter().find(|f| f.name == name) else {
            log::warn!("Program {}: unknown uniform '{}'", self.label, name);
            return;
        };
        let offset = field.offset;
        match (field.ty, value) {
            (UniformType::Int, UniformValue::Int(v)) => self.write(offset, bytemuck::bytes_of(&v)),
            (UniformType::Uint, UniformValue::Uint(v)) => {
                self.write(offset, bytemuck::bytes_of(&v))
            }
            (UniformType::Float, UniformValue::Float(v)) => {
                self.write(offset, bytemuck::bytes_of(&v))
            }
            (UniformType::Vec2, UniformValue::Vec2(v)) => {
                self.write(offset, bytemuck::bytes_of(&v.to_array()))
            }
            (UniformType::Vec3, UniformValue::Vec3(v)) => {
                self.write(offset, bytemuck::bytes_of(&v.to_array()))
            }
            (UniformType::Vec4, UniformValue::Vec4(v)) => {
                self.write(offset, bytemuck::bytes_of(&v.to_array()))
            }
            (UniformType::Mat4, UniformValue::Mat4(v)) => {
                self.write(offset, bytemuck::bytes_of(&v.to_cols_array()))
            }
            (UniformType::Mat4Array(count), UniformValue::Mat4Array(values)) => {
                if values.len() != count {
                    log::warn!(
                        "Program {}: uniform '{}' expects {} matrices, got {}",
                        self.label,
                        name,
                        count,
                        values.len()
                    );
                    return;
                }
                for (i, mat) in values.iter().enumerate() {
                    self.write(offset + i * 64, bytemuck::bytes_of(&mat.to_cols_array()));
                }
            }
            (ty, value) => {
                log::warn!(
                    "Program {}: uniform '{}' is {:?}, cannot take {:?}",
                    self.label,
                    name,
                    ty,
                    value
                );
            }
        }
    }

    fn write(&mut self, offset: usize, data: &[u8]) {
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }
}

/// Growable uniform buffer holding one block snapshot per draw.
pub struct UniformArena {
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
    buffer: wgpu::Buffer,
    label: String,
    block_size: u32,
    stride: u32,
    capacity: u32,
    cursor: u32,
}

impl UniformArena {
    pub fn new(device: &wgpu::Device, label: &str, block_size: u32) -> Self {
        let stride =
            (block_size + UNIFORM_STRIDE_ALIGN - 1) / UNIFORM_STRIDE_ALIGN * UNIFORM_STRIDE_ALIGN;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(block_size as u64),
                },
                count: None,
            }],
        });
        let (buffer, bind_group) =
            Self::allocate(device, label, &layout, block_size, stride, INITIAL_ARENA_SLOTS);
        Self {
            layout,
            bind_group,
            buffer,
            label: label.to_string(),
            block_size,
            stride,
            capacity: INITIAL_ARENA_SLOTS,
            cursor: 0,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        block_size: u32,
        stride: u32,
        capacity: u32,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (stride * capacity) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(block_size as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Writes one block snapshot into the next slot and returns its dynamic
    /// offset.
    pub fn push(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) -> u32 {
        if self.cursor == self.capacity {
            // Draws already recorded keep the old buffer alive through the
            // bind group they captured, so swapping mid-frame is safe.
            self.capacity *= 2;
            let (buffer, bind_group) = Self::allocate(
                device,
                &self.label,
                &self.layout,
                self.block_size,
                self.stride,
                self.capacity,
            );
            self.buffer = buffer;
            self.bind_group = bind_group;
        }
        let offset = self.cursor * self.stride;
        queue.write_buffer(&self.buffer, offset as u64, bytes);
        self.cursor += 1;
        offset
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

pub fn load_shader_source(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read shader {}: {}", path.display(), e))
}

fn compile_stage(
    device: &wgpu::Device,
    path: &Path,
    source: &str,
) -> Result<wgpu::ShaderModule, String> {
    let label = path.display().to_string();
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(format!("Shader {} failed to compile: {}", label, error));
    }
    Ok(module)
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum DepthMode {
    /// No depth-stencil attachment in the target pass.
    Disabled,
    /// Test against and write the scene depth buffer.
    ReadWrite,
    /// Draw on top of the scene without testing or writing depth.
    Overlay,
}

pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub vert_path: PathBuf,
    pub frag_path: PathBuf,
    pub vertex_layout: wgpu::VertexBufferLayout<'static>,
    pub color_format: wgpu::TextureFormat,
    pub depth: DepthMode,
    pub sample_count: u32,
    pub block_fields: &'a [(&'static str, UniformType)],
    pub texture_layouts: &'a [&'a wgpu::BindGroupLayout],
}

struct ProgramBlock {
    staging: UniformBlock,
    arena: UniformArena,
}

pub struct ShaderProgram {
    label: String,
    pub pipeline: wgpu::RenderPipeline,
    block: Option<ProgramBlock>,
}

impl ShaderProgram {
    pub fn load(device: &wgpu::Device, desc: ProgramDesc) -> Result<Self, String> {
        let vert_source = load_shader_source(&desc.vert_path)?;
        let frag_source = load_shader_source(&desc.frag_path)?;
        let vert_module = compile_stage(device, &desc.vert_path, &vert_source)?;
        let frag_module = compile_stage(device, &desc.frag_path, &frag_source)?;

        let block = if desc.block_fields.is_empty() {
            None
        } else {
            let staging = UniformBlock::new(desc.label, desc.block_fields);
            let arena = UniformArena::new(device, desc.label, staging.size());
            Some(ProgramBlock { staging, arena })
        };

        let mut bind_group_layouts: Vec<&wgpu::BindGroupLayout> = Vec::new();
        if let Some(block) = &block {
            bind_group_layouts.push(&block.arena.layout);
        }
        bind_group_layouts.extend_from_slice(desc.texture_layouts);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let depth_stencil = match desc.depth {
            DepthMode::Disabled => None,
            DepthMode::ReadWrite => Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            DepthMode::Overlay => Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vert_module,
                entry_point: Some("vs_main"),
                buffers: &[desc.vertex_layout.clone()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &frag_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil,
            multisample: wgpu::MultisampleState {
                count: desc.sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(format!(
                "Shader program {} failed to link ({} + {}): {}",
                desc.label,
                desc.vert_path.display(),
                desc.frag_path.display(),
                error
            ));
        }

        Ok(Self {
            label: desc.label.to_string(),
            pipeline,
            block,
        })
    }

    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        match &mut self.block {
            Some(block) => block.staging.set(name, value),
            None => log::warn!("Program {} has no uniforms", self.label),
        }
    }

    /// Snapshots the staging block for the draw being recorded.
    pub fn push_draw_uniforms(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> Option<u32> {
        let block = self.block.as_mut()?;
        Some(block.arena.push(device, queue, block.staging.bytes()))
    }

    pub fn arena_bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.block.as_ref().map(|block| &block.arena.bind_group)
    }

    pub fn reset_arena(&mut self) {
        if let Some(block) = &mut self.block {
            block.arena.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec2, Vec4};

    #[test]
    fn test_text_block_layout() {
        let block = UniformBlock::new(
            "Text",
            &[
                ("screen_size", UniformType::Vec2),
                ("glyph_pos", UniformType::Vec2),
                ("glyph_size", UniformType::Vec2),
                ("uv_offset", UniformType::Vec2),
                ("uv_scale", UniformType::Vec2),
                ("color", UniformType::Vec4),
            ],
        );
        assert_eq!(block.offset_of("screen_size"), Some(0));
        assert_eq!(block.offset_of("glyph_pos"), Some(8));
        assert_eq!(block.offset_of("glyph_size"), Some(16));
        assert_eq!(block.offset_of("uv_offset"), Some(24));
        assert_eq!(block.offset_of("uv_scale"), Some(32));
        assert_eq!(block.offset_of("color"), Some(48));
        assert_eq!(block.size(), 64);
    }

    #[test]
    fn test_scene_block_layout() {
        let block = UniformBlock::new(
            "Scene",
            &[
                ("projection", UniformType::Mat4),
                ("view", UniformType::Mat4),
                ("model", UniformType::Mat4),
                ("view_position", UniformType::Vec3),
            ],
        );
        assert_eq!(block.offset_of("projection"), Some(0));
        assert_eq!(block.offset_of("view"), Some(64));
        assert_eq!(block.offset_of("model"), Some(128));
        assert_eq!(block.offset_of("view_position"), Some(192));
        assert_eq!(block.size(), 208);
    }

    #[test]
    fn test_scalar_after_vec3_packs_into_padding() {
        let block = UniformBlock::new(
            "Packed",
            &[("direction", UniformType::Vec3), ("intensity", UniformType::Float)],
        );
        assert_eq!(block.offset_of("direction"), Some(0));
        assert_eq!(block.offset_of("intensity"), Some(12));
        assert_eq!(block.size(), 16);
    }

    #[test]
    fn test_block_size_rounds_up_to_sixteen() {
        let block = UniformBlock::new("Tiny", &[("x", UniformType::Float)]);
        assert_eq!(block.size(), 16);
    }

    #[test]
    fn test_set_writes_value_bytes_at_field_offset() {
        let mut block = UniformBlock::new(
            "Write",
            &[("scale", UniformType::Vec2), ("color", UniformType::Vec4)],
        );
        block.set("color", UniformValue::Vec4(Vec4::new(1.0, 0.5, 0.25, 1.0)));
        let expected: Vec<u8> = [1.0f32, 0.5, 0.25, 1.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert_eq!(&block.bytes()[16..32], expected.as_slice());
        // The untouched field stays zeroed.
        assert_eq!(&block.bytes()[0..8], &[0u8; 8]);
    }

    #[test]
    fn test_mat4_writes_column_major() {
        let mut block = UniformBlock::new("Mat", &[("model", UniformType::Mat4)]);
        let mat = Mat4::from_translation(glam::Vec3::new(3.0, 4.0, 5.0));
        block.set("model", UniformValue::Mat4(mat));
        // Translation lands in the fourth column.
        let bytes = block.bytes();
        let x = f32::from_le_bytes([bytes[48], bytes[49], bytes[50], bytes[51]]);
        let y = f32::from_le_bytes([bytes[52], bytes[53], bytes[54], bytes[55]]);
        assert_eq!((x, y), (3.0, 4.0));
    }

    #[test]
    fn test_mat4_array_lays_out_contiguous_columns() {
        let mut block = UniformBlock::new(
            "Bones",
            &[
                ("bones", UniformType::Mat4Array(2)),
                ("tint", UniformType::Vec4),
            ],
        );
        assert_eq!(block.offset_of("bones"), Some(0));
        assert_eq!(block.offset_of("tint"), Some(128));
        assert_eq!(block.size(), 144);

        block.set(
            "bones",
            UniformValue::Mat4Array(vec![
                Mat4::IDENTITY,
                Mat4::from_translation(glam::Vec3::X),
            ]),
        );
        // Second matrix starts at 64; its translation x sits in column 3.
        let bytes = block.bytes();
        let x = f32::from_le_bytes([bytes[112], bytes[113], bytes[114], bytes[115]]);
        assert_eq!(x, 1.0);
    }

    #[test]
    fn test_mat4_array_count_mismatch_leaves_block_untouched() {
        let mut block = UniformBlock::new("Bones", &[("bones", UniformType::Mat4Array(2))]);
        block.set("bones", UniformValue::Mat4Array(vec![Mat4::IDENTITY]));
        assert!(block.bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_unknown_uniform_leaves_block_untouched() {
        let mut block = UniformBlock::new("Unknown", &[("known", UniformType::Vec2)]);
        block.set("missing", UniformValue::Vec2(Vec2::splat(9.0)));
        assert!(block.bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_type_mismatch_leaves_block_untouched() {
        let mut block = UniformBlock::new("Mismatch", &[("color", UniformType::Vec4)]);
        block.set("color", UniformValue::Float(1.0));
        assert!(block.bytes().iter().all(|b| *b == 0));
    }
}
