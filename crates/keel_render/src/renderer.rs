//! Frame orchestration over the five shader programs.
//!
//! Every frame runs the same shape: `prepare_frame` clears the fixed-size
//! multisampled scene targets, draw calls record one small render pass each,
//! and `present_frame` resolves the samples into the intermediate texture and
//! composites it onto the window surface. Draw and camera calls outside an
//! active frame log an error and do nothing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};
use winit::window::Window;

use crate::gpu_context::GpuContext;
use crate::offscreen::{OffscreenTarget, COLOR_FORMAT, MSAA_SAMPLES};
use crate::primitives::{CubeVertex, GlyphVertex, Primitive, Primitives, QuadVertex};
use crate::shader::{DepthMode, ProgramDesc, ShaderProgram, UniformType, UniformValue};
use crate::texture::{TextureCache, TextureHandle};

const TEXT_UNIFORMS: &[(&str, UniformType)] = &[
    ("screen_size", UniformType::Vec2),
    ("glyph_pos", UniformType::Vec2),
    ("glyph_size", UniformType::Vec2),
    ("uv_offset", UniformType::Vec2),
    ("uv_scale", UniformType::Vec2),
    ("color", UniformType::Vec4),
];

const SCENE_UNIFORMS: &[(&str, UniformType)] = &[
    ("projection", UniformType::Mat4),
    ("view", UniformType::Mat4),
    ("model", UniformType::Mat4),
    ("view_position", UniformType::Vec3),
];

const LIGHT_UNIFORMS: &[(&str, UniformType)] = &[
    ("projection", UniformType::Mat4),
    ("view", UniformType::Mat4),
    ("model", UniformType::Mat4),
];

pub struct RendererConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub resource_path: PathBuf,
}

/// Five-texture material bundle for the model program. Identical bundles
/// share one bind group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Material {
    pub albedo: TextureHandle,
    pub metallic_roughness: TextureHandle,
    pub normal: TextureHandle,
    pub emissive: TextureHandle,
    pub occlusion: TextureHandle,
}

/// One glyph quad in screen pixels, sampling a sub-rectangle of an atlas.
pub struct GlyphDraw {
    pub position: Vec2,
    pub size: Vec2,
    pub uv_offset: Vec2,
    pub uv_scale: Vec2,
    pub color: Vec4,
    pub texture: TextureHandle,
}

/// Record of the last presentation, kept for diagnostics: the scene resolves
/// at its own fixed extent and then stretches over the full window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PresentInfo {
    pub resolve_extent: (u32, u32),
    pub composite_viewport: (f32, f32, f32, f32),
}

impl PresentInfo {
    pub fn compute(screen_size: (u32, u32), window_size: (u32, u32)) -> Self {
        Self {
            resolve_extent: screen_size,
            composite_viewport: (0.0, 0.0, window_size.0 as f32, window_size.1 as f32),
        }
    }
}

struct FrameInFlight {
    encoder: wgpu::CommandEncoder,
}

/// Frame-scoped calls outside a prepare/present cycle log and do nothing.
fn check_frame_active(frame_active: bool, op: &str) -> bool {
    if !frame_active {
        log::error!("{} called outside an active frame", op);
    }
    frame_active
}

pub struct Renderer {
    ctx: GpuContext,
    textures: TextureCache,
    offscreen: OffscreenTarget,
    primitives: Primitives,
    screen_program: ShaderProgram,
    text_program: ShaderProgram,
    model_program: ShaderProgram,
    geometry_program: ShaderProgram,
    light_program: ShaderProgram,
    material_layout: wgpu::BindGroupLayout,
    material_groups: HashMap<Material, wgpu::BindGroup>,
    clear_color: wgpu::Color,
    frame: Option<FrameInFlight>,
    last_present: Option<PresentInfo>,
}

fn material_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

impl Renderer {
    pub fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self, String> {
        let ctx = GpuContext::new(window)?;
        let textures = TextureCache::new(&ctx.device, config.resource_path.clone());

        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let offscreen = OffscreenTarget::new(
            &ctx.device,
            textures.sampler(),
            textures.layout(),
            config.screen_width,
            config.screen_height,
        );
        let primitives = Primitives::new(&ctx.device);
        if let Some(error) = pollster::block_on(ctx.device.pop_error_scope()) {
            return Err(format!("Offscreen target creation failed: {}", error));
        }

        let material_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Material Layout"),
                    entries: &[
                        material_texture_entry(0),
                        material_texture_entry(1),
                        material_texture_entry(2),
                        material_texture_entry(3),
                        material_texture_entry(4),
                        wgpu::BindGroupLayoutEntry {
                            binding: 5,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                });

        let shader_dir = config.resource_path.join("shaders");

        let screen_program = ShaderProgram::load(
            &ctx.device,
            ProgramDesc {
                label: "Screen",
                vert_path: shader_dir.join("screen.vert.wgsl"),
                frag_path: shader_dir.join("screen.frag.wgsl"),
                vertex_layout: QuadVertex::layout(),
                color_format: ctx.surface_format,
                depth: DepthMode::Disabled,
                sample_count: 1,
                block_fields: &[],
                texture_layouts: &[textures.layout()],
            },
        )?;

        let mut text_program = ShaderProgram::load(
            &ctx.device,
            ProgramDesc {
                label: "Text",
                vert_path: shader_dir.join("text.vert.wgsl"),
                frag_path: shader_dir.join("text.frag.wgsl"),
                vertex_layout: GlyphVertex::layout(),
                color_format: COLOR_FORMAT,
                depth: DepthMode::Overlay,
                sample_count: MSAA_SAMPLES,
                block_fields: TEXT_UNIFORMS,
                texture_layouts: &[textures.layout()],
            },
        )?;

        let mut model_program = ShaderProgram::load(
            &ctx.device,
            ProgramDesc {
                label: "Model",
                vert_path: shader_dir.join("model.vert.wgsl"),
                frag_path: shader_dir.join("model.frag.wgsl"),
                vertex_layout: CubeVertex::layout(),
                color_format: COLOR_FORMAT,
                depth: DepthMode::ReadWrite,
                sample_count: MSAA_SAMPLES,
                block_fields: SCENE_UNIFORMS,
                texture_layouts: &[&material_layout],
            },
        )?;

        let mut geometry_program = ShaderProgram::load(
            &ctx.device,
            ProgramDesc {
                label: "Geometry",
                vert_path: shader_dir.join("geometry.vert.wgsl"),
                frag_path: shader_dir.join("geometry.frag.wgsl"),
                vertex_layout: CubeVertex::layout(),
                color_format: COLOR_FORMAT,
                depth: DepthMode::ReadWrite,
                sample_count: MSAA_SAMPLES,
                block_fields: SCENE_UNIFORMS,
                texture_layouts: &[textures.layout()],
            },
        )?;

        let mut light_program = ShaderProgram::load(
            &ctx.device,
            ProgramDesc {
                label: "Light",
                vert_path: shader_dir.join("light.vert.wgsl"),
                frag_path: shader_dir.join("light.frag.wgsl"),
                vertex_layout: CubeVertex::layout(),
                color_format: COLOR_FORMAT,
                depth: DepthMode::ReadWrite,
                sample_count: MSAA_SAMPLES,
                block_fields: LIGHT_UNIFORMS,
                texture_layouts: &[],
            },
        )?;

        text_program.set_uniform(
            "screen_size",
            UniformValue::Vec2(Vec2::new(
                config.screen_width as f32,
                config.screen_height as f32,
            )),
        );

        let aspect = config.screen_width as f32 / config.screen_height as f32;
        let projection = Mat4::perspective_rh(45.0f32.to_radians(), aspect, 0.1, 100.0);
        for program in [&mut model_program, &mut geometry_program, &mut light_program] {
            program.set_uniform("projection", UniformValue::Mat4(projection));
        }

        log::info!(
            "Renderer subsystem initialized ({}x{} scene)",
            config.screen_width,
            config.screen_height
        );

        Ok(Self {
            ctx,
            textures,
            offscreen,
            primitives,
            screen_program,
            text_program,
            model_program,
            geometry_program,
            light_program,
            material_layout,
            material_groups: HashMap::new(),
            clear_color: wgpu::Color {
                r: 0.2,
                g: 0.2,
                b: 0.2,
                a: 1.0,
            },
            frame: None,
            last_present: None,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }

    pub fn screen_size(&self) -> (u32, u32) {
        self.offscreen.size
    }

    pub fn set_clear_color(&mut self, color: Vec3) {
        self.clear_color = wgpu::Color {
            r: color.x as f64,
            g: color.y as f64,
            b: color.z as f64,
            a: 1.0,
        };
    }

    pub fn acquire_texture(&mut self, path: &str) -> Option<TextureHandle> {
        self.textures.acquire(&self.ctx.device, &self.ctx.queue, path)
    }

    pub fn acquire_solid_color(&mut self, r: f32, g: f32, b: f32, a: f32) -> TextureHandle {
        self.textures
            .acquire_solid_color(&self.ctx.device, &self.ctx.queue, r, g, b, a)
    }

    /// Neutral material: white albedo, mid roughness, flat normal, no
    /// emission, full ambient occlusion.
    pub fn default_material(&mut self) -> Material {
        Material {
            albedo: self.acquire_solid_color(1.0, 1.0, 1.0, 1.0),
            metallic_roughness: self.acquire_solid_color(0.0, 0.5, 0.0, 1.0),
            normal: self.acquire_solid_color(0.5, 0.5, 1.0, 1.0),
            emissive: self.acquire_solid_color(0.0, 0.0, 0.0, 1.0),
            occlusion: self.acquire_solid_color(1.0, 1.0, 1.0, 1.0),
        }
    }

    pub fn set_camera(&mut self, position: Vec3, target: Vec3) {
        if !check_frame_active(self.frame.is_some(), "set_camera") {
            return;
        }
        let view = Mat4::look_at_rh(position, target, Vec3::Y);
        self.light_program.set_uniform("view", UniformValue::Mat4(view));
        self.geometry_program.set_uniform("view", UniformValue::Mat4(view));
        self.geometry_program
            .set_uniform("view_position", UniformValue::Vec3(position));
        self.model_program.set_uniform("view", UniformValue::Mat4(view));
        self.model_program
            .set_uniform("view_position", UniformValue::Vec3(position));
    }

    pub fn prepare_frame(&mut self) {
        if self.frame.is_some() {
            log::error!("prepare_frame called twice without present_frame");
            return;
        }

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        // A pass with no draws performs the clears.
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.offscreen.msaa_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.offscreen.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            ..Default::default()
        });

        self.text_program.reset_arena();
        self.model_program.reset_arena();
        self.geometry_program.reset_arena();
        self.light_program.reset_arena();

        self.frame = Some(FrameInFlight { encoder });
    }

    pub fn render_light(&mut self, position: Vec3) {
        if !check_frame_active(self.frame.is_some(), "render_light") {
            return;
        }
        let model = Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(0.1));
        self.light_program
            .set_uniform("model", UniformValue::Mat4(model));
        let Some(offset) = self
            .light_program
            .push_draw_uniforms(&self.ctx.device, &self.ctx.queue)
        else {
            return;
        };
        let Some(uniform_group) = self.light_program.arena_bind_group() else {
            return;
        };
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        Self::draw_primitive(
            &mut frame.encoder,
            &self.offscreen,
            &self.light_program.pipeline,
            Some((uniform_group, offset)),
            None,
            &self.primitives.cube,
        );
    }

    pub fn render_geometry(&mut self, transform: Mat4, texture: TextureHandle) {
        if !check_frame_active(self.frame.is_some(), "render_geometry") {
            return;
        }
        if self.textures.bind_group(texture).is_none() {
            log::error!("render_geometry: unknown texture handle {:?}", texture);
            return;
        }
        self.geometry_program
            .set_uniform("model", UniformValue::Mat4(transform));
        let Some(offset) = self
            .geometry_program
            .push_draw_uniforms(&self.ctx.device, &self.ctx.queue)
        else {
            return;
        };
        let Some(uniform_group) = self.geometry_program.arena_bind_group() else {
            return;
        };
        let Some(texture_group) = self.textures.bind_group(texture) else {
            return;
        };
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        Self::draw_primitive(
            &mut frame.encoder,
            &self.offscreen,
            &self.geometry_program.pipeline,
            Some((uniform_group, offset)),
            Some(texture_group),
            &self.primitives.cube,
        );
    }

    pub fn render_model(&mut self, transform: Mat4, material: &Material) {
        if !check_frame_active(self.frame.is_some(), "render_model") {
            return;
        }
        if !self.ensure_material_group(material) {
            return;
        }
        self.model_program
            .set_uniform("model", UniformValue::Mat4(transform));
        let Some(offset) = self
            .model_program
            .push_draw_uniforms(&self.ctx.device, &self.ctx.queue)
        else {
            return;
        };
        let Some(uniform_group) = self.model_program.arena_bind_group() else {
            return;
        };
        let Some(material_group) = self.material_groups.get(material) else {
            return;
        };
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        Self::draw_primitive(
            &mut frame.encoder,
            &self.offscreen,
            &self.model_program.pipeline,
            Some((uniform_group, offset)),
            Some(material_group),
            &self.primitives.cube,
        );
    }

    pub fn render_glyph(&mut self, glyph: &GlyphDraw) {
        if !check_frame_active(self.frame.is_some(), "render_glyph") {
            return;
        }
        if self.textures.bind_group(glyph.texture).is_none() {
            log::error!("render_glyph: unknown texture handle {:?}", glyph.texture);
            return;
        }
        self.text_program
            .set_uniform("glyph_pos", UniformValue::Vec2(glyph.position));
        self.text_program
            .set_uniform("glyph_size", UniformValue::Vec2(glyph.size));
        self.text_program
            .set_uniform("uv_offset", UniformValue::Vec2(glyph.uv_offset));
        self.text_program
            .set_uniform("uv_scale", UniformValue::Vec2(glyph.uv_scale));
        self.text_program
            .set_uniform("color", UniformValue::Vec4(glyph.color));
        let Some(offset) = self
            .text_program
            .push_draw_uniforms(&self.ctx.device, &self.ctx.queue)
        else {
            return;
        };
        let Some(uniform_group) = self.text_program.arena_bind_group() else {
            return;
        };
        let Some(texture_group) = self.textures.bind_group(glyph.texture) else {
            return;
        };
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        Self::draw_primitive(
            &mut frame.encoder,
            &self.offscreen,
            &self.text_program.pipeline,
            Some((uniform_group, offset)),
            Some(texture_group),
            &self.primitives.glyph,
        );
    }

    pub fn present_frame(&mut self) {
        let Some(mut frame) = self.frame.take() else {
            log::error!("present_frame called without prepare_frame");
            return;
        };

        // Resolving happens as a pass side effect; no draws needed.
        frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Resolve"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.offscreen.msaa_view,
                resolve_target: Some(&self.offscreen.intermediate_view),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            ..Default::default()
        });

        let Some((output, surface_view)) = self.ctx.begin_frame() else {
            // No surface this frame; the recorded work is discarded.
            return;
        };

        {
            let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_pipeline(&self.screen_program.pipeline);
            pass.set_bind_group(0, &self.offscreen.composite_bind_group, &[]);
            pass.set_vertex_buffer(0, self.primitives.quad.buffer.slice(..));
            pass.draw(0..self.primitives.quad.vertex_count, 0..1);
        }

        self.ctx.queue.submit(std::iter::once(frame.encoder.finish()));
        output.present();
        self.last_present = Some(PresentInfo::compute(self.offscreen.size, self.ctx.size));
    }

    pub fn present_info(&self) -> Option<PresentInfo> {
        self.last_present
    }

    fn ensure_material_group(&mut self, material: &Material) -> bool {
        if self.material_groups.contains_key(material) {
            return true;
        }
        let handles = [
            material.albedo,
            material.metallic_roughness,
            material.normal,
            material.emissive,
            material.occlusion,
        ];
        let mut views = Vec::with_capacity(handles.len());
        for handle in handles {
            match self.textures.view(handle) {
                Some(view) => views.push(view),
                None => {
                    log::error!(
                        "render_model: material references unknown texture handle {:?}",
                        handle
                    );
                    return false;
                }
            }
        }
        let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(views[2]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(views[3]),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(views[4]),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(self.textures.sampler()),
                },
            ],
        });
        self.material_groups.insert(*material, bind_group);
        true
    }

    fn draw_primitive(
        encoder: &mut wgpu::CommandEncoder,
        target: &OffscreenTarget,
        pipeline: &wgpu::RenderPipeline,
        uniforms: Option<(&wgpu::BindGroup, u32)>,
        textures: Option<&wgpu::BindGroup>,
        primitive: &Primitive,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Draw"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.msaa_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &target.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
            }),
            ..Default::default()
        });
        pass.set_pipeline(pipeline);
        let mut group_index = 0;
        if let Some((bind_group, offset)) = uniforms {
            pass.set_bind_group(group_index, bind_group, &[offset]);
            group_index += 1;
        }
        if let Some(bind_group) = textures {
            pass.set_bind_group(group_index, bind_group, &[]);
        }
        pass.set_vertex_buffer(0, primitive.buffer.slice(..));
        pass.draw(0..primitive.vertex_count, 0..1);
    }
}
