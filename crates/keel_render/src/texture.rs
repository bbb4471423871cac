//! Texture loading and caching.
//!
//! Textures are acquired rather than loaded: asking twice for the same image
//! path or the same solid color returns the handle created the first time.
//! Handles index into a cache-owned table, so callers never touch wgpu
//! resources directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

struct GpuTexture {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

pub struct TextureCache {
    sampler: wgpu::Sampler,
    layout: wgpu::BindGroupLayout,
    entries: Vec<GpuTexture>,
    by_path: HashMap<PathBuf, TextureHandle>,
    by_color: HashMap<u32, TextureHandle>,
    base_path: PathBuf,
}

/// Image paths resolve relative to the resource base. The joined path is the
/// cache key as-is, so two spellings of the same file load twice.
pub fn resolve_path(base: &Path, relative: &str) -> PathBuf {
    base.join(relative)
}

/// Packs a color into the cache key as `0xAABBGGRR`. Channels are expected
/// in [0, 1]; colors that quantize to the same bytes share one texture.
pub fn pack_color_key(r: f32, g: f32, b: f32, a: f32) -> u32 {
    let q = |v: f32| (v * 255.0) as u32;
    (q(a) << 24) | (q(b) << 16) | (q(g) << 8) | q(r)
}

impl TextureCache {
    pub fn new(device: &wgpu::Device, base_path: PathBuf) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Texture Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Single Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        Self {
            sampler,
            layout,
            entries: Vec::new(),
            by_path: HashMap::new(),
            by_color: HashMap::new(),
            base_path,
        }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn view(&self, handle: TextureHandle) -> Option<&wgpu::TextureView> {
        self.entries.get(handle.0 as usize).map(|entry| &entry.view)
    }

    pub fn bind_group(&self, handle: TextureHandle) -> Option<&wgpu::BindGroup> {
        self.entries
            .get(handle.0 as usize)
            .map(|entry| &entry.bind_group)
    }

    pub fn acquire(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &str,
    ) -> Option<TextureHandle> {
        let full_path = resolve_path(&self.base_path, path);
        if let Some(handle) = self.by_path.get(&full_path) {
            log::debug!("Texture {} already loaded", path);
            return Some(*handle);
        }

        let image = match image::open(&full_path) {
            Ok(image) => image,
            Err(e) => {
                log::error!("Could not load texture {}: {}", full_path.display(), e);
                return None;
            }
        };

        let width = image.width();
        let height = image.height();
        let (format, data, bytes_per_pixel) = match image.color().channel_count() {
            1 => (
                wgpu::TextureFormat::R8Unorm,
                image.to_luma8().into_raw(),
                1,
            ),
            // No 24-bit GPU format exists, so three-channel images expand
            // to RGBA on upload.
            3 | 4 => (
                wgpu::TextureFormat::Rgba8UnormSrgb,
                image.to_rgba8().into_raw(),
                4,
            ),
            channels => {
                log::error!(
                    "Texture format of {} not recognized ({} channels)",
                    full_path.display(),
                    channels
                );
                return None;
            }
        };

        let label = format!("Texture {}", path);
        let handle = self.upload(
            device,
            queue,
            &label,
            format,
            width,
            height,
            bytes_per_pixel,
            &data,
        );
        self.by_path.insert(full_path, handle);
        log::info!("Loaded texture {} ({}x{})", path, width, height);
        Some(handle)
    }

    pub fn acquire_solid_color(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        r: f32,
        g: f32,
        b: f32,
        a: f32,
    ) -> TextureHandle {
        let key = pack_color_key(r, g, b, a);
        if let Some(handle) = self.by_color.get(&key) {
            return *handle;
        }

        // The key's little-endian bytes are exactly the RGBA texel.
        let data = key.to_le_bytes();
        let handle = self.upload(
            device,
            queue,
            "Solid Color",
            wgpu::TextureFormat::Rgba8UnormSrgb,
            1,
            1,
            4,
            &data,
        );
        self.by_color.insert(key, handle);
        handle
    }

    #[allow(clippy::too_many_arguments)]
    fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
        data: &[u8],
    ) -> TextureHandle {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * bytes_per_pixel),
                rows_per_image: None,
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let handle = TextureHandle(self.entries.len() as u32);
        self.entries.push(GpuTexture {
            texture,
            view,
            bind_group,
        });
        handle
    }
}
