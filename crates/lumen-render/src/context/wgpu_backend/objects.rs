//! GL-style named objects backed by wgpu resources.
//!
//! GL objects exist before they have storage (a texture name can be bound
//! before `tex_image_2d`), so every wgpu resource here is optional until the
//! allocating call arrives.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use super::convert;
use crate::context::shader::{self, LinkedProgram, ProgramInterface};
use crate::context::types::*;

/// Format of every texture the context allocates.
pub(super) const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub(super) const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

pub(super) struct TextureObject {
    pub(super) texture: Option<wgpu::Texture>,
    pub(super) view: Option<wgpu::TextureView>,
    pub(super) sampler: wgpu::Sampler,
    pub(super) width: u32,
    pub(super) height: u32,
}

impl TextureObject {
    pub(super) fn new(device: &wgpu::Device) -> Self {
        Self {
            texture: None,
            view: None,
            sampler: convert::sampler(device, &TextureParams::default()),
            width: 0,
            height: 0,
        }
    }

    pub(super) fn allocate(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen texture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        self.view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.texture = Some(texture);
        self.width = width;
        self.height = height;
    }

    /// 1x1 opaque white, bound to units a program samples but nobody filled.
    pub(super) fn white(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let mut tex = Self::new(device);
        tex.allocate(device, 1, 1);
        if let Some(texture) = &tex.texture {
            write_pixels(queue, texture, 1, 1, &[255, 255, 255, 255]);
        }
        tex
    }
}

pub(super) fn write_pixels(queue: &wgpu::Queue, texture: &wgpu::Texture, width: u32, height: u32, pixels: &[u8]) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
}

/// Applies the upload options of `tex_image_2d` on the CPU.
pub(super) fn prepare_pixels(image: &TexImage<'_>, pixels: &[u8]) -> Vec<u8> {
    let row = image.width as usize * 4;
    let mut out = pixels[..row * image.height as usize].to_vec();

    if image.premultiply_alpha {
        for px in out.chunks_exact_mut(4) {
            let a = px[3] as u32;
            for c in &mut px[..3] {
                *c = ((*c as u32 * a + 127) / 255) as u8;
            }
        }
    }

    if image.flip_y {
        let rows: Vec<Vec<u8>> = out.chunks_exact(row).rev().map(<[u8]>::to_vec).collect();
        out = rows.concat();
    }

    out
}

pub(super) struct BufferObject {
    pub(super) buffer: Option<wgpu::Buffer>,
    pub(super) size: u64,
}

impl BufferObject {
    pub(super) fn allocate(&mut self, device: &wgpu::Device, data: BufferData<'_>) {
        // wgpu copies in 4-byte units.
        let size = align4(data.len().max(4) as u64);
        let usage = wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST;

        let buffer = match data {
            BufferData::Bytes(bytes) => {
                let mut contents = bytes.to_vec();
                contents.resize(size as usize, 0);
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("lumen buffer"),
                    contents: &contents,
                    usage,
                })
            }
            BufferData::Size(_) => device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lumen buffer"),
                size,
                usage,
                mapped_at_creation: false,
            }),
        };

        self.buffer = Some(buffer);
        self.size = size;
    }
}

pub(super) struct ProgramObject {
    pub(super) vertex: wgpu::ShaderModule,
    pub(super) fragment: wgpu::ShaderModule,
    pub(super) bind_group_layout: wgpu::BindGroupLayout,
    pub(super) pipeline_layout: wgpu::PipelineLayout,
    pub(super) interface: ProgramInterface,
    pub(super) uniforms: Option<wgpu::Buffer>,
}

impl ProgramObject {
    pub(super) fn new(device: &wgpu::Device, program: &LinkedProgram) -> Self {
        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lumen vertex shader"),
            source: wgpu::ShaderSource::Wgsl(program.vertex.source.as_str().into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lumen fragment shader"),
            source: wgpu::ShaderSource::Wgsl(program.fragment.source.as_str().into()),
        });

        let visibility = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let mut entries = Vec::new();
        if program.interface.uniforms {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: shader::UNIFORM_BINDING,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }
        for &unit in &program.interface.texture_units {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: shader::texture_binding(unit),
                visibility,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: shader::sampler_binding(unit),
                visibility,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen program bind group layout"),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen program layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        Self {
            vertex,
            fragment,
            bind_group_layout,
            pipeline_layout,
            interface: program.interface.clone(),
            uniforms: None,
        }
    }

    pub(super) fn write_uniforms(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &[u8]) {
        let size = align16(data.len() as u64);
        let fits = self.uniforms.as_ref().is_some_and(|b| b.size() >= size);
        if !fits {
            self.uniforms = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lumen uniform block"),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        if let Some(buffer) = &self.uniforms {
            let mut padded = data.to_vec();
            padded.resize(align4(data.len() as u64) as usize, 0);
            queue.write_buffer(buffer, 0, &padded);
        }
    }
}

#[derive(Default)]
pub(super) struct FramebufferObject {
    pub(super) color: Option<TextureId>,
    pub(super) depth_stencil: Option<RenderbufferId>,
}

#[derive(Default)]
pub(super) struct RenderbufferObject {
    pub(super) view: Option<wgpu::TextureView>,
    pub(super) width: u32,
    pub(super) height: u32,
}

impl RenderbufferObject {
    pub(super) fn allocate(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen depth-stencil"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        self.view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.width = width;
        self.height = height;
    }
}

/// Every named object of one context generation.
#[derive(Default)]
pub(super) struct Objects {
    next_name: u32,
    pub(super) textures: HashMap<TextureId, TextureObject>,
    pub(super) buffers: HashMap<BufferId, BufferObject>,
    pub(super) programs: HashMap<ProgramId, ProgramObject>,
    pub(super) framebuffers: HashMap<FramebufferId, FramebufferObject>,
    pub(super) renderbuffers: HashMap<RenderbufferId, RenderbufferObject>,
}

impl Objects {
    pub(super) fn name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }
}

#[inline]
pub(super) fn align4(n: u64) -> u64 {
    n.div_ceil(4) * 4
}

#[inline]
fn align16(n: u64) -> u64 {
    n.max(16).div_ceil(16) * 16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32, premultiply_alpha: bool, flip_y: bool) -> TexImage<'static> {
        TexImage {
            mip_level: 0,
            format: PixelFormat::Rgba8,
            width,
            height,
            pixels: None,
            premultiply_alpha,
            flip_y,
        }
    }

    #[test]
    fn premultiplies_on_upload() {
        let out = prepare_pixels(&image(1, 1, true, false), &[255, 128, 0, 128]);
        assert_eq!(out, vec![128, 64, 0, 128]);
    }

    #[test]
    fn flips_rows() {
        let pixels = [1, 1, 1, 1, 2, 2, 2, 2];
        let out = prepare_pixels(&image(1, 2, false, true), &pixels);
        assert_eq!(out, vec![2, 2, 2, 2, 1, 1, 1, 1]);
    }

    #[test]
    fn alignment_helpers() {
        assert_eq!(align4(6), 8);
        assert_eq!(align16(1), 16);
        assert_eq!(align16(20), 32);
    }
}
