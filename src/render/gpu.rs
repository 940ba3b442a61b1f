//! wgpu implementation of [`GpuBackend`].
//!
//! One command encoder records the whole frame. Every clear, draw and
//! downsample opens its own render pass on it, and each draw gets a fresh
//! uniform buffer and bind group. Sprite batches are staged in their own
//! buffer and copied into the shared sprite vertex buffer inside the
//! encoder, so batches drawn later in the frame never overwrite earlier ones.

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::*;
use winit::window::Window;

use crate::render::backend::{
    BlendMode, DepthMode, DrawCall, Geometry, GpuBackend, RenderError, TextureRef,
};
use crate::render::effect::{EffectDesc, EffectId, GeometryKind, ProgramPass, TextureKind};
use crate::render::mesh::{sprite_indices, sprite_vertices, MeshData, MeshHandle, MeshVertex, SpriteVertex};
use crate::render::shader::{compile_shader, DOWNSAMPLE};
use crate::render::surfaces::{SurfaceFormat, SurfaceId, SurfacePlan, Target};
use crate::render::texture::{TextureData, TextureHandle};

const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
const LINEAR_DEPTH_FORMAT: TextureFormat = TextureFormat::R32Float;
const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth24Plus;
const OFFSCREEN_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
const ASSET_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

const MESH_ATTRIBUTES: [VertexAttribute; 2] = vertex_attr_array![0 => Float32x3, 1 => Float32x3];
const SPRITE_ATTRIBUTES: [VertexAttribute; 3] =
    vertex_attr_array![0 => Float32x3, 1 => Float32, 2 => Float32x2];

const MESH_BUFFERS: [VertexBufferLayout<'static>; 1] = [VertexBufferLayout {
    array_stride: std::mem::size_of::<MeshVertex>() as BufferAddress,
    step_mode: VertexStepMode::Vertex,
    attributes: &MESH_ATTRIBUTES,
}];

const SPRITE_BUFFERS: [VertexBufferLayout<'static>; 1] = [VertexBufferLayout {
    array_stride: std::mem::size_of::<SpriteVertex>() as BufferAddress,
    step_mode: VertexStepMode::Vertex,
    attributes: &SPRITE_ATTRIBUTES,
}];

/// Where the composite ends up
enum Output {
    Window {
        surface: Surface<'static>,
        config: SurfaceConfiguration,
    },
    Offscreen {
        texture: Texture,
        width: u32,
        height: u32,
    },
}

/// A render surface with one view per mip level
struct GpuSurface {
    _texture: Texture,
    format: TextureFormat,
    full: TextureView,
    mips: Vec<TextureView>,
}

struct GpuTexture {
    _texture: Texture,
    view: TextureView,
}

struct GpuMesh {
    vertices: Buffer,
    indices: Buffer,
    count: u32,
}

struct EffectProgram {
    module: ShaderModule,
    bind_group_layout: BindGroupLayout,
    pipeline_layout: PipelineLayout,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    effect: EffectId,
    pass: usize,
    formats: Vec<TextureFormat>,
    depth: DepthMode,
    blend: BlendMode,
}

struct Downsampler {
    module: ShaderModule,
    bind_group_layout: BindGroupLayout,
    pipeline_layout: PipelineLayout,
    pipelines: HashMap<TextureFormat, RenderPipeline>,
}

/// Work recorded for the frame in progress
struct FrameState {
    encoder: CommandEncoder,
    surface_texture: Option<SurfaceTexture>,
    present_view: TextureView,
}

/// GPU backend drawing to a window or to an offscreen image
pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    output: Output,
    clamp_sampler: Sampler,
    repeat_sampler: Sampler,
    programs: HashMap<EffectId, EffectProgram>,
    pipelines: HashMap<PipelineKey, RenderPipeline>,
    downsampler: Downsampler,
    surfaces: HashMap<SurfaceId, GpuSurface>,
    meshes: Vec<GpuMesh>,
    textures: Vec<GpuTexture>,
    placeholders: HashMap<TextureKind, GpuTexture>,
    sprite_capacity: usize,
    sprite_vertices: Buffer,
    sprite_indices: Buffer,
    frame: Option<FrameState>,
}

impl WgpuBackend {
    /// Create a backend presenting to `window`
    pub fn new(window: Arc<Window>, vsync: bool, sprite_capacity: usize) -> Result<Self, RenderError> {
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });
        let size = window.inner_size();
        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::Surface(e.to_string()))?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface))?;

        let caps = surface.get_capabilities(&adapter);
        // The composite already outputs display-referred colour
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| RenderError::Surface("surface reports no formats".into()))?;
        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if vsync { PresentMode::AutoVsync } else { PresentMode::AutoNoVsync },
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        tracing::info!(?format, width = config.width, height = config.height, vsync, "window surface configured");

        Ok(Self::assemble(device, queue, Output::Window { surface, config }, sprite_capacity))
    }

    /// Create a backend rendering into an offscreen image that can be read
    /// back with [`WgpuBackend::read_frame`]
    pub fn headless(width: u32, height: u32, sprite_capacity: usize) -> Result<Self, RenderError> {
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });
        let (_, device, queue) = request_device(&instance, None)?;
        let (width, height) = (width.max(1), height.max(1));
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("offscreen present"),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        tracing::info!(width, height, "offscreen target created");

        Ok(Self::assemble(
            device,
            queue,
            Output::Offscreen { texture, width, height },
            sprite_capacity,
        ))
    }

    fn assemble(device: Device, queue: Queue, output: Output, sprite_capacity: usize) -> Self {
        let sampler = |label, mode| {
            device.create_sampler(&SamplerDescriptor {
                label: Some(label),
                address_mode_u: mode,
                address_mode_v: mode,
                address_mode_w: mode,
                mag_filter: FilterMode::Linear,
                min_filter: FilterMode::Linear,
                mipmap_filter: FilterMode::Linear,
                ..Default::default()
            })
        };
        let clamp_sampler = sampler("clamp sampler", AddressMode::ClampToEdge);
        let repeat_sampler = sampler("repeat sampler", AddressMode::Repeat);

        let programs = EffectId::ALL
            .iter()
            .map(|&id| (id, create_program(&device, id.desc())))
            .collect();
        let downsampler = create_downsampler(&device);

        let placeholders = [TextureKind::D2, TextureKind::Cube, TextureKind::D3, TextureKind::Depth]
            .into_iter()
            .map(|kind| (kind, create_placeholder(&device, &queue, kind)))
            .collect();

        let sprite_capacity = sprite_capacity.max(1);
        let sprite_vertices = device.create_buffer(&BufferDescriptor {
            label: Some("sprite vertices"),
            size: (sprite_capacity * 4 * std::mem::size_of::<SpriteVertex>()) as u64,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sprite_indices = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("sprite indices"),
            contents: bytemuck::cast_slice(&sprite_indices(sprite_capacity)),
            usage: BufferUsages::INDEX,
        });

        Self {
            device,
            queue,
            output,
            clamp_sampler,
            repeat_sampler,
            programs,
            pipelines: HashMap::new(),
            downsampler,
            surfaces: HashMap::new(),
            meshes: Vec::new(),
            textures: Vec::new(),
            placeholders,
            sprite_capacity,
            sprite_vertices,
            sprite_indices,
            frame: None,
        }
    }

    /// Size of the presentation target
    pub fn output_size(&self) -> (u32, u32) {
        match &self.output {
            Output::Window { config, .. } => (config.width, config.height),
            Output::Offscreen { width, height, .. } => (*width, *height),
        }
    }

    fn present_format(&self) -> TextureFormat {
        match &self.output {
            Output::Window { config, .. } => config.format,
            Output::Offscreen { .. } => OFFSCREEN_FORMAT,
        }
    }

    /// Reconfigure the window surface. Render surfaces are reallocated
    /// separately through [`Renderer::resize`](crate::render::Renderer::resize).
    pub fn resize(&mut self, width: u32, height: u32) {
        if let Output::Window { surface, config } = &mut self.output {
            if width > 0 && height > 0 {
                config.width = width;
                config.height = height;
                surface.configure(&self.device, config);
            }
        }
    }

    /// Copy the last submitted offscreen frame back to the CPU
    pub fn read_frame(&self) -> Result<image::RgbaImage, RenderError> {
        let Output::Offscreen { texture, width, height } = &self.output else {
            return Err(RenderError::Readback("window output cannot be read back".into()));
        };
        let (width, height) = (*width, *height);
        let unpadded = width * 4;
        let padded = unpadded.div_ceil(COPY_BYTES_PER_ROW_ALIGNMENT) * COPY_BYTES_PER_ROW_ALIGNMENT;

        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some("readback"),
            size: padded as u64 * height as u64,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            ImageCopyBuffer {
                buffer: &buffer,
                layout: ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = crossbeam::channel::bounded(1);
        slice.map_async(MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(Maintain::Wait);
        rx.recv()
            .map_err(|e| RenderError::Readback(e.to_string()))?
            .map_err(|e| RenderError::Readback(e.to_string()))?;

        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded as usize) {
                pixels.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        buffer.unmap();

        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RenderError::Readback("pixel buffer size mismatch".into()))
    }

    fn surface(&self, id: SurfaceId) -> Result<&GpuSurface, RenderError> {
        self.surfaces.get(&id).ok_or(RenderError::UnknownSurface(id))
    }

    fn target_format(&self, target: &Target) -> Result<TextureFormat, RenderError> {
        match target.surface {
            SurfaceId::Present => Ok(self.present_format()),
            id => Ok(self.surface(id)?.format),
        }
    }

    fn target_view<'a>(&'a self, target: &Target, present: &'a TextureView) -> Result<&'a TextureView, RenderError> {
        if target.surface == SurfaceId::Present {
            return Ok(present);
        }
        self.surface(target.surface)?
            .mips
            .get(target.mip as usize)
            .ok_or_else(|| {
                RenderError::InvalidResource(format!("{} has no mip {}", target.surface.label(), target.mip))
            })
    }

    fn texture_view(&self, texture: &TextureRef) -> Result<&TextureView, RenderError> {
        match *texture {
            TextureRef::Surface(id) => Ok(&self.surface(id)?.full),
            TextureRef::SurfaceMip(id, mip) => self
                .surface(id)?
                .mips
                .get(mip as usize)
                .ok_or_else(|| RenderError::InvalidResource(format!("{} has no mip {}", id.label(), mip))),
            TextureRef::Asset(TextureHandle(i)) => self
                .textures
                .get(i)
                .map(|t| &t.view)
                .ok_or_else(|| RenderError::InvalidResource(format!("unknown texture {}", i))),
        }
    }

    fn depth_view(&self) -> Result<&TextureView, RenderError> {
        Ok(&self.surface(SurfaceId::DepthStencil)?.full)
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey, desc: &EffectDesc, pass: &ProgramPass) -> Result<(), RenderError> {
        if self.pipelines.contains_key(key) {
            return Ok(());
        }
        let program = self
            .programs
            .get(&key.effect)
            .ok_or_else(|| RenderError::InvalidResource(format!("no program for {}", desc.label)))?;

        let buffers: &[VertexBufferLayout] = match desc.geometry {
            GeometryKind::Mesh => &MESH_BUFFERS,
            GeometryKind::Sprite => &SPRITE_BUFFERS,
            GeometryKind::Fullscreen => &[],
        };
        let targets: Vec<Option<ColorTargetState>> = key
            .formats
            .iter()
            .map(|&format| Some(color_target(format, key.blend)))
            .collect();
        // Meshes are wound clockwise when seen from the front
        let primitive = match desc.geometry {
            GeometryKind::Mesh => PrimitiveState {
                front_face: FrontFace::Cw,
                cull_mode: Some(Face::Back),
                ..Default::default()
            },
            _ => PrimitiveState::default(),
        };
        let depth_stencil = match key.depth {
            DepthMode::Disabled => None,
            mode => Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: mode == DepthMode::TestWrite,
                depth_compare: CompareFunction::LessEqual,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
        };

        let pipeline = self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&program.pipeline_layout),
            vertex: VertexState {
                module: &program.module,
                entry_point: pass.vertex,
                buffers,
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &program.module,
                entry_point: pass.fragment,
                targets: &targets,
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive,
            depth_stencil,
            multisample: MultisampleState::default(),
            multiview: None,
        });
        tracing::debug!(effect = desc.label, pass = key.pass, ?key.blend, ?key.depth, "pipeline created");
        self.pipelines.insert(key.clone(), pipeline);
        Ok(())
    }

    fn bind_group(&self, desc: &EffectDesc, call: &DrawCall<'_>, uniforms: &Buffer) -> Result<BindGroup, RenderError> {
        for (name, _) in call.textures {
            if desc.texture_binding(name).is_none() {
                return Err(RenderError::UnknownTexture {
                    effect: desc.label,
                    name,
                });
            }
        }
        let program = self
            .programs
            .get(&desc.id)
            .ok_or_else(|| RenderError::InvalidResource(format!("no program for {}", desc.label)))?;

        let mut views = Vec::with_capacity(desc.textures.len());
        for (name, kind) in desc.textures {
            let view = match call.textures.iter().find(|(n, _)| n == name) {
                Some((_, texture)) => self.texture_view(texture)?,
                None => self
                    .placeholders
                    .get(kind)
                    .map(|t| &t.view)
                    .ok_or_else(|| RenderError::InvalidResource(format!("no placeholder for {:?}", kind)))?,
            };
            views.push(view);
        }

        let mut entries = vec![
            BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(&self.clamp_sampler),
            },
            BindGroupEntry {
                binding: 2,
                resource: BindingResource::Sampler(&self.repeat_sampler),
            },
        ];
        entries.extend(views.into_iter().enumerate().map(|(i, view)| BindGroupEntry {
            binding: i as u32 + 3,
            resource: BindingResource::TextureView(view),
        }));

        Ok(self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(desc.label),
            layout: &program.bind_group_layout,
            entries: &entries,
        }))
    }

    fn encode_draw(&self, frame: &mut FrameState, key: &PipelineKey, call: &DrawCall<'_>, bind_group: &BindGroup) -> Result<(), RenderError> {
        let pipeline = self
            .pipelines
            .get(key)
            .ok_or_else(|| RenderError::InvalidResource("pipeline missing".into()))?;
        let FrameState {
            encoder, present_view, ..
        } = frame;

        let staging = match call.geometry {
            Geometry::Sprites(batch) => {
                if batch.len() > self.sprite_capacity {
                    return Err(RenderError::SpriteOverflow {
                        count: batch.len(),
                        capacity: self.sprite_capacity,
                    });
                }
                let vertices = sprite_vertices(batch);
                let staging = self.device.create_buffer_init(&BufferInitDescriptor {
                    label: Some("sprite staging"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: BufferUsages::COPY_SRC,
                });
                let size = (vertices.len() * std::mem::size_of::<SpriteVertex>()) as u64;
                encoder.copy_buffer_to_buffer(&staging, 0, &self.sprite_vertices, 0, size);
                Some((staging, size, batch.len() as u32))
            }
            _ => None,
        };
        let mesh = match call.geometry {
            Geometry::Mesh(MeshHandle(i)) => Some(
                self.meshes
                    .get(i)
                    .ok_or_else(|| RenderError::InvalidResource(format!("unknown mesh {}", i)))?,
            ),
            _ => None,
        };

        let views = call
            .targets
            .iter()
            .map(|t| self.target_view(t, present_view))
            .collect::<Result<Vec<_>, _>>()?;
        let color_attachments: Vec<Option<RenderPassColorAttachment>> = views
            .into_iter()
            .map(|view| {
                Some(RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Load,
                        store: StoreOp::Store,
                    },
                })
            })
            .collect();
        let depth_stencil_attachment = match call.depth {
            DepthMode::Disabled => None,
            _ => Some(RenderPassDepthStencilAttachment {
                view: self.depth_view()?,
                depth_ops: Some(Operations {
                    load: LoadOp::Load,
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
        };

        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some(call.effect.desc().label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        if let Some(vp) = call.viewport {
            pass.set_viewport(vp.x as f32, vp.y as f32, vp.width as f32, vp.height as f32, 0.0, 1.0);
        }

        match (call.geometry, mesh, &staging) {
            (Geometry::Fullscreen, _, _) => pass.draw(0..3, 0..1),
            (Geometry::Mesh(_), Some(mesh), _) => {
                pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                pass.set_index_buffer(mesh.indices.slice(..), IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.count, 0, 0..1);
            }
            (Geometry::Sprites(_), _, Some((_, size, count))) => {
                pass.set_vertex_buffer(0, self.sprite_vertices.slice(..*size));
                pass.set_index_buffer(self.sprite_indices.slice(..), IndexFormat::Uint32);
                pass.draw_indexed(0..count * 6, 0, 0..1);
            }
            _ => {}
        }
        Ok(())
    }

    fn with_frame<T>(&mut self, f: impl FnOnce(&Self, &mut FrameState) -> Result<T, RenderError>) -> Result<T, RenderError> {
        let mut frame = self.frame.take().ok_or(RenderError::NoFrame)?;
        let result = f(self, &mut frame);
        self.frame = Some(frame);
        result
    }

    fn acquire(&mut self) -> Result<(Option<SurfaceTexture>, TextureView), RenderError> {
        match &self.output {
            Output::Window { surface, config } => {
                let texture = match surface.get_current_texture() {
                    Ok(texture) => texture,
                    Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                        tracing::warn!("surface lost, reconfiguring");
                        surface.configure(&self.device, config);
                        surface
                            .get_current_texture()
                            .map_err(|e| RenderError::Surface(e.to_string()))?
                    }
                    Err(e) => return Err(RenderError::Surface(e.to_string())),
                };
                let view = texture.texture.create_view(&TextureViewDescriptor::default());
                Ok((Some(texture), view))
            }
            Output::Offscreen { texture, .. } => Ok((None, texture.create_view(&TextureViewDescriptor::default()))),
        }
    }
}

impl GpuBackend for WgpuBackend {
    fn create_surfaces(&mut self, plan: &SurfacePlan) -> Result<(), RenderError> {
        for desc in plan.surfaces() {
            let (format, usage) = match desc.format {
                SurfaceFormat::Hdr => (HDR_FORMAT, TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING),
                SurfaceFormat::Depth => (
                    LINEAR_DEPTH_FORMAT,
                    TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
                ),
                SurfaceFormat::DepthStencil => (DEPTH_FORMAT, TextureUsages::RENDER_ATTACHMENT),
                SurfaceFormat::Present => (self.present_format(), TextureUsages::RENDER_ATTACHMENT),
            };
            let texture = self.device.create_texture(&TextureDescriptor {
                label: Some(desc.id.label()),
                size: Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: desc.mip_levels,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            });
            let full = texture.create_view(&TextureViewDescriptor::default());
            let mips = (0..desc.mip_levels)
                .map(|level| {
                    texture.create_view(&TextureViewDescriptor {
                        label: Some(desc.id.label()),
                        base_mip_level: level,
                        mip_level_count: Some(1),
                        ..Default::default()
                    })
                })
                .collect();
            self.surfaces.insert(
                desc.id,
                GpuSurface {
                    _texture: texture,
                    format,
                    full,
                    mips,
                },
            );
        }
        tracing::info!(
            surfaces = self.surfaces.len(),
            width = plan.viewport().width,
            height = plan.viewport().height,
            "render surfaces allocated"
        );
        Ok(())
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, RenderError> {
        mesh.validate().map_err(RenderError::InvalidResource)?;
        let vertices = self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("mesh vertices"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: BufferUsages::VERTEX,
        });
        let indices = self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("mesh indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: BufferUsages::INDEX,
        });
        self.meshes.push(GpuMesh {
            vertices,
            indices,
            count: mesh.indices.len() as u32,
        });
        Ok(MeshHandle(self.meshes.len() - 1))
    }

    fn upload_texture(&mut self, texture: &TextureData) -> Result<TextureHandle, RenderError> {
        if !texture.is_valid() {
            return Err(RenderError::InvalidResource(format!(
                "{:?} texture {}x{}x{} with {} bytes",
                texture.kind,
                texture.width,
                texture.height,
                texture.layers,
                texture.rgba.len()
            )));
        }
        self.textures.push(create_texture(&self.device, &self.queue, texture));
        Ok(TextureHandle(self.textures.len() - 1))
    }

    fn sprite_capacity(&self) -> usize {
        self.sprite_capacity
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        let (surface_texture, present_view) = self.acquire()?;
        let encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("frame encoder"),
        });
        self.frame = Some(FrameState {
            encoder,
            surface_texture,
            present_view,
        });
        Ok(())
    }

    fn clear(&mut self, targets: &[Target], color: [f32; 4], depth: Option<f32>) -> Result<(), RenderError> {
        self.with_frame(|this, frame| {
            let FrameState {
                encoder, present_view, ..
            } = frame;
            let clear = Color {
                r: color[0] as f64,
                g: color[1] as f64,
                b: color[2] as f64,
                a: color[3] as f64,
            };
            let color_attachments = targets
                .iter()
                .map(|t| {
                    this.target_view(t, present_view).map(|view| {
                        Some(RenderPassColorAttachment {
                            view,
                            resolve_target: None,
                            ops: Operations {
                                load: LoadOp::Clear(clear),
                                store: StoreOp::Store,
                            },
                        })
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let depth_stencil_attachment = match depth {
                Some(value) => Some(RenderPassDepthStencilAttachment {
                    view: this.depth_view()?,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(value),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                None => None,
            };
            let _pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("clear"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            Ok(())
        })
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), RenderError> {
        if self.frame.is_none() {
            return Err(RenderError::NoFrame);
        }
        let desc = call.effect.desc();
        let pass = desc.passes.get(call.pass).ok_or(RenderError::UnknownPass {
            effect: desc.label,
            pass: call.pass,
        })?;
        if pass.targets != call.targets.len() {
            return Err(RenderError::InvalidResource(format!(
                "{} pass {} writes {} targets, {} bound",
                desc.label,
                call.pass,
                pass.targets,
                call.targets.len()
            )));
        }
        let geometry_ok = matches!(
            (call.geometry, desc.geometry),
            (Geometry::Fullscreen, GeometryKind::Fullscreen)
                | (Geometry::Mesh(_), GeometryKind::Mesh)
                | (Geometry::Sprites(_), GeometryKind::Sprite)
        );
        if !geometry_ok {
            return Err(RenderError::InvalidResource(format!("{} drawn with the wrong geometry", desc.label)));
        }
        if matches!(call.geometry, Geometry::Sprites(batch) if batch.is_empty()) {
            return Ok(());
        }

        let key = PipelineKey {
            effect: call.effect,
            pass: call.pass,
            formats: call
                .targets
                .iter()
                .map(|t| self.target_format(t))
                .collect::<Result<_, _>>()?,
            depth: call.depth,
            blend: call.blend,
        };
        self.ensure_pipeline(&key, desc, pass)?;

        let uniforms = self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some(desc.label),
            contents: bytemuck::cast_slice(&call.params.pack()?),
            usage: BufferUsages::UNIFORM,
        });
        let bind_group = self.bind_group(desc, call, &uniforms)?;
        self.with_frame(|this, frame| this.encode_draw(frame, &key, call, &bind_group))
    }

    fn downsample(&mut self, surface: SurfaceId, level: u32) -> Result<(), RenderError> {
        let format = self.surface(surface)?.format;
        if !self.downsampler.pipelines.contains_key(&format) {
            let pipeline = create_downsample_pipeline(&self.device, &self.downsampler, format);
            self.downsampler.pipelines.insert(format, pipeline);
        }

        self.with_frame(|this, frame| {
            let gpu = this.surface(surface)?;
            let missing = |mip: u32| RenderError::InvalidResource(format!("{} has no mip {}", surface.label(), mip));
            let source = gpu.mips.get(level as usize).ok_or_else(|| missing(level))?;
            let target = gpu.mips.get(level as usize + 1).ok_or_else(|| missing(level + 1))?;
            let pipeline = this
                .downsampler
                .pipelines
                .get(&gpu.format)
                .ok_or_else(|| RenderError::InvalidResource("downsample pipeline missing".into()))?;
            let bind_group = this.device.create_bind_group(&BindGroupDescriptor {
                label: Some("downsample"),
                layout: &this.downsampler.bind_group_layout,
                entries: &[
                    BindGroupEntry {
                        binding: 0,
                        resource: BindingResource::TextureView(source),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: BindingResource::Sampler(&this.clamp_sampler),
                    },
                ],
            });

            let mut pass = frame.encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("downsample"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Load,
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
            Ok(())
        })
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let frame = self.frame.take().ok_or(RenderError::NoFrame)?;
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        if let Some(texture) = frame.surface_texture {
            texture.present();
        }
        Ok(())
    }
}

fn request_device(instance: &Instance, surface: Option<&Surface<'_>>) -> Result<(Adapter, Device, Queue), RenderError> {
    let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
        power_preference: PowerPreference::HighPerformance,
        compatible_surface: surface,
        force_fallback_adapter: false,
    }))
    .ok_or(RenderError::NoAdapter)?;
    let info = adapter.get_info();
    tracing::info!(adapter = %info.name, backend = ?info.backend, "GPU adapter selected");

    let (device, queue) = pollster::block_on(adapter.request_device(
        &DeviceDescriptor {
            label: Some("vlee device"),
            required_features: Features::empty(),
            required_limits: Limits::default(),
        },
        None,
    ))
    .map_err(|e| RenderError::Wgpu(e.to_string()))?;
    Ok((adapter, device, queue))
}

fn color_target(format: TextureFormat, blend: BlendMode) -> ColorTargetState {
    // Float32 targets cannot blend; blended draws leave them untouched
    let blendable = format != LINEAR_DEPTH_FORMAT;
    let (blend, write_mask) = match (blend, blendable) {
        (BlendMode::Opaque, _) => (None, ColorWrites::ALL),
        (_, false) => (None, ColorWrites::empty()),
        (BlendMode::Premultiplied, true) => (Some(BlendState::PREMULTIPLIED_ALPHA_BLENDING), ColorWrites::ALL),
    };
    ColorTargetState {
        format,
        blend,
        write_mask,
    }
}

fn texture_binding_type(kind: TextureKind) -> BindingType {
    let (view_dimension, filterable) = match kind {
        TextureKind::D2 => (TextureViewDimension::D2, true),
        TextureKind::Cube => (TextureViewDimension::Cube, true),
        TextureKind::D3 => (TextureViewDimension::D3, true),
        TextureKind::Depth => (TextureViewDimension::D2, false),
    };
    BindingType::Texture {
        multisampled: false,
        view_dimension,
        sample_type: TextureSampleType::Float { filterable },
    }
}

fn create_program(device: &Device, desc: &EffectDesc) -> EffectProgram {
    let module = compile_shader(device, desc.label, desc.source);

    let mut entries = vec![
        BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::VERTEX_FRAGMENT,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
        BindGroupLayoutEntry {
            binding: 1,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Sampler(SamplerBindingType::Filtering),
            count: None,
        },
        BindGroupLayoutEntry {
            binding: 2,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Sampler(SamplerBindingType::Filtering),
            count: None,
        },
    ];
    entries.extend(desc.textures.iter().enumerate().map(|(i, &(_, kind))| BindGroupLayoutEntry {
        binding: i as u32 + 3,
        visibility: ShaderStages::FRAGMENT,
        ty: texture_binding_type(kind),
        count: None,
    }));

    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some(desc.label),
        entries: &entries,
    });
    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some(desc.label),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });
    EffectProgram {
        module,
        bind_group_layout,
        pipeline_layout,
    }
}

fn create_downsampler(device: &Device) -> Downsampler {
    let module = compile_shader(device, "downsample", DOWNSAMPLE);
    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("downsample"),
        entries: &[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::FRAGMENT,
                ty: texture_binding_type(TextureKind::D2),
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });
    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("downsample"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });
    Downsampler {
        module,
        bind_group_layout,
        pipeline_layout,
        pipelines: HashMap::new(),
    }
}

fn create_downsample_pipeline(device: &Device, downsampler: &Downsampler, format: TextureFormat) -> RenderPipeline {
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("downsample"),
        layout: Some(&downsampler.pipeline_layout),
        vertex: VertexState {
            module: &downsampler.module,
            entry_point: "vs_main",
            buffers: &[],
            compilation_options: PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: &downsampler.module,
            entry_point: "fs_main",
            targets: &[Some(color_target(format, BlendMode::Opaque))],
            compilation_options: PipelineCompilationOptions::default(),
        }),
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        multiview: None,
    })
}

fn create_texture(device: &Device, queue: &Queue, data: &TextureData) -> GpuTexture {
    let (dimension, view_dimension) = match data.kind {
        TextureKind::Cube => (TextureDimension::D2, TextureViewDimension::Cube),
        TextureKind::D3 => (TextureDimension::D3, TextureViewDimension::D3),
        TextureKind::D2 | TextureKind::Depth => (TextureDimension::D2, TextureViewDimension::D2),
    };
    let size = Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: data.layers,
    };
    let texture = device.create_texture(&TextureDescriptor {
        label: None,
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension,
        format: ASSET_FORMAT,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: Origin3d::ZERO,
            aspect: TextureAspect::All,
        },
        &data.rgba,
        ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * data.width),
            rows_per_image: Some(data.height),
        },
        size,
    );
    let view = texture.create_view(&TextureViewDescriptor {
        dimension: Some(view_dimension),
        ..Default::default()
    });
    GpuTexture {
        _texture: texture,
        view,
    }
}

fn create_placeholder(device: &Device, queue: &Queue, kind: TextureKind) -> GpuTexture {
    if kind != TextureKind::Depth {
        return create_texture(device, queue, &TextureData::solid(kind, [0, 0, 0, 0]));
    }
    let size = Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&TextureDescriptor {
        label: Some("depth placeholder"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: LINEAR_DEPTH_FORMAT,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: Origin3d::ZERO,
            aspect: TextureAspect::All,
        },
        bytemuck::bytes_of(&0.0f32),
        ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        size,
    );
    let view = texture.create_view(&TextureViewDescriptor::default());
    GpuTexture {
        _texture: texture,
        view,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_targets_never_blend() {
        let state = color_target(LINEAR_DEPTH_FORMAT, BlendMode::Premultiplied);
        assert!(state.blend.is_none());
        assert_eq!(state.write_mask, ColorWrites::empty());
        let opaque = color_target(LINEAR_DEPTH_FORMAT, BlendMode::Opaque);
        assert_eq!(opaque.write_mask, ColorWrites::ALL);
    }

    #[test]
    fn test_premultiplied_blend() {
        let state = color_target(HDR_FORMAT, BlendMode::Premultiplied);
        let blend = state.blend.unwrap();
        assert_eq!(blend.color.src_factor, BlendFactor::One);
        assert_eq!(blend.color.dst_factor, BlendFactor::OneMinusSrcAlpha);
    }

    #[test]
    fn test_sprite_layout_matches_vertex() {
        assert_eq!(std::mem::size_of::<SpriteVertex>(), 24);
        assert_eq!(SPRITE_ATTRIBUTES[1].offset, 12);
        assert_eq!(SPRITE_ATTRIBUTES[2].offset, 16);
    }
}
