//! `wgpu` implementation of the device capability traits.
//!
//! Strokes are expanded to quads on the CPU (see `geometry`) and drawn with a
//! single alpha-blended triangle-list pipeline per layer. The per-surface
//! resource is the viewport uniform that maps view pixels to clip space.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use canvas_protocol::{Layer, PixelPoint, ViewInfo};
use canvas_runtime::{RasterTarget, StrokePaint};
use wgpu::util::DeviceExt;

use crate::device::{
    CommandQueue, DeviceError, GraphicsDevice, LayerSurface, PipelineError, SurfaceError,
};
use crate::geometry::{StrokeVertex, push_polyline_quads};

const STROKE_SHADER: &str = include_str!("stroke.wgsl");

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4];

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ViewportUniform {
    size: [f32; 2],
    _padding: [f32; 2],
}

impl ViewportUniform {
    fn new(width: u32, height: u32) -> Self {
        Self {
            size: [width.max(1) as f32, height.max(1) as f32],
            _padding: [0.0; 2],
        }
    }
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    lost: Arc<AtomicBool>,
}

pub struct WgpuQueue {
    queue: wgpu::Queue,
    lost: Arc<AtomicBool>,
}

impl WgpuDevice {
    /// Wraps a device/queue pair. The device-lost callback flips a flag that
    /// makes every later submission fail with `DeviceError::Lost`.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> (Self, WgpuQueue) {
        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            lost_flag.store(true, Ordering::Release);
            log::error!("[wgpu] device lost ({reason:?}): {message}");
        });
        let wgpu_queue = WgpuQueue {
            queue: queue.clone(),
            lost: Arc::clone(&lost),
        };
        (
            Self {
                device,
                queue,
                lost,
            },
            wgpu_queue,
        )
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }
}

impl CommandQueue for WgpuQueue {
    type CommandBuffer = wgpu::CommandBuffer;

    fn submit(&self, command_buffer: wgpu::CommandBuffer) -> Result<(), DeviceError> {
        if self.lost.load(Ordering::Acquire) {
            return Err(DeviceError::Lost {
                reason: "device lost before submission".to_owned(),
            });
        }
        self.queue.submit(Some(command_buffer));
        Ok(())
    }
}

/// Offscreen render target.
pub struct TextureLayerSurface {
    texture: wgpu::Texture,
}

impl TextureLayerSurface {
    pub fn new(texture: wgpu::Texture) -> Self {
        Self { texture }
    }

    pub fn create(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("canvas.layer_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Self { texture }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

/// A configured window surface.
pub struct WindowLayerSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl WindowLayerSurface {
    pub fn new(
        device: &wgpu::Device,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    ) -> Self {
        surface.configure(device, &config);
        Self { surface, config }
    }

    pub fn config(&self) -> &wgpu::SurfaceConfiguration {
        &self.config
    }
}

pub enum WgpuLayerSurface {
    Texture(TextureLayerSurface),
    Window(WindowLayerSurface),
}

impl WgpuLayerSurface {
    pub fn format(&self) -> wgpu::TextureFormat {
        match self {
            WgpuLayerSurface::Texture(surface) => surface.texture.format(),
            WgpuLayerSurface::Window(surface) => surface.config.format,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            WgpuLayerSurface::Texture(surface) => {
                (surface.texture.width(), surface.texture.height())
            }
            WgpuLayerSurface::Window(surface) => (surface.config.width, surface.config.height),
        }
    }
}

impl From<TextureLayerSurface> for WgpuLayerSurface {
    fn from(surface: TextureLayerSurface) -> Self {
        WgpuLayerSurface::Texture(surface)
    }
}

impl From<WindowLayerSurface> for WgpuLayerSurface {
    fn from(surface: WindowLayerSurface) -> Self {
        WgpuLayerSurface::Window(surface)
    }
}

pub enum WgpuDrawable {
    Texture(wgpu::Texture),
    Window(wgpu::SurfaceTexture),
}

impl WgpuDrawable {
    pub fn texture(&self) -> &wgpu::Texture {
        match self {
            WgpuDrawable::Texture(texture) => texture,
            WgpuDrawable::Window(frame) => &frame.texture,
        }
    }
}

fn map_surface_error(error: wgpu::SurfaceError) -> SurfaceError {
    match error {
        wgpu::SurfaceError::Outdated => SurfaceError::Outdated,
        wgpu::SurfaceError::Lost => SurfaceError::Lost,
        wgpu::SurfaceError::Timeout => SurfaceError::Timeout,
        wgpu::SurfaceError::OutOfMemory => SurfaceError::OutOfMemory,
        other => SurfaceError::Other(other.to_string()),
    }
}

impl LayerSurface for WgpuLayerSurface {
    type Drawable = WgpuDrawable;

    fn acquire_drawable(&mut self) -> Result<WgpuDrawable, SurfaceError> {
        match self {
            WgpuLayerSurface::Texture(surface) => Ok(WgpuDrawable::Texture(surface.texture.clone())),
            WgpuLayerSurface::Window(surface) => surface
                .surface
                .get_current_texture()
                .map(WgpuDrawable::Window)
                .map_err(map_surface_error),
        }
    }

    fn present(&mut self, drawable: WgpuDrawable) {
        if let WgpuDrawable::Window(frame) = drawable {
            frame.present();
        }
    }
}

pub struct WgpuLayerPipeline {
    pipeline: wgpu::RenderPipeline,
    viewport_layout: wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
}

impl WgpuLayerPipeline {
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }
}

pub struct WgpuSurfaceResources {
    viewport_buffer: wgpu::Buffer,
    viewport_bind_group: wgpu::BindGroup,
}

pub struct WgpuEncoder {
    layer: Layer,
    target_view: wgpu::TextureView,
    vertices: Vec<StrokeVertex>,
}

impl RasterTarget for WgpuEncoder {
    fn draw_polyline(&mut self, points: &[PixelPoint], paint: &StrokePaint) {
        push_polyline_quads(&mut self.vertices, points, paint);
    }
}

impl GraphicsDevice for WgpuDevice {
    type Surface = WgpuLayerSurface;
    type Pipeline = WgpuLayerPipeline;
    type SurfaceResources = WgpuSurfaceResources;
    type Encoder = WgpuEncoder;
    type CommandBuffer = wgpu::CommandBuffer;
    type Queue = WgpuQueue;

    fn compile_pipeline(
        &self,
        layer: Layer,
        surface: &WgpuLayerSurface,
    ) -> Result<WgpuLayerPipeline, PipelineError> {
        let format = surface.format();
        let error_scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("canvas.stroke_shader"),
                source: wgpu::ShaderSource::Wgsl(STROKE_SHADER.into()),
            });
        let viewport_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("canvas.viewport_layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("canvas.stroke_pipeline_layout"),
                bind_group_layouts: &[&viewport_layout],
                immediate_size: 0,
            });
        let label = format!("canvas.{layer}.stroke_pipeline");
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<StrokeVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &VERTEX_ATTRIBUTES,
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        if let Some(error) = pollster::block_on(error_scope.pop()) {
            return Err(PipelineError {
                reason: error.to_string(),
            });
        }
        Ok(WgpuLayerPipeline {
            pipeline,
            viewport_layout,
            format,
        })
    }

    fn pipeline_matches(&self, pipeline: &WgpuLayerPipeline, surface: &WgpuLayerSurface) -> bool {
        pipeline.format == surface.format()
    }

    fn create_surface_resources(
        &self,
        layer: Layer,
        pipeline: &WgpuLayerPipeline,
        surface: &WgpuLayerSurface,
    ) -> WgpuSurfaceResources {
        let (width, height) = surface.size();
        let viewport_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("canvas.{layer}.viewport")),
                contents: bytemuck::bytes_of(&ViewportUniform::new(width, height)),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let viewport_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("canvas.{layer}.viewport_bind_group")),
            layout: &pipeline.viewport_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_buffer.as_entire_binding(),
            }],
        });
        WgpuSurfaceResources {
            viewport_buffer,
            viewport_bind_group,
        }
    }

    fn begin_encoding(
        &self,
        layer: Layer,
        resources: &mut WgpuSurfaceResources,
        drawable: &WgpuDrawable,
        view: ViewInfo,
    ) -> WgpuEncoder {
        self.queue.write_buffer(
            &resources.viewport_buffer,
            0,
            bytemuck::bytes_of(&ViewportUniform::new(view.width_px, view.height_px)),
        );
        let target_view = drawable
            .texture()
            .create_view(&wgpu::TextureViewDescriptor::default());
        WgpuEncoder {
            layer,
            target_view,
            vertices: Vec::new(),
        }
    }

    fn finish_encoding(
        &self,
        pipeline: &WgpuLayerPipeline,
        resources: &WgpuSurfaceResources,
        encoder: WgpuEncoder,
    ) -> wgpu::CommandBuffer {
        let layer = encoder.layer;
        let mut command_encoder =
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some(&format!("canvas.{layer}.frame")),
                });
        let vertex_buffer = (!encoder.vertices.is_empty()).then(|| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("canvas.{layer}.vertices")),
                    contents: bytemuck::cast_slice(&encoder.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });
        {
            let mut pass = command_encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("canvas.stroke_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &encoder.target_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            if let Some(vertex_buffer) = &vertex_buffer {
                pass.set_pipeline(&pipeline.pipeline);
                pass.set_bind_group(0, &resources.viewport_bind_group, &[]);
                pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                pass.draw(0..encoder.vertices.len() as u32, 0..1);
            }
        }
        command_encoder.finish()
    }
}
