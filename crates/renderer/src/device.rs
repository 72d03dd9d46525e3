//! Capability traits between the draw pipeline and a concrete GPU API.
//!
//! The pipeline never sees a concrete surface or device type. A view layer
//! adapts its surface to [`LayerSurface`]; a GPU backend implements
//! [`GraphicsDevice`] and [`CommandQueue`].

use canvas_protocol::{Layer, ViewInfo};
use canvas_runtime::RasterTarget;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("surface is outdated")]
    Outdated,
    #[error("surface was lost")]
    Lost,
    #[error("timed out acquiring a drawable")]
    Timeout,
    #[error("out of memory acquiring a drawable")]
    OutOfMemory,
    #[error("drawable acquisition failed: {0}")]
    Other(String),
}

impl SurfaceError {
    /// The surface must be re-provisioned before it can be drawn again.
    pub fn is_stale(&self) -> bool {
        matches!(self, SurfaceError::Outdated | SurfaceError::Lost)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device lost: {reason}")]
    Lost { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pipeline compilation failed: {reason}")]
pub struct PipelineError {
    pub reason: String,
}

/// What rasterization needs from a presentable surface.
pub trait LayerSurface {
    type Drawable;

    fn acquire_drawable(&mut self) -> Result<Self::Drawable, SurfaceError>;

    fn present(&mut self, drawable: Self::Drawable);
}

pub trait CommandQueue {
    type CommandBuffer;

    /// Submissions on one queue execute in submission order.
    fn submit(&self, command_buffer: Self::CommandBuffer) -> Result<(), DeviceError>;
}

pub trait GraphicsDevice {
    type Surface: LayerSurface;
    type Pipeline;
    /// Size-dependent per-surface state, rebuilt whenever a surface is bound.
    type SurfaceResources;
    type Encoder: RasterTarget;
    type CommandBuffer;
    type Queue: CommandQueue<CommandBuffer = Self::CommandBuffer>;

    fn compile_pipeline(
        &self,
        layer: Layer,
        surface: &Self::Surface,
    ) -> Result<Self::Pipeline, PipelineError>;

    /// Whether a cached pipeline can render into `surface`. Re-provisioning
    /// recompiles only when this returns false.
    fn pipeline_matches(&self, _pipeline: &Self::Pipeline, _surface: &Self::Surface) -> bool {
        true
    }

    fn create_surface_resources(
        &self,
        layer: Layer,
        pipeline: &Self::Pipeline,
        surface: &Self::Surface,
    ) -> Self::SurfaceResources;

    fn begin_encoding(
        &self,
        layer: Layer,
        resources: &mut Self::SurfaceResources,
        drawable: &<Self::Surface as LayerSurface>::Drawable,
        view: ViewInfo,
    ) -> Self::Encoder;

    fn finish_encoding(
        &self,
        pipeline: &Self::Pipeline,
        resources: &Self::SurfaceResources,
        encoder: Self::Encoder,
    ) -> Self::CommandBuffer;
}
