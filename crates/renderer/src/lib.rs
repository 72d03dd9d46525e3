//! Renderer crate root.
//!
//! Internal architecture overview:
//! - `device`: capability traits a GPU backend and a view surface implement.
//! - `backend_context`: `BackendDrawContext` construction and layer provisioning.
//! - `layer_registry`: per-layer binding state and the encode check-out.
//! - `draw_submit`: the per-frame draw-flush-and-submit operation.
//! - `geometry`: CPU expansion of stroke polylines into triangle quads.
//! - `wgpu_backend`: the `wgpu` implementation of the device traits.

pub mod backend_context;
pub mod device;
pub mod draw_submit;
pub mod geometry;
pub mod layer_registry;
pub mod wgpu_backend;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use backend_context::{
    BackendDrawContext, BackendInitError, LayerProvisionFailure, ProvisionError,
};
pub use device::{
    CommandQueue, DeviceError, GraphicsDevice, LayerSurface, PipelineError, SurfaceError,
};
pub use draw_submit::DrawSubmitError;
pub use layer_registry::{LayerPhase, LayerRegistry, LayerState, LayerStatus};
pub use wgpu_backend::{
    TextureLayerSurface, WgpuDevice, WgpuDrawable, WgpuLayerSurface, WgpuQueue,
    WindowLayerSurface,
};

#[cfg(test)]
mod tests;
