//! Boundary facade over the canvas crates.
//!
//! [`CanvasCore`] owns the canvas arena, the backend draw context and the
//! layer frame scheduler, and exposes the UI-facing operations by
//! [`CanvasHandle`]. [`render_thread::RenderThread`] drives
//! [`CanvasCore::draw_frame`] from a dedicated thread.

pub mod config;
pub mod error;
pub mod render_thread;

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use canvas_protocol::{CanvasHandle, ColorScheme, DrawResult, Layer, Pen, ViewInfo};
use canvas_runtime::{CanvasArena, CanvasRuntime, PenState, RasterStats, RasterTarget};
use frame_scheduler::{LayerFrameInput, LayerFrameScheduler, LayerUpdateReason};
use renderer::{BackendDrawContext, GraphicsDevice, LayerState, LayerStatus};
use stroke_input::StrokeId;

pub use config::{CanvasCoreConfig, ConfigError};
pub use error::CanvasCoreError;
pub use render_thread::{FrameTick, RenderThread};

/// Layers drawn by one [`CanvasCore::draw_frame`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub handle: CanvasHandle,
    pub frame_sequence_id: u64,
    /// One entry per layer the scheduler chose, in layer order.
    pub results: Vec<(DrawResult, LayerUpdateReason)>,
}

impl FrameReport {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|(result, _)| result.success)
    }

    pub fn failed_layers(&self) -> Vec<Layer> {
        self.results
            .iter()
            .filter(|(result, _)| !result.success)
            .map(|(result, _)| result.layer)
            .collect()
    }
}

struct FrameState {
    scheduler: LayerFrameScheduler,
    canvas: Option<CanvasHandle>,
    next_frame_sequence_id: u64,
}

pub struct CanvasCore<D: GraphicsDevice> {
    config: CanvasCoreConfig,
    arena: RwLock<CanvasArena>,
    backend: BackendDrawContext<D>,
    frame: Mutex<FrameState>,
}

impl<D: GraphicsDevice> CanvasCore<D> {
    pub fn new(
        config: CanvasCoreConfig,
        backend: BackendDrawContext<D>,
    ) -> Result<Self, CanvasCoreError> {
        config.validate()?;
        let pen = PenState::new(config.default_pen)?;
        Ok(Self {
            config,
            arena: RwLock::new(CanvasArena::new(pen)),
            backend,
            frame: Mutex::new(FrameState {
                scheduler: LayerFrameScheduler::new(config.scheduler),
                canvas: None,
                next_frame_sequence_id: 0,
            }),
        })
    }

    /// Builds the backend from optional device handles first, so a missing
    /// device or queue is reported before anything else is set up.
    pub fn init(
        config: CanvasCoreConfig,
        device: Option<D>,
        queue: Option<D::Queue>,
    ) -> Result<Self, CanvasCoreError> {
        let backend = BackendDrawContext::init(device, queue)?;
        Self::new(config, backend)
    }

    pub fn config(&self) -> &CanvasCoreConfig {
        &self.config
    }

    pub fn backend(&self) -> &BackendDrawContext<D> {
        &self.backend
    }

    fn read_arena(&self) -> RwLockReadGuard<'_, CanvasArena> {
        self.arena
            .read()
            .unwrap_or_else(|_| panic!("canvas arena lock poisoned"))
    }

    fn write_arena(&self) -> RwLockWriteGuard<'_, CanvasArena> {
        self.arena
            .write()
            .unwrap_or_else(|_| panic!("canvas arena lock poisoned"))
    }

    fn lock_frame(&self) -> MutexGuard<'_, FrameState> {
        self.frame
            .lock()
            .unwrap_or_else(|_| panic!("frame scheduler lock poisoned"))
    }

    pub fn init_canvas_runtime(&self) -> CanvasHandle {
        self.write_arena()
            .init_canvas_runtime_with_scheme(self.config.initial_color_scheme)
    }

    /// A second free of the same handle fails with a stale-handle error.
    pub fn free_canvas_runtime(&self, handle: CanvasHandle) -> Result<(), CanvasCoreError> {
        self.write_arena().free_canvas_runtime(handle)?;
        let mut frame = self.lock_frame();
        if frame.canvas == Some(handle) {
            frame.canvas = None;
            frame.scheduler.reset();
        }
        Ok(())
    }

    pub fn runtime(&self, handle: CanvasHandle) -> Result<Arc<CanvasRuntime>, CanvasCoreError> {
        Ok(self.read_arena().runtime(handle)?)
    }

    pub fn canvas_count(&self) -> usize {
        self.read_arena().len()
    }

    pub fn begin_stroke(&self, handle: CanvasHandle) -> Result<StrokeId, CanvasCoreError> {
        Ok(self.runtime(handle)?.begin_stroke()?)
    }

    pub fn record_stroke_point(
        &self,
        handle: CanvasHandle,
        width: f64,
        height: f64,
        x: f64,
        y: f64,
    ) -> Result<(), CanvasCoreError> {
        Ok(self
            .runtime(handle)?
            .record_stroke_point(width, height, x, y)?)
    }

    pub fn end_stroke(&self, handle: CanvasHandle) -> Result<StrokeId, CanvasCoreError> {
        Ok(self.runtime(handle)?.end_stroke()?)
    }

    /// Applies to strokes opened after this call on every canvas.
    pub fn set_active_pen(&self, pen: Pen) -> Result<(), CanvasCoreError> {
        Ok(self.read_arena().set_active_pen(pen)?)
    }

    pub fn active_pen(&self) -> Pen {
        self.read_arena().pen_state().current()
    }

    pub fn set_color_scheme(
        &self,
        handle: CanvasHandle,
        scheme: ColorScheme,
    ) -> Result<(), CanvasCoreError> {
        self.runtime(handle)?.set_color_scheme(scheme);
        Ok(())
    }

    /// Rasterizes the whole canvas into a caller-owned target.
    pub fn draw(
        &self,
        handle: CanvasHandle,
        width: f64,
        height: f64,
        target: Option<&mut dyn RasterTarget>,
    ) -> Result<RasterStats, CanvasCoreError> {
        Ok(self.runtime(handle)?.draw(width, height, target)?)
    }

    pub fn provision_layer(&self, layer: Layer, surface: D::Surface) -> Result<(), CanvasCoreError> {
        Ok(self.backend.provision_layer(layer, surface)?)
    }

    pub fn provision_all(
        &self,
        background: D::Surface,
        background_active: D::Surface,
        foreground: D::Surface,
        foreground_active: D::Surface,
    ) -> Result<(), CanvasCoreError> {
        Ok(self.backend.provision_all(
            background,
            background_active,
            foreground,
            foreground_active,
        )?)
    }

    pub fn reload_surface(&self, layer: Layer, surface: D::Surface) -> Result<(), CanvasCoreError> {
        Ok(self.backend.reload_surface(layer, surface)?)
    }

    pub fn invalidate_layer(&self, layer: Layer) -> bool {
        self.backend.invalidate_layer(layer)
    }

    pub fn layer_status(&self, layer: Layer) -> LayerStatus {
        self.backend.layer_status(layer)
    }

    pub fn draw_flush_and_submit(
        &self,
        handle: CanvasHandle,
        layer: Layer,
        view: ViewInfo,
    ) -> Result<DrawResult, CanvasCoreError> {
        let runtime = self.runtime(handle)?;
        Ok(self.backend.draw_flush_and_submit(&runtime, layer, view)?)
    }

    /// Draws the layers the scheduler picks for this frame.
    ///
    /// Per-layer failures do not fail the frame: they are logged, reported as
    /// `success: false` and the layer is retried on the next frame. Only a
    /// stale canvas handle is an error.
    pub fn draw_frame(
        &self,
        handle: CanvasHandle,
        view: ViewInfo,
    ) -> Result<FrameReport, CanvasCoreError> {
        let runtime = self.runtime(handle)?;
        let snapshot = runtime.snapshot();

        let mut frame = self.lock_frame();
        if frame.canvas != Some(handle) {
            frame.scheduler.reset();
            frame.canvas = Some(handle);
        }
        let frame_sequence_id = frame.next_frame_sequence_id;
        frame.next_frame_sequence_id = frame_sequence_id
            .checked_add(1)
            .expect("frame sequence id overflow");

        let mut input = LayerFrameInput::new(frame_sequence_id, snapshot.committed_revision())
            .with_open_stroke(snapshot.open_stroke_placement());
        for layer in Layer::ALL {
            let status = self.backend.layer_status(layer);
            if status.state == LayerState::Bound {
                input = input.with_bound_layer(layer, status.surface_generation);
            }
        }
        let decision = frame.scheduler.schedule_frame(input);

        let mut results = Vec::with_capacity(decision.layers.len());
        for request in decision.layers {
            let layer = request.layer;
            let result = match self.backend.draw_flush_and_submit(&runtime, layer, view) {
                Ok(result) => {
                    if result.frames_submitted == 0 {
                        // Nothing reached the surface; draw it again once the
                        // view has a size.
                        frame.scheduler.mark_failed(layer);
                    }
                    result
                }
                Err(error) => {
                    log::warn!("[frame] {frame_sequence_id} {layer} failed: {error}");
                    frame.scheduler.mark_failed(layer);
                    DrawResult::failed(layer)
                }
            };
            results.push((result, request.update_reason));
        }

        Ok(FrameReport {
            handle,
            frame_sequence_id,
            results,
        })
    }
}
