//! Per-frame draw-flush-and-submit.

use canvas_protocol::{DrawResult, Layer, ViewInfo};
use canvas_runtime::CanvasRuntime;
use thiserror::Error;

use crate::backend_context::BackendDrawContext;
use crate::device::{CommandQueue, DeviceError, GraphicsDevice, LayerSurface, SurfaceError};
use crate::layer_registry::{CheckinOutcome, CheckoutError, LayerState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawSubmitError {
    #[error("{layer} layer is not ready ({state:?})")]
    LayerNotReady { layer: Layer, state: LayerState },
    #[error("{layer} layer is still encoding the previous frame")]
    LayerBusy { layer: Layer },
    #[error("{layer} drawable: {source}")]
    Surface {
        layer: Layer,
        #[source]
        source: SurfaceError,
    },
    #[error("{layer} submission failed, device lost: {reason}")]
    DeviceLost { layer: Layer, reason: String },
}

impl DrawSubmitError {
    pub fn layer(&self) -> Layer {
        match self {
            DrawSubmitError::LayerNotReady { layer, .. }
            | DrawSubmitError::LayerBusy { layer }
            | DrawSubmitError::Surface { layer, .. }
            | DrawSubmitError::DeviceLost { layer, .. } => *layer,
        }
    }
}

impl<D: GraphicsDevice> BackendDrawContext<D> {
    /// Rasterizes the strokes routed to `layer` and submits them as one frame.
    ///
    /// Readiness is checked before the view size, so an unprovisioned layer
    /// fails even for a zero-size view; a zero-size view on a bound layer is a
    /// successful no-op. A layer never has two frames in flight: a call that
    /// finds the layer encoding fails with `LayerBusy` instead of waiting.
    pub fn draw_flush_and_submit(
        &self,
        runtime: &CanvasRuntime,
        layer: Layer,
        view: ViewInfo,
    ) -> Result<DrawResult, DrawSubmitError> {
        let state = self.layers.state(layer);
        if state != LayerState::Bound {
            return Err(DrawSubmitError::LayerNotReady { layer, state });
        }
        if view.is_empty() {
            log::trace!(
                "[submit] {layer} skipped for {}x{} view",
                view.width_px,
                view.height_px
            );
            return Ok(DrawResult::no_op(layer));
        }

        let mut checkout = self.layers.checkout(layer).map_err(|error| match error {
            CheckoutError::NotReady(state) => DrawSubmitError::LayerNotReady { layer, state },
            CheckoutError::Busy => DrawSubmitError::LayerBusy { layer },
        })?;

        let drawable = match checkout.surface.acquire_drawable() {
            Ok(drawable) => drawable,
            Err(source) if source.is_stale() => {
                log::warn!("[submit] {layer} surface is stale: {source}");
                self.layers.checkin(checkout, CheckinOutcome::SurfaceStale);
                return Err(DrawSubmitError::LayerNotReady {
                    layer,
                    state: LayerState::Stale,
                });
            }
            Err(source) => {
                log::warn!("[submit] {layer} drawable unavailable: {source}");
                self.layers.checkin(checkout, CheckinOutcome::Failed);
                return Err(DrawSubmitError::Surface { layer, source });
            }
        };

        let snapshot = runtime.snapshot();
        let mut encoder =
            self.device
                .begin_encoding(layer, &mut checkout.resources, &drawable, view);
        let stats = snapshot.rasterize_layer(
            layer,
            f64::from(view.width_px),
            f64::from(view.height_px),
            view.effective_scale(),
            &mut encoder,
        );
        let command_buffer =
            self.device
                .finish_encoding(&checkout.pipeline, &checkout.resources, encoder);

        if let Err(DeviceError::Lost { reason }) = self.queue.submit(command_buffer) {
            log::error!("[submit] {layer} submission failed, device lost: {reason}");
            self.layers.checkin(checkout, CheckinOutcome::Failed);
            return Err(DrawSubmitError::DeviceLost { layer, reason });
        }

        self.layers.mark_submitted(layer);
        checkout.surface.present(drawable);
        self.layers.checkin(checkout, CheckinOutcome::Submitted);
        log::debug!(
            "[submit] {layer} revision {} submitted: {} strokes, {} points",
            snapshot.revision(),
            stats.strokes_drawn,
            stats.points_drawn
        );
        Ok(DrawResult::submitted(layer))
    }
}
