//! Backend draw context construction and layer provisioning.

use std::sync::Arc;

use canvas_protocol::Layer;
use thiserror::Error;

use crate::device::{GraphicsDevice, PipelineError};
use crate::layer_registry::{LayerRegistry, LayerState, LayerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BackendInitError {
    #[error("no graphics device supplied")]
    NullDevice,
    #[error("no command queue supplied")]
    NullQueue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerProvisionFailure {
    pub layer: Layer,
    pub error: PipelineError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error("{layer} pipeline: {source}")]
    PipelineCompile {
        layer: Layer,
        #[source]
        source: PipelineError,
    },
    #[error("provisioning rejected, failed layers: {}", failed_layer_list(.failed))]
    PartialProvisioning { failed: Vec<LayerProvisionFailure> },
}

impl ProvisionError {
    pub fn failed_layers(&self) -> Vec<Layer> {
        match self {
            ProvisionError::PipelineCompile { layer, .. } => vec![*layer],
            ProvisionError::PartialProvisioning { failed } => {
                failed.iter().map(|failure| failure.layer).collect()
            }
        }
    }
}

fn failed_layer_list(failed: &[LayerProvisionFailure]) -> String {
    failed
        .iter()
        .map(|failure| failure.layer.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// GPU device and queue plus the per-layer pipeline and surface bindings.
///
/// All methods take `&self`: provisioning from the UI thread and
/// draw-flush-and-submit from the render thread may run concurrently.
pub struct BackendDrawContext<D: GraphicsDevice> {
    pub(crate) device: D,
    pub(crate) queue: D::Queue,
    pub(crate) layers: LayerRegistry<D>,
}

impl<D: GraphicsDevice> BackendDrawContext<D> {
    /// Accepts optional handles for callers bridging from nullable native
    /// pointers.
    pub fn init(device: Option<D>, queue: Option<D::Queue>) -> Result<Self, BackendInitError> {
        let device = device.ok_or(BackendInitError::NullDevice)?;
        let queue = queue.ok_or(BackendInitError::NullQueue)?;
        Ok(Self::new(device, queue))
    }

    pub fn new(device: D, queue: D::Queue) -> Self {
        log::info!("[backend] draw context created");
        Self {
            device,
            queue,
            layers: LayerRegistry::new(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn queue(&self) -> &D::Queue {
        &self.queue
    }

    pub fn layer_state(&self, layer: Layer) -> LayerState {
        self.layers.state(layer)
    }

    pub fn layer_status(&self, layer: Layer) -> LayerStatus {
        self.layers.status(layer)
    }

    pub fn bound_layers(&self) -> Vec<Layer> {
        self.layers.bound_layers()
    }

    /// Binds `surface` to `layer`, compiling the layer pipeline only when none
    /// is cached or the cached one cannot target the new surface.
    pub fn provision_layer(&self, layer: Layer, surface: D::Surface) -> Result<(), ProvisionError> {
        let pipeline = self
            .prepare_pipeline(layer, &surface)
            .map_err(|source| ProvisionError::PipelineCompile { layer, source })?;
        self.bind(layer, surface, pipeline);
        Ok(())
    }

    /// Provisions all four layers or none. On failure every layer keeps its
    /// previous binding and the supplied surfaces are dropped.
    pub fn provision_all(
        &self,
        background: D::Surface,
        background_active: D::Surface,
        foreground: D::Surface,
        foreground_active: D::Surface,
    ) -> Result<(), ProvisionError> {
        let surfaces = [
            (Layer::Background, background),
            (Layer::BackgroundActive, background_active),
            (Layer::Foreground, foreground),
            (Layer::ForegroundActive, foreground_active),
        ];

        let mut prepared = Vec::with_capacity(surfaces.len());
        let mut failed = Vec::new();
        for (layer, surface) in surfaces {
            match self.prepare_pipeline(layer, &surface) {
                Ok(pipeline) => prepared.push((layer, surface, pipeline)),
                Err(error) => failed.push(LayerProvisionFailure { layer, error }),
            }
        }
        if !failed.is_empty() {
            let error = ProvisionError::PartialProvisioning { failed };
            log::warn!("[layers] {error}");
            return Err(error);
        }

        for (layer, surface, pipeline) in prepared {
            self.bind(layer, surface, pipeline);
        }
        Ok(())
    }

    /// Rebinds a layer after its surface changed size or was recreated.
    pub fn reload_surface(&self, layer: Layer, surface: D::Surface) -> Result<(), ProvisionError> {
        log::debug!("[layers] reloading {layer} surface");
        self.provision_layer(layer, surface)
    }

    /// Marks a bound layer stale. Returns false when the layer was not bound.
    pub fn invalidate_layer(&self, layer: Layer) -> bool {
        let invalidated = self.layers.invalidate(layer);
        if invalidated {
            log::warn!("[layers] {layer} invalidated, re-provisioning required");
        }
        invalidated
    }

    fn prepare_pipeline(
        &self,
        layer: Layer,
        surface: &D::Surface,
    ) -> Result<Arc<D::Pipeline>, PipelineError> {
        if let Some(cached) = self.layers.cached_pipeline(layer) {
            if self.device.pipeline_matches(&cached, surface) {
                log::trace!("[layers] reusing {layer} pipeline");
                return Ok(cached);
            }
        }
        let pipeline = self.device.compile_pipeline(layer, surface)?;
        log::debug!("[layers] compiled {layer} pipeline");
        Ok(Arc::new(pipeline))
    }

    fn bind(&self, layer: Layer, surface: D::Surface, pipeline: Arc<D::Pipeline>) {
        let resources = self
            .device
            .create_surface_resources(layer, &pipeline, &surface);
        let generation = self.layers.bind(layer, surface, pipeline, resources);
        log::debug!("[layers] provisioned {layer} (generation {generation})");
    }
}
