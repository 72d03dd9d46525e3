//! Per-layer binding state.
//!
//! Each of the four layers owns one slot behind its own lock, so provisioning
//! one layer never waits on a draw of another. A draw checks the surface out
//! of its slot for the duration of encoding and checks it back in afterwards;
//! the slot generation tells the check-in whether the binding changed in the
//! meantime.

use std::sync::{Arc, Mutex, MutexGuard};

use canvas_protocol::Layer;

use crate::device::GraphicsDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    Unprovisioned,
    Bound,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerPhase {
    Idle,
    Encoding,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerStatus {
    pub layer: Layer,
    pub state: LayerState,
    pub phase: LayerPhase,
    pub total_frames_submitted: u64,
    /// Changes every time the layer is bound or invalidated.
    pub surface_generation: u64,
}

struct LayerSlot<D: GraphicsDevice> {
    state: LayerState,
    phase: LayerPhase,
    surface: Option<D::Surface>,
    resources: Option<D::SurfaceResources>,
    pipeline: Option<Arc<D::Pipeline>>,
    generation: u64,
    total_frames_submitted: u64,
}

impl<D: GraphicsDevice> LayerSlot<D> {
    fn new() -> Self {
        Self {
            state: LayerState::Unprovisioned,
            phase: LayerPhase::Idle,
            surface: None,
            resources: None,
            pipeline: None,
            generation: 0,
            total_frames_submitted: 0,
        }
    }

    fn next_generation(&mut self) {
        self.generation = self
            .generation
            .checked_add(1)
            .expect("layer surface generation overflow");
    }
}

pub(crate) struct LayerCheckout<D: GraphicsDevice> {
    pub(crate) layer: Layer,
    pub(crate) generation: u64,
    pub(crate) surface: D::Surface,
    pub(crate) resources: D::SurfaceResources,
    pub(crate) pipeline: Arc<D::Pipeline>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckoutError {
    NotReady(LayerState),
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckinOutcome {
    Submitted,
    Failed,
    SurfaceStale,
}

pub struct LayerRegistry<D: GraphicsDevice> {
    slots: [Mutex<LayerSlot<D>>; 4],
}

impl<D: GraphicsDevice> Default for LayerRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: GraphicsDevice> LayerRegistry<D> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Mutex::new(LayerSlot::new())),
        }
    }

    fn slot(&self, layer: Layer) -> MutexGuard<'_, LayerSlot<D>> {
        self.slots[layer.index()]
            .lock()
            .unwrap_or_else(|_| panic!("{layer} layer slot lock poisoned"))
    }

    pub fn state(&self, layer: Layer) -> LayerState {
        self.slot(layer).state
    }

    pub fn status(&self, layer: Layer) -> LayerStatus {
        let slot = self.slot(layer);
        LayerStatus {
            layer,
            state: slot.state,
            phase: slot.phase,
            total_frames_submitted: slot.total_frames_submitted,
            surface_generation: slot.generation,
        }
    }

    pub fn bound_layers(&self) -> Vec<Layer> {
        Layer::ALL
            .into_iter()
            .filter(|layer| self.state(*layer) == LayerState::Bound)
            .collect()
    }

    pub(crate) fn cached_pipeline(&self, layer: Layer) -> Option<Arc<D::Pipeline>> {
        self.slot(layer).pipeline.clone()
    }

    /// Replaces the layer's binding. A draw still encoding against the old
    /// surface finishes, then drops it at check-in.
    pub(crate) fn bind(
        &self,
        layer: Layer,
        surface: D::Surface,
        pipeline: Arc<D::Pipeline>,
        resources: D::SurfaceResources,
    ) -> u64 {
        let mut slot = self.slot(layer);
        slot.surface = Some(surface);
        slot.resources = Some(resources);
        slot.pipeline = Some(pipeline);
        slot.state = LayerState::Bound;
        slot.next_generation();
        slot.generation
    }

    /// Moves a bound layer to `Stale`, releasing its surface. The compiled
    /// pipeline is kept for the next provisioning.
    pub(crate) fn invalidate(&self, layer: Layer) -> bool {
        let mut slot = self.slot(layer);
        if slot.state != LayerState::Bound {
            return false;
        }
        slot.state = LayerState::Stale;
        slot.surface = None;
        slot.resources = None;
        slot.next_generation();
        true
    }

    pub(crate) fn checkout(&self, layer: Layer) -> Result<LayerCheckout<D>, CheckoutError> {
        let mut slot = self.slot(layer);
        if slot.state != LayerState::Bound {
            return Err(CheckoutError::NotReady(slot.state));
        }
        if slot.phase != LayerPhase::Idle {
            return Err(CheckoutError::Busy);
        }
        let (Some(surface), Some(resources), Some(pipeline)) = (
            slot.surface.take(),
            slot.resources.take(),
            slot.pipeline.clone(),
        ) else {
            panic!("{layer} layer is bound without surface, resources and pipeline");
        };
        slot.phase = LayerPhase::Encoding;
        Ok(LayerCheckout {
            layer,
            generation: slot.generation,
            surface,
            resources,
            pipeline,
        })
    }

    pub(crate) fn mark_submitted(&self, layer: Layer) {
        let mut slot = self.slot(layer);
        debug_assert_eq!(slot.phase, LayerPhase::Encoding);
        slot.phase = LayerPhase::Submitted;
    }

    /// Returns the surface to its slot and the layer to `Idle`. A surface the
    /// slot no longer owns (rebound or invalidated meanwhile) is dropped.
    pub(crate) fn checkin(&self, checkout: LayerCheckout<D>, outcome: CheckinOutcome) {
        let LayerCheckout {
            layer,
            generation,
            surface,
            resources,
            pipeline: _,
        } = checkout;
        let mut slot = self.slot(layer);
        slot.phase = LayerPhase::Idle;
        if outcome == CheckinOutcome::Submitted {
            slot.total_frames_submitted = slot
                .total_frames_submitted
                .checked_add(1)
                .expect("layer frame counter overflow");
        }
        if slot.generation != generation {
            return;
        }
        if outcome == CheckinOutcome::SurfaceStale {
            slot.state = LayerState::Stale;
            slot.next_generation();
            return;
        }
        slot.surface = Some(surface);
        slot.resources = Some(resources);
    }
}
