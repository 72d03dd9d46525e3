//! Per-frame choice of which canvas layers to redraw.

use canvas_protocol::{CanvasPlacement, Layer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSchedulerConfig {
    /// Draw every bound layer on every frame, changed or not.
    pub redraw_idle_layers_every_frame: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerFrameInput {
    pub frame_sequence_id: u64,
    pub committed_revision: u64,
    pub open_stroke_placement: Option<CanvasPlacement>,
    /// Surface generation per layer, indexed by [`Layer::index`]. `None`
    /// means the layer has no bound surface.
    pub surface_generations: [Option<u64>; 4],
}

impl LayerFrameInput {
    pub fn new(frame_sequence_id: u64, committed_revision: u64) -> Self {
        Self {
            frame_sequence_id,
            committed_revision,
            open_stroke_placement: None,
            surface_generations: [None; 4],
        }
    }

    pub fn with_open_stroke(mut self, placement: Option<CanvasPlacement>) -> Self {
        self.open_stroke_placement = placement;
        self
    }

    pub fn with_bound_layer(mut self, layer: Layer, surface_generation: u64) -> Self {
        self.surface_generations[layer.index()] = Some(surface_generation);
        self
    }

    fn generation(&self, layer: Layer) -> Option<u64> {
        self.surface_generations[layer.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerUpdateReason {
    StrokeActivated,
    StrokeTick,
    StrokeDeactivated,
    CommittedChanged,
    SurfaceProvisioned,
    ForcedRedraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerDrawRequest {
    pub layer: Layer,
    pub update_reason: LayerUpdateReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFrameDecision {
    pub frame_sequence_id: u64,
    pub stroke_active: bool,
    /// In [`Layer::ALL`] order.
    pub layers: Vec<LayerDrawRequest>,
}

impl LayerFrameDecision {
    pub fn is_idle(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn reason_for(&self, layer: Layer) -> Option<LayerUpdateReason> {
        self.layers
            .iter()
            .find(|request| request.layer == layer)
            .map(|request| request.update_reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DrawnMark {
    committed_revision: u64,
    surface_generation: u64,
}

#[derive(Debug, Clone)]
pub struct LayerFrameScheduler {
    config: FrameSchedulerConfig,
    active_placement: Option<CanvasPlacement>,
    drawn: [Option<DrawnMark>; 4],
}

impl LayerFrameScheduler {
    pub fn new(config: FrameSchedulerConfig) -> Self {
        Self {
            config,
            active_placement: None,
            drawn: [None; 4],
        }
    }

    pub fn config(&self) -> FrameSchedulerConfig {
        self.config
    }

    pub fn is_stroke_active(&self) -> bool {
        self.active_placement.is_some()
    }

    /// Forgets the last draw of `layer` so the next frame draws it again.
    pub fn mark_failed(&mut self, layer: Layer) {
        self.drawn[layer.index()] = None;
    }

    /// Forgets every layer, e.g. when a different canvas is about to be drawn.
    pub fn reset(&mut self) {
        self.active_placement = None;
        self.drawn = [None; 4];
    }

    pub fn schedule_frame(&mut self, input: LayerFrameInput) -> LayerFrameDecision {
        let mut reasons: [Option<LayerUpdateReason>; 4] = [None; 4];

        let previous = self.active_placement;
        self.active_placement = input.open_stroke_placement;
        match (previous, input.open_stroke_placement) {
            (None, Some(current)) => {
                reasons[Layer::active_for(current).index()] =
                    Some(LayerUpdateReason::StrokeActivated);
            }
            (Some(previous), Some(current)) if previous == current => {
                reasons[Layer::active_for(current).index()] = Some(LayerUpdateReason::StrokeTick);
            }
            (Some(previous), Some(current)) => {
                // One stroke sealed and another opened on the other placement
                // between two frames.
                reasons[Layer::active_for(previous).index()] =
                    Some(LayerUpdateReason::StrokeDeactivated);
                reasons[Layer::active_for(current).index()] =
                    Some(LayerUpdateReason::StrokeActivated);
            }
            (Some(previous), None) => {
                reasons[Layer::active_for(previous).index()] =
                    Some(LayerUpdateReason::StrokeDeactivated);
            }
            (None, None) => {}
        }

        for layer in Layer::ALL {
            let slot = layer.index();
            if reasons[slot].is_some() {
                continue;
            }
            let Some(generation) = input.generation(layer) else {
                continue;
            };
            let drawn = self.drawn[slot];
            let reprovisioned = drawn.map(|mark| mark.surface_generation) != Some(generation);
            if reprovisioned {
                reasons[slot] = Some(LayerUpdateReason::SurfaceProvisioned);
            } else if !layer.is_active()
                && drawn.map(|mark| mark.committed_revision) != Some(input.committed_revision)
            {
                reasons[slot] = Some(LayerUpdateReason::CommittedChanged);
            } else if self.config.redraw_idle_layers_every_frame {
                reasons[slot] = Some(LayerUpdateReason::ForcedRedraw);
            }
        }

        let mut layers = Vec::new();
        for layer in Layer::ALL {
            let Some(update_reason) = reasons[layer.index()] else {
                continue;
            };
            // Unbound layers are never drawn; their mark is left as is so a
            // later provisioning is still seen as new.
            let Some(surface_generation) = input.generation(layer) else {
                continue;
            };
            self.drawn[layer.index()] = Some(DrawnMark {
                committed_revision: input.committed_revision,
                surface_generation,
            });
            layers.push(LayerDrawRequest {
                layer,
                update_reason,
            });
        }

        if !layers.is_empty() {
            log::trace!(
                "[scheduler] frame {} draws {:?}",
                input.frame_sequence_id,
                layers
            );
        }

        LayerFrameDecision {
            frame_sequence_id: input.frame_sequence_id,
            stroke_active: self.active_placement.is_some(),
            layers,
        }
    }
}

impl Default for LayerFrameScheduler {
    fn default() -> Self {
        Self::new(FrameSchedulerConfig::default())
    }
}
