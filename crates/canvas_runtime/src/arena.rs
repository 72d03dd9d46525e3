use std::sync::Arc;

use canvas_protocol::{CanvasHandle, ColorScheme, Pen};
use slotmap::SlotMap;
use thiserror::Error;

use crate::pen::{PenError, PenState};
use crate::runtime::CanvasRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("canvas handle {0:?} was freed or never issued")]
    StaleHandle(CanvasHandle),
}

/// Owner of every canvas runtime in the process, addressed by
/// generation-checked handles. The active pen lives here and is shared by all
/// runtimes the arena creates.
#[derive(Debug, Default)]
pub struct CanvasArena {
    runtimes: SlotMap<CanvasHandle, Arc<CanvasRuntime>>,
    pen: PenState,
}

impl CanvasArena {
    pub fn new(pen: PenState) -> Self {
        Self {
            runtimes: SlotMap::with_key(),
            pen,
        }
    }

    pub fn pen_state(&self) -> &PenState {
        &self.pen
    }

    pub fn set_active_pen(&self, pen: Pen) -> Result<(), PenError> {
        self.pen.set_active_pen(pen)
    }

    pub fn init_canvas_runtime(&mut self) -> CanvasHandle {
        self.init_canvas_runtime_with_scheme(ColorScheme::Light)
    }

    pub fn init_canvas_runtime_with_scheme(&mut self, scheme: ColorScheme) -> CanvasHandle {
        let runtime = CanvasRuntime::with_color_scheme(self.pen.clone(), scheme);
        let handle = self.runtimes.insert(Arc::new(runtime));
        log::info!("[arena] created canvas {handle:?} ({scheme})");
        handle
    }

    /// Releases the arena's reference. A render pass still holding the
    /// runtime finishes against it; the handle is dead immediately.
    pub fn free_canvas_runtime(&mut self, handle: CanvasHandle) -> Result<(), ArenaError> {
        self.runtimes
            .remove(handle)
            .ok_or(ArenaError::StaleHandle(handle))?;
        log::info!("[arena] freed canvas {handle:?}");
        Ok(())
    }

    pub fn get(&self, handle: CanvasHandle) -> Result<&Arc<CanvasRuntime>, ArenaError> {
        self.runtimes
            .get(handle)
            .ok_or(ArenaError::StaleHandle(handle))
    }

    pub fn runtime(&self, handle: CanvasHandle) -> Result<Arc<CanvasRuntime>, ArenaError> {
        self.get(handle).map(Arc::clone)
    }

    pub fn contains(&self, handle: CanvasHandle) -> bool {
        self.runtimes.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }
}
