use std::sync::{Arc, Mutex, MutexGuard};

use canvas_protocol::{CanvasPlacement, ColorScheme};
use stroke_input::{Stroke, StrokeAccumulator, StrokeId, StrokeInputError, StrokeSink};

use crate::pen::PenState;
use crate::raster::{DrawError, RasterStats, RasterTarget};
use crate::snapshot::CanvasSnapshot;

struct CanvasState {
    strokes: Vec<Arc<Stroke>>,
    accumulator: StrokeAccumulator,
    color_scheme: ColorScheme,
    revision: u64,
    committed_revision: u64,
}

impl CanvasState {
    fn bump_revision(&mut self) {
        self.revision = self
            .revision
            .checked_add(1)
            .expect("canvas revision overflow");
    }

    /// Sealed history or its appearance changed.
    fn bump_committed_revision(&mut self) {
        self.bump_revision();
        self.committed_revision = self
            .committed_revision
            .checked_add(1)
            .expect("canvas committed revision overflow");
    }
}

/// Stroke history, the in-progress stroke and the color scheme of one
/// logical drawing surface.
///
/// Every call takes the state lock for its own duration only. Rendering
/// works from a [`CanvasSnapshot`], so the input thread is never blocked by
/// rasterization.
pub struct CanvasRuntime {
    state: Mutex<CanvasState>,
    pen: PenState,
}

impl Default for CanvasRuntime {
    fn default() -> Self {
        Self::new(PenState::default())
    }
}

impl std::fmt::Debug for CanvasRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("CanvasRuntime")
            .field("sealed_strokes", &state.strokes.len())
            .field("stroke_open", &state.accumulator.is_open())
            .field("color_scheme", &state.color_scheme)
            .field("revision", &state.revision)
            .finish()
    }
}

impl CanvasRuntime {
    pub fn new(pen: PenState) -> Self {
        Self::with_color_scheme(pen, ColorScheme::Light)
    }

    pub fn with_color_scheme(pen: PenState, color_scheme: ColorScheme) -> Self {
        Self {
            state: Mutex::new(CanvasState {
                strokes: Vec::new(),
                accumulator: StrokeAccumulator::new(),
                color_scheme,
                revision: 0,
                committed_revision: 0,
            }),
            pen,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CanvasState> {
        self.state
            .lock()
            .unwrap_or_else(|_| panic!("canvas state lock poisoned"))
    }

    pub fn pen_state(&self) -> &PenState {
        &self.pen
    }

    /// Opens a stroke carrying a copy of the active pen.
    pub fn begin_stroke(&self) -> Result<StrokeId, StrokeInputError> {
        let pen = self.pen.current();
        let mut state = self.lock_state();
        let id = state.accumulator.begin(pen)?;
        state.bump_revision();
        Ok(id)
    }

    pub fn record_stroke_point(
        &self,
        width: f64,
        height: f64,
        x: f64,
        y: f64,
    ) -> Result<(), StrokeInputError> {
        let mut state = self.lock_state();
        state.accumulator.record(width, height, x, y)?;
        state.bump_revision();
        Ok(())
    }

    pub fn end_stroke(&self) -> Result<StrokeId, StrokeInputError> {
        let mut state = self.lock_state();
        let stroke = state.accumulator.end()?;
        let id = stroke.id();
        state.strokes.push(Arc::new(stroke));
        state.bump_committed_revision();
        Ok(id)
    }

    /// Selecting the current scheme again changes nothing, revision included.
    pub fn set_color_scheme(&self, scheme: ColorScheme) {
        let mut state = self.lock_state();
        if state.color_scheme == scheme {
            return;
        }
        state.color_scheme = scheme;
        state.bump_committed_revision();
        log::debug!("[canvas] color scheme set to {scheme}");
    }

    pub fn color_scheme(&self) -> ColorScheme {
        self.lock_state().color_scheme
    }

    pub fn revision(&self) -> u64 {
        self.lock_state().revision
    }

    pub fn committed_revision(&self) -> u64 {
        self.lock_state().committed_revision
    }

    pub fn sealed_stroke_count(&self) -> usize {
        self.lock_state().strokes.len()
    }

    pub fn open_stroke_point_count(&self) -> Option<usize> {
        self.lock_state()
            .accumulator
            .open_stroke()
            .map(Stroke::point_count)
    }

    pub fn open_stroke_placement(&self) -> Option<CanvasPlacement> {
        self.lock_state()
            .accumulator
            .open_stroke()
            .map(|stroke| stroke.pen().placement)
    }

    /// Consistent copy of the canvas. Sealed strokes are shared, the open
    /// stroke is cloned.
    pub fn snapshot(&self) -> CanvasSnapshot {
        let state = self.lock_state();
        CanvasSnapshot {
            sealed: state.strokes.clone(),
            open: state.accumulator.open_stroke().cloned(),
            color_scheme: state.color_scheme,
            revision: state.revision,
            committed_revision: state.committed_revision,
        }
    }

    /// Rasterizes every sealed stroke and then the open stroke into `target`,
    /// rescaled to `width` x `height`.
    pub fn draw(
        &self,
        width: f64,
        height: f64,
        target: Option<&mut dyn RasterTarget>,
    ) -> Result<RasterStats, DrawError> {
        let target = target.ok_or(DrawError::InvalidTarget)?;
        let snapshot = self.snapshot();
        let stats = snapshot.rasterize_all(width, height, 1.0, target);
        log::trace!(
            "[canvas] drew revision {} at {width}x{height}: {stats:?}",
            snapshot.revision()
        );
        Ok(stats)
    }
}

impl StrokeSink for CanvasRuntime {
    fn begin_stroke(&self) -> Result<StrokeId, StrokeInputError> {
        CanvasRuntime::begin_stroke(self)
    }

    fn record_stroke_point(
        &self,
        width: f64,
        height: f64,
        x: f64,
        y: f64,
    ) -> Result<(), StrokeInputError> {
        CanvasRuntime::record_stroke_point(self, width, height, x, y)
    }

    fn end_stroke(&self) -> Result<StrokeId, StrokeInputError> {
        CanvasRuntime::end_stroke(self)
    }
}
