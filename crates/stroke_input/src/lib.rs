pub mod pointer_router;

pub use pointer_router::{
    PointerEventPhase, PointerRouteError, PointerStrokeRouter, RawPointerSample, RouteOutcome,
};

use canvas_protocol::{Pen, StrokePoint};
use thiserror::Error;

/// Per-runtime stroke identity, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrokeId(pub u64);

impl std::fmt::Display for StrokeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stroke#{}", self.0)
    }
}

/// One freehand gesture. Append-only while open, immutable once sealed.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    id: StrokeId,
    pen: Pen,
    points: Vec<StrokePoint>,
}

impl Stroke {
    pub fn id(&self) -> StrokeId {
        self.id
    }

    /// Pen captured when the stroke was opened.
    pub fn pen(&self) -> &Pen {
        &self.pen
    }

    pub fn points(&self) -> &[StrokePoint] {
        &self.points
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StrokeLifecycleError {
    #[error("a stroke is already open")]
    StrokeAlreadyOpen,
    #[error("no stroke is open")]
    NoOpenStroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum StrokeInputError {
    #[error("invalid stroke state: {0}")]
    InvalidState(#[from] StrokeLifecycleError),
    #[error("canvas size must be positive and finite, got {width}x{height}")]
    InvalidCanvasSize { width: f64, height: f64 },
    #[error("stroke coordinate is not finite: ({x}, {y})")]
    NonFiniteCoordinate { x: f64, y: f64 },
}

/// Anything that accepts the stroke lifecycle calls. Implementations use
/// interior mutability so an input thread can feed a shared canvas.
pub trait StrokeSink {
    fn begin_stroke(&self) -> Result<StrokeId, StrokeInputError>;

    fn record_stroke_point(
        &self,
        width: f64,
        height: f64,
        x: f64,
        y: f64,
    ) -> Result<(), StrokeInputError>;

    fn end_stroke(&self) -> Result<StrokeId, StrokeInputError>;
}

/// Validates one raw sample against the canvas-size invariant.
pub fn stroke_point(
    width: f64,
    height: f64,
    x: f64,
    y: f64,
) -> Result<StrokePoint, StrokeInputError> {
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(StrokeInputError::InvalidCanvasSize { width, height });
    }
    if !(x.is_finite() && y.is_finite()) {
        return Err(StrokeInputError::NonFiniteCoordinate { x, y });
    }
    Ok(StrokePoint {
        normalized_x: x,
        normalized_y: y,
        canvas_width: width,
        canvas_height: height,
    })
}

/// Single-writer stroke state machine: closed -> open -> closed.
#[derive(Debug)]
pub struct StrokeAccumulator {
    open: Option<Stroke>,
    next_stroke_id: u64,
}

impl Default for StrokeAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StrokeAccumulator {
    pub fn new() -> Self {
        Self {
            open: None,
            next_stroke_id: 1,
        }
    }

    pub fn open_stroke(&self) -> Option<&Stroke> {
        self.open.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn begin(&mut self, pen: Pen) -> Result<StrokeId, StrokeLifecycleError> {
        if self.open.is_some() {
            return Err(StrokeLifecycleError::StrokeAlreadyOpen);
        }
        let id = StrokeId(self.next_stroke_id);
        self.next_stroke_id = self
            .next_stroke_id
            .checked_add(1)
            .expect("stroke id overflow");
        self.open = Some(Stroke {
            id,
            pen,
            points: Vec::new(),
        });
        log::debug!("[stroke] opened {id}");
        Ok(id)
    }

    /// Appends a point to the open stroke. Lifecycle is checked before the
    /// sample itself, so a misplaced call always reports `InvalidState`.
    pub fn record(
        &mut self,
        width: f64,
        height: f64,
        x: f64,
        y: f64,
    ) -> Result<(), StrokeInputError> {
        let stroke = self
            .open
            .as_mut()
            .ok_or(StrokeLifecycleError::NoOpenStroke)?;
        let point = stroke_point(width, height, x, y)?;
        stroke.points.push(point);
        log::trace!(
            "[stroke] {} point {} at ({x}, {y}) on {width}x{height}",
            stroke.id,
            stroke.points.len()
        );
        Ok(())
    }

    /// Seals the open stroke. Empty strokes are sealed like any other.
    pub fn end(&mut self) -> Result<Stroke, StrokeLifecycleError> {
        let stroke = self.open.take().ok_or(StrokeLifecycleError::NoOpenStroke)?;
        log::debug!(
            "[stroke] sealed {} with {} points",
            stroke.id,
            stroke.points.len()
        );
        Ok(stroke)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_points_in_call_order() {
        let mut accumulator = StrokeAccumulator::new();
        let id = accumulator.begin(Pen::default()).expect("begin");
        for index in 0..5 {
            let x = index as f64 / 4.0;
            accumulator.record(10.0, 20.0, x, 1.0 - x).expect("record");
        }
        let stroke = accumulator.end().expect("end");

        assert_eq!(stroke.id(), id);
        assert_eq!(stroke.point_count(), 5);
        let xs: Vec<f64> = stroke.points().iter().map(|p| p.normalized_x).collect();
        assert_eq!(xs, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(!accumulator.is_open());
    }

    #[test]
    fn begin_twice_is_rejected_and_keeps_open_stroke() {
        let mut accumulator = StrokeAccumulator::new();
        accumulator.begin(Pen::default()).expect("begin");
        accumulator.record(10.0, 10.0, 0.1, 0.1).expect("record");

        assert_eq!(
            accumulator.begin(Pen::default()),
            Err(StrokeLifecycleError::StrokeAlreadyOpen)
        );
        assert_eq!(accumulator.open_stroke().map(Stroke::point_count), Some(1));
    }

    #[test]
    fn record_and_end_without_open_stroke_are_invalid_state() {
        let mut accumulator = StrokeAccumulator::new();
        assert_eq!(
            accumulator.record(10.0, 10.0, 0.5, 0.5),
            Err(StrokeInputError::InvalidState(
                StrokeLifecycleError::NoOpenStroke
            ))
        );
        assert_eq!(
            accumulator.end().map(|stroke| stroke.id()),
            Err(StrokeLifecycleError::NoOpenStroke)
        );
    }

    #[test]
    fn lifecycle_error_wins_over_bad_sample() {
        let mut accumulator = StrokeAccumulator::new();
        assert_eq!(
            accumulator.record(0.0, 0.0, f64::NAN, 0.0),
            Err(StrokeInputError::InvalidState(
                StrokeLifecycleError::NoOpenStroke
            ))
        );
    }

    #[test]
    fn rejects_degenerate_canvas_and_coordinates() {
        let mut accumulator = StrokeAccumulator::new();
        accumulator.begin(Pen::default()).expect("begin");

        assert!(matches!(
            accumulator.record(0.0, 10.0, 0.5, 0.5),
            Err(StrokeInputError::InvalidCanvasSize { .. })
        ));
        assert!(matches!(
            accumulator.record(10.0, f64::INFINITY, 0.5, 0.5),
            Err(StrokeInputError::InvalidCanvasSize { .. })
        ));
        assert!(matches!(
            accumulator.record(10.0, 10.0, f64::NAN, 0.5),
            Err(StrokeInputError::NonFiniteCoordinate { .. })
        ));
        assert_eq!(accumulator.open_stroke().map(Stroke::point_count), Some(0));
    }

    #[test]
    fn empty_stroke_is_sealed() {
        let mut accumulator = StrokeAccumulator::new();
        accumulator.begin(Pen::default()).expect("begin");
        let stroke = accumulator.end().expect("end");
        assert!(stroke.is_empty());
    }

    #[test]
    fn stroke_ids_increase_and_pen_is_captured() {
        let mut accumulator = StrokeAccumulator::new();
        let first = accumulator.begin(Pen::default()).expect("begin");
        accumulator.end().expect("end");

        let wide = Pen {
            size: 12.0,
            ..Pen::default()
        };
        let second = accumulator.begin(wide).expect("begin");
        let stroke = accumulator.end().expect("end");

        assert_eq!(first, StrokeId(1));
        assert_eq!(second, StrokeId(2));
        assert_eq!(stroke.pen().size, 12.0);
    }

    #[test]
    fn duplicate_consecutive_points_are_kept() {
        let mut accumulator = StrokeAccumulator::new();
        accumulator.begin(Pen::default()).expect("begin");
        accumulator.record(10.0, 10.0, 0.3, 0.3).expect("record");
        accumulator.record(10.0, 10.0, 0.3, 0.3).expect("record");
        assert_eq!(accumulator.end().expect("end").point_count(), 2);
    }
}
