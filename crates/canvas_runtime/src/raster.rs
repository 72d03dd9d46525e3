use canvas_protocol::{PixelPoint, Rgba};
use thiserror::Error;

/// Resolved paint for one stroke: color for the current scheme and width in
/// target pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokePaint {
    pub color: Rgba,
    pub width: f64,
}

/// Receiver of rasterized strokes. Implemented by GPU encoders and by test
/// recorders.
pub trait RasterTarget {
    fn draw_polyline(&mut self, points: &[PixelPoint], paint: &StrokePaint);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RasterStats {
    pub strokes_drawn: usize,
    /// Strokes with no points. They are valid and draw nothing.
    pub strokes_skipped: usize,
    pub points_drawn: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DrawError {
    #[error("no raster target supplied")]
    InvalidTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPolyline {
    pub points: Vec<PixelPoint>,
    pub paint: StrokePaint,
}

impl RasterTarget for Vec<RecordedPolyline> {
    fn draw_polyline(&mut self, points: &[PixelPoint], paint: &StrokePaint) {
        self.push(RecordedPolyline {
            points: points.to_vec(),
            paint: *paint,
        });
    }
}
