use std::sync::Arc;

use canvas_protocol::{CanvasPlacement, ColorScheme, Layer, PixelPoint};
use stroke_input::Stroke;

use crate::raster::{RasterStats, RasterTarget, StrokePaint};

/// Immutable view of a canvas at one revision. A stroke is either fully
/// present with all of its points or absent.
#[derive(Debug, Clone)]
pub struct CanvasSnapshot {
    pub(crate) sealed: Vec<Arc<Stroke>>,
    pub(crate) open: Option<Stroke>,
    pub(crate) color_scheme: ColorScheme,
    pub(crate) revision: u64,
    pub(crate) committed_revision: u64,
}

impl CanvasSnapshot {
    pub fn sealed_strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.sealed.iter().map(Arc::as_ref)
    }

    pub fn sealed_stroke_count(&self) -> usize {
        self.sealed.len()
    }

    pub fn open_stroke(&self) -> Option<&Stroke> {
        self.open.as_ref()
    }

    pub fn open_stroke_placement(&self) -> Option<CanvasPlacement> {
        self.open.as_ref().map(|stroke| stroke.pen().placement)
    }

    pub fn color_scheme(&self) -> ColorScheme {
        self.color_scheme
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Changes only when sealed strokes or the color scheme change.
    pub fn committed_revision(&self) -> u64 {
        self.committed_revision
    }

    /// Sealed strokes in insertion order followed by the open stroke.
    pub fn all_strokes(&self) -> impl Iterator<Item = &Stroke> {
        self.sealed_strokes().chain(self.open.as_ref())
    }

    /// Strokes routed to `layer`: sealed strokes of the layer's placement for
    /// inactive layers, the matching open stroke for active ones.
    pub fn layer_strokes(&self, layer: Layer) -> Box<dyn Iterator<Item = &Stroke> + '_> {
        let placement = layer.placement();
        if layer.is_active() {
            Box::new(
                self.open
                    .iter()
                    .filter(move |stroke| stroke.pen().placement == placement),
            )
        } else {
            Box::new(
                self.sealed_strokes()
                    .filter(move |stroke| stroke.pen().placement == placement),
            )
        }
    }

    pub fn rasterize_all(
        &self,
        width: f64,
        height: f64,
        scale_factor: f64,
        target: &mut dyn RasterTarget,
    ) -> RasterStats {
        self.rasterize(self.all_strokes(), width, height, scale_factor, target)
    }

    pub fn rasterize_layer(
        &self,
        layer: Layer,
        width: f64,
        height: f64,
        scale_factor: f64,
        target: &mut dyn RasterTarget,
    ) -> RasterStats {
        self.rasterize(
            self.layer_strokes(layer),
            width,
            height,
            scale_factor,
            target,
        )
    }

    fn rasterize<'a>(
        &self,
        strokes: impl Iterator<Item = &'a Stroke>,
        width: f64,
        height: f64,
        scale_factor: f64,
        target: &mut dyn RasterTarget,
    ) -> RasterStats {
        let mut stats = RasterStats::default();
        let mut pixels: Vec<PixelPoint> = Vec::new();
        for stroke in strokes {
            if stroke.is_empty() {
                stats.strokes_skipped += 1;
                continue;
            }
            pixels.clear();
            pixels.extend(
                stroke
                    .points()
                    .iter()
                    .map(|point| point.scaled_to(width, height)),
            );
            let paint = StrokePaint {
                color: stroke.pen().color.for_scheme(self.color_scheme),
                width: stroke.pen().size * scale_factor,
            };
            target.draw_polyline(&pixels, &paint);
            stats.strokes_drawn += 1;
            stats.points_drawn += pixels.len();
        }
        stats
    }
}
