//! Value types shared by the canvas crates.
//!
//! Nothing in here owns state or touches a device; every type is `Copy` (or
//! cheap to clone) so it can cross the input/render thread boundary by value.

use std::fmt;

use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Generation-checked key of a canvas runtime owned by a `CanvasArena`.
    pub struct CanvasHandle;
}

/// One recorded input sample.
///
/// Coordinates are normalized against the canvas size at sample time, and that
/// size travels with the point so a later pass at another surface size can
/// rescale consistently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub normalized_x: f64,
    pub normalized_y: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl StrokePoint {
    /// Position in pixels at the sample's own canvas size.
    pub fn recorded_pixel(&self) -> PixelPoint {
        PixelPoint {
            x: self.normalized_x * self.canvas_width,
            y: self.normalized_y * self.canvas_height,
        }
    }

    /// Position in pixels on a target of `width` x `height`, scaled by the
    /// ratio of the target size to the recorded canvas size.
    pub fn scaled_to(&self, width: f64, height: f64) -> PixelPoint {
        let recorded = self.recorded_pixel();
        PixelPoint {
            x: recorded.x * (width / self.canvas_width),
            y: recorded.y * (height / self.canvas_height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// Straight RGBA with channels normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Rgba {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub fn channels(&self) -> [(&'static str, f64); 4] {
        [
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
            ("alpha", self.alpha),
        ]
    }

    /// First channel outside `[0, 1]` (NaN included), if any.
    pub fn out_of_range_channel(&self) -> Option<(&'static str, f64)> {
        self.channels()
            .into_iter()
            .find(|(_, value)| !(0.0..=1.0).contains(value))
    }

    pub fn to_f32_array(&self) -> [f32; 4] {
        [
            self.red as f32,
            self.green as f32,
            self.blue as f32,
            self.alpha as f32,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorScheme::Light => f.write_str("light"),
            ColorScheme::Dark => f.write_str("dark"),
        }
    }
}

/// A color pair, one per appearance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorModes {
    pub light: Rgba,
    pub dark: Rgba,
}

impl ColorModes {
    pub fn for_scheme(&self, scheme: ColorScheme) -> Rgba {
        match scheme {
            ColorScheme::Light => self.light,
            ColorScheme::Dark => self.dark,
        }
    }
}

impl Default for ColorModes {
    fn default() -> Self {
        Self {
            light: Rgba::BLACK,
            dark: Rgba::WHITE,
        }
    }
}

/// Where a pen's ink lands. Background ink (highlighters) renders beneath
/// foreground ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CanvasPlacement {
    #[default]
    Foreground,
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pen {
    pub color: ColorModes,
    /// Stroke diameter in logical points.
    pub size: f64,
    pub placement: CanvasPlacement,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            color: ColorModes::default(),
            size: 2.0,
            placement: CanvasPlacement::Foreground,
        }
    }
}

/// The four fixed rendering roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    Background,
    BackgroundActive,
    Foreground,
    ForegroundActive,
}

impl Layer {
    pub const ALL: [Layer; 4] = [
        Layer::Background,
        Layer::BackgroundActive,
        Layer::Foreground,
        Layer::ForegroundActive,
    ];

    pub const fn index(self) -> usize {
        match self {
            Layer::Background => 0,
            Layer::BackgroundActive => 1,
            Layer::Foreground => 2,
            Layer::ForegroundActive => 3,
        }
    }

    pub const fn placement(self) -> CanvasPlacement {
        match self {
            Layer::Background | Layer::BackgroundActive => CanvasPlacement::Background,
            Layer::Foreground | Layer::ForegroundActive => CanvasPlacement::Foreground,
        }
    }

    /// Active layers carry the in-progress stroke, inactive ones sealed history.
    pub const fn is_active(self) -> bool {
        matches!(self, Layer::BackgroundActive | Layer::ForegroundActive)
    }

    pub const fn active_for(placement: CanvasPlacement) -> Layer {
        match placement {
            CanvasPlacement::Background => Layer::BackgroundActive,
            CanvasPlacement::Foreground => Layer::ForegroundActive,
        }
    }

    pub const fn committed_for(placement: CanvasPlacement) -> Layer {
        match placement {
            CanvasPlacement::Background => Layer::Background,
            CanvasPlacement::Foreground => Layer::Foreground,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Layer::Background => "background",
            Layer::BackgroundActive => "background-active",
            Layer::Foreground => "foreground",
            Layer::ForegroundActive => "foreground-active",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-frame output configuration reported by the view. Affects resolution
/// only, never semantics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewInfo {
    pub width_px: u32,
    pub height_px: u32,
    pub scale_factor: f64,
}

impl ViewInfo {
    pub fn new(width_px: u32, height_px: u32, scale_factor: f64) -> Self {
        Self {
            width_px,
            height_px,
            scale_factor,
        }
    }

    /// Transient zero-size views show up during layout.
    pub fn is_empty(&self) -> bool {
        self.width_px == 0 || self.height_px == 0
    }

    /// Scale factor used for stroke widths; non-finite or non-positive values
    /// fall back to 1.
    pub fn effective_scale(&self) -> f64 {
        if self.scale_factor.is_finite() && self.scale_factor > 0.0 {
            self.scale_factor
        } else {
            1.0
        }
    }
}

/// Outcome of one draw-flush-and-submit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    pub success: bool,
    pub layer: Layer,
    /// Frames submitted by this request: 1 after a submission, 0 for a no-op.
    pub frames_submitted: u32,
}

impl DrawResult {
    pub fn submitted(layer: Layer) -> Self {
        Self {
            success: true,
            layer,
            frames_submitted: 1,
        }
    }

    pub fn no_op(layer: Layer) -> Self {
        Self {
            success: true,
            layer,
            frames_submitted: 0,
        }
    }

    pub fn failed(layer: Layer) -> Self {
        Self {
            success: false,
            layer,
            frames_submitted: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stroke_point_scales_by_ratio_of_target_to_recorded_size() {
        let point = StrokePoint {
            normalized_x: 0.5,
            normalized_y: 0.5,
            canvas_width: 100.0,
            canvas_height: 100.0,
        };
        assert_eq!(point.scaled_to(200.0, 200.0), PixelPoint { x: 100.0, y: 100.0 });
        assert_eq!(point.recorded_pixel(), PixelPoint { x: 50.0, y: 50.0 });
    }

    #[test]
    fn stroke_point_scales_axes_independently() {
        let point = StrokePoint {
            normalized_x: 0.25,
            normalized_y: 1.0,
            canvas_width: 400.0,
            canvas_height: 300.0,
        };
        assert_eq!(point.scaled_to(800.0, 150.0), PixelPoint { x: 200.0, y: 150.0 });
    }

    #[test]
    fn out_of_range_channel_reports_first_offender() {
        assert_eq!(Rgba::BLACK.out_of_range_channel(), None);
        let color = Rgba::new(0.2, 1.5, -0.1, 1.0);
        assert_eq!(color.out_of_range_channel(), Some(("green", 1.5)));
        let nan = Rgba::new(0.0, 0.0, 0.0, f64::NAN);
        assert_eq!(nan.out_of_range_channel().map(|(name, _)| name), Some("alpha"));
    }

    #[test]
    fn color_modes_select_by_scheme() {
        let modes = ColorModes::default();
        assert_eq!(modes.for_scheme(ColorScheme::Light), Rgba::BLACK);
        assert_eq!(modes.for_scheme(ColorScheme::Dark), Rgba::WHITE);
    }

    #[test]
    fn layer_roles_pair_up_by_placement() {
        for layer in Layer::ALL {
            let placement = layer.placement();
            if layer.is_active() {
                assert_eq!(Layer::active_for(placement), layer);
            } else {
                assert_eq!(Layer::committed_for(placement), layer);
            }
            assert_eq!(Layer::ALL[layer.index()], layer);
        }
    }

    #[test]
    fn view_info_zero_dimension_is_empty() {
        assert!(ViewInfo::new(0, 10, 2.0).is_empty());
        assert!(ViewInfo::new(10, 0, 2.0).is_empty());
        assert!(!ViewInfo::new(10, 10, 2.0).is_empty());
        assert_eq!(ViewInfo::new(1, 1, 0.0).effective_scale(), 1.0);
        assert_eq!(ViewInfo::new(1, 1, 3.0).effective_scale(), 3.0);
    }

    #[test]
    fn pen_deserializes_with_missing_fields_defaulted() {
        let pen: Pen = serde_json::from_str(r#"{ "size": 6.0, "placement": "Background" }"#)
            .expect("parse pen");
        assert_eq!(pen.size, 6.0);
        assert_eq!(pen.placement, CanvasPlacement::Background);
        assert_eq!(pen.color, ColorModes::default());
    }
}
