use std::sync::Arc;

use arc_swap::ArcSwap;
use canvas_protocol::{ColorScheme, Pen};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PenError {
    #[error("pen {scheme} color channel {channel} is {value}, expected a value in [0, 1]")]
    InvalidColor {
        scheme: ColorScheme,
        channel: &'static str,
        value: f64,
    },
    #[error("pen size must be positive and finite, got {size}")]
    InvalidSize { size: f64 },
}

/// Rejects out-of-range channels and degenerate sizes. Nothing is clamped.
pub fn validate_pen(pen: &Pen) -> Result<(), PenError> {
    for scheme in [ColorScheme::Light, ColorScheme::Dark] {
        if let Some((channel, value)) = pen.color.for_scheme(scheme).out_of_range_channel() {
            return Err(PenError::InvalidColor {
                scheme,
                channel,
                value,
            });
        }
    }
    if !(pen.size.is_finite() && pen.size > 0.0) {
        return Err(PenError::InvalidSize { size: pen.size });
    }
    Ok(())
}

/// The active pen, shared by every canvas created from the same arena.
///
/// Readers always get a copy, so a pen change never reaches a stroke that is
/// already open or a rasterization pass in flight.
#[derive(Debug, Clone)]
pub struct PenState {
    active: Arc<ArcSwap<Pen>>,
}

impl Default for PenState {
    fn default() -> Self {
        Self {
            active: Arc::new(ArcSwap::from_pointee(Pen::default())),
        }
    }
}

impl PenState {
    pub fn new(pen: Pen) -> Result<Self, PenError> {
        validate_pen(&pen)?;
        Ok(Self {
            active: Arc::new(ArcSwap::from_pointee(pen)),
        })
    }

    pub fn current(&self) -> Pen {
        **self.active.load()
    }

    pub fn set_active_pen(&self, pen: Pen) -> Result<(), PenError> {
        validate_pen(&pen)?;
        self.active.store(Arc::new(pen));
        log::debug!(
            "[pen] active pen size={} placement={:?}",
            pen.size,
            pen.placement
        );
        Ok(())
    }
}
