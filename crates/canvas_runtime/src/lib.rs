//! Canvas state shared between the input thread and the render thread.
//!
//! The input side feeds a [`CanvasRuntime`] through the stroke lifecycle
//! calls; the render side takes a [`CanvasSnapshot`] and rasterizes it into
//! any [`RasterTarget`] without holding the runtime lock.

pub mod arena;
pub mod pen;
pub mod raster;
pub mod runtime;
pub mod snapshot;

pub use arena::{ArenaError, CanvasArena};
pub use pen::{PenError, PenState, validate_pen};
pub use raster::{DrawError, RasterStats, RasterTarget, RecordedPolyline, StrokePaint};
pub use runtime::CanvasRuntime;
pub use snapshot::CanvasSnapshot;
