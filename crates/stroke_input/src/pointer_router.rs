use thiserror::Error;

use crate::{StrokeId, StrokeInputError, StrokeLifecycleError, StrokeSink, stroke_point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventPhase {
    Hover,
    Down,
    Move,
    Up,
    Cancel,
}

/// A pointer sample in view pixels, as delivered by the platform view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPointerSample {
    pub pointer_id: u64,
    pub phase: PointerEventPhase,
    pub x_px: f64,
    pub y_px: f64,
    pub view_width: f64,
    pub view_height: f64,
}

impl RawPointerSample {
    fn normalized(&self) -> (f64, f64) {
        (self.x_px / self.view_width, self.y_px / self.view_height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Ignored,
    Opened(StrokeId),
    Recorded,
    Sealed(StrokeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PointerRouteError {
    #[error("pointer {actual} does not own the open stroke (owner {expected})")]
    PointerIdMismatch { expected: u64, actual: u64 },
    #[error(transparent)]
    Input(#[from] StrokeInputError),
}

impl From<StrokeLifecycleError> for PointerRouteError {
    fn from(error: StrokeLifecycleError) -> Self {
        Self::Input(StrokeInputError::InvalidState(error))
    }
}

/// Turns a pointer event stream into stroke lifecycle calls. One pointer owns
/// the stroke from Down until Up or Cancel.
#[derive(Debug, Default)]
pub struct PointerStrokeRouter {
    active_pointer: Option<u64>,
}

impl PointerStrokeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_pointer(&self) -> Option<u64> {
        self.active_pointer
    }

    /// Drops pointer ownership without touching the sink.
    pub fn reset(&mut self) {
        self.active_pointer = None;
    }

    pub fn route<S>(
        &mut self,
        sample: RawPointerSample,
        sink: &S,
    ) -> Result<RouteOutcome, PointerRouteError>
    where
        S: StrokeSink + ?Sized,
    {
        match sample.phase {
            PointerEventPhase::Hover => Ok(RouteOutcome::Ignored),
            PointerEventPhase::Down => self.handle_down(sample, sink),
            PointerEventPhase::Move => {
                self.check_owner(sample.pointer_id)?;
                record(sample, sink)?;
                Ok(RouteOutcome::Recorded)
            }
            PointerEventPhase::Up => {
                self.check_owner(sample.pointer_id)?;
                // Ownership ends with Up even when the sink no longer has the
                // stroke open.
                self.active_pointer = None;
                let recorded = record(sample, sink);
                let id = sink.end_stroke()?;
                // The stroke is sealed either way; a rejected last sample is
                // still reported to the caller.
                recorded?;
                Ok(RouteOutcome::Sealed(id))
            }
            PointerEventPhase::Cancel => {
                self.check_owner(sample.pointer_id)?;
                self.active_pointer = None;
                let id = sink.end_stroke()?;
                Ok(RouteOutcome::Sealed(id))
            }
        }
    }

    fn handle_down<S>(
        &mut self,
        sample: RawPointerSample,
        sink: &S,
    ) -> Result<RouteOutcome, PointerRouteError>
    where
        S: StrokeSink + ?Sized,
    {
        if let Some(owner) = self.active_pointer {
            if owner != sample.pointer_id {
                return Err(PointerRouteError::PointerIdMismatch {
                    expected: owner,
                    actual: sample.pointer_id,
                });
            }
            return Err(StrokeLifecycleError::StrokeAlreadyOpen.into());
        }
        // A sample the sink would reject must not leave an empty stroke open.
        let (x, y) = sample.normalized();
        stroke_point(sample.view_width, sample.view_height, x, y)?;
        let id = sink.begin_stroke()?;
        self.active_pointer = Some(sample.pointer_id);
        record(sample, sink)?;
        Ok(RouteOutcome::Opened(id))
    }

    fn check_owner(&self, pointer_id: u64) -> Result<(), PointerRouteError> {
        match self.active_pointer {
            None => Err(StrokeLifecycleError::NoOpenStroke.into()),
            Some(owner) if owner != pointer_id => Err(PointerRouteError::PointerIdMismatch {
                expected: owner,
                actual: pointer_id,
            }),
            Some(_) => Ok(()),
        }
    }
}

fn record<S>(sample: RawPointerSample, sink: &S) -> Result<(), StrokeInputError>
where
    S: StrokeSink + ?Sized,
{
    let (x, y) = sample.normalized();
    sink.record_stroke_point(sample.view_width, sample.view_height, x, y)
}
