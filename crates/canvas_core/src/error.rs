use canvas_runtime::{ArenaError, DrawError, PenError};
use renderer::{BackendInitError, DrawSubmitError, ProvisionError};
use stroke_input::StrokeInputError;
use thiserror::Error;

use crate::config::ConfigError;

/// Every failure a boundary call can report.
#[derive(Debug, Error)]
pub enum CanvasCoreError {
    #[error(transparent)]
    Arena(#[from] ArenaError),
    #[error(transparent)]
    StrokeInput(#[from] StrokeInputError),
    #[error(transparent)]
    Pen(#[from] PenError),
    #[error(transparent)]
    Draw(#[from] DrawError),
    #[error(transparent)]
    BackendInit(#[from] BackendInitError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    DrawSubmit(#[from] DrawSubmitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
