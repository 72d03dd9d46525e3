use canvas_protocol::{ColorScheme, Pen};
use canvas_runtime::{PenError, validate_pen};
use frame_scheduler::FrameSchedulerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed canvas config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("default pen rejected: {0}")]
    DefaultPen(#[from] PenError),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasCoreConfig {
    /// Active pen until the first `set_active_pen`.
    pub default_pen: Pen,
    /// Scheme given to every runtime created by `init_canvas_runtime`.
    pub initial_color_scheme: ColorScheme,
    pub scheduler: FrameSchedulerConfig,
}

impl CanvasCoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_pen(&self.default_pen)?;
        Ok(())
    }
}
