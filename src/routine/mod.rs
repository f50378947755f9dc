pub mod fallback;
pub mod guard;
pub mod host;
pub mod layers;
pub mod loader;
pub mod manifest;

use thiserror::Error;

use crate::analysis::frame::FrequencyFrame;
use crate::render::canvas::Canvas;

/// Size of the surface a routine draws on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn of(canvas: &Canvas) -> Self {
        Self {
            width: canvas.width(),
            height: canvas.height(),
        }
    }

    pub fn min_side(&self) -> f32 {
        self.width.min(self.height) as f32
    }
}

#[derive(Debug, Error)]
pub enum RoutineError {
    #[error("routine text contains forbidden pattern '{pattern}'")]
    Forbidden { pattern: String },
    #[error("routine does not describe a visualization: {0}")]
    NotAVisualization(String),
    #[error("routine is out of bounds: {0}")]
    Invalid(String),
    #[error("routine text is not a valid manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("routine failed its dry run: {0}")]
    DryRun(String),
    #[error("routine panicked: {0}")]
    Panicked(String),
    #[error("routine draw failed: {0}")]
    Draw(String),
}

/// A per-tick drawing procedure for the routine slot.
pub trait DrawRoutine {
    fn draw(
        &mut self,
        ctx: &mut Canvas,
        frame: &FrequencyFrame,
        dims: Dimensions,
        elapsed_ms: f64,
    ) -> Result<(), RoutineError>;
}
