pub mod beat;
pub mod clock;
pub mod color;
pub mod emotion;
pub mod features;
pub mod frame;
pub mod heatmap;
pub mod ring;
pub mod session;
pub mod stats;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("frequency frame is empty")]
    EmptyFrame,
    #[error("frequency frame has {actual} bins, session expects {expected}")]
    FrameLengthMismatch { expected: usize, actual: usize },
}
