use serde::Serialize;

use super::AnalysisError;

/// One tick's byte magnitudes (0-255), lowest frequency first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FrequencyFrame {
    bins: Vec<u8>,
}

impl FrequencyFrame {
    pub fn new(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    /// Placeholder used when no audio is flowing.
    pub fn silent(len: usize) -> Self {
        Self { bins: vec![0; len] }
    }

    pub fn filled(len: usize, value: u8) -> Self {
        Self {
            bins: vec![value; len],
        }
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn ensure_len(&self, expected: usize) -> Result<(), AnalysisError> {
        if self.bins.is_empty() {
            return Err(AnalysisError::EmptyFrame);
        }
        if self.bins.len() != expected {
            return Err(AnalysisError::FrameLengthMismatch {
                expected,
                actual: self.bins.len(),
            });
        }
        Ok(())
    }
}

impl From<Vec<u8>> for FrequencyFrame {
    fn from(bins: Vec<u8>) -> Self {
        Self::new(bins)
    }
}

/// Yields one frame per tick without blocking. `None` means no audio is
/// currently flowing.
pub trait FrameSource {
    fn poll_frame(&mut self) -> Option<FrequencyFrame>;

    /// Bin count of every frame this source yields.
    fn frame_len(&self) -> usize;
}

/// Replays a fixed list of ticks. `None` entries stand for silent gaps.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    ticks: std::collections::VecDeque<Option<FrequencyFrame>>,
    frame_len: usize,
}

#[cfg(test)]
impl ScriptedSource {
    pub fn new(frame_len: usize, ticks: impl IntoIterator<Item = Option<FrequencyFrame>>) -> Self {
        Self {
            ticks: ticks.into_iter().collect(),
            frame_len,
        }
    }

    pub fn remaining(&self) -> usize {
        self.ticks.len()
    }
}

#[cfg(test)]
impl FrameSource for ScriptedSource {
    fn poll_frame(&mut self) -> Option<FrequencyFrame> {
        self.ticks.pop_front().flatten()
    }

    fn frame_len(&self) -> usize {
        self.frame_len
    }
}
