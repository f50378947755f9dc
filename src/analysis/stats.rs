use serde::Serialize;

use super::frame::FrequencyFrame;
use super::AnalysisError;

const MAX_MAGNITUDE: f32 = 255.0;

/// Emotion-oriented band cut points, as fractions of the frame length.
const LOW_BAND_END: f64 = 0.15;
const MID_BAND_END: f64 = 0.75;

/// Per-tick summary statistics, every field normalized to 0.0-1.0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct AudioStats {
    pub volume: f32,
    /// Equal-thirds bands (distinct from the 15/60/25 emotion split)
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub peak: f32,
    pub rms: f32,
}

/// Derive [`AudioStats`] from one frame. An empty frame is a collaborator bug
/// and fails instead of dividing by zero.
pub fn extract(frame: &FrequencyFrame) -> Result<AudioStats, AnalysisError> {
    let bins = frame.bins();
    if bins.is_empty() {
        return Err(AnalysisError::EmptyFrame);
    }

    let third = bins.len() / 3;
    let peak = bins.iter().copied().max().unwrap_or(0);
    let mean_square = bins.iter().map(|&b| (b as f32) * (b as f32)).sum::<f32>() / bins.len() as f32;

    Ok(AudioStats {
        volume: mean(bins) / MAX_MAGNITUDE,
        bass: mean(&bins[..third]) / MAX_MAGNITUDE,
        mid: mean(&bins[third..third * 2]) / MAX_MAGNITUDE,
        treble: mean(&bins[third * 2..]) / MAX_MAGNITUDE,
        peak: peak as f32 / MAX_MAGNITUDE,
        rms: (mean_square.sqrt() / MAX_MAGNITUDE).min(1.0),
    })
}

/// Mean magnitude of a band; an empty band contributes zero energy.
pub fn mean(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    bins.iter().map(|&b| b as u32).sum::<u32>() as f32 / bins.len() as f32
}

/// Low/mid/high energy split used by the emotion classifier.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandProfile {
    /// Normalized band means (0.0-1.0)
    pub low: f32,
    pub mid: f32,
    pub high: f32,
    pub total: f32,
    /// Population variance of the whole frame, in raw magnitude units
    pub variance: f32,
}

impl BandProfile {
    /// Proportional split: low = [0, 0.15N), mid = [0.15N, 0.75N), high = [0.75N, N).
    /// Short frames degrade to empty bands rather than failing.
    pub fn of(bins: &[u8]) -> Self {
        if bins.is_empty() {
            return Self::default();
        }

        let n = bins.len();
        let low_end = (n as f64 * LOW_BAND_END) as usize;
        let mid_end = ((n as f64 * MID_BAND_END) as usize).max(low_end);

        let total_mean = mean(bins);
        let variance = bins
            .iter()
            .map(|&b| (b as f32 - total_mean).powi(2))
            .sum::<f32>()
            / n as f32;

        Self {
            low: mean(&bins[..low_end]) / MAX_MAGNITUDE,
            mid: mean(&bins[low_end..mid_end]) / MAX_MAGNITUDE,
            high: mean(&bins[mid_end..]) / MAX_MAGNITUDE,
            total: total_mean / MAX_MAGNITUDE,
            variance,
        }
    }
}
