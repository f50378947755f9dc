use serde::Serialize;

use super::color::Hsl;
use super::emotion::Emotion;
use super::frame::FrequencyFrame;
use super::heatmap::HeatmapSnapshot;
use super::stats::AudioStats;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BpmReport {
    /// Smoothed tempo, 0 until the first valid estimate
    pub current: u32,
    /// Recent smoothed estimates, oldest first (at most 50)
    pub history: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmotionReport {
    /// Published (debounced) label
    pub label: Emotion,
    /// This tick's unsmoothed classification
    pub raw: Emotion,
    pub color: Hsl,
}

/// Everything one tick hands to the rendering boundary. Renderers get it by
/// shared reference and never see analyzer state directly.
#[derive(Clone, Debug, Serialize)]
pub struct FeatureBundle {
    pub tick: u64,
    /// Milliseconds since the session started
    pub elapsed_ms: f64,
    /// False when the frame is the zero placeholder
    pub live: bool,
    pub frame: FrequencyFrame,
    pub stats: AudioStats,
    /// A beat fired on this tick
    pub beat: bool,
    pub bpm: BpmReport,
    pub emotion: EmotionReport,
    pub heatmap: HeatmapSnapshot,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use super::*;
    use crate::analysis::color::palette;

    /// A hand-built bundle for renderer tests.
    pub fn bundle(bins: Vec<u8>, live: bool, emotion: Emotion) -> FeatureBundle {
        let frame = FrequencyFrame::new(bins);
        let stats = crate::analysis::stats::extract(&frame).unwrap_or_default();
        FeatureBundle {
            tick: 1,
            elapsed_ms: 1234.0,
            live,
            frame,
            stats,
            beat: false,
            bpm: BpmReport {
                current: 120,
                history: vec![110, 118, 120, 121],
            },
            emotion: EmotionReport {
                label: emotion,
                raw: emotion,
                color: palette(emotion),
            },
            heatmap: Arc::from(vec![[128.0; crate::analysis::heatmap::HEATMAP_BINS]; 3]),
        }
    }
}
