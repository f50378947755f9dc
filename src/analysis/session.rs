use anyhow::{Context, Result};

use super::beat::BeatDetector;
use super::clock::Clock;
use super::color::ColorMapper;
use super::emotion::EmotionClassifier;
use super::features::{BpmReport, EmotionReport, FeatureBundle};
use super::frame::{FrameSource, FrequencyFrame};
use super::heatmap::HeatmapAccumulator;
use super::stats::{self, BandProfile};
use super::AnalysisError;

/// Per-session knobs.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    /// Bins per frame; also the placeholder length when no audio flows
    pub frame_len: usize,
    /// Multiplier applied to the palette's saturation and lightness
    pub color_intensity: f32,
}

impl SessionSettings {
    pub fn new(frame_len: usize) -> Self {
        Self {
            frame_len,
            color_intensity: 1.0,
        }
    }
}

/// Receives each tick's bundle.
pub trait FeatureSink {
    fn present(&mut self, bundle: &FeatureBundle) -> Result<()>;
}

/// Session-scoped owner of all analysis state. Construct one per capture;
/// dropping it is the stop signal.
pub struct AnalysisLoop<C: Clock> {
    clock: C,
    settings: SessionSettings,
    started_at_ms: f64,
    ticks: u64,
    beat: BeatDetector,
    emotion: EmotionClassifier,
    color: ColorMapper,
    heatmap: HeatmapAccumulator,
}

impl<C: Clock> AnalysisLoop<C> {
    pub fn start(clock: C, settings: SessionSettings) -> Self {
        let started_at_ms = clock.now_ms();
        log::info!(
            "Analysis session started ({} bins, color intensity {:.2})",
            settings.frame_len, settings.color_intensity
        );
        Self {
            clock,
            settings,
            started_at_ms,
            ticks: 0,
            beat: BeatDetector::new(),
            emotion: EmotionClassifier::new(),
            color: ColorMapper::new(),
            heatmap: HeatmapAccumulator::new(),
        }
    }

    /// Discard all tempo, emotion, colour and heatmap history, as when a new
    /// audio source is attached.
    pub fn reset(&mut self) {
        self.started_at_ms = self.clock.now_ms();
        self.ticks = 0;
        self.beat = BeatDetector::new();
        self.emotion = EmotionClassifier::new();
        self.color = ColorMapper::new();
        self.heatmap = HeatmapAccumulator::new();
        log::info!("Analysis session reset");
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick. `None` is replaced by a zero frame of the session length;
    /// a wrongly sized frame fails before any state is touched.
    pub fn tick(&mut self, frame: Option<FrequencyFrame>) -> Result<FeatureBundle, AnalysisError> {
        let live = frame.is_some();
        let frame = frame.unwrap_or_else(|| FrequencyFrame::silent(self.settings.frame_len));
        frame.ensure_len(self.settings.frame_len)?;

        let now_ms = self.clock.now_ms();
        let bins = frame.bins();

        let stats = stats::extract(&frame)?;
        let beat = self.beat.process(bins, now_ms);
        let raw = self.emotion.process(&BandProfile::of(bins), now_ms);
        let label = self.emotion.current();
        let color = self.color.update(label, self.settings.color_intensity);
        self.heatmap.process(bins);

        self.ticks += 1;

        Ok(FeatureBundle {
            tick: self.ticks,
            elapsed_ms: now_ms - self.started_at_ms,
            live,
            stats,
            beat: beat.fired,
            bpm: BpmReport {
                current: self.beat.bpm(),
                history: self.beat.history(),
            },
            emotion: EmotionReport { label, raw, color },
            heatmap: self.heatmap.snapshot(),
            frame,
        })
    }

    /// Poll the source, tick, and present the result. Renderers isolate their
    /// own failures, so a sink error is an output failure and is returned. The
    /// tick has already been applied to the analysis state by then.
    pub fn step<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<FeatureBundle>
    where
        S: FrameSource + ?Sized,
        K: FeatureSink + ?Sized,
    {
        let bundle = self.tick(source.poll_frame())?;
        sink.present(&bundle)
            .with_context(|| format!("Tick {}: presenting features failed", bundle.tick))?;
        Ok(bundle)
    }
}
