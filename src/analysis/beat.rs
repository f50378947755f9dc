use serde::Serialize;

use super::ring::RingBuffer;
use super::stats::mean;

/// Share of the lowest bins treated as the kick/bass region.
const BASS_FRACTION: f64 = 0.1;
const THRESHOLD_MULTIPLIER: f32 = 1.5;
const THRESHOLD_FLOOR: f32 = 50.0;
/// Minimum spacing between two recorded beats.
const DEBOUNCE_MS: f64 = 300.0;

const BEAT_HISTORY: usize = 6;
const SMOOTHING_SLOTS: usize = 8;
const BPM_HISTORY: usize = 50;

const MIN_BPM: u32 = 30;
const MAX_BPM: u32 = 300;
const HOLD_WEIGHT: f64 = 0.7;
const BLEND_WEIGHT: f64 = 0.3;

/// Beats needed before an interval estimate is attempted.
const ESTIMATE_AFTER: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatPhase {
    /// No beat recorded yet
    Idle,
    /// At least one beat, not enough for an interval estimate
    Tracking,
    /// Enough beats to derive a tempo
    Estimating,
}

/// What happened on one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BeatTick {
    pub fired: bool,
    /// Newly smoothed BPM, when this tick produced one
    pub bpm: Option<u32>,
}

/// Bass-onset beat tracker with trimmed-mean tempo estimation.
///
/// Non-convergence (too few beats, implausible tempo) is never an error: the
/// tick simply leaves the previous estimate in place.
#[derive(Clone, Debug)]
pub struct BeatDetector {
    last_beat_ms: Option<f64>,
    beat_times: RingBuffer<f64>,
    raw_bpms: RingBuffer<u32>,
    smoothed_bpm: u32,
    history: RingBuffer<u32>,
}

impl Default for BeatDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatDetector {
    pub fn new() -> Self {
        Self {
            last_beat_ms: None,
            beat_times: RingBuffer::new(BEAT_HISTORY),
            raw_bpms: RingBuffer::new(SMOOTHING_SLOTS),
            smoothed_bpm: 0,
            history: RingBuffer::new(BPM_HISTORY),
        }
    }

    pub fn phase(&self) -> BeatPhase {
        match self.beat_times.len() {
            0 => BeatPhase::Idle,
            n if n < ESTIMATE_AFTER => BeatPhase::Tracking,
            _ => BeatPhase::Estimating,
        }
    }

    /// Smoothed tempo; 0 until the first accepted estimate.
    pub fn bpm(&self) -> u32 {
        self.smoothed_bpm
    }

    /// Smoothed tempo after each accepted estimate, oldest first.
    pub fn history(&self) -> Vec<u32> {
        self.history.to_vec()
    }

    pub fn beat_count(&self) -> usize {
        self.beat_times.len()
    }

    pub fn process(&mut self, bins: &[u8], now_ms: f64) -> BeatTick {
        let bass_range = (bins.len() as f64 * BASS_FRACTION) as usize;
        let bass_energy = mean(&bins[..bass_range]);
        let threshold = (mean(bins) * THRESHOLD_MULTIPLIER).max(THRESHOLD_FLOOR);

        let debounced = self
            .last_beat_ms
            .map_or(true, |last| now_ms - last >= DEBOUNCE_MS);

        if bass_energy <= threshold || !debounced {
            return BeatTick::default();
        }

        self.beat_times.push(now_ms);
        self.last_beat_ms = Some(now_ms);
        log::debug!(
            "Beat at {:.0}ms (bass {:.1} > threshold {:.1})",
            now_ms, bass_energy, threshold
        );

        BeatTick {
            fired: true,
            bpm: self.estimate(),
        }
    }

    fn estimate(&mut self) -> Option<u32> {
        if self.beat_times.len() < ESTIMATE_AFTER {
            return None;
        }

        let times = self.beat_times.to_vec();
        let mut intervals: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
        intervals.sort_by(|a, b| a.total_cmp(b));

        // Drop the single shortest and longest interval
        let trimmed = &intervals[1..intervals.len() - 1];
        if trimmed.is_empty() {
            return None;
        }

        let avg_interval = trimmed.iter().sum::<f64>() / trimmed.len() as f64;
        if avg_interval <= 0.0 {
            return None;
        }

        let raw_bpm = (60_000.0 / avg_interval).round();
        if !(MIN_BPM as f64..=MAX_BPM as f64).contains(&raw_bpm) {
            log::debug!("Rejected out-of-range tempo {:.0} BPM", raw_bpm);
            return None;
        }

        self.raw_bpms.push(raw_bpm as u32);
        let weighted = self.weighted_average();

        self.smoothed_bpm = if self.smoothed_bpm == 0 {
            weighted
        } else {
            (self.smoothed_bpm as f64 * HOLD_WEIGHT + weighted as f64 * BLEND_WEIGHT).round() as u32
        };
        self.history.push(self.smoothed_bpm);

        log::debug!(
            "Tempo: raw {} BPM, weighted {} BPM, smoothed {} BPM",
            raw_bpm, weighted, self.smoothed_bpm
        );
        Some(self.smoothed_bpm)
    }

    /// Linearly weighted mean: newest sample weighs `len`, oldest weighs 1.
    fn weighted_average(&self) -> u32 {
        let (weighted_sum, total_weight) = self
            .raw_bpms
            .iter()
            .enumerate()
            .fold((0.0f64, 0.0f64), |(sum, total), (i, &bpm)| {
                let weight = (i + 1) as f64;
                (sum + bpm as f64 * weight, total + weight)
            });
        if total_weight == 0.0 {
            return 0;
        }
        (weighted_sum / total_weight).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BINS: usize = 84;
    const TICK_MS: f64 = 1000.0 / 60.0;

    fn pulse() -> Vec<u8> {
        let mut bins = vec![0u8; BINS];
        bins[..8].fill(255);
        bins
    }

    fn quiet() -> Vec<u8> {
        vec![0u8; BINS]
    }

    /// Feed pulses at the given times, silent frames every tick in between.
    fn run(detector: &mut BeatDetector, pulse_times: &[f64]) {
        let end = pulse_times.last().copied().unwrap_or(0.0);
        let mut next = 0;
        let mut t = 0.0;
        while t <= end + TICK_MS {
            if next < pulse_times.len() && t >= pulse_times[next] {
                detector.process(&pulse(), pulse_times[next]);
                next += 1;
            } else {
                detector.process(&quiet(), t);
            }
            t += TICK_MS;
        }
    }

    #[test]
    fn converges_on_steady_120_bpm() {
        let mut detector = BeatDetector::new();
        let times: Vec<f64> = (0..12).map(|i| 1000.0 + i as f64 * 500.0).collect();
        run(&mut detector, &times);

        let bpm = detector.bpm();
        assert!((115..=125).contains(&bpm), "bpm = {}", bpm);
        assert_eq!(detector.phase(), BeatPhase::Estimating);
    }

    #[test]
    fn pulses_inside_debounce_window_count_once() {
        let mut detector = BeatDetector::new();
        assert!(detector.process(&pulse(), 1000.0).fired);
        assert!(!detector.process(&pulse(), 1100.0).fired);
        assert_eq!(detector.beat_count(), 1);
        assert!(detector.process(&pulse(), 1300.0).fired);
        assert_eq!(detector.beat_count(), 2);
    }

    #[test]
    fn phases_follow_beat_count() {
        let mut detector = BeatDetector::new();
        assert_eq!(detector.phase(), BeatPhase::Idle);
        detector.process(&pulse(), 0.0);
        assert_eq!(detector.phase(), BeatPhase::Tracking);
        detector.process(&pulse(), 500.0);
        assert_eq!(detector.phase(), BeatPhase::Tracking);
        detector.process(&pulse(), 1000.0);
        assert_eq!(detector.phase(), BeatPhase::Estimating);
    }

    #[test]
    fn three_beats_are_not_enough_after_trimming() {
        let mut detector = BeatDetector::new();
        for t in [0.0, 500.0, 1000.0] {
            detector.process(&pulse(), t);
        }
        assert_eq!(detector.bpm(), 0);
        let tick = detector.process(&pulse(), 1500.0);
        assert_eq!(tick.bpm, Some(120));
        assert_eq!(detector.history(), vec![120]);
    }

    #[test]
    fn trims_single_outlier_interval() {
        let mut detector = BeatDetector::new();
        for t in [0.0, 500.0, 1000.0, 1900.0, 2400.0, 2900.0] {
            detector.process(&pulse(), t);
        }
        assert_eq!(detector.bpm(), 120);
    }

    #[test]
    fn implausible_tempo_keeps_previous_state() {
        let mut detector = BeatDetector::new();
        for t in [0.0, 3000.0, 6000.0, 9000.0, 12000.0] {
            let tick = detector.process(&pulse(), t);
            assert!(tick.fired);
            assert_eq!(tick.bpm, None);
        }
        assert_eq!(detector.bpm(), 0);
        assert!(detector.history().is_empty());
    }

    #[test]
    fn quiet_or_flat_frames_never_fire() {
        let mut detector = BeatDetector::new();
        for i in 0..200 {
            assert!(!detector.process(&quiet(), i as f64 * 400.0).fired);
            // loud but spectrally flat: bass never exceeds 1.5x the mean
            assert!(!detector.process(&vec![200u8; BINS], i as f64 * 400.0 + 1.0).fired);
        }
        assert_eq!(detector.phase(), BeatPhase::Idle);
    }

    #[test]
    fn short_frames_have_no_bass_region() {
        let mut detector = BeatDetector::new();
        assert!(!detector.process(&[255u8; 5], 0.0).fired);
        assert!(!detector.process(&[], 500.0).fired);
    }

    #[test]
    fn smoothing_blends_towards_new_tempo() {
        let mut detector = BeatDetector::new();
        let mut t = 0.0;
        for _ in 0..6 {
            detector.process(&pulse(), t);
            t += 500.0;
        }
        assert_eq!(detector.bpm(), 120);

        // Tempo drifts to 100 BPM (600ms); the estimate follows gradually
        let mut last = detector.bpm();
        for _ in 0..6 {
            detector.process(&pulse(), t);
            t += 600.0;
            let now = detector.bpm();
            assert!(now <= last && now >= 100, "bpm {} after {}", now, last);
            last = now;
        }
        assert!(last < 120);
    }

    #[test]
    fn history_is_bounded() {
        let mut detector = BeatDetector::new();
        for i in 0..200 {
            detector.process(&pulse(), i as f64 * 500.0);
        }
        let history = detector.history();
        assert_eq!(history.len(), BPM_HISTORY);
        assert!(history.iter().all(|&b| (MIN_BPM..=MAX_BPM).contains(&b)));
    }
}
