use std::fmt;

use serde::Serialize;

use super::ring::RingBuffer;
use super::stats::BandProfile;

const HISTORY_LEN: usize = 10;
/// Votes needed before the published label may change.
const MIN_VOTES: usize = 5;
/// Minimum dwell between two published changes.
const DWELL_MS: f64 = 1000.0;

const ERRATIC_VARIANCE: f32 = 2000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Excited,
    Calm,
    Sad,
    Romantic,
    Tense,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Excited,
        Emotion::Calm,
        Emotion::Sad,
        Emotion::Romantic,
        Emotion::Tense,
        Emotion::Neutral,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Excited => "excited",
            Emotion::Calm => "calm",
            Emotion::Sad => "sad",
            Emotion::Romantic => "romantic",
            Emotion::Tense => "tense",
            Emotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered decision list; the first matching rule wins.
pub fn classify(profile: &BandProfile) -> Emotion {
    let BandProfile {
        low,
        mid,
        high,
        total,
        variance,
    } = *profile;
    let erratic = variance > ERRATIC_VARIANCE;

    if erratic && high > 0.6 {
        Emotion::Tense
    } else if low > 0.6 && total > 0.5 {
        Emotion::Excited
    } else if total > 0.7 && high > 0.6 {
        Emotion::Excited
    } else if low > 0.5 && total > 0.3 {
        Emotion::Excited
    } else if total < 0.3 && low > high && low < 0.4 {
        Emotion::Calm
    } else if mid > 0.5 && total > 0.4 && total < 0.7 && low < 0.5 {
        Emotion::Romantic
    } else if total < 0.2 {
        Emotion::Sad
    } else {
        Emotion::Neutral
    }
}

/// Plurality-voted emotion with a minimum dwell time between changes. The
/// most frequent vote wins even without an absolute majority of the ring.
#[derive(Clone, Debug)]
pub struct EmotionClassifier {
    votes: RingBuffer<Emotion>,
    current: Emotion,
    last_change_ms: Option<f64>,
}

impl Default for EmotionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionClassifier {
    pub fn new() -> Self {
        Self {
            votes: RingBuffer::new(HISTORY_LEN),
            current: Emotion::Neutral,
            last_change_ms: None,
        }
    }

    /// Currently published emotion.
    pub fn current(&self) -> Emotion {
        self.current
    }

    /// Classify one frame, record the vote, and maybe publish a new label.
    /// Returns the raw (unsmoothed) classification.
    pub fn process(&mut self, profile: &BandProfile, now_ms: f64) -> Emotion {
        let raw = classify(profile);
        self.votes.push(raw);

        let dwelled = self
            .last_change_ms
            .map_or(true, |last| now_ms - last >= DWELL_MS);

        if self.votes.len() >= MIN_VOTES && dwelled {
            if let Some(dominant) = self.dominant() {
                if dominant != self.current {
                    log::debug!("Emotion {} -> {} at {:.0}ms", self.current, dominant, now_ms);
                    self.current = dominant;
                    self.last_change_ms = Some(now_ms);
                }
            }
        }

        raw
    }

    /// Most frequent vote. Ties go to the label that first appears when
    /// scanning the history from oldest to newest.
    fn dominant(&self) -> Option<Emotion> {
        let mut tally: Vec<(Emotion, usize)> = Vec::with_capacity(Emotion::ALL.len());
        for &vote in self.votes.iter() {
            match tally.iter_mut().find(|(emotion, _)| *emotion == vote) {
                Some((_, count)) => *count += 1,
                None => tally.push((vote, 1)),
            }
        }

        let mut best: Option<(Emotion, usize)> = None;
        for (emotion, count) in tally {
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((emotion, count));
            }
        }
        best.map(|(emotion, _)| emotion)
    }
}
