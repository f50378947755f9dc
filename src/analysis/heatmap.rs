use std::sync::Arc;

use super::ring::RingBuffer;
use super::stats::mean;

pub const HEATMAP_BINS: usize = 16;
pub const HEATMAP_FRAMES: usize = 40;
/// Keep one sample every this many ticks.
const SAMPLE_STRIDE: u64 = 3;

pub type HeatmapColumn = [f32; HEATMAP_BINS];
/// Immutable, cheaply cloned view handed to renderers.
pub type HeatmapSnapshot = Arc<[HeatmapColumn]>;

/// Scrolling, time-decimated history of coarse band magnitudes.
#[derive(Clone, Debug)]
pub struct HeatmapAccumulator {
    ticks: u64,
    columns: RingBuffer<HeatmapColumn>,
    snapshot: HeatmapSnapshot,
}

impl Default for HeatmapAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl HeatmapAccumulator {
    pub fn new() -> Self {
        Self {
            ticks: 0,
            columns: RingBuffer::new(HEATMAP_FRAMES),
            snapshot: Arc::from(Vec::new()),
        }
    }

    /// Count a tick; every third one appends a column. Returns true when the
    /// snapshot changed.
    pub fn process(&mut self, bins: &[u8]) -> bool {
        self.ticks += 1;
        if self.ticks % SAMPLE_STRIDE != 0 {
            return false;
        }

        self.columns.push(downsample(bins));
        self.snapshot = Arc::from(self.columns.to_vec());
        true
    }

    pub fn snapshot(&self) -> HeatmapSnapshot {
        Arc::clone(&self.snapshot)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}

/// Average the frame into 16 equal contiguous bins. Trailing bins that do
/// not fill a whole group are dropped; frames shorter than 16 bins fall back
/// to nearest-bin sampling.
pub fn downsample(bins: &[u8]) -> HeatmapColumn {
    let mut column = [0.0f32; HEATMAP_BINS];
    if bins.is_empty() {
        return column;
    }

    let group = bins.len() / HEATMAP_BINS;
    for (i, cell) in column.iter_mut().enumerate() {
        *cell = if group == 0 {
            bins[i * bins.len() / HEATMAP_BINS] as f32
        } else {
            let start = i * group;
            mean(&bins[start..start + group])
        };
    }
    column
}
