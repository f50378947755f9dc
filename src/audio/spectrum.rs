use anyhow::Result;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use std::collections::VecDeque;

use super::decode::DecodedAudio;
use crate::analysis::frame::{FrameSource, FrequencyFrame};
use crate::config::AudioConfig;

/// Ticks transformed per parallel batch; bounds the magnitudes held at once.
const BATCH_TICKS: usize = 512;

fn to_byte(magnitude: f32, min_db: f32, max_db: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (db - min_db) / (max_db - min_db) * 255.0;
    scaled.floor().clamp(0.0, 255.0) as u8
}

fn blackman_window(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n;
            0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
        })
        .collect()
}

/// Byte-magnitude frames computed on demand, one per video tick, the way a
/// browser analyser node reports them: Blackman window, per-bin temporal
/// smoothing, decibel range mapped onto 0-255. Only the usable low part of
/// the spectrum is kept.
pub struct SpectrumFrameSource {
    audio: DecodedAudio,
    settings: AudioConfig,
    fps: u32,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    next_tick: usize,
    total_ticks: usize,
    pending: VecDeque<FrequencyFrame>,
}

impl SpectrumFrameSource {
    pub fn new(audio: DecodedAudio, fps: u32, settings: &AudioConfig) -> Result<Self> {
        settings.validate()?;
        let fps = fps.max(1);
        let total_ticks = (audio.duration_secs() * fps as f32).ceil() as usize;
        let fft_size = settings.fft_size;

        log::info!(
            "Spectrum: {} ticks, fft {} -> {} of {} bins",
            total_ticks,
            fft_size,
            settings.usable_bins(),
            fft_size / 2
        );

        Ok(Self {
            audio,
            settings: settings.clone(),
            fps,
            window: blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            next_tick: 0,
            total_ticks,
            pending: VecDeque::with_capacity(BATCH_TICKS),
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len() + (self.total_ticks - self.next_tick)
    }

    /// Transform the next batch of ticks. FFT magnitudes are independent per
    /// tick; smoothing carries state from tick to tick.
    fn fill(&mut self) {
        let end_tick = (self.next_tick + BATCH_TICKS).min(self.total_ticks);
        let fft_size = self.settings.fft_size;
        let bins = fft_size / 2;
        let (audio, window, fps) = (&self.audio, &self.window, self.fps as u64);

        let magnitudes: Vec<Vec<f32>> = (self.next_tick..end_tick)
            .into_par_iter()
            .map_init(
                || FftPlanner::<f32>::new(),
                |planner, tick| {
                    let end = (tick as u64 * audio.sample_rate as u64 / fps) as usize;
                    let fft = planner.plan_fft_forward(fft_size);
                    let mut buffer: Vec<Complex<f32>> = (0..fft_size)
                        .map(|i| {
                            let sample = (end + i)
                                .checked_sub(fft_size)
                                .and_then(|idx| audio.samples.get(idx))
                                .copied()
                                .unwrap_or(0.0);
                            Complex::new(sample * window[i], 0.0)
                        })
                        .collect();
                    fft.process(&mut buffer);
                    buffer[..bins]
                        .iter()
                        .map(|c| c.norm() / fft_size as f32)
                        .collect()
                },
            )
            .collect();

        let tau = self.settings.smoothing_time_constant;
        let usable = self.settings.usable_bins();
        for mags in magnitudes {
            for (s, m) in self.smoothed.iter_mut().zip(mags) {
                *s = tau * *s + (1.0 - tau) * m;
            }
            let bytes = self.smoothed[..usable]
                .iter()
                .map(|&m| to_byte(m, self.settings.min_decibels, self.settings.max_decibels))
                .collect();
            self.pending.push_back(FrequencyFrame::new(bytes));
        }
        self.next_tick = end_tick;
    }
}

impl FrameSource for SpectrumFrameSource {
    fn poll_frame(&mut self) -> Option<FrequencyFrame> {
        if self.pending.is_empty() && self.next_tick < self.total_ticks {
            self.fill();
        }
        self.pending.pop_front()
    }

    fn frame_len(&self) -> usize {
        self.settings.usable_bins()
    }
}
