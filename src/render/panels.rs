use anyhow::Result;
use std::rc::Rc;

use super::canvas::{hsla, rgba, Canvas, Rgba, BLACK};
use super::text::TextOverlay;
use super::Renderer;
use crate::analysis::color::Hsl;
use crate::analysis::emotion::Emotion;
use crate::analysis::features::FeatureBundle;
use crate::analysis::heatmap::{HEATMAP_BINS, HEATMAP_FRAMES};

const SPECTRUM_BARS: usize = 64;
/// Total hue spread across the spectrum bars, in degrees.
const BAR_HUE_SPREAD: f32 = 60.0;

/// Emotion-tinted bar spectrum.
#[derive(Default)]
pub struct SpectrumPanel;

impl Renderer for SpectrumPanel {
    fn name(&self) -> &str {
        "spectrum"
    }

    fn render(&mut self, canvas: &mut Canvas, bundle: &FeatureBundle) -> Result<()> {
        let w = canvas.width() as f32;
        let h = canvas.height() as f32;
        let color = bundle.emotion.color;
        let t = bundle.elapsed_ms as f32;

        canvas.clear(BLACK);
        let bg = Hsl::new(color.hue, color.saturation, (color.lightness - 40.0).max(5.0));
        canvas.fill_rect(0.0, 0.0, w, h, hsla(bg, 0.9));

        let bins = bundle.frame.bins();
        if bins.is_empty() {
            return Ok(());
        }

        let bar_w = w / SPECTRUM_BARS as f32;
        let flicker = bundle.emotion.label == Emotion::Tense && (t * 0.01).sin() > 0.5;
        for i in 0..SPECTRUM_BARS {
            let idx = i * bins.len() / SPECTRUM_BARS;
            let magnitude = bins[idx] as f32 / 255.0;
            let idle = h * 0.05 + (t * 0.001 + i as f32).sin() * h * 0.02;
            let bar_h = (magnitude * h * 0.8).max(idle);

            let hue = (color.hue + (i as f32 / SPECTRUM_BARS as f32) * BAR_HUE_SPREAD
                - BAR_HUE_SPREAD / 2.0
                + 360.0)
                % 360.0;
            let fill = if flicker {
                hsla(Hsl::new(hue, color.saturation, (color.lightness * 1.3).min(90.0)), 0.9)
            } else {
                hsla(Hsl::new(hue, color.saturation, color.lightness), 0.8)
            };
            canvas.fill_rect(i as f32 * bar_w, h - bar_h, bar_w - 1.0, bar_h, fill);
        }
        Ok(())
    }
}

/// Horizontal meters for volume and the equal-thirds bands, with a peak tick.
#[derive(Default)]
pub struct LevelsPanel;

const METER_COLORS: [Rgba; 4] = [
    [0, 255, 136, 220],
    [255, 68, 68, 220],
    [255, 200, 40, 220],
    [80, 160, 255, 220],
];

impl Renderer for LevelsPanel {
    fn name(&self) -> &str {
        "levels"
    }

    fn render(&mut self, canvas: &mut Canvas, bundle: &FeatureBundle) -> Result<()> {
        let w = canvas.width() as f32;
        let h = canvas.height() as f32;
        canvas.clear([10, 10, 20, 255]);

        let stats = &bundle.stats;
        let levels = [stats.volume, stats.bass, stats.mid, stats.treble];
        let row_h = h / levels.len() as f32;
        let pad = (row_h * 0.2).max(1.0);
        for (i, (&level, color)) in levels.iter().zip(METER_COLORS).enumerate() {
            let y = i as f32 * row_h + pad;
            canvas.fill_rect(0.0, y, w, row_h - 2.0 * pad, [255, 255, 255, 20]);
            canvas.fill_rect(0.0, y, w * level.clamp(0.0, 1.0), row_h - 2.0 * pad, color);
        }

        let peak_x = (w * stats.peak.clamp(0.0, 1.0)).min(w - 2.0);
        canvas.fill_rect(peak_x, 0.0, 2.0, h, [255, 255, 255, 180]);
        Ok(())
    }
}

/// BPM history over a 60-180 grid.
pub struct TempoPanel {
    caption: Option<Rc<TextOverlay>>,
}

const TEMPO_FLOOR: f32 = 60.0;
const TEMPO_SPAN: f32 = 120.0;
const TEMPO_RED: Rgba = [255, 68, 68, 255];

impl TempoPanel {
    pub fn new(caption: Option<Rc<TextOverlay>>) -> Self {
        Self { caption }
    }

    fn y_for(bpm: f32, h: f32) -> f32 {
        h - ((bpm - TEMPO_FLOOR) / TEMPO_SPAN) * h * 0.8
    }
}

impl Renderer for TempoPanel {
    fn name(&self) -> &str {
        "tempo"
    }

    fn render(&mut self, canvas: &mut Canvas, bundle: &FeatureBundle) -> Result<()> {
        let w = canvas.width() as f32;
        let h = canvas.height() as f32;
        canvas.clear(BLACK);
        canvas.fill_rect(0.0, 0.0, w, h, rgba(20, 0, 0, 0.9));

        for bpm in (60..=180).step_by(20) {
            let y = Self::y_for(bpm as f32, h);
            canvas.line(0.0, y, w, y, 1.0, rgba(255, 100, 100, 0.2));
            if let Some(ref text) = self.caption {
                let label_y = y as i32 - 2 - text.font_size() as i32;
                text.draw(canvas, &bpm.to_string(), 5, label_y, rgba(255, 100, 100, 0.6));
            }
        }

        let history = &bundle.bpm.history;
        if history.len() > 2 {
            let last = (history.len() - 1) as f32;
            let points: Vec<(f32, f32)> = history
                .iter()
                .enumerate()
                .map(|(i, &bpm)| (i as f32 / last * w, Self::y_for(bpm as f32, h)))
                .collect();

            // Translucent area under the trace, one column at a time.
            for pair in points.windows(2) {
                let (x0, y0) = pair[0];
                let (x1, y1) = pair[1];
                let mut x = x0.floor();
                while x < x1 {
                    let t = ((x - x0) / (x1 - x0)).clamp(0.0, 1.0);
                    let y = y0 + (y1 - y0) * t;
                    canvas.fill_rect(x, y, 1.0, h - y, rgba(255, 68, 68, 0.1));
                    x += 1.0;
                }
            }
            canvas.polyline(&points, 2.0, TEMPO_RED);
        }

        if let Some(ref text) = self.caption {
            let label = format!("{} BPM", bundle.bpm.current);
            text.draw_centered(canvas, &label, (w / 2.0) as i32, 8, [255, 102, 102, 255]);
        }
        Ok(())
    }
}

/// Centre-referenced trace of the frame, with an idle wobble near silence.
#[derive(Default)]
pub struct ScopePanel;

const SCOPE_GREEN: Rgba = [0, 255, 136, 255];

impl Renderer for ScopePanel {
    fn name(&self) -> &str {
        "oscilloscope"
    }

    fn render(&mut self, canvas: &mut Canvas, bundle: &FeatureBundle) -> Result<()> {
        let w = canvas.width() as f32;
        let h = canvas.height() as f32;
        let t = bundle.elapsed_ms as f32;
        canvas.clear(BLACK);

        let grid = rgba(0, 255, 136, 0.2);
        for i in 0..=10 {
            let x = (i as f32 * w / 10.0).min(w - 1.0);
            canvas.line(x, 0.0, x, h, 1.0, grid);
        }
        for i in 0..=8 {
            let y = (i as f32 * h / 8.0).min(h - 1.0);
            canvas.line(0.0, y, w, y, 1.0, grid);
        }
        let centre = h / 2.0;
        canvas.line(0.0, centre, w, centre, 1.0, rgba(0, 255, 136, 0.4));

        let bins = bundle.frame.bins();
        let samples = bins.len().min(canvas.width() as usize);
        if samples == 0 {
            return Ok(());
        }
        let amplitude = h * 0.3;
        let points: Vec<(f32, f32)> = bins[..samples]
            .iter()
            .enumerate()
            .map(|(i, &b)| {
                let mut signal = (b as f32 - 127.5) / 127.5;
                if signal.abs() < 0.1 {
                    signal += (t * 0.005 + i as f32 * 0.1).sin() * 0.2;
                }
                (i as f32 / samples as f32 * w, centre - signal * amplitude)
            })
            .collect();
        canvas.polyline(&points, 2.0, SCOPE_GREEN);
        Ok(())
    }
}

/// Ten-step colour ramp for heatmap cells.
pub fn heatmap_color(magnitude: f32) -> [u8; 3] {
    let normalized = magnitude / 255.0;
    match normalized {
        n if n < 0.1 => [17, 24, 39],
        n if n < 0.2 => [30, 58, 138],
        n if n < 0.3 => [29, 78, 216],
        n if n < 0.4 => [59, 130, 246],
        n if n < 0.5 => [6, 182, 212],
        n if n < 0.6 => [34, 197, 94],
        n if n < 0.7 => [234, 179, 8],
        n if n < 0.8 => [249, 115, 22],
        n if n < 0.9 => [239, 68, 68],
        _ => [252, 165, 165],
    }
}

/// Scrolling 40x16 time/frequency grid; oldest column on the left, lowest
/// band on top.
#[derive(Default)]
pub struct HeatmapPanel;

const HEATMAP_PADDING: f32 = 2.0;

impl Renderer for HeatmapPanel {
    fn name(&self) -> &str {
        "heatmap"
    }

    fn render(&mut self, canvas: &mut Canvas, bundle: &FeatureBundle) -> Result<()> {
        let w = canvas.width() as f32;
        let h = canvas.height() as f32;
        canvas.clear([17, 24, 39, 255]);

        let cell_w = (w - 2.0 * HEATMAP_PADDING).max(0.0) / HEATMAP_FRAMES as f32;
        let cell_h = (h - 2.0 * HEATMAP_PADDING).max(0.0) / HEATMAP_BINS as f32;
        for (col, column) in bundle.heatmap.iter().take(HEATMAP_FRAMES).enumerate() {
            for (row, &magnitude) in column.iter().enumerate() {
                let [r, g, b] = heatmap_color(magnitude);
                let opacity = (magnitude / 255.0).max(0.1);
                canvas.fill_rect(
                    HEATMAP_PADDING + col as f32 * cell_w,
                    HEATMAP_PADDING + row as f32 * cell_h,
                    cell_w,
                    cell_h,
                    rgba(r, g, b, opacity),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::fixtures::bundle;

    #[test]
    fn spectrum_bars_rise_with_magnitude() {
        let mut loud = Canvas::new(128, 100);
        SpectrumPanel.render(&mut loud, &bundle(vec![255; 84], true, Emotion::Calm)).unwrap();
        let mut quiet = Canvas::new(128, 100);
        SpectrumPanel.render(&mut quiet, &bundle(vec![0; 84], true, Emotion::Calm)).unwrap();

        // 80% of the height is lit when loud; idle bars stay below 10%.
        assert_ne!(loud.pixel(0, 30), quiet.pixel(0, 30));
        assert_eq!(quiet.pixel(0, 30), quiet.pixel(0, 2));
    }

    #[test]
    fn spectrum_handles_frames_shorter_than_bar_count() {
        let mut canvas = Canvas::new(64, 40);
        SpectrumPanel.render(&mut canvas, &bundle(vec![200; 5], true, Emotion::Tense)).unwrap();
        assert_eq!(canvas.pixel(0, 0).unwrap()[3], 255);
    }

    #[test]
    fn levels_fill_proportionally() {
        let mut canvas = Canvas::new(100, 40);
        let b = bundle(vec![255; 30], true, Emotion::Neutral);
        LevelsPanel.render(&mut canvas, &b).unwrap();
        // Full volume meter reaches the right edge.
        assert_eq!(canvas.pixel(90, 5), canvas.pixel(10, 5));
    }

    #[test]
    fn tempo_draws_grid_and_trace_without_font() {
        let mut canvas = Canvas::new(120, 100);
        let b = bundle(vec![0; 84], true, Emotion::Neutral);
        TempoPanel::new(None).render(&mut canvas, &b).unwrap();
        let grid_y = TempoPanel::y_for(120.0, 100.0).round() as u32;
        assert_ne!(canvas.pixel(60, grid_y), canvas.pixel(60, grid_y + 5));
    }

    #[test]
    fn scope_draws_centre_line() {
        let mut canvas = Canvas::new(80, 41);
        ScopePanel.render(&mut canvas, &bundle(vec![255; 84], true, Emotion::Neutral)).unwrap();
        let px = canvas.pixel(40, 20).unwrap();
        assert!(px[1] > 0);
    }

    #[test]
    fn heatmap_ramp_matches_thresholds() {
        assert_eq!(heatmap_color(0.0), [17, 24, 39]);
        assert_eq!(heatmap_color(128.0), [34, 197, 94]);
        assert_eq!(heatmap_color(255.0), [252, 165, 165]);
    }

    #[test]
    fn heatmap_cells_follow_snapshot() {
        let mut canvas = Canvas::new(164, 68);
        let b = bundle(vec![0; 84], true, Emotion::Neutral);
        HeatmapPanel.render(&mut canvas, &b).unwrap();
        let filled = canvas.pixel(3, 3).unwrap();
        let empty = canvas.pixel(150, 3).unwrap();
        assert_eq!(empty, [17, 24, 39, 255]);
        assert_ne!(filled, empty);
    }
}
