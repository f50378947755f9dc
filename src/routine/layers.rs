use std::f32::consts::TAU;

use super::manifest::{Layer, RoutineManifest};
use super::{Dimensions, DrawRoutine, RoutineError};
use crate::analysis::frame::FrequencyFrame;
use crate::analysis::stats::mean;
use crate::render::canvas::{rgba, Canvas};

/// Executes a validated manifest layer by layer.
#[derive(Debug, Clone)]
pub struct LayeredRoutine {
    manifest: RoutineManifest,
}

impl LayeredRoutine {
    pub fn new(manifest: RoutineManifest) -> Self {
        Self { manifest }
    }

    pub fn manifest(&self) -> &RoutineManifest {
        &self.manifest
    }
}

/// Magnitude (0-1) of element `i` of `count`, sampled evenly over the frame.
fn sample(bins: &[u8], i: u32, count: u32) -> f32 {
    let idx = (i as usize * bins.len()) / count.max(1) as usize;
    bins[idx.min(bins.len() - 1)] as f32 / 255.0
}

fn position(i: u32, count: u32) -> f32 {
    if count <= 1 {
        0.0
    } else {
        i as f32 / (count - 1) as f32
    }
}

impl DrawRoutine for LayeredRoutine {
    fn draw(
        &mut self,
        ctx: &mut Canvas,
        frame: &FrequencyFrame,
        dims: Dimensions,
        elapsed_ms: f64,
    ) -> Result<(), RoutineError> {
        let bins = frame.bins();
        if bins.is_empty() {
            return Err(RoutineError::Draw("empty frame".into()));
        }
        let w = dims.width as f32;
        let h = dims.height as f32;
        let cx = w / 2.0;
        let cy = h / 2.0;
        let half_min = dims.min_side() / 2.0;
        let seconds = (elapsed_ms / 1000.0) as f32;

        for layer in &self.manifest.layers {
            match *layer {
                Layer::Fade { ref paint, alpha } => {
                    let [r, g, b] = paint.at(elapsed_ms, 0.0);
                    ctx.fill_rect(0.0, 0.0, w, h, rgba(r, g, b, alpha));
                }
                Layer::Bars {
                    count,
                    height,
                    gap,
                    mirror,
                    ref paint,
                    alpha,
                } => {
                    let slot = w / count as f32;
                    let bar_w = (slot * (1.0 - gap)).max(1.0);
                    for i in 0..count {
                        let bar_h = sample(bins, i, count) * h * height;
                        let [r, g, b] = paint.at(elapsed_ms, position(i, count));
                        let y = if mirror { cy - bar_h / 2.0 } else { h - bar_h };
                        ctx.fill_rect(i as f32 * slot, y, bar_w, bar_h, rgba(r, g, b, alpha));
                    }
                }
                Layer::Ring {
                    count,
                    radius,
                    reach,
                    dot,
                    spin,
                    ref paint,
                    alpha,
                } => {
                    let turn = (spin * seconds).to_radians() % TAU;
                    for i in 0..count {
                        let angle = i as f32 / count as f32 * TAU + turn;
                        let r = (radius + sample(bins, i, count) * reach) * half_min;
                        let [cr, cg, cb] = paint.at(elapsed_ms, position(i, count));
                        ctx.fill_circle(
                            cx + angle.cos() * r,
                            cy + angle.sin() * r,
                            dot,
                            rgba(cr, cg, cb, alpha),
                        );
                    }
                }
                Layer::Orb {
                    radius,
                    gain,
                    glow,
                    ref paint,
                    alpha,
                } => {
                    let level = mean(bins) / 255.0;
                    let r = (radius + gain * level) * half_min;
                    let [cr, cg, cb] = paint.at(elapsed_ms, level);
                    if glow {
                        ctx.radial_glow(cx, cy, r, rgba(cr, cg, cb, alpha));
                    } else {
                        ctx.fill_circle(cx, cy, r, rgba(cr, cg, cb, alpha));
                    }
                }
                Layer::Wave {
                    points,
                    amplitude,
                    thickness,
                    ref paint,
                    alpha,
                } => {
                    let n = points.min(bins.len() as u32).max(2);
                    let trace: Vec<(f32, f32)> = (0..n)
                        .map(|i| {
                            let v = sample(bins, i, n) - 0.5;
                            (position(i, n) * w, cy - v * 2.0 * amplitude * cy)
                        })
                        .collect();
                    let [r, g, b] = paint.at(elapsed_ms, 0.0);
                    ctx.polyline(&trace, thickness, rgba(r, g, b, alpha));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::canvas::{BLACK, TRANSPARENT};
    use crate::routine::manifest::Paint;

    fn routine(layers: Vec<Layer>) -> LayeredRoutine {
        LayeredRoutine::new(RoutineManifest {
            name: "t".into(),
            display_name: "T".into(),
            description: String::new(),
            prompt: None,
            layers,
        })
    }

    fn solid(rgb: [u8; 3]) -> Paint {
        Paint::Solid { rgb }
    }

    fn draw(r: &mut LayeredRoutine, bins: Vec<u8>, w: u32, h: u32) -> Canvas {
        let mut canvas = Canvas::new(w, h);
        let dims = Dimensions::of(&canvas);
        r.draw(&mut canvas, &FrequencyFrame::new(bins), dims, 500.0).unwrap();
        canvas
    }

    #[test]
    fn bars_grow_from_the_bottom() {
        let mut r = routine(vec![Layer::Bars {
            count: 4,
            height: 1.0,
            gap: 0.0,
            mirror: false,
            paint: solid([255, 0, 0]),
            alpha: 1.0,
        }]);
        // Bars sample bins 0, 2, 4 and 6.
        let canvas = draw(&mut r, vec![255, 0, 0, 0, 128, 0, 0, 0], 40, 100);
        assert_eq!(canvas.pixel(5, 1), Some([255, 0, 0, 255]));
        assert_eq!(canvas.pixel(15, 99), Some(TRANSPARENT));
        assert_eq!(canvas.pixel(25, 60), Some([255, 0, 0, 255]));
        assert_eq!(canvas.pixel(25, 40), Some(TRANSPARENT));
    }

    #[test]
    fn fade_then_orb() {
        let mut r = routine(vec![
            Layer::Fade {
                paint: solid([0, 0, 0]),
                alpha: 1.0,
            },
            Layer::Orb {
                radius: 0.2,
                gain: 0.5,
                glow: false,
                paint: solid([0, 255, 255]),
                alpha: 1.0,
            },
        ]);
        let canvas = draw(&mut r, vec![255; 16], 100, 100);
        assert_eq!(canvas.pixel(0, 0), Some(BLACK));
        // Radius (0.2 + 0.5) * 50 = 35.
        assert_eq!(canvas.pixel(50 + 30, 50), Some([0, 255, 255, 255]));
        assert_eq!(canvas.pixel(50 + 40, 50), Some(BLACK));
    }

    #[test]
    fn ring_and_wave_stay_on_canvas() {
        let mut r = routine(vec![
            Layer::Ring {
                count: 1024,
                radius: 1.0,
                reach: 1.0,
                dot: 64.0,
                spin: 3600.0,
                paint: solid([1, 1, 1]),
                alpha: 0.5,
            },
            Layer::Wave {
                points: 1024,
                amplitude: 1.0,
                thickness: 32.0,
                paint: solid([2, 2, 2]),
                alpha: 1.0,
            },
        ]);
        let canvas = draw(&mut r, vec![255; 84], 30, 20);
        assert_eq!(canvas.pixels().len(), 30 * 20 * 4);
    }

    #[test]
    fn empty_frame_is_a_draw_error() {
        let mut r = routine(vec![Layer::Fade {
            paint: solid([0, 0, 0]),
            alpha: 1.0,
        }]);
        let mut canvas = Canvas::new(4, 4);
        let dims = Dimensions::of(&canvas);
        let err = r
            .draw(&mut canvas, &FrequencyFrame::new(Vec::new()), dims, 0.0)
            .unwrap_err();
        assert!(matches!(err, RoutineError::Draw(_)));
    }
}
