use std::f32::consts::{FRAC_PI_4, TAU};

use super::{Dimensions, DrawRoutine, RoutineError};
use crate::analysis::frame::FrequencyFrame;
use crate::analysis::stats::mean;
use crate::render::canvas::{rgba, Canvas, BLACK};

const ORBITERS: usize = 8;

/// Pulsing glow with eight orbiting dots. Drawn whenever no routine can be.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackOrb;

impl FallbackOrb {
    pub fn paint(&self, ctx: &mut Canvas, frame: &FrequencyFrame, dims: Dimensions, elapsed_ms: f64) {
        let w = dims.width as f32;
        let h = dims.height as f32;
        let t = elapsed_ms as f32;

        ctx.clear(BLACK);
        ctx.fill_rect(0.0, 0.0, w, h, rgba(0, 0, 20, 0.9));

        let cx = w / 2.0;
        let cy = h / 2.0;
        // Never fully collapse, even in silence.
        let level = (mean(frame.bins()) / 255.0).max(0.3 + (t * 0.002).sin() * 0.2);

        ctx.radial_glow(cx, cy, 30.0 + level * 40.0, rgba(0, 255, 255, 0.8));

        let orbit = 50.0 + level * 25.0;
        for i in 0..ORBITERS {
            let angle = (t * 0.001 + i as f32 * FRAC_PI_4) % TAU;
            ctx.fill_circle(
                cx + angle.cos() * orbit,
                cy + angle.sin() * orbit,
                3.0,
                [0, 255, 255, 255],
            );
        }
    }
}

impl DrawRoutine for FallbackOrb {
    fn draw(
        &mut self,
        ctx: &mut Canvas,
        frame: &FrequencyFrame,
        dims: Dimensions,
        elapsed_ms: f64,
    ) -> Result<(), RoutineError> {
        self.paint(ctx, frame, dims, elapsed_ms);
        Ok(())
    }
}
