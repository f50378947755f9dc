use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use super::canvas::{Canvas, Rect, BLACK, TRANSPARENT};
use super::panels::{HeatmapPanel, LevelsPanel, ScopePanel, SpectrumPanel, TempoPanel};
use super::text::TextOverlay;
use super::{panic_message, Renderer};
use crate::analysis::features::FeatureBundle;

const GRID: u32 = 3;
const GAP: u32 = 8;
const BACKGROUND: [u8; 4] = [5, 5, 12, 255];

/// Pixel rectangle of a cell span in an evenly divided 3x3 grid.
pub fn grid_rect(width: u32, height: u32, col: u32, row: u32, cols: u32, rows: u32) -> Rect {
    let cell_w = width.saturating_sub(GAP * (GRID + 1)) / GRID;
    let cell_h = height.saturating_sub(GAP * (GRID + 1)) / GRID;
    Rect {
        x: GAP + col * (cell_w + GAP),
        y: GAP + row * (cell_h + GAP),
        width: (cell_w * cols + GAP * (cols - 1)).max(1),
        height: (cell_h * rows + GAP * (rows - 1)).max(1),
    }
}

struct Slot {
    rect: Rect,
    scratch: Canvas,
    renderer: Box<dyn Renderer>,
    failures: u64,
}

/// Composes independent panels into one frame. A panel that errors or panics
/// is blanked for that tick; the others still draw.
pub struct Dashboard {
    canvas: Canvas,
    slots: Vec<Slot>,
}

impl Dashboard {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: Canvas::new(width, height),
            slots: Vec::new(),
        }
    }

    /// The standard layout: spectrum, levels and tempo across the top row,
    /// the routine slot spanning the lower-left 2x2 block, oscilloscope and
    /// heatmap stacked on the right.
    pub fn standard(
        width: u32,
        height: u32,
        caption: Option<Rc<TextOverlay>>,
        routine: Box<dyn Renderer>,
    ) -> Self {
        let mut dashboard = Self::new(width, height);
        let cell = |col, row, cols, rows| grid_rect(width, height, col, row, cols, rows);
        dashboard.add(cell(0, 0, 1, 1), Box::new(SpectrumPanel));
        dashboard.add(cell(1, 0, 1, 1), Box::new(LevelsPanel));
        dashboard.add(cell(2, 0, 1, 1), Box::new(TempoPanel::new(caption)));
        dashboard.add(cell(0, 1, 2, 2), routine);
        dashboard.add(cell(2, 1, 1, 1), Box::new(ScopePanel));
        dashboard.add(cell(2, 2, 1, 1), Box::new(HeatmapPanel));
        dashboard
    }

    pub fn add(&mut self, rect: Rect, renderer: Box<dyn Renderer>) {
        log::debug!(
            "Panel '{}' at {}x{}+{}+{}",
            renderer.name(),
            rect.width,
            rect.height,
            rect.x,
            rect.y
        );
        self.slots.push(Slot {
            rect,
            scratch: Canvas::new(rect.width, rect.height),
            renderer,
            failures: 0,
        });
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Failure count per panel, in insertion order.
    pub fn failures(&self) -> Vec<(&str, u64)> {
        self.slots.iter().map(|s| (s.renderer.name(), s.failures)).collect()
    }

    pub fn render(&mut self, bundle: &FeatureBundle) -> &Canvas {
        self.canvas.clear(BACKGROUND);
        for slot in &mut self.slots {
            slot.scratch.clear(TRANSPARENT);
            let scratch = &mut slot.scratch;
            let renderer = &mut slot.renderer;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| renderer.render(scratch, bundle)));
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(format!("{:#}", err)),
                Err(payload) => Some(format!("panicked: {}", panic_message(payload.as_ref()))),
            };
            if let Some(reason) = failure {
                slot.failures += 1;
                log::warn!("Tick {}: panel '{}' failed: {}", bundle.tick, slot.renderer.name(), reason);
                slot.scratch.clear(BLACK);
            }
            self.canvas.blit(&slot.scratch, slot.rect.x, slot.rect.y);
        }
        &self.canvas
    }
}
