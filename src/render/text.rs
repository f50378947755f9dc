use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};
use std::path::Path;

use super::canvas::{Canvas, Rgba};

pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    pub fn new(font_bytes: &[u8], font_size: f32) -> Result<Self> {
        let font = Font::from_bytes(font_bytes, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font: {}", e))?;
        Ok(Self { font, font_size })
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    /// Composite text onto the canvas with its top-left corner at (x, y).
    pub fn draw(&self, canvas: &mut Canvas, text: &str, x: i32, y: i32, color: Rgba) {
        let mut cursor_x = x;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.font_size);
            let glyph_y = y + self.font_size as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }
                    let alpha = (coverage as u32 * color[3] as u32 / 255) as u8;
                    canvas.blend(
                        cursor_x + metrics.xmin + gx as i32,
                        glyph_y + gy as i32,
                        [color[0], color[1], color[2], alpha],
                    );
                }
            }

            cursor_x += metrics.advance_width.round() as i32;
        }
    }

    /// Draw text horizontally centred on `cx`.
    pub fn draw_centered(&self, canvas: &mut Canvas, text: &str, cx: i32, y: i32, color: Rgba) {
        let w = self.measure_width(text) as i32;
        self.draw(canvas, text, cx - w / 2, y, color);
    }

    /// Measure the width of rendered text in pixels.
    pub fn measure_width(&self, text: &str) -> u32 {
        let width: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, self.font_size).advance_width)
            .sum();
        width.ceil() as u32
    }
}

/// Read font bytes from a local path, or download them when `source` is an
/// http(s) URL.
pub fn load_font(source: &str) -> Result<Vec<u8>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return load_font_from_url(source);
    }
    let path = Path::new(source);
    std::fs::read(path).with_context(|| format!("Failed to read font file: {}", path.display()))
}

pub fn load_font_from_url(url: &str) -> Result<Vec<u8>> {
    log::info!("Downloading font from {}", url);
    let response = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to fetch font: {}", url))?
        .error_for_status()
        .with_context(|| format!("Font download failed: {}", url))?;
    let bytes = response.bytes().context("Failed to read font response body")?;
    Ok(bytes.to_vec())
}
