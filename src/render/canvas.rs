use crate::analysis::color::Hsl;

pub type Rgba = [u8; 4];

pub const BLACK: Rgba = [0, 0, 0, 255];
pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

/// Straight-alpha colour from an HSL triple.
pub fn hsla(color: Hsl, alpha: f32) -> Rgba {
    let [r, g, b] = color.to_rgb();
    [r, g, b, alpha_byte(alpha)]
}

pub fn rgba(r: u8, g: u8, b: u8, alpha: f32) -> Rgba {
    [r, g, b, alpha_byte(alpha)]
}

fn alpha_byte(alpha: f32) -> u8 {
    if alpha.is_nan() {
        return 0;
    }
    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Axis-aligned pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// RGBA8 software surface, row-major, what ffmpeg reads as `rgba`.
#[derive(Clone, Debug)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = self.index(x, y);
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.pixels[idx..idx + 4]);
        Some(out)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + x as usize) * 4
    }

    /// Overwrite every pixel.
    pub fn clear(&mut self, color: Rgba) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    /// Source-over blend of one pixel. Out-of-range coordinates are ignored.
    pub fn blend(&mut self, x: i32, y: i32, color: Rgba) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 || color[3] == 0 {
            return;
        }
        let idx = self.index(x as u32, y as u32);
        let px = &mut self.pixels[idx..idx + 4];
        if color[3] == 255 {
            px.copy_from_slice(&color);
            return;
        }

        let a = color[3] as f32 / 255.0;
        let inv = 1.0 - a;
        for c in 0..3 {
            px[c] = (color[c] as f32 * a + px[c] as f32 * inv).round() as u8;
        }
        px[3] = (color[3] as f32 + px[3] as f32 * inv).round().min(255.0) as u8;
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) {
        if !(x.is_finite() && y.is_finite() && w.is_finite() && h.is_finite()) {
            return;
        }
        let x0 = x.max(0.0).round() as i32;
        let y0 = y.max(0.0).round() as i32;
        let x1 = (x + w).min(self.width as f32).round() as i32;
        let y1 = (y + h).min(self.height as f32).round() as i32;
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, color);
            }
        }
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba) {
        if !(cx.is_finite() && cy.is_finite() && radius.is_finite()) || radius <= 0.0 {
            return;
        }
        let r2 = radius * radius;
        let x0 = (cx - radius).floor().max(0.0) as i32;
        let x1 = (cx + radius).ceil().min(self.width as f32) as i32;
        let y0 = (cy - radius).floor().max(0.0) as i32;
        let y1 = (cy + radius).ceil().min(self.height as f32) as i32;
        for py in y0..y1 {
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= r2 {
                    self.blend(px, py, color);
                }
            }
        }
    }

    /// Radial falloff from `color` at the centre to transparent at `radius`.
    pub fn radial_glow(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba) {
        if !(cx.is_finite() && cy.is_finite() && radius.is_finite()) || radius <= 0.0 {
            return;
        }
        let x0 = (cx - radius).floor().max(0.0) as i32;
        let x1 = (cx + radius).ceil().min(self.width as f32) as i32;
        let y0 = (cy - radius).floor().max(0.0) as i32;
        let y1 = (cy + radius).ceil().min(self.height as f32) as i32;
        for py in y0..y1 {
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                let d = (dx * dx + dy * dy).sqrt() / radius;
                if d < 1.0 {
                    let alpha = (color[3] as f32 * (1.0 - d)).round() as u8;
                    self.blend(px, py, [color[0], color[1], color[2], alpha]);
                }
            }
        }
    }

    /// Line segment of the given thickness, stamped along its length.
    pub fn line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, thickness: f32, color: Rgba) {
        if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
            return;
        }
        let half = (thickness.max(1.0)) / 2.0;
        let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as usize;
        // Stamping overlapping squares would compound alpha, so collect first.
        let mut covered = std::collections::HashSet::new();
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = x0 + (x1 - x0) * t;
            let y = y0 + (y1 - y0) * t;
            let lo_x = (x - half + 0.5).floor() as i32;
            let lo_y = (y - half + 0.5).floor() as i32;
            let span = (half * 2.0).round().max(1.0) as i32;
            for py in lo_y..lo_y + span {
                for px in lo_x..lo_x + span {
                    covered.insert((px, py));
                }
            }
        }
        for (px, py) in covered {
            self.blend(px, py, color);
        }
    }

    /// Connected line through `points`.
    pub fn polyline(&mut self, points: &[(f32, f32)], thickness: f32, color: Rgba) {
        for pair in points.windows(2) {
            self.line(pair[0].0, pair[0].1, pair[1].0, pair[1].1, thickness, color);
        }
    }

    /// Copy `src` onto this canvas with its top-left corner at (x, y). Pixels
    /// are copied, not blended; anything outside this canvas is clipped.
    pub fn blit(&mut self, src: &Canvas, x: u32, y: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let cols = src.width.min(self.width - x) as usize;
        let rows = src.height.min(self.height - y);
        for row in 0..rows {
            let s = src.index(0, row);
            let d = self.index(x, y + row);
            self.pixels[d..d + cols * 4].copy_from_slice(&src.pixels[s..s + cols * 4]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_canvas_is_transparent() {
        let canvas = Canvas::new(4, 3);
        assert_eq!(canvas.pixels().len(), 4 * 3 * 4);
        assert_eq!(canvas.pixel(3, 2), Some(TRANSPARENT));
        assert_eq!(canvas.pixel(4, 0), None);
    }

    #[test]
    fn blending_half_white_over_black() {
        let mut canvas = Canvas::new(1, 1);
        canvas.clear(BLACK);
        canvas.blend(0, 0, rgba(255, 255, 255, 0.5));
        let px = canvas.pixel(0, 0).unwrap();
        assert!((127..=129).contains(&px[0]));
        assert_eq!(px[3], 255);
    }

    #[test]
    fn fill_rect_clips_to_bounds() {
        let mut canvas = Canvas::new(10, 10);
        canvas.fill_rect(-5.0, 8.0, 100.0, 100.0, BLACK);
        assert_eq!(canvas.pixel(0, 8), Some(BLACK));
        assert_eq!(canvas.pixel(9, 9), Some(BLACK));
        assert_eq!(canvas.pixel(0, 7), Some(TRANSPARENT));
    }

    #[test]
    fn non_finite_geometry_draws_nothing() {
        let mut canvas = Canvas::new(8, 8);
        canvas.fill_rect(f32::NAN, 0.0, 4.0, 4.0, BLACK);
        canvas.fill_circle(4.0, 4.0, f32::INFINITY, BLACK);
        canvas.line(0.0, 0.0, f32::NAN, 3.0, 2.0, BLACK);
        assert!(canvas.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn circle_covers_centre_not_corners() {
        let mut canvas = Canvas::new(20, 20);
        canvas.fill_circle(10.0, 10.0, 5.0, BLACK);
        assert_eq!(canvas.pixel(10, 10), Some(BLACK));
        assert_eq!(canvas.pixel(0, 0), Some(TRANSPARENT));
        assert_eq!(canvas.pixel(14, 14), Some(TRANSPARENT));
    }

    #[test]
    fn line_alpha_does_not_compound() {
        let mut canvas = Canvas::new(20, 5);
        canvas.clear(BLACK);
        canvas.line(0.0, 2.0, 19.0, 2.0, 3.0, rgba(255, 0, 0, 0.5));
        let a = canvas.pixel(5, 2).unwrap();
        let b = canvas.pixel(15, 2).unwrap();
        assert_eq!(a, b);
        assert!((127..=129).contains(&a[0]));
    }

    #[test]
    fn blit_places_and_clips() {
        let mut src = Canvas::new(4, 4);
        src.clear([9, 8, 7, 255]);
        let mut dst = Canvas::new(6, 6);
        dst.blit(&src, 4, 4);
        assert_eq!(dst.pixel(4, 4), Some([9, 8, 7, 255]));
        assert_eq!(dst.pixel(5, 5), Some([9, 8, 7, 255]));
        assert_eq!(dst.pixel(3, 3), Some(TRANSPARENT));
    }

    #[test]
    fn glow_fades_outward() {
        let mut canvas = Canvas::new(21, 21);
        canvas.radial_glow(10.5, 10.5, 10.0, [0, 255, 255, 200]);
        let centre = canvas.pixel(10, 10).unwrap()[3];
        let edge = canvas.pixel(18, 10).unwrap()[3];
        assert!(centre > edge);
        assert_eq!(canvas.pixel(0, 0), Some(TRANSPARENT));
    }

    #[test]
    fn hsla_uses_palette_conversion() {
        let red = hsla(Hsl::new(0.0, 100.0, 50.0), 1.0);
        assert_eq!(red, [255, 0, 0, 255]);
        assert_eq!(hsla(Hsl::new(0.0, 100.0, 50.0), f32::NAN)[3], 0);
    }
}
