use serde::Serialize;

use super::emotion::Emotion;

/// Per-tick approach rate toward the target palette entry.
const APPROACH: f32 = 0.05;

/// Hue in degrees, saturation and lightness in percent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Hsl {
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
}

impl Hsl {
    pub const fn new(hue: f32, saturation: f32, lightness: f32) -> Self {
        Self {
            hue,
            saturation,
            lightness,
        }
    }

    /// Convert to 8-bit RGB. Hue wraps, saturation/lightness clamp to 0-100.
    pub fn to_rgb(self) -> [u8; 3] {
        let h = self.hue.rem_euclid(360.0) / 60.0;
        let s = (self.saturation / 100.0).clamp(0.0, 1.0);
        let l = (self.lightness / 100.0).clamp(0.0, 1.0);

        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let m = l - c / 2.0;

        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        [to_byte(r), to_byte(g), to_byte(b)]
    }
}

/// Base colour for each emotion.
pub fn palette(emotion: Emotion) -> Hsl {
    match emotion {
        Emotion::Excited => Hsl::new(30.0, 100.0, 70.0),
        Emotion::Calm => Hsl::new(200.0, 80.0, 60.0),
        Emotion::Sad => Hsl::new(260.0, 70.0, 50.0),
        Emotion::Romantic => Hsl::new(320.0, 90.0, 70.0),
        Emotion::Tense => Hsl::new(0.0, 100.0, 60.0),
        Emotion::Neutral => Hsl::new(180.0, 80.0, 60.0),
    }
}

/// Displayed colour, eased toward the published emotion's palette entry
/// every tick so discrete label changes never produce a jump.
#[derive(Clone, Debug)]
pub struct ColorMapper {
    current: Hsl,
}

impl Default for ColorMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorMapper {
    pub const INITIAL: Hsl = Hsl::new(200.0, 70.0, 50.0);

    pub fn new() -> Self {
        Self {
            current: Self::INITIAL,
        }
    }

    pub fn current(&self) -> Hsl {
        self.current
    }

    /// `intensity` scales the target saturation and lightness.
    pub fn update(&mut self, emotion: Emotion, intensity: f32) -> Hsl {
        let intensity = if intensity.is_finite() { intensity.max(0.0) } else { 1.0 };
        let target = palette(emotion);

        self.current = Hsl {
            hue: lerp(self.current.hue, target.hue, APPROACH),
            saturation: lerp(self.current.saturation, target.saturation * intensity, APPROACH),
            lightness: lerp(self.current.lightness, target.lightness * intensity, APPROACH),
        };
        self.current
    }
}

fn lerp(start: f32, end: f32, factor: f32) -> f32 {
    start + (end - start) * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approaches_target_without_jumping() {
        let mut mapper = ColorMapper::new();
        let first = mapper.update(Emotion::Tense, 1.0);
        assert!((first.hue - 190.0).abs() < 1e-4);
        assert!((first.saturation - 71.5).abs() < 1e-4);
        assert!((first.lightness - 50.5).abs() < 1e-4);

        let mut prev = first;
        for _ in 0..500 {
            let next = mapper.update(Emotion::Tense, 1.0);
            assert!((next.hue - prev.hue).abs() <= 10.0);
            prev = next;
        }
        let target = palette(Emotion::Tense);
        assert!((prev.hue - target.hue).abs() < 0.01);
        assert!((prev.saturation - target.saturation).abs() < 0.01);
    }

    #[test]
    fn intensity_scales_saturation_and_lightness() {
        let mut mapper = ColorMapper::new();
        for _ in 0..1000 {
            mapper.update(Emotion::Excited, 0.5);
        }
        let c = mapper.current();
        assert!((c.hue - 30.0).abs() < 0.01);
        assert!((c.saturation - 50.0).abs() < 0.01);
        assert!((c.lightness - 35.0).abs() < 0.01);
    }

    #[test]
    fn non_finite_intensity_is_ignored() {
        let mut mapper = ColorMapper::new();
        let c = mapper.update(Emotion::Calm, f32::NAN);
        assert!(c.saturation.is_finite() && c.lightness.is_finite());
    }

    #[test]
    fn hsl_to_rgb_primaries() {
        assert_eq!(Hsl::new(0.0, 100.0, 50.0).to_rgb(), [255, 0, 0]);
        assert_eq!(Hsl::new(120.0, 100.0, 50.0).to_rgb(), [0, 255, 0]);
        assert_eq!(Hsl::new(240.0, 100.0, 50.0).to_rgb(), [0, 0, 255]);
        assert_eq!(Hsl::new(-120.0, 100.0, 50.0).to_rgb(), [0, 0, 255]);
        assert_eq!(Hsl::new(42.0, 0.0, 100.0).to_rgb(), [255, 255, 255]);
        assert_eq!(Hsl::new(42.0, 100.0, 0.0).to_rgb(), [0, 0, 0]);
    }

    #[test]
    fn every_emotion_has_a_palette_entry() {
        for emotion in Emotion::ALL {
            let c = palette(emotion);
            assert!((0.0..360.0).contains(&c.hue));
            assert!(c.saturation > 0.0 && c.lightness > 0.0);
        }
    }
}
