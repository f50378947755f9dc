use serde::Deserialize;

use crate::analysis::color::Hsl;

/// Upper bound on any per-layer element count.
pub const MAX_ELEMENTS: u32 = 1024;
const MAX_THICKNESS: f32 = 32.0;
const MAX_DOT: f32 = 64.0;
/// Degrees per second.
const MAX_SPEED: f32 = 3600.0;

#[derive(Debug, Clone, Deserialize)]
pub struct RoutineManifest {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Text the routine was generated from, kept for display only
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

/// One drawing step. Geometry is expressed as fractions of the canvas so the
/// same routine works at any slot size.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Layer {
    /// Wash the whole canvas, leaving trails when alpha < 1.
    Fade {
        #[serde(default)]
        paint: Paint,
        #[serde(default = "default_fade_alpha")]
        alpha: f32,
    },
    /// Vertical bars sampled across the frame.
    Bars {
        count: u32,
        #[serde(default = "default_one")]
        height: f32,
        #[serde(default)]
        gap: f32,
        #[serde(default)]
        mirror: bool,
        paint: Paint,
        #[serde(default = "default_one")]
        alpha: f32,
    },
    /// Dots on a circle, pushed outward by magnitude.
    Ring {
        count: u32,
        radius: f32,
        #[serde(default)]
        reach: f32,
        #[serde(default = "default_dot")]
        dot: f32,
        #[serde(default)]
        spin: f32,
        paint: Paint,
        #[serde(default = "default_one")]
        alpha: f32,
    },
    /// Centre disc sized by mean magnitude.
    Orb {
        radius: f32,
        #[serde(default)]
        gain: f32,
        #[serde(default)]
        glow: bool,
        paint: Paint,
        #[serde(default = "default_one")]
        alpha: f32,
    },
    /// Polyline across the canvas.
    Wave {
        #[serde(default = "default_points")]
        points: u32,
        amplitude: f32,
        #[serde(default = "default_thickness")]
        thickness: f32,
        paint: Paint,
        #[serde(default = "default_one")]
        alpha: f32,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Paint {
    Solid {
        rgb: [u8; 3],
    },
    /// HSL whose hue drifts `speed` degrees per second and fans out by
    /// `spread` degrees across a layer's elements.
    Cycle {
        hue: f32,
        #[serde(default = "default_saturation")]
        saturation: f32,
        #[serde(default = "default_lightness")]
        lightness: f32,
        #[serde(default)]
        speed: f32,
        #[serde(default)]
        spread: f32,
    },
}

impl Default for Paint {
    fn default() -> Self {
        Paint::Solid { rgb: [0, 0, 0] }
    }
}

impl Paint {
    /// Colour at `position` (0-1 across the layer) and time.
    pub fn at(&self, elapsed_ms: f64, position: f32) -> [u8; 3] {
        match *self {
            Paint::Solid { rgb } => rgb,
            Paint::Cycle {
                hue,
                saturation,
                lightness,
                speed,
                spread,
            } => {
                let drift = (speed as f64 * elapsed_ms / 1000.0) % 360.0;
                let h = hue + drift as f32 + spread * position;
                Hsl::new(h, saturation, lightness).to_rgb()
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        match *self {
            Paint::Solid { .. } => Ok(()),
            Paint::Cycle {
                hue,
                saturation,
                lightness,
                speed,
                spread,
            } => {
                finite("hue", hue)?;
                within("saturation", saturation, 0.0, 100.0)?;
                within("lightness", lightness, 0.0, 100.0)?;
                within("speed", speed, -MAX_SPEED, MAX_SPEED)?;
                within("spread", spread, -360.0, 360.0)
            }
        }
    }
}

impl Layer {
    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Fade { .. } => "fade",
            Layer::Bars { .. } => "bars",
            Layer::Ring { .. } => "ring",
            Layer::Orb { .. } => "orb",
            Layer::Wave { .. } => "wave",
        }
    }

    /// Check every field against its bounds so drawing the layer always
    /// finishes in bounded work.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Layer::Fade { ref paint, alpha } => {
                unit("alpha", alpha)?;
                paint.validate()
            }
            Layer::Bars {
                count,
                height,
                gap,
                ref paint,
                alpha,
                ..
            } => {
                count_ok(count)?;
                unit("height", height)?;
                within("gap", gap, 0.0, 0.95)?;
                unit("alpha", alpha)?;
                paint.validate()
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
                count_ok(count)?;
                unit("radius", radius)?;
                unit("reach", reach)?;
                within("dot", dot, 0.5, MAX_DOT)?;
                within("spin", spin, -MAX_SPEED, MAX_SPEED)?;
                unit("alpha", alpha)?;
                paint.validate()
            }
            Layer::Orb {
                radius,
                gain,
                ref paint,
                alpha,
                ..
            } => {
                unit("radius", radius)?;
                unit("gain", gain)?;
                unit("alpha", alpha)?;
                paint.validate()
            }
            Layer::Wave {
                points,
                amplitude,
                thickness,
                ref paint,
                alpha,
            } => {
                if points < 2 {
                    return Err(format!("points must be at least 2, got {}", points));
                }
                count_ok(points)?;
                unit("amplitude", amplitude)?;
                within("thickness", thickness, 0.5, MAX_THICKNESS)?;
                unit("alpha", alpha)?;
                paint.validate()
            }
        }
    }
}

fn count_ok(count: u32) -> Result<(), String> {
    if count == 0 || count > MAX_ELEMENTS {
        return Err(format!("count must be 1-{}, got {}", MAX_ELEMENTS, count));
    }
    Ok(())
}

fn finite(name: &str, value: f32) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{} must be finite", name));
    }
    Ok(())
}

fn within(name: &str, value: f32, lo: f32, hi: f32) -> Result<(), String> {
    finite(name, value)?;
    if value < lo || value > hi {
        return Err(format!("{} must be in [{}, {}], got {}", name, lo, hi, value));
    }
    Ok(())
}

fn unit(name: &str, value: f32) -> Result<(), String> {
    within(name, value, 0.0, 1.0)
}

fn default_one() -> f32 { 1.0 }
fn default_fade_alpha() -> f32 { 0.2 }
fn default_dot() -> f32 { 3.0 }
fn default_points() -> u32 { 128 }
fn default_thickness() -> f32 { 2.0 }
fn default_saturation() -> f32 { 100.0 }
fn default_lightness() -> f32 { 60.0 }
