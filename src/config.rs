use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub routine: RoutineConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default)]
    pub font: Option<String>,
}

/// Byte-spectrum analyser emulation.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AudioConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_smoothing_time_constant")]
    pub smoothing_time_constant: f32,
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
    /// Share of the spectrum (from the bottom) handed to analysis
    #[serde(default = "default_usable_fraction")]
    pub usable_fraction: f32,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_color_intensity")]
    pub color_intensity: f32,
}

#[derive(Debug, Deserialize)]
pub struct RoutineConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_rotate_every_secs")]
    pub rotate_every_secs: f32,
    #[serde(default)]
    pub forbidden_patterns: Option<Vec<String>>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
            font: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing_time_constant: default_smoothing_time_constant(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
            usable_fraction: default_usable_fraction(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            color_intensity: default_color_intensity(),
        }
    }
}

impl Default for RoutineConfig {
    fn default() -> Self {
        Self {
            dir: None,
            rotate_every_secs: default_rotate_every_secs(),
            forbidden_patterns: None,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || self.fft_size < 32 {
            anyhow::bail!("fft_size must be a power of two >= 32, got {}", self.fft_size);
        }
        if !(0.0..1.0).contains(&self.smoothing_time_constant) {
            anyhow::bail!(
                "smoothing_time_constant must be in [0, 1), got {}",
                self.smoothing_time_constant
            );
        }
        if self.min_decibels >= self.max_decibels {
            anyhow::bail!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels,
                self.max_decibels
            );
        }
        if !(self.usable_fraction > 0.0 && self.usable_fraction <= 1.0) {
            anyhow::bail!("usable_fraction must be in (0, 1], got {}", self.usable_fraction);
        }
        Ok(())
    }

    /// Bins per analysis frame after trimming the unused top of the spectrum.
    pub fn usable_bins(&self) -> usize {
        ((self.fft_size / 2) as f64 * self.usable_fraction as f64).floor().max(1.0) as usize
    }
}

fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_fps() -> u32 { 60 }
fn default_crf() -> u32 { 18 }
fn default_codec() -> String { "libx264".into() }
fn default_fft_size() -> usize { 256 }
fn default_smoothing_time_constant() -> f32 { 0.8 }
fn default_min_decibels() -> f32 { -100.0 }
fn default_max_decibels() -> f32 { -30.0 }
fn default_usable_fraction() -> f32 { 0.66 }
fn default_color_intensity() -> f32 { 1.0 }
fn default_rotate_every_secs() -> f32 { 20.0 }

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// `--config`, then `./chromabeat.toml`, then the user config directories.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("chromabeat.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("chromabeat").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("chromabeat").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.output.fps, 60);
        assert_eq!(cfg.audio, AudioConfig::default());
        assert_eq!(cfg.analysis.color_intensity, 1.0);
        assert_eq!(cfg.routine.rotate_every_secs, 20.0);
        assert!(cfg.routine.forbidden_patterns.is_none());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[output]\nfps = 30\n\n[audio]\nfft_size = 512\n\n[routine]\ndir = \"/tmp/routines\"\nforbidden_patterns = [\"exec(\"]"
        )
        .unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.output.fps, 30);
        assert_eq!(cfg.output.width, 1280);
        assert_eq!(cfg.audio.fft_size, 512);
        assert_eq!(cfg.audio.smoothing_time_constant, 0.8);
        assert_eq!(cfg.audio.usable_bins(), 168);
        assert_eq!(cfg.routine.dir, Some(PathBuf::from("/tmp/routines")));
        assert_eq!(cfg.routine.forbidden_patterns, Some(vec!["exec(".to_string()]));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[output\nfps = ").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn default_audio_settings_are_valid() {
        let audio = AudioConfig::default();
        assert!(audio.validate().is_ok());
        assert_eq!(audio.usable_bins(), 84);
    }

    #[test]
    fn rejects_bad_audio_settings() {
        let bad = [
            AudioConfig { fft_size: 96, ..AudioConfig::default() },
            AudioConfig { smoothing_time_constant: 1.0, ..AudioConfig::default() },
            AudioConfig { min_decibels: -20.0, ..AudioConfig::default() },
            AudioConfig { usable_fraction: 0.0, ..AudioConfig::default() },
        ];
        for cfg in bad {
            assert!(cfg.validate().is_err(), "{:?}", cfg);
        }
    }

    #[test]
    fn explicit_config_path_wins() {
        let path = PathBuf::from("/some/where.toml");
        assert_eq!(find_config(Some(&path)), Some(path));
    }
}
