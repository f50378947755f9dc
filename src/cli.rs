use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "chromabeat",
    about = "Audio feature analyzer and emotion-tinted visualizer video generator"
)]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Write per-tick features as JSON lines to this file
    #[arg(long)]
    pub features: Option<PathBuf>,

    /// Skip video rendering (useful with --features)
    #[arg(long)]
    pub no_video: bool,

    /// Video width in pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Frames (analysis ticks) per second
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,

    /// Routines to rotate through (comma-separated, or "all")
    #[arg(short, long, value_delimiter = ',')]
    pub routine: Vec<String>,

    /// Directory holding <name>/routine.json entries
    #[arg(long)]
    pub routines_dir: Option<PathBuf>,

    /// List available routines and exit
    #[arg(long)]
    pub list_routines: bool,

    /// Colour intensity applied to the emotion palette
    #[arg(long, default_value_t = 1.0)]
    pub intensity: f32,

    /// Font file path or http(s) URL for captions
    #[arg(long)]
    pub font: Option<String>,

    /// Config file (defaults to ./chromabeat.toml or the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
