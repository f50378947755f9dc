use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use crate::analysis::features::FeatureBundle;
use crate::analysis::session::FeatureSink;
use crate::render::dashboard::Dashboard;

#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pix_fmt: String,
    pub crf: u32,
    pub bitrate: Option<String>,
}

pub struct FfmpegEncoder {
    child: Child,
    /// Drains stderr while encoding; yields everything ffmpeg printed.
    stderr: Option<JoinHandle<String>>,
}

/// Raw RGBA on stdin, the original audio muxed in as AAC. stderr carries
/// errors only, no banner or progress stats.
fn build_args(output_path: &Path, input_audio: &Path, settings: &EncoderSettings) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-nostats",
        "-loglevel", "error",
        "-y",
        "-f", "rawvideo",
        "-pixel_format", "rgba",
    ]
    .iter()
    .map(OsString::from)
    .collect();

    args.extend([
        "-video_size".into(), format!("{}x{}", settings.width, settings.height).into(),
        "-framerate".into(), settings.fps.to_string().into(),
        "-i".into(), "pipe:0".into(),
        "-i".into(), input_audio.as_os_str().to_os_string(),
        "-c:v".into(), OsString::from(&settings.codec),
        "-pix_fmt".into(), OsString::from(&settings.pix_fmt),
    ]);

    if let Some(ref br) = settings.bitrate {
        args.extend(["-b:v".into(), OsString::from(br)]);
    } else {
        args.extend(["-crf".into(), settings.crf.to_string().into()]);
        args.extend(["-preset".into(), "medium".into()]);
    }

    args.extend([
        "-c:a".into(), "aac".into(),
        "-b:a".into(), "192k".into(),
        "-shortest".into(),
        output_path.as_os_str().to_os_string(),
    ]);
    args
}

impl FfmpegEncoder {
    pub fn new(output_path: &Path, input_audio: &Path, settings: &EncoderSettings) -> Result<Self> {
        let mut child = Command::new("ffmpeg")
            .args(build_args(output_path, input_audio, settings))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;
        let stderr = child.stderr.take().map(drain);

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            settings.width, settings.height, settings.fps, settings.codec
        );

        Ok(Self { child, stderr })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // Close stdin to signal EOF
        drop(self.child.stdin.take());

        let status = self.child.wait().context("Failed to wait for ffmpeg")?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Err(err) = pipe.read_to_end(&mut bytes) {
            log::warn!("Reading ffmpeg stderr failed: {}", err);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

/// Composes the dashboard for each tick and pipes it to ffmpeg.
pub struct VideoSink {
    dashboard: Dashboard,
    encoder: FfmpegEncoder,
}

impl VideoSink {
    pub fn new(dashboard: Dashboard, encoder: FfmpegEncoder) -> Self {
        Self { dashboard, encoder }
    }

    pub fn finish(self) -> Result<()> {
        for (panel, failures) in self.dashboard.failures() {
            if failures > 0 {
                log::warn!("Panel '{}' failed on {} frames", panel, failures);
            }
        }
        self.encoder.finish()
    }
}

impl FeatureSink for VideoSink {
    fn present(&mut self, bundle: &FeatureBundle) -> Result<()> {
        let canvas = self.dashboard.render(bundle);
        self.encoder.write_frame(canvas.pixels())
    }
}
