mod analysis;
mod audio;
mod cli;
mod config;
mod encode;
mod render;
mod routine;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::rc::Rc;

use analysis::clock::ManualClock;
use analysis::frame::FrameSource;
use analysis::session::{AnalysisLoop, FeatureSink, SessionSettings};
use audio::spectrum::SpectrumFrameSource;
use cli::Cli;
use config::Config;
use encode::ffmpeg::{EncoderSettings, FfmpegEncoder, VideoSink};
use encode::jsonl::{FeatureWriter, Tee};
use render::dashboard::Dashboard;
use render::text::{load_font, TextOverlay};
use routine::guard::{RoutineGuard, DEFAULT_FORBIDDEN};
use routine::host::RoutineHost;
use routine::loader;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let cfg = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) => {
                log::warn!("{:#}", err);
                Config::default()
            }
        },
        None => Config::default(),
    };
    merge_config(&mut cli, &cfg);

    let routines_dir = cli
        .routines_dir
        .clone()
        .or_else(|| cfg.routine.dir.clone())
        .unwrap_or_else(loader::find_routines_dir);

    if cli.list_routines {
        let names = loader::list_routines(&routines_dir)?;
        println!("Available routines ({}):", routines_dir.display());
        for name in &names {
            let summary = loader::load_routine_text(&routines_dir, name)
                .ok()
                .and_then(|text| loader::summarize(&text));
            match summary {
                Some(s) => println!("  {:<20} {}", s.display_name, s.description),
                None => println!("  {}", name),
            }
        }
        return Ok(());
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    if cli.no_video && cli.features.is_none() {
        anyhow::bail!("Nothing to do: --no-video without --features");
    }
    if cli.fps == 0 {
        anyhow::bail!("--fps must be positive");
    }

    log::info!("chromabeat - audio feature analyzer");
    log::info!("Input: {}", input.display());
    if !cli.no_video {
        log::info!("Output: {}", cli.output.display());
        log::info!("Resolution: {}x{} @ {}fps", cli.width, cli.height, cli.fps);
    }

    // 1. Decode and emulate the byte-spectrum analyser
    log::info!("Decoding audio...");
    let audio_data = audio::decode::decode_file(input)?;
    let duration_secs = audio_data.duration_secs();
    let mut source = SpectrumFrameSource::new(audio_data, cli.fps, &cfg.audio)?;
    let frame_len = source.frame_len();
    let total_ticks = source.remaining();
    log::info!(
        "Total ticks: {}, {} bins each, duration {:.1}s",
        total_ticks, frame_len, duration_secs
    );

    // 2. Analysis session on media time
    let clock = ManualClock::new(0.0);
    let mut session = AnalysisLoop::start(
        clock.clone(),
        SessionSettings {
            frame_len,
            color_intensity: cli.intensity,
        },
    );

    // 3. Sinks
    let mut video = if cli.no_video {
        None
    } else {
        Some(build_video_sink(&cli, &cfg, &routines_dir, input)?)
    };
    let mut features = match cli.features {
        Some(ref path) => {
            log::info!("Writing features to {}", path.display());
            Some(FeatureWriter::create(path)?)
        }
        None => None,
    };

    // 4. Tick loop
    let pb = ProgressBar::new(total_ticks as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ticks ({eta} remaining)")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );

    let tick_ms = 1000.0 / cli.fps as f64;
    {
        let mut tee = Tee::default();
        if let Some(ref mut v) = video {
            tee.push(v as &mut dyn FeatureSink);
        }
        if let Some(ref mut f) = features {
            tee.push(f as &mut dyn FeatureSink);
        }

        let mut last_bpm = 0;
        while source.remaining() > 0 {
            let bundle = session.step(&mut source, &mut tee)?;
            if bundle.bpm.current != last_bpm {
                log::debug!("Tick {}: {} BPM", bundle.tick, bundle.bpm.current);
                last_bpm = bundle.bpm.current;
            }
            clock.advance(tick_ms);
            pb.set_position(session.ticks());
        }
    }
    pb.finish_with_message("Analysis complete");

    // 5. Finish outputs
    if let Some(f) = features {
        let written = f.written();
        f.finish()?;
        log::info!("Wrote {} feature lines", written);
    }
    if let Some(v) = video {
        log::info!("Finishing encoding...");
        v.finish()?;
        log::info!("Done! Output: {}", cli.output.display());
    }
    Ok(())
}

/// Config values apply only where the CLI is still at its default.
fn merge_config(cli: &mut Cli, cfg: &Config) {
    if cli.width == 1280 { cli.width = cfg.output.width; }
    if cli.height == 720 { cli.height = cfg.output.height; }
    if cli.fps == 60 { cli.fps = cfg.output.fps; }
    if cli.crf == 18 { cli.crf = cfg.output.crf; }
    if cli.codec == "libx264" { cli.codec = cfg.output.codec.clone(); }
    if cli.intensity == 1.0 { cli.intensity = cfg.analysis.color_intensity; }
    if cli.font.is_none() {
        cli.font = cfg.output.font.clone();
    }
}

fn build_video_sink(cli: &Cli, cfg: &Config, routines_dir: &Path, input: &Path) -> Result<VideoSink> {
    let guard = match cfg.routine.forbidden_patterns {
        Some(ref patterns) => RoutineGuard::new(patterns.iter().cloned()),
        None => RoutineGuard::new(DEFAULT_FORBIDDEN),
    };

    let mut host = RoutineHost::new(cfg.routine.rotate_every_secs);
    let requested = if cli.routine.is_empty() {
        vec!["all".to_string()]
    } else {
        cli.routine.clone()
    };
    for name in loader::resolve_names(routines_dir, &requested)? {
        let text = match loader::load_routine_text(routines_dir, &name) {
            Ok(text) => text,
            Err(err) => {
                log::warn!("{:#}", err);
                continue;
            }
        };
        match guard.admit(&text) {
            Ok(routine) => {
                log::info!("Routine [{}]: {}", host.len(), routine.manifest().display_name);
                host.push(name, Box::new(routine));
            }
            Err(err) => log::warn!("Routine '{}' rejected: {}", name, err),
        }
    }
    if host.is_empty() {
        log::info!("No routines admitted, using the fallback orb");
    }

    let caption = match cli.font {
        Some(ref source) => match load_font(source).and_then(|bytes| {
            let size = (cli.width.min(cli.height) as f32 * 0.022).max(12.0);
            TextOverlay::new(&bytes, size)
        }) {
            Ok(overlay) => Some(Rc::new(overlay)),
            Err(err) => {
                log::warn!("Captions disabled: {:#}", err);
                None
            }
        },
        None => None,
    };

    let dashboard = Dashboard::standard(cli.width, cli.height, caption, Box::new(host));

    log::info!("Starting FFmpeg encoder...");
    let encoder = FfmpegEncoder::new(
        &cli.output,
        input,
        &EncoderSettings {
            width: cli.width,
            height: cli.height,
            fps: cli.fps,
            codec: cli.codec.clone(),
            pix_fmt: cli.pix_fmt.clone(),
            crf: cli.crf,
            bitrate: cli.bitrate.clone(),
        },
    )?;
    Ok(VideoSink::new(dashboard, encoder))
}
