//! stereo-linkd - serial JPEG link to stereo pairs
//!
//! This daemon:
//! 1. Opens the link device and de-frames the JPEG stream
//! 2. Decodes each frame (optionally mirrored)
//! 3. Estimates depth and synthesizes a left/right pair
//! 4. Writes side-by-side output frames, or logs them when no output dir is set
//! 5. Keeps undecodable payloads in the diagnostics dir
//!
//! Runs until Ctrl-C. Exits non-zero if the link device fails.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use stereo_link::{
    build_estimator, DepthBackendKind, DiagnosticSink, DirectoryDiagnostics, DirectorySink,
    DisparitySynthesizer, FrameExtractor, FrameSink, JpegDecoder, LogSink, NullDiagnostics,
    Pipeline, PortReader, StereoLinkConfig, StopSignal,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Receive a serial JPEG stream and synthesize stereo pairs"
)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "STEREO_LINK_CONFIG")]
    config: Option<PathBuf>,

    /// Link device or capture file.
    #[arg(long)]
    device: Option<PathBuf>,

    /// Parallax bound in pixels.
    #[arg(long)]
    max_disparity: Option<u32>,

    /// none, constant, luma or tract.
    #[arg(long)]
    depth_backend: Option<DepthBackendKind>,

    /// ONNX depth model for the tract backend.
    #[arg(long)]
    depth_model: Option<PathBuf>,

    /// Write side-by-side frames here.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Write undecodable payloads here.
    #[arg(long)]
    diagnostics_dir: Option<PathBuf>,

    /// Mirror decoded frames horizontally.
    #[arg(long)]
    mirror: bool,

    /// Read the link on its own thread.
    #[arg(long)]
    decoupled: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = StereoLinkConfig::load_from(args.config.as_deref())?;
    apply_args(&mut cfg, &args);
    cfg.validate()?;

    let mut reader = PortReader::open(&cfg.link.port_settings())?;
    let extractor = FrameExtractor::new(cfg.link.extractor_config());
    let decoder = JpegDecoder::new().with_mirror(cfg.stereo.mirror);

    let sink: Box<dyn FrameSink> = match &cfg.output.dir {
        Some(dir) => {
            log::info!(
                "writing {}x{} frames to {}",
                cfg.output.width,
                cfg.output.height,
                dir.display()
            );
            Box::new(
                DirectorySink::new(dir, cfg.output.width, cfg.output.height)?
                    .with_every_nth(cfg.output.every_nth),
            )
        }
        None => Box::new(LogSink),
    };
    let diagnostics: Box<dyn DiagnosticSink> = match &cfg.diagnostics_dir {
        Some(dir) => Box::new(DirectoryDiagnostics::new(dir)?),
        None => Box::new(NullDiagnostics),
    };

    let mut pipeline =
        Pipeline::new(extractor, Box::new(decoder), sink).with_diagnostics(diagnostics);
    match build_estimator(&cfg.depth)? {
        Some(estimator) => {
            let synthesizer = DisparitySynthesizer::new(cfg.stereo.max_disparity)
                .with_range(cfg.stereo.depth_range);
            pipeline = pipeline.with_depth(estimator, synthesizer);
        }
        None => log::info!("depth stage disabled; presenting decoded frames"),
    }

    let stop = StopSignal::new();
    pipeline = pipeline.with_stop_signal(stop.clone());
    ctrlc::set_handler(move || stop.stop())
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!(
        "stereo-linkd running. max_disparity={}, depth={:?}",
        cfg.stereo.max_disparity,
        cfg.depth.backend
    );
    let result = if cfg.pipeline.decoupled {
        pipeline.run_decoupled(&mut reader, cfg.pipeline.channel_capacity)
    } else {
        pipeline.run(&mut reader)
    };

    let stats = result.map_err(|e| anyhow!("link failed: {}", e))?;
    log::info!(
        "shutdown: frames={} presented={} decode_failures={} timeouts={}",
        stats.frames,
        stats.presented,
        stats.decode_failures,
        stats.timeouts
    );
    Ok(())
}

fn apply_args(cfg: &mut StereoLinkConfig, args: &Args) {
    if let Some(device) = &args.device {
        cfg.link.device = device.clone();
    }
    if let Some(max_disparity) = args.max_disparity {
        cfg.stereo.max_disparity = max_disparity;
    }
    if let Some(backend) = args.depth_backend {
        cfg.depth.backend = backend;
    }
    if let Some(model) = &args.depth_model {
        cfg.depth.model_path = Some(model.clone());
    }
    if let Some(dir) = &args.output_dir {
        cfg.output.dir = Some(dir.clone());
    }
    if let Some(dir) = &args.diagnostics_dir {
        cfg.diagnostics_dir = Some(dir.clone());
    }
    if args.mirror {
        cfg.stereo.mirror = true;
    }
    if args.decoupled {
        cfg.pipeline.decoupled = true;
    }
}
