use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::depth::{DepthBackendKind, DEFAULT_INPUT_SIZE};
use crate::ingest::extractor::{
    DEFAULT_MAX_FRAME_BYTES, DEFAULT_MAX_IDLE_READS, DEFAULT_READ_CHUNK_BYTES,
};
use crate::ingest::port::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use crate::ingest::{ExtractorConfig, PortSettings, ResyncPolicy};
use crate::stereo::{DepthRange, DEFAULT_MAX_DISPARITY};

const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";
const DEFAULT_CONSTANT_DEPTH: f32 = 0.5;
const DEFAULT_OUTPUT_WIDTH: u32 = 1920;
const DEFAULT_OUTPUT_HEIGHT: u32 = 1080;
const DEFAULT_CHANNEL_CAPACITY: usize = 1;

#[derive(Debug, Deserialize, Default)]
struct StereoLinkConfigFile {
    link: Option<LinkConfigFile>,
    depth: Option<DepthConfigFile>,
    stereo: Option<StereoConfigFile>,
    output: Option<OutputConfigFile>,
    diagnostics: Option<DiagnosticsConfigFile>,
    pipeline: Option<PipelineConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct LinkConfigFile {
    device: Option<PathBuf>,
    baud_rate: Option<u32>,
    read_timeout_ms: Option<u64>,
    read_chunk_bytes: Option<usize>,
    max_idle_reads: Option<u32>,
    max_frame_bytes: Option<usize>,
    resync: Option<ResyncPolicy>,
}

#[derive(Debug, Deserialize, Default)]
struct DepthConfigFile {
    backend: Option<DepthBackendKind>,
    model_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    constant_value: Option<f32>,
    inverse_output: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct StereoConfigFile {
    max_disparity: Option<u32>,
    mirror: Option<bool>,
    depth_range: Option<DepthRange>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    every_nth: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DiagnosticsConfigFile {
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    decoupled: Option<bool>,
    channel_capacity: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct StereoLinkConfig {
    pub link: LinkSettings,
    pub depth: DepthSettings,
    pub stereo: StereoSettings,
    pub output: OutputSettings,
    /// Where undecodable payloads are written; `None` drops them.
    pub diagnostics_dir: Option<PathBuf>,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub device: PathBuf,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub read_chunk_bytes: usize,
    pub max_idle_reads: u32,
    pub max_frame_bytes: usize,
    pub resync: ResyncPolicy,
}

impl LinkSettings {
    pub fn port_settings(&self) -> PortSettings {
        PortSettings {
            device: self.device.clone(),
            baud_rate: self.baud_rate,
            read_timeout: self.read_timeout,
        }
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            max_idle_reads: self.max_idle_reads,
            read_chunk_bytes: self.read_chunk_bytes,
            max_frame_bytes: self.max_frame_bytes,
            resync: self.resync,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DepthSettings {
    pub backend: DepthBackendKind,
    pub model_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    /// Value reported by the constant backend.
    pub constant_value: f32,
    /// The model emits inverse depth (larger = nearer).
    pub inverse_output: bool,
}

impl Default for DepthSettings {
    fn default() -> Self {
        Self {
            backend: DepthBackendKind::default(),
            model_path: None,
            input_width: DEFAULT_INPUT_SIZE,
            input_height: DEFAULT_INPUT_SIZE,
            constant_value: DEFAULT_CONSTANT_DEPTH,
            inverse_output: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StereoSettings {
    pub max_disparity: u32,
    /// Flip decoded frames horizontally.
    pub mirror: bool,
    pub depth_range: DepthRange,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    /// Directory for presented frames; `None` only logs them.
    pub dir: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    /// Write one frame in every `every_nth`.
    pub every_nth: u64,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Run extraction on its own thread behind a bounded channel.
    pub decoupled: bool,
    pub channel_capacity: usize,
}

impl StereoLinkConfig {
    /// Load from the file named by `STEREO_LINK_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("STEREO_LINK_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: StereoLinkConfigFile) -> Self {
        let link = file.link.unwrap_or_default();
        let depth = file.depth.unwrap_or_default();
        let stereo = file.stereo.unwrap_or_default();
        let output = file.output.unwrap_or_default();
        let pipeline = file.pipeline.unwrap_or_default();
        let depth_defaults = DepthSettings::default();

        Self {
            link: LinkSettings {
                device: link.device.unwrap_or_else(|| PathBuf::from(DEFAULT_DEVICE)),
                baud_rate: link.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
                read_timeout: link
                    .read_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_READ_TIMEOUT),
                read_chunk_bytes: link.read_chunk_bytes.unwrap_or(DEFAULT_READ_CHUNK_BYTES),
                max_idle_reads: link.max_idle_reads.unwrap_or(DEFAULT_MAX_IDLE_READS),
                max_frame_bytes: link.max_frame_bytes.unwrap_or(DEFAULT_MAX_FRAME_BYTES),
                resync: link.resync.unwrap_or_default(),
            },
            depth: DepthSettings {
                backend: depth.backend.unwrap_or(depth_defaults.backend),
                model_path: depth.model_path,
                input_width: depth.input_width.unwrap_or(depth_defaults.input_width),
                input_height: depth.input_height.unwrap_or(depth_defaults.input_height),
                constant_value: depth.constant_value.unwrap_or(depth_defaults.constant_value),
                inverse_output: depth.inverse_output.unwrap_or(depth_defaults.inverse_output),
            },
            stereo: StereoSettings {
                max_disparity: stereo.max_disparity.unwrap_or(DEFAULT_MAX_DISPARITY),
                mirror: stereo.mirror.unwrap_or(false),
                depth_range: stereo.depth_range.unwrap_or_default(),
            },
            output: OutputSettings {
                dir: output.dir,
                width: output.width.unwrap_or(DEFAULT_OUTPUT_WIDTH),
                height: output.height.unwrap_or(DEFAULT_OUTPUT_HEIGHT),
                every_nth: output.every_nth.unwrap_or(1),
            },
            diagnostics_dir: file.diagnostics.and_then(|diag| diag.dir),
            pipeline: PipelineSettings {
                decoupled: pipeline.decoupled.unwrap_or(false),
                channel_capacity: pipeline
                    .channel_capacity
                    .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(device) = non_empty_env("STEREO_LINK_DEVICE") {
            self.link.device = PathBuf::from(device);
        }
        if let Some(baud) = non_empty_env("STEREO_LINK_BAUD_RATE") {
            self.link.baud_rate = baud
                .parse()
                .map_err(|_| anyhow!("STEREO_LINK_BAUD_RATE must be an integer"))?;
        }
        if let Some(reads) = non_empty_env("STEREO_LINK_MAX_IDLE_READS") {
            self.link.max_idle_reads = reads
                .parse()
                .map_err(|_| anyhow!("STEREO_LINK_MAX_IDLE_READS must be an integer"))?;
        }
        if let Some(disparity) = non_empty_env("STEREO_LINK_MAX_DISPARITY") {
            self.stereo.max_disparity = disparity
                .parse()
                .map_err(|_| anyhow!("STEREO_LINK_MAX_DISPARITY must be an integer pixel count"))?;
        }
        if let Some(backend) = non_empty_env("STEREO_LINK_DEPTH_BACKEND") {
            self.depth.backend = backend.parse()?;
        }
        if let Some(model) = non_empty_env("STEREO_LINK_DEPTH_MODEL") {
            self.depth.model_path = Some(PathBuf::from(model));
        }
        if let Some(dir) = non_empty_env("STEREO_LINK_DIAGNOSTICS_DIR") {
            self.diagnostics_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = non_empty_env("STEREO_LINK_OUTPUT_DIR") {
            self.output.dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.link.max_idle_reads == 0 {
            return Err(anyhow!("max_idle_reads must be greater than zero"));
        }
        if self.link.read_chunk_bytes == 0 {
            return Err(anyhow!("read_chunk_bytes must be greater than zero"));
        }
        if self.link.max_frame_bytes < 4 {
            return Err(anyhow!("max_frame_bytes must fit at least both markers"));
        }
        if self.depth.input_width == 0 || self.depth.input_height == 0 {
            return Err(anyhow!("depth input size must be non-zero"));
        }
        if self.depth.backend == DepthBackendKind::Tract && self.depth.model_path.is_none() {
            return Err(anyhow!("depth backend 'tract' requires depth.model_path"));
        }
        if let DepthRange::Fixed { near, far } = self.stereo.depth_range {
            if !(near.is_finite() && far.is_finite()) || near == far {
                return Err(anyhow!("fixed depth range needs distinct finite bounds"));
            }
        }
        if self.output.width == 0 || self.output.height == 0 {
            return Err(anyhow!("output size must be non-zero"));
        }
        if self.output.every_nth == 0 {
            return Err(anyhow!("output.every_nth must be at least 1"));
        }
        if !(1..=2).contains(&self.pipeline.channel_capacity) {
            return Err(anyhow!("pipeline.channel_capacity must be 1 or 2"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<StereoLinkConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
