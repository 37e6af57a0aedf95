//! Depth estimation.
//!
//! Estimators are constructed explicitly and passed into the pipeline; nothing
//! is loaded at module scope. `estimate_at` wraps any backend with the resize
//! round-trip the pipeline needs: source image down to the model input, depth
//! map back up to the source resolution.

mod backend;
mod backends;
mod map;

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use serde::Deserialize;

pub use backend::{DepthEstimator, DEFAULT_INPUT_SIZE};
pub use backends::{ConstantDepth, LumaDepth};
#[cfg(feature = "backend-tract")]
pub use backends::TractDepth;
pub use map::DepthMap;

use crate::config::DepthSettings;
use crate::frame::Image;

/// Which depth backend to build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthBackendKind {
    /// No depth stage; decoded images are presented as-is.
    None,
    Constant,
    #[default]
    Luma,
    Tract,
}

impl FromStr for DepthBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "constant" | "stub" => Ok(Self::Constant),
            "luma" | "cpu" => Ok(Self::Luma),
            "tract" | "onnx" => Ok(Self::Tract),
            other => Err(anyhow!(
                "unknown depth backend '{}'; expected none, constant, luma or tract",
                other
            )),
        }
    }
}

/// Build the configured estimator. `Ok(None)` selects the depth-less variant.
pub fn build_estimator(settings: &DepthSettings) -> Result<Option<Box<dyn DepthEstimator>>> {
    let estimator: Box<dyn DepthEstimator> = match settings.backend {
        DepthBackendKind::None => return Ok(None),
        DepthBackendKind::Constant => Box::new(ConstantDepth::new(settings.constant_value)),
        DepthBackendKind::Luma => Box::new(LumaDepth::new()),
        DepthBackendKind::Tract => build_tract(settings)?,
    };
    log::info!(
        "depth backend '{}' ready (input {}x{})",
        estimator.name(),
        estimator.input_size().0,
        estimator.input_size().1
    );
    Ok(Some(estimator))
}

#[cfg(feature = "backend-tract")]
fn build_tract(settings: &DepthSettings) -> Result<Box<dyn DepthEstimator>> {
    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("tract depth backend requires a model path"))?;
    let mut backend = TractDepth::new(model_path, settings.input_width, settings.input_height)?
        .with_inverse_output(settings.inverse_output);
    backend.warm_up().context("depth model warm-up failed")?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(_settings: &DepthSettings) -> Result<Box<dyn DepthEstimator>> {
    Err(anyhow!(
        "tract depth backend requires the backend-tract feature"
    ))
}

/// Run `estimator` on `image` and return a depth map at the image's resolution.
pub fn estimate_at(estimator: &mut dyn DepthEstimator, image: &Image) -> Result<DepthMap> {
    let (in_w, in_h) = estimator.input_size();
    let depth = if image.dimensions() == (in_w, in_h) {
        estimator.estimate(image)
    } else {
        let resized = imageops::resize(image, in_w, in_h, FilterType::Triangle);
        estimator.estimate(&resized)
    }
    .with_context(|| format!("depth backend '{}' failed", estimator.name()))?;

    depth.resize_bilinear(image.width(), image.height())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    struct Recording {
        seen: Option<(u32, u32)>,
    }

    impl DepthEstimator for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn input_size(&self) -> (u32, u32) {
            (8, 8)
        }

        fn estimate(&mut self, image: &Image) -> Result<DepthMap> {
            self.seen = Some(image.dimensions());
            Ok(DepthMap::from_fn(4, 4, |x, _| x as f32))
        }
    }

    #[test]
    fn estimate_at_round_trips_resolution() -> Result<()> {
        let image = Image::from_pixel(30, 20, Rgb([10, 20, 30]));
        let mut estimator = Recording { seen: None };

        let depth = estimate_at(&mut estimator, &image)?;
        assert_eq!(estimator.seen, Some((8, 8)));
        assert_eq!(depth.dimensions(), (30, 20));
        Ok(())
    }

    #[test]
    fn parses_backend_names() {
        assert_eq!("None".parse::<DepthBackendKind>().unwrap(), DepthBackendKind::None);
        assert_eq!("stub".parse::<DepthBackendKind>().unwrap(), DepthBackendKind::Constant);
        assert_eq!("onnx".parse::<DepthBackendKind>().unwrap(), DepthBackendKind::Tract);
        assert!("midas".parse::<DepthBackendKind>().is_err());
    }

    #[test]
    fn none_backend_builds_nothing() -> Result<()> {
        let settings = DepthSettings {
            backend: DepthBackendKind::None,
            ..DepthSettings::default()
        };
        assert!(build_estimator(&settings)?.is_none());
        Ok(())
    }
}
