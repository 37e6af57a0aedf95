#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::depth::backend::DepthEstimator;
use crate::depth::DepthMap;
use crate::frame::Image;

/// Tract-based backend for ONNX monocular depth models (MiDaS-style).
///
/// The model takes a `1x3xHxW` f32 tensor scaled to `[0, 1]` and produces an
/// `HxW` map (any leading unit dimensions are ignored). Models that emit
/// inverse depth should be loaded `with_inverse_output(true)` so nearer
/// surfaces come out with lower values.
pub struct TractDepth {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
    inverse_output: bool,
}

impl TractDepth {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            inverse_output: false,
        })
    }

    pub fn with_inverse_output(mut self, inverse: bool) -> Self {
        self.inverse_output = inverse;
        self
    }

    fn build_input(&self, image: &Image) -> Result<Tensor> {
        if image.dimensions() != (self.width, self.height) {
            return Err(anyhow!(
                "image size {}x{} does not match model input {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height
            ));
        }

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| image.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }

    fn extract_depth(&self, outputs: TVec<TValue>) -> Result<DepthMap> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() < 2 || shape[..shape.len() - 2].iter().any(|d| *d != 1) {
            return Err(anyhow!("unexpected depth output shape {:?}", shape));
        }
        let height = shape[shape.len() - 2] as u32;
        let width = shape[shape.len() - 1] as u32;
        let sign = if self.inverse_output { -1.0 } else { 1.0 };
        let values = view.iter().map(|v| v * sign).collect();
        DepthMap::new(width, height, values)
    }
}

impl DepthEstimator for TractDepth {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn estimate(&mut self, image: &Image) -> Result<DepthMap> {
        let input = self.build_input(image)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX depth inference failed")?;
        self.extract_depth(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Image::new(self.width, self.height);
        self.estimate(&blank).map(|_| ())
    }
}
