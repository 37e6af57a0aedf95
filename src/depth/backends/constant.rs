use anyhow::Result;

use crate::depth::backend::DepthEstimator;
use crate::depth::DepthMap;
use crate::frame::Image;

/// Stub backend that reports the same depth everywhere.
pub struct ConstantDepth {
    value: f32,
}

impl ConstantDepth {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl Default for ConstantDepth {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl DepthEstimator for ConstantDepth {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn estimate(&mut self, image: &Image) -> Result<DepthMap> {
        Ok(DepthMap::constant(
            image.width().max(1),
            image.height().max(1),
            self.value,
        ))
    }
}
