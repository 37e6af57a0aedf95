use anyhow::Result;

use crate::depth::backend::DepthEstimator;
use crate::depth::DepthMap;
use crate::frame::Image;

/// CPU heuristic: brighter pixels are treated as nearer.
///
/// Depth is `1 - luma / 255` with Rec. 601 weights. Useful when no model is
/// available; it has no notion of scene geometry.
#[derive(Default)]
pub struct LumaDepth;

impl LumaDepth {
    pub fn new() -> Self {
        Self
    }
}

impl DepthEstimator for LumaDepth {
    fn name(&self) -> &'static str {
        "luma"
    }

    fn estimate(&mut self, image: &Image) -> Result<DepthMap> {
        let values = image
            .pixels()
            .map(|px| {
                let [r, g, b] = px.0;
                let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
                1.0 - luma / 255.0
            })
            .collect();
        DepthMap::new(image.width(), image.height(), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn bright_pixels_are_nearer() -> Result<()> {
        let mut image = Image::from_pixel(2, 1, Rgb([0, 0, 0]));
        image.put_pixel(1, 0, Rgb([255, 255, 255]));

        let depth = LumaDepth::new().estimate(&image)?;
        assert_eq!(depth.dimensions(), (2, 1));
        assert!((depth.get(0, 0) - 1.0).abs() < 1e-6);
        assert!(depth.get(1, 0).abs() < 1e-3);
        Ok(())
    }
}
