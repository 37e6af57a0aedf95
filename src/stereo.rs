//! Depth-to-disparity stereo synthesis.
//!
//! Depth is normalized to `[0, 1]`, turned into an integer disparity per pixel
//! (`round((1 - depth) * max_disparity)`, so nearer surfaces separate more),
//! and each eye is produced by one gather over a precomputed column map:
//!
//! - left eye samples column `x + d`
//! - right eye samples column `x - d`
//!
//! Columns falling outside the image are clamped to the edge column, so every
//! destination pixel is a copy of a real source pixel from the same row.

use anyhow::{anyhow, Result};
use image::imageops;
use serde::Deserialize;

use crate::depth::DepthMap;
use crate::frame::Image;

/// Default parallax bound in pixels.
pub const DEFAULT_MAX_DISPARITY: u32 = 30;

/// How raw depth values are mapped onto `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthRange {
    /// Per-frame min-max over the whole map.
    #[default]
    MinMax,
    /// Fixed bounds; `near` maps to 0 and `far` to 1, values outside are clamped.
    Fixed { near: f32, far: f32 },
}

/// Non-negative horizontal offset per pixel, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisparityMap {
    width: u32,
    height: u32,
    values: Vec<u32>,
}

impl DisparityMap {
    /// Derive disparities from a depth map.
    ///
    /// A zero-width range (for instance a constant map under `MinMax`) gives
    /// disparity 0 everywhere, as do non-finite depth values.
    pub fn from_depth(depth: &DepthMap, range: DepthRange, max_disparity: u32) -> Self {
        let (lo, span) = match range {
            DepthRange::MinMax => depth
                .min_max()
                .map(|(lo, hi)| (lo, hi - lo))
                .unwrap_or((0.0, 0.0)),
            DepthRange::Fixed { near, far } => (near, far - near),
        };
        let flat = !(span.is_finite() && span.abs() > f32::EPSILON);
        let scale = max_disparity as f32;

        let values = depth
            .values()
            .iter()
            .map(|&v| {
                if flat || !v.is_finite() {
                    return 0;
                }
                let normalized = ((v - lo) / span).clamp(0.0, 1.0);
                ((1.0 - normalized) * scale).round() as u32
            })
            .collect();

        Self {
            width: depth.width(),
            height: depth.height(),
            values,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    pub fn max(&self) -> u32 {
        self.values.iter().copied().max().unwrap_or(0)
    }
}

/// Source column for every destination pixel, one map per eye.
///
/// Rows are implicit: destination `(x, y)` reads source `(map[y * w + x], y)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleMaps {
    pub width: u32,
    pub height: u32,
    pub left: Vec<u32>,
    pub right: Vec<u32>,
}

impl SampleMaps {
    pub fn from_disparity(disparity: &DisparityMap) -> Self {
        let (width, height) = disparity.dimensions();
        let last = width.saturating_sub(1);
        let mut left = Vec::with_capacity(disparity.values.len());
        let mut right = Vec::with_capacity(disparity.values.len());
        for (idx, &d) in disparity.values().iter().enumerate() {
            let x = (idx % width as usize) as u32;
            left.push(x.saturating_add(d).min(last));
            right.push(x.saturating_sub(d));
        }
        Self {
            width,
            height,
            left,
            right,
        }
    }
}

/// Left/right views of identical shape to the source.
#[derive(Clone, Debug)]
pub struct StereoPair {
    pub left: Image,
    pub right: Image,
}

impl StereoPair {
    pub fn dimensions(&self) -> (u32, u32) {
        self.left.dimensions()
    }

    /// Left and right placed side by side in one image twice as wide.
    pub fn side_by_side(&self) -> Image {
        let (w, h) = self.left.dimensions();
        let mut out = Image::new(w * 2, h);
        imageops::replace(&mut out, &self.left, 0, 0);
        imageops::replace(&mut out, &self.right, w as i64, 0);
        out
    }
}

/// Converts a source image plus depth into a stereo pair.
#[derive(Clone, Debug)]
pub struct DisparitySynthesizer {
    max_disparity: u32,
    range: DepthRange,
}

impl DisparitySynthesizer {
    pub fn new(max_disparity: u32) -> Self {
        Self {
            max_disparity,
            range: DepthRange::default(),
        }
    }

    pub fn with_range(mut self, range: DepthRange) -> Self {
        self.range = range;
        self
    }

    pub fn max_disparity(&self) -> u32 {
        self.max_disparity
    }

    pub fn disparity(&self, depth: &DepthMap) -> DisparityMap {
        DisparityMap::from_depth(depth, self.range, self.max_disparity)
    }

    /// Build the pair. `depth` must already be at the image's resolution.
    pub fn synthesize(&self, image: &Image, depth: &DepthMap) -> Result<StereoPair> {
        if image.dimensions() != depth.dimensions() {
            return Err(anyhow!(
                "depth map {}x{} does not match image {}x{}",
                depth.width(),
                depth.height(),
                image.width(),
                image.height()
            ));
        }
        let maps = SampleMaps::from_disparity(&self.disparity(depth));
        Ok(StereoPair {
            left: gather(image, &maps.left),
            right: gather(image, &maps.right),
        })
    }
}

impl Default for DisparitySynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DISPARITY)
    }
}

/// Stereo pair from `image` and a same-resolution `depth` map, min-max normalized.
pub fn synthesize(image: &Image, depth: &DepthMap, max_disparity: u32) -> Result<StereoPair> {
    DisparitySynthesizer::new(max_disparity).synthesize(image, depth)
}

fn gather(image: &Image, columns: &[u32]) -> Image {
    let width = image.width() as usize;
    Image::from_fn(image.width(), image.height(), |x, y| {
        let src_x = columns[y as usize * width + x as usize];
        *image.get_pixel(src_x, y)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::Rng;

    /// Each column gets a distinct red value so sampled columns are visible.
    fn ramp(width: u32, height: u32) -> Image {
        Image::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 7]))
    }

    #[test]
    fn constant_depth_leaves_both_eyes_unchanged() -> Result<()> {
        let image = ramp(12, 5);
        let depth = DepthMap::constant(12, 5, 3.5);

        let pair = synthesize(&image, &depth, 30)?;
        assert_eq!(pair.left, image);
        assert_eq!(pair.right, image);
        Ok(())
    }

    #[test]
    fn nearest_gets_max_disparity_and_farthest_none() {
        let depth = DepthMap::from_fn(3, 1, |x, _| x as f32);
        let disparity = DisparityMap::from_depth(&depth, DepthRange::MinMax, 30);
        assert_eq!(disparity.values(), &[30, 15, 0]);
    }

    #[test]
    fn rounds_instead_of_truncating() {
        // normalized 0.25 -> (0.75 * 10) = 7.5 rounds to 8; 0.9 -> 1.0 rounds to 1.
        let depth = DepthMap::new(4, 1, vec![0.0, 0.25, 0.9, 1.0]).unwrap();
        let disparity = DisparityMap::from_depth(&depth, DepthRange::MinMax, 10);
        assert_eq!(disparity.values(), &[10, 8, 1, 0]);
    }

    #[test]
    fn fixed_range_clamps_outliers() {
        let depth = DepthMap::new(3, 1, vec![-5.0, 0.5, 9.0]).unwrap();
        let disparity =
            DisparityMap::from_depth(&depth, DepthRange::Fixed { near: 0.0, far: 1.0 }, 30);
        assert_eq!(disparity.values(), &[30, 15, 0]);
    }

    #[test]
    fn border_pixels_replicate_edge_column() -> Result<()> {
        let image = ramp(10, 2);
        let depth = DepthMap::constant(10, 2, 0.5);
        let pair = DisparitySynthesizer::new(30)
            .with_range(DepthRange::Fixed { near: 0.0, far: 1.0 })
            .synthesize(&image, &depth)?;

        for y in 0..2 {
            for x in 0..10 {
                // d = 15 exceeds the width, so every sample clamps to an edge.
                assert_eq!(pair.left.get_pixel(x, y), image.get_pixel(9, y));
                assert_eq!(pair.right.get_pixel(x, y), image.get_pixel(0, y));
            }
        }
        Ok(())
    }

    #[test]
    fn interior_shift_matches_direct_remap() -> Result<()> {
        let image = ramp(40, 3);
        let depth = DepthMap::from_fn(40, 3, |x, y| ((x * 7 + y * 3) % 11) as f32);
        let synth = DisparitySynthesizer::new(6);
        let disparity = synth.disparity(&depth);
        let pair = synth.synthesize(&image, &depth)?;

        for y in 0..3 {
            for x in 0..40 {
                let d = disparity.get(x, y);
                let lx = (x + d).min(39);
                let rx = x.saturating_sub(d);
                assert_eq!(pair.left.get_pixel(x, y), image.get_pixel(lx, y));
                assert_eq!(pair.right.get_pixel(x, y), image.get_pixel(rx, y));
            }
        }
        Ok(())
    }

    #[test]
    fn sample_maps_stay_in_bounds_for_random_depth() {
        let mut rng = rand::thread_rng();
        for case in 0..200 {
            let width = rng.gen_range(1..48);
            let height = rng.gen_range(1..8);
            let max_disparity = rng.gen_range(0..100);
            let depth = match case % 4 {
                0 => DepthMap::constant(width, height, 0.0),
                1 => DepthMap::constant(width, height, f32::MAX),
                2 => DepthMap::from_fn(width, height, |_, _| rng.gen_range(-1e6..1e6)),
                _ => DepthMap::from_fn(width, height, |_, _| rng.gen::<f32>()),
            };

            let disparity = DisparityMap::from_depth(&depth, DepthRange::MinMax, max_disparity);
            assert!(disparity.max() <= max_disparity);
            let maps = SampleMaps::from_disparity(&disparity);
            assert!(maps.left.iter().all(|x| *x < width));
            assert!(maps.right.iter().all(|x| *x < width));

            let image = ramp(width, height);
            let pair = synthesize(&image, &depth, max_disparity).unwrap();
            assert_eq!(pair.dimensions(), (width, height));
        }
    }

    #[test]
    fn side_by_side_doubles_width() -> Result<()> {
        let image = ramp(10, 10);
        let depth = DepthMap::constant(10, 10, 1.0);
        let pair = synthesize(&image, &depth, 30)?;
        let sbs = pair.side_by_side();
        assert_eq!(sbs.dimensions(), (20, 10));
        assert_eq!(sbs.get_pixel(13, 4), image.get_pixel(3, 4));
        Ok(())
    }

    #[test]
    fn mismatched_depth_is_rejected() {
        let image = ramp(10, 10);
        let depth = DepthMap::constant(5, 5, 1.0);
        assert!(synthesize(&image, &depth, 30).is_err());
    }
}
