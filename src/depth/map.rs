use anyhow::{anyhow, Result};

/// Single-channel grid of depth values, row-major.
///
/// Lower values are nearer to the camera.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DepthMap {
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("depth map must not be empty ({}x{})", width, height));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("depth map dimensions overflow"))?;
        if values.len() != expected {
            return Err(anyhow!(
                "depth map length mismatch: expected {}, got {}",
                expected,
                values.len()
            ));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Build a map from a per-position function.
    ///
    /// Panics if either dimension is zero.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        assert!(width > 0 && height > 0, "depth map must not be empty");
        let mut values = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            values,
        }
    }

    pub fn constant(width: u32, height: u32, value: f32) -> Self {
        Self::from_fn(width, height, |_, _| value)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    /// Smallest and largest finite values, if any.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Bilinear resize with pixel-centre alignment.
    ///
    /// Source coordinates are `(dst + 0.5) * scale - 0.5`, clamped to the grid,
    /// so a constant map stays exactly constant.
    pub fn resize_bilinear(&self, width: u32, height: u32) -> Result<DepthMap> {
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot resize depth map to {}x{}", width, height));
        }
        if (width, height) == self.dimensions() {
            return Ok(self.clone());
        }

        let xs = axis_samples(self.width, width);
        let ys = axis_samples(self.height, height);
        let src_w = self.width as usize;

        let mut values = Vec::with_capacity(width as usize * height as usize);
        for &(y0, y1, fy) in &ys {
            let row0 = &self.values[y0 * src_w..(y0 + 1) * src_w];
            let row1 = &self.values[y1 * src_w..(y1 + 1) * src_w];
            for &(x0, x1, fx) in &xs {
                let top = lerp(row0[x0], row0[x1], fx);
                let bottom = lerp(row1[x0], row1[x1], fx);
                values.push(lerp(top, bottom, fy));
            }
        }

        DepthMap::new(width, height, values)
    }
}

/// For each destination index: the two source neighbours and the blend weight.
fn axis_samples(src_len: u32, dst_len: u32) -> Vec<(usize, usize, f32)> {
    let scale = src_len as f32 / dst_len as f32;
    let last = src_len as usize - 1;
    (0..dst_len)
        .map(|d| {
            let pos = ((d as f32 + 0.5) * scale - 0.5).clamp(0.0, last as f32);
            let i0 = pos.floor() as usize;
            let i1 = (i0 + 1).min(last);
            (i0, i1, pos - i0 as f32)
        })
        .collect()
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_length() {
        assert!(DepthMap::new(2, 2, vec![0.0; 3]).is_err());
        assert!(DepthMap::new(0, 2, vec![]).is_err());
    }

    #[test]
    fn constant_map_survives_resize_exactly() -> Result<()> {
        let map = DepthMap::constant(256, 256, 0.37);
        let resized = map.resize_bilinear(640, 480)?;
        assert_eq!(resized.dimensions(), (640, 480));
        assert!(resized.values().iter().all(|v| *v == 0.37));
        Ok(())
    }

    #[test]
    fn upscale_interpolates_between_neighbours() -> Result<()> {
        let map = DepthMap::new(2, 1, vec![0.0, 1.0])?;
        let resized = map.resize_bilinear(4, 1)?;
        // Centres map to -0.25, 0.25, 0.75, 1.25 in source space.
        assert_eq!(resized.values(), &[0.0, 0.25, 0.75, 1.0]);
        Ok(())
    }

    #[test]
    fn downscale_keeps_range() -> Result<()> {
        let map = DepthMap::from_fn(8, 8, |x, _| x as f32);
        let resized = map.resize_bilinear(4, 2)?;
        let (lo, hi) = resized.min_max().unwrap();
        assert!(lo >= 0.0 && hi <= 7.0);
        assert!(resized.get(0, 0) < resized.get(3, 1));
        Ok(())
    }

    #[test]
    fn min_max_skips_non_finite() -> Result<()> {
        let map = DepthMap::new(3, 1, vec![f32::NAN, 2.0, -1.0])?;
        assert_eq!(map.min_max(), Some((-1.0, 2.0)));
        Ok(())
    }
}
