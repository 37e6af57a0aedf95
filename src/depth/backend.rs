use anyhow::Result;

use super::DepthMap;
use crate::frame::Image;

/// Square input edge most monocular depth models are trained at.
pub const DEFAULT_INPUT_SIZE: u32 = 256;

/// Depth estimator backend.
///
/// The pipeline resizes each decoded image to `input_size` before calling
/// `estimate`, and resizes the returned map back to the source resolution.
/// Backends may return a map of any non-empty size.
///
/// Lower output values mean nearer surfaces.
pub trait DepthEstimator: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Resolution the backend expects its input at.
    fn input_size(&self) -> (u32, u32) {
        (DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE)
    }

    /// Estimate per-pixel depth for an image already at `input_size`.
    fn estimate(&mut self, image: &Image) -> Result<DepthMap>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
