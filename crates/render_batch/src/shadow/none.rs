//! Unshadowed lighting

use super::{LightRequest, ShadowCapability, SpreadMask};
use crate::scene::LightFlags;
use crate::shader::ShaderVarStack;

/// Every light lands in the single slot; shadow flags are irrelevant for grouping
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShadows;

impl ShadowCapability for NoShadows {
    type LightData = ();

    fn light_flag_mask(&self) -> LightFlags {
        LightFlags::NO_SHADOWS
    }

    fn handle_light(
        &mut self,
        _request: &LightRequest<'_>,
        _data: &mut (),
        _frames: &mut [ShaderVarStack],
    ) -> SpreadMask {
        1
    }
}
