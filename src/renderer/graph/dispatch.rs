//! Tile-Dispatch Compute Helpers
//!
//! Screen-space compute kernels partition the target into 8×8 tiles and run
//! one work group per tile. [`TileDispatch`] records a single kernel over a
//! target; [`SeparableFilter`] runs a horizontal kernel into a scratch
//! buffer and a vertical kernel back into the destination.

use crate::errors::{PostFxError, Result};
use crate::renderer::binding_table::{PropertyId, ShaderBindingTable};
use crate::renderer::core::{GraphicsBackend, MaterialHandle, TextureDesc, TextureId};
use crate::renderer::graph::pool::{PoolSlot, ResourcePool};

/// Edge length of a compute tile, matching `@workgroup_size(8, 8, 1)`.
pub const TILE_SIZE: u32 = 8;

/// Work groups needed to cover `width × height` with 8×8 tiles.
#[inline]
#[must_use]
pub fn tile_count(width: u32, height: u32) -> [u32; 3] {
    [width.div_ceil(TILE_SIZE), height.div_ceil(TILE_SIZE), 1]
}

/// Records one kernel over the tiles of a target.
#[derive(Debug, Clone, Copy)]
pub struct TileDispatch {
    pub kernel: u32,
}

impl TileDispatch {
    #[must_use]
    pub const fn new(kernel: u32) -> Self {
        Self { kernel }
    }

    /// Dispatches `material` over a `width × height` target.
    pub fn record(
        &self,
        backend: &mut dyn GraphicsBackend,
        material: MaterialHandle,
        width: u32,
        height: u32,
    ) -> Result<[u32; 3]> {
        let groups = tile_count(width, height);
        backend.record_dispatch(material, self.kernel, groups)?;
        Ok(groups)
    }
}

/// Two-kernel separable filter (horizontal, then vertical) through a pooled
/// scratch buffer.
#[derive(Debug, Clone, Copy)]
pub struct SeparableFilter {
    horizontal: TileDispatch,
    vertical: TileDispatch,
    input: Option<PropertyId>,
    output: Option<PropertyId>,
}

impl SeparableFilter {
    pub const BINDINGS: &'static [&'static str] = &["_InputTex", "_OutputTex"];

    #[must_use]
    pub const fn new(horizontal_kernel: u32, vertical_kernel: u32) -> Self {
        Self {
            horizontal: TileDispatch::new(horizontal_kernel),
            vertical: TileDispatch::new(vertical_kernel),
            input: None,
            output: None,
        }
    }

    pub fn resolve_bindings(&mut self, table: &ShaderBindingTable) -> Result<()> {
        let [input, output] = table.ids(["_InputTex", "_OutputTex"])?;
        self.input = Some(input);
        self.output = Some(output);
        Ok(())
    }

    /// Filters `source` into `target`. Both must share a size; the scratch
    /// buffer takes the target's format.
    pub fn run(
        &self,
        backend: &mut dyn GraphicsBackend,
        pool: &mut ResourcePool,
        material: MaterialHandle,
        source: TextureId,
        target: TextureId,
        scratch: PoolSlot,
    ) -> Result<()> {
        let (Some(input), Some(output)) = (self.input, self.output) else {
            return Err(PostFxError::configuration(
                scratch.name,
                "separable filter bindings were not resolved",
            ));
        };
        let target_desc = backend
            .texture_desc(target)
            .cloned()
            .ok_or(PostFxError::UnknownTexture)?;

        let scratch_desc = TextureDesc::new_2d(
            scratch.name,
            target_desc.width,
            target_desc.height,
            target_desc.format,
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let scratch = pool.acquire(backend, scratch, &scratch_desc)?;

        backend.set_texture(material, input, source.into());
        backend.set_storage_texture(material, output, scratch.into());
        self.horizontal
            .record(backend, material, target_desc.width, target_desc.height)?;

        backend.set_texture(material, input, scratch.into());
        backend.set_storage_texture(material, output, target.into());
        self.vertical
            .record(backend, material, target_desc.width, target_desc.height)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_count_rounds_up() {
        assert_eq!(tile_count(1920, 1080), [240, 135, 1]);
        assert_eq!(tile_count(1921, 1081), [241, 136, 1]);
        assert_eq!(tile_count(1, 1), [1, 1, 1]);
        assert_eq!(tile_count(0, 0), [0, 0, 1]);
    }
}
