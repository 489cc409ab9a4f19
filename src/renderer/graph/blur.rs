//! Hierarchical Blur Pyramid
//!
//! Approximates a large-radius blur with a chain of half-resolution
//! downsample draws followed by an upsample chain that walks back to full
//! resolution, blending each level with the detail of the level above it.
//! Bloom, the color pyramid and any other wide-kernel effect share this
//! implementation.
//!
//! # Iteration Count
//!
//! ```text
//! iterations = clamp(floor(log2(max(w, h)) + blur_radius - 8), 2, MAX_PYRAMID_LEVELS)
//! iterations = min(iterations, max(iterations_limit, 1))
//! ```
//!
//! A 1920×1080 source with `blur_radius = 4` gives `floor(10.9 + 4 - 8) = 6`.
//!
//! # Chain Layout
//!
//! ```text
//! Down:  source ─► down[0] ─► down[1] ─► … ─► down[n-1]        (each ½ of predecessor)
//!
//! Up:    down[n-1] ─┐
//!        down[n-2] ─┴► up[n-2] ─┐
//!        down[n-3] ───────────── ┴► up[n-3] ─ … ─► up[0] ─┐
//!        source   ────────────────────────────────────── ┴► target
//! ```
//!
//! Up step `i` reads the last produced buffer plus the detail buffer at the
//! output resolution (`down[i-1]`, or `source` when `i == 0`) and writes at
//! the resolution of level `i-1` (or into `target` when `i == 0`).
//!
//! With a single iteration the chain collapses to one filter draw from
//! `source` into `target` using the downsample material.
//!
//! Level buffers come from the [`ResourcePool`] under per-level slots, so a
//! level is only reallocated when its size or format changes.

use glam::Vec4;
use smallvec::SmallVec;

use crate::errors::{PostFxError, Result};
use crate::renderer::binding_table::{PropertyId, ShaderBindingTable};
use crate::renderer::core::{GraphicsBackend, LoadOp, MaterialHandle, TextureDesc, TextureId};
use crate::renderer::graph::pool::{PoolSlot, ResourcePool};

/// Upper bound on pyramid depth.
pub const MAX_PYRAMID_LEVELS: u32 = 16;

/// Number of down/up iterations for a source of `width × height`.
#[must_use]
pub fn compute_iterations(width: u32, height: u32, blur_radius: f32, iterations_limit: u32) -> u32 {
    let max_dim = width.max(height).max(1) as f32;
    let raw = (max_dim.log2() + blur_radius - 8.0).floor();
    let raw = if raw.is_nan() { 2.0 } else { raw };
    let clamped = raw.clamp(2.0, MAX_PYRAMID_LEVELS as f32) as u32;
    clamped.min(iterations_limit.max(1))
}

/// Inputs of a single pyramid evaluation.
#[derive(Debug, Clone, Copy)]
pub struct BlurRequest {
    pub source: TextureId,
    pub target: TextureId,
    pub blur_radius: f32,
    pub iterations_limit: u32,
    pub down_material: MaterialHandle,
    pub up_material: MaterialHandle,
}

/// One resolution tier of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidLevel {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub down: TextureId,
    /// Upsample output at this resolution; `None` for the coarsest level.
    pub up: Option<TextureId>,
}

/// What a pyramid evaluation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlurPyramidResult {
    pub iterations: u32,
    /// Empty when `iterations == 1`.
    pub levels: SmallVec<[PyramidLevel; MAX_PYRAMID_LEVELS as usize]>,
}

#[derive(Debug, Clone, Copy)]
struct BlurBindings {
    source: PropertyId,
    detail: PropertyId,
    texel_size: PropertyId,
    level: PropertyId,
    radius: PropertyId,
}

/// Reusable blur pyramid owned by an effect pass.
#[derive(Debug, Clone)]
pub struct BlurPyramid {
    label: &'static str,
    down_slot: &'static str,
    up_slot: &'static str,
    format: Option<wgpu::TextureFormat>,
    max_levels: u32,
    bindings: Option<BlurBindings>,
}

impl BlurPyramid {
    /// Shader bindings every pyramid material reads.
    pub const BINDINGS: &'static [&'static str] =
        &["_SourceTex", "_DetailTex", "_TexelSize", "_PyramidLevel", "_BlurRadius"];

    /// `down_slot` / `up_slot` name the pool slots of the level buffers.
    #[must_use]
    pub fn new(label: &'static str, down_slot: &'static str, up_slot: &'static str) -> Self {
        Self {
            label,
            down_slot,
            up_slot,
            format: None,
            max_levels: MAX_PYRAMID_LEVELS,
            bindings: None,
        }
    }

    /// Level buffer format. Defaults to the source format.
    #[must_use]
    pub fn with_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Lowers the depth cap below [`MAX_PYRAMID_LEVELS`] (never below 2).
    pub fn set_max_levels(&mut self, max_levels: u32) {
        self.max_levels = max_levels.clamp(2, MAX_PYRAMID_LEVELS);
    }

    pub fn resolve_bindings(&mut self, table: &ShaderBindingTable) -> Result<()> {
        let [source, detail, texel_size, level, radius] = table.ids([
            "_SourceTex",
            "_DetailTex",
            "_TexelSize",
            "_PyramidLevel",
            "_BlurRadius",
        ])?;
        self.bindings = Some(BlurBindings {
            source,
            detail,
            texel_size,
            level,
            radius,
        });
        Ok(())
    }

    /// Iteration count this pyramid would use for `request`.
    #[must_use]
    pub fn iterations_for(&self, width: u32, height: u32, blur_radius: f32, iterations_limit: u32) -> u32 {
        compute_iterations(width, height, blur_radius, iterations_limit).min(self.max_levels)
    }

    /// Runs the pyramid from `request.source` into `request.target`.
    ///
    /// Fails without recording anything when a material is missing or the
    /// source has a zero dimension.
    pub fn compute(
        &self,
        backend: &mut dyn GraphicsBackend,
        pool: &mut ResourcePool,
        request: &BlurRequest,
    ) -> Result<BlurPyramidResult> {
        let bindings = self
            .bindings
            .ok_or_else(|| PostFxError::configuration(self.label, "blur bindings were not resolved"))?;

        let source_desc = backend
            .texture_desc(request.source)
            .cloned()
            .ok_or(PostFxError::UnknownTexture)?;
        source_desc.validate()?;
        if backend.texture_desc(request.target).is_none() {
            return Err(PostFxError::UnknownTexture);
        }
        for material in [request.down_material, request.up_material] {
            if !backend.contains_material(material) {
                return Err(PostFxError::configuration(
                    self.label,
                    "blur material is not available",
                ));
            }
        }

        let iterations = self.iterations_for(
            source_desc.width,
            source_desc.height,
            request.blur_radius,
            request.iterations_limit,
        );

        backend.push_debug_group(self.label);
        let result = self.record(backend, pool, request, &bindings, &source_desc, iterations);
        backend.pop_debug_group();
        result
    }

    fn record(
        &self,
        backend: &mut dyn GraphicsBackend,
        pool: &mut ResourcePool,
        request: &BlurRequest,
        ids: &BlurBindings,
        source_desc: &TextureDesc,
        iterations: u32,
    ) -> Result<BlurPyramidResult> {
        let down = request.down_material;
        let up = request.up_material;
        let (src_w, src_h) = (source_desc.width, source_desc.height);

        if iterations == 1 {
            backend.set_texture(down, ids.source, request.source.into());
            backend.set_vector(down, ids.texel_size, texel_size(src_w, src_h));
            backend.set_float(down, ids.level, 0.0);
            backend.set_float(down, ids.radius, request.blur_radius);
            backend.record_draw(down, request.target.into(), LoadOp::Clear)?;
            return Ok(BlurPyramidResult {
                iterations,
                levels: SmallVec::new(),
            });
        }

        let format = self.format.unwrap_or(source_desc.format);
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;

        // ── Down ───────────────────────────────────────────────────────────
        let mut levels: SmallVec<[PyramidLevel; MAX_PYRAMID_LEVELS as usize]> = SmallVec::new();
        let (mut prev, mut prev_w, mut prev_h) = (request.source, src_w, src_h);
        for i in 0..iterations {
            let (w, h) = ((prev_w / 2).max(1), (prev_h / 2).max(1));
            let desc = TextureDesc::new_2d(self.down_slot, w, h, format, usage);
            let buffer = pool.acquire(backend, PoolSlot::new(self.down_slot, i), &desc)?;

            backend.set_texture(down, ids.source, prev.into());
            backend.set_vector(down, ids.texel_size, texel_size(prev_w, prev_h));
            backend.set_float(down, ids.level, i as f32);
            backend.set_float(down, ids.radius, request.blur_radius);
            backend.record_draw(down, buffer.into(), LoadOp::Clear)?;

            levels.push(PyramidLevel {
                index: i,
                width: w,
                height: h,
                down: buffer,
                up: None,
            });
            (prev, prev_w, prev_h) = (buffer, w, h);
        }

        // ── Up ─────────────────────────────────────────────────────────────
        for i in (0..iterations).rev() {
            let (output, detail) = if i == 0 {
                (request.target, request.source)
            } else {
                let above = &levels[(i - 1) as usize];
                let desc = TextureDesc::new_2d(self.up_slot, above.width, above.height, format, usage);
                let buffer = pool.acquire(backend, PoolSlot::new(self.up_slot, i - 1), &desc)?;
                (buffer, above.down)
            };

            backend.set_texture(up, ids.source, prev.into());
            backend.set_texture(up, ids.detail, detail.into());
            backend.set_vector(up, ids.texel_size, texel_size(prev_w, prev_h));
            backend.set_float(up, ids.level, i as f32);
            backend.set_float(up, ids.radius, request.blur_radius);
            backend.record_draw(up, output.into(), LoadOp::Clear)?;

            if i > 0 {
                let above = &mut levels[(i - 1) as usize];
                above.up = Some(output);
                (prev, prev_w, prev_h) = (output, above.width, above.height);
            }
        }

        log::trace!(
            "{}: {iterations} levels for {src_w}x{src_h} (radius {})",
            self.label,
            request.blur_radius
        );
        Ok(BlurPyramidResult { iterations, levels })
    }
}

/// `(1/w, 1/h, w, h)` of a level.
#[inline]
fn texel_size(width: u32, height: u32) -> Vec4 {
    let (w, h) = (width as f32, height as f32);
    Vec4::new(1.0 / w, 1.0 / h, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterations_follow_resolution_and_radius() {
        assert_eq!(compute_iterations(1920, 1080, 4.0, 8), 6);
        assert_eq!(compute_iterations(1920, 1080, 4.0, 16), 6);
        assert_eq!(compute_iterations(1920, 1080, 8.0, 16), 10);
        assert_eq!(compute_iterations(256, 256, 0.0, 16), 2);
    }

    #[test]
    fn iterations_are_clamped() {
        // floor(log2(64) + 0 - 8) = -2 → lower clamp
        assert_eq!(compute_iterations(64, 64, 0.0, 16), 2);
        // huge radius → upper clamp
        assert_eq!(compute_iterations(4096, 4096, 100.0, 64), MAX_PYRAMID_LEVELS);
        // limit wins when smaller, but never below one
        assert_eq!(compute_iterations(1920, 1080, 4.0, 3), 3);
        assert_eq!(compute_iterations(1920, 1080, 4.0, 0), 1);
    }

    #[test]
    fn nan_radius_is_treated_as_minimum() {
        assert_eq!(compute_iterations(1920, 1080, f32::NAN, 8), 2);
    }

    #[test]
    fn lower_level_cap_applies() {
        let mut pyramid = BlurPyramid::new("Test Blur", "test.down", "test.up");
        pyramid.set_max_levels(4);
        assert_eq!(pyramid.iterations_for(1920, 1080, 8.0, 16), 4);
        pyramid.set_max_levels(0);
        assert_eq!(pyramid.iterations_for(1920, 1080, 8.0, 16), 2);
    }
}
