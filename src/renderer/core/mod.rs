//! Graphics Capability Interface
//!
//! The orchestration layer never talks to a GPU API directly. Everything it
//! needs (texture allocation, parameter binding, draw/dispatch/copy
//! recording, frame-graph import) goes through [`GraphicsBackend`].
//!
//! Provided backends:
//!
//! | Backend | Recording style | Use |
//! |---------|-----------------|-----|
//! | [`HeadlessBackend`] | Immediate | Tests, tooling, CPU-side validation |
//! | [`WgpuBackend`] | Immediate | Real GPU rendering |
//! | [`FrameGraphBackend`] | Declarative | Wraps another backend; defers work to `end_frame` |
//!
//! The backend is a type parameter of the pipeline, so the recording style is
//! fixed once per pipeline build and never varies per effect.

pub mod frame_graph;
pub mod headless;
pub mod wgpu_backend;

pub use frame_graph::FrameGraphBackend;
pub use headless::{GpuCommand, HeadlessBackend};
pub use wgpu_backend::{WgpuBackend, WgpuMaterialDesc, WgpuPipelineKind, WgpuUniformField};

use glam::Vec4;

use crate::errors::{PostFxError, Result};
use crate::renderer::binding_table::PropertyId;

slotmap::new_key_type! {
    /// Handle to a backend-owned texture.
    pub struct TextureId;

    /// Opaque handle to a shader/material supplied by the asset layer.
    pub struct MaterialHandle;
}

/// Handle to a texture imported into the declarative frame graph.
///
/// Only meaningful within the frame in which it was imported.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GraphHandle(pub(crate) u32);

impl GraphHandle {
    #[inline]
    #[must_use]
    pub fn index(self) -> u32 {
        self.0
    }
}

// ─── Texture Description ──────────────────────────────────────────────────────

/// Description of a 2D render target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
    pub mip_level_count: u32,
    pub label: &'static str,
}

impl TextureDesc {
    /// Single-mip 2D texture.
    #[must_use]
    pub fn new_2d(
        label: &'static str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        Self {
            width,
            height,
            format,
            usage,
            mip_level_count: 1,
            label,
        }
    }

    #[must_use]
    pub fn with_mips(mut self, mip_level_count: u32) -> Self {
        self.mip_level_count = mip_level_count.max(1);
        self
    }

    /// Fails with [`PostFxError::InvalidResource`] for zero dimensions.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.mip_level_count == 0 {
            return Err(PostFxError::invalid_resource(
                self.label,
                self.width,
                self.height,
            ));
        }
        Ok(())
    }

    /// Reuse rule: an existing allocation is kept when its dimensions, format
    /// and mip count match and its usage covers the requested usage.
    #[must_use]
    pub fn is_compatible_with(&self, requested: &TextureDesc) -> bool {
        self.width == requested.width
            && self.height == requested.height
            && self.format == requested.format
            && self.mip_level_count == requested.mip_level_count
            && self.usage.contains(requested.usage)
    }

    /// Checks that mip 0 of `self` can be copied into mip 0 of `dst`: same
    /// size, formats that differ at most in sRGB-ness, `COPY_SRC` on the
    /// source and `COPY_DST` on the destination.
    pub fn check_copy_to(&self, dst: &TextureDesc) -> Result<()> {
        if (self.width, self.height) != (dst.width, dst.height) {
            return Err(PostFxError::Backend(format!(
                "copy size mismatch: '{}' {}x{} → '{}' {}x{}",
                self.label, self.width, self.height, dst.label, dst.width, dst.height
            )));
        }
        if self.format.remove_srgb_suffix() != dst.format.remove_srgb_suffix() {
            return Err(PostFxError::Backend(format!(
                "copy format mismatch: '{}' {:?} → '{}' {:?}",
                self.label, self.format, dst.label, dst.format
            )));
        }
        if !self.usage.contains(wgpu::TextureUsages::COPY_SRC) {
            return Err(PostFxError::Backend(format!(
                "copy source '{}' lacks COPY_SRC usage",
                self.label
            )));
        }
        if !dst.usage.contains(wgpu::TextureUsages::COPY_DST) {
            return Err(PostFxError::Backend(format!(
                "copy destination '{}' lacks COPY_DST usage",
                dst.label
            )));
        }
        Ok(())
    }

    /// Size of `mip`, never smaller than 1×1.
    #[inline]
    #[must_use]
    pub fn mip_size(&self, mip: u32) -> (u32, u32) {
        ((self.width >> mip).max(1), (self.height >> mip).max(1))
    }
}

/// A single-mip view of a texture.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureView {
    pub texture: TextureId,
    pub mip: u32,
}

impl TextureView {
    #[inline]
    #[must_use]
    pub fn mip(texture: TextureId, mip: u32) -> Self {
        Self { texture, mip }
    }
}

impl From<TextureId> for TextureView {
    #[inline]
    fn from(texture: TextureId) -> Self {
        Self { texture, mip: 0 }
    }
}

/// What happens to the previous contents of a draw target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LoadOp {
    Clear,
    Load,
}

// ─── Backend Trait ────────────────────────────────────────────────────────────

/// The capability set the pipeline consumes from the graphics substrate.
///
/// Binding calls (`set_*`) are fire-and-forget: unknown materials are
/// ignored. Recording calls validate their inputs and report
/// [`PostFxError::Configuration`] for unknown materials and
/// [`PostFxError::UnknownTexture`] for dead texture handles.
pub trait GraphicsBackend {
    /// Backend name (for logging).
    fn name(&self) -> &'static str;

    // ── Resources ──────────────────────────────────────────────────────────

    /// Creates a texture. The descriptor has already been validated.
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId>;

    /// Releases a texture. Releasing a dead handle is a no-op.
    fn release_texture(&mut self, id: TextureId);

    /// Current description of a live texture.
    fn texture_desc(&self, id: TextureId) -> Option<&TextureDesc>;

    /// Whether the asset layer's material is known to this backend.
    fn contains_material(&self, material: MaterialHandle) -> bool;

    /// Binds `handle` to a texture matching `desc`, reusing the current
    /// allocation when compatible.
    ///
    /// An incompatible allocation is released *before* the replacement is
    /// created. Returns `true` when a new texture was created.
    fn allocate_or_resize(
        &mut self,
        handle: &mut Option<TextureId>,
        desc: &TextureDesc,
    ) -> Result<bool> {
        desc.validate()?;
        if let Some(id) = *handle {
            if self
                .texture_desc(id)
                .is_some_and(|current| current.is_compatible_with(desc))
            {
                return Ok(false);
            }
            self.release_texture(id);
            *handle = None;
        }
        *handle = Some(self.create_texture(desc)?);
        Ok(true)
    }

    // ── Material Bindings ──────────────────────────────────────────────────

    fn set_float(&mut self, material: MaterialHandle, id: PropertyId, value: f32);
    fn set_vector(&mut self, material: MaterialHandle, id: PropertyId, value: Vec4);
    fn set_texture(&mut self, material: MaterialHandle, id: PropertyId, view: TextureView);
    /// Binds a writable (storage / UAV) texture for compute kernels.
    fn set_storage_texture(&mut self, material: MaterialHandle, id: PropertyId, view: TextureView);
    fn set_keyword(&mut self, material: MaterialHandle, keyword: PropertyId, enabled: bool);

    // ── Global Bindings ────────────────────────────────────────────────────

    fn set_global_float(&mut self, id: PropertyId, value: f32);
    fn set_global_vector(&mut self, id: PropertyId, value: Vec4);
    fn set_global_texture(&mut self, id: PropertyId, view: Option<TextureView>);
    fn set_global_keyword(&mut self, keyword: PropertyId, enabled: bool);

    // ── Recording ──────────────────────────────────────────────────────────

    /// Records a fullscreen draw of `material` into `target`.
    fn record_draw(&mut self, material: MaterialHandle, target: TextureView, load: LoadOp) -> Result<()>;

    /// Records a compute dispatch of `kernel` with `groups` work groups.
    fn record_dispatch(&mut self, material: MaterialHandle, kernel: u32, groups: [u32; 3]) -> Result<()>;

    /// Records a copy of mip 0 of `src` into mip 0 of `dst`. Fails unless
    /// [`TextureDesc::check_copy_to`] accepts the pair.
    fn record_copy(&mut self, src: TextureId, dst: TextureId) -> Result<()>;

    /// Imports a texture into the frame graph, returning its per-frame handle.
    fn import_into_frame_graph(&mut self, id: TextureId) -> GraphHandle;

    fn push_debug_group(&mut self, _label: &str) {}
    fn pop_debug_group(&mut self) {}

    // ── Frame Boundary ─────────────────────────────────────────────────────

    fn begin_frame(&mut self) {}

    /// Submits recorded work.
    fn end_frame(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(w: u32, h: u32) -> TextureDesc {
        TextureDesc::new_2d(
            "Test",
            w,
            h,
            wgpu::TextureFormat::Rgba16Float,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    #[test]
    fn zero_dimension_is_invalid() {
        assert!(desc(0, 4).validate().is_err());
        assert!(desc(4, 0).validate().is_err());
        assert!(desc(4, 4).validate().is_ok());
    }

    #[test]
    fn compatibility_requires_matching_size_and_format() {
        let base = desc(64, 32);
        assert!(base.is_compatible_with(&desc(64, 32)));
        assert!(!base.is_compatible_with(&desc(64, 33)));

        let mut other_format = desc(64, 32);
        other_format.format = wgpu::TextureFormat::R8Unorm;
        assert!(!base.is_compatible_with(&other_format));
    }

    #[test]
    fn wider_usage_covers_narrower_request() {
        let mut wide = desc(8, 8);
        wide.usage |= wgpu::TextureUsages::STORAGE_BINDING;
        assert!(wide.is_compatible_with(&desc(8, 8)));
        assert!(!desc(8, 8).is_compatible_with(&wide));
    }

    #[test]
    fn mip_size_clamps_to_one() {
        let d = desc(16, 4);
        assert_eq!(d.mip_size(1), (8, 2));
        assert_eq!(d.mip_size(3), (2, 1));
        assert_eq!(d.mip_size(10), (1, 1));
    }

    fn copyable(w: u32, h: u32, format: wgpu::TextureFormat) -> TextureDesc {
        TextureDesc::new_2d(
            "Copyable",
            w,
            h,
            format,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST,
        )
    }

    #[test]
    fn copy_accepts_matching_and_srgb_variant_formats() {
        let linear = copyable(8, 8, wgpu::TextureFormat::Rgba8Unorm);
        let srgb = copyable(8, 8, wgpu::TextureFormat::Rgba8UnormSrgb);
        assert!(linear.check_copy_to(&linear).is_ok());
        assert!(linear.check_copy_to(&srgb).is_ok());
    }

    #[test]
    fn copy_rejects_size_and_format_mismatch() {
        let src = copyable(8, 8, wgpu::TextureFormat::Rgba16Float);
        assert!(matches!(
            src.check_copy_to(&copyable(8, 4, wgpu::TextureFormat::Rgba16Float)),
            Err(PostFxError::Backend(_))
        ));
        assert!(matches!(
            src.check_copy_to(&copyable(8, 8, wgpu::TextureFormat::Rgba8Unorm)),
            Err(PostFxError::Backend(_))
        ));
    }

    #[test]
    fn copy_requires_copy_usages() {
        let src = copyable(8, 8, wgpu::TextureFormat::Rgba16Float);
        let mut no_dst = src.clone();
        no_dst.usage.remove(wgpu::TextureUsages::COPY_DST);
        let mut no_src = src.clone();
        no_src.usage.remove(wgpu::TextureUsages::COPY_SRC);

        assert!(matches!(src.check_copy_to(&no_dst), Err(PostFxError::Backend(_))));
        assert!(matches!(no_src.check_copy_to(&src), Err(PostFxError::Backend(_))));
    }
}
