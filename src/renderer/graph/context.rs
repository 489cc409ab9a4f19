//! Pass Contexts
//!
//! - [`SetupContext`]: handed to [`EffectPass::setup`](super::pass::EffectPass::setup)
//!   once at pipeline build. Read access to the sealed binding table.
//! - [`PassContext`]: handed to the per-camera phases. Field-level mutable
//!   access to the backend, the resource pool and the history manager, plus
//!   the camera's frame description and the post-processing color chain.
//!
//! # Color Chain
//!
//! Post-processing passes read [`PassContext::color_input`] and write into
//! [`PassContext::color_output`], then call [`PassContext::flip_color`]. The
//! chain starts at the frame's source texture and ping-pongs between two
//! pooled buffers:
//!
//! ```text
//! source ─► post.color[0] ─► post.color[1] ─► post.color[0] ─► …
//! ```
//!
//! The scheduler copies whatever the chain ends on into the camera target.

use glam::Vec3;

use super::history::FrameHistoryManager;
use super::pool::{PoolSlot, ResourcePool};
use crate::errors::{PostFxError, Result};
use crate::renderer::binding_table::ShaderBindingTable;
use crate::renderer::core::{GraphicsBackend, MaterialHandle, TextureDesc, TextureId};
use crate::renderer::registry::{AdditionalLightData, CameraKey, KeyedRegistry, LightKey};
use crate::renderer::settings::PipelineSettings;
use crate::volume::VolumeResolver;

const COLOR_SLOT: &str = "post.color";

// ─── Frame Inputs ─────────────────────────────────────────────────────────────

/// Camera identity and placement, as seen by the resolver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub key: CameraKey,
    /// World-space position, used to pick bounded volumes.
    pub position: Vec3,
}

impl CameraView {
    #[must_use]
    pub fn new(key: CameraKey, position: Vec3) -> Self {
        Self { key, position }
    }
}

/// Textures of one rendered camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    /// Rendered scene color (read only).
    pub source: TextureId,
    /// Camera target that receives the final color.
    pub target: TextureId,
    pub depth: Option<TextureId>,
    pub normal: Option<TextureId>,
    pub width: u32,
    pub height: u32,
}

impl FrameContext {
    #[must_use]
    pub fn new(source: TextureId, target: TextureId, width: u32, height: u32) -> Self {
        Self {
            source,
            target,
            depth: None,
            normal: None,
            width,
            height,
        }
    }

    #[must_use]
    pub fn with_depth(mut self, depth: TextureId) -> Self {
        self.depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_normal(mut self, normal: TextureId) -> Self {
        self.normal = Some(normal);
        self
    }

    /// Frame-level validation: non-zero size, live source and target.
    pub fn validate(&self, backend: &dyn GraphicsBackend) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PostFxError::invalid_resource("camera frame", self.width, self.height));
        }
        if backend.texture_desc(self.source).is_none() || backend.texture_desc(self.target).is_none() {
            return Err(PostFxError::UnknownTexture);
        }
        Ok(())
    }
}

/// Products of earlier passes that later passes may consume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBlackboard {
    pub contact_shadow_mask: Option<TextureId>,
    pub color_pyramid: Option<TextureId>,
    pub bloom: Option<TextureId>,
}

/// Post-processing ping-pong state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorChain {
    current: TextureId,
    next_slot: u32,
    written: bool,
}

impl ColorChain {
    #[must_use]
    pub fn new(source: TextureId) -> Self {
        Self {
            current: source,
            next_slot: 0,
            written: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> TextureId {
        self.current
    }

    /// Whether any pass has written color this frame.
    #[inline]
    #[must_use]
    pub fn written(&self) -> bool {
        self.written
    }
}

// ─── Contexts ─────────────────────────────────────────────────────────────────

/// Build-time context.
pub struct SetupContext<'a> {
    pub bindings: &'a ShaderBindingTable,
    pub settings: &'a PipelineSettings,
}

/// Shared pipeline state borrowed for one camera frame.
pub struct PipelineResources<'a> {
    pub backend: &'a mut dyn GraphicsBackend,
    pub pool: &'a mut ResourcePool,
    pub history: &'a mut FrameHistoryManager,
    pub bindings: &'a ShaderBindingTable,
    pub lights: &'a KeyedRegistry<LightKey, AdditionalLightData>,
    pub resolver: &'a dyn VolumeResolver,
    pub settings: &'a PipelineSettings,
}

/// Per-camera context of the `on_camera_setup` / `execute` phases.
pub struct PassContext<'a> {
    pub backend: &'a mut dyn GraphicsBackend,
    pub pool: &'a mut ResourcePool,
    pub history: &'a mut FrameHistoryManager,
    pub bindings: &'a ShaderBindingTable,
    pub lights: &'a KeyedRegistry<LightKey, AdditionalLightData>,
    pub resolver: &'a dyn VolumeResolver,
    pub settings: &'a PipelineSettings,
    pub camera: &'a CameraView,
    pub frame: &'a FrameContext,
    pub blackboard: FrameBlackboard,
    pub(crate) color: ColorChain,
    pub(crate) to_camera_target: bool,
}

impl<'a> PassContext<'a> {
    pub(crate) fn new(res: PipelineResources<'a>, camera: &'a CameraView, frame: &'a FrameContext) -> Self {
        Self {
            backend: res.backend,
            pool: res.pool,
            history: res.history,
            bindings: res.bindings,
            lights: res.lights,
            resolver: res.resolver,
            settings: res.settings,
            camera,
            frame,
            blackboard: FrameBlackboard::default(),
            color: ColorChain::new(frame.source),
            to_camera_target: false,
        }
    }

    /// Texture holding the current post-processing color.
    #[inline]
    #[must_use]
    pub fn color_input(&self) -> TextureId {
        self.color.current
    }

    /// Descriptor matching the frame's color at full resolution.
    pub fn color_desc(&self, label: &'static str) -> Result<TextureDesc> {
        let format = self
            .backend
            .texture_desc(self.frame.source)
            .map(|d| d.format)
            .ok_or(PostFxError::UnknownTexture)?;
        Ok(TextureDesc::new_2d(
            label,
            self.frame.width,
            self.frame.height,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        ))
    }

    /// Texture the current pass should write color into.
    ///
    /// The camera target for passes flagged `RENDERS_TO_CAMERA_TARGET`,
    /// otherwise the next ping-pong buffer.
    pub fn color_output(&mut self) -> Result<TextureId> {
        if self.to_camera_target {
            return Ok(self.frame.target);
        }
        let desc = self.color_desc(COLOR_SLOT)?;
        self.pool
            .acquire(&mut *self.backend, PoolSlot::new(COLOR_SLOT, self.color.next_slot), &desc)
    }

    /// Makes `written` the new color input.
    pub fn flip_color(&mut self, written: TextureId) {
        self.color.current = written;
        self.color.written = true;
        if written != self.frame.target {
            self.color.next_slot ^= 1;
        }
    }

    /// The material, or a configuration error naming `pass`.
    pub fn require_material(&self, pass: &str, material: Option<MaterialHandle>) -> Result<MaterialHandle> {
        match material {
            Some(m) if self.backend.contains_material(m) => Ok(m),
            Some(_) => Err(PostFxError::configuration(pass, "material is not loaded")),
            None => Err(PostFxError::configuration(pass, "no material assigned")),
        }
    }
}
