//! Headless Recording Backend
//!
//! A [`GraphicsBackend`] that performs no GPU work. It keeps a log of every
//! recorded command and simulates texture contents with 64-bit fingerprints:
//!
//! - `record_copy` copies the source fingerprint into the destination.
//! - `record_draw` / `record_dispatch` write a fingerprint derived from the
//!   material, its bound parameters, the fingerprints of bound textures and
//!   (for [`LoadOp::Load`]) the target's previous contents.
//!
//! Two frames that record the same work therefore produce identical logs and
//! identical fingerprints, and "target == source" can be checked by comparing
//! fingerprints.

use std::hash::{Hash, Hasher};

use glam::Vec4;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use slotmap::SlotMap;

use super::{GraphHandle, GraphicsBackend, LoadOp, MaterialHandle, TextureDesc, TextureId, TextureView};
use crate::errors::{PostFxError, Result};
use crate::renderer::binding_table::PropertyId;

/// One entry of the command log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GpuCommand {
    Draw {
        material: MaterialHandle,
        target: TextureView,
        load: LoadOp,
        /// Fingerprint written to the target.
        output: u64,
    },
    Dispatch {
        material: MaterialHandle,
        kernel: u32,
        groups: [u32; 3],
        output: u64,
    },
    Copy {
        src: TextureId,
        dst: TextureId,
    },
    PushDebugGroup(String),
    PopDebugGroup,
}

impl GpuCommand {
    /// `true` for commands that touch texture contents.
    #[must_use]
    pub fn is_gpu_work(&self) -> bool {
        matches!(self, Self::Draw { .. } | Self::Dispatch { .. } | Self::Copy { .. })
    }
}

struct HeadlessTexture {
    desc: TextureDesc,
    /// Simulated contents, one fingerprint per mip.
    contents: Vec<u64>,
}

#[derive(Default)]
struct HeadlessMaterial {
    name: String,
    floats: FxHashMap<PropertyId, f32>,
    vectors: FxHashMap<PropertyId, Vec4>,
    textures: FxHashMap<PropertyId, TextureView>,
    storage: FxHashMap<PropertyId, TextureView>,
    keywords: FxHashSet<PropertyId>,
}

#[derive(Default)]
struct GlobalState {
    floats: FxHashMap<PropertyId, f32>,
    vectors: FxHashMap<PropertyId, Vec4>,
    textures: FxHashMap<PropertyId, TextureView>,
    keywords: FxHashSet<PropertyId>,
}

/// Recording backend with simulated texture contents.
#[derive(Default)]
pub struct HeadlessBackend {
    textures: SlotMap<TextureId, HeadlessTexture>,
    materials: SlotMap<MaterialHandle, HeadlessMaterial>,
    globals: GlobalState,
    commands: Vec<GpuCommand>,
    textures_created: u64,
    textures_released: u64,
    frames_submitted: u64,
    next_graph_handle: u32,
}

impl HeadlessBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Asset-layer side ───────────────────────────────────────────────────

    /// Registers a material, standing in for the asset-resolution layer.
    pub fn register_material(&mut self, name: &str) -> MaterialHandle {
        self.materials.insert(HeadlessMaterial {
            name: name.to_owned(),
            ..Default::default()
        })
    }

    /// Unloads a material; later recordings with it report a configuration error.
    pub fn remove_material(&mut self, material: MaterialHandle) {
        self.materials.remove(material);
    }

    #[must_use]
    pub fn material_name(&self, material: MaterialHandle) -> Option<&str> {
        self.materials.get(material).map(|m| m.name.as_str())
    }

    #[must_use]
    pub fn material_float(&self, material: MaterialHandle, id: PropertyId) -> Option<f32> {
        self.materials.get(material)?.floats.get(&id).copied()
    }

    #[must_use]
    pub fn material_vector(&self, material: MaterialHandle, id: PropertyId) -> Option<Vec4> {
        self.materials.get(material)?.vectors.get(&id).copied()
    }

    #[must_use]
    pub fn material_texture(&self, material: MaterialHandle, id: PropertyId) -> Option<TextureView> {
        self.materials.get(material)?.textures.get(&id).copied()
    }

    #[must_use]
    pub fn material_keyword(&self, material: MaterialHandle, keyword: PropertyId) -> bool {
        self.materials
            .get(material)
            .is_some_and(|m| m.keywords.contains(&keyword))
    }

    #[must_use]
    pub fn global_float(&self, id: PropertyId) -> Option<f32> {
        self.globals.floats.get(&id).copied()
    }

    #[must_use]
    pub fn global_vector(&self, id: PropertyId) -> Option<Vec4> {
        self.globals.vectors.get(&id).copied()
    }

    #[must_use]
    pub fn global_texture(&self, id: PropertyId) -> Option<TextureView> {
        self.globals.textures.get(&id).copied()
    }

    #[must_use]
    pub fn global_keyword(&self, keyword: PropertyId) -> bool {
        self.globals.keywords.contains(&keyword)
    }

    // ── Simulated contents ─────────────────────────────────────────────────

    /// Overwrites the fingerprint of every mip of `id` (e.g. to seed a
    /// camera's rendered frame).
    pub fn write_content(&mut self, id: TextureId, value: u64) {
        if let Some(tex) = self.textures.get_mut(id) {
            tex.contents.fill(value);
        }
    }

    /// Fingerprint of mip 0.
    #[must_use]
    pub fn content(&self, id: TextureId) -> Option<u64> {
        self.content_at(TextureView::from(id))
    }

    #[must_use]
    pub fn content_at(&self, view: TextureView) -> Option<u64> {
        self.textures
            .get(view.texture)?
            .contents
            .get(view.mip as usize)
            .copied()
    }

    // ── Inspection ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Returns the log and starts a new one.
    pub fn take_commands(&mut self) -> Vec<GpuCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Number of draw and dispatch commands in the log.
    #[must_use]
    pub fn work_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, GpuCommand::Draw { .. } | GpuCommand::Dispatch { .. }))
            .count()
    }

    #[must_use]
    pub fn textures_created(&self) -> u64 {
        self.textures_created
    }

    #[must_use]
    pub fn textures_released(&self) -> u64 {
        self.textures_released
    }

    #[must_use]
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    // ── Internals ──────────────────────────────────────────────────────────

    fn texture_fingerprint(&self, view: TextureView) -> u64 {
        self.content_at(view).unwrap_or(0)
    }

    /// Deterministic fingerprint of a material invocation.
    fn invocation_fingerprint(&self, material: MaterialHandle, salt: u64) -> u64 {
        let mut hasher = FxHasher::default();
        material.hash(&mut hasher);
        salt.hash(&mut hasher);

        if let Some(mat) = self.materials.get(material) {
            let mut floats: Vec<_> = mat.floats.iter().map(|(k, v)| (*k, v.to_bits())).collect();
            floats.sort_unstable();
            floats.hash(&mut hasher);

            let mut vectors: Vec<_> = mat
                .vectors
                .iter()
                .map(|(k, v)| (*k, v.to_array().map(f32::to_bits)))
                .collect();
            vectors.sort_unstable();
            vectors.hash(&mut hasher);

            let mut textures: Vec<_> = mat
                .textures
                .iter()
                .map(|(k, v)| (*k, self.texture_fingerprint(*v)))
                .collect();
            textures.sort_unstable();
            textures.hash(&mut hasher);

            let mut keywords: Vec<_> = mat.keywords.iter().copied().collect();
            keywords.sort_unstable();
            keywords.hash(&mut hasher);
        }

        let mut globals: Vec<_> = self
            .globals
            .floats
            .iter()
            .map(|(k, v)| (*k, v.to_bits()))
            .collect();
        globals.sort_unstable();
        globals.hash(&mut hasher);

        let mut global_vectors: Vec<_> = self
            .globals
            .vectors
            .iter()
            .map(|(k, v)| (*k, v.to_array().map(f32::to_bits)))
            .collect();
        global_vectors.sort_unstable();
        global_vectors.hash(&mut hasher);

        let mut global_textures: Vec<_> = self
            .globals
            .textures
            .iter()
            .map(|(k, v)| (*k, self.texture_fingerprint(*v)))
            .collect();
        global_textures.sort_unstable();
        global_textures.hash(&mut hasher);

        let mut global_keywords: Vec<_> = self.globals.keywords.iter().copied().collect();
        global_keywords.sort_unstable();
        global_keywords.hash(&mut hasher);

        hasher.finish()
    }

    fn check_view(&self, view: TextureView) -> Result<()> {
        let tex = self.textures.get(view.texture).ok_or(PostFxError::UnknownTexture)?;
        if view.mip >= tex.desc.mip_level_count {
            return Err(PostFxError::Backend(format!(
                "mip {} out of range for '{}' ({} mips)",
                view.mip, tex.desc.label, tex.desc.mip_level_count
            )));
        }
        Ok(())
    }

    fn check_material(&self, material: MaterialHandle) -> Result<()> {
        if self.materials.contains_key(material) {
            Ok(())
        } else {
            Err(PostFxError::configuration(
                "headless",
                "material handle is not registered",
            ))
        }
    }

    fn write_view(&mut self, view: TextureView, value: u64) {
        if let Some(slot) = self
            .textures
            .get_mut(view.texture)
            .and_then(|t| t.contents.get_mut(view.mip as usize))
        {
            *slot = value;
        }
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        desc.validate()?;
        self.textures_created += 1;
        log::trace!(
            "headless: create '{}' {}x{} ({} mips)",
            desc.label,
            desc.width,
            desc.height,
            desc.mip_level_count
        );
        Ok(self.textures.insert(HeadlessTexture {
            desc: desc.clone(),
            contents: vec![0; desc.mip_level_count as usize],
        }))
    }

    fn release_texture(&mut self, id: TextureId) {
        if self.textures.remove(id).is_some() {
            self.textures_released += 1;
        }
    }

    fn texture_desc(&self, id: TextureId) -> Option<&TextureDesc> {
        self.textures.get(id).map(|t| &t.desc)
    }

    fn contains_material(&self, material: MaterialHandle) -> bool {
        self.materials.contains_key(material)
    }

    fn set_float(&mut self, material: MaterialHandle, id: PropertyId, value: f32) {
        if let Some(m) = self.materials.get_mut(material) {
            m.floats.insert(id, value);
        }
    }

    fn set_vector(&mut self, material: MaterialHandle, id: PropertyId, value: Vec4) {
        if let Some(m) = self.materials.get_mut(material) {
            m.vectors.insert(id, value);
        }
    }

    fn set_texture(&mut self, material: MaterialHandle, id: PropertyId, view: TextureView) {
        if let Some(m) = self.materials.get_mut(material) {
            m.textures.insert(id, view);
        }
    }

    fn set_storage_texture(&mut self, material: MaterialHandle, id: PropertyId, view: TextureView) {
        if let Some(m) = self.materials.get_mut(material) {
            m.storage.insert(id, view);
        }
    }

    fn set_keyword(&mut self, material: MaterialHandle, keyword: PropertyId, enabled: bool) {
        if let Some(m) = self.materials.get_mut(material) {
            if enabled {
                m.keywords.insert(keyword);
            } else {
                m.keywords.remove(&keyword);
            }
        }
    }

    fn set_global_float(&mut self, id: PropertyId, value: f32) {
        self.globals.floats.insert(id, value);
    }

    fn set_global_vector(&mut self, id: PropertyId, value: Vec4) {
        self.globals.vectors.insert(id, value);
    }

    fn set_global_texture(&mut self, id: PropertyId, view: Option<TextureView>) {
        match view {
            Some(view) => self.globals.textures.insert(id, view),
            None => self.globals.textures.remove(&id),
        };
    }

    fn set_global_keyword(&mut self, keyword: PropertyId, enabled: bool) {
        if enabled {
            self.globals.keywords.insert(keyword);
        } else {
            self.globals.keywords.remove(&keyword);
        }
    }

    fn record_draw(&mut self, material: MaterialHandle, target: TextureView, load: LoadOp) -> Result<()> {
        self.check_material(material)?;
        self.check_view(target)?;

        let previous = match load {
            LoadOp::Load => self.texture_fingerprint(target),
            LoadOp::Clear => 0,
        };
        let output = self.invocation_fingerprint(material, previous);
        self.write_view(target, output);
        self.commands.push(GpuCommand::Draw {
            material,
            target,
            load,
            output,
        });
        Ok(())
    }

    fn record_dispatch(&mut self, material: MaterialHandle, kernel: u32, groups: [u32; 3]) -> Result<()> {
        self.check_material(material)?;

        let mut outputs: Vec<(PropertyId, TextureView)> = self
            .materials
            .get(material)
            .map(|m| m.storage.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default();
        outputs.sort_unstable_by_key(|(k, _)| *k);
        for (_, view) in &outputs {
            self.check_view(*view)?;
        }

        let salt = (u64::from(kernel) << 48)
            ^ (u64::from(groups[0]) << 32)
            ^ (u64::from(groups[1]) << 16)
            ^ u64::from(groups[2]);
        let output = self.invocation_fingerprint(material, salt);
        for (_, view) in outputs {
            self.write_view(view, output);
        }
        self.commands.push(GpuCommand::Dispatch {
            material,
            kernel,
            groups,
            output,
        });
        Ok(())
    }

    fn record_copy(&mut self, src: TextureId, dst: TextureId) -> Result<()> {
        let src_desc = self.texture_desc(src).ok_or(PostFxError::UnknownTexture)?;
        let dst_desc = self.texture_desc(dst).ok_or(PostFxError::UnknownTexture)?;
        src_desc.check_copy_to(dst_desc)?;
        let value = self.texture_fingerprint(TextureView::from(src));
        self.write_view(TextureView::from(dst), value);
        self.commands.push(GpuCommand::Copy { src, dst });
        Ok(())
    }

    fn import_into_frame_graph(&mut self, _id: TextureId) -> GraphHandle {
        let handle = GraphHandle(self.next_graph_handle);
        self.next_graph_handle += 1;
        handle
    }

    fn push_debug_group(&mut self, label: &str) {
        self.commands.push(GpuCommand::PushDebugGroup(label.to_owned()));
    }

    fn pop_debug_group(&mut self) {
        self.commands.push(GpuCommand::PopDebugGroup);
    }

    fn begin_frame(&mut self) {
        self.next_graph_handle = 0;
    }

    fn end_frame(&mut self) -> Result<()> {
        self.frames_submitted += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::binding_table::ShaderBindingTable;

    fn color(label: &'static str, w: u32, h: u32) -> TextureDesc {
        TextureDesc::new_2d(
            label,
            w,
            h,
            wgpu::TextureFormat::Rgba16Float,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        )
    }

    #[test]
    fn copy_propagates_content() {
        let mut backend = HeadlessBackend::new();
        let a = backend.create_texture(&color("A", 4, 4)).unwrap();
        let b = backend.create_texture(&color("B", 4, 4)).unwrap();
        backend.write_content(a, 42);
        backend.record_copy(a, b).unwrap();
        assert_eq!(backend.content(b), Some(42));
    }

    #[test]
    fn copy_rejects_size_mismatch() {
        let mut backend = HeadlessBackend::new();
        let a = backend.create_texture(&color("A", 4, 4)).unwrap();
        let b = backend.create_texture(&color("B", 8, 4)).unwrap();
        assert!(backend.record_copy(a, b).is_err());
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn copy_rejects_incompatible_format_or_usage() {
        let mut backend = HeadlessBackend::new();
        let a = backend.create_texture(&color("A", 4, 4)).unwrap();

        let mut mask = color("Mask", 4, 4);
        mask.format = wgpu::TextureFormat::R8Unorm;
        let mask = backend.create_texture(&mask).unwrap();

        let mut sampled_only = color("Sampled", 4, 4);
        sampled_only.usage = wgpu::TextureUsages::TEXTURE_BINDING;
        let sampled_only = backend.create_texture(&sampled_only).unwrap();

        assert!(matches!(backend.record_copy(a, mask), Err(PostFxError::Backend(_))));
        assert!(matches!(backend.record_copy(a, sampled_only), Err(PostFxError::Backend(_))));
        assert!(matches!(backend.record_copy(sampled_only, a), Err(PostFxError::Backend(_))));
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn draw_output_depends_on_global_vectors() {
        let mut table = ShaderBindingTable::new();
        let params = table.declare("_Params");

        let mut backend = HeadlessBackend::new();
        let mat = backend.register_material("Blit");
        let out = backend.create_texture(&color("Out", 4, 4)).unwrap();

        backend.set_global_vector(params, Vec4::new(1.0, 0.0, 0.0, 0.0));
        backend.record_draw(mat, out.into(), LoadOp::Clear).unwrap();
        let first = backend.content(out).unwrap();

        backend.set_global_vector(params, Vec4::new(2.0, 0.0, 0.0, 0.0));
        backend.record_draw(mat, out.into(), LoadOp::Clear).unwrap();
        let second = backend.content(out).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn draw_output_depends_on_bound_inputs() {
        let mut table = ShaderBindingTable::new();
        let src_id = table.declare("_SourceTex");

        let mut backend = HeadlessBackend::new();
        let mat = backend.register_material("Blit");
        let a = backend.create_texture(&color("A", 4, 4)).unwrap();
        let out = backend.create_texture(&color("Out", 4, 4)).unwrap();

        backend.write_content(a, 1);
        backend.set_texture(mat, src_id, a.into());
        backend.record_draw(mat, out.into(), LoadOp::Clear).unwrap();
        let first = backend.content(out).unwrap();

        backend.write_content(a, 2);
        backend.record_draw(mat, out.into(), LoadOp::Clear).unwrap();
        let second = backend.content(out).unwrap();

        assert_ne!(first, second);
        assert_ne!(first, 1);
    }

    #[test]
    fn unknown_material_is_a_configuration_error() {
        let mut backend = HeadlessBackend::new();
        let mat = backend.register_material("Gone");
        backend.remove_material(mat);
        let out = backend.create_texture(&color("Out", 4, 4)).unwrap();
        let err = backend.record_draw(mat, out.into(), LoadOp::Clear).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn dispatch_writes_storage_targets() {
        let mut table = ShaderBindingTable::new();
        let out_id = table.declare("_Output");

        let mut backend = HeadlessBackend::new();
        let kernel = backend.register_material("Kernel");
        let out = backend.create_texture(&color("Out", 16, 16)).unwrap();
        backend.set_storage_texture(kernel, out_id, out.into());
        backend.record_dispatch(kernel, 0, [2, 2, 1]).unwrap();
        assert_ne!(backend.content(out), Some(0));
        assert_eq!(backend.work_count(), 1);
    }
}
