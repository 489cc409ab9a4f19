//! wgpu Backend
//!
//! Immediate-mode [`GraphicsBackend`] on top of `wgpu`. Every recording call
//! is encoded straight into a lazily created [`wgpu::CommandEncoder`] which
//! is submitted in [`end_frame`](GraphicsBackend::end_frame).
//!
//! # Materials
//!
//! The backend never compiles shaders. The asset layer hands it a
//! [`WgpuMaterialDesc`] describing an already-built pipeline and how the
//! symbolic [`PropertyId`]s map onto its bind group:
//!
//! ```text
//! WgpuMaterialDesc
//! ├─ pipeline        Render(fullscreen triangle) | Compute([kernel 0, kernel 1, ..])
//! ├─ layout          bind group layout for group 0
//! ├─ uniform_fields  PropertyId → byte offset in the uniform block
//! ├─ textures        PropertyId → binding (sampled)
//! ├─ storage         PropertyId → binding (storage, compute only)
//! └─ sampler_binding optional linear clamp sampler
//! ```
//!
//! Keywords are packed as `f32` uniform fields (`1.0` enabled, `0.0`
//! disabled). Globals fill any field or texture the material has not set
//! locally; unbound textures fall back to a 1×1 black texture.
//!
//! Each invocation uploads its uniform block into a fresh buffer, so several
//! draws of the same material within one encoder each see their own values.
//!
//! A texture released while commands are still being encoded stays alive
//! until [`end_frame`](GraphicsBackend::end_frame) has submitted them; only
//! then is it destroyed.

use glam::Vec4;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use wgpu::util::DeviceExt;

use super::{GraphHandle, GraphicsBackend, LoadOp, MaterialHandle, TextureDesc, TextureId, TextureView};
use crate::errors::{PostFxError, Result};
use crate::renderer::binding_table::PropertyId;

// ─── Material Description ─────────────────────────────────────────────────────

/// Pipeline object backing a material.
pub enum WgpuPipelineKind {
    /// Fullscreen-triangle render pipeline (`draw(0..3, 0..1)`).
    Render(wgpu::RenderPipeline),
    /// One compute pipeline per kernel index.
    Compute(Vec<wgpu::ComputePipeline>),
}

/// Location of a scalar or vector inside a material's uniform block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WgpuUniformField {
    pub id: PropertyId,
    /// Byte offset from the start of the block.
    pub offset: u32,
    /// `1` for `f32` and keywords, `4` for `vec4<f32>`.
    pub components: u32,
}

impl WgpuUniformField {
    #[must_use]
    pub fn scalar(id: PropertyId, offset: u32) -> Self {
        Self {
            id,
            offset,
            components: 1,
        }
    }

    #[must_use]
    pub fn vec4(id: PropertyId, offset: u32) -> Self {
        Self {
            id,
            offset,
            components: 4,
        }
    }

    fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.components) * 4
    }
}

/// Everything the backend needs to bind and invoke a material.
pub struct WgpuMaterialDesc {
    pub label: &'static str,
    pub pipeline: WgpuPipelineKind,
    pub layout: wgpu::BindGroupLayout,
    pub uniform_binding: Option<u32>,
    pub uniform_size: u64,
    pub uniform_fields: Vec<WgpuUniformField>,
    pub textures: Vec<(PropertyId, u32)>,
    pub storage_textures: Vec<(PropertyId, u32)>,
    pub sampler_binding: Option<u32>,
}

// ─── Internal Types ───────────────────────────────────────────────────────────

struct WgpuTexture {
    desc: TextureDesc,
    texture: wgpu::Texture,
    mip_views: Vec<wgpu::TextureView>,
}

impl WgpuTexture {
    fn new(device: &wgpu::Device, desc: &TextureDesc) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });

        let mip_views = (0..desc.mip_level_count)
            .map(|mip| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(desc.label),
                    base_mip_level: mip,
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        Self {
            desc: desc.clone(),
            texture,
            mip_views,
        }
    }
}

struct WgpuMaterial {
    desc: WgpuMaterialDesc,
    uniform_data: Vec<u8>,
    /// Uniform fields written through the material (globals do not override these).
    local_fields: FxHashSet<PropertyId>,
    textures: FxHashMap<PropertyId, TextureView>,
    storage: FxHashMap<PropertyId, TextureView>,
}

impl WgpuMaterial {
    fn write_field(&mut self, id: PropertyId, values: &[f32]) {
        let Some(field) = self.desc.uniform_fields.iter().find(|f| f.id == id) else {
            return;
        };
        let count = (field.components as usize).min(values.len());
        let start = field.offset as usize;
        let bytes: &[u8] = bytemuck::cast_slice(&values[..count]);
        self.uniform_data[start..start + bytes.len()].copy_from_slice(bytes);
        self.local_fields.insert(id);
    }
}

#[derive(Default)]
struct WgpuGlobals {
    floats: FxHashMap<PropertyId, f32>,
    vectors: FxHashMap<PropertyId, Vec4>,
    textures: FxHashMap<PropertyId, TextureView>,
    keywords: FxHashMap<PropertyId, bool>,
}

impl WgpuGlobals {
    fn value_for(&self, id: PropertyId) -> Option<[f32; 4]> {
        if let Some(v) = self.vectors.get(&id) {
            return Some(v.to_array());
        }
        if let Some(f) = self.floats.get(&id) {
            return Some([*f, 0.0, 0.0, 0.0]);
        }
        self.keywords
            .get(&id)
            .map(|on| [if *on { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0])
    }
}

// ─── Backend ──────────────────────────────────────────────────────────────────

/// Immediate `wgpu` backend.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: SlotMap<TextureId, WgpuTexture>,
    materials: SlotMap<MaterialHandle, WgpuMaterial>,
    globals: WgpuGlobals,
    sampler: wgpu::Sampler,
    fallback: WgpuTexture,
    encoder: Option<wgpu::CommandEncoder>,
    /// Released mid-frame; destroyed after the next submit.
    retired: Vec<wgpu::Texture>,
    next_graph_handle: u32,
}

impl WgpuBackend {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("PostFx Linear Clamp Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // wgpu zero-initializes new textures, so this reads as black.
        let fallback = WgpuTexture::new(
            &device,
            &TextureDesc::new_2d(
                "PostFx Fallback Black",
                1,
                1,
                wgpu::TextureFormat::Rgba8Unorm,
                wgpu::TextureUsages::TEXTURE_BINDING,
            ),
        );

        Self {
            device,
            queue,
            textures: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            globals: WgpuGlobals::default(),
            sampler,
            fallback,
            encoder: None,
            retired: Vec::new(),
            next_graph_handle: 0,
        }
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Textures released during the current frame that are still waiting
    /// for the submit in [`end_frame`](GraphicsBackend::end_frame).
    #[inline]
    #[must_use]
    pub fn retired_texture_count(&self) -> usize {
        self.retired.len()
    }

    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Registers a material built by the asset layer.
    ///
    /// Fails if a uniform field lies outside the declared block size.
    pub fn register_material(&mut self, desc: WgpuMaterialDesc) -> Result<MaterialHandle> {
        if let Some(field) = desc.uniform_fields.iter().find(|f| f.end() > desc.uniform_size) {
            return Err(PostFxError::configuration(
                desc.label,
                format!(
                    "uniform field at offset {} exceeds block size {}",
                    field.offset, desc.uniform_size
                ),
            ));
        }
        let uniform_data = vec![0; desc.uniform_size as usize];
        Ok(self.materials.insert(WgpuMaterial {
            desc,
            uniform_data,
            local_fields: FxHashSet::default(),
            textures: FxHashMap::default(),
            storage: FxHashMap::default(),
        }))
    }

    pub fn remove_material(&mut self, material: MaterialHandle) {
        self.materials.remove(material);
    }

    /// Raw texture, for presenting or reading back a pipeline output.
    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&wgpu::Texture> {
        self.textures.get(id).map(|t| &t.texture)
    }

    fn mip_view(&self, view: TextureView) -> Result<&wgpu::TextureView> {
        let tex = self.textures.get(view.texture).ok_or(PostFxError::UnknownTexture)?;
        tex.mip_views.get(view.mip as usize).ok_or_else(|| {
            PostFxError::Backend(format!(
                "mip {} out of range for '{}'",
                view.mip, tex.desc.label
            ))
        })
    }

    fn material(&self, material: MaterialHandle) -> Result<&WgpuMaterial> {
        self.materials.get(material).ok_or_else(|| {
            PostFxError::configuration("wgpu", "material handle is not registered")
        })
    }

    /// Material uniforms with globals applied to every field not set locally.
    fn uniform_bytes(&self, mat: &WgpuMaterial) -> Vec<u8> {
        let mut data = mat.uniform_data.clone();
        for field in &mat.desc.uniform_fields {
            if mat.local_fields.contains(&field.id) {
                continue;
            }
            if let Some(value) = self.globals.value_for(field.id) {
                let count = field.components as usize;
                let bytes: &[u8] = bytemuck::cast_slice(&value[..count]);
                let start = field.offset as usize;
                data[start..start + bytes.len()].copy_from_slice(bytes);
            }
        }
        data
    }

    fn sampled_view(&self, mat: &WgpuMaterial, id: PropertyId) -> Result<&wgpu::TextureView> {
        match mat
            .textures
            .get(&id)
            .or_else(|| self.globals.textures.get(&id))
        {
            Some(view) => self.mip_view(*view),
            None => Ok(&self.fallback.mip_views[0]),
        }
    }

    fn build_bind_group(&self, material: MaterialHandle) -> Result<wgpu::BindGroup> {
        let mat = self.material(material)?;
        let label = mat.desc.label;

        let uniform_buffer = mat.desc.uniform_binding.map(|_| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: &self.uniform_bytes(mat),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        });

        let mut entries = Vec::with_capacity(
            mat.desc.textures.len() + mat.desc.storage_textures.len() + 2,
        );
        for (id, binding) in &mat.desc.textures {
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(self.sampled_view(mat, *id)?),
            });
        }
        for (id, binding) in &mat.desc.storage_textures {
            let view = mat.storage.get(id).ok_or_else(|| {
                PostFxError::configuration(label, "storage texture is not bound")
            })?;
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(self.mip_view(*view)?),
            });
        }
        if let Some(binding) = mat.desc.sampler_binding {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        if let (Some(binding), Some(buffer)) = (mat.desc.uniform_binding, uniform_buffer.as_ref()) {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            });
        }

        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &mat.desc.layout,
            entries: &entries,
        }))
    }

    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        self.encoder.take().unwrap_or_else(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("PostFx Encoder"),
                })
        })
    }
}

impl GraphicsBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        desc.validate()?;
        log::debug!(
            "wgpu: create texture '{}' {}x{} ({} mips)",
            desc.label,
            desc.width,
            desc.height,
            desc.mip_level_count
        );
        Ok(self.textures.insert(WgpuTexture::new(&self.device, desc)))
    }

    fn release_texture(&mut self, id: TextureId) {
        if let Some(tex) = self.textures.remove(id) {
            if self.encoder.is_some() {
                self.retired.push(tex.texture);
            } else {
                tex.texture.destroy();
            }
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
            m.write_field(id, &[value]);
        }
    }

    fn set_vector(&mut self, material: MaterialHandle, id: PropertyId, value: Vec4) {
        if let Some(m) = self.materials.get_mut(material) {
            m.write_field(id, &value.to_array());
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
            m.write_field(keyword, &[if enabled { 1.0 } else { 0.0 }]);
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
        self.globals.keywords.insert(keyword, enabled);
    }

    fn record_draw(&mut self, material: MaterialHandle, target: TextureView, load: LoadOp) -> Result<()> {
        let mat = self.material(material)?;
        let label = mat.desc.label;
        let WgpuPipelineKind::Render(pipeline) = &mat.desc.pipeline else {
            return Err(PostFxError::configuration(label, "compute material used for a draw"));
        };
        let pipeline = pipeline.clone();
        let bind_group = self.build_bind_group(material)?;

        let mut encoder = self.take_encoder();
        let result = self.mip_view(target).map(|view| {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match load {
                            LoadOp::Clear => wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            LoadOp::Load => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        });
        self.encoder = Some(encoder);
        result
    }

    fn record_dispatch(&mut self, material: MaterialHandle, kernel: u32, groups: [u32; 3]) -> Result<()> {
        let mat = self.material(material)?;
        let label = mat.desc.label;
        let pipeline = match &mat.desc.pipeline {
            WgpuPipelineKind::Compute(kernels) => kernels.get(kernel as usize).cloned(),
            WgpuPipelineKind::Render(_) => None,
        };
        let Some(pipeline) = pipeline else {
            return Err(PostFxError::configuration(
                label,
                format!("compute kernel {kernel} is not available"),
            ));
        };
        let bind_group = self.build_bind_group(material)?;

        let mut encoder = self.take_encoder();
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            cpass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        }
        self.encoder = Some(encoder);
        Ok(())
    }

    fn record_copy(&mut self, src: TextureId, dst: TextureId) -> Result<()> {
        let src_tex = self.textures.get(src).ok_or(PostFxError::UnknownTexture)?;
        let dst_tex = self.textures.get(dst).ok_or(PostFxError::UnknownTexture)?;
        src_tex.desc.check_copy_to(&dst_tex.desc)?;

        let mut encoder = self.take_encoder();
        {
            let src_tex = &self.textures[src];
            let dst_tex = &self.textures[dst];
            encoder.copy_texture_to_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &src_tex.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyTextureInfo {
                    texture: &dst_tex.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::Extent3d {
                    width: src_tex.desc.width,
                    height: src_tex.desc.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        self.encoder = Some(encoder);
        Ok(())
    }

    fn import_into_frame_graph(&mut self, _id: TextureId) -> GraphHandle {
        let handle = GraphHandle(self.next_graph_handle);
        self.next_graph_handle += 1;
        handle
    }

    fn push_debug_group(&mut self, label: &str) {
        let mut encoder = self.take_encoder();
        encoder.push_debug_group(label);
        self.encoder = Some(encoder);
    }

    fn pop_debug_group(&mut self) {
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.pop_debug_group();
        }
    }

    fn begin_frame(&mut self) {
        self.next_graph_handle = 0;
    }

    fn end_frame(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
        for texture in self.retired.drain(..) {
            texture.destroy();
        }
        Ok(())
    }
}
