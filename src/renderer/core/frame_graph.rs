//! Declarative Frame-Graph Recording
//!
//! [`FrameGraphBackend`] wraps another backend and turns immediate recording
//! into declaration: every binding and recording call becomes a node in a
//! per-frame graph, and the textures it touches are imported as
//! [`GraphHandle`]s. Nothing reaches the inner backend until
//! [`end_frame`](GraphicsBackend::end_frame), which replays the nodes in
//! declaration order and then submits.
//!
//! ```text
//!   pass.execute()                         end_frame()
//!   ──────────────                         ───────────
//!   set_texture(m, _Src, tex) ─► Node ┐    compile: nodes in order
//!   record_draw(m, out)       ─► Node ├──► replay on inner backend
//!   release_texture(old)      ─► deferred  release deferred textures
//!                                     ┘    inner.end_frame()
//! ```
//!
//! Texture creation is not deferred (handles must exist immediately), but
//! releases are: a texture referenced by a node stays alive until the graph
//! has executed.

use glam::Vec4;
use rustc_hash::FxHashMap;

use super::{GraphHandle, GraphicsBackend, LoadOp, MaterialHandle, TextureDesc, TextureId, TextureView};
use crate::errors::{PostFxError, Result};
use crate::renderer::binding_table::PropertyId;

#[derive(Clone, Copy, Debug, PartialEq)]
struct GraphView {
    texture: GraphHandle,
    mip: u32,
}

#[derive(Clone, Debug, PartialEq)]
enum GraphNode {
    SetFloat(MaterialHandle, PropertyId, f32),
    SetVector(MaterialHandle, PropertyId, Vec4),
    SetTexture(MaterialHandle, PropertyId, GraphView),
    SetStorageTexture(MaterialHandle, PropertyId, GraphView),
    SetKeyword(MaterialHandle, PropertyId, bool),
    SetGlobalFloat(PropertyId, f32),
    SetGlobalVector(PropertyId, Vec4),
    SetGlobalTexture(PropertyId, Option<GraphView>),
    SetGlobalKeyword(PropertyId, bool),
    Draw {
        material: MaterialHandle,
        target: GraphView,
        load: LoadOp,
    },
    Dispatch {
        material: MaterialHandle,
        kernel: u32,
        groups: [u32; 3],
    },
    Copy {
        src: GraphHandle,
        dst: GraphHandle,
    },
    PushDebugGroup(String),
    PopDebugGroup,
}

/// Declarative recording wrapper around an immediate backend.
pub struct FrameGraphBackend<B> {
    inner: B,
    nodes: Vec<GraphNode>,
    imports: Vec<TextureId>,
    import_lookup: FxHashMap<TextureId, GraphHandle>,
    pending_releases: Vec<TextureId>,
    executed_frames: u64,
}

impl<B: GraphicsBackend> FrameGraphBackend<B> {
    #[must_use]
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            nodes: Vec::new(),
            imports: Vec::new(),
            import_lookup: FxHashMap::default(),
            pending_releases: Vec::new(),
            executed_frames: 0,
        }
    }

    #[must_use]
    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.inner
    }

    #[must_use]
    pub fn into_inner(self) -> B {
        self.inner
    }

    /// Nodes declared so far this frame.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Distinct textures imported this frame.
    #[must_use]
    pub fn imported_count(&self) -> usize {
        self.imports.len()
    }

    #[must_use]
    pub fn executed_frames(&self) -> u64 {
        self.executed_frames
    }

    fn view(&mut self, view: TextureView) -> GraphView {
        GraphView {
            texture: self.import_into_frame_graph(view.texture),
            mip: view.mip,
        }
    }

    fn resolve(&self, view: GraphView) -> TextureView {
        TextureView {
            texture: self.imports[view.texture.0 as usize],
            mip: view.mip,
        }
    }

    fn check_texture(&self, id: TextureId) -> Result<()> {
        if self.inner.texture_desc(id).is_some() {
            Ok(())
        } else {
            Err(PostFxError::UnknownTexture)
        }
    }

    fn check_material(&self, material: MaterialHandle) -> Result<()> {
        if self.inner.contains_material(material) {
            Ok(())
        } else {
            Err(PostFxError::configuration(
                "frame graph",
                "material handle is not registered",
            ))
        }
    }

    fn replay(&mut self, node: GraphNode) -> Result<()> {
        match node {
            GraphNode::SetFloat(m, id, v) => self.inner.set_float(m, id, v),
            GraphNode::SetVector(m, id, v) => self.inner.set_vector(m, id, v),
            GraphNode::SetTexture(m, id, view) => {
                let view = self.resolve(view);
                self.inner.set_texture(m, id, view);
            }
            GraphNode::SetStorageTexture(m, id, view) => {
                let view = self.resolve(view);
                self.inner.set_storage_texture(m, id, view);
            }
            GraphNode::SetKeyword(m, id, on) => self.inner.set_keyword(m, id, on),
            GraphNode::SetGlobalFloat(id, v) => self.inner.set_global_float(id, v),
            GraphNode::SetGlobalVector(id, v) => self.inner.set_global_vector(id, v),
            GraphNode::SetGlobalTexture(id, view) => {
                let view = view.map(|v| self.resolve(v));
                self.inner.set_global_texture(id, view);
            }
            GraphNode::SetGlobalKeyword(id, on) => self.inner.set_global_keyword(id, on),
            GraphNode::Draw {
                material,
                target,
                load,
            } => {
                let target = self.resolve(target);
                self.inner.record_draw(material, target, load)?;
            }
            GraphNode::Dispatch {
                material,
                kernel,
                groups,
            } => self.inner.record_dispatch(material, kernel, groups)?,
            GraphNode::Copy { src, dst } => {
                let src = self.imports[src.0 as usize];
                let dst = self.imports[dst.0 as usize];
                self.inner.record_copy(src, dst)?;
            }
            GraphNode::PushDebugGroup(label) => self.inner.push_debug_group(&label),
            GraphNode::PopDebugGroup => self.inner.pop_debug_group(),
        }
        Ok(())
    }
}

impl<B: GraphicsBackend> GraphicsBackend for FrameGraphBackend<B> {
    fn name(&self) -> &'static str {
        "frame-graph"
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        self.inner.create_texture(desc)
    }

    fn release_texture(&mut self, id: TextureId) {
        if !self.pending_releases.contains(&id) {
            self.pending_releases.push(id);
        }
    }

    fn texture_desc(&self, id: TextureId) -> Option<&TextureDesc> {
        if self.pending_releases.contains(&id) {
            return None;
        }
        self.inner.texture_desc(id)
    }

    fn contains_material(&self, material: MaterialHandle) -> bool {
        self.inner.contains_material(material)
    }

    fn set_float(&mut self, material: MaterialHandle, id: PropertyId, value: f32) {
        self.nodes.push(GraphNode::SetFloat(material, id, value));
    }

    fn set_vector(&mut self, material: MaterialHandle, id: PropertyId, value: Vec4) {
        self.nodes.push(GraphNode::SetVector(material, id, value));
    }

    fn set_texture(&mut self, material: MaterialHandle, id: PropertyId, view: TextureView) {
        let view = self.view(view);
        self.nodes.push(GraphNode::SetTexture(material, id, view));
    }

    fn set_storage_texture(&mut self, material: MaterialHandle, id: PropertyId, view: TextureView) {
        let view = self.view(view);
        self.nodes.push(GraphNode::SetStorageTexture(material, id, view));
    }

    fn set_keyword(&mut self, material: MaterialHandle, keyword: PropertyId, enabled: bool) {
        self.nodes.push(GraphNode::SetKeyword(material, keyword, enabled));
    }

    fn set_global_float(&mut self, id: PropertyId, value: f32) {
        self.nodes.push(GraphNode::SetGlobalFloat(id, value));
    }

    fn set_global_vector(&mut self, id: PropertyId, value: Vec4) {
        self.nodes.push(GraphNode::SetGlobalVector(id, value));
    }

    fn set_global_texture(&mut self, id: PropertyId, view: Option<TextureView>) {
        let view = view.map(|v| self.view(v));
        self.nodes.push(GraphNode::SetGlobalTexture(id, view));
    }

    fn set_global_keyword(&mut self, keyword: PropertyId, enabled: bool) {
        self.nodes.push(GraphNode::SetGlobalKeyword(keyword, enabled));
    }

    fn record_draw(&mut self, material: MaterialHandle, target: TextureView, load: LoadOp) -> Result<()> {
        self.check_material(material)?;
        self.check_texture(target.texture)?;
        let target = self.view(target);
        self.nodes.push(GraphNode::Draw {
            material,
            target,
            load,
        });
        Ok(())
    }

    fn record_dispatch(&mut self, material: MaterialHandle, kernel: u32, groups: [u32; 3]) -> Result<()> {
        self.check_material(material)?;
        self.nodes.push(GraphNode::Dispatch {
            material,
            kernel,
            groups,
        });
        Ok(())
    }

    fn record_copy(&mut self, src: TextureId, dst: TextureId) -> Result<()> {
        let src_desc = self.texture_desc(src).ok_or(PostFxError::UnknownTexture)?;
        let dst_desc = self.texture_desc(dst).ok_or(PostFxError::UnknownTexture)?;
        src_desc.check_copy_to(dst_desc)?;
        let src = self.import_into_frame_graph(src);
        let dst = self.import_into_frame_graph(dst);
        self.nodes.push(GraphNode::Copy { src, dst });
        Ok(())
    }

    fn import_into_frame_graph(&mut self, id: TextureId) -> GraphHandle {
        if let Some(handle) = self.import_lookup.get(&id) {
            return *handle;
        }
        let handle = GraphHandle(self.imports.len() as u32);
        self.imports.push(id);
        self.import_lookup.insert(id, handle);
        handle
    }

    fn push_debug_group(&mut self, label: &str) {
        self.nodes.push(GraphNode::PushDebugGroup(label.to_owned()));
    }

    fn pop_debug_group(&mut self) {
        self.nodes.push(GraphNode::PopDebugGroup);
    }

    fn begin_frame(&mut self) {
        self.inner.begin_frame();
    }

    fn end_frame(&mut self) -> Result<()> {
        let nodes = std::mem::take(&mut self.nodes);
        log::trace!(
            "frame graph: executing {} nodes over {} imported textures",
            nodes.len(),
            self.imports.len()
        );
        for node in nodes {
            if let Err(e) = self.replay(node) {
                log::warn!("frame graph node failed during replay: {e}");
            }
        }

        for id in self.pending_releases.drain(..) {
            self.inner.release_texture(id);
        }
        self.imports.clear();
        self.import_lookup.clear();
        self.executed_frames += 1;
        self.inner.end_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::binding_table::ShaderBindingTable;
    use crate::renderer::core::HeadlessBackend;

    fn color(w: u32, h: u32) -> TextureDesc {
        TextureDesc::new_2d(
            "Color",
            w,
            h,
            wgpu::TextureFormat::Rgba16Float,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    #[test]
    fn work_is_deferred_until_end_frame() {
        let mut table = ShaderBindingTable::new();
        let src_id = table.declare("_SourceTex");

        let mut inner = HeadlessBackend::new();
        let mat = inner.register_material("Blit");
        let mut graph = FrameGraphBackend::new(inner);

        let a = graph.create_texture(&color(4, 4)).unwrap();
        let b = graph.create_texture(&color(4, 4)).unwrap();
        graph.inner_mut().write_content(a, 9);

        graph.set_texture(mat, src_id, a.into());
        graph.record_draw(mat, b.into(), LoadOp::Clear).unwrap();
        assert_eq!(graph.inner().work_count(), 0);
        assert_eq!(graph.imported_count(), 2);

        graph.end_frame().unwrap();
        assert_eq!(graph.inner().work_count(), 1);
        assert_ne!(graph.inner().content(b), Some(0));
        assert_eq!(graph.imported_count(), 0);
    }

    #[test]
    fn imports_are_deduplicated_per_frame() {
        let mut graph = FrameGraphBackend::new(HeadlessBackend::new());
        let a = graph.create_texture(&color(4, 4)).unwrap();
        let h1 = graph.import_into_frame_graph(a);
        let h2 = graph.import_into_frame_graph(a);
        assert_eq!(h1, h2);
    }

    #[test]
    fn releases_wait_for_graph_execution() {
        let mut graph = FrameGraphBackend::new(HeadlessBackend::new());
        let a = graph.create_texture(&color(4, 4)).unwrap();
        graph.release_texture(a);
        assert!(graph.texture_desc(a).is_none());
        assert_eq!(graph.inner().live_texture_count(), 1);
        graph.end_frame().unwrap();
        assert_eq!(graph.inner().live_texture_count(), 0);
    }
}
