//! Frame History Manager
//!
//! Owns render targets whose contents must survive from one frame to the
//! next: accumulated mip chains, previous-frame color, temporally filtered
//! shadow masks. Buffers are keyed by `(camera, slot)` so two cameras never
//! see each other's history.
//!
//! # Parity
//!
//! A slot holds `N` buffers. Each camera carries a rolling `frame_index`
//! that advances once per rendered camera frame:
//!
//! ```text
//!            frame 0   frame 1   frame 2   frame 3
//! current    buf[0]    buf[1]    buf[0]    buf[1]      (N = 2)
//! previous     -       buf[0]    buf[1]    buf[0]
//! ```
//!
//! `current  = buffers[frame_index mod N]`
//! `previous = buffers[(frame_index - 1) mod N]`
//!
//! The previous buffer is only handed out once it actually holds a past
//! frame: the slot needs `N ≥ 2` and must have been written in an earlier
//! frame since its last (re)allocation. Callers get `None` otherwise and fall
//! back to their non-temporal path.
//!
//! # Lifetime
//!
//! Slots are created lazily by [`FrameHistoryManager::allocate_history_slot`]
//! and reallocated only when the requested size or format changes. All of a
//! camera's buffers are freed by [`FrameHistoryManager::release_camera`].

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::{PostFxError, Result};
use crate::renderer::core::{GraphicsBackend, TextureDesc, TextureId};
use crate::renderer::registry::CameraKey;

/// Identity of a history slot within a camera.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct HistorySlotId(pub &'static str);

impl HistorySlotId {
    pub const COLOR_PYRAMID: HistorySlotId = HistorySlotId("color_pyramid");
    pub const CONTACT_SHADOW: HistorySlotId = HistorySlotId("contact_shadow");
}

impl fmt::Display for HistorySlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Builds the descriptor for a history buffer at a given size.
pub type HistoryAllocator = fn(u32, u32) -> TextureDesc;

struct HistorySlot {
    buffers: Vec<TextureId>,
    desc: TextureDesc,
    history_valid: bool,
}

#[derive(Default)]
struct CameraHistory {
    frame_index: u64,
    slots: FxHashMap<HistorySlotId, HistorySlot>,
    /// Slots whose current buffer was handed out this frame.
    touched: FxHashSet<HistorySlotId>,
}

/// Per-camera, per-slot persistent buffers.
#[derive(Default)]
pub struct FrameHistoryManager {
    cameras: FxHashMap<CameraKey, CameraHistory>,
}

impl FrameHistoryManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Camera tracking ────────────────────────────────────────────────────

    /// Starts tracking a camera. Tracking an already tracked camera is a no-op.
    pub fn track_camera(&mut self, camera: CameraKey) {
        self.cameras.entry(camera).or_default();
    }

    #[must_use]
    pub fn is_tracked(&self, camera: CameraKey) -> bool {
        self.cameras.contains_key(&camera)
    }

    /// Stops tracking `camera` and frees every buffer it owns.
    ///
    /// Returns the number of textures released.
    pub fn release_camera(&mut self, backend: &mut dyn GraphicsBackend, camera: CameraKey) -> usize {
        let Some(history) = self.cameras.remove(&camera) else {
            return 0;
        };
        let mut released = 0;
        for slot in history.slots.into_values() {
            for id in slot.buffers {
                backend.release_texture(id);
                released += 1;
            }
        }
        log::debug!("history: released {released} buffers of camera {camera:?}");
        released
    }

    /// Frees every buffer of every camera.
    pub fn release_all(&mut self, backend: &mut dyn GraphicsBackend) {
        let mut cameras: Vec<CameraKey> = self.cameras.keys().copied().collect();
        cameras.sort_unstable();
        for camera in cameras {
            self.release_camera(backend, camera);
        }
    }

    #[must_use]
    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    // ── Slot allocation ────────────────────────────────────────────────────

    /// Ensures `slot` holds `buffer_count` buffers of `allocator(width, height)`.
    ///
    /// Existing buffers are kept when compatible. Any reallocation invalidates
    /// the slot's history. Returns `true` when at least one buffer was created.
    #[allow(clippy::too_many_arguments)]
    pub fn allocate_history_slot(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        camera: CameraKey,
        slot: HistorySlotId,
        allocator: HistoryAllocator,
        buffer_count: u32,
        width: u32,
        height: u32,
    ) -> Result<bool> {
        let history = self
            .cameras
            .get_mut(&camera)
            .ok_or(PostFxError::StaleHistoryRequest { camera, slot })?;

        let desc = allocator(width, height);
        desc.validate()?;
        let buffer_count = buffer_count.max(1) as usize;

        let (mut handles, was_valid): (Vec<Option<TextureId>>, bool) = match history.slots.remove(&slot) {
            Some(existing) => (
                existing.buffers.into_iter().map(Some).collect(),
                existing.history_valid,
            ),
            None => (Vec::new(), false),
        };
        for extra in handles.drain(buffer_count.min(handles.len())..).flatten() {
            backend.release_texture(extra);
        }
        handles.resize(buffer_count, None);

        let mut created = false;
        for i in 0..handles.len() {
            match backend.allocate_or_resize(&mut handles[i], &desc) {
                Ok(c) => created |= c,
                Err(e) => {
                    for id in handles.iter().flatten() {
                        backend.release_texture(*id);
                    }
                    return Err(e);
                }
            }
        }

        let buffers: Vec<TextureId> = handles.into_iter().flatten().collect();
        if created {
            log::debug!(
                "history: (re)allocated {slot} for camera {camera:?}: {}x{} x{}",
                desc.width,
                desc.height,
                buffers.len()
            );
            history.touched.remove(&slot);
        }
        let history_valid = was_valid && !created;
        history.slots.insert(
            slot,
            HistorySlot {
                buffers,
                desc,
                history_valid,
            },
        );
        Ok(created)
    }

    // ── Buffer access ──────────────────────────────────────────────────────

    /// The buffer to write this frame. Marks the slot as written.
    ///
    /// `Ok(None)` when the slot has not been allocated yet.
    pub fn current_frame_buffer(&mut self, camera: CameraKey, slot: HistorySlotId) -> Result<Option<TextureId>> {
        let history = self
            .cameras
            .get_mut(&camera)
            .ok_or(PostFxError::StaleHistoryRequest { camera, slot })?;
        let Some(entry) = history.slots.get(&slot) else {
            return Ok(None);
        };
        let index = (history.frame_index % entry.buffers.len() as u64) as usize;
        let id = entry.buffers[index];
        history.touched.insert(slot);
        Ok(Some(id))
    }

    /// The buffer written during the camera's previous frame.
    ///
    /// `Ok(None)` when no valid history exists.
    pub fn previous_frame_buffer(&self, camera: CameraKey, slot: HistorySlotId) -> Result<Option<TextureId>> {
        let history = self
            .cameras
            .get(&camera)
            .ok_or(PostFxError::StaleHistoryRequest { camera, slot })?;
        let Some(entry) = history.slots.get(&slot) else {
            return Ok(None);
        };
        let n = entry.buffers.len() as u64;
        if n < 2 || !entry.history_valid {
            return Ok(None);
        }
        let index = ((history.frame_index + n - 1) % n) as usize;
        Ok(Some(entry.buffers[index]))
    }

    /// Descriptor the slot was last allocated with.
    #[must_use]
    pub fn slot_desc(&self, camera: CameraKey, slot: HistorySlotId) -> Option<&TextureDesc> {
        self.cameras
            .get(&camera)
            .and_then(|h| h.slots.get(&slot))
            .map(|s| &s.desc)
    }

    /// All buffers of a slot, in parity order.
    #[must_use]
    pub fn buffers(&self, camera: CameraKey, slot: HistorySlotId) -> Option<&[TextureId]> {
        self.cameras
            .get(&camera)
            .and_then(|h| h.slots.get(&slot))
            .map(|s| s.buffers.as_slice())
    }

    #[must_use]
    pub fn frame_index(&self, camera: CameraKey) -> Option<u64> {
        self.cameras.get(&camera).map(|h| h.frame_index)
    }

    // ── Frame boundary ─────────────────────────────────────────────────────

    /// Closes the camera's frame: slots written this frame become valid
    /// history and the parity advances.
    pub fn end_camera_frame(&mut self, camera: CameraKey) {
        let Some(history) = self.cameras.get_mut(&camera) else {
            return;
        };
        for slot in history.touched.drain() {
            if let Some(entry) = history.slots.get_mut(&slot) {
                entry.history_valid = true;
            }
        }
        history.frame_index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::HeadlessBackend;

    fn rgba(w: u32, h: u32) -> TextureDesc {
        TextureDesc::new_2d(
            "History Test",
            w,
            h,
            wgpu::TextureFormat::Rgba16Float,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    const SLOT: HistorySlotId = HistorySlotId("test");

    #[test]
    fn untracked_camera_is_stale() {
        let mut history = FrameHistoryManager::new();
        let err = history.current_frame_buffer(CameraKey(3), SLOT).unwrap_err();
        assert_eq!(
            err,
            PostFxError::StaleHistoryRequest {
                camera: CameraKey(3),
                slot: SLOT
            }
        );
    }

    #[test]
    fn unallocated_slot_yields_none() {
        let mut history = FrameHistoryManager::new();
        history.track_camera(CameraKey(1));
        assert_eq!(history.current_frame_buffer(CameraKey(1), SLOT), Ok(None));
        assert_eq!(history.previous_frame_buffer(CameraKey(1), SLOT), Ok(None));
    }

    #[test]
    fn single_buffer_never_exposes_previous() {
        let mut backend = HeadlessBackend::new();
        let mut history = FrameHistoryManager::new();
        let cam = CameraKey(1);
        history.track_camera(cam);
        for _ in 0..3 {
            history
                .allocate_history_slot(&mut backend, cam, SLOT, rgba, 1, 8, 8)
                .unwrap();
            history.current_frame_buffer(cam, SLOT).unwrap();
            history.end_camera_frame(cam);
            assert_eq!(history.previous_frame_buffer(cam, SLOT), Ok(None));
        }
    }

    #[test]
    fn resize_invalidates_history() {
        let mut backend = HeadlessBackend::new();
        let mut history = FrameHistoryManager::new();
        let cam = CameraKey(1);
        history.track_camera(cam);

        history
            .allocate_history_slot(&mut backend, cam, SLOT, rgba, 2, 8, 8)
            .unwrap();
        history.current_frame_buffer(cam, SLOT).unwrap();
        history.end_camera_frame(cam);
        assert!(history.previous_frame_buffer(cam, SLOT).unwrap().is_some());

        let created = history
            .allocate_history_slot(&mut backend, cam, SLOT, rgba, 2, 16, 8)
            .unwrap();
        assert!(created);
        assert_eq!(history.previous_frame_buffer(cam, SLOT), Ok(None));
        assert_eq!(backend.live_texture_count(), 2);
    }
}
