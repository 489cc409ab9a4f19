//! Resource Pool
//!
//! Transient render targets keyed by a logical slot. A pass asks for
//! "`bloom.down`, index 3" with a descriptor and gets back a texture that
//! matches it. The first request creates the texture; later requests with an
//! unchanged descriptor return the same texture.
//!
//! # Design
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ResourcePool                        │
//! │                                                          │
//! │  slots: FxHashMap<(scope, PoolSlot), PooledTarget>       │
//! │                                                          │
//! │  set_scope(camera)                 (scheduler, per frame)│
//! │  acquire(slot, desc) → TextureId   (allocate-or-resize)  │
//! │  end_frame()                       (idle counters ++)    │
//! │  trim(max_idle)                    (release stale slots) │
//! │  release_scope(camera)             (camera unregistered) │
//! │  release_all()                     (teardown)            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Scopes
//!
//! The scheduler scopes the pool to the camera it is rendering, so every
//! camera owns its own set of slots. Two cameras at different resolutions
//! each keep a steady allocation instead of resizing the same slots back and
//! forth. Outside a camera frame the pool uses the shared `None` scope.
//!
//! # Reuse Rule
//!
//! A slot keeps its texture while the requested size and format match
//! ([`TextureDesc::is_compatible_with`]). Otherwise the old texture is
//! released *before* the new one is created, so peak memory never holds both.
//! Every creation after the first is counted in
//! [`reallocation_count`](ResourcePool::reallocation_count).
//!
//! Contents of a pooled target are undefined between frames; anything that
//! must persist belongs in the [`FrameHistoryManager`](super::history::FrameHistoryManager).

use rustc_hash::FxHashMap;

use crate::errors::{PostFxError, Result};
use crate::renderer::core::{GraphicsBackend, TextureDesc, TextureId};
use crate::renderer::registry::CameraKey;

// ─── Public Types ─────────────────────────────────────────────────────────────

/// Logical identity of a pooled target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct PoolSlot {
    pub name: &'static str,
    pub index: u32,
}

impl PoolSlot {
    #[inline]
    #[must_use]
    pub const fn new(name: &'static str, index: u32) -> Self {
        Self { name, index }
    }
}

/// Owner of a group of slots: a camera, or `None` for shared use.
pub type PoolScope = Option<CameraKey>;

// ─── Internal Types ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct PooledTarget {
    texture: Option<TextureId>,
    /// Frames since the slot was last acquired. Used by [`ResourcePool::trim`].
    idle_frames: u32,
}

// ─── Pool Implementation ──────────────────────────────────────────────────────

/// Slot-keyed pool of transient render targets.
#[derive(Debug, Default)]
pub struct ResourcePool {
    slots: FxHashMap<(PoolScope, PoolSlot), PooledTarget>,
    scope: PoolScope,
    reallocations: u64,
    allocations: u64,
}

impl ResourcePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Scope ──────────────────────────────────────────────────────────────

    /// Routes subsequent acquires to `scope`'s slots.
    #[inline]
    pub fn set_scope(&mut self, scope: PoolScope) {
        self.scope = scope;
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> PoolScope {
        self.scope
    }

    // ── Acquire ────────────────────────────────────────────────────────────

    /// Returns the slot's texture in the current scope, (re)allocating it if
    /// `desc` differs from the current allocation.
    pub fn acquire(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        slot: PoolSlot,
        desc: &TextureDesc,
    ) -> Result<TextureId> {
        let scope = self.scope;
        let target = self.slots.entry((scope, slot)).or_insert(PooledTarget {
            texture: None,
            idle_frames: 0,
        });
        target.idle_frames = 0;

        let had_texture = target.texture.is_some();
        let created = backend.allocate_or_resize(&mut target.texture, desc)?;
        if created {
            self.allocations += 1;
            if had_texture {
                self.reallocations += 1;
                log::debug!(
                    "pool: reallocated {}[{}] ({scope:?}) as {}x{} {:?}",
                    slot.name,
                    slot.index,
                    desc.width,
                    desc.height,
                    desc.format
                );
            } else {
                log::debug!(
                    "pool: allocated {}[{}] ({scope:?}) {}x{} {:?}",
                    slot.name,
                    slot.index,
                    desc.width,
                    desc.height,
                    desc.format
                );
            }
        }

        target
            .texture
            .ok_or_else(|| PostFxError::Backend("pool slot left empty".into()))
    }

    /// Current texture of a slot in the current scope, if allocated.
    #[must_use]
    pub fn get(&self, slot: PoolSlot) -> Option<TextureId> {
        self.get_in(self.scope, slot)
    }

    /// Current texture of a slot in `scope`, if allocated.
    #[must_use]
    pub fn get_in(&self, scope: PoolScope, slot: PoolSlot) -> Option<TextureId> {
        self.slots.get(&(scope, slot)).and_then(|t| t.texture)
    }

    /// Number of times an existing slot had to replace its texture.
    #[inline]
    #[must_use]
    pub fn reallocation_count(&self) -> u64 {
        self.reallocations
    }

    /// Number of textures the pool has created in total.
    #[inline]
    #[must_use]
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }

    // ── Frame boundary ─────────────────────────────────────────────────────

    /// Ages every slot by one frame.
    pub fn end_frame(&mut self) {
        for target in self.slots.values_mut() {
            target.idle_frames = target.idle_frames.saturating_add(1);
        }
    }

    /// Releases slots that have not been acquired for more than
    /// `max_idle_frames` frames. Returns the number of textures released.
    pub fn trim(&mut self, backend: &mut dyn GraphicsBackend, max_idle_frames: u32) -> usize {
        let mut released = 0;
        self.slots.retain(|(scope, slot), target| {
            if target.idle_frames <= max_idle_frames {
                return true;
            }
            if let Some(id) = target.texture.take() {
                log::debug!("pool: trimmed idle slot {}[{}] ({scope:?})", slot.name, slot.index);
                backend.release_texture(id);
                released += 1;
            }
            false
        });
        released
    }

    /// Releases every slot owned by `camera`. Returns the number of textures
    /// released.
    pub fn release_scope(&mut self, backend: &mut dyn GraphicsBackend, camera: CameraKey) -> usize {
        let mut released = 0;
        self.slots.retain(|(scope, _), target| {
            if *scope != Some(camera) {
                return true;
            }
            if let Some(id) = target.texture.take() {
                backend.release_texture(id);
                released += 1;
            }
            false
        });
        released
    }

    /// Releases every pooled texture.
    pub fn release_all(&mut self, backend: &mut dyn GraphicsBackend) {
        for (_, target) in self.slots.drain() {
            if let Some(id) = target.texture {
                backend.release_texture(id);
            }
        }
    }

    /// Number of live slots across all scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
