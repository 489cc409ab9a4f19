//! Post-Processing Orchestration
//!
//! - [`Scheduler`]: injection-point ordered pass registry and executor
//! - [`EffectPass`] / [`EffectPassDescriptor`]: the pass interface
//! - [`PassContext`] / [`SetupContext`]: what a pass sees while it runs
//! - [`ResourcePool`]: slot-keyed transient render targets
//! - [`FrameHistoryManager`]: per-camera multi-frame buffers
//! - [`BlurPyramid`]: shared hierarchical blur
//! - [`TileDispatch`] / [`SeparableFilter`]: compute helpers
//! - [`passes`]: the standard effect set

pub mod blur;
pub mod context;
pub mod dispatch;
pub mod history;
pub mod pass;
pub mod passes;
pub mod pool;
pub mod scheduler;
pub mod stage;

pub use blur::{BlurPyramid, BlurPyramidResult, BlurRequest, MAX_PYRAMID_LEVELS, PyramidLevel, compute_iterations};
pub use context::{CameraView, FrameBlackboard, FrameContext, PassContext, PipelineResources, SetupContext};
pub use dispatch::{SeparableFilter, TILE_SIZE, TileDispatch, tile_count};
pub use history::{FrameHistoryManager, HistoryAllocator, HistorySlotId};
pub use pass::{EffectPass, EffectPassDescriptor, PassFlags};
pub use passes::{EffectMaterials, standard_passes};
pub use pool::{PoolSlot, ResourcePool};
pub use scheduler::{FrameStats, Scheduler};
pub use stage::InjectionPoint;
