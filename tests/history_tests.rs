//! Frame History Tests
//!
//! Tests for:
//! - A/B/A parity with two buffers
//! - Previous-buffer validity rules
//! - Per-camera isolation
//! - Release on camera removal and stale requests afterwards

use myth_postfx::errors::PostFxError;
use myth_postfx::renderer::core::{HeadlessBackend, TextureDesc};
use myth_postfx::renderer::graph::history::{FrameHistoryManager, HistorySlotId};
use myth_postfx::renderer::registry::CameraKey;

const SLOT: HistorySlotId = HistorySlotId("test.history");
const CAM_A: CameraKey = CameraKey(1);
const CAM_B: CameraKey = CameraKey(2);

fn history_desc(w: u32, h: u32) -> TextureDesc {
    TextureDesc::new_2d(
        "History",
        w,
        h,
        wgpu::TextureFormat::Rgba16Float,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

/// One camera frame: allocate, write current, close.
fn run_frame(
    history: &mut FrameHistoryManager,
    backend: &mut HeadlessBackend,
    camera: CameraKey,
) -> (myth_postfx::TextureId, Option<myth_postfx::TextureId>) {
    history
        .allocate_history_slot(backend, camera, SLOT, history_desc, 2, 64, 64)
        .unwrap();
    let current = history.current_frame_buffer(camera, SLOT).unwrap().unwrap();
    let previous = history.previous_frame_buffer(camera, SLOT).unwrap();
    history.end_camera_frame(camera);
    (current, previous)
}

// ============================================================================
// Parity
// ============================================================================

#[test]
fn two_buffers_alternate_a_b_a() {
    let mut backend = HeadlessBackend::new();
    let mut history = FrameHistoryManager::new();
    history.track_camera(CAM_A);

    let (a, prev0) = run_frame(&mut history, &mut backend, CAM_A);
    let (b, prev1) = run_frame(&mut history, &mut backend, CAM_A);
    let (a_again, prev2) = run_frame(&mut history, &mut backend, CAM_A);

    assert_ne!(a, b);
    assert_eq!(a_again, a);
    assert_eq!(prev0, None);
    assert_eq!(prev1, Some(a));
    assert_eq!(prev2, Some(b));
    assert_eq!(history.frame_index(CAM_A), Some(3));
    assert_eq!(backend.textures_created(), 2);
}

#[test]
fn unwritten_slot_is_not_valid_history() {
    let mut backend = HeadlessBackend::new();
    let mut history = FrameHistoryManager::new();
    history.track_camera(CAM_A);

    history
        .allocate_history_slot(&mut backend, CAM_A, SLOT, history_desc, 2, 64, 64)
        .unwrap();
    history.end_camera_frame(CAM_A);

    assert_eq!(history.previous_frame_buffer(CAM_A, SLOT), Ok(None));
}

#[test]
fn reallocation_with_same_descriptor_keeps_history() {
    let mut backend = HeadlessBackend::new();
    let mut history = FrameHistoryManager::new();
    history.track_camera(CAM_A);

    run_frame(&mut history, &mut backend, CAM_A);
    let created = history
        .allocate_history_slot(&mut backend, CAM_A, SLOT, history_desc, 2, 64, 64)
        .unwrap();
    assert!(!created);
    assert!(history.previous_frame_buffer(CAM_A, SLOT).unwrap().is_some());
}

// ============================================================================
// Isolation
// ============================================================================

#[test]
fn cameras_never_share_buffers() {
    let mut backend = HeadlessBackend::new();
    let mut history = FrameHistoryManager::new();
    history.track_camera(CAM_A);
    history.track_camera(CAM_B);

    run_frame(&mut history, &mut backend, CAM_A);
    run_frame(&mut history, &mut backend, CAM_B);

    let a = history.buffers(CAM_A, SLOT).unwrap().to_vec();
    let b = history.buffers(CAM_B, SLOT).unwrap();
    assert!(a.iter().all(|id| !b.contains(id)));
    // Parity advances per camera.
    run_frame(&mut history, &mut backend, CAM_A);
    assert_eq!(history.frame_index(CAM_A), Some(2));
    assert_eq!(history.frame_index(CAM_B), Some(1));
}

// ============================================================================
// Release
// ============================================================================

#[test]
fn release_camera_frees_buffers_and_stales_requests() {
    let mut backend = HeadlessBackend::new();
    let mut history = FrameHistoryManager::new();
    history.track_camera(CAM_A);
    history.track_camera(CAM_B);
    run_frame(&mut history, &mut backend, CAM_A);
    run_frame(&mut history, &mut backend, CAM_B);
    assert_eq!(backend.live_texture_count(), 4);

    assert_eq!(history.release_camera(&mut backend, CAM_A), 2);
    assert_eq!(backend.live_texture_count(), 2);
    assert!(!history.is_tracked(CAM_A));

    let err = history.current_frame_buffer(CAM_A, SLOT).unwrap_err();
    assert_eq!(err, PostFxError::StaleHistoryRequest { camera: CAM_A, slot: SLOT });
    let err = history
        .allocate_history_slot(&mut backend, CAM_A, SLOT, history_desc, 2, 64, 64)
        .unwrap_err();
    assert!(matches!(err, PostFxError::StaleHistoryRequest { .. }));

    history.release_all(&mut backend);
    assert_eq!(backend.live_texture_count(), 0);
    assert_eq!(history.camera_count(), 0);
}
