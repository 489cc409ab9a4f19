//! Resource Pool Tests
//!
//! Tests for:
//! - Idempotent acquire (no reallocation for an unchanged descriptor)
//! - Release-before-create on size and format changes
//! - Usage coverage in the reuse rule
//! - Invalid requests

use myth_postfx::errors::PostFxError;
use myth_postfx::renderer::core::{HeadlessBackend, TextureDesc};
use myth_postfx::renderer::graph::pool::{PoolSlot, ResourcePool};

const SLOT: PoolSlot = PoolSlot::new("test.color", 0);

fn desc(w: u32, h: u32, format: wgpu::TextureFormat) -> TextureDesc {
    TextureDesc::new_2d(
        "Pool Target",
        w,
        h,
        format,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

fn hdr(w: u32, h: u32) -> TextureDesc {
    desc(w, h, wgpu::TextureFormat::Rgba16Float)
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn unchanged_descriptor_never_reallocates() {
    let mut backend = HeadlessBackend::new();
    let mut pool = ResourcePool::new();

    let first = pool.acquire(&mut backend, SLOT, &hdr(1920, 1080)).unwrap();
    for _ in 0..100 {
        let again = pool.acquire(&mut backend, SLOT, &hdr(1920, 1080)).unwrap();
        assert_eq!(again, first);
    }

    assert_eq!(pool.reallocation_count(), 0);
    assert_eq!(pool.allocation_count(), 1);
    assert_eq!(backend.textures_created(), 1);
}

// ============================================================================
// Reallocation
// ============================================================================

#[test]
fn size_change_releases_then_reallocates() {
    let mut backend = HeadlessBackend::new();
    let mut pool = ResourcePool::new();

    pool.acquire(&mut backend, SLOT, &hdr(1920, 1080)).unwrap();
    let resized = pool.acquire(&mut backend, SLOT, &hdr(1280, 720)).unwrap();

    assert_eq!(pool.reallocation_count(), 1);
    assert_eq!(backend.textures_released(), 1);
    assert_eq!(backend.live_texture_count(), 1);
    assert_eq!(pool.get(SLOT), Some(resized));
}

#[test]
fn format_change_reallocates() {
    let mut backend = HeadlessBackend::new();
    let mut pool = ResourcePool::new();

    pool.acquire(&mut backend, SLOT, &hdr(64, 64)).unwrap();
    pool.acquire(&mut backend, SLOT, &desc(64, 64, wgpu::TextureFormat::Rgba8Unorm))
        .unwrap();
    assert_eq!(pool.reallocation_count(), 1);
}

#[test]
fn wider_existing_usage_is_reused() {
    let mut backend = HeadlessBackend::new();
    let mut pool = ResourcePool::new();

    let wide = hdr(64, 64);
    let mut narrow = wide.clone();
    narrow.usage = wgpu::TextureUsages::TEXTURE_BINDING;

    let a = pool.acquire(&mut backend, SLOT, &wide).unwrap();
    let b = pool.acquire(&mut backend, SLOT, &narrow).unwrap();
    assert_eq!(a, b);
    assert_eq!(pool.reallocation_count(), 0);
}

#[test]
fn alternating_sizes_count_every_reallocation() {
    let mut backend = HeadlessBackend::new();
    let mut pool = ResourcePool::new();

    for i in 0..6 {
        let size = if i % 2 == 0 { 128 } else { 256 };
        pool.acquire(&mut backend, SLOT, &hdr(size, size)).unwrap();
    }
    assert_eq!(pool.reallocation_count(), 5);
    assert_eq!(backend.live_texture_count(), 1);
}

// ============================================================================
// Invalid Requests
// ============================================================================

#[test]
fn zero_sized_request_is_invalid_resource() {
    let mut backend = HeadlessBackend::new();
    let mut pool = ResourcePool::new();

    let err = pool.acquire(&mut backend, SLOT, &hdr(0, 1080)).unwrap_err();
    assert!(matches!(err, PostFxError::InvalidResource { width: 0, height: 1080, .. }));
    assert_eq!(backend.live_texture_count(), 0);
}
