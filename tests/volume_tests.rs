//! Volume Resolution Tests
//!
//! Tests for:
//! - JSON volume profiles
//! - Camera position selecting bounded volumes
//! - Fallback to defaults and activity flags
//! - Resolver swap on a running pipeline

use glam::Vec3;

use myth_postfx::errors::PostFxError;
use myth_postfx::renderer::core::{GraphicsBackend, HeadlessBackend, TextureDesc};
use myth_postfx::renderer::graph::context::{CameraView, FrameContext};
use myth_postfx::renderer::graph::passes::VignettePass;
use myth_postfx::renderer::registry::CameraKey;
use myth_postfx::renderer::PipelineBuilder;
use myth_postfx::resources::{ToneMappingMode, VignetteSettings};
use myth_postfx::volume::stack::{VolumeOverride, VolumeStack};
use myth_postfx::volume::{DefaultResolver, EffectSettings, SettingsKind, VolumeResolver};

const PROFILE: &str = r#"[
    {
        "name": "world",
        "priority": 0,
        "components": [
            { "ToneMapping": { "mode": "AcesFilmic", "exposure": 1.5 } },
            { "Bloom": { "intensity": 0.4 } }
        ]
    },
    {
        "name": "cave",
        "priority": 10,
        "bounds": [[-5.0, -5.0, -5.0], [5.0, 5.0, 5.0]],
        "components": [
            { "Bloom": { "intensity": 2.0, "threshold": 0.5 } },
            { "Vignette": { "intensity": 0.6 } }
        ]
    }
]"#;

fn camera_at(position: Vec3) -> CameraView {
    CameraView::new(CameraKey(7), position)
}

// ============================================================================
// Profiles
// ============================================================================

#[test]
fn json_profile_resolves_by_camera_position() {
    let stack = VolumeStack::from_json(PROFILE).unwrap();
    assert_eq!(stack.volumes().len(), 2);

    let outside = camera_at(Vec3::new(20.0, 0.0, 0.0));
    let inside = camera_at(Vec3::ZERO);

    let bloom_out = stack.resolve(SettingsKind::Bloom, &outside).unwrap();
    let bloom_in = stack.resolve(SettingsKind::Bloom, &inside).unwrap();
    let out = bloom_out.settings.as_bloom().copied().unwrap();
    let inn = bloom_in.settings.as_bloom().copied().unwrap();
    assert!((out.intensity - 0.4).abs() < f32::EPSILON);
    assert!((inn.intensity - 2.0).abs() < f32::EPSILON);
    // Omitted fields keep their defaults.
    assert!((out.threshold - 0.9).abs() < f32::EPSILON);
    assert!((inn.threshold - 0.5).abs() < f32::EPSILON);

    let tone = stack.resolve(SettingsKind::ToneMapping, &inside).unwrap();
    assert_eq!(tone.settings.as_tone_mapping().unwrap().mode, ToneMappingMode::AcesFilmic);

    assert!(stack.resolve(SettingsKind::Vignette, &inside).unwrap().is_active);
    assert!(!stack.resolve(SettingsKind::Vignette, &outside).unwrap().is_active);
}

#[test]
fn profile_bounds_accept_corners_in_any_order() {
    let stack = VolumeStack::from_json(
        r#"[{
            "name": "hall",
            "bounds": [[4.0, 2.0, 4.0], [-4.0, -2.0, -4.0]],
            "components": [{ "Vignette": { "intensity": 0.6 } }]
        }]"#,
    )
    .unwrap();
    assert_eq!(
        stack.volumes()[0].bounds,
        Some((Vec3::new(-4.0, -2.0, -4.0), Vec3::new(4.0, 2.0, 4.0)))
    );
    assert!(stack.resolve(SettingsKind::Vignette, &camera_at(Vec3::ZERO)).unwrap().is_active);
    assert!(!stack.resolve(SettingsKind::Vignette, &camera_at(Vec3::splat(9.0))).unwrap().is_active);

    // Hand-built volumes with swapped corners behave the same.
    let mut swapped = VolumeOverride::global("swapped", 0);
    swapped.bounds = Some((Vec3::splat(1.0), Vec3::splat(-1.0)));
    assert!(swapped.contains(Vec3::ZERO));
    assert!(!swapped.contains(Vec3::splat(2.0)));
}

#[test]
fn malformed_profile_is_a_config_error() {
    let err = VolumeStack::from_json(r#"[{ "priority": "high" }]"#).unwrap_err();
    assert!(matches!(err, PostFxError::Config(_)));
}

#[test]
fn unmatched_kinds_fall_back_to_defaults() {
    let stack = VolumeStack::new();
    let camera = camera_at(Vec3::ZERO);
    for kind in SettingsKind::ALL {
        let resolved = stack.resolve(kind, &camera).unwrap();
        assert_eq!(resolved.settings, kind.default_settings());
        assert_eq!(resolved.settings.kind(), kind);
    }
    assert_eq!(
        stack.resolve(SettingsKind::Bloom, &camera),
        DefaultResolver.resolve(SettingsKind::Bloom, &camera)
    );
}

#[test]
fn whole_component_is_taken_from_the_winner() {
    let low = VignetteSettings {
        intensity: 0.2,
        smoothness: 0.9,
        ..Default::default()
    };
    let high = VignetteSettings {
        intensity: 0.8,
        ..Default::default()
    };
    let stack = VolumeStack::new()
        .with_volume(VolumeOverride::global("low", 0).with(EffectSettings::Vignette(low)))
        .with_volume(VolumeOverride::global("high", 1).with(EffectSettings::Vignette(high)));

    let resolved = stack.resolve(SettingsKind::Vignette, &camera_at(Vec3::ZERO)).unwrap();
    // No per-field blending: smoothness is the winner's default, not 0.9.
    assert_eq!(resolved.settings, EffectSettings::Vignette(high));
}

// ============================================================================
// Resolver Swap
// ============================================================================

#[test]
fn swapping_the_resolver_changes_activity_next_frame() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut backend = HeadlessBackend::new();
    let material = backend.register_material("vignette");
    let mut pipeline = PipelineBuilder::new()
        .with_pass(VignettePass::descriptor(), Box::new(VignettePass::new(Some(material))))
        .build(backend)
        .unwrap();

    let desc = TextureDesc::new_2d(
        "Color",
        128,
        128,
        wgpu::TextureFormat::Rgba16Float,
        wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
    );
    let source = pipeline.backend_mut().create_texture(&desc).unwrap();
    let target = pipeline.backend_mut().create_texture(&desc).unwrap();
    let frame = FrameContext::new(source, target, 128, 128);
    let camera = camera_at(Vec3::ZERO);

    let stats = pipeline.render_camera(&camera, &frame).unwrap();
    assert_eq!(stats.skipped_inactive, 1);

    pipeline.set_resolver(Box::new(VolumeStack::new().with_volume(
        VolumeOverride::global("vignette", 0).with(EffectSettings::Vignette(VignetteSettings {
            intensity: 0.5,
            ..Default::default()
        })),
    )));
    let stats = pipeline.render_camera(&camera, &frame).unwrap();
    assert_eq!(stats.executed, vec!["Vignette"]);
}
