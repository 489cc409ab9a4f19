//! Scheduler Tests
//!
//! Tests for:
//! - Injection-point ordering, registration tie-breaks, global modifiers first
//! - Inactive passes recording no GPU work
//! - Missing depth/normal inputs
//! - Error containment between passes
//! - Build-time failures (duplicate settings kind, undeclared binding)

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;

use myth_postfx::errors::{PostFxError, Result};
use myth_postfx::renderer::core::{GraphicsBackend, HeadlessBackend, TextureDesc};
use myth_postfx::renderer::graph::context::{CameraView, FrameContext, PassContext, SetupContext};
use myth_postfx::renderer::graph::pass::{EffectPass, EffectPassDescriptor, PassFlags};
use myth_postfx::renderer::graph::passes::{ContactShadowPass, ToneMappingPass, VignettePass};
use myth_postfx::renderer::graph::stage::InjectionPoint;
use myth_postfx::renderer::registry::CameraKey;
use myth_postfx::renderer::{PipelineBuilder, PostFxPipeline};
use myth_postfx::resources::{ToneMappingMode, ToneMappingSettings};
use myth_postfx::volume::stack::{VolumeOverride, VolumeStack};
use myth_postfx::volume::{EffectSettings, SettingsKind};

const SOURCE_CONTENT: u64 = 0x5EED;

type Log = Rc<RefCell<Vec<&'static str>>>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Pass that records its name when executed.
struct Tracer {
    name: &'static str,
    log: Log,
    fail: bool,
}

impl Tracer {
    fn boxed(name: &'static str, log: &Log) -> Box<dyn EffectPass> {
        Box::new(Self {
            name,
            log: Rc::clone(log),
            fail: false,
        })
    }

    fn failing(name: &'static str, log: &Log) -> Box<dyn EffectPass> {
        Box::new(Self {
            name,
            log: Rc::clone(log),
            fail: true,
        })
    }
}

impl EffectPass for Tracer {
    fn execute(&mut self, _ctx: &mut PassContext, _settings: Option<&EffectSettings>) -> Result<()> {
        self.log.borrow_mut().push(self.name);
        if self.fail {
            return Err(PostFxError::Backend("injected failure".into()));
        }
        Ok(())
    }
}

fn color(w: u32, h: u32) -> TextureDesc {
    TextureDesc::new_2d(
        "Camera Color",
        w,
        h,
        wgpu::TextureFormat::Rgba16Float,
        wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
    )
}

fn frame(pipeline: &mut PostFxPipeline<HeadlessBackend>, w: u32, h: u32) -> FrameContext {
    let backend = pipeline.backend_mut();
    let source = backend.create_texture(&color(w, h)).unwrap();
    let target = backend.create_texture(&color(w, h)).unwrap();
    backend.write_content(source, SOURCE_CONTENT);
    FrameContext::new(source, target, w, h)
}

fn camera() -> CameraView {
    CameraView::new(CameraKey(1), Vec3::ZERO)
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn passes_run_in_injection_point_order() {
    init_logger();
    let log = Log::default();
    let mut pipeline = PipelineBuilder::new()
        .with_pass(
            EffectPassDescriptor::new("post", InjectionPoint::AfterRenderingPostProcessing),
            Tracer::boxed("post", &log),
        )
        .with_pass(
            EffectPassDescriptor::new("gbuffer", InjectionPoint::BeforeGBuffer),
            Tracer::boxed("gbuffer", &log),
        )
        .with_pass(
            EffectPassDescriptor::new("skybox", InjectionPoint::AfterRenderingSkybox),
            Tracer::boxed("skybox", &log),
        )
        .build(HeadlessBackend::new())
        .unwrap();

    assert_eq!(pipeline.scheduler().execution_order(), vec!["gbuffer", "skybox", "post"]);

    let frame = frame(&mut pipeline, 64, 64);
    let stats = pipeline.render_camera(&camera(), &frame).unwrap();
    assert_eq!(*log.borrow(), vec!["gbuffer", "skybox", "post"]);
    assert_eq!(stats.executed, vec!["gbuffer", "skybox", "post"]);
}

#[test]
fn ties_keep_registration_order() {
    let log = Log::default();
    let point = InjectionPoint::AfterRenderingOpaques;
    let pipeline = PipelineBuilder::new()
        .with_pass(EffectPassDescriptor::new("first", point), Tracer::boxed("first", &log))
        .with_pass(EffectPassDescriptor::new("second", point), Tracer::boxed("second", &log))
        .with_pass(EffectPassDescriptor::new("third", point), Tracer::boxed("third", &log))
        .build(HeadlessBackend::new())
        .unwrap();

    assert_eq!(pipeline.scheduler().execution_order(), vec!["first", "second", "third"]);
}

#[test]
fn global_modifiers_run_ahead_of_effects_at_same_point() {
    let log = Log::default();
    let point = InjectionPoint::BeforeRenderingPostProcessing;
    let pipeline = PipelineBuilder::new()
        .with_pass(EffectPassDescriptor::new("effect", point), Tracer::boxed("effect", &log))
        .with_pass(
            EffectPassDescriptor::new("earlier point", InjectionPoint::BeforeRendering),
            Tracer::boxed("earlier point", &log),
        )
        .with_pass(
            EffectPassDescriptor::new("global", point).with_flags(PassFlags::GLOBAL_MODIFIER),
            Tracer::boxed("global", &log),
        )
        .build(HeadlessBackend::new())
        .unwrap();

    assert_eq!(
        pipeline.scheduler().execution_order(),
        vec!["earlier point", "global", "effect"]
    );
}

// ============================================================================
// Activity
// ============================================================================

#[test]
fn inactive_pass_records_no_gpu_work() {
    init_logger();
    let mut backend = HeadlessBackend::new();
    let material = backend.register_material("tone_mapping");

    // Linear with unit exposure is the identity curve.
    let stack = VolumeStack::new().with_volume(VolumeOverride::global("identity", 0).with(EffectSettings::ToneMapping(
        ToneMappingSettings {
            mode: ToneMappingMode::Linear,
            exposure: 1.0,
        },
    )));

    let mut pipeline = PipelineBuilder::new()
        .with_resolver(Box::new(stack))
        .with_pass(ToneMappingPass::descriptor(), Box::new(ToneMappingPass::new(Some(material))))
        .with_pass(VignettePass::descriptor(), Box::new(VignettePass::new(None)))
        .build(backend)
        .unwrap();

    let frame = frame(&mut pipeline, 320, 180);
    pipeline.backend_mut().take_commands();
    let stats = pipeline.render_camera(&camera(), &frame).unwrap();

    assert!(stats.executed.is_empty());
    assert_eq!(stats.skipped_inactive, 2);
    assert_eq!(stats.failed, 0);
    assert!(!stats.wrote_color);
    assert_eq!(pipeline.backend().work_count(), 0);
    // The frame still reaches the camera target.
    assert_eq!(pipeline.backend().content(frame.target), Some(SOURCE_CONTENT));
}

#[test]
fn active_settings_run_the_pass() {
    let mut backend = HeadlessBackend::new();
    let material = backend.register_material("tone_mapping");

    let mut pipeline = PipelineBuilder::new()
        .with_pass(ToneMappingPass::descriptor(), Box::new(ToneMappingPass::new(Some(material))))
        .build(backend)
        .unwrap();

    let frame = frame(&mut pipeline, 320, 180);
    let stats = pipeline.render_camera(&camera(), &frame).unwrap();

    // Default tone mapping (Neutral) is active.
    assert_eq!(stats.executed, vec!["Tone Mapping"]);
    assert!(stats.wrote_color);
    assert_eq!(pipeline.backend().work_count(), 1);
    assert_ne!(pipeline.backend().content(frame.target), Some(SOURCE_CONTENT));
}

#[test]
fn missing_depth_or_normal_skips_the_pass() {
    let mut backend = HeadlessBackend::new();
    let trace = backend.register_material("contact_shadow");
    let stack = VolumeStack::new().with_volume(VolumeOverride::global("shadows", 0).with(
        EffectSettings::ContactShadow(myth_postfx::resources::ContactShadowSettings {
            enabled: true,
            ..Default::default()
        }),
    ));

    let mut pipeline = PipelineBuilder::new()
        .with_resolver(Box::new(stack))
        .with_pass(
            ContactShadowPass::descriptor(),
            Box::new(ContactShadowPass::new(Some(trace), None, None)),
        )
        .build(backend)
        .unwrap();

    let frame = frame(&mut pipeline, 64, 64);
    let stats = pipeline.render_camera(&camera(), &frame).unwrap();
    assert_eq!(stats.skipped_missing_input, 1);
    assert_eq!(pipeline.backend().work_count(), 0);
}

// ============================================================================
// Error Containment
// ============================================================================

#[test]
fn failing_pass_does_not_stop_later_passes() {
    init_logger();
    let log = Log::default();
    let mut pipeline = PipelineBuilder::new()
        .with_pass(
            EffectPassDescriptor::new("broken", InjectionPoint::AfterRenderingOpaques),
            Tracer::failing("broken", &log),
        )
        .with_pass(
            EffectPassDescriptor::new("healthy", InjectionPoint::AfterRendering),
            Tracer::boxed("healthy", &log),
        )
        .build(HeadlessBackend::new())
        .unwrap();

    let frame = frame(&mut pipeline, 64, 64);
    for _ in 0..3 {
        let stats = pipeline.render_camera(&camera(), &frame).unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.executed, vec!["healthy"]);
    }
    assert_eq!(log.borrow().len(), 6);
}

#[test]
fn zero_sized_frame_is_rejected() {
    let log = Log::default();
    let mut pipeline = PipelineBuilder::new()
        .with_pass(
            EffectPassDescriptor::new("tracer", InjectionPoint::BeforeRendering),
            Tracer::boxed("tracer", &log),
        )
        .build(HeadlessBackend::new())
        .unwrap();

    let mut frame = frame(&mut pipeline, 64, 64);
    frame.width = 0;
    let err = pipeline.render_camera(&camera(), &frame).unwrap_err();
    assert!(matches!(err, PostFxError::InvalidResource { width: 0, .. }));
    assert!(log.borrow().is_empty());
}

// ============================================================================
// Build-Time Failures
// ============================================================================

#[test]
fn second_pass_for_a_settings_kind_is_rejected() {
    let result = PipelineBuilder::new()
        .with_pass(ToneMappingPass::descriptor(), Box::new(ToneMappingPass::new(None)))
        .with_pass(ToneMappingPass::descriptor(), Box::new(ToneMappingPass::new(None)))
        .build(HeadlessBackend::new());

    let Err(err) = result else {
        panic!("duplicate settings kind was accepted");
    };
    assert_eq!(err, PostFxError::DuplicatePass(SettingsKind::ToneMapping.to_string()));
}

struct UndeclaredBinding;

impl EffectPass for UndeclaredBinding {
    fn bindings(&self) -> &'static [&'static str] {
        &["_Declared"]
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        ctx.bindings.id("_NotDeclared")?;
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut PassContext, _settings: Option<&EffectSettings>) -> Result<()> {
        Ok(())
    }
}

#[test]
fn resolving_an_undeclared_binding_fails_the_build() {
    let result = PipelineBuilder::new()
        .with_pass(
            EffectPassDescriptor::new("undeclared", InjectionPoint::BeforeRendering),
            Box::new(UndeclaredBinding),
        )
        .build(HeadlessBackend::new());

    let Err(err) = result else {
        panic!("undeclared binding was accepted");
    };
    assert_eq!(err, PostFxError::MissingBinding("_NotDeclared".into()));
}
