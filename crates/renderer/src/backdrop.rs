//! The adaptive backdrop: one of two variants mounted for a host's lifetime.
//!
//! ```text
//!   probe::select_variant ──▶ Backdrop::mount ──┬─▶ ProceduralBackdrop<T: FrameTarget>
//!                                               │      frame(): resize → time → draw
//!                                               └─▶ GradientBackdrop (no per-frame work)
//! ```
//!
//! `FrameTarget` is the seam between the host-side frame loop and whatever
//! actually produces pixels: the wgpu state for live windows, the CPU canvas
//! for still exports, and recording doubles in tests.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::frame::FrameScheduler;
use crate::gradient::{GradientBackdrop, PulseTiming};
use crate::runtime::BoxedTimeSource;
use crate::types::{RendererVariant, SurfaceSize};
use crate::uniforms::ShaderUniforms;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("failed to write still frame: {0}")]
    Image(#[from] image::ImageError),
}

/// Something the procedural variant can draw a frame into.
pub trait FrameTarget {
    /// Container size in physical pixels.
    fn size(&self) -> SurfaceSize;
    /// Pixels the shader evaluates per frame; feeds the viewport resolution.
    fn render_size(&self) -> SurfaceSize {
        self.size()
    }
    /// Reconfigures backing storage; called before the draw that needs it.
    fn resize(&mut self, size: SurfaceSize);
    fn set_scale_factor(&mut self, _scale_factor: f64) {}
    fn draw(&mut self, uniforms: &ShaderUniforms) -> Result<(), RenderError>;
}

/// Acquires frame targets for the procedural variant. Never consulted when
/// the gradient variant is mounted.
pub trait TargetFactory {
    type Target: FrameTarget;

    fn create(&mut self, size: SurfaceSize) -> anyhow::Result<Self::Target>;
}

/// Result of one frame callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// The frame was drawn with these uniforms.
    Rendered(ShaderUniforms),
    /// The surface needed recovery; the next callback will draw.
    Skipped,
    /// Nothing to draw: gradient variant or torn down.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MountOptions {
    pub target_fps: Option<f32>,
    pub pulse: PulseTiming,
}

/// Host-side state of the shader path: owned uniforms, deferred resize,
/// clock, and the frame registration.
pub struct ProceduralBackdrop<T: FrameTarget> {
    target: Option<T>,
    uniforms: ShaderUniforms,
    pending_resize: Option<SurfaceSize>,
    pending_scale_factor: Option<f64>,
    time_source: BoxedTimeSource,
    scheduler: FrameScheduler,
}

impl<T: FrameTarget> ProceduralBackdrop<T> {
    pub fn mount(target: T, mut time_source: BoxedTimeSource, target_fps: Option<f32>) -> Self {
        let size = target.render_size();
        time_source.reset();
        let mut scheduler = FrameScheduler::new(target_fps);
        scheduler.register();
        debug!(%size, fps_cap = ?target_fps, "procedural backdrop mounted");
        Self {
            target: Some(target),
            uniforms: ShaderUniforms::new(size.into()),
            pending_resize: None,
            pending_scale_factor: None,
            time_source,
            scheduler,
        }
    }

    pub fn uniforms(&self) -> &ShaderUniforms {
        &self.uniforms
    }

    pub fn is_mounted(&self) -> bool {
        self.target.is_some() && self.scheduler.is_registered()
    }

    /// Records a new container size; applied at the start of the next frame.
    pub fn resize(&mut self, size: SurfaceSize) {
        if size.is_empty() || !self.is_mounted() {
            return;
        }
        self.pending_resize = Some(size);
    }

    /// Records a display scale change; applied with any pending resize.
    pub fn rescale(&mut self, scale_factor: f64) {
        if !self.is_mounted() {
            return;
        }
        self.pending_scale_factor = Some(scale_factor);
    }

    pub fn wants_frame(&self, now: Instant) -> bool {
        self.target.is_some() && self.scheduler.ready_for_frame(now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn frame(&mut self, now: Instant) -> Result<FrameOutcome, RenderError> {
        if !self.scheduler.is_registered() {
            return Ok(FrameOutcome::Idle);
        }
        let Some(target) = self.target.as_mut() else {
            return Ok(FrameOutcome::Idle);
        };

        let mut reconfigured = false;
        if let Some(scale_factor) = self.pending_scale_factor.take() {
            target.set_scale_factor(scale_factor);
            reconfigured = true;
        }
        if let Some(size) = self.pending_resize.take() {
            target.resize(size);
            reconfigured = true;
        }
        if reconfigured {
            self.uniforms.set_resolution(target.render_size());
        }

        let sample = self.time_source.sample();
        self.uniforms.set_time(sample.seconds);

        match target.draw(&self.uniforms) {
            Ok(()) => {
                self.scheduler.mark_rendered(now);
                Ok(FrameOutcome::Rendered(self.uniforms))
            }
            Err(RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                debug!("surface lost or outdated; reconfiguring before next frame");
                self.pending_resize = Some(target.size());
                Ok(FrameOutcome::Skipped)
            }
            Err(RenderError::Surface(wgpu::SurfaceError::Timeout)) => {
                warn!("surface timeout; retrying next frame");
                Ok(FrameOutcome::Skipped)
            }
            Err(err) => Err(err),
        }
    }

    /// Cancels the frame registration and hands the target back to the caller.
    pub fn into_target(mut self) -> Option<T> {
        self.scheduler.cancel();
        self.target.take()
    }

    /// Cancels the frame registration and releases the target. Safe to call
    /// any number of times.
    pub fn teardown(&mut self) {
        let cancelled = self.scheduler.cancel();
        let released = self.target.take().is_some();
        self.pending_resize = None;
        self.pending_scale_factor = None;
        if cancelled || released {
            debug!(
                frames = self.scheduler.frames_rendered(),
                "procedural backdrop torn down"
            );
        }
    }
}

impl<T: FrameTarget> Drop for ProceduralBackdrop<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// The mounted variant. Closed set; chosen once.
pub enum Backdrop<T: FrameTarget> {
    Procedural(ProceduralBackdrop<T>),
    Gradient(GradientBackdrop),
}

impl<T: FrameTarget> Backdrop<T> {
    /// Mounts `variant`. A procedural mount whose target cannot be acquired
    /// degrades to the gradient variant.
    pub fn mount<F>(
        variant: RendererVariant,
        factory: &mut F,
        size: SurfaceSize,
        time_source: BoxedTimeSource,
        options: MountOptions,
    ) -> Self
    where
        F: TargetFactory<Target = T>,
    {
        match variant {
            RendererVariant::CssFallback => {
                info!("mounting gradient backdrop");
                Backdrop::Gradient(GradientBackdrop::new(options.pulse))
            }
            RendererVariant::Procedural => match factory.create(size) {
                Ok(target) => {
                    info!(%size, "mounting procedural backdrop");
                    Backdrop::Procedural(ProceduralBackdrop::mount(
                        target,
                        time_source,
                        options.target_fps,
                    ))
                }
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "procedural backdrop unavailable; using gradient");
                    Backdrop::Gradient(GradientBackdrop::new(options.pulse))
                }
            },
        }
    }

    pub fn variant(&self) -> RendererVariant {
        match self {
            Backdrop::Procedural(_) => RendererVariant::Procedural,
            Backdrop::Gradient(_) => RendererVariant::CssFallback,
        }
    }

    pub fn resize(&mut self, size: SurfaceSize) {
        if let Backdrop::Procedural(procedural) = self {
            procedural.resize(size);
        }
    }

    pub fn rescale(&mut self, scale_factor: f64) {
        if let Backdrop::Procedural(procedural) = self {
            procedural.rescale(scale_factor);
        }
    }

    pub fn wants_frame(&self, now: Instant) -> bool {
        match self {
            Backdrop::Procedural(procedural) => procedural.wants_frame(now),
            Backdrop::Gradient(_) => false,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self {
            Backdrop::Procedural(procedural) => procedural.next_deadline(),
            Backdrop::Gradient(_) => None,
        }
    }

    pub fn frame(&mut self, now: Instant) -> Result<FrameOutcome, RenderError> {
        match self {
            Backdrop::Procedural(procedural) => procedural.frame(now),
            Backdrop::Gradient(_) => Ok(FrameOutcome::Idle),
        }
    }

    pub fn teardown(&mut self) {
        if let Backdrop::Procedural(procedural) = self {
            procedural.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;
    use crate::probe::CapabilityReport;
    use crate::runtime::{TimeSample, TimeSource};

    #[derive(Default)]
    struct Journal {
        events: RefCell<Vec<String>>,
        released: Cell<bool>,
        failures: RefCell<VecDeque<wgpu::SurfaceError>>,
    }

    struct RecordingTarget {
        size: SurfaceSize,
        scale_factor: f64,
        journal: Rc<Journal>,
    }

    impl FrameTarget for RecordingTarget {
        fn size(&self) -> SurfaceSize {
            self.size
        }

        fn render_size(&self) -> SurfaceSize {
            self.size.at_unit_density(self.scale_factor)
        }

        fn set_scale_factor(&mut self, scale_factor: f64) {
            self.scale_factor = scale_factor;
            self.journal
                .events
                .borrow_mut()
                .push(format!("scale {scale_factor}"));
        }

        fn resize(&mut self, size: SurfaceSize) {
            self.size = size;
            self.journal.events.borrow_mut().push(format!("resize {size}"));
        }

        fn draw(&mut self, uniforms: &ShaderUniforms) -> Result<(), RenderError> {
            if let Some(err) = self.journal.failures.borrow_mut().pop_front() {
                return Err(err.into());
            }
            let [w, h, ..] = uniforms.viewport_resolution.as_array();
            self.journal
                .events
                .borrow_mut()
                .push(format!("draw {w}x{h}"));
            Ok(())
        }
    }

    impl Drop for RecordingTarget {
        fn drop(&mut self) {
            self.journal.released.set(true);
        }
    }

    struct RecordingFactory {
        journal: Rc<Journal>,
        requests: u32,
        fail: bool,
        scale_factor: f64,
    }

    impl RecordingFactory {
        fn new(fail: bool) -> Self {
            Self {
                journal: Rc::new(Journal::default()),
                requests: 0,
                fail,
                scale_factor: 1.0,
            }
        }
    }

    impl TargetFactory for RecordingFactory {
        type Target = RecordingTarget;

        fn create(&mut self, size: SurfaceSize) -> anyhow::Result<RecordingTarget> {
            self.requests += 1;
            if self.fail {
                anyhow::bail!("no adapter");
            }
            Ok(RecordingTarget {
                size,
                scale_factor: self.scale_factor,
                journal: self.journal.clone(),
            })
        }
    }

    struct ScriptedTime {
        samples: VecDeque<f32>,
        frame: u64,
    }

    impl ScriptedTime {
        fn boxed(samples: &[f32]) -> BoxedTimeSource {
            Box::new(Self {
                samples: samples.iter().copied().collect(),
                frame: 0,
            })
        }
    }

    impl TimeSource for ScriptedTime {
        fn reset(&mut self) {
            self.frame = 0;
        }

        fn sample(&mut self) -> TimeSample {
            let seconds = self.samples.pop_front().unwrap_or(0.0);
            let sample = TimeSample::new(seconds, self.frame);
            self.frame += 1;
            sample
        }
    }

    fn mount(
        variant: RendererVariant,
        factory: &mut RecordingFactory,
        size: SurfaceSize,
        times: &[f32],
    ) -> Backdrop<RecordingTarget> {
        Backdrop::mount(
            variant,
            factory,
            size,
            ScriptedTime::boxed(times),
            MountOptions::default(),
        )
    }

    fn rendered(outcome: FrameOutcome) -> ShaderUniforms {
        match outcome {
            FrameOutcome::Rendered(uniforms) => uniforms,
            other => panic!("expected a rendered frame, got {other:?}"),
        }
    }

    #[test]
    fn fallback_never_requests_a_target() {
        let report = CapabilityReport::new(false, Some(8), false);
        let mut factory = RecordingFactory::new(false);
        let mut backdrop = mount(
            report.select_variant(),
            &mut factory,
            SurfaceSize::new(1280, 720),
            &[],
        );
        assert_eq!(backdrop.variant(), RendererVariant::CssFallback);
        assert_eq!(factory.requests, 0);
        assert!(!backdrop.wants_frame(Instant::now()));
        assert_eq!(backdrop.frame(Instant::now()).unwrap(), FrameOutcome::Idle);
    }

    #[test]
    fn first_procedural_frame_starts_at_zero() {
        let report = CapabilityReport::new(true, Some(8), false);
        let mut factory = RecordingFactory::new(false);
        let mut backdrop = mount(
            report.select_variant(),
            &mut factory,
            SurfaceSize::new(1280, 720),
            &[0.0, 0.016],
        );
        assert_eq!(backdrop.variant(), RendererVariant::Procedural);
        assert!(backdrop.wants_frame(Instant::now()));

        let uniforms = rendered(backdrop.frame(Instant::now()).unwrap());
        assert_eq!(uniforms.elapsed_time, 0.0);
        assert_eq!(
            uniforms.viewport_resolution.as_array(),
            [1280.0, 720.0, 1.0, 0.5625]
        );
    }

    #[test]
    fn resize_applies_before_the_next_draw() {
        let mut factory = RecordingFactory::new(false);
        let journal = factory.journal.clone();
        let mut backdrop = mount(
            RendererVariant::Procedural,
            &mut factory,
            SurfaceSize::new(1280, 720),
            &[0.0, 0.5],
        );
        rendered(backdrop.frame(Instant::now()).unwrap());

        backdrop.resize(SurfaceSize::new(800, 800));
        let uniforms = rendered(backdrop.frame(Instant::now()).unwrap());
        assert_eq!(uniforms.viewport_resolution.as_array(), [800.0, 800.0, 1.0, 1.0]);
        assert_eq!(uniforms.elapsed_time, 0.5);
        assert_eq!(
            *journal.events.borrow(),
            vec!["draw 1280x720", "resize 800x800", "draw 800x800"]
        );
    }

    #[test]
    fn teardown_is_idempotent_and_releases_target() {
        let mut factory = RecordingFactory::new(false);
        let journal = factory.journal.clone();
        let mut backdrop = mount(
            RendererVariant::Procedural,
            &mut factory,
            SurfaceSize::new(640, 480),
            &[],
        );
        backdrop.teardown();
        backdrop.teardown();
        assert!(journal.released.get());
        assert!(!backdrop.wants_frame(Instant::now()));
        assert_eq!(backdrop.next_deadline(), None);
        assert_eq!(backdrop.frame(Instant::now()).unwrap(), FrameOutcome::Idle);
    }

    #[test]
    fn dropping_the_backdrop_releases_target() {
        let mut factory = RecordingFactory::new(false);
        let journal = factory.journal.clone();
        let backdrop = mount(
            RendererVariant::Procedural,
            &mut factory,
            SurfaceSize::new(640, 480),
            &[],
        );
        drop(backdrop);
        assert!(journal.released.get());
    }

    #[test]
    fn shader_resolution_stays_at_unit_density() {
        let mut factory = RecordingFactory::new(false);
        factory.scale_factor = 2.0;
        let journal = factory.journal.clone();
        let mut backdrop = mount(
            RendererVariant::Procedural,
            &mut factory,
            SurfaceSize::new(2560, 1440),
            &[0.0, 0.5],
        );

        let first = rendered(backdrop.frame(Instant::now()).unwrap());
        assert_eq!(
            first.viewport_resolution.as_array(),
            [1280.0, 720.0, 1.0, 0.5625]
        );

        backdrop.rescale(1.0);
        let second = rendered(backdrop.frame(Instant::now()).unwrap());
        assert_eq!(
            second.viewport_resolution.as_array(),
            [2560.0, 1440.0, 1.0, 0.5625]
        );
        assert_eq!(
            *journal.events.borrow(),
            ["draw 1280x720", "scale 1", "draw 2560x1440"]
        );
    }

    #[test]
    fn failed_target_acquisition_degrades_to_gradient() {
        let mut factory = RecordingFactory::new(true);
        let mut backdrop = mount(
            RendererVariant::Procedural,
            &mut factory,
            SurfaceSize::new(640, 480),
            &[],
        );
        assert_eq!(factory.requests, 1);
        assert_eq!(backdrop.variant(), RendererVariant::CssFallback);
        assert!(!backdrop.wants_frame(Instant::now()));
        assert_eq!(backdrop.next_deadline(), None);
        assert_eq!(backdrop.frame(Instant::now()).unwrap(), FrameOutcome::Idle);
        backdrop.teardown();
        backdrop.teardown();
    }

    #[test]
    fn lost_surface_is_reconfigured_on_the_next_frame() {
        let mut factory = RecordingFactory::new(false);
        let journal = factory.journal.clone();
        journal
            .failures
            .borrow_mut()
            .push_back(wgpu::SurfaceError::Lost);
        let mut backdrop = mount(
            RendererVariant::Procedural,
            &mut factory,
            SurfaceSize::new(320, 200),
            &[0.0, 0.1],
        );
        assert_eq!(backdrop.frame(Instant::now()).unwrap(), FrameOutcome::Skipped);
        rendered(backdrop.frame(Instant::now()).unwrap());
        assert_eq!(
            *journal.events.borrow(),
            vec!["resize 320x200", "draw 320x200"]
        );
    }

    #[test]
    fn out_of_memory_is_reported() {
        let mut factory = RecordingFactory::new(false);
        factory
            .journal
            .failures
            .borrow_mut()
            .push_back(wgpu::SurfaceError::OutOfMemory);
        let mut backdrop = mount(
            RendererVariant::Procedural,
            &mut factory,
            SurfaceSize::new(320, 200),
            &[],
        );
        assert!(matches!(
            backdrop.frame(Instant::now()),
            Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory))
        ));
    }

    #[test]
    fn empty_resize_is_ignored() {
        let mut factory = RecordingFactory::new(false);
        let mut backdrop = mount(
            RendererVariant::Procedural,
            &mut factory,
            SurfaceSize::new(320, 200),
            &[],
        );
        backdrop.resize(SurfaceSize::new(0, 0));
        let uniforms = rendered(backdrop.frame(Instant::now()).unwrap());
        assert_eq!(uniforms.viewport_resolution.width, 320.0);
    }
}
