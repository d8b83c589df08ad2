//! Renderer crate for lavalamp, an adaptive animated backdrop.
//!
//! A capability probe decides once, before mounting, which of two variants
//! the host gets:
//!
//! ```text
//!   RendererConfig
//!        │
//!        ▼
//!   probe::probe ──▶ select_variant ──▶ VariantPreference::resolve
//!                                              │
//!                    ┌─────────────────────────┴───────────────────┐
//!                    ▼                                             ▼
//!   Backdrop::Procedural (wgpu, ray-marched blob)   Backdrop::Gradient (stylesheet)
//!        │ frame(): resize → time → uniforms → draw
//!        ▼
//!   FrameTarget: gpu::GpuState | software::SoftwareCanvas
//! ```
//!
//! `Renderer` is the thin entry point used by the binary: `run` opens the
//! desktop window, `export_still` writes one frame of either variant to PNG.

pub mod backdrop;
mod compile;
pub mod frame;
mod gpu;
pub mod gradient;
pub mod probe;
pub mod runtime;
pub mod scene;
pub mod software;
pub mod types;
pub mod uniforms;
mod window;

use std::path::Path;

use anyhow::{Context, Result};

pub use backdrop::{
    Backdrop, FrameOutcome, FrameTarget, MountOptions, ProceduralBackdrop, RenderError,
    TargetFactory,
};
pub use compile::fragment_source;
pub use gradient::{GradientBackdrop, PulseTiming};
pub use probe::{probe, select_variant, CapabilityReport, EnvironmentSignals, SystemSignals};
pub use runtime::{RenderPolicy, TimeSample, TimeSource};
pub use types::{AdapterProfile, RendererConfig, RendererVariant, SurfaceSize, VariantPreference};
pub use uniforms::{ShaderUniforms, ViewportResolution};
pub use window::SOFTWARE_FPS_CAP;

/// High-level entry point that owns the renderer configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Probes, mounts, and runs the window until it closes. Returns the
    /// variant that was actually mounted.
    pub fn run(&self) -> Result<RendererVariant> {
        window::run(&self.config)
    }

    /// Writes a single frame of `variant` at `time` seconds to `path`.
    pub fn export_still(&self, variant: RendererVariant, time: f32, path: &Path) -> Result<()> {
        software::export_still(
            variant,
            self.config.surface_size,
            time,
            self.config.gradient,
            path,
        )
        .with_context(|| format!("failed to export still frame to {}", path.display()))
    }

    /// Writes the gradient stylesheet to `path`, or stdout when None.
    pub fn write_stylesheet(&self, path: Option<&Path>) -> Result<()> {
        let css = GradientBackdrop::new(self.config.gradient).stylesheet();
        window::write_stylesheet(&css, path)
    }
}
