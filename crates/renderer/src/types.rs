use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::runtime::RenderPolicy;

/// Which backdrop implementation is mounted for the lifetime of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RendererVariant {
    /// Ray-marched distance field evaluated per pixel on the GPU.
    Procedural,
    /// Layered radial gradients with an opacity pulse; no graphics context.
    CssFallback,
}

impl fmt::Display for RendererVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererVariant::Procedural => f.write_str("procedural"),
            RendererVariant::CssFallback => f.write_str("gradient"),
        }
    }
}

/// Caller preference layered on top of the probe decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariantPreference {
    /// Trust the capability probe.
    #[default]
    Auto,
    Procedural,
    Gradient,
}

impl VariantPreference {
    /// Applies the preference to a probed decision.
    pub fn resolve(self, probed: RendererVariant) -> RendererVariant {
        match self {
            VariantPreference::Auto => probed,
            VariantPreference::Procedural => RendererVariant::Procedural,
            VariantPreference::Gradient => RendererVariant::CssFallback,
        }
    }
}

/// Pixel dimensions of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero-area sizes are reported by some compositors while minimised.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Size at pixel density 1 for a surface of this many physical pixels.
    /// Densities below 1 (or nonsense values) leave the size untouched so the
    /// backdrop never supersamples.
    pub fn at_unit_density(self, scale_factor: f64) -> Self {
        if !scale_factor.is_finite() || scale_factor <= 1.0 {
            return self;
        }
        let shrink = |physical: u32| ((physical as f64 / scale_factor).round() as u32).max(1);
        Self::new(shrink(self.width), shrink(self.height))
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for SurfaceSize {
    fn from(value: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(value.width, value.height)
    }
}

impl fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Summary of the adapter a probe or GPU context settled on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: String,
    pub device_type: String,
    pub software: bool,
}

impl AdapterProfile {
    pub fn from_wgpu(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            backend: format!("{:?}", info.backend),
            device_type: format!("{:?}", info.device_type),
            software: matches!(info.device_type, wgpu::DeviceType::Cpu),
        }
    }

    /// True for CPU rasterisers such as llvmpipe or WARP.
    pub fn is_software(&self) -> bool {
        self.software
    }
}

/// Immutable configuration passed to the window host at start-up.
///
/// `RendererConfig` mirrors CLI flags and config-file values after they have
/// been merged by the binary.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial window size in physical pixels.
    pub surface_size: SurfaceSize,
    /// Title shown by the window manager.
    pub title: String,
    /// Ask the compositor for a transparent window so the backdrop blends.
    pub transparent: bool,
    /// Optional FPS cap; None renders on every redraw callback.
    pub target_fps: Option<f32>,
    /// Override for the user's motion-reduction preference.
    pub reduced_motion: bool,
    /// Forces a variant regardless of the probe outcome.
    pub variant: VariantPreference,
    /// Pulse timing for the gradient variant.
    pub gradient: crate::gradient::PulseTiming,
    /// Where the gradient stylesheet goes when the window falls back;
    /// None writes it to stdout.
    pub stylesheet_path: Option<PathBuf>,
    /// High-level render behaviour requested by the caller.
    pub policy: RenderPolicy,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: SurfaceSize::new(1280, 720),
            title: "lavalamp".to_string(),
            transparent: true,
            target_fps: None,
            reduced_motion: false,
            variant: VariantPreference::Auto,
            gradient: crate::gradient::PulseTiming::default(),
            stylesheet_path: None,
            policy: RenderPolicy::default(),
        }
    }
}
