//! Desktop host: probes once, mounts a backdrop in a winit window, and drives
//! the frame loop until the window closes.

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::backdrop::{Backdrop, MountOptions, TargetFactory};
use crate::gpu::GpuState;
use crate::gradient::GradientBackdrop;
use crate::probe::{self, CapabilityReport, SystemSignals};
use crate::runtime::time_source_for_policy;
use crate::types::{RendererConfig, RendererVariant, SurfaceSize};

/// Frame cap applied on CPU rasterisers unless the caller picked one.
pub const SOFTWARE_FPS_CAP: f32 = 15.0;

struct GpuTargetFactory {
    window: Arc<Window>,
}

impl TargetFactory for GpuTargetFactory {
    type Target = GpuState;

    fn create(&mut self, size: SurfaceSize) -> Result<GpuState> {
        let state = GpuState::new(self.window.clone(), size, self.window.scale_factor())?;
        let profile = state.adapter_profile();
        info!(
            adapter = %profile.name,
            backend = %profile.backend,
            "GPU frame target ready"
        );
        Ok(state)
    }
}

/// Picks the frame cap: explicit setting, then policy, then the software cap.
pub(crate) fn effective_fps(config: &RendererConfig, report: &CapabilityReport) -> Option<f32> {
    if let Some(fps) = config.target_fps.or(config.policy.target_fps()) {
        return Some(fps);
    }
    let software = report
        .adapter
        .as_ref()
        .filter(|profile| profile.is_software())?;
    warn!(
        adapter = %software.name,
        cap = SOFTWARE_FPS_CAP,
        "software rasterizer detected; capping frame rate (override with --fps)"
    );
    Some(SOFTWARE_FPS_CAP)
}

/// Runs the window host and reports which variant ended up mounted.
pub(crate) fn run(config: &RendererConfig) -> Result<RendererVariant> {
    let report = probe::probe(&SystemSignals::new(config.reduced_motion));
    let probed = report.select_variant();
    let variant = config.variant.resolve(probed);
    info!(%probed, %variant, "backdrop variant selected");

    if variant == RendererVariant::CssFallback {
        present_gradient(config)?;
        return Ok(RendererVariant::CssFallback);
    }

    let (event_loop, window) = match open_window(config) {
        Ok(pair) => pair,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "no window available; using gradient");
            present_gradient(config)?;
            return Ok(RendererVariant::CssFallback);
        }
    };

    let size = SurfaceSize::from(window.inner_size());
    let options = MountOptions {
        target_fps: effective_fps(config, &report),
        pulse: config.gradient,
    };
    let mut factory = GpuTargetFactory {
        window: window.clone(),
    };
    let mut backdrop = Backdrop::mount(
        variant,
        &mut factory,
        size,
        time_source_for_policy(&config.policy),
        options,
    );
    if let Backdrop::Gradient(gradient) = &backdrop {
        drop(window);
        write_stylesheet(&gradient.stylesheet(), config.stylesheet_path.as_deref())?;
        return Ok(RendererVariant::CssFallback);
    }

    if backdrop.wants_frame(Instant::now()) {
        window.request_redraw();
    }

    let mut fatal = None;
    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                backdrop.teardown();
                elwt.exit();
            }
            WindowEvent::Resized(new_size) => {
                backdrop.resize(SurfaceSize::from(new_size));
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                backdrop.rescale(scale_factor);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = backdrop.frame(Instant::now()) {
                    error!(error = %err, "unrecoverable surface error; tearing down");
                    backdrop.teardown();
                    fatal = Some(err);
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if backdrop.wants_frame(now) {
                tracing::trace!("scheduler: issuing redraw now");
                window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = backdrop.next_deadline() {
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        Event::LoopExiting => backdrop.teardown(),
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    if let Some(err) = fatal {
        return Err(err).context("procedural backdrop stopped");
    }
    Ok(RendererVariant::Procedural)
}

fn open_window(config: &RendererConfig) -> Result<(EventLoop<()>, Arc<Window>)> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(config.title.clone())
        .with_inner_size(PhysicalSize::new(
            config.surface_size.width,
            config.surface_size.height,
        ))
        .with_transparent(config.transparent)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    Ok((event_loop, Arc::new(window)))
}

/// Hands the gradient description to its presentation layer.
fn present_gradient(config: &RendererConfig) -> Result<()> {
    let css = GradientBackdrop::new(config.gradient).stylesheet();
    write_stylesheet(&css, config.stylesheet_path.as_deref())
}

pub(crate) fn write_stylesheet(css: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, css)
                .with_context(|| format!("failed to write stylesheet to {}", path.display()))?;
            info!(path = %path.display(), "gradient stylesheet written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(css.as_bytes())
                .context("failed to write stylesheet to stdout")?;
            stdout.flush().context("failed to flush stdout")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RenderPolicy;
    use crate::types::AdapterProfile;

    fn software_report() -> CapabilityReport {
        let profile = AdapterProfile {
            name: "llvmpipe".to_string(),
            backend: "Vulkan".to_string(),
            device_type: "Cpu".to_string(),
            software: true,
        };
        CapabilityReport::new(true, Some(4), false).with_adapter(Some(profile))
    }

    #[test]
    fn software_adapters_are_capped() {
        let config = RendererConfig::default();
        assert_eq!(
            effective_fps(&config, &software_report()),
            Some(SOFTWARE_FPS_CAP)
        );
    }

    #[test]
    fn explicit_fps_wins_over_software_cap() {
        let config = RendererConfig {
            target_fps: Some(30.0),
            ..RendererConfig::default()
        };
        assert_eq!(effective_fps(&config, &software_report()), Some(30.0));

        let config = RendererConfig {
            policy: RenderPolicy::Animate {
                target_fps: Some(24.0),
            },
            ..RendererConfig::default()
        };
        assert_eq!(effective_fps(&config, &software_report()), Some(24.0));
    }

    #[test]
    fn hardware_adapters_are_uncapped() {
        let report = CapabilityReport::new(true, Some(8), false);
        assert_eq!(effective_fps(&RendererConfig::default(), &report), None);
    }

    #[test]
    fn stylesheet_is_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backdrop.css");
        write_stylesheet("a {}", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a {}");
    }
}
