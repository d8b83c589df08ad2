use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lampconfig::{LampConfig, VariantSetting};
use renderer::{
    probe, CapabilityReport, PulseTiming, RenderPolicy, Renderer, RendererConfig,
    RendererVariant, SurfaceSize, SystemSignals, VariantPreference,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, CssArgs, ProbeArgs, StillArgs, WindowArgs};
use crate::paths::AppPaths;

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| paths.config_file());
    tracing::debug!(
        config_dir = %paths.config_dir().display(),
        config = %config_path.display(),
        "resolved lavalamp paths"
    );

    if let Some(Command::Where) = args.command {
        println!("config dir:  {}", paths.config_dir().display());
        println!(
            "config file: {}{}",
            config_path.display(),
            if config_path.exists() { "" } else { " (missing)" }
        );
        return Ok(());
    }

    let config = load_config(&config_path, args.config.is_some())?;
    match args.command {
        None => run_window(&args.window, &config),
        Some(Command::Probe(probe_args)) => run_probe(&probe_args, &config),
        Some(Command::Still(still_args)) => run_still(&still_args, &config),
        Some(Command::Css(css_args)) => run_css(&css_args, &config),
        Some(Command::Where) => Ok(()),
    }
}

pub fn initialise_tracing() {
    let default_filter = "warn,lavalamp=info,renderer=info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error,winit=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// An explicitly named file must exist; the discovered one may be absent.
fn load_config(path: &Path, explicit: bool) -> Result<LampConfig> {
    let config = if explicit {
        LampConfig::load(path)
    } else {
        LampConfig::load_or_default(path)
    }
    .with_context(|| format!("failed to load config {}", path.display()))?;
    Ok(config)
}

fn variant_preference(setting: VariantSetting) -> VariantPreference {
    match setting {
        VariantSetting::Auto => VariantPreference::Auto,
        VariantSetting::Procedural => VariantPreference::Procedural,
        VariantSetting::Gradient => VariantPreference::Gradient,
    }
}

/// Merges config-file values with CLI overrides; CLI wins.
fn renderer_config(args: &WindowArgs, config: &LampConfig) -> Result<RendererConfig> {
    let (width, height) = match args.size {
        Some(size) => size,
        None => config.surface_size()?,
    };
    let target_fps = match args.fps {
        Some(fps) if fps > 0.0 => Some(fps),
        Some(_) => None,
        None => config.target_fps(),
    };
    let stylesheet_path: Option<PathBuf> = args
        .stylesheet
        .clone()
        .or_else(|| config.fallback.stylesheet.clone());

    Ok(RendererConfig {
        surface_size: SurfaceSize::new(width, height),
        title: config.window.title.clone(),
        transparent: config.window.transparent,
        target_fps,
        reduced_motion: args.reduced_motion || config.probe.reduced_motion,
        variant: variant_preference(args.variant.unwrap_or(config.probe.force_variant)),
        gradient: PulseTiming {
            period: config.pulse_period(),
            stagger: config.stagger(),
        },
        stylesheet_path,
        policy: RenderPolicy::Animate { target_fps: None },
    })
}

fn run_window(args: &WindowArgs, config: &LampConfig) -> Result<()> {
    let renderer_config = renderer_config(args, config)?;
    tracing::info!(
        size = %renderer_config.surface_size,
        fps = ?renderer_config.target_fps,
        "starting lavalamp window"
    );
    let variant = Renderer::new(renderer_config).run()?;
    tracing::info!(%variant, "lavalamp finished");
    Ok(())
}

#[derive(Serialize)]
struct ProbeOutput<'a> {
    report: &'a CapabilityReport,
    probed: String,
    variant: String,
    forced: bool,
}

fn run_probe(args: &ProbeArgs, config: &LampConfig) -> Result<()> {
    let reduced_motion = args.reduced_motion || config.probe.reduced_motion;
    let report = probe(&SystemSignals::new(reduced_motion));
    let probed = report.select_variant();
    let preference = variant_preference(config.probe.force_variant);
    let variant = preference.resolve(probed);

    if args.json {
        let output = ProbeOutput {
            report: &report,
            probed: probed.to_string(),
            variant: variant.to_string(),
            forced: preference != VariantPreference::Auto,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("failed to encode probe report")?
        );
        return Ok(());
    }

    println!("graphics api:      {}", yes_no(report.graphics_api_available));
    match report.logical_processors {
        Some(count) => println!("logical processors: {count}"),
        None => println!("logical processors: unknown"),
    }
    println!("reduced motion:    {}", yes_no(report.reduced_motion_preferred));
    if let Some(adapter) = &report.adapter {
        println!(
            "adapter:           {} ({}, {})",
            adapter.name, adapter.backend, adapter.device_type
        );
    }
    println!("selected variant:  {variant}");
    if variant != probed {
        println!("  (probe chose {probed}; overridden by probe.force_variant)");
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn run_still(args: &StillArgs, config: &LampConfig) -> Result<()> {
    let window_args = WindowArgs {
        size: args.size,
        ..WindowArgs::default()
    };
    let renderer_config = renderer_config(&window_args, config)?;
    let setting = args.variant.unwrap_or(config.probe.force_variant);
    let variant = match setting {
        VariantSetting::Auto => {
            let report = probe(&SystemSignals::new(renderer_config.reduced_motion));
            report.select_variant()
        }
        VariantSetting::Procedural => RendererVariant::Procedural,
        VariantSetting::Gradient => RendererVariant::CssFallback,
    };
    Renderer::new(renderer_config).export_still(variant, args.time, &args.out)
}

fn run_css(args: &CssArgs, config: &LampConfig) -> Result<()> {
    let renderer_config = renderer_config(&WindowArgs::default(), config)?;
    Renderer::new(renderer_config).write_stylesheet(args.out.as_deref())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn cli_overrides_config_values() {
        let config = LampConfig::from_toml_str(
            r#"
[window]
size = "1920x1080"

[render]
fps = 60

[probe]
force_variant = "procedural"
"#,
        )
        .unwrap();
        let args = WindowArgs {
            size: Some((640, 480)),
            fps: Some(0.0),
            reduced_motion: true,
            variant: Some(VariantSetting::Gradient),
            stylesheet: None,
        };
        let merged = renderer_config(&args, &config).unwrap();
        assert_eq!(merged.surface_size, SurfaceSize::new(640, 480));
        assert_eq!(merged.target_fps, None);
        assert!(merged.reduced_motion);
        assert_eq!(merged.variant, VariantPreference::Gradient);
    }

    #[test]
    fn config_values_fill_missing_flags() {
        let config = LampConfig::from_toml_str(
            r#"
[window]
size = "320x200"
title = "kiosk"

[render]
fps = 24

[fallback]
pulse_period = "4s"
stagger = "250ms"
stylesheet = "out.css"
"#,
        )
        .unwrap();
        let merged = renderer_config(&WindowArgs::default(), &config).unwrap();
        assert_eq!(merged.surface_size, SurfaceSize::new(320, 200));
        assert_eq!(merged.title, "kiosk");
        assert_eq!(merged.target_fps, Some(24.0));
        assert_eq!(merged.variant, VariantPreference::Auto);
        assert_eq!(merged.gradient.period, Duration::from_secs(4));
        assert_eq!(merged.gradient.stagger, Duration::from_millis(250));
        assert_eq!(merged.stylesheet_path, Some(PathBuf::from("out.css")));
    }
}
