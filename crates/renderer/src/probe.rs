//! Device capability probing and the variant decision rule.
//!
//! The probe runs once before a backdrop mounts. It reads three signals
//! through [`EnvironmentSignals`] and hands the resulting
//! [`CapabilityReport`] to [`select_variant`], a pure function, so hosts
//! and tests can swap the signal source without touching the rule.

use serde::Serialize;
use tracing::debug;

use crate::types::{AdapterProfile, RendererVariant};

/// Processor count below which the procedural variant is rejected.
pub const MIN_LOGICAL_PROCESSORS: usize = 2;

/// Environment variable that opts into reduced motion.
pub const ENV_REDUCED_MOTION: &str = "LAVALAMP_REDUCED_MOTION";

/// Snapshot of the runtime environment, computed once per mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityReport {
    pub graphics_api_available: bool,
    /// `None` when the platform does not report a count.
    pub logical_processors: Option<usize>,
    pub reduced_motion_preferred: bool,
    /// Adapter found while checking graphics availability, if any.
    pub adapter: Option<AdapterProfile>,
}

impl CapabilityReport {
    pub fn new(
        graphics_api_available: bool,
        logical_processors: Option<usize>,
        reduced_motion_preferred: bool,
    ) -> Self {
        Self {
            graphics_api_available,
            logical_processors,
            reduced_motion_preferred,
            adapter: None,
        }
    }

    pub fn with_adapter(mut self, adapter: Option<AdapterProfile>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn select_variant(&self) -> RendererVariant {
        select_variant(self)
    }
}

/// Decides which backdrop variant a report supports. First match wins.
pub fn select_variant(report: &CapabilityReport) -> RendererVariant {
    if !report.graphics_api_available {
        return RendererVariant::CssFallback;
    }
    if matches!(report.logical_processors, Some(count) if count < MIN_LOGICAL_PROCESSORS) {
        return RendererVariant::CssFallback;
    }
    if report.reduced_motion_preferred {
        return RendererVariant::CssFallback;
    }
    RendererVariant::Procedural
}

/// Source of the signals the probe inspects.
pub trait EnvironmentSignals {
    /// Attempts to acquire a transient graphics context. The context must be
    /// released before returning; absence is a normal answer.
    fn graphics_api_available(&self) -> (bool, Option<AdapterProfile>);
    fn logical_processors(&self) -> Option<usize>;
    fn reduced_motion_preferred(&self) -> bool;
}

/// Gathers every signal into a report.
pub fn probe<S: EnvironmentSignals + ?Sized>(signals: &S) -> CapabilityReport {
    let (graphics_api_available, adapter) = signals.graphics_api_available();
    let report = CapabilityReport::new(
        graphics_api_available,
        signals.logical_processors(),
        signals.reduced_motion_preferred(),
    )
    .with_adapter(adapter);
    debug!(
        graphics = report.graphics_api_available,
        processors = ?report.logical_processors,
        reduced_motion = report.reduced_motion_preferred,
        adapter = report.adapter.as_ref().map(|profile| profile.name.as_str()),
        "capability probe finished"
    );
    report
}

/// Production signal source backed by wgpu and the standard library.
#[derive(Debug, Clone, Default)]
pub struct SystemSignals {
    reduced_motion: bool,
}

impl SystemSignals {
    /// `reduced_motion` carries the caller's explicit preference (CLI or
    /// config); the environment variable is consulted as well.
    pub fn new(reduced_motion: bool) -> Self {
        Self { reduced_motion }
    }
}

impl EnvironmentSignals for SystemSignals {
    fn graphics_api_available(&self) -> (bool, Option<AdapterProfile>) {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }));
        // Adapter and instance drop at the end of this scope.
        match adapter {
            Ok(adapter) => {
                let profile = AdapterProfile::from_wgpu(&adapter.get_info());
                (true, Some(profile))
            }
            Err(err) => {
                debug!(error = %err, "no graphics adapter available");
                (false, None)
            }
        }
    }

    fn logical_processors(&self) -> Option<usize> {
        std::thread::available_parallelism()
            .ok()
            .map(|count| count.get())
    }

    fn reduced_motion_preferred(&self) -> bool {
        self.reduced_motion || env_flag(ENV_REDUCED_MOTION)
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| parse_flag(&value))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "reduce"
    )
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct FakeSignals {
        graphics: bool,
        processors: Option<usize>,
        reduced_motion: bool,
        graphics_checks: Cell<u32>,
    }

    impl FakeSignals {
        fn new(graphics: bool, processors: Option<usize>, reduced_motion: bool) -> Self {
            Self {
                graphics,
                processors,
                reduced_motion,
                graphics_checks: Cell::new(0),
            }
        }
    }

    impl EnvironmentSignals for FakeSignals {
        fn graphics_api_available(&self) -> (bool, Option<AdapterProfile>) {
            self.graphics_checks.set(self.graphics_checks.get() + 1);
            (self.graphics, None)
        }

        fn logical_processors(&self) -> Option<usize> {
            self.processors
        }

        fn reduced_motion_preferred(&self) -> bool {
            self.reduced_motion
        }
    }

    fn every_report() -> Vec<CapabilityReport> {
        let processors = [None, Some(0), Some(1), Some(2), Some(8), Some(64)];
        let mut reports = Vec::new();
        for graphics in [false, true] {
            for count in processors {
                for reduced in [false, true] {
                    reports.push(CapabilityReport::new(graphics, count, reduced));
                }
            }
        }
        reports
    }

    #[test]
    fn missing_graphics_always_falls_back() {
        for report in every_report()
            .into_iter()
            .filter(|report| !report.graphics_api_available)
        {
            assert_eq!(select_variant(&report), RendererVariant::CssFallback);
        }
    }

    #[test]
    fn single_core_devices_fall_back() {
        for report in every_report()
            .into_iter()
            .filter(|report| matches!(report.logical_processors, Some(count) if count < 2))
        {
            assert_eq!(select_variant(&report), RendererVariant::CssFallback);
        }
    }

    #[test]
    fn reduced_motion_falls_back() {
        for report in every_report()
            .into_iter()
            .filter(|report| report.reduced_motion_preferred)
        {
            assert_eq!(select_variant(&report), RendererVariant::CssFallback);
        }
    }

    #[test]
    fn procedural_only_when_every_signal_allows_it() {
        for report in every_report() {
            let allowed = report.graphics_api_available
                && report.logical_processors.map_or(true, |count| count >= 2)
                && !report.reduced_motion_preferred;
            let expected = if allowed {
                RendererVariant::Procedural
            } else {
                RendererVariant::CssFallback
            };
            assert_eq!(select_variant(&report), expected, "{report:?}");
        }
    }

    #[test]
    fn unknown_processor_count_does_not_block_procedural() {
        let report = CapabilityReport::new(true, None, false);
        assert_eq!(report.select_variant(), RendererVariant::Procedural);
    }

    #[test]
    fn probe_collects_each_signal_once() {
        let signals = FakeSignals::new(true, Some(8), false);
        let report = probe(&signals);
        assert_eq!(signals.graphics_checks.get(), 1);
        assert_eq!(report, CapabilityReport::new(true, Some(8), false));
    }

    #[test]
    fn flag_values_are_lenient() {
        assert!(parse_flag("1"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("reduce"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("no-preference"));
    }
}
