use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which backdrop variant to mount regardless of the probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantSetting {
    #[default]
    Auto,
    Procedural,
    Gradient,
}

impl FromStr for VariantSetting {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(VariantSetting::Auto),
            "procedural" | "shader" => Ok(VariantSetting::Procedural),
            "gradient" | "css" | "fallback" => Ok(VariantSetting::Gradient),
            other => Err(format!(
                "invalid variant '{other}'; expected auto, procedural, or gradient"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LampConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub probe: ProbeSection,
    #[serde(default)]
    pub fallback: FallbackSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WindowSection {
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_true")]
    pub transparent: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RenderSection {
    /// Frame cap; absent or zero renders on every redraw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProbeSection {
    #[serde(default)]
    pub reduced_motion: bool,
    #[serde(default)]
    pub force_variant: VariantSetting,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FallbackSection {
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing
    )]
    pub pulse_period: Option<Duration>,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing
    )]
    pub stagger: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<PathBuf>,
}

impl Default for LampConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            window: WindowSection::default(),
            render: RenderSection::default(),
            probe: ProbeSection::default(),
            fallback: FallbackSection::default(),
        }
    }
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            size: default_size(),
            title: default_title(),
            transparent: true,
        }
    }
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_size() -> String {
    "1280x720".to_string()
}

fn default_title() -> String {
    "lavalamp".to_string()
}

fn default_true() -> bool {
    true
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Parses `WxH` (also `X` or `×` as separator); both sides must be non-zero.
pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), ConfigError> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| ConfigError::Invalid(format!("expected WxH format, got '{trimmed}'")))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("invalid width in size '{trimmed}'")))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("invalid height in size '{trimmed}'")))?;

    if width == 0 || height == 0 {
        return Err(ConfigError::Invalid(
            "surface dimensions must be greater than zero".into(),
        ));
    }

    Ok((width, height))
}

impl LampConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: LampConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Like [`LampConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn surface_size(&self) -> Result<(u32, u32), ConfigError> {
        parse_surface_size(&self.window.size)
    }

    /// Configured frame cap; zero means uncapped.
    pub fn target_fps(&self) -> Option<f32> {
        self.render.fps.filter(|fps| *fps > 0.0)
    }

    pub fn pulse_period(&self) -> Duration {
        self.fallback.pulse_period.unwrap_or(Duration::from_secs(2))
    }

    pub fn stagger(&self) -> Duration {
        self.fallback.stagger.unwrap_or(Duration::from_secs(1))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CURRENT_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CURRENT_VERSION}",
                self.version
            )));
        }

        self.surface_size()
            .map_err(|err| ConfigError::Invalid(format!("window.size: {err}")))?;

        if self.window.title.trim().is_empty() {
            return Err(ConfigError::Invalid("window.title must not be empty".into()));
        }

        if let Some(fps) = self.render.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("render.fps must be >= 0".into()));
            }
        }

        if self.fallback.pulse_period.is_some_and(|period| period.is_zero()) {
            return Err(ConfigError::Invalid(
                "fallback.pulse_period must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
