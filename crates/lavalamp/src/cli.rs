use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lampconfig::{parse_surface_size, VariantSetting};

#[derive(Parser, Debug)]
#[command(
    name = "lavalamp",
    author,
    version,
    about = "Adaptive animated backdrop: ray-marched blob or gradient fallback",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Configuration file (defaults to `lavalamp.toml` in the config directory).
    #[arg(long, global = true, env = "LAVALAMP_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub window: WindowArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct WindowArgs {
    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Optional FPS cap (0=uncapped).
    #[arg(long, value_name = "FPS", value_parser = parse_fps)]
    pub fps: Option<f32>,

    /// Treat the user as preferring reduced motion; selects the gradient.
    #[arg(long)]
    pub reduced_motion: bool,

    /// Backdrop variant: `auto`, `procedural`, or `gradient`.
    #[arg(long, value_name = "VARIANT", value_parser = parse_variant)]
    pub variant: Option<VariantSetting>,

    /// Where to write the stylesheet when the gradient variant is used.
    #[arg(long, value_name = "PATH")]
    pub stylesheet: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the capability probe and print the variant it selects.
    Probe(ProbeArgs),
    /// Render a single frame to a PNG file.
    Still(StillArgs),
    /// Write the gradient stylesheet.
    Css(CssArgs),
    /// Print the resolved configuration directory and file.
    Where,
}

#[derive(Parser, Debug, Default)]
pub struct ProbeArgs {
    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Treat the user as preferring reduced motion.
    #[arg(long)]
    pub reduced_motion: bool,
}

#[derive(Parser, Debug)]
pub struct StillArgs {
    /// Output PNG path.
    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,

    /// Scene time in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0, value_parser = parse_time)]
    pub time: f32,

    /// Image size (defaults to the configured window size).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Variant to render; `auto` asks the capability probe.
    #[arg(long, value_name = "VARIANT", value_parser = parse_variant)]
    pub variant: Option<VariantSetting>,
}

#[derive(Parser, Debug, Default)]
pub struct CssArgs {
    /// Output path; stdout when omitted.
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    parse_surface_size(value).map_err(|err| err.to_string())
}

pub fn parse_variant(value: &str) -> Result<VariantSetting, String> {
    value.parse()
}

pub fn parse_fps(value: &str) -> Result<f32, String> {
    let fps: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid FPS value '{value}'"))?;
    if !fps.is_finite() || fps < 0.0 {
        return Err("FPS must be a non-negative number".to_string());
    }
    Ok(fps)
}

pub fn parse_time(value: &str) -> Result<f32, String> {
    let time: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid time '{value}'; expected seconds"))?;
    if !time.is_finite() || time < 0.0 {
        return Err("time must be a non-negative number of seconds".to_string());
    }
    Ok(time)
}
