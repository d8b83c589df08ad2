//! Gradient backdrop: a static wash plus three radial glows whose opacity
//! pulses on a staggered schedule.
//!
//! The layer description is declarative. Web hosts get it as a stylesheet via
//! [`GradientBackdrop::stylesheet`]; still exports evaluate the same layers on
//! the CPU with [`GradientBackdrop::compose`]. Nothing here touches the GPU.

use std::fmt;
use std::time::Duration;

use glam::Vec2;
use image::{Rgba as Pixel, RgbaImage};

/// Peak-to-trough pulse period of the glow layers.
pub const DEFAULT_PULSE_PERIOD: Duration = Duration::from_secs(2);
/// Delay added per layer so the glows pulse out of phase.
pub const DEFAULT_STAGGER: Duration = Duration::from_secs(1);
/// Opacity at the middle of a pulse.
pub const PULSE_TROUGH: f32 = 0.5;
/// Control points of the pulse easing curve.
pub const PULSE_EASING: [f32; 4] = [0.4, 0.0, 0.6, 1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseTiming {
    pub period: Duration,
    pub stagger: Duration,
}

impl Default for PulseTiming {
    fn default() -> Self {
        Self {
            period: DEFAULT_PULSE_PERIOD,
            stagger: DEFAULT_STAGGER,
        }
    }
}

/// sRGB colour with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0.0);

    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    fn premultiplied(self) -> [f32; 4] {
        let a = self.a.clamp(0.0, 1.0);
        [
            f32::from(self.r) / 255.0 * a,
            f32::from(self.g) / 255.0 * a,
            f32::from(self.b) / 255.0 * a,
            a,
        ]
    }

    fn css(self) -> String {
        if self.a <= 0.0 {
            return "transparent".to_string();
        }
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// `circle at x% y%` glow fading to transparent at `extent` of the
/// farthest-corner radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialLayer {
    /// Centre as a fraction of width and height.
    pub center: Vec2,
    pub color: Rgba,
    pub extent: f32,
    pub delay: Duration,
}

impl RadialLayer {
    /// Premultiplied colour at `point` (pixels) in a `size` box.
    fn sample(&self, point: Vec2, size: Vec2) -> [f32; 4] {
        let center = self.center * size;
        let corners = [
            Vec2::ZERO,
            Vec2::new(size.x, 0.0),
            Vec2::new(0.0, size.y),
            size,
        ];
        let radius = corners
            .iter()
            .map(|corner| corner.distance(center))
            .fold(0.0_f32, f32::max);
        let stop = radius * self.extent;
        if stop <= 0.0 {
            return [0.0; 4];
        }
        let t = (point.distance(center) / stop).clamp(0.0, 1.0);
        lerp4(
            self.color.premultiplied(),
            Rgba::TRANSPARENT.premultiplied(),
            t,
        )
    }
}

/// Layered description of the gradient variant.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientBackdrop {
    timing: PulseTiming,
    wash: [Rgba; 3],
    layers: Vec<RadialLayer>,
}

impl GradientBackdrop {
    pub fn new(timing: PulseTiming) -> Self {
        let layers = [
            (Vec2::new(0.3, 0.3), Rgba::new(56, 189, 248, 0.3), 0.5),
            (Vec2::new(0.7, 0.7), Rgba::new(168, 85, 247, 0.3), 0.5),
            (Vec2::new(0.5, 0.5), Rgba::new(6, 182, 212, 0.2), 0.6),
        ]
        .into_iter()
        .enumerate()
        .map(|(index, (center, color, extent))| RadialLayer {
            center,
            color,
            extent,
            delay: timing.stagger * index as u32,
        })
        .collect();
        Self {
            timing,
            wash: [
                Rgba::new(30, 58, 138, 0.2),
                Rgba::new(88, 28, 135, 0.2),
                Rgba::new(22, 78, 99, 0.2),
            ],
            layers,
        }
    }

    pub fn layers(&self) -> &[RadialLayer] {
        &self.layers
    }

    /// Opacity of `layer` at `elapsed` seconds since mount.
    pub fn opacity_at(&self, layer: &RadialLayer, elapsed: f32) -> f32 {
        let local = elapsed - layer.delay.as_secs_f32();
        let period = self.timing.period.as_secs_f32();
        if local < 0.0 || period <= 0.0 {
            return 1.0;
        }
        let phase = (local / period).fract();
        let [x1, y1, x2, y2] = PULSE_EASING;
        if phase < 0.5 {
            let eased = cubic_bezier(x1, y1, x2, y2, phase * 2.0);
            1.0 - (1.0 - PULSE_TROUGH) * eased
        } else {
            let eased = cubic_bezier(x1, y1, x2, y2, (phase - 0.5) * 2.0);
            PULSE_TROUGH + (1.0 - PULSE_TROUGH) * eased
        }
    }

    /// CSS for a `.lavalamp-backdrop` container with one child per glow.
    pub fn stylesheet(&self) -> String {
        Stylesheet(self).to_string()
    }

    /// Evaluates every layer at `elapsed` seconds into a straight-alpha image.
    pub fn compose(&self, width: u32, height: u32, elapsed: f32) -> RgbaImage {
        let size = Vec2::new(width.max(1) as f32, height.max(1) as f32);
        let direction = Vec2::new(size.y, size.x).normalize();
        let line_length = (size.x * direction.x).abs() + (size.y * direction.y).abs();
        let opacities: Vec<f32> = self
            .layers
            .iter()
            .map(|layer| self.opacity_at(layer, elapsed))
            .collect();
        let wash = self.wash.map(Rgba::premultiplied);

        RgbaImage::from_fn(width, height, |x, y| {
            let point = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let along = (point - size * 0.5).dot(direction) / line_length + 0.5;
            let mut color = wash_at(&wash, along.clamp(0.0, 1.0));
            for (layer, opacity) in self.layers.iter().zip(&opacities) {
                let glow = layer.sample(point, size).map(|channel| channel * opacity);
                color = over(glow, color);
            }
            to_pixel(color)
        })
    }
}

impl Default for GradientBackdrop {
    fn default() -> Self {
        Self::new(PulseTiming::default())
    }
}

struct Stylesheet<'a>(&'a GradientBackdrop);

impl fmt::Display for Stylesheet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backdrop = self.0;
        let period = backdrop.timing.period.as_secs_f32();
        let [x1, y1, x2, y2] = PULSE_EASING;
        let [start, middle, end] = &backdrop.wash;
        writeln!(f, ".lavalamp-backdrop {{")?;
        writeln!(f, "  position: absolute;")?;
        writeln!(f, "  inset: 0;")?;
        writeln!(f, "  overflow: hidden;")?;
        writeln!(
            f,
            "  background-image: linear-gradient(to bottom right, {}, {}, {});",
            start.css(),
            middle.css(),
            end.css()
        )?;
        writeln!(f, "}}\n")?;
        for (index, layer) in backdrop.layers.iter().enumerate() {
            writeln!(f, ".lavalamp-backdrop > .glow-{} {{", index + 1)?;
            writeln!(f, "  position: absolute;")?;
            writeln!(f, "  inset: 0;")?;
            writeln!(
                f,
                "  background-image: radial-gradient(circle at {}% {}%, {}, transparent {}%);",
                percent(layer.center.x),
                percent(layer.center.y),
                layer.color.css(),
                percent(layer.extent)
            )?;
            writeln!(
                f,
                "  animation: lavalamp-pulse {period}s cubic-bezier({x1}, {y1}, {x2}, {y2}) infinite;"
            )?;
            writeln!(f, "  animation-delay: {}s;", layer.delay.as_secs_f32())?;
            writeln!(f, "}}\n")?;
        }
        writeln!(f, "@keyframes lavalamp-pulse {{")?;
        writeln!(f, "  0%, 100% {{ opacity: 1; }}")?;
        writeln!(f, "  50% {{ opacity: {PULSE_TROUGH}; }}")?;
        writeln!(f, "}}")
    }
}

fn percent(fraction: f32) -> f32 {
    (fraction * 100.0).round()
}

fn lerp4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}

fn wash_at(stops: &[[f32; 4]; 3], t: f32) -> [f32; 4] {
    if t < 0.5 {
        lerp4(stops[0], stops[1], t * 2.0)
    } else {
        lerp4(stops[1], stops[2], (t - 0.5) * 2.0)
    }
}

/// Porter-Duff source-over on premultiplied colours.
fn over(src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
    let keep = 1.0 - src[3];
    std::array::from_fn(|i| src[i] + dst[i] * keep)
}

fn to_pixel(premultiplied: [f32; 4]) -> Pixel<u8> {
    let alpha = premultiplied[3].clamp(0.0, 1.0);
    let unpremultiply = |channel: f32| {
        if alpha > 0.0 {
            (channel / alpha).clamp(0.0, 1.0)
        } else {
            0.0
        }
    };
    Pixel([
        (unpremultiply(premultiplied[0]) * 255.0).round() as u8,
        (unpremultiply(premultiplied[1]) * 255.0).round() as u8,
        (unpremultiply(premultiplied[2]) * 255.0).round() as u8,
        (alpha * 255.0).round() as u8,
    ])
}

/// CSS `cubic-bezier(x1, y1, x2, y2)` evaluated at input progress `x`.
fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32, x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    let curve = |a: f32, b: f32, s: f32| {
        let inv = 1.0 - s;
        3.0 * inv * inv * s * a + 3.0 * inv * s * s * b + s * s * s
    };
    let slope = |a: f32, b: f32, s: f32| {
        let inv = 1.0 - s;
        3.0 * inv * inv * a + 6.0 * inv * s * (b - a) + 3.0 * s * s * (1.0 - b)
    };

    let mut s = x;
    for _ in 0..8 {
        let error = curve(x1, x2, s) - x;
        if error.abs() < 1e-6 {
            return curve(y1, y2, s);
        }
        let derivative = slope(x1, x2, s);
        if derivative.abs() < 1e-6 {
            break;
        }
        s = (s - error / derivative).clamp(0.0, 1.0);
    }

    let (mut low, mut high) = (0.0_f32, 1.0_f32);
    s = x;
    for _ in 0..32 {
        let value = curve(x1, x2, s);
        if (value - x).abs() < 1e-6 {
            break;
        }
        if value < x {
            low = s;
        } else {
            high = s;
        }
        s = (low + high) * 0.5;
    }
    curve(y1, y2, s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn layers_are_staggered_by_one_second() {
        let backdrop = GradientBackdrop::default();
        let delays: Vec<_> = backdrop.layers().iter().map(|layer| layer.delay).collect();
        assert_eq!(
            delays,
            vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(2)
            ]
        );
    }

    #[test]
    fn pulse_hits_keyframes() {
        let backdrop = GradientBackdrop::default();
        let first = backdrop.layers()[0];
        assert!(close(backdrop.opacity_at(&first, 0.0), 1.0));
        assert!(close(backdrop.opacity_at(&first, 1.0), PULSE_TROUGH));
        assert!(close(backdrop.opacity_at(&first, 2.0), 1.0));
        assert!(close(backdrop.opacity_at(&first, 3.0), PULSE_TROUGH));
        let quarter = backdrop.opacity_at(&first, 0.5);
        assert!(quarter < 1.0 && quarter > PULSE_TROUGH);
    }

    #[test]
    fn delayed_layers_hold_full_opacity() {
        let backdrop = GradientBackdrop::default();
        let third = backdrop.layers()[2];
        assert_eq!(backdrop.opacity_at(&third, 0.0), 1.0);
        assert_eq!(backdrop.opacity_at(&third, 1.9), 1.0);
        assert!(close(backdrop.opacity_at(&third, 3.0), PULSE_TROUGH));
    }

    #[test]
    fn easing_is_symmetric_and_monotonic() {
        let [x1, y1, x2, y2] = PULSE_EASING;
        assert!(close(cubic_bezier(x1, y1, x2, y2, 0.0), 0.0));
        assert!(close(cubic_bezier(x1, y1, x2, y2, 0.5), 0.5));
        assert!(close(cubic_bezier(x1, y1, x2, y2, 1.0), 1.0));
        let mut previous = 0.0;
        for step in 1..=20 {
            let value = cubic_bezier(x1, y1, x2, y2, step as f32 / 20.0);
            assert!(value >= previous - 1e-5);
            previous = value;
        }
    }

    #[test]
    fn custom_timing_changes_period_and_stagger() {
        let backdrop = GradientBackdrop::new(PulseTiming {
            period: Duration::from_secs(4),
            stagger: Duration::from_millis(500),
        });
        assert_eq!(backdrop.layers()[1].delay, Duration::from_millis(500));
        let first = backdrop.layers()[0];
        assert!(close(backdrop.opacity_at(&first, 2.0), PULSE_TROUGH));
    }

    #[test]
    fn stylesheet_describes_layers_and_keyframes() {
        let css = GradientBackdrop::default().stylesheet();
        assert!(css.contains("@keyframes lavalamp-pulse"));
        assert!(css.contains("radial-gradient(circle at 30% 30%, rgba(56, 189, 248, 0.3), transparent 50%)"));
        assert!(css.contains("radial-gradient(circle at 70% 70%, rgba(168, 85, 247, 0.3), transparent 50%)"));
        assert!(css.contains("radial-gradient(circle at 50% 50%, rgba(6, 182, 212, 0.2), transparent 60%)"));
        assert!(css.contains("cubic-bezier(0.4, 0, 0.6, 1) infinite"));
        assert!(css.contains("animation-delay: 2s;"));
        assert!(css.contains("50% { opacity: 0.5; }"));
        assert!(css.starts_with(".lavalamp-backdrop {\n"));
        assert!(css.ends_with("}\n"));
        assert_eq!(css.matches("animation-delay:").count(), 3);
    }

    #[test]
    fn composed_image_is_translucent() {
        let image = GradientBackdrop::default().compose(64, 36, 0.0);
        assert_eq!(image.dimensions(), (64, 36));
        for pixel in image.pixels() {
            assert!(pixel[3] > 0, "wash covers every pixel");
            assert!(pixel[3] < 255, "backdrop never becomes opaque");
        }
    }

    #[test]
    fn glow_is_strongest_at_its_centre() {
        let image = GradientBackdrop::default().compose(100, 100, 0.0);
        let near = image.get_pixel(30, 30)[3];
        let far = image.get_pixel(99, 0)[3];
        assert!(near > far);
    }

    #[test]
    fn source_over_keeps_opaque_source() {
        let result = over([1.0, 0.0, 0.0, 1.0], [0.0, 0.5, 0.0, 0.5]);
        assert_eq!(result, [1.0, 0.0, 0.0, 1.0]);
    }
}
