//! CPU frame target used for still exports.

use std::path::Path;
use std::time::Instant;

use glam::Vec2;
use image::{Rgba, RgbaImage};
use tracing::info;

use crate::backdrop::{FrameTarget, ProceduralBackdrop, RenderError};
use crate::gradient::{GradientBackdrop, PulseTiming};
use crate::runtime::{time_source_for_policy, RenderPolicy};
use crate::scene;
use crate::types::{RendererVariant, SurfaceSize};
use crate::uniforms::ShaderUniforms;

/// Evaluates the blob shader per pixel into an image buffer.
#[derive(Debug, Clone)]
pub struct SoftwareCanvas {
    image: RgbaImage,
}

impl SoftwareCanvas {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            image: RgbaImage::new(size.width, size.height),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl FrameTarget for SoftwareCanvas {
    fn size(&self) -> SurfaceSize {
        let (width, height) = self.image.dimensions();
        SurfaceSize::new(width, height)
    }

    fn resize(&mut self, size: SurfaceSize) {
        if self.size() != size {
            self.image = RgbaImage::new(size.width, size.height);
        }
    }

    fn draw(&mut self, uniforms: &ShaderUniforms) -> Result<(), RenderError> {
        let (width, height) = self.image.dimensions();
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        for (x, y, pixel) in self.image.enumerate_pixels_mut() {
            // Image rows run top-down; shader uv has its origin bottom-left.
            let uv = Vec2::new((x as f32 + 0.5) / w, 1.0 - (y as f32 + 0.5) / h);
            let [r, g, b, a] = scene::shade(uv, uniforms);
            *pixel = Rgba([to_byte(r), to_byte(g), to_byte(b), to_byte(a)]);
        }
        Ok(())
    }
}

fn to_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Renders one frame of `variant` at `time` seconds.
pub fn render_still(
    variant: RendererVariant,
    size: SurfaceSize,
    time: f32,
    pulse: PulseTiming,
) -> Result<RgbaImage, RenderError> {
    match variant {
        RendererVariant::Procedural => {
            let mut backdrop = ProceduralBackdrop::mount(
                SoftwareCanvas::new(size),
                time_source_for_policy(&RenderPolicy::Still { time }),
                None,
            );
            backdrop.frame(Instant::now())?;
            Ok(backdrop
                .into_target()
                .map(SoftwareCanvas::into_image)
                .unwrap_or_else(|| RgbaImage::new(size.width, size.height)))
        }
        RendererVariant::CssFallback => {
            Ok(GradientBackdrop::new(pulse).compose(size.width, size.height, time))
        }
    }
}

/// Renders one frame of `variant` and writes it to `path` as PNG.
pub fn export_still(
    variant: RendererVariant,
    size: SurfaceSize,
    time: f32,
    pulse: PulseTiming,
    path: &Path,
) -> Result<(), RenderError> {
    let image = render_still(variant, size, time, pulse)?;
    image.save_with_format(path, image::ImageFormat::Png)?;
    info!(%variant, %size, time, path = %path.display(), "still frame written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_resizes_its_buffer() {
        let mut canvas = SoftwareCanvas::new(SurfaceSize::new(4, 4));
        canvas.resize(SurfaceSize::new(8, 2));
        assert_eq!(canvas.image().dimensions(), (8, 2));
    }

    #[test]
    fn procedural_still_shows_blob_over_background() {
        let image = render_still(
            RendererVariant::Procedural,
            SurfaceSize::new(64, 36),
            0.0,
            PulseTiming::default(),
        )
        .unwrap();
        let background = to_byte(scene::BACKGROUND_ALPHA);
        let surface = to_byte(scene::SURFACE_ALPHA);
        assert_eq!(image.get_pixel(0, 0)[3], background);
        assert!(image.pixels().any(|pixel| pixel[3] == surface));
    }

    #[test]
    fn export_writes_png_files() {
        let dir = tempfile::tempdir().unwrap();
        for variant in [RendererVariant::Procedural, RendererVariant::CssFallback] {
            let path = dir.path().join(format!("{variant}.png"));
            export_still(
                variant,
                SurfaceSize::new(32, 18),
                1.5,
                PulseTiming::default(),
                &path,
            )
            .unwrap();
            let decoded = image::open(&path).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (32, 18));
        }
    }
}
