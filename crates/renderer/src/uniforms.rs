use glam::Vec2;

use crate::types::SurfaceSize;

/// Viewport dimensions plus the aspect-correction pair that keeps the
/// scene isotropic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportResolution {
    pub width: f32,
    pub height: f32,
    pub aspect_x: f32,
    pub aspect_y: f32,
}

impl ViewportResolution {
    /// Portrait viewports shrink x, landscape (and square) ones shrink y.
    pub fn from_size(width: u32, height: u32) -> Self {
        let width = width.max(1) as f32;
        let height = height.max(1) as f32;
        let (aspect_x, aspect_y) = if height / width > 1.0 {
            (width / height, 1.0)
        } else {
            (1.0, height / width)
        };
        Self {
            width,
            height,
            aspect_x,
            aspect_y,
        }
    }

    pub fn aspect(&self) -> Vec2 {
        Vec2::new(self.aspect_x, self.aspect_y)
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.width, self.height, self.aspect_x, self.aspect_y]
    }
}

impl From<SurfaceSize> for ViewportResolution {
    fn from(size: SurfaceSize) -> Self {
        Self::from_size(size.width, size.height)
    }
}

/// Per-frame inputs of the blob shader, owned by the mounted procedural
/// variant and rewritten before every draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderUniforms {
    pub elapsed_time: f32,
    pub viewport_resolution: ViewportResolution,
}

impl ShaderUniforms {
    pub fn new(viewport_resolution: ViewportResolution) -> Self {
        Self {
            elapsed_time: 0.0,
            viewport_resolution,
        }
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.elapsed_time = seconds;
    }

    pub fn set_resolution(&mut self, size: SurfaceSize) {
        self.viewport_resolution = ViewportResolution::from(size);
    }
}
