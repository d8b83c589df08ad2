use bytemuck::{Pod, Zeroable};

use crate::uniforms::ShaderUniforms;

/// std140 image of the `BlobParams` block in the fragment shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct BlobUniforms {
    pub resolution: [f32; 4],
    pub time: f32,
    pub _padding: [f32; 3],
}

impl From<&ShaderUniforms> for BlobUniforms {
    fn from(uniforms: &ShaderUniforms) -> Self {
        Self {
            resolution: uniforms.viewport_resolution.as_array(),
            time: uniforms.elapsed_time,
            _padding: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::ViewportResolution;

    #[test]
    fn layout_is_std140_sized() {
        assert_eq!(std::mem::size_of::<BlobUniforms>(), 32);
    }

    #[test]
    fn converts_host_uniforms() {
        let mut host = ShaderUniforms::new(ViewportResolution::from_size(1280, 720));
        host.set_time(4.25);
        let gpu = BlobUniforms::from(&host);
        assert_eq!(gpu.resolution, [1280.0, 720.0, 1.0, 0.5625]);
        assert_eq!(gpu.time, 4.25);
        assert_eq!(&bytemuck::bytes_of(&gpu)[16..20], &4.25_f32.to_ne_bytes());
    }
}
