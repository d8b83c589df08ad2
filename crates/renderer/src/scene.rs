//! CPU mirror of the blob fragment shader.
//!
//! Every constant here is also spliced into the GLSL program by
//! `compile::fragment_source`, so the two paths draw the same picture. The
//! CPU path backs still exports and the tests.

use glam::{Vec2, Vec3};

use crate::uniforms::ShaderUniforms;

/// Upper bound on sphere-tracing iterations per ray.
pub const MAX_MARCH_STEPS: u32 = 50;
/// Distance along the ray after which the march gives up.
pub const MAX_MARCH_DISTANCE: f32 = 50.0;
/// Field value treated as a surface hit.
pub const HIT_EPSILON: f32 = 0.01;
/// Central-difference step for the normal estimate.
pub const NORMAL_EPSILON: f32 = 0.01;
/// Blend radius for the smooth minimum between the two spheres.
pub const BLEND_RADIUS: f32 = 0.15;
/// Fraction of the unit quad that maps onto the viewport.
pub const VIEW_EXTENT: f32 = 0.4;

pub const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 0.0, 3.0);

pub const FIRST_SPHERE: Sphere = Sphere {
    offset: Vec3::new(-0.3, 0.0, 0.0),
    radius: 0.4,
    axis: Vec3::Z,
    angular_rate: 0.2,
};

pub const SECOND_SPHERE: Sphere = Sphere {
    offset: Vec3::new(0.4, 0.0, 0.0),
    radius: 0.3,
    axis: Vec3::X,
    angular_rate: -0.3,
};

pub const BACKGROUND_COLOR: Vec3 = Vec3::new(0.1, 0.1, 0.2);
pub const BACKGROUND_ALPHA: f32 = 0.1;
pub const FACING_COLOR: Vec3 = Vec3::new(0.2, 0.4, 0.8);
pub const GRAZING_COLOR: Vec3 = Vec3::new(0.6, 0.3, 0.9);
pub const SURFACE_ALPHA: f32 = 0.4;

/// A sphere that orbits the origin by rotating the sample point about `axis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub offset: Vec3,
    pub radius: f32,
    pub axis: Vec3,
    /// Radians per second; the sign picks the direction.
    pub angular_rate: f32,
}

impl Sphere {
    pub fn distance(&self, p: Vec3, time: f32) -> f32 {
        let local = rotate(p, self.axis, self.angular_rate * time);
        sphere_sdf(local - self.offset, self.radius)
    }
}

/// Polynomial smooth minimum. Never exceeds `min(a, b)` for `k > 0`.
pub fn smin(a: f32, b: f32, k: f32) -> f32 {
    if k <= 0.0 {
        return a.min(b);
    }
    let h = (k - (a - b).abs()).max(0.0) / k;
    a.min(b) - h * h * h * k * (1.0 / 6.0)
}

pub fn sphere_sdf(p: Vec3, radius: f32) -> f32 {
    p.length() - radius
}

/// Rodrigues rotation written out the way the shader computes it, so the
/// handedness matches on both paths.
pub fn rotate(v: Vec3, axis: Vec3, angle: f32) -> Vec3 {
    let (s, c) = angle.sin_cos();
    let oc = 1.0 - c;
    Vec3::new(
        oc * axis.x * axis.x + c,
        oc * axis.x * axis.y - axis.z * s,
        oc * axis.z * axis.x + axis.y * s,
    ) * v.x
        + Vec3::new(
            oc * axis.x * axis.y + axis.z * s,
            oc * axis.y * axis.y + c,
            oc * axis.y * axis.z - axis.x * s,
        ) * v.y
        + Vec3::new(
            oc * axis.z * axis.x - axis.y * s,
            oc * axis.y * axis.z + axis.x * s,
            oc * axis.z * axis.z + c,
        ) * v.z
}

/// Signed distance to the blended pair of spheres at `time`.
pub fn scene_sdf(p: Vec3, time: f32) -> f32 {
    smin(
        FIRST_SPHERE.distance(p, time),
        SECOND_SPHERE.distance(p, time),
        BLEND_RADIUS,
    )
}

pub fn estimate_normal(p: Vec3, time: f32) -> Vec3 {
    let dx = Vec3::new(NORMAL_EPSILON, 0.0, 0.0);
    let dy = Vec3::new(0.0, NORMAL_EPSILON, 0.0);
    let dz = Vec3::new(0.0, 0.0, NORMAL_EPSILON);
    Vec3::new(
        scene_sdf(p + dx, time) - scene_sdf(p - dx, time),
        scene_sdf(p + dy, time) - scene_sdf(p - dy, time),
        scene_sdf(p + dz, time) - scene_sdf(p - dz, time),
    )
    .normalize_or_zero()
}

/// Outcome of a single march.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchResult {
    /// Distance along the ray to the surface, if it converged.
    pub hit: Option<f32>,
    /// Field evaluations performed; never more than [`MAX_MARCH_STEPS`].
    pub steps: u32,
}

/// Sphere-traces `scene_sdf` from `origin` along `direction`.
pub fn ray_march(origin: Vec3, direction: Vec3, time: f32) -> MarchResult {
    let mut travelled = 0.0_f32;
    for step in 0..MAX_MARCH_STEPS {
        let distance = scene_sdf(origin + direction * travelled, time);
        if distance < HIT_EPSILON {
            return MarchResult {
                hit: Some(travelled),
                steps: step + 1,
            };
        }
        travelled += distance;
        if travelled > MAX_MARCH_DISTANCE {
            return MarchResult {
                hit: None,
                steps: step + 1,
            };
        }
    }
    MarchResult {
        hit: None,
        steps: MAX_MARCH_STEPS,
    }
}

/// Camera ray through a normalised surface coordinate (origin bottom-left).
pub fn camera_ray(uv: Vec2, aspect: Vec2) -> Vec3 {
    let centered = (uv - Vec2::splat(0.5)) * VIEW_EXTENT * aspect;
    Vec3::new(centered.x, centered.y, -1.0).normalize()
}

/// Straight-alpha RGBA for one pixel.
pub fn shade(uv: Vec2, uniforms: &ShaderUniforms) -> [f32; 4] {
    let time = uniforms.elapsed_time;
    let ray = camera_ray(uv, uniforms.viewport_resolution.aspect());
    match ray_march(CAMERA_POSITION, ray, time).hit {
        Some(distance) => {
            let normal = estimate_normal(CAMERA_POSITION + ray * distance, time);
            let fresnel = (1.0 + ray.dot(normal)).powf(2.0);
            let color = FACING_COLOR.lerp(GRAZING_COLOR, fresnel);
            [color.x, color.y, color.z, SURFACE_ALPHA]
        }
        None => [
            BACKGROUND_COLOR.x,
            BACKGROUND_COLOR.y,
            BACKGROUND_COLOR.z,
            BACKGROUND_ALPHA,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::ViewportResolution;

    #[test]
    fn smin_never_exceeds_min() {
        let samples = [-2.0, -0.5, -0.1, 0.0, 0.05, 0.1, 0.3, 1.0, 4.0];
        for &a in &samples {
            for &b in &samples {
                for k in [0.01, 0.15, 0.5, 2.0] {
                    assert!(smin(a, b, k) <= a.min(b) + 1e-6, "smin({a}, {b}, {k})");
                }
            }
        }
    }

    #[test]
    fn smin_converges_to_min_as_k_shrinks() {
        let (a, b) = (0.2_f32, 0.25_f32);
        let mut previous_gap = f32::MAX;
        for k in [0.5, 0.1, 0.01, 0.001] {
            let gap = (a.min(b) - smin(a, b, k)).abs();
            assert!(gap <= previous_gap);
            previous_gap = gap;
        }
        assert!(previous_gap < 1e-4);
        assert_eq!(smin(a, b, 0.0), a.min(b));
    }

    #[test]
    fn smin_is_plain_min_when_far_apart() {
        assert_eq!(smin(0.0, 1.0, BLEND_RADIUS), 0.0);
    }

    #[test]
    fn rotation_preserves_length_and_axis() {
        let v = Vec3::new(0.3, -0.7, 0.2);
        let rotated = rotate(v, Vec3::Z, 1.1);
        assert!((rotated.length() - v.length()).abs() < 1e-5);
        assert!((rotated.z - v.z).abs() < 1e-6);
        let quarter = rotate(Vec3::X, Vec3::Z, std::f32::consts::FRAC_PI_2);
        assert!(quarter.abs_diff_eq(Vec3::new(0.0, -1.0, 0.0), 1e-5));
    }

    #[test]
    fn march_is_bounded_for_any_direction() {
        let directions = [
            Vec3::Z,
            Vec3::NEG_Z,
            Vec3::X,
            Vec3::new(0.05, 0.05, -1.0).normalize(),
            Vec3::new(0.9, 0.9, -0.1).normalize(),
        ];
        for time in [0.0, 3.7, 1000.0] {
            for direction in directions {
                let result = ray_march(CAMERA_POSITION, direction, time);
                assert!(result.steps <= MAX_MARCH_STEPS);
            }
        }
    }

    #[test]
    fn march_stops_early_on_hit() {
        let result = ray_march(CAMERA_POSITION, Vec3::new(-0.1, 0.0, -1.0).normalize(), 0.0);
        let distance = result.hit.expect("ray through the first sphere hits");
        assert!(result.steps < MAX_MARCH_STEPS);
        let point = CAMERA_POSITION + Vec3::new(-0.1, 0.0, -1.0).normalize() * distance;
        assert!(scene_sdf(point, 0.0) < HIT_EPSILON);
    }

    #[test]
    fn march_misses_away_from_scene() {
        let result = ray_march(CAMERA_POSITION, Vec3::Z, 0.0);
        assert_eq!(result.hit, None);
    }

    #[test]
    fn normals_point_outwards() {
        let point = Vec3::new(-0.3, 0.0, 0.4);
        let normal = estimate_normal(point, 0.0);
        assert!(normal.z > 0.9);
    }

    #[test]
    fn shade_uses_surface_and_background_alpha() {
        let uniforms = ShaderUniforms::new(ViewportResolution::from_size(1280, 720));
        let center = shade(Vec2::new(0.45, 0.5), &uniforms);
        assert_eq!(center[3], SURFACE_ALPHA);
        let corner = shade(Vec2::new(0.0, 0.0), &uniforms);
        assert_eq!(corner[3], BACKGROUND_ALPHA);
        assert_eq!(&corner[..3], &[0.1, 0.1, 0.2]);
    }
}
