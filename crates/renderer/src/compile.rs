use std::borrow::Cow;

use glam::Vec3;
use wgpu::naga::ShaderStage;

use crate::scene;

fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    source: Cow<'static, str>,
    stage: ShaderStage,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: source,
            stage,
            defines: &[],
        },
    })
}

/// Compiles the static full-screen triangle vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    compile_glsl(
        device,
        "fullscreen triangle vertex",
        Cow::Borrowed(VERTEX_SHADER_GLSL),
        ShaderStage::Vertex,
    )
}

/// Compiles a blob fragment program, normally the output of [`fragment_source`].
pub(crate) fn compile_fragment_shader(device: &wgpu::Device, source: &str) -> wgpu::ShaderModule {
    compile_glsl(
        device,
        "lavalamp blob fragment",
        Cow::Owned(source.to_owned()),
        ShaderStage::Fragment,
    )
}

/// Compiles the vertex and fragment stages that upscale the offscreen frame
/// onto the swapchain.
pub(crate) fn compile_blit_shaders(
    device: &wgpu::Device,
) -> (wgpu::ShaderModule, wgpu::ShaderModule) {
    let vertex = compile_glsl(
        device,
        "blit vertex",
        Cow::Borrowed(BLIT_VERTEX_GLSL),
        ShaderStage::Vertex,
    );
    let fragment = compile_glsl(
        device,
        "blit fragment",
        Cow::Borrowed(BLIT_FRAGMENT_GLSL),
        ShaderStage::Fragment,
    );
    (vertex, fragment)
}

/// GLSL for the ray-marched blob.
///
/// Scene constants come from [`crate::scene`] so the GPU program and the CPU
/// mirror cannot drift apart. The uniform block layout must match
/// `gpu::uniforms::BlobUniforms`. Output colour is premultiplied.
pub fn fragment_source() -> String {
    let first = scene::FIRST_SPHERE;
    let second = scene::SECOND_SPHERE;
    format!(
        r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform BlobParams {{
    vec4 resolution;
    float time;
}} params;

const float MAX_DISTANCE = {max_distance};
const float HIT_EPSILON = {hit_epsilon};
const float NORMAL_EPSILON = {normal_epsilon};
const float BLEND_RADIUS = {blend_radius};
const float VIEW_EXTENT = {view_extent};
const vec3 CAMERA_POSITION = {camera};
const vec3 BACKGROUND_COLOR = {background};
const float BACKGROUND_ALPHA = {background_alpha};
const vec3 FACING_COLOR = {facing};
const vec3 GRAZING_COLOR = {grazing};
const float SURFACE_ALPHA = {surface_alpha};

mat3 rotationMatrix(vec3 axis, float angle) {{
    float s = sin(angle);
    float c = cos(angle);
    float oc = 1.0 - c;
    return mat3(
        oc * axis.x * axis.x + c, oc * axis.x * axis.y - axis.z * s, oc * axis.z * axis.x + axis.y * s,
        oc * axis.x * axis.y + axis.z * s, oc * axis.y * axis.y + c, oc * axis.y * axis.z - axis.x * s,
        oc * axis.z * axis.x - axis.y * s, oc * axis.y * axis.z + axis.x * s, oc * axis.z * axis.z + c
    );
}}

float smin(float a, float b, float k) {{
    float h = max(k - abs(a - b), 0.0) / k;
    return min(a, b) - h * h * h * k * (1.0 / 6.0);
}}

float sphereSDF(vec3 p, float radius) {{
    return length(p) - radius;
}}

float sceneSDF(vec3 p) {{
    vec3 p1 = rotationMatrix({first_axis}, params.time * {first_rate}) * p;
    vec3 p2 = rotationMatrix({second_axis}, params.time * {second_rate}) * p;
    float d1 = sphereSDF(p1 - {first_offset}, {first_radius});
    float d2 = sphereSDF(p2 - {second_offset}, {second_radius});
    return smin(d1, d2, BLEND_RADIUS);
}}

float rayMarch(vec3 origin, vec3 direction) {{
    float travelled = 0.0;
    for (int i = 0; i < {max_steps}; i++) {{
        float d = sceneSDF(origin + direction * travelled);
        if (d < HIT_EPSILON) {{
            return travelled;
        }}
        travelled += d;
        if (travelled > MAX_DISTANCE) {{
            break;
        }}
    }}
    return -1.0;
}}

vec3 estimateNormal(vec3 p) {{
    vec3 dx = vec3(NORMAL_EPSILON, 0.0, 0.0);
    vec3 dy = vec3(0.0, NORMAL_EPSILON, 0.0);
    vec3 dz = vec3(0.0, 0.0, NORMAL_EPSILON);
    return normalize(vec3(
        sceneSDF(p + dx) - sceneSDF(p - dx),
        sceneSDF(p + dy) - sceneSDF(p - dy),
        sceneSDF(p + dz) - sceneSDF(p - dz)
    ));
}}

void main() {{
    vec2 centered = (v_uv - vec2(0.5)) * VIEW_EXTENT * params.resolution.zw;
    vec3 ray = normalize(vec3(centered, -1.0));
    float hit = rayMarch(CAMERA_POSITION, ray);

    vec4 color = vec4(BACKGROUND_COLOR, BACKGROUND_ALPHA);
    if (hit >= 0.0) {{
        vec3 normal = estimateNormal(CAMERA_POSITION + ray * hit);
        float fresnel = pow(1.0 + dot(ray, normal), 2.0);
        color = vec4(mix(FACING_COLOR, GRAZING_COLOR, fresnel), SURFACE_ALPHA);
    }}
    outColor = vec4(color.rgb * color.a, color.a);
}}
",
        max_steps = scene::MAX_MARCH_STEPS,
        max_distance = glsl_float(scene::MAX_MARCH_DISTANCE),
        hit_epsilon = glsl_float(scene::HIT_EPSILON),
        normal_epsilon = glsl_float(scene::NORMAL_EPSILON),
        blend_radius = glsl_float(scene::BLEND_RADIUS),
        view_extent = glsl_float(scene::VIEW_EXTENT),
        camera = glsl_vec3(scene::CAMERA_POSITION),
        background = glsl_vec3(scene::BACKGROUND_COLOR),
        background_alpha = glsl_float(scene::BACKGROUND_ALPHA),
        facing = glsl_vec3(scene::FACING_COLOR),
        grazing = glsl_vec3(scene::GRAZING_COLOR),
        surface_alpha = glsl_float(scene::SURFACE_ALPHA),
        first_axis = glsl_vec3(first.axis),
        first_rate = glsl_float(first.angular_rate),
        first_offset = glsl_vec3(first.offset),
        first_radius = glsl_float(first.radius),
        second_axis = glsl_vec3(second.axis),
        second_rate = glsl_float(second.angular_rate),
        second_offset = glsl_vec3(second.offset),
        second_radius = glsl_float(second.radius),
    )
}

/// `Debug` keeps the decimal point GLSL needs for float literals.
fn glsl_float(value: f32) -> String {
    format!("{value:?}")
}

fn glsl_vec3(value: Vec3) -> String {
    format!(
        "vec3({}, {}, {})",
        glsl_float(value.x),
        glsl_float(value.y),
        glsl_float(value.z)
    )
}

/// Minimal full-screen triangle vertex shader.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

// Texture rows run top-down, so v is flipped relative to the blob's v_uv.
const BLIT_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_texcoord;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    vec2 pos = positions[uint(gl_VertexIndex)];
    v_texcoord = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

const BLIT_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_texcoord;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D frame_texture;
layout(set = 0, binding = 1) uniform sampler frame_sampler;

void main() {
    outColor = texture(sampler2D(frame_texture, frame_sampler), v_texcoord);
}
";
