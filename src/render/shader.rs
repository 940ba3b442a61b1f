//! WGSL programs for every effect.
//!
//! Bind group 0 layout shared by all programs:
//! - binding 0: uniform block, one `vec4` per scalar/vector parameter and
//!   one `mat4x4` per matrix, in parameter order
//! - binding 1: clamping linear sampler
//! - binding 2: repeating linear sampler
//! - binding 3..: textures in the effect's declared order
//!
//! Scene programs write two targets: colour and linear view depth.

use wgpu::*;

macro_rules! fullscreen_vs {
    () => {
        r#"
struct FullscreenOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> FullscreenOut {
    let x = f32((index << 1u) & 2u) * 2.0 - 1.0;
    let y = f32(index & 2u) * 2.0 - 1.0;
    var out: FullscreenOut;
    out.clip = vec4<f32>(x, y, 0.0, 1.0);
    out.uv = vec2<f32>(x * 0.5 + 0.5, 0.5 - y * 0.5);
    return out;
}
"#
    };
}

macro_rules! mesh_vs {
    () => {
        r#"
struct MeshIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct MeshOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) world_pos: vec3<f32>,
    @location(2) view_z: f32,
};

struct SceneOut {
    @location(0) color: vec4<f32>,
    @location(1) depth: vec4<f32>,
};

@group(0) @binding(1) var clamp_sampler: sampler;
@group(0) @binding(2) var repeat_sampler: sampler;

@vertex
fn vs_main(in: MeshIn) -> MeshOut {
    let world = u.world * vec4<f32>(in.position, 1.0);
    let view = u.view * world;
    var out: MeshOut;
    out.clip = u.proj * view;
    out.normal = (u.world * vec4<f32>(in.normal, 0.0)).xyz;
    out.world_pos = world.xyz;
    out.view_z = view.z;
    return out;
}

fn eye_position() -> vec3<f32> {
    let r = mat3x3<f32>(u.view[0].xyz, u.view[1].xyz, u.view[2].xyz);
    return -(transpose(r) * u.view[3].xyz);
}
"#
    };
}

macro_rules! sprite_vs {
    () => {
        r#"
struct Params {
    world: mat4x4<f32>,
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    up: vec4<f32>,
    left: vec4<f32>,
    alpha: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: Params;
@group(0) @binding(1) var clamp_sampler: sampler;
@group(0) @binding(3) var tex: texture_2d<f32>;

struct SpriteIn {
    @location(0) position: vec3<f32>,
    @location(1) size: f32,
    @location(2) corner: vec2<f32>,
};

struct SpriteOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) view_z: f32,
};

@vertex
fn vs_main(in: SpriteIn) -> SpriteOut {
    let offset = (u.left.xyz * in.corner.x + u.up.xyz * in.corner.y) * in.size;
    let world = u.world * vec4<f32>(in.position + offset, 1.0);
    let view = u.view * world;
    var out: SpriteOut;
    out.clip = u.proj * view;
    out.uv = vec2<f32>(in.corner.x * 0.5 + 0.5, 0.5 - in.corner.y * 0.5);
    out.view_z = view.z;
    return out;
}
"#
    };
}

/// Environment-mapped marble bust
pub const BUST: &str = concat!(
    r#"
struct Params {
    world: mat4x4<f32>,
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> u: Params;
@group(0) @binding(3) var env_tex: texture_cube<f32>;
"#,
    mesh_vs!(),
    r#"
@fragment
fn fs_main(in: MeshOut) -> SceneOut {
    let n = normalize(in.normal);
    let i = normalize(in.world_pos - eye_position());
    let diffuse = textureSample(env_tex, clamp_sampler, n).rgb;
    let specular = textureSample(env_tex, clamp_sampler, reflect(i, n)).rgb;
    let fresnel = pow(1.0 - max(dot(-i, n), 0.0), 4.0);
    var out: SceneOut;
    out.color = vec4<f32>(diffuse * 0.8 + specular * (0.1 + 0.6 * fresnel), 1.0);
    out.depth = vec4<f32>(in.view_z, 0.0, 0.0, 1.0);
    return out;
}
"#
);

/// Mirror-like reflective object
pub const CHROME: &str = concat!(
    r#"
struct Params {
    world: mat4x4<f32>,
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> u: Params;
@group(0) @binding(3) var env_tex: texture_cube<f32>;
"#,
    mesh_vs!(),
    r#"
@fragment
fn fs_main(in: MeshOut) -> SceneOut {
    let n = normalize(in.normal);
    let i = normalize(in.world_pos - eye_position());
    let reflected = textureSample(env_tex, clamp_sampler, reflect(i, n)).rgb;
    let fresnel = 0.6 + 0.4 * pow(1.0 - max(dot(-i, n), 0.0), 5.0);
    var out: SceneOut;
    out.color = vec4<f32>(reflected * fresnel * 1.4, 1.0);
    out.depth = vec4<f32>(in.view_z, 0.0, 0.0, 1.0);
    return out;
}
"#
);

/// Point-lit tunnel with volumetric noise
pub const TUNNEL: &str = concat!(
    r#"
struct Params {
    world: mat4x4<f32>,
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    time: vec4<f32>,
    light_position: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: Params;
@group(0) @binding(3) var volume_noise_tex: texture_3d<f32>;
"#,
    mesh_vs!(),
    r#"
@fragment
fn fs_main(in: MeshOut) -> SceneOut {
    let n = normalize(in.normal);
    let to_light = u.light_position.xyz - in.world_pos;
    let dist = length(to_light);
    let l = to_light / max(dist, 0.0001);
    let coord = in.world_pos * 0.01 + vec3<f32>(0.0, 0.0, u.time.x * 0.05);
    let noise = textureSample(volume_noise_tex, repeat_sampler, coord).r;
    let attenuation = 1.0 / (1.0 + dist * dist * 0.0004);
    let lit = max(dot(n, l), 0.0) * attenuation * 3.0 + 0.05;
    var out: SceneOut;
    out.color = vec4<f32>(vec3<f32>(0.9, 0.85, 0.8) * noise * lit, 1.0);
    out.depth = vec4<f32>(in.view_z, 0.0, 0.0, 1.0);
    return out;
}
"#
);

/// Premultiplied particle sprites
pub const CLOUD: &str = concat!(
    sprite_vs!(),
    r#"
struct SceneOut {
    @location(0) color: vec4<f32>,
    @location(1) depth: vec4<f32>,
};

@fragment
fn fs_main(in: SpriteOut) -> SceneOut {
    let texel = textureSample(tex, clamp_sampler, in.uv);
    let a = texel.a * u.alpha.x;
    var out: SceneOut;
    out.color = vec4<f32>(texel.rgb * a, a);
    out.depth = vec4<f32>(in.view_z, 0.0, 0.0, a);
    return out;
}
"#
);

/// Light glows; zero alpha makes premultiplied blending add them
pub const LIGHT: &str = concat!(
    sprite_vs!(),
    r#"
@fragment
fn fs_main(in: SpriteOut) -> @location(0) vec4<f32> {
    let texel = textureSample(tex, clamp_sampler, in.uv);
    return vec4<f32>(texel.rgb * texel.a * u.alpha.x, 0.0);
}
"#
);

/// Depth of field: circle of confusion, two-direction blur, combine
pub const DOF: &str = concat!(
    fullscreen_vs!(),
    r#"
struct Params {
    viewport: vec4<f32>,
    focal_distance: vec4<f32>,
    focal_length: vec4<f32>,
    f_stop: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: Params;
@group(0) @binding(1) var clamp_sampler: sampler;
@group(0) @binding(3) var color_tex: texture_2d<f32>;
@group(0) @binding(4) var depth_tex: texture_2d<f32>;
@group(0) @binding(5) var premult_tex: texture_2d<f32>;
@group(0) @binding(6) var temp1_tex: texture_2d<f32>;
@group(0) @binding(7) var temp2_tex: texture_2d<f32>;

const MAX_COC: f32 = 24.0;
const TAPS: i32 = 12;

fn coc_radius(depth: f32) -> f32 {
    let f = u.focal_length.x;
    let d = u.focal_distance.x;
    let aperture = f / max(u.f_stop.x, 0.01);
    let c = abs(aperture * f * (depth - d) / max(abs(depth * (d - f)), 0.0001));
    return clamp(c * u.viewport.y, 0.0, MAX_COC);
}

@fragment
fn fs_coc(in: FullscreenOut) -> @location(0) vec4<f32> {
    let color = textureSample(color_tex, clamp_sampler, in.uv);
    let depth = textureLoad(depth_tex, vec2<i32>(in.clip.xy), 0).r;
    return vec4<f32>(color.rgb, coc_radius(depth) / MAX_COC);
}

fn blur_along(uv: vec2<f32>, dir: vec2<f32>, radius: f32, center: vec4<f32>) -> vec3<f32> {
    var sum = center.rgb;
    var weight = 1.0;
    let texel = 1.0 / u.viewport.xy;
    for (var i = 1; i <= TAPS; i++) {
        let t = f32(i) / f32(TAPS);
        let s = textureSampleLevel(premult_tex, clamp_sampler, uv + dir * texel * radius * t, 0.0);
        let w = step(t, s.a * MAX_COC / max(radius, 0.0001));
        sum += s.rgb * w;
        weight += w;
    }
    return sum / weight;
}

struct BlurOut {
    @location(0) vertical: vec4<f32>,
    @location(1) diagonal: vec4<f32>,
};

@fragment
fn fs_blur(in: FullscreenOut) -> BlurOut {
    let center = textureSample(premult_tex, clamp_sampler, in.uv);
    let radius = center.a * MAX_COC;
    var out: BlurOut;
    out.vertical = vec4<f32>(blur_along(in.uv, vec2<f32>(0.0, 1.0), radius, center), center.a);
    out.diagonal = vec4<f32>(blur_along(in.uv, vec2<f32>(0.866, -0.5), radius, center), center.a);
    return out;
}

@fragment
fn fs_combine(in: FullscreenOut) -> @location(0) vec4<f32> {
    let a = textureSample(temp1_tex, clamp_sampler, in.uv);
    let b = textureSample(temp2_tex, clamp_sampler, in.uv);
    return vec4<f32>((a.rgb + b.rgb) * 0.5, 1.0);
}
"#
);

/// Edge antialiasing plus bright pass
pub const ANTIALIAS: &str = concat!(
    fullscreen_vs!(),
    r#"
struct Params {
    viewport_inv: vec4<f32>,
    bloom_cutoff: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: Params;
@group(0) @binding(1) var clamp_sampler: sampler;
@group(0) @binding(3) var color_tex: texture_2d<f32>;

fn luma(c: vec3<f32>) -> f32 {
    return dot(c, vec3<f32>(0.299, 0.587, 0.114));
}

struct AntialiasOut {
    @location(0) color: vec4<f32>,
    @location(1) bright: vec4<f32>,
};

@fragment
fn fs_main(in: FullscreenOut) -> AntialiasOut {
    let px = u.viewport_inv.xy;
    let rgb_m = textureSample(color_tex, clamp_sampler, in.uv).rgb;
    let l_nw = luma(textureSample(color_tex, clamp_sampler, in.uv + vec2<f32>(-1.0, -1.0) * px).rgb);
    let l_ne = luma(textureSample(color_tex, clamp_sampler, in.uv + vec2<f32>(1.0, -1.0) * px).rgb);
    let l_sw = luma(textureSample(color_tex, clamp_sampler, in.uv + vec2<f32>(-1.0, 1.0) * px).rgb);
    let l_se = luma(textureSample(color_tex, clamp_sampler, in.uv + vec2<f32>(1.0, 1.0) * px).rgb);
    let l_m = luma(rgb_m);
    let l_min = min(l_m, min(min(l_nw, l_ne), min(l_sw, l_se)));
    let l_max = max(l_m, max(max(l_nw, l_ne), max(l_sw, l_se)));

    var dir = vec2<f32>(-((l_nw + l_ne) - (l_sw + l_se)), (l_nw + l_sw) - (l_ne + l_se));
    let reduce = max((l_nw + l_ne + l_sw + l_se) * 0.03125, 1.0 / 128.0);
    let scale = 1.0 / (min(abs(dir.x), abs(dir.y)) + reduce);
    dir = clamp(dir * scale, vec2<f32>(-8.0), vec2<f32>(8.0)) * px;

    let rgb_a = 0.5 * (textureSampleLevel(color_tex, clamp_sampler, in.uv - dir / 6.0, 0.0).rgb
        + textureSampleLevel(color_tex, clamp_sampler, in.uv + dir / 6.0, 0.0).rgb);
    let rgb_b = rgb_a * 0.5 + 0.25 * (textureSampleLevel(color_tex, clamp_sampler, in.uv - dir * 0.5, 0.0).rgb
        + textureSampleLevel(color_tex, clamp_sampler, in.uv + dir * 0.5, 0.0).rgb);
    let l_b = luma(rgb_b);
    let color = select(rgb_b, rgb_a, l_b < l_min || l_b > l_max);

    var out: AntialiasOut;
    out.color = vec4<f32>(color, 1.0);
    out.bright = vec4<f32>(max(color - vec3<f32>(u.bloom_cutoff.x), vec3<f32>(0.0)), 1.0);
    return out;
}
"#
);

/// Separable gaussian; taps carry (offset.xy, weight)
pub const BLUR: &str = concat!(
    fullscreen_vs!(),
    r#"
struct Params {
    gauss: array<vec4<f32>, 8>,
};

@group(0) @binding(0) var<uniform> u: Params;
@group(0) @binding(1) var clamp_sampler: sampler;
@group(0) @binding(3) var blur_tex: texture_2d<f32>;

@fragment
fn fs_main(in: FullscreenOut) -> @location(0) vec4<f32> {
    var sum = vec4<f32>(0.0);
    for (var i = 0; i < 8; i++) {
        let tap = u.gauss[i];
        sum += textureSampleLevel(blur_tex, clamp_sampler, in.uv + tap.xy, 0.0) * tap.z;
        sum += textureSampleLevel(blur_tex, clamp_sampler, in.uv - tap.xy, 0.0) * tap.z;
    }
    return sum;
}
"#
);

/// Final composite: distortion, bloom, overlay, fade, grain and colour grade
pub const COMPOSITE: &str = concat!(
    fullscreen_vs!(),
    r#"
struct Params {
    viewport: vec4<f32>,
    nscale: vec4<f32>,
    noffs: vec4<f32>,
    flash: vec4<f32>,
    fade: vec4<f32>,
    dist_amt: vec4<f32>,
    dist_freq: vec4<f32>,
    dist_time: vec4<f32>,
    overlay_alpha: vec4<f32>,
    bloom_amt: vec4<f32>,
    bloom_shape: vec4<f32>,
    bloom_levels: vec4<f32>,
    color_map_lerp: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: Params;
@group(0) @binding(1) var clamp_sampler: sampler;
@group(0) @binding(2) var repeat_sampler: sampler;
@group(0) @binding(3) var color_tex: texture_2d<f32>;
@group(0) @binding(4) var bloom_tex: texture_2d<f32>;
@group(0) @binding(5) var noise_tex: texture_2d<f32>;
@group(0) @binding(6) var spectrum_tex: texture_2d<f32>;
@group(0) @binding(7) var overlay_tex: texture_2d<f32>;
@group(0) @binding(8) var color_map1_tex: texture_3d<f32>;
@group(0) @binding(9) var color_map2_tex: texture_3d<f32>;

const LUT_SIZE: f32 = 32.0;

@fragment
fn fs_main(in: FullscreenOut) -> @location(0) vec4<f32> {
    let wobble = vec2<f32>(
        sin(in.uv.y * u.dist_freq.x + u.dist_time.x),
        cos(in.uv.x * u.dist_freq.x + u.dist_time.x * 0.7)
    );
    let uv = in.uv + wobble * u.dist_amt.x;

    var color = textureSample(color_tex, clamp_sampler, uv).rgb;

    var bloom = vec3<f32>(0.0);
    var total = 0.0;
    let levels = i32(u.bloom_levels.x);
    for (var i = 0; i < 8; i++) {
        if i < levels {
            let w = pow(f32(i + 1), u.bloom_shape.x);
            bloom += textureSampleLevel(bloom_tex, clamp_sampler, uv, f32(i)).rgb * w;
            total += w;
        }
    }
    color += bloom / max(total, 0.0001) * u.bloom_amt.x;

    let overlay = textureSample(overlay_tex, clamp_sampler, in.uv);
    color = mix(color, overlay.rgb, overlay.a * u.overlay_alpha.x);

    let spectrum = textureSample(spectrum_tex, clamp_sampler, vec2<f32>(in.uv.x, 0.5)).rgb;
    color = color * u.fade.x + spectrum * u.flash.x;

    let grain = textureSample(noise_tex, repeat_sampler, in.uv * u.nscale.xy + u.noffs.xy).r;
    color += vec3<f32>((grain - 0.5) * 0.03);

    let lut = clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)) * ((LUT_SIZE - 1.0) / LUT_SIZE) + 0.5 / LUT_SIZE;
    let graded1 = textureSample(color_map1_tex, clamp_sampler, lut).rgb;
    let graded2 = textureSample(color_map2_tex, clamp_sampler, lut).rgb;
    return vec4<f32>(mix(graded1, graded2, u.color_map_lerp.x), 1.0);
}
"#
);

/// Linear copy of one mip level into the next
pub const DOWNSAMPLE: &str = concat!(
    fullscreen_vs!(),
    r#"
@group(0) @binding(0) var source_tex: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;

@fragment
fn fs_main(in: FullscreenOut) -> @location(0) vec4<f32> {
    return textureSampleLevel(source_tex, source_sampler, in.uv, 0.0);
}
"#
);

/// Compile a shader module from WGSL source
pub fn compile_shader(device: &Device, label: &str, source: &str) -> ShaderModule {
    device.create_shader_module(ShaderModuleDescriptor {
        label: Some(label),
        source: ShaderSource::Wgsl(source.into()),
    })
}
