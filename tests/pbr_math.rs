//! CPU mirrors of the WGSL shading and precompute math. These functions
//! re-implement the shader code exactly so the numeric properties the
//! renderer relies on can be checked without a GPU.

use glam::Vec3;

const PI: f32 = 3.141_592_65;
const EPSILON: f32 = 1e-5;

fn d_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let alpha = roughness * roughness;
    let alpha2 = alpha * alpha;
    let denom = n_dot_h * n_dot_h * (alpha2 - 1.0) + 1.0;
    alpha2 / (PI * denom * denom)
}

fn g_smith_direct(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = (r * r) / 8.0;
    let gv = n_dot_v / (n_dot_v * (1.0 - k) + k);
    let gl = n_dot_l / (n_dot_l * (1.0 - k) + k);
    gv * gl
}

fn g_smith_ibl(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let k = (roughness * roughness) / 2.0;
    let gv = n_dot_v / (n_dot_v * (1.0 - k) + k);
    let gl = n_dot_l / (n_dot_l * (1.0 - k) + k);
    gv * gl
}

fn f_schlick(f0: Vec3, f90: Vec3, v_dot_h: f32) -> Vec3 {
    f0 + (f90 - f0) * (1.0 - v_dot_h).clamp(0.0, 1.0).powi(5)
}

fn radical_inverse_vdc(bits_in: u32) -> f32 {
    let mut bits = bits_in;
    bits = bits.rotate_left(16);
    bits = ((bits & 0x5555_5555) << 1) | ((bits & 0xAAAA_AAAA) >> 1);
    bits = ((bits & 0x3333_3333) << 2) | ((bits & 0xCCCC_CCCC) >> 2);
    bits = ((bits & 0x0F0F_0F0F) << 4) | ((bits & 0xF0F0_F0F0) >> 4);
    bits = ((bits & 0x00FF_00FF) << 8) | ((bits & 0xFF00_FF00) >> 8);
    bits as f32 * 2.328_306_4e-10
}

fn hammersley(i: u32, n: u32) -> [f32; 2] {
    [i as f32 / n as f32, radical_inverse_vdc(i)]
}

fn importance_sample_ggx(xi: [f32; 2], n: Vec3, roughness: f32) -> Vec3 {
    let alpha = roughness * roughness;
    let phi = 2.0 * PI * xi[0];
    let cos_theta = ((1.0 - xi[1]) / (1.0 + (alpha * alpha - 1.0) * xi[1])).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

    let h_tangent = Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);

    let up = if n.z.abs() > 0.999 { Vec3::X } else { Vec3::Z };
    let tangent = up.cross(n).normalize();
    let bitangent = n.cross(tangent);

    (tangent * h_tangent.x + bitangent * h_tangent.y + n * h_tangent.z).normalize()
}

fn reinhard_tone_map(color: f32, middle_gray: f32, average_log_lum: f32, white_point: f32) -> f32 {
    let exposure = middle_gray / average_log_lum.max(0.001);
    let c = color * exposure;
    let white2 = white_point * white_point;
    c * (1.0 + c / white2) / (1.0 + c)
}

// Mirrors the split-sum integration in shader/brdf_lut.wgsl.
fn integrate_brdf(n_dot_v: f32, roughness: f32, num_samples: u32) -> (f32, f32) {
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).sqrt(), 0.0, n_dot_v);
    let n = Vec3::Z;

    let mut scale = 0.0;
    let mut bias = 0.0;
    for i in 0..num_samples {
        let xi = hammersley(i, num_samples);
        let h = importance_sample_ggx(xi, n, roughness);
        let l = (2.0 * v.dot(h) * h - v).normalize();

        let n_dot_l = l.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(h).max(0.0);

        if n_dot_l > 0.0 {
            let g = g_smith_ibl(n_dot_v, n_dot_l, roughness);
            let g_vis = g * v_dot_h / (n_dot_h * n_dot_v);
            let fresnel = (1.0 - v_dot_h).powi(5);
            scale += (1.0 - fresnel) * g_vis;
            bias += fresnel * g_vis;
        }
    }
    (scale / num_samples as f32, bias / num_samples as f32)
}

#[test]
fn ggx_distribution_peaks_at_the_half_vector() {
    for roughness in [0.1_f32, 0.3, 0.6, 1.0] {
        let peak = d_ggx(1.0, roughness);
        for n_dot_h in [0.9_f32, 0.7, 0.4, 0.1] {
            assert!(
                d_ggx(n_dot_h, roughness) <= peak + EPSILON,
                "D not maximal at n_dot_h = 1 for roughness {}",
                roughness
            );
        }
        // Closed form at the peak: 1 / (pi * alpha^2).
        let alpha2 = roughness.powi(4);
        assert!((peak - 1.0 / (PI * alpha2)).abs() < peak * 1e-4);
    }
}

#[test]
fn smith_geometry_terms_stay_in_unit_range() {
    for roughness in [0.04_f32, 0.25, 0.5, 1.0] {
        for n_dot_v in [0.05_f32, 0.3, 0.7, 1.0] {
            for n_dot_l in [0.05_f32, 0.3, 0.7, 1.0] {
                for g in [
                    g_smith_direct(n_dot_v, n_dot_l, roughness),
                    g_smith_ibl(n_dot_v, n_dot_l, roughness),
                ] {
                    assert!((0.0..=1.0 + EPSILON).contains(&g));
                }
            }
        }
    }
}

#[test]
fn schlick_fresnel_interpolates_between_f0_and_f90() {
    let f0 = Vec3::splat(0.04);
    let f90 = Vec3::ONE;
    assert!(f_schlick(f0, f90, 1.0).abs_diff_eq(f0, EPSILON));
    assert!(f_schlick(f0, f90, 0.0).abs_diff_eq(f90, EPSILON));
    // Monotonically increasing as the angle opens up.
    let mid = f_schlick(f0, f90, 0.5).x;
    assert!(mid > f0.x && mid < f90.x);
}

#[test]
fn hammersley_sequence_is_a_unit_square_low_discrepancy_set() {
    assert!((radical_inverse_vdc(0) - 0.0).abs() < EPSILON);
    assert!((radical_inverse_vdc(1) - 0.5).abs() < EPSILON);
    assert!((radical_inverse_vdc(2) - 0.25).abs() < EPSILON);
    assert!((radical_inverse_vdc(3) - 0.75).abs() < EPSILON);

    for i in 0..256 {
        let [x, y] = hammersley(i, 256);
        assert!((0.0..1.0).contains(&x));
        assert!((0.0..1.0).contains(&y));
    }
}

#[test]
fn ggx_importance_samples_stay_in_the_upper_hemisphere() {
    let n = Vec3::new(0.0, 0.0, 1.0);
    for roughness in [0.05_f32, 0.5, 1.0] {
        for i in 0..128 {
            let h = importance_sample_ggx(hammersley(i, 128), n, roughness);
            assert!((h.length() - 1.0).abs() < 1e-4);
            assert!(h.dot(n) >= -EPSILON);
        }
    }

    // Low roughness concentrates samples around the normal.
    let mean_cos: f32 = (0..128)
        .map(|i| importance_sample_ggx(hammersley(i, 128), n, 0.05).dot(n))
        .sum::<f32>()
        / 128.0;
    assert!(mean_cos > 0.99);
}

#[test]
fn reinhard_tone_map_is_monotonic_and_bounded() {
    let mut previous = 0.0;
    for step in 1..100 {
        let value = step as f32 * 0.5;
        let mapped = reinhard_tone_map(value, 0.18, 0.18, 3.0);
        assert!(mapped > previous);
        previous = mapped;
    }
    // Inputs at the white point map to (slightly above) 1; far beyond it
    // the curve keeps growing towards x/white^2 scaling, never negative.
    let at_white = reinhard_tone_map(3.0, 0.18, 0.18, 3.0);
    assert!((at_white - 1.0).abs() < 0.35);
}

#[test]
fn brdf_lut_integral_stays_normalized() {
    for n_dot_v in [0.1_f32, 0.5, 0.9] {
        for roughness in [0.1_f32, 0.5, 0.9] {
            let (scale, bias) = integrate_brdf(n_dot_v, roughness, 64);
            assert!(scale >= 0.0 && bias >= 0.0);
            assert!(
                scale + bias <= 1.1,
                "energy gain at n_dot_v {} roughness {}: {} + {}",
                n_dot_v,
                roughness,
                scale,
                bias
            );
        }
    }
}
