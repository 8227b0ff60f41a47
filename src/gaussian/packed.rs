use bytemuck::{
    Pod,
    Zeroable,
};
use static_assertions::assert_eq_size;

use crate::gaussian::{
    covariance::compute_covariance_3d,
    record::SplatRecord,
};


pub const COVARIANCE_QUANTIZATION_RANGE: f32 = i16::MAX as f32;


/// One texel of the `centerAndScale` texture (`Rgba32Float`).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Pod,
    Zeroable,
)]
#[repr(C)]
pub struct CenterScaleTexel {
    pub center: [f32; 3],
    /// dequantization factor for the covariance halves of the same splat
    pub scale: f32,
}

/// One texel of the `covAndColor` texture (`Rgba32Uint`).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Pod,
    Zeroable,
)]
#[repr(C)]
pub struct CovColorTexel {
    /// (M11, M12), (M13, M22), (M23, M33), first of each pair in the low half
    pub covariance: [u32; 3],
    pub color: u32,
}

assert_eq_size!(CenterScaleTexel, [f32; 4]);
assert_eq_size!(CovColorTexel, [u32; 4]);


impl CovColorTexel {
    pub fn quantized_covariance(&self) -> [i16; 6] {
        let (m11, m12) = unpack_u32_to_i16s(self.covariance[0]);
        let (m13, m22) = unpack_u32_to_i16s(self.covariance[1]);
        let (m23, m33) = unpack_u32_to_i16s(self.covariance[2]);

        [m11, m12, m13, m22, m23, m33]
    }

    /// Mirrors the vertex shader unpack: each recovered half times `s`.
    pub fn covariance(&self, scale: f32) -> [f32; 6] {
        self.quantized_covariance().map(|v| v as f32 * scale)
    }

    pub fn rgba(&self) -> [u8; 4] {
        self.color.to_le_bytes()
    }
}


pub fn pack_splat(record: &SplatRecord) -> (CenterScaleTexel, CovColorTexel) {
    let covariance = compute_covariance_3d(record.quat(), record.scale());
    let (quantized, scale) = quantize_covariance(&covariance);

    (
        CenterScaleTexel {
            center: record.position,
            scale,
        },
        CovColorTexel {
            covariance: [
                pack_i16s_to_u32(quantized[0], quantized[1]),
                pack_i16s_to_u32(quantized[2], quantized[3]),
                pack_i16s_to_u32(quantized[4], quantized[5]),
            ],
            color: pack_color(record.color),
        },
    )
}

pub fn quantization_factor(covariance: &[f32; 6]) -> f32 {
    covariance
        .iter()
        .fold(0.0_f32, |max, v| max.max(v.abs()))
        / COVARIANCE_QUANTIZATION_RANGE
}

/// Returns the quantized values and the factor `s` that restores them.
/// Degenerate (zero or non-finite) covariance packs as all zeros with `s = 0`.
pub fn quantize_covariance(covariance: &[f32; 6]) -> ([i16; 6], f32) {
    let scale = quantization_factor(covariance);
    if scale == 0.0 || !scale.is_finite() {
        return ([0; 6], 0.0);
    }

    let quantized = covariance.map(|v| {
        (v / scale)
            .round()
            .clamp(-COVARIANCE_QUANTIZATION_RANGE, COVARIANCE_QUANTIZATION_RANGE) as i16
    });

    (quantized, scale)
}

pub fn pack_i16s_to_u32(lower: i16, upper: i16) -> u32 {
    let upper_bits = (upper as u16 as u32) << 16;
    let lower_bits = lower as u16 as u32;
    upper_bits | lower_bits
}

pub fn unpack_u32_to_i16s(value: u32) -> (i16, i16) {
    let lower = (value & 0xFFFF) as u16 as i16;
    let upper = (value >> 16) as u16 as i16;
    (lower, upper)
}

pub fn pack_color(rgba: [u8; 4]) -> u32 {
    u32::from_le_bytes(rgba)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_keep_sign() {
        let packed = pack_i16s_to_u32(-2, 32767);
        assert_eq!(unpack_u32_to_i16s(packed), (-2, 32767));

        let packed = pack_i16s_to_u32(i16::MIN + 1, -1);
        assert_eq!(unpack_u32_to_i16s(packed), (i16::MIN + 1, -1));
    }

    #[test]
    fn color_is_little_endian_rgba() {
        assert_eq!(pack_color([255, 0, 0, 255]), 0xFF0000FF);
        assert_eq!(pack_color([1, 2, 3, 4]), 0x04030201);
    }

    #[test]
    fn degenerate_covariance_packs_to_zero() {
        assert_eq!(quantize_covariance(&[0.0; 6]), ([0; 6], 0.0));
        assert_eq!(quantize_covariance(&[f32::NAN; 6]), ([0; 6], 0.0));
    }

    #[test]
    fn largest_component_uses_full_range() {
        let (quantized, scale) = quantize_covariance(&[4.0, -1.0, 0.0, 2.0, 0.5, -4.0]);
        assert_eq!(quantized[0], 32767);
        assert_eq!(quantized[5], -32767);
        assert!((scale - 4.0 / 32767.0).abs() < 1e-9);
    }
}
