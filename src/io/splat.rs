use bevy::math::Quat;

use crate::{
    error::{SplatError, SplatResult},
    gaussian::record::SplatRecord,
};


/// position f32x3, scale f32x3, color u8x4, rotation u8x4 (w, x, y, z)
pub const SPLAT_RECORD_SIZE: usize = 32;


pub fn decode_record(bytes: &[u8; SPLAT_RECORD_SIZE]) -> SplatRecord {
    let f32_at = |offset: usize| {
        f32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    };
    let unit_at = |offset: usize| (bytes[offset] as f32 - 128.0) / 128.0;

    let rotation = Quat::from_xyzw(
        unit_at(29),
        unit_at(30),
        unit_at(31),
        unit_at(28),
    );
    let rotation = if rotation.length_squared() > 0.0 {
        rotation.normalize()
    } else {
        Quat::IDENTITY
    };

    SplatRecord {
        position: [f32_at(0), f32_at(4), f32_at(8)],
        scale: [f32_at(12), f32_at(16), f32_at(20)],
        color: [bytes[24], bytes[25], bytes[26], bytes[27]],
        ..Default::default()
    }
    .with_quat(rotation)
}

pub fn encode_record(record: &SplatRecord) -> [u8; SPLAT_RECORD_SIZE] {
    let mut bytes = [0u8; SPLAT_RECORD_SIZE];

    for (i, value) in record.position.iter().chain(record.scale.iter()).enumerate() {
        bytes[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
    bytes[24..28].copy_from_slice(&record.color);

    let rotation = record.quat().normalize();
    for (i, value) in [rotation.w, rotation.x, rotation.y, rotation.z].iter().enumerate() {
        bytes[28 + i] = (value * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8;
    }

    bytes
}

pub fn encode_records(records: &[SplatRecord]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(records.len() * SPLAT_RECORD_SIZE);
    for record in records {
        bytes.extend_from_slice(&encode_record(record));
    }
    bytes
}

/// Decodes every whole record in `bytes`; a trailing partial record is ignored.
pub fn decode_records(bytes: &[u8]) -> Vec<SplatRecord> {
    bytes
        .chunks_exact(SPLAT_RECORD_SIZE)
        .map(|chunk| {
            let mut record = [0u8; SPLAT_RECORD_SIZE];
            record.copy_from_slice(chunk);
            decode_record(&record)
        })
        .collect()
}

/// Whole-buffer parse.
///
/// Fails when no record is decodable, or when `declared_count` cannot be
/// reconciled with the buffer (the buffer holds fewer whole records than declared).
/// Extra trailing bytes beyond the declared records are dropped.
pub fn parse_records(
    bytes: &[u8],
    declared_count: Option<usize>,
) -> SplatResult<Vec<SplatRecord>> {
    let available = bytes.len() / SPLAT_RECORD_SIZE;
    if available == 0 {
        return Err(SplatError::Format(format!(
            "buffer of {} bytes is shorter than one {SPLAT_RECORD_SIZE} byte record",
            bytes.len(),
        )));
    }

    let count = match declared_count {
        Some(declared) if declared > available => {
            return Err(SplatError::Format(format!(
                "declared {declared} splats but buffer holds {available}",
            )));
        }
        Some(declared) if declared > 0 => declared,
        _ => available,
    };

    Ok(decode_records(&bytes[..count * SPLAT_RECORD_SIZE]))
}
