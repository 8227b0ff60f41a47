use bevy_splat_compare::{
    SplatRecord,
    gaussian::{
        covariance::compute_covariance_3d,
        packed::{pack_splat, unpack_u32_to_i16s},
        textures::PackedTextures,
    },
    io::codec::SplatCodec,
    random_splats,
};


#[test]
fn three_record_scenario() {
    let red = SplatRecord {
        position: [0.0, 0.0, 0.0],
        scale: [1.0, 1.0, 1.0],
        color: [255, 0, 0, 255],
        ..Default::default()
    };
    let bytes = vec![red; 3].encode();

    let decoded = Vec::<SplatRecord>::decode(&bytes).unwrap();
    assert_eq!(decoded.len(), 3);

    let mut textures = PackedTextures::with_capacity(3);
    textures.write_range(0, &decoded).unwrap();

    for (center, cov_color) in textures.center_and_scale()[..3].iter().zip(textures.cov_and_color()) {
        assert_eq!(cov_color.color, 0xFF0000FF);
        assert_eq!(center.center, [0.0, 0.0, 0.0]);

        let covariance = cov_color.covariance(center.scale);
        for (actual, expected) in covariance.iter().zip([1.0, 0.0, 0.0, 1.0, 0.0, 1.0]) {
            assert!((actual - expected).abs() <= center.scale);
        }
    }
}

#[test]
fn covariance_round_trip_within_one_step() {
    for splat in random_splats(2000) {
        let expected = compute_covariance_3d(splat.quat(), splat.scale());
        let (center, cov_color) = pack_splat(&splat);

        let restored = cov_color.covariance(center.scale);
        for (actual, expected) in restored.iter().zip(expected.iter()) {
            assert!(
                (actual - expected).abs() <= center.scale,
                "{actual} vs {expected} with step {}",
                center.scale,
            );
        }
    }
}

#[test]
fn halves_are_stored_low_first() {
    let splat = SplatRecord {
        scale: [2.0, 1.0, 1.0],
        ..Default::default()
    };
    let (_, cov_color) = pack_splat(&splat);

    // M11 = 4 is the largest entry and maps to the full i16 range
    let (m11, m12) = unpack_u32_to_i16s(cov_color.covariance[0]);
    assert_eq!(m11, i16::MAX);
    assert_eq!(m12, 0);
}

#[test]
fn grown_textures_keep_linear_indices() {
    let splats = random_splats(50);

    let mut streamed = PackedTextures::with_capacity(8);
    for (i, chunk) in splats.chunks(8).enumerate() {
        streamed.write_or_grow(i * 8, chunk).unwrap();
    }

    let mut direct = PackedTextures::with_capacity(50);
    direct.write_range(0, &splats).unwrap();

    assert_eq!(&streamed.center_and_scale()[..50], &direct.center_and_scale()[..50]);
    assert_eq!(&streamed.cov_and_color()[..50], &direct.cov_and_color()[..50]);
}
