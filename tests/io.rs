use std::io::Read;

use bevy_splat_compare::{
    FileFetcher,
    MemoryFetcher,
    SplatError,
    SplatFetcher,
    SplatRecord,
    io::{
        codec::SplatCodec,
        splat::{SPLAT_RECORD_SIZE, parse_records},
        writer::write_splat_file,
    },
    random_splats,
};


#[test]
fn test_codec() {
    let count = 10000;

    let splats = random_splats(count);
    let encoded = splats.encode();
    let decoded = Vec::<SplatRecord>::decode(encoded.as_slice()).unwrap();

    assert_eq!(encoded.len(), count * SPLAT_RECORD_SIZE);
    assert_eq!(decoded.len(), count);

    for (original, decoded) in splats.iter().zip(decoded.iter()) {
        assert_eq!(original.position, decoded.position);
        assert_eq!(original.scale, decoded.scale);
        assert_eq!(original.color, decoded.color);
        assert!(original.quat().angle_between(decoded.quat()) < 0.05);
    }
}

#[test]
fn trailing_partial_record_is_dropped() {
    let mut bytes = random_splats(3).encode();
    bytes.extend([7; SPLAT_RECORD_SIZE - 1]);

    let decoded = Vec::<SplatRecord>::decode(&bytes).unwrap();
    assert_eq!(decoded.len(), 3);
}

#[test]
fn buffer_shorter_than_one_record_is_format_error() {
    let result = Vec::<SplatRecord>::decode(&[0; SPLAT_RECORD_SIZE - 1]);
    assert!(matches!(result, Err(SplatError::Format(_))));
}

#[test]
fn declared_count_beyond_buffer_is_format_error() {
    let bytes = random_splats(2).encode();
    assert!(matches!(parse_records(&bytes, Some(3)), Err(SplatError::Format(_))));
}

#[test]
fn unnormalized_rotation_bytes_decode_normalized() {
    let mut bytes = vec![SplatRecord::default()].encode();
    bytes[28..32].copy_from_slice(&[200, 200, 128, 128]);

    let decoded = Vec::<SplatRecord>::decode(&bytes).unwrap();
    assert!((decoded[0].quat().length() - 1.0).abs() < 1e-5);
}

#[test]
fn written_file_is_served_by_file_fetcher() {
    let directory = std::env::temp_dir().join(format!("splat_io_{}", std::process::id()));
    std::fs::create_dir_all(&directory).unwrap();

    let splats = random_splats(16);
    let path = directory.join("written.splat");
    write_splat_file(&splats, path.to_str().unwrap()).unwrap();

    let fetcher = FileFetcher::new(&directory);
    let mut stream = fetcher.request("written.splat").unwrap();
    assert_eq!(stream.declared_count(), Some(16));

    let mut bytes = Vec::new();
    stream.reader.read_to_end(&mut bytes).unwrap();
    assert_eq!(bytes, splats.encode());

    assert!(matches!(fetcher.request("missing.splat"), Err(SplatError::Network(_))));

    std::fs::remove_dir_all(&directory).unwrap();
}

#[test]
fn memory_fetcher_reports_missing_keys_as_network_errors() {
    let fetcher = MemoryFetcher::default().with_source("a.splat", random_splats(2).encode());

    assert_eq!(fetcher.request("a.splat").unwrap().declared_count(), Some(2));
    assert!(matches!(fetcher.request("b.splat"), Err(SplatError::Network(_))));
}
