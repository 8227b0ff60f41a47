use std::io::Write;

use crate::{
    gaussian::record::SplatRecord,
    io::splat::encode_records,
};


pub fn write_splat_file(
    records: &[SplatRecord],
    path: &str,
) -> std::io::Result<()> {
    let splat_file = std::fs::File::create(path)?;
    let mut splat_writer = std::io::BufWriter::new(splat_file);

    splat_writer.write_all(encode_records(records).as_slice())?;
    splat_writer.flush()
}
