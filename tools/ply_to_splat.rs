use byte_unit::{Byte, UnitType};

use bevy_splat_compare::io::{
    ply::parse_ply,
    writer::write_splat_file,
};


fn main() {
    let filename = std::env::args().nth(1).expect("no filename given");

    println!("converting `{filename}` file to splat");

    let file = std::fs::File::open(&filename).expect("failed to open file");
    let mut reader = std::io::BufReader::new(file);

    let records = parse_ply(&mut reader).expect("failed to parse ply file");
    println!("parsed {} splats", records.len());

    let base_filename = filename
        .rsplit_once('.')
        .map_or(filename.as_str(), |(base, _extension)| base)
        .to_string();
    let splat_filename = base_filename + ".splat";

    write_splat_file(&records, &splat_filename).expect("failed to write splat file");

    let post_encode_bytes = Byte::from_u64(
        std::fs::metadata(&splat_filename)
            .expect("failed to get metadata")
            .len(),
    );
    println!(
        "output file size: {}",
        post_encode_bytes.get_appropriate_unit(UnitType::Decimal)
    );
}
