use crate::{
    error::SplatResult,
    gaussian::record::SplatRecord,
    io::splat::{
        encode_records,
        parse_records,
    },
};


pub trait SplatCodec: Sized {
    fn encode(&self) -> Vec<u8>;
    fn decode(data: &[u8]) -> SplatResult<Self>;
}

impl SplatCodec for Vec<SplatRecord> {
    fn encode(&self) -> Vec<u8> {
        encode_records(self)
    }

    fn decode(data: &[u8]) -> SplatResult<Self> {
        parse_records(data, None)
    }
}
