pub mod decoder;

pub use decoder::{
    ChunkStreamDecoder,
    DecodedBatch,
};
