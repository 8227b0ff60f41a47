pub mod codec;
pub mod source;
pub mod splat;
pub mod writer;

#[cfg(feature = "io_ply")]
pub mod ply;
