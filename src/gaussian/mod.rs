pub mod asset;
pub mod covariance;
pub mod packed;
pub mod rand;
pub mod record;
pub mod settings;
pub mod textures;
