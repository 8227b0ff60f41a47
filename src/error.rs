use thiserror::Error;

pub type SplatResult<T> = std::result::Result<T, SplatError>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SplatError {
    #[error("network error: {0}")]
    Network(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("texture capacity exceeded: {needed} splats needed, {capacity} available")]
    CapacityExceeded {
        needed: usize,
        capacity: usize,
    },

    #[error("stale generation {found}, current generation is {current}")]
    StaleGeneration {
        current: u64,
        found: u64,
    },
}

impl SplatError {
    pub fn is_stale(&self) -> bool {
        matches!(self, SplatError::StaleGeneration { .. })
    }
}

impl From<std::io::Error> for SplatError {
    fn from(error: std::io::Error) -> Self {
        SplatError::Network(error.to_string())
    }
}
