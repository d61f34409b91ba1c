use thiserror::Error;

/// Errors returned when a generator is configured.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid code length {length}; expected {min}..={max}")]
    InvalidLength { length: usize, min: usize, max: usize },
    #[error("alphabet is empty")]
    EmptyAlphabet,
    #[error("alphabet byte {byte:#04x} cannot appear in a short code")]
    InvalidSymbol { byte: u8 },
}
