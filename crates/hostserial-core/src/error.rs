use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Line coding errors
    #[error("Invalid baud rate: {0}")]
    InvalidBaudRate(u32),

    #[error("Invalid stop bits code: {0}")]
    InvalidStopBits(u8),

    #[error("Invalid parity code: {0}")]
    InvalidParity(u8),

    #[error("Unsupported data bits: {0}")]
    UnsupportedDataBits(u8),
}

pub type Result<T> = std::result::Result<T, Error>;
