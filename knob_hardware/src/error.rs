use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("adc conversion timeout")]
    Timeout,
    #[error("sample stream exhausted")]
    Exhausted,
    #[error("eeprom address {addr:#06x} out of range")]
    AddressOutOfRange { addr: u16 },
    #[error("eeprom write fault at {addr:#06x}")]
    WriteFault { addr: u16 },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
