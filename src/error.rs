use std::io;
use thiserror::Error;
use msgbox::IconType;
use std::fmt::Display;
use std::str::Utf8Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (iced): {source}")]
    Iced { #[from] source: iced::Error },

    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("A required bluetooth characteristic is not available")]
    MissingCharacteristic,

    #[error("No bluetooth adapter is available")]
    NoAdapter,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("Framing error: no message terminator within {limit} bytes, dropped {dropped} bytes")]
    Overflow { limit: usize, dropped: usize },
}

/// A single token that could not be turned into a reading. Skipped, never surfaced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseSkip {
    #[error("Token {token:?} has no '='")]
    NotAPair { token: String },

    #[error("Token {token:?} has an unknown key")]
    UnknownKey { token: String },

    #[error("Token {token:?} has a value that is not a number")]
    BadValue { token: String },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("Not connected. What am I supposed to send this to?")]
    NotConnected,

    #[error("Bluetooth is turned off")]
    AdapterUnavailable,
}

pub fn error_msgbox<T: Display>(message: &'static str, error: &T) {
    let message = format!("{}: {}", message, error);
    eprintln!("{}", &message);
    if let Err(err) = msgbox::create(concat!("HM10 Force Gauge ", env!("CARGO_PKG_VERSION")), &message, IconType::Error) {
        eprintln!("Failed to create msgbox: {:?}", err);
    }
}
