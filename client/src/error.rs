use std::fmt::{self, Display};

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug)]
pub enum ClientError {
    /// Error occurred during an IO operation.
    Io(std::io::Error),
    /// Error occurred while (de)serializing data.
    Serde(serde_json::Error),
    /// Custom error
    Custom(String),
}

impl Clone for ClientError {
    fn clone(&self) -> Self {
        match self {
            ClientError::Custom(err) => ClientError::Custom(err.clone()),
            err => ClientError::Custom(err.to_string()),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(other: std::io::Error) -> Self {
        Self::Io(other)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(other: serde_json::Error) -> Self {
        Self::Serde(other)
    }
}

impl Display for ClientError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClientError::Io(err) => write!(fmt, "An IO error occurred: {}", err),
            ClientError::Serde(err) => write!(fmt, "Failed to (de)serialize: {}", err),
            ClientError::Custom(msg) => write!(fmt, "{}", msg),
        }
    }
}

impl std::error::Error for ClientError {}
