use std::{fmt, io};

use pulldown_cmark_to_cmark::Error as CmarkToCmarkError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinError;

use serde_json::Error as JsonError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum MnemaError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Revision history error: {0}")]
    History(String),
    #[error("Internal consistency fault: {0}")]
    Internal(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Document parse error: {0}")]
    Parse(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl From<io::Error> for MnemaError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => MnemaError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => MnemaError::PermissionDenied,
            _ => MnemaError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for MnemaError {
    fn from(x: fmt::Error) -> Self {
        MnemaError::Parse(format!("{x}"))
    }
}

impl From<CmarkToCmarkError> for MnemaError {
    fn from(x: CmarkToCmarkError) -> Self {
        MnemaError::Parse(format!("{x}"))
    }
}

impl From<JsonError> for MnemaError {
    fn from(src: JsonError) -> Self {
        MnemaError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<serde_yaml::Error> for MnemaError {
    fn from(src: serde_yaml::Error) -> Self {
        MnemaError::Serialization(format!("YAML deserialization error: {src}"))
    }
}

impl From<JoinError> for MnemaError {
    fn from(src: JoinError) -> Self {
        MnemaError::Internal(format!("Parse task panicked or was cancelled: {src}"))
    }
}
