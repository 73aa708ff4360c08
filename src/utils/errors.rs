use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DynamicsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    InvalidConfig(String),

    #[error("No solution: {0}")]
    NoSolution(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),
}
