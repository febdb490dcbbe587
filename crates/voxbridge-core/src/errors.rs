use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Engine error: {0}")]
    Engine(String),
    #[error("Transport error: {0}")]
    Transport(String),
}
