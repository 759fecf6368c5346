use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("camera address must not be empty")]
    InvalidAddress,
    #[error("no camera found at address: {0}")]
    DeviceNotFound(String),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("image lock unavailable: {0}")]
    ImageLock(&'static str),
    #[error("snapshot save failed: {0}")]
    Save(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Save(err.to_string())
    }
}
