use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("decryption failed: {0}")]
    Decryption(String),
}

pub type Result<T> = std::result::Result<T, AssemblerError>;
