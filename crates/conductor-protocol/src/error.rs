use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed {field} object: {reason}")]
    MalformedField { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
