use thiserror::Error;

/// Errors decoding kernel metadata that are not image faults.
#[derive(Debug, Error)]
pub enum SysError {
    #[error("tick rate must be non-zero")]
    ZeroHz,

    #[error("kernel config has no CONFIG_{0}")]
    MissingOption(String),

    #[error("CONFIG_{name}={value} is not a valid number")]
    InvalidNumber { name: String, value: String },

    #[error("kernel config blob is missing its {0} marker")]
    MissingMarker(&'static str),

    #[error("kernel config blob is {0} bytes, too short to hold both markers")]
    ShortBlob(usize),

    #[error("failed to decompress kernel config: {0}")]
    Decompress(#[from] std::io::Error),

    #[error(transparent)]
    Fault(#[from] corewalk_core::Fault),
}
