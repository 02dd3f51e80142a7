use thiserror::Error;

use crate::resolve::ResolutionSummary;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process: {0}")]
    ProcessOpenFailed(String),

    #[error("Failed to read process memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Invalid signature pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid descriptor set: {0}")]
    InvalidDescriptorSet(String),

    #[error("Primary module '{0}' is not loaded in the target process")]
    PrimaryModuleMissing(String),

    #[error("Failed to enumerate modules: {0}")]
    ModuleEnumerationFailed(String),

    #[error("Not supported on this platform: {0}")]
    Unsupported(String),

    #[error("Address resolution failed: {0}")]
    ResolutionFailed(ResolutionSummary),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Summary attached to a failed resolution pass, if any
    pub fn summary(&self) -> Option<&ResolutionSummary> {
        match self {
            Error::ResolutionFailed(summary) => Some(summary),
            _ => None,
        }
    }
}
