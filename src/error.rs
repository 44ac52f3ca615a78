use std::fmt;
use thiserror::Error;

/// QuartzBio client error types
#[derive(Error, Debug)]
pub enum QuartzBioError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing failed: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Index out of range: {0}")]
    IndexOutOfRange(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Upload failed: {0}")]
    Upload(UploadFailure),
}

/// Result type for QuartzBio operations
pub type QuartzBioResult<T> = Result<T, QuartzBioError>;

impl QuartzBioError {
    /// Create an API error from a status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth_error(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create an invalid parameter error
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// HTTP status reported by the server, when the error came from one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Auth(_) => Some(401),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Validation errors are raised locally and never reach the network
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidParameter(_) | Self::IndexOutOfRange(_))
    }

    /// The upload failure details, if this is an upload error
    pub fn upload_failure(&self) -> Option<&UploadFailure> {
        match self {
            Self::Upload(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Stage of an upload at which a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    SinglePart,
    Initiate,
    UploadPart,
    Complete,
}

/// Details of a failed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    pub phase: UploadPhase,
    /// 1-based part number for part failures
    pub part: Option<usize>,
    pub message: String,
}

impl UploadFailure {
    pub fn new(phase: UploadPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            part: None,
            message: message.into(),
        }
    }

    pub fn part(part: usize, message: impl Into<String>) -> Self {
        Self {
            phase: UploadPhase::UploadPart,
            part: Some(part),
            message: message.into(),
        }
    }
}

impl fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.phase, self.part) {
            (UploadPhase::UploadPart, Some(part)) => {
                write!(f, "Failed to upload part {}: {}", part, self.message)
            }
            (UploadPhase::UploadPart, None) => {
                write!(f, "Failed to upload part: {}", self.message)
            }
            (UploadPhase::Initiate, _) => {
                write!(f, "Failed to initiate multipart upload: {}", self.message)
            }
            (UploadPhase::Complete, _) => {
                write!(f, "Failed to complete multipart upload: {}", self.message)
            }
            (UploadPhase::SinglePart, _) => {
                write!(f, "Failed to upload file: {}", self.message)
            }
        }
    }
}

impl From<UploadFailure> for QuartzBioError {
    fn from(failure: UploadFailure) -> Self {
        Self::Upload(failure)
    }
}
