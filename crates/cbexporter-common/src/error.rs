use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unable to resolve current node: {0}")]
    Resolution(String),
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: usize, last_error: String },
    #[error("deadline exceeded after {attempts} attempts")]
    DeadlineExceeded { attempts: usize },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ExporterError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Request { .. } => "UpstreamUnavailable",
            Self::Status { .. } => "UpstreamStatus",
            Self::Decode { .. } => "UpstreamDecode",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::Resolution(_) => "NodeResolution",
            Self::RetryExhausted { .. } => "RetryExhausted",
            Self::DeadlineExceeded { .. } => "DeadlineExceeded",
            Self::Unauthorized(_) => "Unauthorized",
            Self::InternalError(_) => "InternalError",
        }
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;
