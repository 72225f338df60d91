use thiserror::Error;

/// Main error type for the beatsync library
#[derive(Error, Debug)]
pub enum BeatsyncError {
    #[error("Audio processing error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Generic(String),
}

/// Audio-specific errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load audio file: {path}")]
    LoadFailed { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("No decoder available for '{format}' (built without the `{feature}` feature)")]
    DecoderUnavailable { format: String, feature: String },

    #[error("Audio contains no samples: {path}")]
    Empty { path: String },

    #[error("Invalid sample rate: {sample_rate}")]
    InvalidSampleRate { sample_rate: u32 },

    #[error("Resampling failed: {reason}")]
    ResampleFailed { reason: String },

    #[error("Audio analysis failed: {reason}")]
    AnalysisFailed { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using BeatsyncError
pub type Result<T> = std::result::Result<T, BeatsyncError>;

impl BeatsyncError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether the failure comes from a capability missing from this build
    /// rather than from the input itself.
    pub fn is_dependency_error(&self) -> bool {
        matches!(self, Self::Audio(AudioError::DecoderUnavailable { .. }))
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Audio(AudioError::LoadFailed { path }) => {
                format!("Could not load audio file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Audio(AudioError::DecoderUnavailable { format, feature }) => {
                format!("Decoding '{}' files requires beatsync to be built with the `{}` feature.", format, feature)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
