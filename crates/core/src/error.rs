/// Result alias that carries the custom [`SyncError`] type.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Common error type for the core crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// No alignment table is registered for the reciter. Expected for many
    /// reciters; callers fall back to isolated word playback.
    #[error("no alignment data registered for reciter `{reciter}`")]
    NotFound { reciter: String },
    /// A registered alignment table could not be fetched or parsed.
    #[error("failed to load alignment data for reciter `{reciter}`: {message}")]
    Load { reciter: String, message: String },
    /// A word clip failed to load or play.
    #[error("word audio playback failed: {message}")]
    Playback { message: String },
    #[error("invalid configuration: {message}")]
    Config { message: String },
    /// Free-form message, mostly used for poisoned locks.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors. Stored as a string so the error
    /// stays cloneable for cached load failures.
    #[error("I/O error: {0}")]
    Io(String),
}

impl SyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn playback<T: Into<String>>(message: T) -> Self {
        Self::Playback {
            message: message.into(),
        }
    }

    /// True for the "nothing registered" case, which is not a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<std::io::Error> for SyncError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(value: toml::de::Error) -> Self {
        Self::Config {
            message: value.to_string(),
        }
    }
}

impl From<&str> for SyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_reciter() {
        let err = SyncError::NotFound {
            reciter: "ar.unknown".to_string(),
        };
        assert!(err.is_not_found());
        assert!(format!("{err}").contains("ar.unknown"));
    }

    #[test]
    fn io_errors_convert_and_clone() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SyncError = io.into();
        let copy = err.clone();
        assert!(format!("{copy}").contains("gone"));
        assert!(!copy.is_not_found());
    }
}
