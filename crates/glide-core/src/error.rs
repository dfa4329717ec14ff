use thiserror::Error;

/// Top-level error type for the Glide gesture-typing layer.
///
/// Guard rejections (an invalid gesture start, a disabled feature) are not
/// errors and never show up here; they are plain `false` returns. Everything
/// in this enum is either a boundary failure that gets logged and absorbed,
/// or a lifecycle violation that must surface loudly.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GlideError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(
        "Invalid payload from dictionary {dictionary}: {words} words but {frequencies} frequencies"
    )]
    InvalidPayload {
        dictionary: String,
        words: usize,
        frequencies: usize,
    },

    #[error("Dictionary load error: {0}")]
    DictionaryLoad(String),

    #[error("Unbalanced dictionary load: {dictionary} finished without a matching start")]
    UnbalancedLoad { dictionary: String },

    #[error("No gesture detector registered for layout {key}")]
    DetectorMissing { key: String },

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("Gesture session error: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for GlideError {
    fn from(err: toml::de::Error) -> Self {
        GlideError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for GlideError {
    fn from(err: toml::ser::Error) -> Self {
        GlideError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for GlideError {
    fn from(err: serde_json::Error) -> Self {
        GlideError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Glide operations.
pub type Result<T> = std::result::Result<T, GlideError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GlideError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_invalid_payload_display() {
        let err = GlideError::InvalidPayload {
            dictionary: "en_main".to_string(),
            words: 3,
            frequencies: 2,
        };
        let display = err.to_string();
        assert!(display.contains("en_main"));
        assert!(display.contains("3 words"));
        assert!(display.contains("2 frequencies"));
    }

    #[test]
    fn test_detector_missing_display() {
        let err = GlideError::DetectorMissing {
            key: "qwerty,1080,640".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No gesture detector registered for layout qwerty,1080,640"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let glide_err: GlideError = io_err.into();
        assert!(matches!(glide_err, GlideError::Io(_)));
        assert!(glide_err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let err: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        let glide_err: GlideError = err.unwrap_err().into();
        assert!(matches!(glide_err, GlideError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let glide_err: GlideError = err.unwrap_err().into();
        assert!(matches!(glide_err, GlideError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }
}
