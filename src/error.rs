use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Cannot {action} while in the {phase} phase")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a search attempt ended without results.
///
/// The `Display` text is what the user sees in the error view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Request timed out after {}. The search may be taking longer than expected.", describe_duration(.timeout_secs))]
    Timeout { timeout_secs: u64 },

    #[error("Network error: Please check your internet connection and try again.")]
    NetworkUnavailable,

    #[error("Connection error: The service may not be available from this domain.")]
    CrossOriginBlocked,

    #[error("{0}")]
    Transport(String),

    #[error("Rate limit exceeded; searches are blocked for {cooldown_secs} seconds")]
    RateLimited { cooldown_secs: u64 },

    #[error("{0}")]
    RequestFailed(String),

    /// Malformed JSON or a payload that is not an array of results.
    #[error("{0}")]
    InvalidResponse(String),

    #[error("No results found for your search criteria. Try adjusting your parameters.")]
    EmptyResults,

    #[error("Please wait {remaining_minutes} minutes before making another request to avoid rate limiting.")]
    UserIntervalThrottle { remaining_minutes: u64 },
}

fn describe_duration(secs: &u64) -> String {
    match *secs {
        60 => "1 minute".to_string(),
        s if s > 0 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{} seconds", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_uses_minutes_when_whole() {
        let err = SearchError::Timeout { timeout_secs: 120 };
        assert_eq!(
            err.to_string(),
            "Request timed out after 2 minutes. The search may be taking longer than expected."
        );
        let err = SearchError::Timeout { timeout_secs: 45 };
        assert!(err.to_string().contains("after 45 seconds"));
    }

    #[test]
    fn throttle_message_reports_minutes() {
        let err = SearchError::UserIntervalThrottle { remaining_minutes: 58 };
        assert_eq!(
            err.to_string(),
            "Please wait 58 minutes before making another request to avoid rate limiting."
        );
    }
}
