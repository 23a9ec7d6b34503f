use thiserror::Error;

/// Fatal errors raised while preparing or running a load profile.
///
/// Per-request failures are never reported through this type; they are
/// recorded as metrics and the iteration carries on.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Invalid duration '{0}': expected forms like 30s, 1m30s, 500ms or 2h")]
    InvalidDuration(String),

    #[error("Invalid threshold expression '{expr}' on metric '{metric}': {reason}")]
    InvalidThreshold {
        metric: String,
        expr: String,
        reason: String,
    },

    #[error("Threshold references metric '{0}' which is not produced by this run")]
    UnknownMetric(String),

    #[error("Metric '{0}' is declared more than once")]
    DuplicateMetric(String),

    #[error("Load profile has no stages")]
    EmptyProfile,

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LoadError::UnknownMetric("burn_retries".to_string());
        assert_eq!(
            error.to_string(),
            "Threshold references metric 'burn_retries' which is not produced by this run"
        );

        let error = LoadError::InvalidThreshold {
            metric: "http_req_duration".to_string(),
            expr: "p(95)<<2000".to_string(),
            reason: "unparsable bound".to_string(),
        };
        assert!(error.to_string().contains("p(95)<<2000"));
    }
}
