use thiserror::Error;

/// Fatal extraction failures. No partial record list survives either variant.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Bytes are not a readable workbook, or the requested sheet is missing.
    #[error("format error: {0}")]
    Format(String),

    /// The table parsed but breaks the business rules; carries every violation.
    #[error("validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },
}

impl ExtractError {
    pub fn format(msg: impl Into<String>) -> Self { ExtractError::Format(msg.into()) }

    pub fn violations(&self) -> &[String] {
        match self {
            ExtractError::Validation { errors } => errors,
            ExtractError::Format(_) => &[],
        }
    }
}

impl From<calamine::Error> for ExtractError {
    fn from(err: calamine::Error) -> Self { ExtractError::Format(err.to_string()) }
}

/// Dispatcher connection settings are missing or unusable. Raised before any request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("record store base URL is not set (SHEETSYNC_BASE_URL or --base-url)")]
    MissingBaseUrl,

    #[error("invalid record store base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("record store API key is required but not set (SHEETSYNC_API_KEY or --api-key)")]
    MissingApiKey,

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_joins_all_errors() {
        let err = ExtractError::Validation {
            errors: vec!["spreadsheet must contain an id column".into(), "other".into()],
        };
        assert_eq!(
            err.to_string(),
            "validation failed: spreadsheet must contain an id column; other"
        );
        assert_eq!(err.violations().len(), 2);
    }
}
