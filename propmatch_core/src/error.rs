use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Source '{source_name}' failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Geocoding error: {0}")]
    Geocode(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SearchError {
    pub fn from_source(name: impl Into<String>, message: impl Into<String>) -> Self {
        SearchError::Source {
            source_name: name.into(),
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        SearchError::InvalidQuery(message.into())
    }

    pub fn code_str(&self) -> &'static str {
        match self {
            SearchError::InvalidQuery(_) => "invalid_query",
            SearchError::Source { .. } => "upstream_error",
            SearchError::HttpRequest(_) => "upstream_error",
            SearchError::Timeout(_) => "timeout",
            SearchError::Config(_) => "config_error",
            SearchError::Yaml(_) => "config_error",
            SearchError::SerdeJson(_) => "parse_error",
            SearchError::Geocode(_) => "geocode_error",
            SearchError::Io(_) => "io_error",
            SearchError::Internal(_) => "internal_error",
        }
    }

    /// Whether the error was raised before any source was queried.
    pub fn is_validation(&self) -> bool {
        matches!(self, SearchError::InvalidQuery(_))
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "code": self.code_str(),
            "message": self.to_string(),
        })
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_str() {
        assert_eq!(SearchError::invalid("page").code_str(), "invalid_query");
        assert_eq!(
            SearchError::from_source("idealista", "503").code_str(),
            "upstream_error"
        );
        assert_eq!(SearchError::Timeout("x".into()).code_str(), "timeout");
    }

    #[test]
    fn test_source_error_display() {
        let err = SearchError::from_source("crm", "connection refused");
        assert_eq!(err.to_string(), "Source 'crm' failed: connection refused");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_to_json() {
        let value = SearchError::invalid("page must be >= 1").to_json();
        assert_eq!(value["code"], "invalid_query");
        assert_eq!(value["message"], "Invalid query: page must be >= 1");
    }
}
