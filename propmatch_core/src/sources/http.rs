use super::{apply_vocabulary, generic_filters, SourceClient, SourceFilters};
use crate::config::SourceConfig;
use crate::error::{Result, SearchError};
use crate::model::SourceType;
use crate::search::SearchQuery;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

const USER_AGENT: &str = concat!("propmatch/", env!("CARGO_PKG_VERSION"));

/// Keys under which feeds wrap their record arrays.
const RECORD_KEYS: [&str; 4] = ["results", "listings", "items", "data"];

/// Feed reached over HTTP: translated filters are POSTed as JSON.
pub struct HttpSourceClient {
    config: SourceConfig,
    client: Client,
    description: String,
}

impl HttpSourceClient {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(SearchError::HttpRequest)?;
        let description = format!("{} feed at {}", config.source_type, config.endpoint);
        Ok(Self {
            config,
            client,
            description,
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn api_key(&self) -> Option<String> {
        self.config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn source_type(&self) -> SourceType {
        self.config.source_type
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn translate(&self, query: &SearchQuery, tenant_id: Option<&str>) -> SourceFilters {
        apply_vocabulary(generic_filters(query, tenant_id), &self.config.vocabulary)
    }

    async fn search(&self, filters: &SourceFilters) -> Result<Vec<Value>> {
        let mut request = self.client.post(&self.config.endpoint).json(filters);
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(key) = self.api_key() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(SearchError::HttpRequest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::from_source(
                &self.config.name,
                format!("HTTP {}", status),
            ));
        }

        let body: Value = response.json().await.map_err(SearchError::HttpRequest)?;
        let records = extract_records(body)
            .map_err(|message| SearchError::from_source(&self.config.name, message))?;
        debug!(source = %self.config.name, count = records.len(), "source responded");
        Ok(records)
    }
}

/// Pull the record array out of a response body: either a bare array or an
/// object holding one under a well-known key.
pub fn extract_records(body: Value) -> std::result::Result<Vec<Value>, String> {
    match body {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => {
            for key in RECORD_KEYS {
                if let Some(Value::Array(records)) = map.remove(key) {
                    return Ok(records);
                }
            }
            Err("response has no record array".to_string())
        }
        other => Err(format!("unexpected response body: {}", type_name(&other))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_bare_array() {
        let records = extract_records(json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_extract_wrapped() {
        for key in RECORD_KEYS {
            let mut body = serde_json::Map::new();
            body.insert("total".to_string(), json!(1));
            body.insert(key.to_string(), json!([{"id": "a"}]));
            let body = Value::Object(body);
            assert_eq!(extract_records(body).unwrap().len(), 1, "key {key}");
        }
    }

    #[test]
    fn test_extract_rejects_other_shapes() {
        assert!(extract_records(json!({"total": 0})).is_err());
        assert!(extract_records(json!("oops")).is_err());
    }

    #[test]
    fn test_translate_uses_vocabulary() {
        let mut config = SourceConfig::new("imovirtual", SourceType::Portal, "https://api.example/search");
        config
            .vocabulary
            .insert("district".to_string(), "distrito".to_string());
        let client = HttpSourceClient::new(config).unwrap();
        let query = SearchQuery {
            district: Some("Faro".into()),
            ..SearchQuery::default()
        };
        let filters = client.translate(&query, None);
        assert_eq!(filters["distrito"], json!("Faro"));
        assert_eq!(client.name(), "imovirtual");
    }
}
