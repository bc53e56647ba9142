use super::{extract_records, SourceClient, SourceFilters};
use crate::error::{Result, SearchError};
use crate::model::{PropertyRecord, SourceType};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

/// In-memory feed returning the same raw records for every query.
///
/// Backs CLI fixture files and tests; filtering is left to the orchestrator.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    source_type: SourceType,
    records: Vec<Value>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, source_type: SourceType, records: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            source_type,
            records,
        }
    }

    /// Serve already-normalized records in their canonical JSON form.
    pub fn from_records(
        name: impl Into<String>,
        source_type: SourceType,
        records: &[PropertyRecord],
    ) -> Result<Self> {
        let records = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(name, source_type, records))
    }

    /// Load a JSON fixture: a bare array or an object wrapping one.
    pub fn from_file(name: impl Into<String>, source_type: SourceType, path: &Path) -> Result<Self> {
        let name = name.into();
        let content = std::fs::read_to_string(path)?;
        let body: Value = serde_json::from_str(&content)?;
        let records = extract_records(body).map_err(|message| {
            SearchError::from_source(&name, format!("{}: {}", path.display(), message))
        })?;
        Ok(Self::new(name, source_type, records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SourceClient for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        self.source_type
    }

    fn description(&self) -> &str {
        "in-memory records"
    }

    async fn search(&self, _filters: &SourceFilters) -> Result<Vec<Value>> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceAttribution;
    use serde_json::json;

    #[tokio::test]
    async fn test_returns_records() {
        let source = StaticSource::new("crm", SourceType::Crm, vec![json!({"id": "1"})]);
        let records = source.search(&SourceFilters::new()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(source.name(), "crm");
    }

    #[test]
    fn test_from_records() {
        let record = PropertyRecord::new(SourceAttribution::new(SourceType::Crm, "crm", "1"))
            .with_price(100_000.0);
        let source = StaticSource::from_records("crm", SourceType::Crm, &[record]).unwrap();
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("propmatch-fixture-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"listings": [{"id": "a"}, {"id": "b"}]}"#).unwrap();
        let source = StaticSource::from_file("portal", SourceType::Portal, &path).unwrap();
        assert_eq!(source.len(), 2);
        let _ = std::fs::remove_file(&path);
    }
}
