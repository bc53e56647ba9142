pub mod config;
pub mod resolve;
pub mod score;
pub mod search;
pub mod sources;

use crate::cli::{Cli, HintArgs};
use propmatch_core::sources::normalize::normalize_standalone;
use propmatch_core::sources::{extract_records, SourceRegistry, StaticSource};
use propmatch_core::{
    ConfigStore, EngineConfig, PropertyRecord, PropertyType, ScoringMode, SearchQuery, SourceType,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No sources configured. Add sources to {0} or pass --fixtures <file.json>")]
    NoSources(String),

    #[error("{0}")]
    Core(#[from] propmatch_core::SearchError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CommandError>;

pub fn config_store(cli: &Cli) -> ConfigStore {
    match &cli.config {
        Some(path) => ConfigStore::new(path.clone()),
        None => ConfigStore::new_default(),
    }
}

pub fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let store = config_store(cli);
    let config = store.load()?;
    debug!(path = %store.path().display(), sources = config.sources.len(), "config loaded");
    Ok(config)
}

/// Fixture files when given, otherwise every enabled configured source.
///
/// A fixture is named after its file stem and takes the type of the
/// configured source with the same name, if any.
pub fn build_registry(config: &EngineConfig, fixtures: &[PathBuf]) -> Result<SourceRegistry> {
    if fixtures.is_empty() {
        return Ok(SourceRegistry::from_config(&config.sources)?);
    }

    let mut registry = SourceRegistry::new();
    for path in fixtures {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CommandError::InvalidInput(format!("bad fixture path {}", path.display())))?
            .to_string();
        let source_type = config
            .sources
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.source_type)
            .unwrap_or(SourceType::Portal);
        let source = StaticSource::from_file(name, source_type, path)?;
        debug!(path = %path.display(), records = source.len(), "fixture loaded");
        registry.register(source);
    }
    Ok(registry)
}

/// Listings from a JSON file, each attributed to the feed it names.
pub fn load_listings(path: &Path) -> Result<Vec<PropertyRecord>> {
    let content = std::fs::read_to_string(path)?;
    let body: serde_json::Value = serde_json::from_str(&content)?;
    let default_source = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string();
    let raw = extract_records(body)
        .map_err(|e| CommandError::InvalidInput(format!("{}: {}", path.display(), e)))?;

    let total = raw.len();
    let records: Vec<PropertyRecord> = raw
        .iter()
        .filter_map(|value| normalize_standalone(&default_source, value))
        .collect();
    if records.len() < total {
        tracing::warn!(
            skipped = total - records.len(),
            "listings without an id were skipped"
        );
    }
    Ok(records)
}

pub fn parse_mode(raw: &str) -> Result<ScoringMode> {
    ScoringMode::parse(raw).ok_or_else(|| {
        CommandError::InvalidInput(format!(
            "unknown mode '{}' (expected prospecting or sale-matching)",
            raw
        ))
    })
}

pub fn parse_types(raw: &[String]) -> Result<Vec<PropertyType>> {
    raw.iter()
        .map(|t| {
            PropertyType::parse(t)
                .ok_or_else(|| CommandError::InvalidInput(format!("unknown property type '{}'", t)))
        })
        .collect()
}

impl HintArgs {
    pub fn to_query(&self) -> Result<SearchQuery> {
        Ok(SearchQuery {
            property_types: parse_types(&self.property_types)?,
            district: self.district.clone(),
            municipality: self.municipality.clone(),
            parish: self.parish.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
            min_area: self.min_area,
            max_area: self.max_area,
            ..SearchQuery::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_args_to_query() {
        let hints = HintArgs {
            property_types: vec!["apartment".into()],
            district: Some("Lisboa".into()),
            max_price: Some(300_000.0),
            ..HintArgs::default()
        };
        let query = hints.to_query().unwrap();
        assert_eq!(query.property_types, vec![PropertyType::Apartment]);
        assert_eq!(query.district.as_deref(), Some("Lisboa"));
        assert_eq!(query.max_price, Some(300_000.0));
    }

    #[test]
    fn test_unknown_values_are_rejected() {
        assert!(parse_mode("bargain-hunting").is_err());
        assert!(parse_types(&["spaceship".to_string()]).is_err());
        assert_eq!(parse_mode("prospecting").unwrap(), ScoringMode::Prospecting);
    }

    #[test]
    fn test_load_listings_from_file() {
        let dir = std::env::temp_dir().join(format!("propmatch-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mixed.json");
        std::fs::write(
            &path,
            r#"{"results": [
                {"id": "1", "portal": "idealista", "price": 250000},
                {"id": "2", "price": 180000},
                {"price": 1}
            ]}"#,
        )
        .unwrap();

        let records = load_listings(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_name, "idealista");
        assert_eq!(records[1].source_name, "mixed");
        std::fs::remove_dir_all(&dir).ok();
    }
}
