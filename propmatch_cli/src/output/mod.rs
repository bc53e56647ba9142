use crate::cli::OutputFormat;
use crate::commands::Result;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use propmatch_core::resolver::DuplicateGroup;
use propmatch_core::sources::SourceInfo;
use propmatch_core::{EngineConfig, PropertyRecord, PropertyScore, SearchResults};
use serde::Serialize;

mod pretty;
pub use pretty::{print_groups, print_scores, print_search_results, print_sources};

/// One record with the score it received, as printed by `score`.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredListing {
    pub record: PropertyRecord,
    pub score: PropertyScore,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum OutputData {
    SearchResults(Box<SearchResults>),
    DuplicateGroups {
        input: usize,
        groups: Vec<DuplicateGroup>,
    },
    Scores(Vec<ScoredListing>),
    SourceList(Vec<SourceInfo>),
    ConfigInfo {
        path: String,
        exists: bool,
        config: EngineConfig,
    },
}

/// Machine-readable formats. `Pretty` is rendered by each command.
pub fn format_output(data: &OutputData, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(data)?);
        }
        OutputFormat::Text | OutputFormat::Pretty => {
            format_text_output(data)?;
        }
    }
    Ok(())
}

fn format_text_output(data: &OutputData) -> Result<()> {
    match data {
        OutputData::SearchResults(results) => {
            println!(
                "{} results (page {}/{}), {} raw, {} duplicates merged",
                results.total,
                results.page,
                results.total_pages.max(1),
                results.total_raw,
                results.duplicates_merged
            );
            for item in &results.items {
                println!(
                    "{:>5.1}  {}  {}  {}",
                    item.score.final_score,
                    item.record.id,
                    price_label(item.record.known_price()),
                    address_label(&item.record)
                );
            }
            for failure in &results.sources.failed {
                println!("failed: {}: {}", failure.source, failure.error);
            }
        }
        OutputData::DuplicateGroups { input, groups } => {
            println!("{} listings, {} duplicate groups", input, groups.len());
            for group in groups {
                println!(
                    "{:.2}  {}",
                    group.confidence,
                    group.member_ids.join(", ")
                );
            }
        }
        OutputData::Scores(scored) => {
            for entry in scored {
                println!(
                    "{:>5.1}  {}  {}",
                    entry.score.final_score,
                    entry.record.id,
                    reasons_label(&entry.score)
                );
            }
        }
        OutputData::SourceList(sources) => {
            for source in sources {
                println!("{}: {}", source.name, source.source_type.as_str());
            }
        }
        OutputData::ConfigInfo { path, config, .. } => {
            println!("# {}", path);
            println!("{}", serde_yaml::to_string(config)?);
        }
    }
    Ok(())
}

/// Get the terminal width, defaulting to 100 if detection fails
pub fn terminal_width() -> u16 {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0)
        .unwrap_or(100)
}

pub fn new_table(headers: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(terminal_width())
        .set_header(headers);
    table
}

/// Truncate text to `max_chars` characters, adding "..." if truncated
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else if max_chars > 3 {
        let kept: String = text.chars().take(max_chars - 3).collect();
        format!("{}...", kept)
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// `€250 000`, or `-` when unknown
pub fn price_label(price: Option<f64>) -> String {
    let Some(price) = price else {
        return "-".to_string();
    };
    let digits = format!("{:.0}", price);
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    format!("€{}", grouped)
}

pub fn area_label(area: Option<f64>) -> String {
    area.map(|a| format!("{:.0} m²", a))
        .unwrap_or_else(|| "-".to_string())
}

pub fn address_label(record: &PropertyRecord) -> String {
    let loc = &record.location;
    [&loc.address, &loc.parish, &loc.municipality, &loc.district]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or("-")
        .to_string()
}

pub fn reasons_label(score: &PropertyScore) -> String {
    score
        .reasons
        .iter()
        .map(|r| r.as_str().replace('_', " "))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_label() {
        assert_eq!(price_label(Some(250_000.0)), "€250 000");
        assert_eq!(price_label(Some(1_250_000.0)), "€1 250 000");
        assert_eq!(price_label(Some(950.0)), "€950");
        assert_eq!(price_label(None), "-");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("Rua das Flores", 40), "Rua das Flores");
        assert_eq!(truncate_text("Avenida da República", 10), "Avenida...");
    }
}
