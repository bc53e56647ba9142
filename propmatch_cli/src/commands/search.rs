use crate::cli::{Cli, OutputFormat, SearchArgs};
use crate::commands::{build_registry, load_config, parse_mode, CommandError, Result};
use crate::output::{format_output, print_search_results, OutputData};
use indicatif::{ProgressBar, ProgressStyle};
use propmatch_core::{SearchEngine, SearchOptions, SearchQuery, SortOrder, TransactionType};
use std::time::Duration;

pub async fn run(cli: &Cli, args: &SearchArgs) -> Result<()> {
    let config = load_config(cli)?;
    let registry = build_registry(&config, &args.fixtures)?;
    if registry.is_empty() {
        return Err(CommandError::NoSources(
            crate::commands::config_store(cli).path().display().to_string(),
        ));
    }

    let query = build_query(args)?;
    let options = build_options(args)?;
    let engine = SearchEngine::from_config(registry, &config);

    // Keep stdout clean for machine-readable formats.
    let spinner = if cli.output == OutputFormat::Pretty {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!(
        "Searching {} source(s)...",
        engine.aggregator().registry().len()
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let results = engine.search(&query, &options).await;
    spinner.finish_and_clear();
    let results = results?;

    match cli.output {
        OutputFormat::Pretty => print_search_results(&results),
        _ => format_output(&OutputData::SearchResults(Box::new(results)), &cli.output)?,
    }
    Ok(())
}

pub fn build_query(args: &SearchArgs) -> Result<SearchQuery> {
    let transaction_type = args
        .transaction
        .as_deref()
        .map(|raw| {
            TransactionType::parse(raw).ok_or_else(|| {
                CommandError::InvalidInput(format!(
                    "unknown transaction type '{}' (expected sale or rent)",
                    raw
                ))
            })
        })
        .transpose()?;

    Ok(SearchQuery {
        transaction_type,
        bedrooms: args.bedrooms,
        min_bedrooms: args.min_bedrooms,
        max_bedrooms: args.max_bedrooms,
        typologies: args.typologies.clone(),
        features: args.features.clone(),
        portals: args.portals.clone(),
        min_mode_score: args.min_mode_score,
        ..args.hints.to_query()?
    })
}

pub fn build_options(args: &SearchArgs) -> Result<SearchOptions> {
    let sort = SortOrder::parse(&args.sort)
        .ok_or_else(|| CommandError::InvalidInput(format!("unknown sort order '{}'", args.sort)))?;
    let sources = args
        .sources
        .as_deref()
        .map(|s| {
            s.split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(SearchOptions {
        page: args.page,
        per_page: args.per_page,
        sort,
        mode: parse_mode(&args.mode)?,
        enable_scoring: !args.no_scoring,
        sources,
        timeout_ms: args.timeout_ms,
        deduplicate: if args.no_dedup { Some(false) } else { None },
        ..SearchOptions::default()
    })
}
