use crate::cli::{Cli, OutputFormat};
use crate::commands::{config_store, load_config, Result};
use crate::output::{format_output, print_sources, OutputData};
use owo_colors::OwoColorize;
use propmatch_core::sources::SourceRegistry;

pub async fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let registry = SourceRegistry::from_config(&config.sources)?;
    let sources = registry.list();

    if sources.is_empty() && cli.output == OutputFormat::Pretty {
        println!("{}", "No sources configured".yellow());
        println!(
            "Add a `sources:` list to {} or pass {} to `propmatch search`.",
            config_store(cli).path().display().cyan(),
            "--fixtures <file.json>".cyan()
        );
        return Ok(());
    }

    match cli.output {
        OutputFormat::Pretty => print_sources(&sources),
        _ => format_output(&OutputData::SourceList(sources), &cli.output)?,
    }
    Ok(())
}
