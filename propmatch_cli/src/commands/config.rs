use crate::cli::{Cli, ConfigAction, OutputFormat};
use crate::commands::{config_store, CommandError, Result};
use crate::output::{format_output, OutputData};
use owo_colors::OwoColorize;
use propmatch_core::EngineConfig;

pub async fn run(cli: &Cli, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => {
            println!("{}", config_store(cli).path().display());
            Ok(())
        }
        ConfigAction::Init { force } => init_config(cli, force),
        ConfigAction::Validate => validate_config(cli),
    }
}

fn show_config(cli: &Cli) -> Result<()> {
    let store = config_store(cli);
    let config = store.load()?;
    let output_data = OutputData::ConfigInfo {
        path: store.path().display().to_string(),
        exists: store.exists(),
        config,
    };

    match cli.output {
        OutputFormat::Pretty => {
            if let OutputData::ConfigInfo { path, exists, config } = &output_data {
                println!();
                println!("{}", "Configuration".bold().cyan());
                println!("{}", "=============".cyan());
                println!();
                if *exists {
                    println!("Config file: {}", path.dimmed());
                } else {
                    println!(
                        "Config file: {} {}",
                        path.dimmed(),
                        "(not found, using defaults)".yellow()
                    );
                }
                println!();
                print!("{}", serde_yaml::to_string(config)?);
                println!();
            }
        }
        _ => format_output(&output_data, &cli.output)?,
    }
    Ok(())
}

fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let store = config_store(cli);
    if store.exists() && !force {
        return Err(CommandError::InvalidInput(format!(
            "{} already exists (use --force to overwrite)",
            store.path().display()
        )));
    }
    store.save(&EngineConfig::default())?;
    println!(
        "{} Wrote default configuration to {}",
        "✓".green(),
        store.path().display()
    );
    Ok(())
}

fn validate_config(cli: &Cli) -> Result<()> {
    let store = config_store(cli);
    if !store.exists() {
        println!(
            "{} {} not found; defaults are in effect",
            "⚠".yellow(),
            store.path().display()
        );
        return Ok(());
    }
    let config = store.load()?;
    println!(
        "{} {} is valid ({} source(s))",
        "✓".green(),
        store.path().display(),
        config.sources.len()
    );
    Ok(())
}
