use clap::Parser;
use owo_colors::OwoColorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use commands::*;

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "propmatch_cli=info,propmatch_core=warn",
        1 => "propmatch_cli=debug,propmatch_core=debug",
        _ => "propmatch_cli=trace,propmatch_core=trace",
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over -v
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        None => show_overview(&cli).await,
        Some(Commands::Search(args)) => search::run(&cli, args).await,
        Some(Commands::Resolve { input, threshold }) => {
            resolve::run(&cli, input, *threshold).await
        }
        Some(Commands::Score { input, hints, mode }) => score::run(&cli, input, hints, mode).await,
        Some(Commands::Sources) => sources::run(&cli).await,
        Some(Commands::Config { action }) => config::run(&cli, action.clone()).await,
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        process::exit(1);
    }
}

async fn show_overview(cli: &Cli) -> commands::Result<()> {
    println!();
    println!(
        "{}  {}",
        "propmatch".bold().cyan(),
        "- multi-source property search".dimmed()
    );
    println!();

    let store = config_store(cli);
    let config = store.load()?;
    let enabled = config.sources.iter().filter(|s| s.enabled).count();
    println!(
        "  {} {}",
        "Config:".bold(),
        if store.exists() {
            store.path().display().to_string()
        } else {
            format!("{} (defaults)", store.path().display())
        }
    );
    println!(
        "  {} {} enabled of {} configured",
        "Sources:".bold(),
        enabled.to_string().green(),
        config.sources.len()
    );
    println!(
        "  {} threshold {}, timeout {}ms, {} per page",
        "Engine:".bold(),
        config.resolver.threshold,
        config.aggregator.timeout_ms,
        config.search.per_page
    );
    println!();
    println!("Run {} for usage.", "propmatch --help".cyan());
    println!();
    Ok(())
}
