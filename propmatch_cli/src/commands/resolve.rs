use crate::cli::{Cli, OutputFormat};
use crate::commands::{load_config, load_listings, CommandError, Result};
use crate::output::{format_output, print_groups, OutputData};
use propmatch_core::cpu_pool::spawn_cpu;
use propmatch_core::EntityResolver;
use std::path::Path;

pub async fn run(cli: &Cli, input: &Path, threshold: Option<f64>) -> Result<()> {
    let mut config = load_config(cli)?.resolver;
    if let Some(threshold) = threshold {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(CommandError::InvalidInput(
                "threshold must be within (0, 1]".to_string(),
            ));
        }
        config.threshold = threshold;
    }

    let records = load_listings(input)?;
    let count = records.len();
    let resolver = EntityResolver::new(config);
    let groups = spawn_cpu(move || Ok(resolver.resolve(&records))).await?;

    match cli.output {
        OutputFormat::Pretty => print_groups(count, &groups),
        _ => format_output(
            &OutputData::DuplicateGroups {
                input: count,
                groups,
            },
            &cli.output,
        )?,
    }
    Ok(())
}
