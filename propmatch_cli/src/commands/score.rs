use crate::cli::{Cli, HintArgs, OutputFormat};
use crate::commands::{load_config, load_listings, parse_mode, Result};
use crate::output::{format_output, print_scores, OutputData, ScoredListing};
use propmatch_core::cpu_pool::spawn_cpu;
use propmatch_core::scoring::MarketSnapshot;
use propmatch_core::{RelevanceScorer, ScoringContext};
use std::path::Path;

pub async fn run(cli: &Cli, input: &Path, hints: &HintArgs, mode: &str) -> Result<()> {
    let config = load_config(cli)?;
    let query = hints.to_query()?;
    query.validate()?;
    let mode = parse_mode(mode)?;

    let records = load_listings(input)?;
    let ctx = ScoringContext::new(mode)
        .with_hints(query.hints())
        .with_market(MarketSnapshot::from_records(&records));
    let scorer = RelevanceScorer::new(config.scoring);

    let mut scored = spawn_cpu(move || {
        let scores = scorer.score_all(&records, &ctx);
        Ok(records
            .into_iter()
            .zip(scores)
            .map(|(record, score)| ScoredListing { record, score })
            .collect::<Vec<_>>())
    })
    .await?;
    scored.sort_by(|a, b| {
        b.score
            .final_score
            .total_cmp(&a.score.final_score)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });

    match cli.output {
        OutputFormat::Pretty => print_scores(&scored),
        _ => format_output(&OutputData::Scores(scored), &cli.output)?,
    }
    Ok(())
}
