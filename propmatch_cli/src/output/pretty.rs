//! Pretty terminal rendering: a title line, one table, then a dimmed
//! summary with anything that went wrong at the end where the eye settles.

use super::{
    address_label, area_label, new_table, price_label, reasons_label, terminal_width,
    truncate_text, ScoredListing,
};
use owo_colors::OwoColorize;
use propmatch_core::resolver::DuplicateGroup;
use propmatch_core::sources::SourceInfo;
use propmatch_core::SearchResults;

fn score_cell(score: f64, highlighted: bool) -> String {
    let text = format!("{:.1}", score);
    if highlighted {
        text.green().bold().to_string()
    } else if score < 40.0 {
        text.dimmed().to_string()
    } else {
        text
    }
}

/// Room left for the free-text column after the fixed ones.
fn flexible_width(fixed: usize) -> usize {
    (terminal_width() as usize).saturating_sub(fixed).max(20)
}

pub fn print_search_results(results: &SearchResults) {
    println!();
    println!(
        "{}  {}",
        "Search results".bold().cyan(),
        format!("({} mode)", results.mode).dimmed()
    );
    println!();

    if results.items.is_empty() {
        if results.all_sources_failed() {
            println!("{}", "Every source failed; no listings were retrieved.".red());
        } else if results.total > 0 {
            println!(
                "{}",
                format!(
                    "Page {} is past the last page ({}).",
                    results.page, results.total_pages
                )
                .yellow()
            );
        } else {
            println!("{}", "No listings match these filters.".yellow());
        }
    } else {
        let address_width = flexible_width(80);
        let mut table = new_table(vec![
            "#", "Score", "Price", "Area", "Type", "Address", "Portals", "Why",
        ]);
        let offset = (results.page - 1) * results.per_page;
        for (i, item) in results.items.iter().enumerate() {
            let record = &item.record;
            table.add_row(vec![
                (offset + i + 1).to_string(),
                score_cell(item.score.final_score, item.highlighted),
                price_label(record.known_price()),
                area_label(record.known_area()),
                record
                    .typology
                    .clone()
                    .or_else(|| record.property_type.map(|t| t.as_str().to_string()))
                    .unwrap_or_else(|| "-".to_string()),
                truncate_text(&address_label(record), address_width),
                item.portals.join(", "),
                reasons_label(&item.score),
            ]);
        }
        println!("{}", table);
    }

    println!();
    let stats = &results.stats;
    let mut summary = format!(
        "{} listings, page {}/{}",
        results.total,
        results.page,
        results.total_pages.max(1)
    );
    if let Some(avg) = stats.avg_price {
        summary.push_str(&format!(", avg {}", price_label(Some(avg))));
    }
    if let (Some(min), Some(max)) = (stats.min_price, stats.max_price) {
        summary.push_str(&format!(
            " (range {} - {})",
            price_label(Some(min)),
            price_label(Some(max))
        ));
    }
    println!("{}", summary.dimmed());
    println!(
        "{}",
        format!(
            "{} raw listings from {}/{} sources, {} duplicates merged in {}ms",
            results.total_raw,
            results.sources.succeeded.len(),
            results.sources.queried,
            results.duplicates_merged,
            results.duration_ms
        )
        .dimmed()
    );

    if !results.sources.failed.is_empty() {
        println!();
        for failure in &results.sources.failed {
            let kind = if failure.is_timeout { "timed out" } else { "failed" };
            println!(
                "  {} {} {}: {}",
                "⚠".yellow(),
                failure.source.bold(),
                kind,
                failure.error.dimmed()
            );
        }
    }
    println!();
}

pub fn print_groups(input: usize, groups: &[DuplicateGroup]) {
    println!();
    println!("{}", "Duplicate groups".bold().cyan());
    println!();

    if groups.is_empty() {
        println!("{}", "No duplicates found.".yellow());
    } else {
        let mut table = new_table(vec!["Primary", "Members", "Portals", "Confidence", "Evidence"]);
        for group in groups {
            table.add_row(vec![
                format!(
                    "{}\n{}",
                    group.primary.id,
                    truncate_text(&address_label(&group.primary), 40)
                ),
                group.member_ids[1..].join("\n"),
                group.sources.iter().cloned().collect::<Vec<_>>().join(", "),
                format!("{:.2}", group.confidence),
                group
                    .match_reasons
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ]);
        }
        println!("{}", table);
    }

    let merged: usize = groups.iter().map(|g| g.duplicates.len()).sum();
    println!();
    println!(
        "{}",
        format!(
            "{} listings, {} groups, {} unique properties",
            input,
            groups.len(),
            input - merged
        )
        .dimmed()
    );
    println!();
}

pub fn print_scores(scored: &[ScoredListing]) {
    println!();
    println!("{}", "Scores".bold().cyan());
    println!();

    if scored.is_empty() {
        println!("{}", "No listings to score.".yellow());
        println!();
        return;
    }

    let mut table = new_table(vec![
        "Listing", "Final", "Compat.", "Behavior", "Temporal", "Mode", "Conf.", "Why",
    ]);
    for entry in scored {
        let s = &entry.score;
        table.add_row(vec![
            entry.record.id.clone(),
            score_cell(s.final_score, false),
            format!("{:.1}", s.compatibility),
            format!("{:.1}", s.behavior),
            format!("{:.1}", s.temporal),
            format!("{:.1}", s.mode_score),
            format!("{:.2}", s.confidence),
            reasons_label(s),
        ]);
    }
    println!("{}", table);
    println!();
}

pub fn print_sources(sources: &[SourceInfo]) {
    println!();
    println!("{}", "Configured sources".bold().cyan());
    println!();

    let desc_width = flexible_width(40);
    let mut table = new_table(vec!["Name", "Type", "Description"]);
    for source in sources {
        table.add_row(vec![
            source.name.clone(),
            source.source_type.as_str().to_string(),
            truncate_text(&source.description, desc_width),
        ]);
    }
    println!("{}", table);
    println!();
}
