use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "propmatch")]
#[command(about = "propmatch - multi-source property search with duplicate resolution and ranking")]
#[command(version)]
#[command(after_help = "\x1b[1;36mQuick Start:\x1b[0m
  propmatch sources                              List configured sources
  propmatch search --district Lisboa             Search every configured source
  propmatch search -f idealista.json -f crm.json Search local fixture files
  propmatch resolve listings.json                Show duplicate groups
  propmatch score listings.json --mode sale-matching

\x1b[1;36mConfiguration:\x1b[0m
  propmatch config init                          Write a default config file
  propmatch config show                          Print the effective configuration
  propmatch config validate                      Check the config file")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    /// Config file (defaults to ~/.config/propmatch/config.yaml)
    #[arg(long, global = true, env = "PROPMATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v debug for the engine, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query sources, merge duplicates, score and rank the results
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  propmatch search --district Lisboa --max-price 300000
  propmatch search --type apartment --typology T2 --typology T3 --sort price-asc
  propmatch search -f fixtures/idealista.json -f fixtures/crm.json --mode sale-matching
  propmatch search --sources idealista,imovirtual --timeout-ms 5000 --output json")]
    Search(SearchArgs),

    /// Group duplicate listings from a JSON file
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  propmatch resolve listings.json
  propmatch resolve listings.json --threshold 0.9 --output json")]
    Resolve {
        /// JSON file: an array of listings or an object wrapping one
        input: PathBuf,
        /// Similarity threshold override (0-1]
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Score listings from a JSON file and explain each score
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  propmatch score listings.json
  propmatch score listings.json --mode sale-matching --district Porto --max-price 250000")]
    Score {
        /// JSON file: an array of listings or an object wrapping one
        input: PathBuf,
        #[command(flatten)]
        hints: HintArgs,
        /// Scoring mode (prospecting, sale-matching)
        #[arg(short, long, default_value = "prospecting")]
        mode: String,
    },

    /// List configured sources
    #[command(alias = "ls")]
    Sources,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Filters shared by `search` and `score`.
#[derive(Args, Clone, Debug, Default)]
pub struct HintArgs {
    /// Property type (repeatable): apartment, house, land, ...
    #[arg(short = 't', long = "type")]
    pub property_types: Vec<String>,
    #[arg(long)]
    pub district: Option<String>,
    #[arg(long)]
    pub municipality: Option<String>,
    #[arg(long)]
    pub parish: Option<String>,
    #[arg(long)]
    pub min_price: Option<f64>,
    #[arg(long)]
    pub max_price: Option<f64>,
    #[arg(long)]
    pub min_area: Option<f64>,
    #[arg(long)]
    pub max_area: Option<f64>,
}

#[derive(Args, Clone, Debug)]
pub struct SearchArgs {
    #[command(flatten)]
    pub hints: HintArgs,

    /// Local JSON fixture used as a source, named after the file (repeatable)
    #[arg(short = 'f', long = "fixtures")]
    pub fixtures: Vec<PathBuf>,

    /// Comma-separated subset of sources to query
    #[arg(short = 's', long)]
    pub sources: Option<String>,

    /// sale or rent
    #[arg(long)]
    pub transaction: Option<String>,
    /// Exact bedroom count
    #[arg(long)]
    pub bedrooms: Option<u32>,
    #[arg(long)]
    pub min_bedrooms: Option<u32>,
    #[arg(long)]
    pub max_bedrooms: Option<u32>,
    /// Typology such as T2 (repeatable)
    #[arg(long = "typology")]
    pub typologies: Vec<String>,
    /// Required feature (repeatable)
    #[arg(long = "feature")]
    pub features: Vec<String>,
    /// Keep listings present on this portal (repeatable)
    #[arg(long = "portal")]
    pub portals: Vec<String>,
    /// Minimum mode score (0-100)
    #[arg(long)]
    pub min_mode_score: Option<f64>,

    /// Scoring mode (prospecting, sale-matching)
    #[arg(short, long, default_value = "prospecting")]
    pub mode: String,
    /// score, price-asc, price-desc, area-asc, area-desc, recent, portal-count
    #[arg(long, default_value = "score")]
    pub sort: String,
    #[arg(short, long, default_value_t = 1)]
    pub page: usize,
    #[arg(long)]
    pub per_page: Option<usize>,
    /// Per-source timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Skip relevance scoring (every listing gets a neutral score)
    #[arg(long)]
    pub no_scoring: bool,
    /// Keep duplicates from different sources as separate listings
    #[arg(long)]
    pub no_dedup: bool,
}

#[derive(Subcommand, Clone)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Write the default configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Parse and validate the config file
    Validate,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Pretty,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Plain text output
    Text,
}
