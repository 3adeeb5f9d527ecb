use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cxy-export")]
#[command(about = "Export collections and reports from the ChainXY location API", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $CXY_EXPORT_CONFIG or config/cxy-export.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify the configured API key
    Check,
    /// Export one or more stored collections, reusing fresh downloads
    Export(ExportArgs),
    /// Generate an analytical report
    Report(ReportArgs),
    /// Manage collections
    #[command(subcommand)]
    Collection(CollectionCommand),
    /// Export every recorded scrape of a chain
    History(HistoryArgs),
    /// List chains scraped after a date
    Chains(ChainsArgs),
    /// List locations updated after a date, walking every page
    Locations(LocationsArgs),
}

#[derive(Args, Debug, Default)]
pub struct SaveArgs {
    /// Download finished artifacts into the configured output directory
    #[arg(long)]
    pub save: bool,

    /// File name for the saved artifact (single artifact only)
    #[arg(long, requires = "save")]
    pub output: Option<String>,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Collection kind: chain or center
    #[arg(long, default_value = "chain")]
    pub kind: String,

    /// Collection ids
    #[arg(long = "id", required = true, num_args = 1..)]
    pub ids: Vec<String>,

    /// Maximum age in hours of a download that may be reused (0 forces a new one)
    #[arg(long)]
    pub cache_hours: Option<f64>,

    /// CSV, ZIP_CSV or XLSX
    #[arg(long)]
    pub format: Option<String>,

    /// Vintage of the data, YYYY-MM-DD
    #[arg(long)]
    pub data_date: Option<NaiveDate>,

    /// Split the export into one layer per chain
    #[arg(long)]
    pub split_layers: bool,

    /// Parallel exports when several ids are given
    #[arg(long)]
    pub concurrency: Option<usize>,

    #[command(flatten)]
    pub save: SaveArgs,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    #[command(subcommand)]
    pub report: ReportCommand,

    #[command(flatten)]
    pub save: SaveArgs,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Locations added and removed between two dates (XLSX)
    ChangesOverTime {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        count_by_state: bool,
        #[arg(long)]
        count_by_store_type: bool,
        #[arg(long)]
        no_change_log: bool,
    },
    /// Distance from each target location to the nearest source-chain locations
    Nearest {
        /// Target collection id
        #[arg(long)]
        collection: String,
        /// Source chain id (exactly one)
        #[arg(long = "source", required = true)]
        sources: Vec<String>,
        /// Number of nearest locations
        #[arg(long, default_value_t = 1)]
        n: u32,
        /// Report per location instead of aggregating
        #[arg(long)]
        no_aggregate: bool,
    },
    /// Chains missing from a trade area compared to a benchmark geography
    VoidAnalysis {
        #[arg(long)]
        collection: String,
        /// Trade area radius in miles
        #[arg(long)]
        radius: f64,
        /// 1 country, 2 state/province, 3 CBSA/CMA, 4 county, 5 DMA
        #[arg(long)]
        admin_level: u8,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Category, NAICS or SIC
        #[arg(long, default_value = "Category")]
        categorization: String,
        #[arg(long)]
        label: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CollectionCommand {
    /// Create a collection from chain ids or a chains query
    Create(CreateCollectionArgs),
}

#[derive(Args, Debug)]
pub struct CreateCollectionArgs {
    #[arg(long)]
    pub label: String,

    #[arg(long)]
    pub comments: Option<String>,

    /// Explicit chain id (repeatable); conflicts with --query
    #[arg(long = "chain")]
    pub chains: Vec<String>,

    /// Chains query as JSON, e.g. '{"Categories":{"Id":[154,180]}}'
    #[arg(long)]
    pub query: Option<String>,

    /// Geographic entity id (repeatable)
    #[arg(long = "admin-level")]
    pub admin_levels: Vec<i64>,

    #[arg(long)]
    pub include_closed: Option<bool>,

    #[arg(long)]
    pub include_coming_soon: Option<bool>,

    #[arg(long)]
    pub include_poi: Option<bool>,

    /// Export the new collection once created
    #[arg(long)]
    pub download: bool,

    #[arg(long)]
    pub data_date: Option<NaiveDate>,

    #[command(flatten)]
    pub save: SaveArgs,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[arg(long)]
    pub chain: String,

    /// Maximum number of scrapes to export
    #[arg(long, default_value_t = cxy_export::history::DEFAULT_HISTORY_LIMIT)]
    pub limit: u32,

    /// Save every scrape into the output directory
    #[arg(long)]
    pub save: bool,
}

#[derive(Args, Debug)]
pub struct ChainsArgs {
    /// Only chains scraped after this date, YYYY-MM-DD
    #[arg(long)]
    pub since: NaiveDate,

    /// Restrict to these chain ids
    #[arg(long = "chain", num_args = 1..)]
    pub chains: Vec<String>,

    /// Write Name, Id and LastScrapeDate to this file in the output directory
    /// (.json for JSON, CSV otherwise) instead of printing
    #[arg(long)]
    pub output: Option<String>,
}

#[derive(Args, Debug)]
pub struct LocationsArgs {
    /// Only locations updated after this date, YYYY-MM-DD
    #[arg(long)]
    pub since: NaiveDate,

    /// Restrict to these chain ids
    #[arg(long = "chain", num_args = 1..)]
    pub chains: Vec<String>,

    #[arg(long, allow_negative_numbers = true, default_value_t = 90.0)]
    pub north: f64,

    #[arg(long, allow_negative_numbers = true, default_value_t = 180.0)]
    pub east: f64,

    #[arg(long, allow_negative_numbers = true, default_value_t = -90.0)]
    pub south: f64,

    #[arg(long, allow_negative_numbers = true, default_value_t = -180.0)]
    pub west: f64,

    /// Records per page; -1 fetches everything at once
    #[arg(long, allow_negative_numbers = true, default_value_t = cxy_export::listings::DEFAULT_PAGE_SIZE)]
    pub limit: i64,

    /// Write every record to this file in the output directory (.json for
    /// JSON, CSV otherwise) instead of printing
    #[arg(long)]
    pub output: Option<String>,
}
