use clap::Parser;

/// Steam launch-options scraper.
#[derive(Debug, Parser)]
#[command(name = "slop-scraper", version, about = "Collects candidate launch options for Steam games")]
pub struct Args {
    /// Run in test mode: write JSON files instead of the database.
    #[arg(long)]
    pub test: bool,

    /// Maximum number of games to process.
    #[arg(long, default_value_t = 5)]
    pub limit: usize,

    /// Delay in seconds applied before each outbound request.
    #[arg(long, default_value_t = 2.0)]
    pub rate: f64,

    /// Output directory for test-mode results.
    #[arg(long, default_value = "./test-output")]
    pub output: String,

    /// Re-scrape games that already have stored options.
    #[arg(long)]
    pub force_refresh: bool,

    /// Test the database connection and exit.
    #[arg(long)]
    pub test_db: bool,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}
