use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use slop_scraper::cli::Args;
use slop_scraper::config::Settings;
use slop_scraper::scraper::{ScrapeOptions, ScrapeRunner};
use slop_scraper::sink::DatabaseSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::new()?;

    let filter = if args.debug {
        "debug".to_string()
    } else {
        settings.logging.level.clone()
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .parse_lossy(&filter),
        )
        .init();

    tracing::info!("starting slop-scraper");

    if args.test_db {
        return run_connection_test(&settings, args.test).await;
    }

    let opts = ScrapeOptions {
        test_mode: args.test,
        limit: args.limit,
        rate_limit_secs: args.rate,
        output_dir: args.output.clone().into(),
        force_refresh: args.force_refresh,
    };

    let mut runner = ScrapeRunner::new(&settings, opts).await?;

    let mut interrupted = false;
    let mut run_result = Ok(());

    tokio::select! {
        r = runner.run() => {
            run_result = r;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, saving cache and collected data");
            interrupted = true;
        }
    }

    if interrupted {
        runner.flush().await;
        tracing::info!("cleanup complete, exiting");
        std::process::exit(1);
    }

    run_result
}

async fn run_connection_test(settings: &Settings, test_mode: bool) -> anyhow::Result<()> {
    if test_mode {
        tracing::info!("test mode, database connection not required");
        return Ok(());
    }

    let Some(url) = &settings.database.url else {
        tracing::error!(
            "no database url configured; set database.url in config/local.yaml \
             or SLOP__DATABASE__URL"
        );
        std::process::exit(1);
    };

    match DatabaseSink::connect(url).await {
        Ok(sink) => {
            sink.ping().await?;
            tracing::info!("database connection test successful");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "database connection test failed");
            std::process::exit(1);
        }
    }
}
