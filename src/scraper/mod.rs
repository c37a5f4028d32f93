use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

use crate::cache::AppCache;
use crate::config::Settings;
use crate::sink::{DatabaseSink, FileSink, OptionSink, RunStats};
use crate::sources::{self, knowledge_base, pcgamingwiki, steam_community, SourceContext};
use crate::steam;
use crate::types::{Game, LaunchOption};

/// Cache is flushed to disk after this many games.
const CACHE_SAVE_INTERVAL: usize = 3;

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub test_mode: bool,
    pub limit: usize,
    pub rate_limit_secs: f64,
    pub output_dir: PathBuf,
    pub force_refresh: bool,
}

/// Drives the whole run: game list, per-game extraction, merge, sink.
pub struct ScrapeRunner {
    opts: ScrapeOptions,
    ctx: SourceContext,
    cache: AppCache,
    sink: Box<dyn OptionSink>,
    stats: RunStats,
}

impl ScrapeRunner {
    pub async fn new(settings: &Settings, opts: ScrapeOptions) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&settings.scraper.user_agent)
            .build()
            .context("building http client")?;

        let rate_limit =
            (opts.rate_limit_secs > 0.0).then(|| Duration::from_secs_f64(opts.rate_limit_secs));

        let ctx = SourceContext::new(
            client,
            rate_limit,
            Duration::from_secs(settings.scraper.page_timeout_secs),
            Duration::from_secs(settings.scraper.guide_timeout_secs),
            Duration::from_secs(settings.scraper.store_timeout_secs),
        );

        let cache = AppCache::load(&settings.scraper.cache_file);

        let (sink, opts) = select_sink(settings, opts).await;

        Ok(Self {
            opts,
            ctx,
            cache,
            sink,
            stats: RunStats::default(),
        })
    }

    pub fn is_test_mode(&self) -> bool {
        self.opts.test_mode
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mode = if self.opts.test_mode { "TEST" } else { "PRODUCTION" };
        tracing::info!(mode, limit = self.opts.limit, "starting run");

        let result = self.run_inner().await;
        if result.is_err() {
            // Keep whatever was collected before the failure.
            self.flush().await;
        }
        result
    }

    async fn run_inner(&mut self) -> anyhow::Result<()> {
        let games = steam::fetch_game_list(
            &self.ctx,
            &mut self.cache,
            self.opts.limit,
            self.opts.force_refresh,
            self.opts.test_mode,
        )
        .await?;

        for (index, game) in games.iter().enumerate() {
            if let Err(e) = self.process_game(game).await {
                tracing::error!(
                    appid = game.appid,
                    name = %game.name,
                    error = %e,
                    "game processing failed, continuing"
                );
            }

            if (index + 1) % CACHE_SAVE_INTERVAL == 0 {
                if let Err(e) = self.cache.save() {
                    tracing::warn!(error = %e, "periodic cache save failed");
                }
            }
        }

        self.sink.finish(&self.stats).await?;
        if let Err(e) = self.cache.save() {
            tracing::warn!(error = %e, "final cache save failed");
        }

        Ok(())
    }

    async fn process_game(&mut self, game: &Game) -> anyhow::Result<()> {
        let existing = match self.sink.existing_options(game.appid).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(appid = game.appid, error = %e, "existing-options lookup failed");
                Vec::new()
            }
        };

        if !existing.is_empty() && !self.opts.force_refresh {
            tracing::info!(
                name = %game.name,
                count = existing.len(),
                "skipping, options already stored"
            );
            return Ok(());
        }

        let options = self.collect_options(game).await;
        tracing::info!(name = %game.name, count = options.len(), "unique launch options found");

        self.stats.record_game(game, &options);

        let outcome = self.sink.persist(game, &options).await?;
        if outcome.failed > 0 {
            tracing::warn!(
                name = %game.name,
                failed = outcome.failed,
                "some options failed to persist"
            );
        }

        Ok(())
    }

    /// Collect from every source in priority order; a failing source
    /// contributes nothing instead of aborting the game.
    async fn collect_options(&self, game: &Game) -> Vec<LaunchOption> {
        let static_options = knowledge_base::fetch_options(&game.name, self.cache.get(game.appid));
        if !static_options.is_empty() {
            tracing::debug!(count = static_options.len(), "added knowledge-base options");
        }

        let wiki_options = match pcgamingwiki::fetch_options(&self.ctx, &game.name).await {
            Ok(options) => options,
            Err(e) => {
                tracing::warn!(error = %e, "[PCGamingWiki] source failed");
                Vec::new()
            }
        };

        let community_options = match steam_community::fetch_options(&self.ctx, game.appid).await {
            Ok(options) => options,
            Err(e) => {
                tracing::warn!(error = %e, "[Steam Community] source failed");
                Vec::new()
            }
        };

        sources::merge_options([static_options, wiki_options, community_options])
    }

    /// Best-effort flush of cache and summary, used on the error and
    /// interrupt paths.
    pub async fn flush(&mut self) {
        if let Err(e) = self.cache.save() {
            tracing::warn!(error = %e, "cache save failed during flush");
        }
        if let Err(e) = self.sink.finish(&self.stats).await {
            tracing::warn!(error = %e, "summary flush failed");
        }
    }
}

/// Pick the sink for this run. Production mode needs a reachable,
/// provisioned database; anything less falls back to file output so the
/// run still produces something useful.
async fn select_sink(
    settings: &Settings,
    mut opts: ScrapeOptions,
) -> (Box<dyn OptionSink>, ScrapeOptions) {
    if opts.test_mode {
        return (Box::new(FileSink::new(&opts.output_dir)), opts);
    }

    match &settings.database.url {
        Some(url) => match DatabaseSink::connect(url).await {
            Ok(sink) => (Box::new(sink), opts),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "database unavailable, falling back to test mode; check database.url \
                     (or SLOP__DATABASE__URL) and that schema.sql has been applied"
                );
                opts.test_mode = true;
                (Box::new(FileSink::new(&opts.output_dir)), opts)
            }
        },
        None => {
            tracing::warn!(
                "no database url configured, falling back to test mode; set database.url \
                 in config/local.yaml or SLOP__DATABASE__URL"
            );
            opts.test_mode = true;
            (Box::new(FileSink::new(&opts.output_dir)), opts)
        }
    }
}
