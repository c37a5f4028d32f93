use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::{OptionSink, PersistOutcome, RunStats, SinkError};
use crate::retry::RetryPolicy;
use crate::sources::{knowledge_base, pcgamingwiki, steam_community};
use crate::types::{Game, LaunchOption};

/// Reference reliability scores, seeded once into the `sources` table.
const SOURCE_SEED: &[(&str, &str, f32)] = &[
    (
        pcgamingwiki::SOURCE,
        "Launch options from PCGamingWiki pages",
        0.9,
    ),
    (
        steam_community::SOURCE,
        "Launch options from Steam community guides",
        0.7,
    ),
    (
        knowledge_base::SOURCE_ENGINE_LABEL,
        "Common launch options for Source engine games",
        0.8,
    ),
    (
        knowledge_base::UNITY_ENGINE_LABEL,
        "Common launch options for Unity engine games",
        0.8,
    ),
    (
        knowledge_base::UNREAL_ENGINE_LABEL,
        "Common launch options for Unreal engine games",
        0.8,
    ),
    (
        knowledge_base::COMMON_LABEL,
        "Generic launch options that work across many games",
        0.6,
    ),
];

const REQUIRED_TABLES: &[&str] = &["games", "launch_options", "game_launch_options"];

/// Production sink: games, options and their associations live in
/// Postgres. All writes are upserts, so re-running a scrape is idempotent.
pub struct DatabaseSink {
    pool: PgPool,
    retry: RetryPolicy,
}

impl DatabaseSink {
    pub async fn connect(url: &str) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(SinkError::Connect)?;

        verify_structure(&pool).await?;
        seed_sources(&pool).await?;

        tracing::info!("connected to database");

        Ok(Self {
            pool,
            retry: RetryPolicy::new(3, Duration::from_millis(500)),
        })
    }

    pub async fn ping(&self) -> Result<(), SinkError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn verify_structure(pool: &PgPool) -> Result<(), SinkError> {
    for table in REQUIRED_TABLES {
        sqlx::query(&format!("SELECT 1 FROM {table} LIMIT 1"))
            .fetch_optional(pool)
            .await
            .map_err(|source| SinkError::MissingTable {
                table: table.to_string(),
                source,
            })?;
    }

    tracing::info!("database structure verified");
    Ok(())
}

/// Populate the reference `sources` table, skipped when already seeded.
async fn seed_sources(pool: &PgPool) -> Result<(), SinkError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        tracing::debug!(count, "sources table already populated");
        return Ok(());
    }

    for &(name, description, score) in SOURCE_SEED {
        sqlx::query("INSERT INTO sources (name, description, reliability_score) VALUES ($1, $2, $3)")
            .bind(name)
            .bind(description)
            .bind(score)
            .execute(pool)
            .await?;
    }

    tracing::info!(count = SOURCE_SEED.len(), "seeded sources table");
    Ok(())
}

#[async_trait]
impl OptionSink for DatabaseSink {
    async fn existing_options(&self, app_id: u32) -> anyhow::Result<Vec<LaunchOption>> {
        let rows = sqlx::query(
            "SELECT lo.command, lo.description, lo.source, lo.verified \
             FROM game_launch_options glo \
             JOIN launch_options lo ON lo.id = glo.launch_option_id \
             WHERE glo.game_app_id = $1",
        )
        .bind(app_id as i64)
        .fetch_all(&self.pool)
        .await
        .context("querying existing options")?;

        Ok(rows
            .into_iter()
            .map(|row| LaunchOption {
                command: row.get("command"),
                description: row.get("description"),
                source: row.get("source"),
                verified: row.get("verified"),
            })
            .collect())
    }

    async fn persist(
        &mut self,
        game: &Game,
        options: &[LaunchOption],
    ) -> anyhow::Result<PersistOutcome> {
        sqlx::query(
            "INSERT INTO games (app_id, title, developer, publisher, release_date, engine) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (app_id) DO UPDATE SET \
                 title = EXCLUDED.title, \
                 developer = EXCLUDED.developer, \
                 publisher = EXCLUDED.publisher, \
                 release_date = EXCLUDED.release_date, \
                 engine = EXCLUDED.engine",
        )
        .bind(game.appid as i64)
        .bind(&game.name)
        .bind(&game.developer)
        .bind(&game.publisher)
        .bind(&game.release_date)
        .bind(&game.engine)
        .execute(&self.pool)
        .await
        .with_context(|| format!("upserting game {}", game.appid))?;

        tracing::debug!(appid = game.appid, name = %game.name, "upserted game");

        let mut saved = 0usize;
        let mut failed = 0usize;

        for option in options {
            let pool = &self.pool;
            let app_id = game.appid as i64;

            // Each option is an upsert returning the canonical id, then an
            // association insert; both retried together. `verified` is left
            // alone on conflict so curator confirmations survive re-scrapes.
            let result = self
                .retry
                .run(|| async move {
                    let option_id: i64 = sqlx::query_scalar(
                        "INSERT INTO launch_options (command, description, source, verified) \
                         VALUES ($1, $2, $3, $4) \
                         ON CONFLICT (command) DO UPDATE SET \
                             description = EXCLUDED.description, \
                             source = EXCLUDED.source \
                         RETURNING id",
                    )
                    .bind(&option.command)
                    .bind(&option.description)
                    .bind(&option.source)
                    .bind(option.verified)
                    .fetch_one(pool)
                    .await?;

                    sqlx::query(
                        "INSERT INTO game_launch_options (game_app_id, launch_option_id) \
                         VALUES ($1, $2) \
                         ON CONFLICT (game_app_id, launch_option_id) DO NOTHING",
                    )
                    .bind(app_id)
                    .bind(option_id)
                    .execute(pool)
                    .await?;

                    Ok::<_, sqlx::Error>(())
                })
                .await;

            match result {
                Ok(()) => saved += 1,
                Err(e) => {
                    tracing::error!(
                        command = %option.command,
                        error = %e,
                        "failed to save option after retries"
                    );
                    failed += 1;
                }
            }
        }

        if options.is_empty() {
            tracing::info!(game = %game.name, "no options to save");
        } else {
            let rate = saved as f64 / options.len() as f64 * 100.0;
            tracing::info!(
                game = %game.name,
                saved,
                failed,
                "saved {}/{} options ({:.1}%)",
                saved,
                options.len(),
                rate
            );
        }

        Ok(PersistOutcome { saved, failed })
    }

    async fn finish(&mut self, stats: &RunStats) -> anyhow::Result<()> {
        tracing::info!(
            games_processed = stats.games_processed,
            games_with_options = stats.games_with_options,
            total_options = stats.total_options_found,
            "database run complete"
        );
        Ok(())
    }
}
