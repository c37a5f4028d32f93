pub mod database;
pub mod file;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::types::{Game, LaunchOption};

pub use database::DatabaseSink;
pub use file::FileSink;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("table `{table}` is not reachable; apply schema.sql first")]
    MissingTable {
        table: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of persisting one game's option set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub saved: usize,
    pub failed: usize,
}

/// Where finalized per-game option sets end up.
///
/// Two implementations: [`FileSink`] for test mode and [`DatabaseSink`]
/// for production. The orchestrator only talks to this trait.
#[async_trait]
pub trait OptionSink: Send {
    /// Options already stored for this game; a non-empty result lets the
    /// orchestrator skip extraction entirely (staleness is accepted).
    async fn existing_options(&self, app_id: u32) -> anyhow::Result<Vec<LaunchOption>>;

    async fn persist(&mut self, game: &Game, options: &[LaunchOption])
        -> anyhow::Result<PersistOutcome>;

    /// Called once at the end of the run with the final statistics.
    async fn finish(&mut self, stats: &RunStats) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub app_id: u32,
    pub title: String,
    pub options_count: usize,
    pub options: Vec<LaunchOption>,
}

/// Run-level aggregate, owned by the orchestrator.
#[derive(Debug, Default, Serialize)]
pub struct RunStats {
    pub games_processed: usize,
    pub games_with_options: usize,
    pub total_options_found: usize,
    pub options_by_source: BTreeMap<String, usize>,
    pub games: Vec<GameSummary>,
}

impl RunStats {
    /// Record one game's merged (post-dedup) result set.
    pub fn record_game(&mut self, game: &Game, options: &[LaunchOption]) {
        self.games_processed += 1;
        if !options.is_empty() {
            self.games_with_options += 1;
        }
        self.total_options_found += options.len();

        for option in options {
            *self
                .options_by_source
                .entry(option.source.clone())
                .or_insert(0) += 1;
        }

        self.games.push(GameSummary {
            app_id: game.appid,
            title: game.name.clone(),
            options_count: options.len(),
            options: options.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_games_and_sources() {
        let mut stats = RunStats::default();
        let game = Game::new(730, "Counter-Strike 2");

        let options = vec![
            LaunchOption::new("-novid", "skip intro", "Common Source Engine"),
            LaunchOption::new("-console", "console", "Common Source Engine"),
            LaunchOption::new("-fps_max", "cap fps", "Common Launch Option"),
        ];
        stats.record_game(&game, &options);
        stats.record_game(&Game::new(570, "Dota 2"), &[]);

        assert_eq!(stats.games_processed, 2);
        assert_eq!(stats.games_with_options, 1);
        assert_eq!(stats.total_options_found, 3);
        assert_eq!(stats.options_by_source["Common Source Engine"], 2);
        assert_eq!(stats.options_by_source["Common Launch Option"], 1);
        assert_eq!(stats.games.len(), 2);
        assert_eq!(stats.games[0].options_count, 3);
    }
}
