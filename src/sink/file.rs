use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use serde_json::json;

use super::{OptionSink, PersistOutcome, RunStats};
use crate::types::{Game, LaunchOption};

/// Test-mode sink: one pretty-printed JSON document per game plus a
/// run summary.
pub struct FileSink {
    output_dir: PathBuf,
}

impl FileSink {
    /// Create the sink, falling back to the current directory when the
    /// requested output directory cannot be created.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let requested = output_dir.into();

        let output_dir = if requested.is_dir() {
            requested
        } else {
            match fs::create_dir_all(&requested) {
                Ok(()) => {
                    tracing::info!(dir = %requested.display(), "created output directory");
                    requested
                }
                Err(e) => {
                    tracing::warn!(
                        dir = %requested.display(),
                        error = %e,
                        "cannot create output directory, falling back to current directory"
                    );
                    PathBuf::from("./")
                }
            }
        };

        Self { output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl OptionSink for FileSink {
    async fn existing_options(&self, _app_id: u32) -> anyhow::Result<Vec<LaunchOption>> {
        // File mode always re-extracts.
        Ok(Vec::new())
    }

    async fn persist(
        &mut self,
        game: &Game,
        options: &[LaunchOption],
    ) -> anyhow::Result<PersistOutcome> {
        let path = self.output_dir.join(format!("game_{}.json", game.appid));
        let payload = json!({
            "app_id": game.appid,
            "title": game.name,
            "options": options,
        });

        fs::write(&path, serde_json::to_string_pretty(&payload)?)
            .with_context(|| format!("writing {}", path.display()))?;

        tracing::debug!(path = %path.display(), count = options.len(), "wrote game results");

        Ok(PersistOutcome {
            saved: options.len(),
            failed: 0,
        })
    }

    async fn finish(&mut self, stats: &RunStats) -> anyhow::Result<()> {
        let path = self.output_dir.join("test_results.json");

        let mut payload = serde_json::to_value(stats)?;
        payload["generated_at"] = json!(chrono::Utc::now().to_rfc3339());

        fs::write(&path, serde_json::to_string_pretty(&payload)?)
            .with_context(|| format!("writing {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            games_processed = stats.games_processed,
            games_with_options = stats.games_with_options,
            total_options = stats.total_options_found,
            "wrote run summary"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{self, knowledge_base};
    use serde_json::Value;
    use std::collections::HashSet;

    #[tokio::test]
    async fn persists_game_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("results"));
        assert!(sink.output_dir().is_dir());

        let game = Game::new(570, "Dota 2");
        let options = vec![
            LaunchOption::new("-novid", "skip intro", "Common Source Engine"),
            LaunchOption::new("-console", "console", "Common Source Engine"),
        ];

        let outcome = sink.persist(&game, &options).await.unwrap();
        assert_eq!(outcome, PersistOutcome { saved: 2, failed: 0 });

        let raw = fs::read_to_string(sink.output_dir().join("game_570.json")).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["app_id"], 570);
        assert_eq!(value["title"], "Dota 2");
        let parsed: Vec<LaunchOption> =
            serde_json::from_value(value["options"].clone()).unwrap();
        assert_eq!(parsed, options);

        let mut stats = RunStats::default();
        stats.record_game(&game, &options);
        sink.finish(&stats).await.unwrap();

        let raw = fs::read_to_string(sink.output_dir().join("test_results.json")).unwrap();
        let summary: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(summary["games_processed"], 1);
        assert_eq!(summary["games_with_options"], 1);
        assert_eq!(summary["total_options_found"], 2);
        assert_eq!(summary["options_by_source"]["Common Source Engine"], 2);
        assert!(summary["generated_at"].is_string());
    }

    /// Counter-Strike 2 with both network sources dark still yields the
    /// static Source-engine bundle plus the general options.
    #[tokio::test]
    async fn counter_strike_static_fallback_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("out"));

        let game = Game::new(730, "Counter-Strike 2");
        let static_options = knowledge_base::fetch_options(&game.name, None);
        let merged = sources::merge_options([static_options, Vec::new(), Vec::new()]);

        assert_eq!(merged.len(), 8);

        sink.persist(&game, &merged).await.unwrap();

        let raw = fs::read_to_string(sink.output_dir().join("game_730.json")).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        let persisted: Vec<LaunchOption> =
            serde_json::from_value(value["options"].clone()).unwrap();

        assert_eq!(persisted.len(), 8);

        let commands: HashSet<String> = persisted
            .iter()
            .map(|o| o.command.trim().to_lowercase())
            .collect();
        assert_eq!(commands.len(), 8, "commands must be pairwise distinct");

        for expected in ["-novid", "-console", "-windowed", "-fullscreen", "-noborder"] {
            assert!(commands.contains(expected), "missing {expected}");
        }
        for expected in ["-fps_max", "-nojoy", "-nosplash"] {
            assert!(commands.contains(expected), "missing {expected}");
        }
    }

    #[test]
    fn falls_back_to_current_directory_when_creation_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocking_file = dir.path().join("occupied");
        fs::write(&blocking_file, "not a directory").unwrap();

        // A path through a regular file cannot be created.
        let sink = FileSink::new(blocking_file.join("results"));
        assert_eq!(sink.output_dir(), Path::new("./"));
    }
}
