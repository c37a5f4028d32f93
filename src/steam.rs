use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use serde_json::Value;

use crate::cache::AppCache;
use crate::sources::SourceContext;
use crate::types::Game;

const APP_LIST_URL: &str = "https://api.steampowered.com/ISteamApps/GetAppList/v2/";
const STORE_URL: &str = "https://store.steampowered.com/api/appdetails";

/// Name fragments that mark an app as not worth scraping.
const BLOCKLIST_TERMS: &[&str] = &[
    "dlc",
    "soundtrack",
    "beta",
    "demo",
    "test",
    "adult",
    "hentai",
    "xxx",
    "mature",
    "expansion",
    "tool",
    "software",
];

const KNOWN_ENGINES: &[&str] = &[
    "unreal",
    "unity",
    "godot",
    "source",
    "cryengine",
    "frostbite",
    "id tech",
];

#[derive(Debug, Deserialize)]
struct AppList {
    applist: Apps,
}

#[derive(Debug, Deserialize)]
struct Apps {
    apps: Vec<AppEntry>,
}

#[derive(Debug, Deserialize)]
struct AppEntry {
    appid: u32,
    name: String,
}

/// Fixed game list used in test mode so runs are reproducible offline.
fn test_game_list(limit: usize) -> Vec<Game> {
    [
        (570, "Dota 2"),
        (730, "Counter-Strike 2"),
        (264710, "Subnautica"),
        (377840, "Final Fantasy IX"),
        (1868140, "Dave the Diver"),
    ]
    .iter()
    .take(limit)
    .map(|(appid, name)| Game::new(*appid, *name))
    .collect()
}

/// Fetch and filter the Steam game list, consulting the cache for store
/// metadata. Successful store lookups are written back to the cache; a
/// failed lookup leaves any prior entry untouched.
#[tracing::instrument(skip(ctx, cache))]
pub async fn fetch_game_list(
    ctx: &SourceContext,
    cache: &mut AppCache,
    limit: usize,
    force_refresh: bool,
    test_mode: bool,
) -> anyhow::Result<Vec<Game>> {
    tracing::info!(limit, force_refresh, "fetching game list");

    if test_mode && limit <= 10 {
        return Ok(test_game_list(limit));
    }

    let response = ctx
        .client
        .get(APP_LIST_URL)
        .timeout(ctx.page_timeout)
        .send()
        .await
        .context("requesting app list")?
        .error_for_status()
        .context("app list request rejected")?;

    let list: AppList = response.json().await.context("decoding app list")?;
    tracing::info!(total = list.applist.apps.len(), "fetched app list");

    let mut games = Vec::new();

    for app in list.applist.apps {
        if games.len() >= limit {
            break;
        }
        if !passes_name_filters(&app.name) {
            continue;
        }

        let store_data = if !force_refresh && cache.contains(app.appid) {
            cache.get(app.appid).cloned()
        } else {
            match fetch_store_data(ctx, app.appid).await {
                Ok(Some(data)) => {
                    cache.insert(app.appid, data.clone());
                    Some(data)
                }
                Ok(None) => {
                    tracing::debug!(appid = app.appid, "no store data, skipping");
                    None
                }
                Err(e) => {
                    tracing::warn!(appid = app.appid, error = %e, "store lookup failed, skipping");
                    None
                }
            }
        };

        let Some(data) = store_data else {
            continue;
        };
        let Some(game) = build_game(app.appid, &app.name, &data) else {
            continue;
        };

        tracing::debug!(appid = game.appid, name = %game.name, "added game");
        games.push(game);
    }

    if let Err(e) = cache.save() {
        tracing::warn!(error = %e, "cache save after game list failed");
    }

    tracing::info!(count = games.len(), "final game count");
    Ok(games)
}

fn passes_name_filters(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let lower = name.to_lowercase();
    if BLOCKLIST_TERMS.iter().any(|term| lower.contains(term)) {
        return false;
    }
    if name.chars().any(|c| !c.is_ascii()) {
        return false;
    }
    if !name.chars().any(|c| c.is_ascii_alphabetic()) {
        return false;
    }

    KNOWN_ENGINES.iter().any(|engine| lower.contains(engine))
}

async fn fetch_store_data(ctx: &SourceContext, appid: u32) -> anyhow::Result<Option<Value>> {
    let url = format!("{}?appids={}&cc=us&l=en", STORE_URL, appid);

    let response = ctx
        .client
        .get(&url)
        .timeout(ctx.store_timeout)
        .send()
        .await?
        .error_for_status()?;

    let raw: Value = response.json().await?;

    // Stay polite to the store endpoint between lookups.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let data = raw
        .get(appid.to_string())
        .and_then(|entry| entry.get("data"))
        .filter(|data| data.is_object())
        .cloned();

    Ok(data)
}

fn build_game(appid: u32, fallback_name: &str, data: &Value) -> Option<Game> {
    if data.get("type").and_then(Value::as_str) != Some("game") {
        tracing::debug!(appid, "not a game, skipping");
        return None;
    }
    if data
        .pointer("/release_date/coming_soon")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        tracing::debug!(appid, "marked as coming soon, skipping");
        return None;
    }

    let name = data.get("name").and_then(Value::as_str).unwrap_or(fallback_name);
    if data.get("is_free").and_then(Value::as_bool).unwrap_or(false)
        && name.to_lowercase().contains("demo")
    {
        tracing::debug!(appid, "free demo, skipping");
        return None;
    }

    Some(Game {
        appid,
        name: name.to_string(),
        developer: data
            .pointer("/developers/0")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        publisher: data
            .pointer("/publishers/0")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        release_date: data
            .pointer("/release_date/date")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        engine: data
            .get("engine")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mode_returns_fixed_list() {
        let games = test_game_list(5);
        assert_eq!(games.len(), 5);
        assert_eq!(games[1].appid, 730);
        assert_eq!(games[1].name, "Counter-Strike 2");

        let truncated = test_game_list(2);
        assert_eq!(truncated.len(), 2);
    }

    #[test]
    fn name_filters_reject_blocklisted_and_non_games() {
        assert!(!passes_name_filters("Cool Game Soundtrack"));
        assert!(!passes_name_filters("Unity Tool"));
        assert!(!passes_name_filters("ゲーム unreal"));
        assert!(!passes_name_filters("12345"));
        assert!(!passes_name_filters(""));
        // No engine keyword in the name.
        assert!(!passes_name_filters("Cool Game"));
        assert!(passes_name_filters("Unreal Tournament"));
        assert!(passes_name_filters("Built on Source"));
    }

    #[test]
    fn build_game_validates_store_data() {
        let valid = json!({
            "type": "game",
            "name": "Portal 2",
            "developers": ["Valve"],
            "publishers": ["Valve"],
            "release_date": {"coming_soon": false, "date": "Apr 19, 2011"},
        });
        let game = build_game(620, "Portal 2", &valid).unwrap();
        assert_eq!(game.developer, "Valve");
        assert_eq!(game.release_date, "Apr 19, 2011");
        assert_eq!(game.engine, "Unknown");

        let dlc = json!({"type": "dlc", "name": "Some DLC"});
        assert!(build_game(1, "Some DLC", &dlc).is_none());

        let coming_soon = json!({
            "type": "game",
            "name": "Future Game",
            "release_date": {"coming_soon": true},
        });
        assert!(build_game(2, "Future Game", &coming_soon).is_none());
    }
}
