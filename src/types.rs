use serde::{Deserialize, Serialize};

/// Descriptions longer than this are cut and marked with an ellipsis.
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// A candidate command-line flag for a game, tagged with where it came from.
///
/// `command` normally starts with `-`, `--`, `+` or `/`, but sources may
/// emit opaque fallback strings (e.g. "See guide: ...") when nothing
/// concrete could be isolated. `verified` marks curator confirmation and is
/// never set by extractors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchOption {
    pub command: String,
    pub description: String,
    pub source: String,
    #[serde(default)]
    pub verified: bool,
}

impl LaunchOption {
    pub fn new(
        command: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
            source: source.into(),
            verified: false,
        }
    }
}

/// Cap a free-text description at [`MAX_DESCRIPTION_LEN`] characters.
pub fn truncate_description(text: &str) -> String {
    if text.chars().count() > MAX_DESCRIPTION_LEN {
        let head: String = text.chars().take(MAX_DESCRIPTION_LEN).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub appid: u32,
    pub name: String,
    #[serde(default)]
    pub developer: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default = "default_engine")]
    pub engine: String,
}

impl Game {
    pub fn new(appid: u32, name: impl Into<String>) -> Self {
        Self {
            appid,
            name: name.into(),
            developer: String::new(),
            publisher: String::new(),
            release_date: String::new(),
            engine: default_engine(),
        }
    }
}

fn default_engine() -> String {
    "Unknown".to_string()
}
