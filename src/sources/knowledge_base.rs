use serde_json::Value;

use crate::types::LaunchOption;

pub const SOURCE_ENGINE_LABEL: &str = "Common Source Engine";
pub const UNITY_ENGINE_LABEL: &str = "Common Unity Engine";
pub const UNREAL_ENGINE_LABEL: &str = "Common Unreal Engine";
pub const COMMON_LABEL: &str = "Common Launch Option";

/// Franchises known to ship on the Source engine.
const SOURCE_FRANCHISES: &[&str] = &[
    "counter-strike",
    "half-life",
    "portal",
    "team fortress",
    "left 4 dead",
    "garry",
    "dota",
];

const SOURCE_ENGINE_OPTIONS: &[(&str, &str)] = &[
    ("-novid", "Skip intro videos when starting the game"),
    ("-console", "Enable developer console"),
    ("-windowed", "Run the game in windowed mode"),
    ("-fullscreen", "Run the game in fullscreen mode"),
    ("-noborder", "Run the game in borderless windowed mode"),
];

const UNITY_ENGINE_OPTIONS: &[(&str, &str)] = &[
    ("-screen-width", "Set screen width (e.g., -screen-width 1920)"),
    ("-screen-height", "Set screen height (e.g., -screen-height 1080)"),
    ("-popupwindow", "Run in borderless windowed mode"),
    (
        "-window-mode",
        "Set window mode (values: exclusive, windowed, borderless)",
    ),
];

const UNREAL_ENGINE_OPTIONS: &[(&str, &str)] = &[
    ("-windowed", "Run the game in windowed mode"),
    ("-fullscreen", "Run the game in fullscreen mode"),
    ("-presets=", "Specify graphics preset (e.g., -presets=high)"),
    ("-dx12", "Force DirectX 12 rendering"),
    ("-dx11", "Force DirectX 11 rendering"),
];

const GENERAL_OPTIONS: &[(&str, &str)] = &[
    ("-fps_max", "Limit maximum FPS (e.g., -fps_max 144)"),
    ("-nojoy", "Disable joystick/controller support"),
    ("-nosplash", "Skip splash/intro screens"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Source,
    Unity,
    Unreal,
    Unknown,
}

/// Classify a game's engine from its title and cached store metadata.
///
/// Checks are ordered and mutually exclusive: a Source-franchise title wins
/// over a Unity hint, which wins over an Unreal hint. The metadata blob is
/// only inspected as serialized text; its shape is uncontrolled.
pub fn classify_engine(title: &str, metadata: Option<&Value>) -> Engine {
    let lower_title = title.to_lowercase();

    if SOURCE_FRANCHISES
        .iter()
        .any(|franchise| lower_title.contains(franchise))
    {
        return Engine::Source;
    }

    let blob = metadata
        .map(|m| m.to_string().to_lowercase())
        .unwrap_or_default();

    if lower_title.contains("unity") || blob.contains("unity") {
        return Engine::Unity;
    }
    if lower_title.contains("unreal") || blob.contains("unreal") {
        return Engine::Unreal;
    }

    Engine::Unknown
}

fn bundle<'a>(table: &'a [(&'a str, &'a str)], source: &str) -> impl Iterator<Item = LaunchOption> + 'a {
    let source = source.to_string();
    table
        .iter()
        .map(move |(command, description)| LaunchOption::new(*command, *description, source.clone()))
}

/// Produce the static option bundle for a game. No network access; the
/// general bundle is always appended regardless of the engine match.
pub fn fetch_options(title: &str, metadata: Option<&Value>) -> Vec<LaunchOption> {
    let mut options = Vec::new();

    let engine = classify_engine(title, metadata);
    match engine {
        Engine::Source => options.extend(bundle(SOURCE_ENGINE_OPTIONS, SOURCE_ENGINE_LABEL)),
        Engine::Unity => options.extend(bundle(UNITY_ENGINE_OPTIONS, UNITY_ENGINE_LABEL)),
        Engine::Unreal => options.extend(bundle(UNREAL_ENGINE_OPTIONS, UNREAL_ENGINE_LABEL)),
        Engine::Unknown => {}
    }

    options.extend(bundle(GENERAL_OPTIONS, COMMON_LABEL));

    tracing::debug!(title, engine = ?engine, count = options.len(), "knowledge-base bundle selected");

    options
}
