use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperSettings {
    pub user_agent: String,
    pub cache_file: String,
    pub page_timeout_secs: u64,
    pub guide_timeout_secs: u64,
    pub store_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub scraper: ScraperSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default(
                "scraper.user_agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            )?
            .set_default("scraper.cache_file", "appdetails_cache.json")?
            .set_default("scraper.page_timeout_secs", 10)?
            .set_default("scraper.guide_timeout_secs", 15)?
            .set_default("scraper.store_timeout_secs", 5)?
            .set_default("logging.level", "info")?
            .add_source(File::with_name("config/default.yaml").required(false))
            .add_source(File::with_name("config/local.yaml").required(false))
            .add_source(Environment::with_prefix("SLOP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
