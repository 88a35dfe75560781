use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};

use crate::data::schema::{DatasetKind, PercentScale};
use crate::error::{DashboardError, Result};

/// Optional settings file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "hazard-lens.toml";

/// Environment prefix; nested keys use `__`, e.g. `HAZARD_LENS__SOURCES__WIND`.
pub const ENV_PREFIX: &str = "HAZARD_LENS";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SourceLocators {
    pub wind: Option<String>,
    pub drought: Option<String>,
    pub wildfire: Option<String>,
    pub census: Option<String>,
    pub health: Option<String>,
}

impl SourceLocators {
    pub fn get(&self, kind: DatasetKind) -> Option<&str> {
        let locator = match kind {
            DatasetKind::Wind => &self.wind,
            DatasetKind::Drought => &self.drought,
            DatasetKind::Wildfire => &self.wildfire,
            DatasetKind::Census => &self.census,
            DatasetKind::Health => &self.health,
        };
        locator.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }
}

/// Dashboard configuration. Source locators are never compiled in.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub sources: SourceLocators,
    pub fetch_timeout_secs: u64,
    pub row_cap: usize,
    pub sample_seed: u64,
    pub default_threshold: f64,
    pub default_top_n: usize,
    pub low_income_scale: PercentScale,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sources: SourceLocators::default(),
            fetch_timeout_secs: 30,
            row_cap: crate::data::filter::ROW_CAP,
            sample_seed: crate::data::filter::SAMPLE_SEED,
            default_threshold: 5.0,
            default_top_n: 10,
            low_income_scale: PercentScale::Percent,
        }
    }
}

impl Settings {
    /// `.env`, then the settings file (explicit path or [`DEFAULT_CONFIG_FILE`]
    /// if present), then `HAZARD_LENS__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = defaults()?;
        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        finish(builder)
    }

    /// Settings from TOML text layered over the defaults (no environment).
    pub fn from_toml(text: &str) -> Result<Self> {
        let builder = defaults()?.add_source(File::from_str(text, FileFormat::Toml));
        finish(builder)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.row_cap == 0 {
            return Err(DashboardError::Config(
                "row_cap must be greater than 0".to_string(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(DashboardError::Config(
                "fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn config_err(e: config::ConfigError) -> DashboardError {
    DashboardError::Config(e.to_string())
}

fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>> {
    let d = Settings::default();
    Config::builder()
        .set_default("fetch_timeout_secs", d.fetch_timeout_secs)
        .and_then(|b| b.set_default("row_cap", d.row_cap as u64))
        .and_then(|b| b.set_default("sample_seed", d.sample_seed))
        .and_then(|b| b.set_default("default_threshold", d.default_threshold))
        .and_then(|b| b.set_default("default_top_n", d.default_top_n as u64))
        .and_then(|b| b.set_default("low_income_scale", "percent"))
        .map_err(config_err)
}

fn finish(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Settings> {
    let settings: Settings = builder
        .build()
        .map_err(config_err)?
        .try_deserialize()
        .map_err(config_err)?;
    settings.validate()?;
    Ok(settings)
}
