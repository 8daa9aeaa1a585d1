use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use component_api::DeliveryPolicy;
use serde::Deserialize;
use shared::{
    domain::{Column, DataSet, InitParams, Primitive},
    error::RaggedRowError,
};

const ENV_PREFIX: &str = "DEV_PANE__";
const ENV_INIT_PREFIX: &str = "INIT__";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_filter: String,
    pub delivery_policy: DeliveryPolicy,
    pub init_params: InitParams,
    pub dataset_path: Option<PathBuf>,
    pub settle_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            delivery_policy: DeliveryPolicy::default(),
            init_params: InitParams::new()
                .with("prompt", "Summarize this table in two sentences:\n$data")
                .with("autoRun", "true"),
            dataset_path: None,
            settle_ms: 250,
        }
    }
}

impl Settings {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    log_filter: Option<String>,
    delivery_policy: Option<DeliveryPolicy>,
    dataset_path: Option<PathBuf>,
    settle_ms: Option<u64>,
    init: BTreeMap<String, String>,
}

/// Defaults, then `path` if it exists, then `DEV_PANE__*` variables.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let mut settings = Settings::default();
    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()))
        }
    }
    apply_env_overrides(&mut settings, std::env::vars())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> Result<()> {
    let file_cfg: FileConfig = toml::from_str(raw)?;
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    if let Some(v) = file_cfg.delivery_policy {
        settings.delivery_policy = v;
    }
    if let Some(v) = file_cfg.dataset_path {
        settings.dataset_path = Some(v);
    }
    if let Some(v) = file_cfg.settle_ms {
        settings.settle_ms = v;
    }
    if !file_cfg.init.is_empty() {
        settings.init_params = file_cfg.init.into_iter().collect();
    }
    Ok(())
}

/// `DEV_PANE__INIT__<key>` sets a single init parameter; the key is taken
/// verbatim so camel-cased names like `autoRun` survive.
pub fn apply_env_overrides(
    settings: &mut Settings,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<()> {
    for (name, value) in vars {
        let Some(key) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        if let Some(param) = key.strip_prefix(ENV_INIT_PREFIX) {
            settings.init_params.insert(param, value);
            continue;
        }
        match key {
            "LOG_FILTER" => settings.log_filter = value,
            "DELIVERY_POLICY" => settings.delivery_policy = parse_policy(&value)?,
            "DATASET_PATH" => settings.dataset_path = Some(PathBuf::from(value)),
            "SETTLE_MS" => {
                if let Ok(parsed) = value.parse::<u64>() {
                    settings.settle_ms = parsed;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

pub fn parse_policy(raw: &str) -> Result<DeliveryPolicy> {
    raw.parse()
        .with_context(|| format!("unknown delivery policy '{raw}'"))
}

/// Parses `key=value` as given to `--param`.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

pub fn load_dataset(path: Option<&Path>) -> Result<DataSet> {
    let Some(path) = path else {
        return Ok(sample_dataset()?);
    };
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid dataset '{}'", path.display()))
}

pub fn sample_dataset() -> Result<DataSet, RaggedRowError> {
    let rows = [
        ("north", "2024-01", 1250.0),
        ("north", "2024-02", 1410.5),
        ("south", "2024-01", 980.0),
        ("south", "2024-02", 1022.25),
    ]
    .into_iter()
    .map(|(region, month, revenue)| {
        vec![
            Primitive::from(region),
            Primitive::from(month),
            Primitive::from(revenue),
        ]
    })
    .collect();
    DataSet::new(
        vec![
            Column::new("region"),
            Column::new("month"),
            Column::new("revenue"),
        ],
        rows,
    )
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
