use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calendar::{self, DateSpec};

const CONFIG_FILE: &str = "dotwall.toml";
const CONFIG_ENV_VAR: &str = "DOTWALL_CONFIG";
const DEFAULT_TIMEZONE: &str = "Europe/Paris";
const DEFAULT_PADDING: f64 = 8.0;
const DEFAULT_DEBOUNCE_MS: u64 = 100;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
struct RawConfig {
    start_date: Option<String>,
    end_date: Option<String>,
    timezone: Option<String>,
    padding: Option<f64>,
    debounce_ms: Option<u64>,
    listen_addr: Option<String>,
    color: Option<String>,
    cache: RawCacheConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
struct RawCacheConfig {
    enabled: Option<bool>,
    version: Option<String>,
    ttl_secs: Option<u64>,
}

/// Validated configuration, loaded once at startup and read-only
/// afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub start_date: DateSpec,
    pub end_date: DateSpec,
    pub timezone: String,
    pub padding: f64,
    pub debounce_ms: u64,
    pub listen_addr: SocketAddr,
    pub color: bool,
    pub cache: CacheConfig,
    #[serde(skip)]
    pub loaded_file: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub version: String,
    pub ttl_secs: u64,
}

impl Config {
    #[tracing::instrument(skip(overrides))]
    pub fn load(
        path_override: Option<&Path>,
        overrides: Vec<(String, String)>,
    ) -> anyhow::Result<Self> {
        let path = resolve_config_path(path_override)?;
        info!(file = %path.display(), "loading config");

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut raw: RawConfig = toml::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        for (key, value) in overrides {
            debug!(key = %key, value = %value, "applying override");
            apply_override(&mut raw, &key, value)?;
        }

        validate(raw, path)
    }
}

fn resolve_config_path(path_override: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = path_override {
        return Ok(path.to_path_buf());
    }

    if let Ok(raw) = env::var(CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
        warn!("{CONFIG_ENV_VAR} is set but empty; ignoring");
    }

    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("dotwall").join("config.toml");
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(anyhow!(
        "no config file found; create {CONFIG_FILE} with start_date and end_date, \
         set {CONFIG_ENV_VAR}, or pass --config"
    ))
}

fn apply_override(raw: &mut RawConfig, key: &str, value: String) -> anyhow::Result<()> {
    match key {
        "start_date" => raw.start_date = Some(value),
        "end_date" => raw.end_date = Some(value),
        "timezone" => raw.timezone = Some(value),
        "listen_addr" => raw.listen_addr = Some(value),
        "color" => raw.color = Some(value),
        "padding" => {
            raw.padding = Some(
                value
                    .parse()
                    .with_context(|| format!("invalid padding override: {value}"))?,
            );
        }
        "debounce_ms" => {
            raw.debounce_ms = Some(
                value
                    .parse()
                    .with_context(|| format!("invalid debounce_ms override: {value}"))?,
            );
        }
        "cache.enabled" => {
            raw.cache.enabled = Some(
                value
                    .parse()
                    .with_context(|| format!("invalid cache.enabled override: {value}"))?,
            );
        }
        "cache.version" => raw.cache.version = Some(value),
        "cache.ttl_secs" => {
            raw.cache.ttl_secs = Some(
                value
                    .parse()
                    .with_context(|| format!("invalid cache.ttl_secs override: {value}"))?,
            );
        }
        other => return Err(anyhow!("unknown config key: {other}")),
    }
    Ok(())
}

fn validate(raw: RawConfig, path: PathBuf) -> anyhow::Result<Config> {
    let start_date = parse_date(raw.start_date.as_deref(), "start_date", &path)?;
    let end_date = parse_date(raw.end_date.as_deref(), "end_date", &path)?;

    let timezone = raw
        .timezone
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    calendar::resolve_zone(&timezone)
        .with_context(|| format!("invalid timezone in {}", path.display()))?;

    let padding = raw.padding.unwrap_or(DEFAULT_PADDING);
    if !padding.is_finite() || padding < 0.0 {
        return Err(anyhow!("padding must be a non-negative number, got {padding}"));
    }

    let listen_addr = match raw.listen_addr {
        Some(raw_addr) => raw_addr
            .trim()
            .parse()
            .with_context(|| format!("invalid listen_addr: {raw_addr}"))?,
        None => SocketAddr::from(([127, 0, 0, 1], 8080)),
    };

    let color = match raw.color.as_deref() {
        Some(setting) => parse_color_setting(setting)?,
        None => true,
    };

    let cache = CacheConfig {
        enabled: raw.cache.enabled.unwrap_or(true),
        version: raw
            .cache
            .version
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
        ttl_secs: raw.cache.ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS),
    };

    Ok(Config {
        start_date,
        end_date,
        timezone,
        padding,
        debounce_ms: raw.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
        listen_addr,
        color,
        cache,
        loaded_file: path,
    })
}

fn parse_date(raw: Option<&str>, field: &str, path: &Path) -> anyhow::Result<DateSpec> {
    let raw = raw.ok_or_else(|| anyhow!("missing {field} in {}", path.display()))?;
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid {field} (expected YYYY-MM-DD): {raw}"))?;
    Ok(DateSpec::from_date(date))
}

fn parse_color_setting(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Ok(true),
        "off" | "no" | "false" | "0" => Ok(false),
        other => Err(anyhow!("invalid color setting: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::tempdir;

    use super::Config;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("dotwall.toml");
        fs::write(&path, contents).expect("write config");
        (temp, path)
    }

    #[test]
    fn minimal_config_takes_defaults() {
        let (_temp, path) = write_config(
            "start_date = \"2024-03-08\"\nend_date = \"2024-03-12\"\n",
        );

        let cfg = Config::load(Some(&path), vec![]).expect("load");
        assert_eq!(cfg.start_date.to_string(), "2024-03-08");
        assert_eq!(cfg.end_date.to_string(), "2024-03-12");
        assert_eq!(cfg.timezone, "Europe/Paris");
        assert_eq!(cfg.padding, 8.0);
        assert_eq!(cfg.debounce_ms, 100);
        assert!(cfg.color);
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.cache.ttl_secs, 3600);
    }

    #[test]
    fn full_config_round_trips() {
        let (_temp, path) = write_config(
            "start_date = \"2025-01-01\"\n\
             end_date = \"2025-12-31\"\n\
             timezone = \"America/New_York\"\n\
             padding = 16.0\n\
             debounce_ms = 250\n\
             listen_addr = \"0.0.0.0:9090\"\n\
             color = \"off\"\n\
             \n\
             [cache]\n\
             enabled = false\n\
             version = \"v7\"\n\
             ttl_secs = 60\n",
        );

        let cfg = Config::load(Some(&path), vec![]).expect("load");
        assert_eq!(cfg.timezone, "America/New_York");
        assert_eq!(cfg.padding, 16.0);
        assert_eq!(cfg.debounce_ms, 250);
        assert_eq!(cfg.listen_addr.port(), 9090);
        assert!(!cfg.color);
        assert!(!cfg.cache.enabled);
        assert_eq!(cfg.cache.version, "v7");
        assert_eq!(cfg.cache.ttl_secs, 60);
    }

    #[test]
    fn overrides_win_over_the_file() {
        let (_temp, path) = write_config(
            "start_date = \"2024-03-08\"\nend_date = \"2024-03-12\"\ntimezone = \"UTC\"\n",
        );

        let overrides = vec![
            ("timezone".to_string(), "Asia/Tokyo".to_string()),
            ("cache.ttl_secs".to_string(), "5".to_string()),
        ];
        let cfg = Config::load(Some(&path), overrides).expect("load");
        assert_eq!(cfg.timezone, "Asia/Tokyo");
        assert_eq!(cfg.cache.ttl_secs, 5);
    }

    #[test]
    fn unknown_override_key_fails() {
        let (_temp, path) = write_config(
            "start_date = \"2024-03-08\"\nend_date = \"2024-03-12\"\n",
        );

        let overrides = vec![("dotsize".to_string(), "9".to_string())];
        let err = Config::load(Some(&path), overrides).expect_err("must fail");
        assert!(err.to_string().contains("unknown config key"));
    }

    #[test]
    fn unknown_timezone_fails() {
        let (_temp, path) = write_config(
            "start_date = \"2024-03-08\"\n\
             end_date = \"2024-03-12\"\n\
             timezone = \"Mars/Olympus_Mons\"\n",
        );

        assert!(Config::load(Some(&path), vec![]).is_err());
    }

    #[test]
    fn malformed_date_fails() {
        let (_temp, path) = write_config(
            "start_date = \"08/03/2024\"\nend_date = \"2024-03-12\"\n",
        );

        let err = Config::load(Some(&path), vec![]).expect_err("must fail");
        assert!(format!("{err:#}").contains("start_date"));
    }

    #[test]
    fn missing_dates_fail() {
        let (_temp, path) = write_config("timezone = \"UTC\"\n");
        assert!(Config::load(Some(&path), vec![]).is_err());
    }
}
