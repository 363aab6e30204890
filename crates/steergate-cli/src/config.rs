//! Gateway configuration – reads/writes `steergate.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use steergate_types::Generation;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "steergate.toml";

/// Persisted gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Vehicle generation whose profile the gateway runs.
    #[serde(default)]
    pub generation: Generation,

    /// Milliseconds after the first frame before a stock steering command on
    /// the harness side latches a relay malfunction.
    #[serde(default = "default_relay_grace_ms")]
    pub relay_grace_ms: u64,
}

fn default_relay_grace_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: Generation::default(),
            relay_grace_ms: default_relay_grace_ms(),
        }
    }
}

impl Config {
    pub fn relay_grace_us(&self) -> u64 {
        self.relay_grace_ms.saturating_mul(1000)
    }
}

/// Default config path.
pub fn config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Load the config from `path`, applying environment overrides.
///
/// Returns `None` when the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load from `path`, falling back to defaults (plus env overrides) when the
/// file is absent.
pub fn load_or_default(path: &Path) -> Result<Config, String> {
    match load_from(path)? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

/// Apply `STEERGATE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `STEERGATE_GENERATION` | `generation` |
/// | `STEERGATE_RELAY_GRACE_MS` | `relay_grace_ms` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("STEERGATE_GENERATION")
        && let Ok(generation) = v.parse::<Generation>()
    {
        cfg.generation = generation;
    }
    if let Ok(v) = std::env::var("STEERGATE_RELAY_GRACE_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.relay_grace_ms = ms;
    }
}

/// Save the config to `path`, creating parent directories if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("nested").join(DEFAULT_CONFIG_FILE);

        save_to(&Config::default(), &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.generation, Generation::Gen1);
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&dir.path().join(DEFAULT_CONFIG_FILE)).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: Config = toml::from_str("").expect("parse");
        assert_eq!(cfg.relay_grace_ms, 1000);
        assert_eq!(cfg.generation, Generation::Gen1);
    }

    #[test]
    fn generation_parses_from_toml() {
        let cfg: Config = toml::from_str("generation = \"gen2\"\nrelay_grace_ms = 250").expect("parse");
        assert_eq!(cfg.generation, Generation::Gen2);
        assert_eq!(cfg.relay_grace_us(), 250_000);
    }

    #[test]
    fn unknown_generation_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "generation = \"gen9\"").expect("write");
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn apply_env_overrides_changes_relay_grace_and_ignores_garbage() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("STEERGATE_RELAY_GRACE_MS", "42") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.relay_grace_ms, 42);

        unsafe { std::env::set_var("STEERGATE_RELAY_GRACE_MS", "soon") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.relay_grace_ms, 1000);
        unsafe { std::env::remove_var("STEERGATE_RELAY_GRACE_MS") };
    }

    #[test]
    fn config_path_is_local_file() {
        assert!(config_path().to_string_lossy().ends_with("steergate.toml"));
    }
}
