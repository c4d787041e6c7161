use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use crate::{
    config::{REFRESH_SECS_MAX, REFRESH_SECS_MIN},
    mode::Mode,
    state::SharedState,
};

pub const CONFIG_PATH: &str = "/data/adb/modules/unleashed_manager/config/config.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserConfig {
    /// Mode assumed (and preselected) while the property is unset.
    #[serde(default)]
    pub default_mode: Mode,

    /// Seconds between re-reads of the persisted property.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_refresh_secs() -> u64 {
    30
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            default_mode: Mode::default(),
            refresh_secs: default_refresh_secs(),
            notifications: NotificationsConfig::default(),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Post a system notification after a successful apply.
    pub enabled: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extra: BTreeMap::new(),
        }
    }
}

impl UserConfig {
    pub fn validate_and_normalize(&mut self) -> Result<(), String> {
        // Clamp instead of rejecting; hand-edited configs are common on
        // rooted devices.
        self.refresh_secs = self.refresh_secs.clamp(REFRESH_SECS_MIN, REFRESH_SECS_MAX);
        Ok(())
    }
}

pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub fn load_or_init(path: &Path) -> UserConfig {
    match fs::read_to_string(path) {
        Ok(s) => match serde_json::from_str::<UserConfig>(&s) {
            Ok(mut cfg) => {
                if let Err(e) = cfg.validate_and_normalize() {
                    eprintln!("CFG: invalid config: {} (reset to default)", e);
                    let def = UserConfig::default();
                    let _ = write_config_atomic(path, &def);
                    def
                } else {
                    cfg
                }
            }
            Err(e) => {
                eprintln!("CFG: failed to parse config: {} (reset to default)", e);
                let def = UserConfig::default();
                let _ = write_config_atomic(path, &def);
                def
            }
        },
        Err(_) => {
            let def = UserConfig::default();
            let _ = write_config_atomic(path, &def);
            def
        }
    }
}

pub fn write_config_atomic(path: &Path, cfg: &UserConfig) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    let data = serde_json::to_string_pretty(cfg)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    fs::write(&tmp, data.as_bytes())?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Apply a new config into shared state and persist to disk.
/// Returns an error string for HTTP responses.
pub fn apply_and_persist(
    shared: &Arc<RwLock<SharedState>>,
    path: &Path,
    mut cfg: UserConfig,
) -> Result<(), String> {
    cfg.validate_and_normalize()?;
    write_config_atomic(path, &cfg).map_err(|e| e.to_string())?;
    {
        let mut s = shared.write().unwrap();
        s.config = cfg;
        s.config_rev = s.config_rev.wrapping_add(1);
        s.last_config_error = None;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_initializes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let cfg = load_or_init(&path);
        assert_eq!(cfg.default_mode, Mode::Advertised);
        assert_eq!(cfg.refresh_secs, 30);
        assert!(cfg.notifications.enabled);
        assert!(path.exists());
    }

    #[test]
    fn garbage_resets_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{not json").unwrap();
        let cfg = load_or_init(&path);
        assert_eq!(cfg.refresh_secs, 30);
        // The broken file was replaced with a loadable one.
        let again = load_or_init(&path);
        assert_eq!(again.refresh_secs, 30);
    }

    #[test]
    fn persisted_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut cfg = UserConfig::default();
        cfg.default_mode = Mode::Efficiency;
        cfg.refresh_secs = 120;
        cfg.notifications.enabled = false;
        write_config_atomic(&path, &cfg).unwrap();

        let loaded = load_or_init(&path);
        assert_eq!(loaded.default_mode, Mode::Efficiency);
        assert_eq!(loaded.refresh_secs, 120);
        assert!(!loaded.notifications.enabled);
    }

    #[test]
    fn refresh_period_is_clamped() {
        let mut cfg = UserConfig::default();
        cfg.refresh_secs = 0;
        cfg.validate_and_normalize().unwrap();
        assert_eq!(cfg.refresh_secs, REFRESH_SECS_MIN);

        cfg.refresh_secs = 1_000_000;
        cfg.validate_and_normalize().unwrap();
        assert_eq!(cfg.refresh_secs, REFRESH_SECS_MAX);
    }

    #[test]
    fn unknown_keys_survive_a_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"default_mode":"benchmark","future_knob":42}"#).unwrap();

        let cfg = load_or_init(&path);
        write_config_atomic(&path, &cfg).unwrap();

        let reloaded = load_or_init(&path);
        assert_eq!(reloaded.default_mode, Mode::Benchmark);
        assert_eq!(
            reloaded.extra.get("future_knob"),
            Some(&serde_json::json!(42))
        );
    }
}
