use std::{fs, io, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use tracker_core::{FeedPaths, TrackerConfig};

const DEFAULT_CONFIG_FILE: &str = "aerial.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub lines_path: String,
    pub present_path: String,
    pub socket_path: String,
    pub transition_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        let paths = FeedPaths::default();
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            lines_path: paths.lines,
            present_path: paths.present,
            socket_path: paths.socket,
            transition_ms: 7000,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn feed_paths(&self) -> FeedPaths {
        FeedPaths {
            lines: self.lines_path.clone(),
            present: self.present_path.clone(),
            socket: self.socket_path.clone(),
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            transition: Duration::from_millis(self.transition_ms),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    server_url: Option<String>,
    lines_path: Option<String>,
    present_path: Option<String>,
    socket_path: Option<String>,
    transition_ms: Option<u64>,
    log_filter: Option<String>,
}

/// Defaults, then the config file, then `AERIAL_*` environment variables.
///
/// A missing default file is fine; a file named explicitly must be readable.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let raw = match path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?,
        ),
        None => match fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Ok(raw) => Some(raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {DEFAULT_CONFIG_FILE}"))
            }
        },
    };
    if let Some(raw) = raw {
        apply_file(&mut settings, &raw)?;
    }

    apply_env(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw).context("invalid config file")?;
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.lines_path {
        settings.lines_path = v;
    }
    if let Some(v) = file_cfg.present_path {
        settings.present_path = v;
    }
    if let Some(v) = file_cfg.socket_path {
        settings.socket_path = v;
    }
    if let Some(v) = file_cfg.transition_ms {
        settings.transition_ms = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("AERIAL_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = var("AERIAL_LINES_PATH") {
        settings.lines_path = v;
    }
    if let Some(v) = var("AERIAL_PRESENT_PATH") {
        settings.present_path = v;
    }
    if let Some(v) = var("AERIAL_SOCKET_PATH") {
        settings.socket_path = v;
    }
    if let Some(v) = var("AERIAL_TRANSITION_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.transition_ms = parsed;
        }
    }
    if let Some(v) = var("AERIAL_LOG") {
        settings.log_filter = v;
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    #[test]
    fn defaults_match_the_public_feed_layout() {
        let settings = Settings::default();
        assert_eq!(settings.feed_paths(), FeedPaths::default());
        assert_eq!(
            settings.tracker_config().transition,
            Duration::from_millis(7000)
        );
    }

    #[test]
    fn file_overrides_only_the_keys_it_sets() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            "server_url = \"https://aerial.example\"\ntransition_ms = 2500\n",
        )
        .expect("apply");

        assert_eq!(settings.server_url, "https://aerial.example");
        assert_eq!(settings.transition_ms, 2500);
        assert_eq!(settings.socket_path, "socket/");
    }

    #[test]
    fn rejects_malformed_file() {
        let mut settings = Settings::default();
        assert!(apply_file(&mut settings, "transition_ms = \"soon\"").is_err());
    }

    #[test]
    fn environment_wins_over_file() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "server_url = \"http://from-file\"").expect("apply");
        let env = HashMap::from([
            ("AERIAL_SERVER_URL", "http://from-env"),
            ("AERIAL_TRANSITION_MS", "not-a-number"),
            ("AERIAL_LOG", "tracker_core=debug"),
        ]);

        apply_env(&mut settings, |name| env.get(name).map(|v| v.to_string()));

        assert_eq!(settings.server_url, "http://from-env");
        assert_eq!(settings.transition_ms, 7000);
        assert_eq!(settings.log_filter, "tracker_core=debug");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("aerial_missing_{suffix}.toml"));

        let err = load_settings(Some(&path)).expect_err("must fail");
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn explicit_file_is_loaded() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("aerial_config_{suffix}.toml"));
        fs::write(&path, "present_path = \"present.json\"\n").expect("write config");

        let settings = load_settings(Some(&path)).expect("load");
        assert_eq!(settings.present_path, "present.json");

        fs::remove_file(path).expect("cleanup");
    }
}
