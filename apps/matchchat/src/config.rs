use std::{fs, io::ErrorKind, path::Path};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "matchchat.toml";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3010";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    /// Used by `/connect` without an argument and for connecting at startup.
    pub nickname: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            nickname: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    nickname: Option<String>,
}

/// Defaults, then the config file (if present), then the environment.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();
    apply_file(&mut settings, path)?;
    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

impl Settings {
    /// Command-line flags win over everything else.
    pub fn override_with(&mut self, server_url: Option<String>, nickname: Option<String>) {
        if let Some(v) = server_url {
            self.server_url = v;
        }
        if let Some(v) = nickname {
            self.nickname = Some(v);
        }
    }
}

fn apply_file(settings: &mut Settings, path: &Path) -> anyhow::Result<()> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    };
    let file_cfg: FileSettings = toml::from_str(&raw)
        .with_context(|| format!("invalid config file '{}'", path.display()))?;

    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.nickname {
        settings.nickname = Some(v);
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("MATCHCHAT_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = lookup("MATCHCHAT_NICKNAME") {
        settings.nickname = Some(v);
    }
    if let Some(v) = lookup("APP__NICKNAME") {
        settings.nickname = Some(v);
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
