//! Process-wide user settings.
//!
//! A small key-value store backed by a YAML file. It is read once at startup (missing file →
//! defaults) and written through on every change. It replaces the module-scoped UI state of
//! the dashboards (theme preference, last-used notification recipient) with an explicit store
//! that the binary owns.

use crate::{HmsError, HmsResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const THEME_KEY: &str = "theme";
pub const LAST_RECIPIENT_KEY: &str = "last_notification_recipient";

/// Colour theme preference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = HmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(HmsError::InvalidInput(format!(
                "unknown theme '{other}': must be light or dark"
            ))),
        }
    }
}

/// Key-value settings persisted as a flat YAML mapping.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl SettingsStore {
    /// Load settings from `path`.
    ///
    /// A missing file yields the defaults; nothing is written until the first [`set`](Self::set).
    ///
    /// # Errors
    ///
    /// Returns [`HmsError`] if the file exists but cannot be read or is not a flat YAML mapping.
    pub fn load(path: impl Into<PathBuf>) -> HmsResult<Self> {
        let path = path.into();
        let mut values = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_yaml::from_str::<BTreeMap<String, String>>(&text)
                .map_err(HmsError::SettingsYaml)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no settings file at {}, using defaults", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(HmsError::SettingsRead(e)),
        };

        values
            .entry(THEME_KEY.to_string())
            .or_insert_with(|| Theme::default().as_str().to_string());

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// All settings in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The theme preference; an unreadable stored value means the default.
    pub fn theme(&self) -> Theme {
        self.get(THEME_KEY)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub fn last_recipient(&self) -> Option<&str> {
        self.get(LAST_RECIPIENT_KEY)
    }

    /// Update one setting and persist the whole store.
    ///
    /// # Errors
    ///
    /// Returns [`HmsError`] if:
    /// - the key is blank, or the value is not valid for a known key,
    /// - the file cannot be written.
    pub fn set(&mut self, key: &str, value: &str) -> HmsResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(HmsError::InvalidInput("setting key cannot be empty".into()));
        }
        let value = if key == THEME_KEY {
            value.parse::<Theme>()?.as_str().to_string()
        } else {
            value.trim().to_string()
        };

        self.values.insert(key.to_string(), value);
        self.persist()
    }

    pub fn set_theme(&mut self, theme: Theme) -> HmsResult<()> {
        self.set(THEME_KEY, theme.as_str())
    }

    pub fn set_last_recipient(&mut self, recipient: &str) -> HmsResult<()> {
        self.set(LAST_RECIPIENT_KEY, recipient)
    }

    /// Write to a sibling temp file, then rename over the target.
    fn persist(&self) -> HmsResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(HmsError::SettingsWrite)?;
        }
        let yaml = serde_yaml::to_string(&self.values).map_err(HmsError::SettingsYaml)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, yaml).map_err(HmsError::SettingsWrite)?;
        std::fs::rename(&tmp, &self.path).map_err(HmsError::SettingsWrite)
    }
}
