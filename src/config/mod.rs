use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::schedule::date::parse_date_key;

pub mod variants;

pub use variants::{GridVariant, SelectionMode};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Timetable";
const APP_NAME: &str = "timetable";
const CONFIG_FILE_NAME: &str = "config.toml";
const LOG_FILE_NAME: &str = "timetable.log";

pub const CONFIG_ENV: &str = "TIMETABLE_CONFIG";
pub const DATA_ENV: &str = "TIMETABLE_DATA";
pub const DEFAULT_TITLE_MAX_CHARS: usize = 20;

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Loads `config.toml`, writing a commented default on first run.
    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        let mut cfg = if self.paths.config_file.exists() {
            self.read()?
        } else {
            let cfg = AppConfig::default();
            self.write_default_config(&cfg)?;
            tracing::info!(path = %self.paths.config_file.display(), "wrote default config");
            cfg
        };
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    pub fn load(&self) -> Result<AppConfig> {
        let mut cfg = self.read()?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn read(&self) -> Result<AppConfig> {
        let path = &self.paths.config_file;
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let body = toml::to_string_pretty(cfg).context("serializing default config")?;
        let variants: Vec<String> = GridVariant::iter()
            .map(|variant| {
                format!(
                    "{variant} ({} blocks, stored as {})",
                    variant.block_count(),
                    variant.storage_key()
                )
            })
            .collect();
        let contents = format!(
            "# grid.variant: {}\n\
             # [storage.keys] can rename the data file of either variant.\n\n{body}",
            variants.join(", ")
        );
        let path = &self.paths.config_file;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(path, contents).with_context(|| format!("writing config {}", path.display()))
    }
}

/// Location overrides, normally read from `TIMETABLE_CONFIG` and
/// `TIMETABLE_DATA`.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl PathOverrides {
    pub fn from_env() -> Self {
        Self {
            config: env::var_os(CONFIG_ENV).map(PathBuf::from),
            data_dir: env::var_os(DATA_ENV).map(PathBuf::from),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;
        let data_dir = dirs.data_dir().to_path_buf();
        let state_dir = dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_dir.join("state"));
        let defaults = Self::layout(dirs.config_dir().to_path_buf(), data_dir, state_dir);
        Ok(defaults.with_overrides(PathOverrides::from_env()))
    }

    /// Lays every directory out under one root; used by tests and portable installs.
    pub fn rooted(root: &Path) -> Self {
        Self::layout(root.join("config"), root.join("data"), root.join("state"))
    }

    fn layout(config_dir: PathBuf, data_dir: PathBuf, state_dir: PathBuf) -> Self {
        Self {
            config_file: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
            data_dir,
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    /// A config override naming a directory (or anything without an
    /// extension) holds `config.toml`; otherwise it is the file itself.
    pub fn with_overrides(mut self, overrides: PathOverrides) -> Self {
        if let Some(path) = overrides.config {
            if path.is_dir() || path.extension().is_none() {
                self.config_file = path.join(CONFIG_FILE_NAME);
                self.config_dir = path;
            } else {
                self.config_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
                self.config_file = path;
            }
        }
        if let Some(data_dir) = overrides.data_dir {
            self.data_dir = data_dir;
        }
        self
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            if dir.as_os_str().is_empty() {
                continue;
            }
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub grid: GridConfig,
    pub storage: StorageOptions,
    pub editor: EditorOptions,
    /// `YYYY-MM-DD` to open on instead of today.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_date: Option<String>,
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if let Some(raw) = self.initial_date.as_deref() {
            if let Err(err) = parse_date_key(raw) {
                tracing::warn!(%err, raw, "invalid initial_date in config, opening on today");
                self.initial_date = None;
            }
        }
        if self.editor.title_max_chars == 0 {
            tracing::warn!("editor.title_max_chars must be positive, using the default");
            self.editor.title_max_chars = DEFAULT_TITLE_MAX_CHARS;
        }
        Ok(())
    }

    /// Switches layout; the selection strategy follows unless set explicitly.
    pub fn set_variant(&mut self, variant: GridVariant) {
        self.grid.variant = variant;
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.grid
            .selection
            .unwrap_or_else(|| self.grid.variant.default_selection())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub variant: GridVariant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Per-variant overrides of the storage key (the data file name).
    pub keys: StorageKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageKeys {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub half_day: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_day: Option<String>,
}

impl StorageKeys {
    fn get(&self, variant: GridVariant) -> Option<&str> {
        match variant {
            GridVariant::HalfDay => self.half_day.as_deref(),
            GridVariant::FullDay => self.full_day.as_deref(),
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            self.data_dir = paths.data_dir.clone();
        }
        for variant in GridVariant::iter() {
            if let Some(key) = self.keys.get(variant) {
                let trimmed = key.trim();
                if trimmed.is_empty() || trimmed.contains(['/', '\\']) {
                    bail!("storage key {key:?} for {variant} must be a non-empty file name");
                }
            }
        }
        // The layouts index blocks differently, so they can never share a file.
        let mut seen: Vec<(String, GridVariant)> = Vec::new();
        for variant in GridVariant::iter() {
            let key = self.key_for(variant);
            if let Some((_, other)) = seen.iter().find(|(existing, _)| *existing == key) {
                bail!("storage key {key:?} is used by both {other} and {variant}");
            }
            seen.push((key, variant));
        }
        Ok(())
    }

    pub fn key_for(&self, variant: GridVariant) -> String {
        self.keys
            .get(variant)
            .map(str::trim)
            .map(str::to_owned)
            .unwrap_or_else(|| variant.storage_key().to_owned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    pub title_max_chars: usize,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
        }
    }
}
