//! Engine configuration.
//!
//! Configuration is written in TOML. Every field has a default, so an empty
//! document (or [`EngineConfig::new`]) yields a usable configuration rooted
//! at the given data directory:
//!
//! ```toml
//! data_dir = "/var/lib/geoserver/data"
//! templates_dir = "templates"
//! store_file = "features-templates-data.properties"
//! rules_file = "template-rules.json"
//! watch_interval_ms = 0
//!
//! [cache]
//! max_entries = 100
//! expire_after_access_secs = 7200
//! ```

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TemplateError};

/// Name of the directory holding template files and metadata.
pub const DEFAULT_TEMPLATES_DIR: &str = "templates";
/// Name of the template metadata property file.
pub const DEFAULT_STORE_FILE: &str = "features-templates-data.properties";
/// Name of the persisted rule file.
pub const DEFAULT_RULES_FILE: &str = "template-rules.json";

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
	/// Root data directory; templates live below `data_dir/templates_dir`.
	#[serde(default)]
	pub data_dir: PathBuf,
	/// Name of the templates directory below `data_dir`.
	#[serde(default = "default_templates_dir")]
	pub templates_dir: String,
	/// Template metadata file name, stored in the templates directory.
	#[serde(default = "default_store_file")]
	pub store_file: String,
	/// Rule file name, stored in the templates directory. Empty keeps rules in memory only.
	#[serde(default = "default_rules_file")]
	pub rules_file: String,
	/// Minimum delay between two filesystem checks of the same watched file.
	#[serde(default)]
	pub watch_interval_ms: u64,
	/// Resolution cache bounds.
	#[serde(default)]
	pub cache: CacheConfig,
}

/// Bounds of the template resolution cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
	/// Maximum number of cached templates.
	#[serde(default = "default_max_entries")]
	pub max_entries: usize,
	/// Entries not accessed for this long are dropped.
	#[serde(default = "default_expire_after_access_secs")]
	pub expire_after_access_secs: u64,
}

fn default_templates_dir() -> String {
	DEFAULT_TEMPLATES_DIR.to_string()
}

fn default_store_file() -> String {
	DEFAULT_STORE_FILE.to_string()
}

fn default_rules_file() -> String {
	DEFAULT_RULES_FILE.to_string()
}

fn default_max_entries() -> usize {
	100
}

fn default_expire_after_access_secs() -> u64 {
	120 * 60
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			max_entries: default_max_entries(),
			expire_after_access_secs: default_expire_after_access_secs(),
		}
	}
}

impl CacheConfig {
	/// Capacity as a non-zero count; a zero setting is treated as one entry.
	pub fn capacity(&self) -> NonZeroUsize {
		NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
	}

	/// Idle expiry as a duration.
	pub fn expire_after_access(&self) -> Duration {
		Duration::from_secs(self.expire_after_access_secs)
	}
}

impl EngineConfig {
	/// Default configuration rooted at `data_dir`.
	pub fn new(data_dir: impl Into<PathBuf>) -> Self {
		Self {
			data_dir: data_dir.into(),
			templates_dir: default_templates_dir(),
			store_file: default_store_file(),
			rules_file: default_rules_file(),
			watch_interval_ms: 0,
			cache: CacheConfig::default(),
		}
	}

	/// Parses a TOML document.
	pub fn from_toml_str(text: &str) -> Result<Self> {
		toml::from_str(text).map_err(|e| TemplateError::Config(e.to_string()))
	}

	/// Reads and parses a TOML configuration file.
	///
	/// A relative `data_dir` is resolved against the file's directory.
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|e| TemplateError::io(path, e))?;
		let mut config = Self::from_toml_str(&text)?;
		if config.data_dir.is_relative()
			&& let Some(parent) = path.parent()
		{
			config.data_dir = parent.join(&config.data_dir);
		}
		Ok(config)
	}

	/// Directory holding template files and metadata.
	pub fn templates_root(&self) -> PathBuf {
		self.data_dir.join(&self.templates_dir)
	}

	/// Full path of the template metadata file.
	pub fn store_path(&self) -> PathBuf {
		self.templates_root().join(&self.store_file)
	}

	/// Full path of the rule file, or `None` when rules are kept in memory.
	pub fn rules_path(&self) -> Option<PathBuf> {
		(!self.rules_file.is_empty()).then(|| self.templates_root().join(&self.rules_file))
	}

	/// Polling interval for watched files.
	pub fn watch_interval(&self) -> Duration {
		Duration::from_millis(self.watch_interval_ms)
	}
}
