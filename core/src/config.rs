//! Core configuration

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "cumulus.json";

/// Runtime knobs of the core. Every field has a default so a partial file still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
	/// Config schema version
	pub version: u32,

	/// Archive download session lifetime, in seconds
	pub archive_timeout: u64,

	/// Lifetime of cached folder statistics, in seconds
	pub folder_props_timeout: u64,

	/// Estimated compressed size over original size, used for quota pre-checks
	pub compress_ratio: f64,

	/// Background workers running archive jobs
	pub max_workers: usize,

	/// Jobs allowed to wait for a worker before submissions are refused
	pub task_queue_capacity: usize,

	/// Path prefix of the archive download endpoint
	pub archive_route: String,

	/// Secret keying the opaque object identifiers
	pub hashid_secret: String,

	/// Secret keying signed download URLs
	pub sign_secret: String,

	/// Logging level used when `RUST_LOG` is not set
	pub log_level: String,
}

impl Default for CoreConfig {
	fn default() -> Self {
		Self {
			version: Self::target_version(),
			archive_timeout: 30,
			folder_props_timeout: 300,
			compress_ratio: 0.4,
			max_workers: 10,
			task_queue_capacity: 64,
			archive_route: "/api/v3/file/archive".to_string(),
			hashid_secret: String::new(),
			sign_secret: String::new(),
			log_level: "info".to_string(),
		}
	}
}

impl CoreConfig {
	#[must_use]
	pub const fn target_version() -> u32 {
		1
	}

	/// Load configuration from `dir`, writing the defaults there if no file exists yet
	pub fn load_from(dir: impl AsRef<Path>) -> Result<Self> {
		let config_path = dir.as_ref().join(CONFIG_FILE_NAME);

		if config_path.exists() {
			info!(?config_path, "Loading config");
			let json = fs::read_to_string(&config_path)
				.with_context(|| format!("failed to read config at {}", config_path.display()))?;
			let mut config: Self = serde_json::from_str(&json)
				.with_context(|| format!("malformed config at {}", config_path.display()))?;

			if config.version < Self::target_version() {
				info!(from = config.version, to = Self::target_version(), "Migrating config");
				config.version = Self::target_version();
				config.save_to(dir)?;
			}

			config.validate()?;

			Ok(config)
		} else {
			warn!(?config_path, "No config found, creating default");
			let config = Self::default();
			config.save_to(dir)?;
			Ok(config)
		}
	}

	pub fn save_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
		let dir = dir.as_ref();
		fs::create_dir_all(dir)?;

		let config_path = dir.join(CONFIG_FILE_NAME);
		fs::write(&config_path, serde_json::to_string_pretty(self)?)?;
		info!(?config_path, "Saved config");

		Ok(config_path)
	}

	pub fn validate(&self) -> Result<()> {
		if !(self.compress_ratio.is_finite() && self.compress_ratio >= 0.0) {
			bail!("compress_ratio must be a finite non negative number, got {}", self.compress_ratio);
		}

		if self.version > Self::target_version() {
			bail!(
				"config version {} is newer than supported version {}",
				self.version,
				Self::target_version()
			);
		}

		Ok(())
	}

	#[must_use]
	pub const fn archive_ttl(&self) -> Duration {
		Duration::from_secs(self.archive_timeout)
	}

	#[must_use]
	pub const fn folder_props_ttl(&self) -> Duration {
		Duration::from_secs(self.folder_props_timeout)
	}
}
