//! Configuration management for the speaker service.
//!
//! This module handles loading and saving configuration from disk,
//! including the last selected speaker and the toggle timeouts.

use std::{
   env, fs,
   path::{Path, PathBuf},
   time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
   device::DeviceRef,
   error::{Result, SpeakerError},
   toggle::Timeouts,
};

/// Main configuration structure for the service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
   #[serde(default = "default_overall_timeout")]
   pub overall_timeout_ms: u64,

   #[serde(default = "default_profile_timeout")]
   pub profile_timeout_ms: u64,

   #[serde(default = "default_connect_timeout")]
   pub connect_timeout_ms: u64,

   #[serde(default = "default_status_reset")]
   pub status_reset_ms: u64,

   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub last_device: Option<DeviceRef>,
}

const fn default_overall_timeout() -> u64 {
   15_000
}

const fn default_profile_timeout() -> u64 {
   5_000
}

const fn default_connect_timeout() -> u64 {
   10_000
}

const fn default_status_reset() -> u64 {
   4_000
}

impl Default for Config {
   fn default() -> Self {
      Self {
         overall_timeout_ms: default_overall_timeout(),
         profile_timeout_ms: default_profile_timeout(),
         connect_timeout_ms: default_connect_timeout(),
         status_reset_ms: default_status_reset(),
         last_device: None,
      }
   }
}

impl Config {
   /// Loads configuration from disk or creates default if not exists.
   pub fn load() -> Result<Self> {
      Self::load_from(&Self::config_path()?)
   }

   /// Saves the current configuration to disk.
   pub fn save(&self) -> Result<()> {
      self.save_to(&Self::config_path()?)
   }

   pub fn load_from(path: &Path) -> Result<Self> {
      if path.exists() {
         let contents = fs::read_to_string(path)?;
         Ok(toml::from_str(&contents)?)
      } else {
         let config = Self::default();
         config.save_to(path)?;
         Ok(config)
      }
   }

   pub fn save_to(&self, path: &Path) -> Result<()> {
      if let Some(parent) = path.parent() {
         fs::create_dir_all(parent)?;
      }

      let contents = toml::to_string_pretty(self)?;
      fs::write(path, contents)?;

      Ok(())
   }

   fn config_path() -> Result<PathBuf> {
      let config_dir = if let Ok(home) = env::var("SPEAKERCTL_HOME") {
         PathBuf::from(home)
      } else if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
         PathBuf::from(config_home)
      } else if let Some(config_dir) = dirs::config_dir() {
         config_dir
      } else {
         return Err(SpeakerError::ConfigDirNotFound);
      };

      Ok(config_dir.join("speakerctl").join("config.toml"))
   }

   /// Timeouts applied to every toggle session.
   pub const fn timeouts(&self) -> Timeouts {
      Timeouts {
         overall: Duration::from_millis(self.overall_timeout_ms),
         profile: Duration::from_millis(self.profile_timeout_ms),
         connect: Duration::from_millis(self.connect_timeout_ms),
      }
   }

   pub const fn status_reset(&self) -> Duration {
      Duration::from_millis(self.status_reset_ms)
   }
}
