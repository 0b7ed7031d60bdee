//! Error types for the speaker service.
//!
//! This module defines the errors that can occur while talking to BlueZ,
//! serving D-Bus requests, and loading configuration. Failures of a toggle
//! session itself are reported through [`crate::toggle::ToggleError`].

use thiserror::Error;

/// Main error type for the speaker service.
#[derive(Error, Debug)]
pub enum SpeakerError {
   #[error("Bluetooth error: {0}")]
   Bluetooth(#[from] bluer::Error),

   #[error("D-Bus error: {0}")]
   DBus(#[from] zbus::Error),

   #[error("D-Bus connection error: {0}")]
   DBusConnection(#[from] zbus::fdo::Error),

   #[error("I/O error: {0}")]
   Io(#[from] std::io::Error),

   #[error("Invalid device address: {0}")]
   InvalidAddress(String),

   #[error("Method not found on audio profile: {0}")]
   MethodNotFound(String),

   #[error("No speaker selected")]
   NoDeviceSelected,

   #[error("Device not paired: {0}")]
   DeviceNotPaired(String),

   #[error("Bluetooth unavailable")]
   BluetoothUnavailable,

   #[error("Could not determine config directory")]
   ConfigDirNotFound,

   #[error("TOML parsing error: {0}")]
   TomlParse(#[from] toml::de::Error),

   #[error("TOML serialization error: {0}")]
   TomlSerialize(#[from] toml::ser::Error),
}

/// Convenience type alias for Results with `SpeakerError`.
pub type Result<T> = std::result::Result<T, SpeakerError>;
