//! Capabilities the toggle core consumes from the Bluetooth stack.
//!
//! The coordinator is written against these traits only. The BlueZ backend
//! lives in [`crate::bluetooth`]; tests use an in-memory fake.

use std::future::Future;

use strum::Display;

use crate::{error::Result, notifier::StateNotifier, toggle::ProfileListener};

/// A bonded device as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformDevice {
   pub address: String,
   pub name: String,
}

/// Audio profiles a session can be requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ProfileKind {
   #[strum(serialize = "A2DP")]
   A2dp,
}

/// Entry point into the host Bluetooth stack.
pub trait BluetoothPlatform: Send + Sync {
   type Adapter: BluetoothAdapter;

   /// Returns the default adapter, or `None` if the host has none.
   fn adapter(&self) -> impl Future<Output = Option<Self::Adapter>> + Send;

   /// Source of connection-state changes for this platform.
   fn state_notifier(&self) -> &StateNotifier;
}

pub trait BluetoothAdapter: Send + Sync {
   type Profile: AudioProfile;

   fn is_enabled(&self) -> impl Future<Output = bool> + Send;

   fn bonded_devices(&self) -> impl Future<Output = Result<Vec<PlatformDevice>>> + Send;

   /// Asks for a profile proxy. The answer arrives on `listener`, possibly
   /// never.
   fn request_profile(&self, kind: ProfileKind, listener: ProfileListener<Self::Profile>);
}

/// Handle to an audio profile.
pub trait AudioProfile: Send + Sync + 'static {
   fn connected_devices(&self) -> impl Future<Output = Result<Vec<PlatformDevice>>> + Send;

   /// Invokes a profile operation by name.
   ///
   /// Returns whether the operation was initiated. Names the profile does not
   /// know yield [`crate::error::SpeakerError::MethodNotFound`].
   fn invoke(
      &self,
      method: &str,
      device: &PlatformDevice,
   ) -> impl Future<Output = Result<bool>> + Send;
}
