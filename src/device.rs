//! Speaker identity and the actions that can be requested for it.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};
use strum::Display;

/// A paired audio device, identified by its address.
///
/// The name is for display only and need not be unique.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceRef {
   name: String,
   address: String,
}

impl DeviceRef {
   pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
      Self {
         name: name.into(),
         address: address.into(),
      }
   }

   pub fn name(&self) -> &str {
      &self.name
   }

   pub fn address(&self) -> &str {
      &self.address
   }
}

impl fmt::Display for DeviceRef {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(&self.name)
   }
}

impl Ord for DeviceRef {
   fn cmp(&self, other: &Self) -> Ordering {
      let lhs = self.name.chars().flat_map(char::to_lowercase);
      let rhs = other.name.chars().flat_map(char::to_lowercase);
      lhs.cmp(rhs)
         .then_with(|| self.name.cmp(&other.name))
         .then_with(|| self.address.cmp(&other.address))
   }
}

impl PartialOrd for DeviceRef {
   fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
      Some(self.cmp(other))
   }
}

/// Action requested for a speaker.
///
/// `Toggle` is resolved against the live connection state once the session
/// has reached the audio profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionIntent {
   Toggle,
   Connect,
   Disconnect,
}

impl ConnectionIntent {
   /// Returns whether the device should end up connected, given its current state.
   pub const fn wants_connected(self, connected: bool) -> bool {
      match self {
         Self::Toggle => !connected,
         Self::Connect => true,
         Self::Disconnect => false,
      }
   }
}

/// Successful result of a toggle session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
   Connected,
   Disconnected,
   AlreadyConnected,
   AlreadyDisconnected,
}
